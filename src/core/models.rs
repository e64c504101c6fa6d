// src/core/models.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

// --- Classification & status enums ---

/// Classification tag attached to a discovered endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tag {
    Html,
    Json,
    Xml,
    Param,
    Api,
    Upload,
}

/// Outcome of one control for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlStatus {
    Pass,
    Fail,
    NotTested,
}

// --- Discovery models ---

/// A single named input inside a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormInput {
    pub name: Option<String>,
    pub kind: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Shape of a form found during the crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub inputs: Vec<FormInput>,
    pub has_file_input: bool,
}

/// One entry in the endpoint inventory produced by a crawl.
///
/// Endpoints are built once during discovery and never mutated afterwards;
/// checks only read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub method: String,
    pub depth: usize,
    pub status: u16,
    pub content_type: String,
    pub params: Vec<String>,
    pub tags: BTreeSet<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<FormDescriptor>,
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
}

impl Endpoint {
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// True when the endpoint carries query parameters or named form inputs.
    pub fn has_params(&self) -> bool {
        !self.params.is_empty() || self.has_tag(Tag::Param)
    }
}

// --- Control & evidence models ---

/// One piece of evidence justifying a `fail` verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub control: String,
    pub url: String,
    pub indicator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl Finding {
    pub fn new(control: &str, url: &str, indicator: &str) -> Self {
        Self {
            control: control.to_string(),
            url: url.to_string(),
            indicator: indicator.to_string(),
            param: None,
            payload: None,
            status_code: None,
        }
    }

    pub fn with_param(mut self, param: &str) -> Self {
        self.param = Some(param.to_string());
        self
    }

    pub fn with_payload(mut self, payload: &str) -> Self {
        self.payload = Some(payload.to_string());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Result of running one control against one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResult {
    pub name: String,
    pub status: ControlStatus,
    pub findings: Vec<Finding>,
}

impl ControlResult {
    /// Applies the shared three-state status policy:
    /// any finding wins `fail`, an empty candidate set yields `not_tested`,
    /// a probed-but-clean control yields `pass`.
    pub fn verdict(name: &str, applicable: bool, findings: Vec<Finding>) -> Self {
        let status = if !findings.is_empty() {
            ControlStatus::Fail
        } else if !applicable {
            ControlStatus::NotTested
        } else {
            ControlStatus::Pass
        };
        Self {
            name: name.to_string(),
            status,
            findings,
        }
    }

    pub fn not_tested(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ControlStatus::NotTested,
            findings: Vec::new(),
        }
    }
}

/// Evidence bundle attached to a target record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub endpoints: Vec<Endpoint>,
    pub sensitive_files: Vec<Endpoint>,
    pub findings: Vec<Finding>,
    /// Opaque file paths produced by external tool wrappers. Their content
    /// is never parsed here.
    pub reports: Vec<String>,
}

// --- Aggregation models ---

/// Control counters. `total == passed + failed + not_tested` always holds
/// for values produced by this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_tested: usize,
    pub pass_rate: f64,
}

impl Summary {
    pub fn from_controls(controls: &BTreeMap<String, ControlStatus>) -> Self {
        let mut summary = Self {
            total: controls.len(),
            ..Self::default()
        };
        for status in controls.values() {
            match status {
                ControlStatus::Pass => summary.passed += 1,
                ControlStatus::Fail => summary.failed += 1,
                ControlStatus::NotTested => summary.not_tested += 1,
            }
        }
        summary.recompute_rate();
        summary
    }

    /// Adds another summary's counters into this one.
    pub fn absorb(&mut self, other: &Summary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.not_tested += other.not_tested;
        self.recompute_rate();
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.failed + self.not_tested
    }

    fn recompute_rate(&mut self) {
        self.pass_rate = if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64 * 10_000.0).round() / 100.0
        };
    }
}

/// Assessment of one target by one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    pub target: String,
    pub controls: BTreeMap<String, ControlStatus>,
    pub evidence: Evidence,
    pub summary: Summary,
}

/// Merged per-module output, persisted as one JSON file per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulePayload {
    pub module: String,
    pub module_number: u8,
    pub timestamp: DateTime<Utc>,
    pub targets: Vec<TargetRecord>,
    pub summary: Summary,
}

/// Per-module entry in the batch artifact.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModuleOutcome {
    Success {
        success: bool,
        #[serde(flatten)]
        payload: ModulePayload,
    },
    Failed {
        status: String,
        error: String,
    },
}

impl ModuleOutcome {
    pub fn success(payload: ModulePayload) -> Self {
        Self::Success {
            success: true,
            payload,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            status: "failed".to_string(),
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Module-level tallies for a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total_modules: usize,
    pub successful_modules: usize,
    pub failed_modules: usize,
    /// Control counters aggregated over successful modules only.
    pub controls: Summary,
}

/// Consolidated result of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the batch in seconds.
    pub execution_time: f64,
    pub summary: BatchSummary,
    pub module_results: BTreeMap<u8, ModuleOutcome>,
    pub errors: Vec<String>,
}
