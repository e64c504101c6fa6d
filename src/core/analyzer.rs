// src/core/analyzer.rs

use std::collections::BTreeMap;

use color_eyre::eyre::Result;
use tracing::{info, warn};

use crate::config::ScanSettings;
use crate::core::discovery::DiscoveryEngine;
use crate::core::fetcher::PageFetcher;
use crate::core::models::{ControlStatus, Evidence, Summary, TargetRecord};
use crate::core::registry::{self, ModuleId};

/// Runs one module against one target: a single discovery crawl followed by
/// the module's ordered check list.
///
/// Each analyzer owns its own HTTP client, so parallel workers never share
/// connection or cookie state.
pub struct TargetAnalyzer {
    module: ModuleId,
    fetcher: PageFetcher,
    engine: DiscoveryEngine,
    reports: Vec<String>,
}

impl TargetAnalyzer {
    pub fn new(module: ModuleId, scan: &ScanSettings) -> Result<Self> {
        let fetcher = PageFetcher::new(scan.timeout_secs)?;
        let engine = DiscoveryEngine::new(
            scan.max_depth,
            scan.max_endpoints,
            scan.wordlist,
            module.classifier(),
        );
        Ok(Self {
            module,
            fetcher,
            engine,
            reports: Vec::new(),
        })
    }

    /// Records an external-tool report path in the evidence bundle. The
    /// file's content is never parsed here.
    pub fn attach_report(&mut self, path: impl Into<String>) {
        self.reports.push(path.into());
    }

    pub async fn analyze(&self, target: &str) -> Result<TargetRecord> {
        info!(module = %self.module, target, "analyzing target");
        let discovery = self.engine.crawl(&self.fetcher, target).await?;

        // Every declared control starts as not_tested; a check that errors
        // out or never runs can therefore not drop its control silently.
        let mut controls: BTreeMap<String, ControlStatus> = self
            .module
            .controls()
            .iter()
            .map(|name| (name.to_string(), ControlStatus::NotTested))
            .collect();

        let results = registry::run_checks(self.module, &discovery.endpoints, &self.fetcher).await;
        let mut findings = Vec::new();
        for result in results {
            info!(control = %result.name, status = %result.status, findings = result.findings.len(), "control finished");
            if controls.contains_key(&result.name) {
                controls.insert(result.name.clone(), result.status);
            } else {
                warn!(control = %result.name, module = %self.module, "check produced an undeclared control");
            }
            findings.extend(result.findings);
        }

        let summary = Summary::from_controls(&controls);
        Ok(TargetRecord {
            target: discovery.base_url.clone(),
            controls,
            evidence: Evidence {
                endpoints: discovery.endpoints,
                sensitive_files: discovery.sensitive_files,
                findings,
                reports: self.reports.clone(),
            },
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_seeds_every_declared_control() {
        let scan = ScanSettings::default();
        let analyzer = TargetAnalyzer::new(ModuleId::InputValidation, &scan).unwrap();
        // The seeding itself is exercised through analyze(); here we only
        // assert the declared list the analyzer starts from.
        assert_eq!(analyzer.module.controls().len(), 7);
    }
}
