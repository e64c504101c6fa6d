// src/core/writer.rs

use std::fs;
use std::path::PathBuf;

use color_eyre::eyre::{ensure, Result, WrapErr};
use tracing::info;

use crate::core::models::{BatchResult, ModulePayload, Summary};
use crate::core::registry::ModuleId;

/// JSON persistence with schema validation before every module write.
/// A payload that fails validation is never written; the error surfaces to
/// the caller and counts as that module's failure.
#[derive(Debug, Clone)]
pub struct JsonWriter {
    output_dir: PathBuf,
}

impl JsonWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Stable per-module file path; each run overwrites the previous one.
    pub fn module_file(&self, module: ModuleId) -> PathBuf {
        self.output_dir
            .join(format!("module{}_{}.json", module.number(), module.slug()))
    }

    pub fn write_module_payload(&self, module: ModuleId, payload: &ModulePayload) -> Result<PathBuf> {
        validate_module_payload(payload)?;
        self.ensure_output_dir()?;
        let path = self.module_file(module);
        let json = serde_json::to_string_pretty(payload)?;
        fs::write(&path, json).wrap_err_with(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Batch artifacts are timestamped so consecutive runs stay comparable.
    pub fn write_batch_result(&self, result: &BatchResult) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let stamp = result.timestamp.format("%Y%m%d_%H%M%S");
        let path = self.output_dir.join(format!("batch_results_{stamp}.json"));
        let json = serde_json::to_string_pretty(result)?;
        fs::write(&path, json).wrap_err_with(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "batch artifact written");
        Ok(path)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .wrap_err_with(|| format!("creating output dir {}", self.output_dir.display()))
    }
}

/// Schema validation applied before a module payload reaches disk.
pub fn validate_module_payload(payload: &ModulePayload) -> Result<()> {
    ensure!(!payload.module.is_empty(), "module name must not be empty");
    ensure!(payload.module_number > 0, "module number must be positive");
    ensure!(
        payload.summary.is_consistent(),
        "module summary counters are inconsistent: {:?}",
        payload.summary
    );

    let mut recomputed = Summary::default();
    for record in &payload.targets {
        ensure!(
            !record.controls.is_empty(),
            "target {} carries no controls",
            record.target
        );
        ensure!(
            record.summary.is_consistent(),
            "summary counters for target {} are inconsistent",
            record.target
        );
        ensure!(
            record.summary.total == record.controls.len(),
            "summary total for target {} does not match its control map",
            record.target
        );
        let from_controls = Summary::from_controls(&record.controls);
        ensure!(
            from_controls == record.summary,
            "summary for target {} does not match its control statuses",
            record.target
        );
        recomputed.absorb(&record.summary);
    }
    ensure!(
        recomputed == payload.summary,
        "module summary does not equal the sum of its target summaries"
    );
    Ok(())
}
