// src/core/orchestrator.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use color_eyre::eyre::{eyre, Result};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::{Config, ScanSettings};
use crate::core::analyzer::TargetAnalyzer;
use crate::core::models::{
    BatchResult, BatchSummary, ModuleOutcome, ModulePayload, Summary, TargetRecord,
};
use crate::core::registry::ModuleId;
use crate::core::writer::JsonWriter;

/// Merge accumulator shared by parallel workers: the record list and the
/// running counters, guarded by one coarse lock held only for O(1)
/// append-and-increment, never across a network call.
type MergeState = (Vec<TargetRecord>, Summary);

/// Runs one module across N targets and merges the results into a single
/// payload, persisted as one file per module per run.
pub struct ModuleOrchestrator {
    module: ModuleId,
    scan: ScanSettings,
    workers: usize,
    reports: Vec<String>,
    writer: JsonWriter,
}

impl ModuleOrchestrator {
    pub fn new(module: ModuleId, config: &Config) -> Self {
        Self {
            module,
            scan: config.scan.clone(),
            workers: config.scan.workers,
            reports: config.tools.values().cloned().collect(),
            writer: JsonWriter::new(&config.output.directory),
        }
    }

    /// Analyzes every target and writes the merged payload.
    ///
    /// The merged target list carries no ordering guarantee under parallel
    /// execution; consumers must not depend on order.
    pub async fn run(&self, targets: &[String]) -> Result<ModulePayload> {
        if targets.is_empty() {
            return Err(eyre!("no targets supplied for module {}", self.module));
        }

        let (records, summary) = if self.workers <= 1 || targets.len() <= 1 {
            self.run_sequential(targets).await
        } else {
            self.run_parallel(targets).await
        };

        if records.is_empty() {
            return Err(eyre!(
                "no target produced a record for module {}",
                self.module
            ));
        }

        let payload = ModulePayload {
            module: self.module.title().to_string(),
            module_number: self.module.number(),
            timestamp: Utc::now(),
            targets: records,
            summary,
        };
        let path = self.writer.write_module_payload(self.module, &payload)?;
        info!(module = %self.module, path = %path.display(), "module payload written");
        Ok(payload)
    }

    async fn run_sequential(&self, targets: &[String]) -> MergeState {
        let mut records = Vec::new();
        let mut summary = Summary::default();
        for target in targets {
            let mut analyzer = match TargetAnalyzer::new(self.module, &self.scan) {
                Ok(analyzer) => analyzer,
                Err(error) => {
                    error!(target, error = %error, "analyzer construction failed");
                    continue;
                }
            };
            for report in &self.reports {
                analyzer.attach_report(report.clone());
            }
            match analyzer.analyze(target).await {
                Ok(record) => {
                    summary.absorb(&record.summary);
                    records.push(record);
                }
                Err(error) => {
                    error!(target, error = %error, "target analysis failed, dropping target");
                }
            }
        }
        (records, summary)
    }

    /// Bounded worker pool: one task per target, at most `workers` running.
    /// All network I/O and check execution happen outside the merge lock,
    /// so a slow target cannot block the merge of its siblings. A failed
    /// task is logged and its target simply absent from the merged output.
    async fn run_parallel(&self, targets: &[String]) -> MergeState {
        info!(module = %self.module, workers = self.workers, targets = targets.len(), "running targets in parallel");
        let merge: Arc<Mutex<MergeState>> = Arc::new(Mutex::new((Vec::new(), Summary::default())));
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets.iter().cloned() {
            let merge = Arc::clone(&merge);
            let semaphore = Arc::clone(&semaphore);
            let module = self.module;
            let scan = self.scan.clone();
            let reports = self.reports.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let mut analyzer = match TargetAnalyzer::new(module, &scan) {
                    Ok(analyzer) => analyzer,
                    Err(error) => {
                        error!(target, error = %error, "analyzer construction failed");
                        return;
                    }
                };
                for report in reports {
                    analyzer.attach_report(report);
                }
                match analyzer.analyze(&target).await {
                    Ok(record) => {
                        let mut state = merge.lock().unwrap_or_else(PoisonError::into_inner);
                        state.1.absorb(&record.summary);
                        state.0.push(record);
                        info!(target, "target merged");
                    }
                    Err(error) => {
                        error!(target, error = %error, "target analysis failed, dropping target");
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(error) = handle.await {
                // A panicked task loses its target only; siblings are
                // unaffected.
                error!(error = %error, "target task aborted");
            }
        }

        match Arc::try_unwrap(merge) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Runs a list of modules sequentially over the same target set. Failure
/// isolation is at module granularity: one failing module is recorded and
/// the batch moves on.
pub struct BatchOrchestrator {
    config: Config,
    writer: JsonWriter,
}

impl BatchOrchestrator {
    pub fn new(config: Config) -> Self {
        let writer = JsonWriter::new(&config.output.directory);
        Self { config, writer }
    }

    pub async fn execute_all(&self, modules: &[ModuleId], targets: &[String]) -> BatchResult {
        let started = Instant::now();
        let timestamp = Utc::now();
        let mut module_results: BTreeMap<u8, ModuleOutcome> = BTreeMap::new();
        let mut errors = Vec::new();
        let mut controls = Summary::default();
        info!(modules = modules.len(), targets = targets.len(), "starting batch execution");

        for &module in modules {
            if !self.config.module_enabled(module) {
                info!(module = %module, "module disabled in config, skipping");
                continue;
            }
            info!(module = %module, number = module.number(), "executing module");
            let orchestrator = ModuleOrchestrator::new(module, &self.config);
            match orchestrator.run(targets).await {
                Ok(payload) => {
                    controls.absorb(&payload.summary);
                    module_results.insert(module.number(), ModuleOutcome::success(payload));
                }
                Err(error) => {
                    let message = format!("module {} failed: {error}", module.number());
                    error!(module = %module, error = %error, "module failed, continuing batch");
                    errors.push(message);
                    module_results.insert(module.number(), ModuleOutcome::failed(error.to_string()));
                }
            }
        }

        let successful_modules = module_results
            .values()
            .filter(|outcome| outcome.is_success())
            .count();
        let summary = BatchSummary {
            total_modules: module_results.len(),
            successful_modules,
            failed_modules: module_results.len() - successful_modules,
            controls,
        };
        let execution_time = started.elapsed().as_secs_f64();
        info!(execution_time, successful = summary.successful_modules, failed = summary.failed_modules, "batch execution completed");

        BatchResult {
            timestamp,
            execution_time,
            summary,
            module_results,
            errors,
        }
    }

    /// Persists the consolidated batch artifact.
    pub fn save(&self, result: &BatchResult) -> Result<PathBuf> {
        self.writer.write_batch_result(result)
    }
}
