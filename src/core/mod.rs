// src/core/mod.rs

// Root of the `core` module: discovery, checks, orchestration, persistence.

/// Data structures shared across the crate: endpoints, findings, control
/// results, per-target records, and the batch/module report payloads.
pub mod models;

/// HTTP client wrapper every probe goes through.
pub mod fetcher;

/// BFS site discovery and page classification.
pub mod discovery;

/// The control checks, one submodule per assessment module.
pub mod checks;

/// Static mapping from module identifiers to their controls and checks.
pub mod registry;

/// Single-target execution: crawl once, then run the module's checks.
pub mod analyzer;

/// Multi-target and multi-module orchestration.
pub mod orchestrator;

/// Validated JSON persistence for module and batch results.
pub mod writer;
