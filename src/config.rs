// src/config.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::fetcher::DEFAULT_TIMEOUT_SECS;
use crate::core::registry::ModuleId;

pub const DEFAULT_CONFIG_FILE: &str = "gapscan.toml";

/// Top-level configuration, loaded from a TOML file and overridable from
/// the command line. Every section has a sensible default so an empty file
/// and a missing default file both yield a runnable configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub modules: ModuleFlags,
    pub scan: ScanSettings,
    pub output: OutputConfig,
    /// External tool report paths, keyed by tool name. Attached to evidence
    /// verbatim; their content is never parsed.
    pub tools: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub urls: Vec<String>,
}

/// Per-module enable switches. Everything runs unless explicitly disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleFlags {
    pub input_validation: bool,
    pub authentication: bool,
    pub sensitive_data: bool,
    pub session_management: bool,
    pub api_security: bool,
}

impl Default for ModuleFlags {
    fn default() -> Self {
        Self {
            input_validation: true,
            authentication: true,
            sensitive_data: true,
            session_management: true,
            api_security: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub max_depth: usize,
    pub max_endpoints: usize,
    pub wordlist: bool,
    pub timeout_secs: u64,
    pub workers: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_endpoints: 50,
            wordlist: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("outputs"),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from `gapscan.toml` in the
    /// working directory when no path is given. An explicitly named file
    /// must exist; the implicit default file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if required {
                return Err(color_eyre::eyre::eyre!(
                    "config file not found: {}",
                    path.display()
                ));
            }
            info!("no config file found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn module_enabled(&self, module: ModuleId) -> bool {
        match module {
            ModuleId::InputValidation => self.modules.input_validation,
            ModuleId::Authentication => self.modules.authentication,
            ModuleId::SensitiveData => self.modules.sensitive_data,
            ModuleId::SessionManagement => self.modules.session_management,
            ModuleId::ApiSecurity => self.modules.api_security,
        }
    }
}
