// src/core/registry.rs

// Static module registry. Earlier versions of this system resolved module
// numbers to analyzer classes through reflective imports; here the mapping
// is a compile-time enum so a typo is a build error, not a runtime one.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::core::checks::{api_security, authentication, input_validation, sensitive_data, session};
use crate::core::discovery::{ApiSurfaceClassifier, DefaultClassifier, PageClassifier};
use crate::core::fetcher::PageFetcher;
use crate::core::models::{ControlResult, Endpoint};

/// Identifier of one assessment module: a named bundle of related controls
/// executed as a unit.
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
    EnumIter,
    EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleId {
    InputValidation,
    Authentication,
    SensitiveData,
    SessionManagement,
    ApiSecurity,
}

impl ModuleId {
    /// Stable module number used in file names and report keys.
    pub fn number(self) -> u8 {
        match self {
            Self::InputValidation => 1,
            Self::Authentication => 2,
            Self::SensitiveData => 4,
            Self::SessionManagement => 5,
            Self::ApiSecurity => 7,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::InputValidation),
            2 => Some(Self::Authentication),
            4 => Some(Self::SensitiveData),
            5 => Some(Self::SessionManagement),
            7 => Some(Self::ApiSecurity),
            _ => None,
        }
    }

    /// Human-readable module name used in payloads.
    pub fn title(self) -> &'static str {
        match self {
            Self::InputValidation => "Input & Data Validation",
            Self::Authentication => "Authentication",
            Self::SensitiveData => "Sensitive Data Exposure",
            Self::SessionManagement => "Session Management",
            Self::ApiSecurity => "API Security",
        }
    }

    /// File-name friendly identifier.
    pub fn slug(self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::Authentication => "authentication",
            Self::SensitiveData => "sensitive_data",
            Self::SessionManagement => "session_management",
            Self::ApiSecurity => "api_security",
        }
    }

    /// Controls declared by the module, in execution order. Every name
    /// listed here receives a status in each target record, defaulting to
    /// `not_tested` when its check never becomes applicable.
    pub fn controls(self) -> &'static [&'static str] {
        match self {
            Self::InputValidation => &[
                "SQL_Injection",
                "XSS",
                "Client_Validation",
                "Buffer_Overflow",
                "File_Upload",
                "XML_Validation",
                "Content_Type",
            ],
            Self::Authentication => &["Password_Policy", "Password_Encryption_Transit"],
            Self::SensitiveData => &[
                "Sensitive_File_Exposure",
                "Directory_Listing",
                "HTTPS_Enforcement",
            ],
            Self::SessionManagement => &["Cookie_Security", "Session_Id_In_Url"],
            Self::ApiSecurity => &["CORS_Policy", "API_Rate_Limiting", "API_Method_Security"],
        }
    }

    /// Page-classification strategy the module crawls with.
    pub fn classifier(self) -> Box<dyn PageClassifier> {
        match self {
            Self::ApiSecurity => Box::new(ApiSurfaceClassifier::default()),
            _ => Box::new(DefaultClassifier),
        }
    }
}

/// Runs the module's fixed, ordered check list against a discovery result.
pub async fn run_checks(
    module: ModuleId,
    endpoints: &[Endpoint],
    fetcher: &PageFetcher,
) -> Vec<ControlResult> {
    match module {
        ModuleId::InputValidation => vec![
            input_validation::run_sql_injection(endpoints, fetcher).await,
            input_validation::run_xss(endpoints, fetcher).await,
            input_validation::run_client_validation(endpoints, fetcher).await,
            input_validation::run_buffer_overflow(endpoints, fetcher).await,
            input_validation::run_file_upload(endpoints, fetcher).await,
            input_validation::run_xml_validation(endpoints, fetcher).await,
            input_validation::run_content_type(endpoints),
        ],
        ModuleId::Authentication => vec![
            authentication::run_password_policy(endpoints),
            authentication::run_password_transport(endpoints),
        ],
        ModuleId::SensitiveData => vec![
            sensitive_data::run_sensitive_file_exposure(endpoints),
            sensitive_data::run_directory_listing(endpoints),
            sensitive_data::run_https_enforcement(endpoints),
        ],
        ModuleId::SessionManagement => vec![
            session::run_cookie_security(endpoints, fetcher).await,
            session::run_session_id_in_url(endpoints),
        ],
        ModuleId::ApiSecurity => vec![
            api_security::run_cors_policy(endpoints, fetcher).await,
            api_security::run_rate_limiting(endpoints, fetcher).await,
            api_security::run_method_security(endpoints, fetcher).await,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn module_numbers_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for module in ModuleId::iter() {
            assert!(seen.insert(module.number()), "duplicate module number");
            assert_eq!(ModuleId::from_number(module.number()), Some(module));
        }
        assert_eq!(ModuleId::from_number(99), None);
    }

    #[test]
    fn every_module_declares_controls() {
        for module in ModuleId::iter() {
            assert!(!module.controls().is_empty());
            assert!(!module.title().is_empty());
        }
    }

    #[test]
    fn module_id_parses_from_snake_case() {
        use std::str::FromStr;
        assert_eq!(
            ModuleId::from_str("input_validation").unwrap(),
            ModuleId::InputValidation
        );
        assert_eq!(ModuleId::ApiSecurity.to_string(), "api_security");
    }
}
