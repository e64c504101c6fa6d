// src/core/checks/sensitive_data.rs

// Passive checks over the crawl inventory; nothing here touches the network
// again, the evidence was already collected during discovery.

use tracing::warn;

use crate::core::models::{ControlResult, Endpoint, Finding, Tag};

/// Flags sensitive-pattern URLs that the crawl could actually reach.
/// Only sensitive-flagged endpoints count towards applicability; a crawl
/// that found no such URL leaves the control `not_tested`.
pub fn run_sensitive_file_exposure(endpoints: &[Endpoint]) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints.iter().filter(|ep| ep.sensitive).collect();
    let mut findings = Vec::new();
    for endpoint in &candidates {
        if endpoint.status < 400 {
            warn!(url = %endpoint.url, status = endpoint.status, "sensitive file reachable");
            findings.push(
                Finding::new(
                    "Sensitive_File_Exposure",
                    &endpoint.url,
                    "sensitive_file_reachable",
                )
                .with_status(endpoint.status),
            );
            break;
        }
    }
    ControlResult::verdict("Sensitive_File_Exposure", !candidates.is_empty(), findings)
}

/// Looks for server-generated index pages in the stored HTML snippets.
pub fn run_directory_listing(endpoints: &[Endpoint]) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|ep| ep.has_tag(Tag::Html))
        .collect();
    let mut findings = Vec::new();
    for endpoint in &candidates {
        if endpoint.snippet.contains("Index of /") {
            warn!(url = %endpoint.url, "directory listing enabled");
            findings.push(Finding::new(
                "Directory_Listing",
                &endpoint.url,
                "directory_listing_enabled",
            ));
            break;
        }
    }
    ControlResult::verdict("Directory_Listing", !candidates.is_empty(), findings)
}

/// Any endpoint still served over cleartext HTTP fails the control.
pub fn run_https_enforcement(endpoints: &[Endpoint]) -> ControlResult {
    let mut findings = Vec::new();
    for endpoint in endpoints {
        if endpoint.url.starts_with("http://") {
            findings.push(Finding::new(
                "HTTPS_Enforcement",
                &endpoint.url,
                "cleartext_http_endpoint",
            ));
            break;
        }
    }
    ControlResult::verdict("HTTPS_Enforcement", !endpoints.is_empty(), findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checks::testutil::endpoint;
    use crate::core::models::ControlStatus;

    #[test]
    fn reachable_sensitive_file_fails_with_one_finding() {
        let mut exposed = endpoint("http://t.example/.env", &[], &[]);
        exposed.sensitive = true;
        let mut also_exposed = endpoint("http://t.example/backup.zip", &[], &[]);
        also_exposed.sensitive = true;

        let result = run_sensitive_file_exposure(&[exposed, also_exposed]);
        assert_eq!(result.status, ControlStatus::Fail);
        // First-match-wins: the second reachable file is not recorded.
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].url, "http://t.example/.env");
    }

    #[test]
    fn unreachable_sensitive_file_passes() {
        let mut blocked = endpoint("http://t.example/.git/config", &[], &[]);
        blocked.sensitive = true;
        blocked.status = 403;
        let result = run_sensitive_file_exposure(&[blocked]);
        assert_eq!(result.status, ControlStatus::Pass);
    }

    #[test]
    fn sensitive_exposure_without_endpoints_is_not_tested() {
        let result = run_sensitive_file_exposure(&[]);
        assert_eq!(result.status, ControlStatus::NotTested);
    }

    #[test]
    fn sensitive_exposure_without_flagged_urls_is_not_tested() {
        // Plenty of endpoints, none matching a sensitive pattern: nothing
        // applicable was probed, so the control must not claim a pass.
        let eps = vec![
            endpoint("http://t.example/", &[Tag::Html], &[]),
            endpoint("http://t.example/about", &[Tag::Html], &[]),
        ];
        let result = run_sensitive_file_exposure(&eps);
        assert_eq!(result.status, ControlStatus::NotTested);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn directory_listing_reads_the_snippet() {
        let mut listing = endpoint("http://t.example/files/", &[Tag::Html], &[]);
        listing.snippet = "<html><title>Index of /files</title>".to_string();
        let result = run_directory_listing(&[listing]);
        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.findings[0].indicator, "directory_listing_enabled");
    }

    #[test]
    fn https_enforcement_flags_cleartext() {
        let eps = vec![endpoint("http://t.example/login", &[Tag::Html], &[])];
        let result = run_https_enforcement(&eps);
        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.findings[0].indicator, "cleartext_http_endpoint");
    }
}
