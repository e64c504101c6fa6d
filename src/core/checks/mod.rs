// src/core/checks/mod.rs

// Check implementations grouped by module. Every check follows the same
// three-state contract: `not_tested` when nothing on the target is
// applicable, `fail` on the first firing indicator (first-match-wins, one
// finding, no further candidates probed), `pass` otherwise. Per-request
// network errors are swallowed and the candidate skipped.
pub mod api_security;
pub mod authentication;
pub mod input_validation;
pub mod sensitive_data;
pub mod session;

use crate::core::fetcher::{FetchedPage, PageFetcher};
use crate::core::models::Endpoint;

/// Endpoints eligible for parameter-based probing.
pub(crate) fn param_endpoints(endpoints: &[Endpoint]) -> Vec<&Endpoint> {
    endpoints.iter().filter(|ep| ep.has_params()).collect()
}

/// Sends one probe the way the endpoint was discovered: form posts for POST
/// endpoints, query parameters otherwise.
pub(crate) async fn send_payload(
    fetcher: &PageFetcher,
    endpoint: &Endpoint,
    fields: &[(&str, &str)],
) -> Result<FetchedPage, reqwest::Error> {
    if endpoint.method == "POST" {
        fetcher.post_form(&endpoint.url, fields).await
    } else {
        fetcher.get_with_params(&endpoint.url, fields).await
    }
}

const SQL_ERROR_MARKERS: &[&str] = &[
    "sql syntax",
    "mysql",
    "sqlstate",
    "ora-",
    "postgresql",
    "sqlite",
];

/// Database error leaking into the response, or a server error.
pub(crate) fn detect_sql_error(page: &FetchedPage) -> bool {
    if page.status >= 500 {
        return true;
    }
    let body = page.body.to_ascii_lowercase();
    SQL_ERROR_MARKERS.iter().any(|marker| body.contains(marker))
}

const ERROR_KEYWORDS: &[&str] = &["error", "invalid", "failed", "required"];

/// Loose rejection heuristic used when a check expects the server to refuse
/// bad input.
pub(crate) fn indicates_error(page: &FetchedPage) -> bool {
    let body = page.body.to_ascii_lowercase();
    ERROR_KEYWORDS.iter().any(|keyword| body.contains(keyword))
}
