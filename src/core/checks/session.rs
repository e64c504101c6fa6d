// src/core/checks/session.rs

use reqwest::header::SET_COOKIE;
use tracing::{debug, warn};

use crate::core::fetcher::PageFetcher;
use crate::core::models::{ControlResult, Endpoint, Finding, Tag};

const COOKIE_PROBE_LIMIT: usize = 5;

const SESSION_KEYWORDS: &[&str] = &["sessionid", "sess", "sid", "token", "jsession"];

fn looks_like_session(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SESSION_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Probes a handful of HTML pages and inspects every Set-Cookie they send.
/// Applicability is "the target sets cookies at all": a cookieless target
/// is `not_tested`, not `pass`.
pub async fn run_cookie_security(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|ep| ep.has_tag(Tag::Html))
        .take(COOKIE_PROBE_LIMIT)
        .collect();

    let mut observed_cookie = false;
    let mut findings = Vec::new();

    'probe: for endpoint in &candidates {
        let Ok(page) = fetcher.get(&endpoint.url).await else {
            continue;
        };
        for value in page.headers.get_all(SET_COOKIE) {
            let Ok(cookie) = value.to_str() else {
                continue;
            };
            observed_cookie = true;
            let name = cookie.split('=').next().unwrap_or_default();
            let lower = cookie.to_ascii_lowercase();
            if looks_like_session(name) && (!lower.contains("httponly") || !lower.contains("secure"))
            {
                warn!(url = %endpoint.url, cookie = name, "session cookie without httponly/secure");
                findings.push(
                    Finding::new("Cookie_Security", &endpoint.url, "session_cookie_missing_flags")
                        .with_param(name),
                );
                break 'probe;
            }
        }
    }

    debug!(observed_cookie, "cookie probe finished");
    ControlResult::verdict("Cookie_Security", observed_cookie, findings)
}

/// Session identifiers must never travel in the query string.
pub fn run_session_id_in_url(endpoints: &[Endpoint]) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints.iter().filter(|ep| ep.has_params()).collect();
    let mut findings = Vec::new();

    'scan: for endpoint in &candidates {
        for param in &endpoint.params {
            if looks_like_session(param) {
                warn!(url = %endpoint.url, param = %param, "session identifier in url");
                findings.push(
                    Finding::new("Session_Id_In_Url", &endpoint.url, "session_id_in_url")
                        .with_param(param),
                );
                break 'scan;
            }
        }
    }

    ControlResult::verdict("Session_Id_In_Url", !candidates.is_empty(), findings)
}
