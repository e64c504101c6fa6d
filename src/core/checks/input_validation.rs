// src/core/checks/input_validation.rs

use tracing::{debug, warn};
use url::Url;

use crate::core::checks::{detect_sql_error, indicates_error, param_endpoints, send_payload};
use crate::core::fetcher::PageFetcher;
use crate::core::models::{ControlResult, ControlStatus, Endpoint, Finding, Tag};

/// Injection payloads, probed in order against each parameter.
pub const SQL_PAYLOADS: &[&str] = &[
    "' OR '1'='1",
    "' UNION SELECT NULL--",
    "admin' --",
    "') OR ('1'='1",
    "'; WAITFOR DELAY '0:0:5'--",
];

pub const XSS_PAYLOADS: &[&str] = &[
    "<script>alert(1)</script>",
    "\" onmouseover=\"alert(1)",
    "<img src=x onerror=alert(1)>",
    "<svg/onload=alert(1)>",
];

const BUFFER_PAYLOAD_LEN: usize = 8000;
const BUFFER_CANDIDATES: usize = 5;

/// External entity probe sent to XML endpoints.
const XXE_PROBE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE data [
<!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<data>&xxe;</data>"#;

/// Value that should trip the given input type's client-side validation.
fn bypass_value(kind: &str) -> &'static str {
    match kind {
        "email" => "invalid@@example",
        "number" => "not-a-number",
        _ => "<script>alert(0)</script>",
    }
}

/// Fallback parameter name for endpoints tagged `param` without a parsed
/// name list.
const FALLBACK_PARAM: &str = "input";

pub async fn run_sql_injection(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates = param_endpoints(endpoints);
    let mut findings = Vec::new();

    'probe: for endpoint in &candidates {
        let params = probe_params(endpoint);
        for param in &params {
            for payload in SQL_PAYLOADS {
                let Ok(page) = send_payload(fetcher, endpoint, &[(param, payload)]).await else {
                    continue;
                };
                if detect_sql_error(&page) {
                    warn!(url = %endpoint.url, param = %param, "sql error indicator fired");
                    findings.push(
                        Finding::new("SQL_Injection", &endpoint.url, "sql_error_string")
                            .with_param(param)
                            .with_payload(payload)
                            .with_status(page.status),
                    );
                    break 'probe;
                }
            }
        }
    }

    ControlResult::verdict("SQL_Injection", !candidates.is_empty(), findings)
}

pub async fn run_xss(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates = param_endpoints(endpoints);
    let mut findings = Vec::new();

    'probe: for endpoint in &candidates {
        let params = probe_params(endpoint);
        for param in &params {
            for payload in XSS_PAYLOADS {
                let Ok(page) = send_payload(fetcher, endpoint, &[(param, payload)]).await else {
                    continue;
                };
                if page.body.contains(payload) {
                    warn!(url = %endpoint.url, param = %param, "unescaped payload reflection");
                    findings.push(
                        Finding::new("XSS", &endpoint.url, "unescaped_reflection")
                            .with_param(param)
                            .with_payload(payload)
                            .with_status(page.status),
                    );
                    break 'probe;
                }
            }
        }
    }

    ControlResult::verdict("XSS", !candidates.is_empty(), findings)
}

/// Submits type-mismatched values to discovered forms. A server that
/// answers without an error signal relies on client-side validation alone.
pub async fn run_client_validation(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints.iter().filter(|ep| ep.form.is_some()).collect();
    let mut findings = Vec::new();

    for endpoint in &candidates {
        let Some(form) = endpoint.form.as_ref() else {
            continue;
        };
        let fields: Vec<(&str, &str)> = form
            .inputs
            .iter()
            .filter_map(|input| {
                input
                    .name
                    .as_deref()
                    .map(|name| (name, bypass_value(&input.kind)))
            })
            .collect();
        let Ok(page) = send_payload(fetcher, endpoint, &fields).await else {
            continue;
        };
        if page.status < 400 && !indicates_error(&page) {
            warn!(url = %endpoint.url, "type-mismatched form input accepted");
            findings.push(
                Finding::new("Client_Validation", &endpoint.url, "client_side_bypass")
                    .with_status(page.status),
            );
            break;
        }
    }

    ControlResult::verdict("Client_Validation", !candidates.is_empty(), findings)
}

/// Posts an external-entity document to XML endpoints and watches for file
/// content leaking back or a parser blowing up.
pub async fn run_xml_validation(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|ep| ep.has_tag(Tag::Xml))
        .collect();
    let mut findings = Vec::new();

    for endpoint in &candidates {
        let Ok(page) = fetcher
            .post_raw(&endpoint.url, "application/xml", XXE_PROBE.to_string())
            .await
        else {
            continue;
        };
        if page.body.contains("root:") || page.status >= 500 {
            warn!(url = %endpoint.url, status = page.status, "xml entity probe fired");
            findings.push(
                Finding::new("XML_Validation", &endpoint.url, "possible_xxe")
                    .with_status(page.status),
            );
            break;
        }
    }

    ControlResult::verdict("XML_Validation", !candidates.is_empty(), findings)
}

pub async fn run_buffer_overflow(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates: Vec<&Endpoint> = param_endpoints(endpoints)
        .into_iter()
        .take(BUFFER_CANDIDATES)
        .collect();
    let mut findings = Vec::new();
    let oversized = "A".repeat(BUFFER_PAYLOAD_LEN);

    for endpoint in &candidates {
        let params = probe_params(endpoint);
        let param = params[0].as_str();
        let Ok(page) = send_payload(fetcher, endpoint, &[(param, oversized.as_str())]).await else {
            continue;
        };
        if page.status >= 500 {
            warn!(url = %endpoint.url, status = page.status, "server error on oversized input");
            findings.push(
                Finding::new("Buffer_Overflow", &endpoint.url, "server_error_on_large_payload")
                    .with_param(param)
                    .with_status(page.status),
            );
            break;
        }
    }

    ControlResult::verdict("Buffer_Overflow", !candidates.is_empty(), findings)
}

pub async fn run_file_upload(endpoints: &[Endpoint], fetcher: &PageFetcher) -> ControlResult {
    let candidates: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|ep| ep.form.as_ref().is_some_and(|form| form.has_file_input))
        .collect();
    let mut findings = Vec::new();

    for endpoint in &candidates {
        let Ok(page) = fetcher
            .post_multipart(
                &endpoint.url,
                "file",
                "shell.php",
                b"<?php echo 1;?>".to_vec(),
                "application/x-php",
            )
            .await
        else {
            continue;
        };
        if page.status < 400 && !indicates_error(&page) {
            warn!(url = %endpoint.url, "dangerous file extension accepted");
            findings.push(
                Finding::new("File_Upload", &endpoint.url, "dangerous_extension_accepted")
                    .with_status(page.status),
            );
            break;
        }
    }

    ControlResult::verdict("File_Upload", !candidates.is_empty(), findings)
}

/// Passive check comparing served content types against path extensions and
/// body shape. Unlike the probing checks it tolerates a single mismatch;
/// two or more fail the control, with every mismatch recorded.
pub fn run_content_type(endpoints: &[Endpoint]) -> ControlResult {
    if endpoints.is_empty() {
        return ControlResult::not_tested("Content_Type");
    }

    let mut findings = Vec::new();
    for endpoint in endpoints {
        let ctype = endpoint.content_type.to_ascii_lowercase();
        let path = Url::parse(&endpoint.url)
            .map(|url| url.path().to_ascii_lowercase())
            .unwrap_or_default();

        if ctype.is_empty() {
            if endpoint.method == "GET" {
                findings.push(Finding::new(
                    "Content_Type",
                    &endpoint.url,
                    "missing_content_type",
                ));
            }
            continue;
        }
        if path.ends_with(".json") && !ctype.contains("json") {
            findings.push(Finding::new(
                "Content_Type",
                &endpoint.url,
                "json_extension_but_wrong_content_type",
            ));
        }
        if path.ends_with(".xml") && !ctype.contains("xml") {
            findings.push(Finding::new(
                "Content_Type",
                &endpoint.url,
                "xml_extension_but_wrong_content_type",
            ));
        }
        if !ctype.contains("text/html") && endpoint.snippet.contains("<html") {
            findings.push(Finding::new(
                "Content_Type",
                &endpoint.url,
                "html_body_without_text_html",
            ));
        }
    }

    debug!(mismatches = findings.len(), "content-type check finished");
    let status = if findings.len() >= 2 {
        ControlStatus::Fail
    } else {
        ControlStatus::Pass
    };
    ControlResult {
        name: "Content_Type".to_string(),
        status,
        findings,
    }
}

fn probe_params(endpoint: &Endpoint) -> Vec<String> {
    if endpoint.params.is_empty() {
        vec![FALLBACK_PARAM.to_string()]
    } else {
        endpoint.params.clone()
    }
}
