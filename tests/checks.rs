// tests/checks.rs

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{AppendHeaders, Html, IntoResponse};
use axum::routing::{any, get};
use axum::Router;

use gapscan::core::checks::{api_security, input_validation, session};
use gapscan::core::fetcher::PageFetcher;
use gapscan::core::models::{ControlStatus, Endpoint, FormDescriptor, FormInput, Tag};

fn endpoint(url: &str, params: &[&str], tags: &[Tag]) -> Endpoint {
    let mut tag_set: BTreeSet<Tag> = tags.iter().copied().collect();
    if !params.is_empty() {
        tag_set.insert(Tag::Param);
    }
    Endpoint {
        url: url.to_string(),
        method: "GET".to_string(),
        depth: 1,
        status: 200,
        content_type: "text/html".to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        tags: tag_set,
        form: None,
        sensitive: false,
        snippet: String::new(),
    }
}

fn form_endpoint(url: &str, inputs: &[(&str, &str)]) -> Endpoint {
    let mut ep = endpoint(url, &[], &[Tag::Html]);
    ep.method = "POST".to_string();
    ep.params = inputs.iter().map(|(name, _)| name.to_string()).collect();
    ep.tags.insert(Tag::Param);
    ep.form = Some(FormDescriptor {
        inputs: inputs
            .iter()
            .map(|(name, kind)| FormInput {
                name: Some(name.to_string()),
                kind: kind.to_string(),
                required: false,
                placeholder: None,
            })
            .collect(),
        has_file_input: false,
    });
    ep
}

async fn search(
    State(counter): State<Arc<AtomicUsize>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Html<String> {
    counter.fetch_add(1, Ordering::SeqCst);
    if params.iter().any(|(_, value)| value.contains("UNION SELECT")) {
        Html("You have an error in your SQL syntax near 'UNION'".to_string())
    } else {
        Html("<p>no results</p>".to_string())
    }
}

#[tokio::test]
async fn sql_injection_stops_at_the_first_firing_payload() {
    let counter = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/search", get(search))
        .with_state(Arc::clone(&counter));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/search?q=hello"), &["q"], &[Tag::Html])];
    let result = input_validation::run_sql_injection(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.indicator, "sql_error_string");
    assert_eq!(finding.param.as_deref(), Some("q"));
    assert_eq!(finding.payload.as_deref(), Some("' UNION SELECT NULL--"));
    // Payload one misses, payload two fires, payload three never leaves.
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

async fn echo(Query(params): Query<Vec<(String, String)>>) -> Html<String> {
    let value = params
        .iter()
        .rev()
        .find(|(name, _)| name == "q")
        .map(|(_, value)| value.clone())
        .unwrap_or_default();
    Html(format!("<html><body>{value}</body></html>"))
}

#[tokio::test]
async fn reflected_payload_fails_the_xss_control() {
    let app = Router::new().route("/echo", get(echo));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/echo?q=hi"), &["q"], &[Tag::Html])];
    let result = input_validation::run_xss(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].indicator, "unescaped_reflection");
    assert!(result.findings[0]
        .payload
        .as_deref()
        .is_some_and(|payload| payload.contains("<script>")));
}

#[tokio::test]
async fn wildcard_cors_origin_fails_the_policy_control() {
    let app = Router::new().route(
        "/api/data",
        get(|| async { ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], "{}") }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/api/data"), &[], &[Tag::Api, Tag::Json])];
    let result = api_security::run_cors_policy(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings[0].indicator, "permissive_cors_origin");
    assert_eq!(result.findings[0].payload.as_deref(), Some("*"));
}

#[tokio::test]
async fn session_cookie_without_flags_fails_cookie_security() {
    let app = Router::new().route(
        "/login",
        get(|| async {
            (
                AppendHeaders([
                    (header::SET_COOKIE, "theme=dark; Path=/"),
                    (header::SET_COOKIE, "sessionid=abc123; Path=/"),
                ]),
                Html("<p>welcome</p>"),
            )
                .into_response()
        }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/login"), &[], &[Tag::Html])];
    let result = session::run_cookie_security(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings[0].indicator, "session_cookie_missing_flags");
    assert_eq!(result.findings[0].param.as_deref(), Some("sessionid"));
}

#[tokio::test]
async fn hardened_session_cookie_passes_cookie_security() {
    let app = Router::new().route(
        "/login",
        get(|| async {
            (
                AppendHeaders([(
                    header::SET_COOKIE,
                    "sessionid=abc123; Path=/; HttpOnly; Secure",
                )]),
                Html("<p>welcome</p>"),
            )
                .into_response()
        }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/login"), &[], &[Tag::Html])];
    let result = session::run_cookie_security(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::Pass);
}

#[tokio::test]
async fn cookieless_target_is_not_tested_for_cookie_security() {
    let app = Router::new().route("/", get(|| async { Html("<p>plain</p>") }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/"), &[], &[Tag::Html])];
    let result = session::run_cookie_security(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::NotTested);
}

#[tokio::test]
async fn endpoint_answering_every_method_fails_method_security() {
    let app = Router::new().route("/api/things", any(|| async { "ok" }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/api/things"), &[], &[Tag::Api])];
    let result = api_security::run_method_security(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].indicator, "dangerous_method_trace_allowed");
}

#[tokio::test]
async fn get_only_endpoint_passes_method_security() {
    let app = Router::new().route("/api/things", get(|| async { "ok" }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/api/things"), &[], &[Tag::Api])];
    let result = api_security::run_method_security(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::Pass);
}

#[tokio::test]
async fn unthrottled_endpoint_fails_rate_limiting() {
    let app = Router::new().route("/api/data", get(|| async { "{}" }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/api/data"), &[], &[Tag::Api])];
    let result = api_security::run_rate_limiting(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings[0].indicator, "no_rate_limiting_detected");
}

#[tokio::test]
async fn form_accepting_mismatched_types_fails_client_validation() {
    let app = Router::new().route("/signup", axum::routing::post(|| async { "thanks" }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![form_endpoint(
        &format!("{base}/signup"),
        &[("email", "email"), ("age", "number")],
    )];
    let result = input_validation::run_client_validation(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings[0].indicator, "client_side_bypass");
}

#[tokio::test]
async fn form_rejecting_mismatched_types_passes_client_validation() {
    let app = Router::new().route(
        "/signup",
        axum::routing::post(|| async { "Invalid value supplied" }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![form_endpoint(&format!("{base}/signup"), &[("email", "email")])];
    let result = input_validation::run_client_validation(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::Pass);
}

#[tokio::test]
async fn leaked_file_content_fails_xml_validation() {
    let app = Router::new().route(
        "/feed",
        axum::routing::post(|| async { "root:x:0:0:root:/root:/bin/bash" }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/feed"), &[], &[Tag::Xml])];
    let result = input_validation::run_xml_validation(&eps, &fetcher).await;

    assert_eq!(result.status, ControlStatus::Fail);
    assert_eq!(result.findings[0].indicator, "possible_xxe");
}

#[tokio::test]
async fn rejected_entity_probe_passes_xml_validation() {
    let app = Router::new().route("/feed", axum::routing::post(|| async { "<rejected/>" }));
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/feed"), &[], &[Tag::Xml])];
    let result = input_validation::run_xml_validation(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::Pass);
}

#[tokio::test]
async fn rate_limit_header_passes_rate_limiting() {
    let app = Router::new().route(
        "/api/data",
        get(|| async { ([("x-ratelimit-limit", "100")], "{}") }),
    );
    let base = common::serve(app).await;
    let fetcher = PageFetcher::new(5).unwrap();

    let eps = vec![endpoint(&format!("{base}/api/data"), &[], &[Tag::Api])];
    let result = api_security::run_rate_limiting(&eps, &fetcher).await;
    assert_eq!(result.status, ControlStatus::Pass);
}
