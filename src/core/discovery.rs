// src/core/discovery.rs

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use color_eyre::eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::fetcher::{FetchedPage, PageFetcher};
use crate::core::models::{Endpoint, FormDescriptor, FormInput, Tag};

/// Candidate paths probed during the optional wordlist phase.
pub const DEFAULT_WORDLIST: &[&str] = &[
    "admin",
    "api",
    "backup",
    "config",
    "login",
    "portal",
    "robots.txt",
    "sitemap.xml",
    "static",
    "uploads",
];

/// Leading bytes of an HTML body kept on the endpoint for passive checks.
const SNIPPET_LEN: usize = 200;

// URL patterns that mark an endpoint as a potentially sensitive file.
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\.env", r"\.git", r"backup", r"db\.sql", r"config"]
        .iter()
        .filter_map(|pattern| Regex::new(&format!("(?i){pattern}")).ok())
        .collect()
});

/// Returns true when the URL matches the fixed sensitive-file pattern set.
pub fn is_sensitive(url: &str) -> bool {
    SENSITIVE_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Strategy deciding which classification tags a fetched page receives.
///
/// The six near-identical per-module crawlers of earlier versions collapse
/// into one engine parameterized by this trait; the engine itself adds the
/// `param` tag for URLs carrying query parameters.
pub trait PageClassifier: Send + Sync {
    fn classify(&self, url: &Url, content_type: &str) -> BTreeSet<Tag>;
}

/// Content-type and path heuristics shared by every module.
#[derive(Debug, Default)]
pub struct DefaultClassifier;

impl PageClassifier for DefaultClassifier {
    fn classify(&self, url: &Url, content_type: &str) -> BTreeSet<Tag> {
        let mut tags = BTreeSet::new();
        let ctype = content_type.to_ascii_lowercase();
        let path = url.path().to_ascii_lowercase();

        if ctype.contains("application/json") || ctype.contains("/json") || path.contains("/api/") {
            tags.insert(Tag::Json);
        }
        if path.contains("/api/") {
            tags.insert(Tag::Api);
        }
        if ctype.contains("xml") || path.ends_with(".xml") {
            tags.insert(Tag::Xml);
        }
        if ctype.contains("text/html") || ctype.is_empty() {
            tags.insert(Tag::Html);
        }
        tags
    }
}

/// Default heuristics plus broader API-surface hints, used by the API
/// security module so that token/version style paths join its candidate set.
#[derive(Debug, Default)]
pub struct ApiSurfaceClassifier {
    inner: DefaultClassifier,
}

impl PageClassifier for ApiSurfaceClassifier {
    fn classify(&self, url: &Url, content_type: &str) -> BTreeSet<Tag> {
        let mut tags = self.inner.classify(url, content_type);
        let path = url.path().to_ascii_lowercase();
        if ["/auth", "/token", "/v1/", "/v2/", "/graphql"]
            .iter()
            .any(|hint| path.contains(hint))
        {
            tags.insert(Tag::Api);
        }
        tags
    }
}

/// Output of one crawl: the endpoint inventory plus derived views.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub base_url: String,
    pub endpoints: Vec<Endpoint>,
    pub sensitive_files: Vec<Endpoint>,
    pub classifications: BTreeMap<String, usize>,
}

/// Breadth-first, same-authority site crawler.
///
/// Termination is guaranteed by the visited set (no URL is fetched twice),
/// the depth bound, and the endpoint cap. A failed fetch drops that page
/// and nothing else; the crawl itself never aborts.
pub struct DiscoveryEngine {
    max_depth: usize,
    max_endpoints: usize,
    wordlist_enabled: bool,
    classifier: Box<dyn PageClassifier>,
}

impl DiscoveryEngine {
    pub fn new(
        max_depth: usize,
        max_endpoints: usize,
        wordlist_enabled: bool,
        classifier: Box<dyn PageClassifier>,
    ) -> Self {
        Self {
            max_depth,
            max_endpoints,
            wordlist_enabled,
            classifier,
        }
    }

    pub async fn crawl(&self, fetcher: &PageFetcher, base_url: &str) -> Result<DiscoveryReport> {
        let base = Url::parse(base_url).wrap_err_with(|| format!("invalid base url {base_url}"))?;
        info!(base = %base, max_depth = self.max_depth, max_endpoints = self.max_endpoints, "starting discovery crawl");

        let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(base.clone(), 0)]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut endpoints: Vec<Endpoint> = Vec::new();
        let mut sensitive_files: Vec<Endpoint> = Vec::new();
        let mut classifications = empty_classifications();

        while let Some((url, depth)) = queue.pop_front() {
            if endpoints.len() >= self.max_endpoints {
                break;
            }
            if visited.contains(url.as_str()) || depth > self.max_depth {
                continue;
            }
            visited.insert(url.as_str().to_string());

            let page = match fetcher.get(url.as_str()).await {
                Ok(page) => page,
                Err(error) => {
                    // Single-page failure: drop it and keep crawling.
                    debug!(url = %url, error = %error, "fetch failed, dropping page");
                    continue;
                }
            };

            let entry = self.build_endpoint(&url, depth, &page);
            let is_html = entry.has_tag(Tag::Html);
            tally(&mut classifications, &entry);
            if entry.sensitive {
                sensitive_files.push(entry.clone());
            }
            endpoints.push(entry);

            if is_html {
                for link in extract_links(&page.body, &url, &base) {
                    if !visited.contains(link.as_str()) {
                        queue.push_back((link, depth + 1));
                    }
                }
                for form_entry in extract_forms(&page.body, &url, &base, depth) {
                    if endpoints.len() >= self.max_endpoints {
                        break;
                    }
                    tally(&mut classifications, &form_entry);
                    if form_entry.sensitive {
                        sensitive_files.push(form_entry.clone());
                    }
                    endpoints.push(form_entry);
                }
            }
        }

        if self.wordlist_enabled && endpoints.len() < self.max_endpoints {
            self.wordlist_phase(
                fetcher,
                &base,
                &visited,
                &mut endpoints,
                &mut sensitive_files,
                &mut classifications,
            )
            .await;
        }

        endpoints.truncate(self.max_endpoints);
        info!(
            endpoints = endpoints.len(),
            sensitive = sensitive_files.len(),
            "discovery crawl finished"
        );
        Ok(DiscoveryReport {
            base_url: base.to_string(),
            endpoints,
            sensitive_files,
            classifications,
        })
    }

    fn build_endpoint(&self, url: &Url, depth: usize, page: &FetchedPage) -> Endpoint {
        let mut tags = self.classifier.classify(url, &page.content_type);
        let mut params: Vec<String> = Vec::new();
        for (name, _) in url.query_pairs() {
            if !params.iter().any(|existing| existing == name.as_ref()) {
                params.push(name.to_string());
            }
        }
        if !params.is_empty() {
            tags.insert(Tag::Param);
        }
        let snippet = if tags.contains(&Tag::Html) {
            page.body.chars().take(SNIPPET_LEN).collect()
        } else {
            String::new()
        };

        Endpoint {
            url: url.to_string(),
            method: "GET".to_string(),
            depth,
            status: page.status,
            content_type: page.content_type.clone(),
            params,
            tags,
            form: None,
            sensitive: is_sensitive(url.as_str()),
            snippet,
        }
    }

    /// HEAD-probes the fixed candidate list against the base URL, adding
    /// every candidate that answers with a status below 400.
    async fn wordlist_phase(
        &self,
        fetcher: &PageFetcher,
        base: &Url,
        visited: &HashSet<String>,
        endpoints: &mut Vec<Endpoint>,
        sensitive_files: &mut Vec<Endpoint>,
        classifications: &mut BTreeMap<String, usize>,
    ) {
        debug!(candidates = DEFAULT_WORDLIST.len(), "starting wordlist phase");
        for word in DEFAULT_WORDLIST {
            if endpoints.len() >= self.max_endpoints {
                break;
            }
            let candidate = format!("{}/{}", base.as_str().trim_end_matches('/'), word);
            if visited.contains(candidate.as_str()) {
                continue;
            }
            let page = match fetcher.head(&candidate).await {
                Ok(page) => page,
                Err(error) => {
                    debug!(url = %candidate, error = %error, "wordlist probe failed");
                    continue;
                }
            };
            if page.status >= 400 {
                continue;
            }
            let entry = Endpoint {
                url: candidate.clone(),
                method: "HEAD".to_string(),
                depth: 1,
                status: page.status,
                content_type: page.content_type.clone(),
                params: Vec::new(),
                tags: BTreeSet::new(),
                form: None,
                sensitive: is_sensitive(&candidate),
                snippet: String::new(),
            };
            debug!(url = %candidate, status = page.status, "wordlist hit");
            tally(classifications, &entry);
            if entry.sensitive {
                sensitive_files.push(entry.clone());
            }
            endpoints.push(entry);
        }
    }
}

fn empty_classifications() -> BTreeMap<String, usize> {
    Tag::iter().map(|tag| (tag.to_string(), 0)).collect()
}

fn tally(classifications: &mut BTreeMap<String, usize>, entry: &Endpoint) {
    for tag in &entry.tags {
        *classifications.entry(tag.to_string()).or_insert(0) += 1;
    }
}

/// Collects same-authority links from anchors, stylesheets, scripts, images
/// and form actions. Fragments are stripped so `#section` anchors do not
/// inflate the queue.
fn extract_links(html: &str, current: &Url, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    let mut collect = |selector: &str, attr: &str| {
        if let Ok(selector) = Selector::parse(selector) {
            for element in document.select(&selector) {
                let Some(raw) = element.value().attr(attr) else {
                    continue;
                };
                let Ok(mut url) = current.join(raw) else {
                    continue;
                };
                url.set_fragment(None);
                if same_authority(&url, base) {
                    links.push(url);
                }
            }
        }
    };

    collect("a[href]", "href");
    collect("link[href]", "href");
    collect("script[src]", "src");
    collect("img[src]", "src");
    collect("form[action]", "action");
    links
}

/// Extracts every `<form>` on the page as a separate endpoint entry carrying
/// the form's method, input descriptors and file-input flag.
fn extract_forms(html: &str, current: &Url, base: &Url, depth: usize) -> Vec<Endpoint> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    let Ok(form_selector) = Selector::parse("form") else {
        return entries;
    };
    let Ok(input_selector) = Selector::parse("input, textarea, select") else {
        return entries;
    };

    for form in document.select(&form_selector) {
        let action = form.value().attr("action").unwrap_or("");
        let target = if action.is_empty() {
            current.clone()
        } else {
            match current.join(action) {
                Ok(url) => url,
                Err(error) => {
                    warn!(action, error = %error, "unparseable form action");
                    continue;
                }
            }
        };
        if !same_authority(&target, base) {
            continue;
        }

        let method = form
            .value()
            .attr("method")
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let mut inputs = Vec::new();
        let mut params = Vec::new();
        let mut has_file_input = false;
        for field in form.select(&input_selector) {
            let name = field.value().attr("name").map(str::to_string);
            let kind = field
                .value()
                .attr("type")
                .unwrap_or("text")
                .to_ascii_lowercase();
            if kind == "file" {
                has_file_input = true;
            }
            if let Some(name) = &name {
                params.push(name.clone());
            }
            inputs.push(FormInput {
                name,
                kind,
                required: field.value().attr("required").is_some(),
                placeholder: field.value().attr("placeholder").map(str::to_string),
            });
        }

        let mut tags = BTreeSet::from([Tag::Html]);
        if !params.is_empty() {
            tags.insert(Tag::Param);
        }
        if has_file_input {
            tags.insert(Tag::Upload);
        }

        entries.push(Endpoint {
            url: target.to_string(),
            method,
            depth,
            status: 200,
            content_type: String::new(),
            params,
            tags,
            form: Some(FormDescriptor {
                inputs,
                has_file_input,
            }),
            sensitive: is_sensitive(target.as_str()),
            snippet: String::new(),
        });
    }
    entries
}

/// Same-authority policy: scheme, host and port must all match the base.
fn same_authority(url: &Url, base: &Url) -> bool {
    url.scheme() == base.scheme()
        && url.host_str() == base.host_str()
        && url.port_or_known_default() == base.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn sensitive_patterns_match_known_files() {
        assert!(is_sensitive("http://t.example/.env"));
        assert!(is_sensitive("http://t.example/backup.zip"));
        assert!(is_sensitive("http://t.example/db.sql"));
        assert!(is_sensitive("http://t.example/CONFIG/app.ini"));
        assert!(!is_sensitive("http://t.example/index.html"));
    }

    #[test]
    fn default_classifier_tags_json_api_and_xml() {
        let classifier = DefaultClassifier;
        let tags = classifier.classify(&url("http://t.example/api/users"), "application/json");
        assert!(tags.contains(&Tag::Json));
        assert!(tags.contains(&Tag::Api));

        let tags = classifier.classify(&url("http://t.example/feed.xml"), "application/xml");
        assert!(tags.contains(&Tag::Xml));
        assert!(!tags.contains(&Tag::Html));

        let tags = classifier.classify(&url("http://t.example/"), "");
        assert!(tags.contains(&Tag::Html));
    }

    #[test]
    fn api_surface_classifier_adds_token_paths() {
        let classifier = ApiSurfaceClassifier::default();
        let tags = classifier.classify(&url("http://t.example/auth/token"), "text/html");
        assert!(tags.contains(&Tag::Api));
    }

    #[test]
    fn links_stay_on_the_base_authority() {
        let base = url("http://t.example/");
        let html = r##"
            <a href="/admin">Admin</a>
            <a href="http://elsewhere.example/x">Away</a>
            <a href="http://t.example:81/other-port">Other port</a>
            <a href="/page#section">Fragment</a>
            <script src="/app.js"></script>
        "##;
        let links = extract_links(html, &base, &base);
        let as_strings: Vec<String> = links.iter().map(Url::to_string).collect();
        assert!(as_strings.contains(&"http://t.example/admin".to_string()));
        assert!(as_strings.contains(&"http://t.example/app.js".to_string()));
        assert!(as_strings.contains(&"http://t.example/page".to_string()));
        assert!(!as_strings.iter().any(|link| link.contains("elsewhere")));
        assert!(!as_strings.iter().any(|link| link.contains(":81")));
    }

    #[test]
    fn forms_become_separate_endpoints() {
        let base = url("http://t.example/");
        let html = r#"
            <form action="/upload" method="post">
                <input type="file" name="doc">
                <input type="text" name="title" required>
            </form>
        "#;
        let entries = extract_forms(html, &base, &base, 1);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.url, "http://t.example/upload");
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.params, vec!["doc".to_string(), "title".to_string()]);
        assert!(entry.has_tag(Tag::Upload));
        let form = entry.form.as_ref().unwrap();
        assert!(form.has_file_input);
        assert_eq!(form.inputs.len(), 2);
        assert!(form.inputs[1].required);
    }

    #[test]
    fn form_without_action_posts_back_to_the_page() {
        let base = url("http://t.example/contact");
        let html = r#"<form method="POST"><input name="msg"></form>"#;
        let entries = extract_forms(html, &base, &base, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "http://t.example/contact");
    }
}
