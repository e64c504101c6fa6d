// src/core/fetcher.rs

use std::time::Duration;

use color_eyre::eyre::Result;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use tracing::debug;

/// User agent sent with every request.
pub const USER_AGENT: &str = "GapScan/0.1";

/// Default per-request timeout in seconds. A stalled target only ties up
/// its own worker slot, never the whole pool.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Captured response data, detached from the underlying connection so that
/// checks can inspect status, headers and body freely.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html") || self.content_type.is_empty()
    }

    /// Returns a header value as a string slice, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Single HTTP request layer with a fixed client policy: TLS verification
/// disabled (scan targets routinely use self-signed certificates), bounded
/// timeout, fixed user agent.
///
/// Every worker constructs its own `PageFetcher`; no connection or cookie
/// state is shared across threads.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub async fn get(&self, url: &str) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        Self::capture(response).await
    }

    /// GET with extra query parameters appended to the URL's own query.
    pub async fn get_with_params(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.get(url).query(params).send().await?;
        Self::capture(response).await
    }

    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchedPage, reqwest::Error> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::capture(request.send().await?).await
    }

    /// HEAD probe used by the wordlist phase; the body is left empty.
    pub async fn head(&self, url: &str) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.head(url).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_type = content_type_of(&headers);
        Ok(FetchedPage {
            url: response.url().to_string(),
            status,
            content_type,
            headers,
            body: String::new(),
        })
    }

    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.post(url).form(fields).send().await?;
        Self::capture(response).await
    }

    /// Multipart POST of a single in-memory file.
    pub async fn post_multipart(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<FetchedPage, reqwest::Error> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part(field.to_string(), part);
        let response = self.client.post(url).multipart(form).send().await?;
        Self::capture(response).await
    }

    /// POST of a raw body with an explicit content type, used for XML and
    /// similar non-form probes.
    pub async fn post_raw(
        &self,
        url: &str,
        content_type: &str,
        body: String,
    ) -> Result<FetchedPage, reqwest::Error> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type.to_string())
            .body(body)
            .send()
            .await?;
        Self::capture(response).await
    }

    /// Sends a request with an arbitrary method and empty body.
    pub async fn request(&self, method: Method, url: &str) -> Result<FetchedPage, reqwest::Error> {
        let response = self.client.request(method, url).send().await?;
        Self::capture(response).await
    }

    async fn capture(response: Response) -> Result<FetchedPage, reqwest::Error> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_type = content_type_of(&headers);
        let body = response.text().await?;
        debug!(url = %url, status, bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            url,
            status,
            content_type,
            headers,
            body,
        })
    }
}

fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
