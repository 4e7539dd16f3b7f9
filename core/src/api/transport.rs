use std::future::Future;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::session::AccountIdentity;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Seam between the resilient client and the actual HTTP stack. Tests
/// script this; production uses [`ReqwestTransport`].
pub trait HttpTransport: Send + Sync + 'static {
    fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> impl Future<Output = Result<RawResponse, String>> + Send;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client carrying the account identity in its default headers.
    /// `proxy_url` is an opaque outbound routing descriptor; `None` means a
    /// direct connection.
    pub fn new(identity: &AccountIdentity, proxy_url: Option<&str>) -> Result<Self, String> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !identity.cookie.is_empty() {
            let value = HeaderValue::from_str(&identity.cookie)
                .map_err(|e| format!("Invalid session cookie: {}", e))?;
            headers.insert(COOKIE, value);
        }
        if !identity.fingerprint.is_empty() {
            let value = HeaderValue::from_str(&identity.fingerprint)
                .map_err(|e| format!("Invalid fingerprint: {}", e))?;
            headers.insert(HeaderName::from_static("x-fingerprint"), value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT);

        if let Some(url) = proxy_url {
            let proxy =
                reqwest::Proxy::all(url).map_err(|e| format!("Invalid proxy url: {}", e))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse, String> {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(RawResponse { status, body })
    }
}
