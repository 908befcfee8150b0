//! HTTP fetch engine

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::types::{FetchRequest, RequestMethod};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// A completed HTTP exchange with a success status
#[derive(Clone, Debug)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Body decoded as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes fetch requests
///
/// Non-success statuses are reported as [`Error::HttpStatus`] so callers can
/// classify them for retry.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Perform one request and return the full response
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// [`HttpFetcher`] backed by a shared reqwest client
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client with the configured timeout and user agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn build(&self, request: &FetchRequest) -> Result<reqwest::RequestBuilder> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Other(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Other(format!("invalid header value {:?}: {}", value, e)))?;
            headers.append(name, value);
        }

        let builder = match request.method {
            RequestMethod::Get => self.client.get(&request.url),
            RequestMethod::Post => self.client.post(&request.url),
        }
        .headers(headers);

        Ok(match &request.form {
            Some(form) => builder.form(form),
            None => builder,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        tracing::debug!(request = %request.summary(), "Fetching");

        let response = self.build(request)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(FetchResponse {
            url,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
