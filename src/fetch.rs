//! Remote document fetching and the scrape pipeline.
//!
//! [`scrape`] downloads a URL through a [`Fetcher`], classifies the payload
//! from its `Content-Type` and URL, and runs the matching extractor. Any
//! failure along the way becomes a readable failure document; callers never
//! see an error. Scraping never touches the dataset store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};

use crate::classify::classify;
use crate::config::FetchConfig;
use crate::extract;
use crate::models::Extracted;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("response exceeds {0} bytes")]
    TooLarge(usize),
}

/// A downloaded resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// Raw `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
}

/// Source of remote bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// [`Fetcher`] over `reqwest`, with the configured timeout, user agent and
/// body cap. Redirects are followed.
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn from_config(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_bytes: config.max_bytes,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.map_err(e))?;

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_err(e))? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }
}

/// Fetches `url` and extracts it. Always returns a document: fetch and
/// extraction failures are reported in its title and body.
pub async fn scrape(fetcher: &dyn Fetcher, url: &str) -> Extracted {
    let resource = match fetcher.fetch(url).await {
        Ok(resource) => resource,
        Err(e) => {
            tracing::warn!(url, error = %e, "fetch failed");
            return failure_document(url, &e);
        }
    };

    let format = classify(resource.content_type.as_deref(), Some(url));
    tracing::debug!(
        url,
        %format,
        content_type = resource.content_type.as_deref().unwrap_or("-"),
        bytes = resource.bytes.len(),
        "classified remote document"
    );

    // Parsing large PDFs or workbooks is CPU-bound.
    let bytes = resource.bytes;
    match tokio::task::spawn_blocking(move || extract::extract(format, &bytes)).await {
        Ok(doc) => {
            tracing::info!(url, title = %doc.title, chars = doc.text.len(), "scraped");
            doc
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "extraction task failed");
            failure_document(url, &e)
        }
    }
}

/// The document returned in place of a resource that could not be
/// processed.
pub fn failure_document(url: &str, error: &dyn fmt::Display) -> Extracted {
    Extracted::new(
        format!("Processing failed: {}", last_segment(url)),
        format!("Could not process document {}. Error: {}", url, error),
    )
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
fn last_segment(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
