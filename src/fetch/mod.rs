//! Page download and readable-text extraction for search hits.

mod converter;
mod extractor;
mod guard;

use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

pub use converter::ExtractedPage;
pub(crate) use guard::{DnsResolver, TokioDnsResolver, redirect_policy};

const MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,

    #[error("{0}")]
    Timeout(String),
}

/// Turns a URL into readable page text.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<ExtractedPage, FetchError>;
}

/// Fetcher over the shared HTTP client with a per-page deadline.
pub struct HttpFetcher {
    http: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ExtractedPage, FetchError> {
        tokio::time::timeout(self.timeout, fetch_page(&self.http, url, &TokioDnsResolver))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout(format!(
                    "page fetch timed out after {}s",
                    self.timeout.as_secs()
                )))
            })
    }
}

pub(crate) async fn fetch_page(
    client: &Client,
    url: &str,
    resolver: &impl DnsResolver,
) -> Result<ExtractedPage, FetchError> {
    guard::check_url(url, resolver).await?;

    let (final_url, html) = download(client, url).await?;

    // Hops are checked by the client's redirect policy; the final name still needs resolving.
    if final_url != url {
        guard::check_url(&final_url, resolver).await?;
    }

    let article = extractor::extract_article(&html, &final_url);
    debug!(url = %guard::redact(&final_url), bytes = html.len(), "page fetched");
    Ok(converter::to_page(article, final_url))
}

async fn download(client: &Client, url: &str) -> Result<(String, String), FetchError> {
    let mut response = client
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    if let Some(ct) = &content_type
        && !is_textual(ct)
    {
        return Err(FetchError::UnsupportedContentType(ct.clone()));
    }

    if response
        .content_length()
        .is_some_and(|len| len as usize > MAX_RESPONSE_BYTES)
    {
        return Err(FetchError::TooLarge);
    }

    let final_url = response.url().to_string();

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    let charset = content_type.as_deref().and_then(charset_label);
    Ok((final_url, decode(&body, charset)))
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.is_empty()
        || mime == "text/html"
        || mime == "text/plain"
        || mime == "application/xhtml+xml"
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("charset="))
        .map(|label| label.trim_matches('"'))
        .next()
}

/// Decodes with the declared charset, honoring a BOM, defaulting to UTF-8.
fn decode(body: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}
