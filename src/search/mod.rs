//! Search providers and the primary/secondary fallback dispatch.

pub mod dispatch;
pub mod serper;
pub mod tavily;

use std::fmt;

use clap::ValueEnum;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::settings::SearchSettings;
pub use serper::SerperClient;
pub use tavily::TavilyClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    #[default]
    Serper,
    Tavily,
}

impl SearchProvider {
    pub fn other(self) -> Self {
        match self {
            SearchProvider::Serper => SearchProvider::Tavily,
            SearchProvider::Tavily => SearchProvider::Serper,
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            SearchProvider::Serper => "SERPER_API_KEY",
            SearchProvider::Tavily => "TAVILY_API_KEY",
        }
    }
}

impl fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchProvider::Serper => "serper",
            SearchProvider::Tavily => "tavily",
        })
    }
}

/// One ranked web result, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{provider} is not configured: set {}", provider.env_var())]
    NotConfigured { provider: SearchProvider },

    #[error("The search API is currently unavailable (authentication rejected: {0})")]
    Unauthorized(String),

    #[error("Request limit reached. Please wait a moment before trying again.")]
    RateLimited,

    #[error("Search API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network connection error: request timed out")]
    Timeout,

    #[error("Network connection error: {0}")]
    Network(reqwest::Error),

    #[error("No results found for the query")]
    NoResults,

    #[error("Unexpected search response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::Decode(e.to_string())
        } else {
            SearchError::Network(e)
        }
    }
}

/// Capability shared by every search backend.
pub trait SearchClient {
    fn provider(&self) -> SearchProvider;

    async fn search(
        &self,
        query: &str,
        settings: &SearchSettings,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Production client set; one variant per provider.
#[derive(Clone)]
pub enum ProviderClient {
    Serper(SerperClient),
    Tavily(TavilyClient),
}

impl SearchClient for ProviderClient {
    fn provider(&self) -> SearchProvider {
        match self {
            ProviderClient::Serper(_) => SearchProvider::Serper,
            ProviderClient::Tavily(_) => SearchProvider::Tavily,
        }
    }

    async fn search(
        &self,
        query: &str,
        settings: &SearchSettings,
    ) -> Result<Vec<SearchHit>, SearchError> {
        match self {
            ProviderClient::Serper(c) => c.search(query, settings).await,
            ProviderClient::Tavily(c) => c.search(query, settings).await,
        }
    }
}

/// Sends a prepared provider request and decodes a JSON body, mapping HTTP failures.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: SearchProvider,
    request: RequestBuilder,
) -> Result<T, SearchError> {
    let response = request
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body);
        warn!(%provider, status = %status, error = %err, "search provider error");
        return Err(err);
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| SearchError::Decode(e.to_string()))
}

fn classify_status(status: StatusCode, body: &str) -> SearchError {
    let message = error_message(body).unwrap_or_else(|| {
        let end = body.floor_char_boundary(200);
        format!("HTTP {status}: {}", &body[..end])
    });

    match status.as_u16() {
        401 | 403 => SearchError::Unauthorized(message),
        429 => SearchError::RateLimited,
        402 | 432 | 433 => SearchError::QuotaExhausted(message),
        code => SearchError::Api { code, message },
    }
}

/// Pulls a human-readable message out of a provider's JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = value
        .get("message")
        .or_else(|| value.get("detail").and_then(|d| d.get("error")))
        .or_else(|| value.get("detail"))
        .or_else(|| value.get("error"))?;
    match message {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
