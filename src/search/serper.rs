use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SearchClient, SearchError, SearchHit, SearchProvider, send_json};
use crate::config::ApiKey;
use crate::settings::{SearchSettings, TimeRange};

const ENDPOINT: &str = "https://google.serper.dev";

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    tbs: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    position: Option<u32>,
    date: Option<String>,
}

/// Google results via serper.dev.
#[derive(Clone)]
pub struct SerperClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl SerperClient {
    pub fn new(http: Client, api_key: ApiKey) -> Self {
        Self {
            http,
            api_key,
            base_url: ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key").unwrap(),
            base_url: base_url.to_string(),
        }
    }
}

fn time_filter(range: TimeRange) -> Option<&'static str> {
    match range {
        TimeRange::Day => Some("qdr:d"),
        TimeRange::Week => Some("qdr:w"),
        TimeRange::Month => Some("qdr:m"),
        TimeRange::Year => Some("qdr:y"),
        TimeRange::All => None,
    }
}

impl SearchClient for SerperClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Serper
    }

    async fn search(
        &self,
        query: &str,
        settings: &SearchSettings,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let body = SerperRequest {
            q: query,
            num: settings.max_results,
            tbs: time_filter(settings.time_range),
        };

        let request = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", self.api_key.expose())
            .json(&body);

        let response: SerperResponse = send_json(SearchProvider::Serper, request).await?;

        let hits: Vec<SearchHit> = response
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(usize::from(settings.max_results))
            .enumerate()
            .map(|(i, r)| SearchHit {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
                position: r.position.unwrap_or(i as u32 + 1),
                published: r.date,
            })
            .collect();

        debug!(results = hits.len(), "serper search complete");
        Ok(hits)
    }
}
