use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SearchClient, SearchError, SearchHit, SearchProvider, send_json};
use crate::config::ApiKey;
use crate::settings::SearchSettings;

const ENDPOINT: &str = "https://api.tavily.com";
/// Settings depth at which Tavily's slower "advanced" retrieval kicks in.
const ADVANCED_DEPTH: u8 = 3;

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: u8,
    search_depth: &'static str,
    topic: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<&'static str>,
    include_answer: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    published_date: Option<String>,
}

#[derive(Clone)]
pub struct TavilyClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl TavilyClient {
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

fn build_request<'a>(query: &'a str, settings: &SearchSettings) -> TavilyRequest<'a> {
    TavilyRequest {
        query,
        max_results: settings.max_results,
        search_depth: if settings.depth >= ADVANCED_DEPTH {
            "advanced"
        } else {
            "basic"
        },
        topic: if settings.news_only() { "news" } else { "general" },
        time_range: settings.time_range.period(),
        include_answer: false,
        include_images: false,
    }
}

impl SearchClient for TavilyClient {
    fn provider(&self) -> SearchProvider {
        SearchProvider::Tavily
    }

    async fn search(
        &self,
        query: &str,
        settings: &SearchSettings,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&build_request(query, settings));

        let response: TavilyResponse = send_json(SearchProvider::Tavily, request).await?;

        let hits: Vec<SearchHit> = response
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(usize::from(settings.max_results))
            .enumerate()
            .map(|(i, r)| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                position: i as u32 + 1,
                published: r.published_date,
            })
            .collect();

        debug!(results = hits.len(), "tavily search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{SourceType, TimeRange};

    #[test]
    fn shallow_depth_uses_basic_search() {
        let settings = SearchSettings {
            depth: 2,
            ..Default::default()
        };
        assert_eq!(build_request("q", &settings).search_depth, "basic");
    }

    #[test]
    fn deep_search_uses_advanced() {
        let settings = SearchSettings {
            depth: 4,
            ..Default::default()
        };
        assert_eq!(build_request("q", &settings).search_depth, "advanced");
    }

    #[test]
    fn news_only_switches_topic() {
        let settings = SearchSettings {
            sources: vec![SourceType::News],
            ..Default::default()
        };
        assert_eq!(build_request("q", &settings).topic, "news");
        assert_eq!(build_request("q", &SearchSettings::default()).topic, "general");
    }

    #[test]
    fn all_time_omits_time_range() {
        let settings = SearchSettings {
            time_range: TimeRange::All,
            ..Default::default()
        };
        let json = serde_json::to_value(build_request("q", &settings)).unwrap();
        assert!(json.get("time_range").is_none());
    }
}
