use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{SearchClient, SearchError, SearchHit, SearchProvider};
use crate::settings::SearchSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: SearchProvider,
    pub reason: String,
}

#[derive(Debug)]
pub struct SearchOutcome {
    /// Provider that produced `hits`; `None` means every attempt failed.
    pub provider: Option<SearchProvider>,
    pub hits: Vec<SearchHit>,
    pub failures: Vec<ProviderFailure>,
}

impl SearchOutcome {
    pub fn is_offline(&self) -> bool {
        self.provider.is_none()
    }
}

/// Tries the configured provider, then the other one exactly once.
///
/// A provider counts as failed on any error, on an empty result set, or when no
/// client for it is configured. Never retries the same provider.
pub async fn search_with_fallback<C: SearchClient>(
    clients: &[C],
    query: &str,
    settings: &SearchSettings,
) -> SearchOutcome {
    let mut failures = Vec::new();

    for provider in [settings.search_api, settings.search_api.other()] {
        let Some(client) = clients.iter().find(|c| c.provider() == provider) else {
            failures.push(ProviderFailure {
                provider,
                reason: SearchError::NotConfigured { provider }.to_string(),
            });
            continue;
        };

        let err = match client.search(query, settings).await {
            Ok(hits) if !hits.is_empty() => {
                info!(%provider, results = hits.len(), "search succeeded");
                return SearchOutcome {
                    provider: Some(provider),
                    hits,
                    failures,
                };
            }
            Ok(_) => SearchError::NoResults,
            Err(e) => e,
        };

        warn!(%provider, error = %err, "search provider failed");
        failures.push(ProviderFailure {
            provider,
            reason: err.to_string(),
        });
    }

    warn!("all search providers failed, degrading to offline mode");
    SearchOutcome {
        provider: None,
        hits: Vec::new(),
        failures,
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted provider that records every query it receives.
    pub(crate) struct MockSearch {
        provider: SearchProvider,
        responses: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl MockSearch {
        pub(crate) fn returning(provider: SearchProvider, hits: Vec<SearchHit>) -> Self {
            Self::scripted(provider, vec![Ok(hits)])
        }

        pub(crate) fn failing(provider: SearchProvider, error: SearchError) -> Self {
            Self::scripted(provider, vec![Err(error)])
        }

        pub(crate) fn scripted(
            provider: SearchProvider,
            responses: Vec<Result<Vec<SearchHit>, SearchError>>,
        ) -> Self {
            Self {
                provider,
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    impl SearchClient for MockSearch {
        fn provider(&self) -> SearchProvider {
            self.provider
        }

        async fn search(
            &self,
            query: &str,
            _settings: &SearchSettings,
        ) -> Result<Vec<SearchHit>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(SearchError::RateLimited))
        }
    }

    pub(crate) fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit {
            title: title.into(),
            url: url.into(),
            snippet: format!("snippet for {title}"),
            position: 1,
            published: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockSearch, hit};
    use super::*;

    fn tavily_first() -> SearchSettings {
        SearchSettings {
            search_api: SearchProvider::Tavily,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let clients = [
            MockSearch::returning(SearchProvider::Tavily, vec![hit("https://a.com", "A")]),
            MockSearch::returning(SearchProvider::Serper, vec![hit("https://b.com", "B")]),
        ];

        let outcome = search_with_fallback(&clients, "q", &tavily_first()).await;

        assert_eq!(outcome.provider, Some(SearchProvider::Tavily));
        assert_eq!(outcome.hits[0].url, "https://a.com");
        assert!(outcome.failures.is_empty());
        assert_eq!(clients[0].calls(), 1);
        assert_eq!(clients[1].calls(), 0);
    }

    #[tokio::test]
    async fn primary_failure_tries_secondary_exactly_once() {
        let clients = [
            MockSearch::failing(SearchProvider::Tavily, SearchError::RateLimited),
            MockSearch::returning(SearchProvider::Serper, vec![hit("https://b.com", "B")]),
        ];

        let outcome = search_with_fallback(&clients, "q", &tavily_first()).await;

        assert_eq!(outcome.provider, Some(SearchProvider::Serper));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, SearchProvider::Tavily);
        assert_eq!(clients[0].calls(), 1);
        assert_eq!(clients[1].calls(), 1);
    }

    #[tokio::test]
    async fn empty_primary_result_counts_as_failure() {
        let clients = [
            MockSearch::returning(SearchProvider::Serper, vec![]),
            MockSearch::returning(SearchProvider::Tavily, vec![hit("https://t.com", "T")]),
        ];

        let outcome = search_with_fallback(&clients, "q", &SearchSettings::default()).await;

        assert_eq!(outcome.provider, Some(SearchProvider::Tavily));
        assert!(outcome.failures[0].reason.contains("No results"));
    }

    #[tokio::test]
    async fn both_failing_degrades_to_offline() {
        let clients = [
            MockSearch::failing(SearchProvider::Serper, SearchError::Timeout),
            MockSearch::failing(SearchProvider::Tavily, SearchError::RateLimited),
        ];

        let outcome = search_with_fallback(&clients, "q", &SearchSettings::default()).await;

        assert!(outcome.is_offline());
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(clients[0].calls(), 1);
        assert_eq!(clients[1].calls(), 1);
    }

    #[tokio::test]
    async fn unconfigured_primary_falls_through_to_secondary() {
        let clients = [MockSearch::returning(
            SearchProvider::Serper,
            vec![hit("https://s.com", "S")],
        )];

        let outcome = search_with_fallback(&clients, "q", &tavily_first()).await;

        assert_eq!(outcome.provider, Some(SearchProvider::Serper));
        assert!(outcome.failures[0].reason.contains("TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn no_clients_is_offline() {
        let clients: [MockSearch; 0] = [];
        let outcome = search_with_fallback(&clients, "q", &SearchSettings::default()).await;
        assert!(outcome.is_offline());
        assert_eq!(outcome.failures.len(), 2);
    }
}
