//! Reachability checks for the configured services.

use std::fmt;

use tracing::debug;

use crate::gemini::{GeminiClient, GeminiError};
use crate::search::{SearchClient, SearchError, SearchProvider};
use crate::settings::SearchSettings;

const PROBE_QUERY: &str = "status check";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Online(String),
    /// Reachable but not returning results.
    Limited(String),
    Offline(String),
    NotConfigured(String),
}

impl Health {
    fn label(&self) -> &'static str {
        match self {
            Health::Online(_) => "online",
            Health::Limited(_) => "limited",
            Health::Offline(_) => "offline",
            Health::NotConfigured(_) => "not configured",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Health::Online(d)
            | Health::Limited(d)
            | Health::Offline(d)
            | Health::NotConfigured(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service: String,
    pub health: Health,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} {:<15} {}",
            self.service,
            self.health.label(),
            self.health.detail()
        )
    }
}

/// Sends a one-result query through every search provider, configured or not.
pub async fn probe_search<C: SearchClient>(clients: &[C]) -> Vec<ServiceStatus> {
    let settings = SearchSettings {
        max_results: 1,
        depth: 1,
        ..Default::default()
    };

    let mut statuses = Vec::new();
    for provider in [SearchProvider::Serper, SearchProvider::Tavily] {
        let health = match clients.iter().find(|c| c.provider() == provider) {
            None => Health::NotConfigured(format!("{} not set", provider.env_var())),
            Some(client) => match client.search(PROBE_QUERY, &settings).await {
                Ok(hits) if hits.is_empty() => Health::Limited("reachable, no results".into()),
                Ok(_) => Health::Online("connected".into()),
                Err(e @ (SearchError::RateLimited | SearchError::QuotaExhausted(_))) => {
                    Health::Limited(e.to_string())
                }
                Err(e) => Health::Offline(e.to_string()),
            },
        };
        debug!(%provider, ?health, "search probe finished");
        statuses.push(ServiceStatus {
            service: provider.to_string(),
            health,
        });
    }
    statuses
}

/// Looks up the configured model, which also validates the key.
pub async fn probe_gemini(client: Option<&GeminiClient>) -> ServiceStatus {
    let health = match client {
        None => Health::NotConfigured("GEMINI_API_KEY not set, basic analysis only".into()),
        Some(client) => match client.model_info().await {
            Ok(info) => Health::Online(info.display_name.unwrap_or(info.name)),
            Err(e @ (GeminiError::RateLimited | GeminiError::QuotaExhausted(_))) => {
                Health::Limited(e.to_string())
            }
            Err(e) => Health::Offline(e.to_string()),
        },
    };
    debug!(?health, "gemini probe finished");
    ServiceStatus {
        service: "gemini".into(),
        health,
    }
}

pub fn format_status(statuses: &[ServiceStatus]) -> String {
    let mut out = String::from("API status\n");
    for status in statuses {
        out.push_str(&format!("  {status}\n"));
    }

    let search_up = statuses
        .iter()
        .filter(|s| s.service != "gemini")
        .any(|s| matches!(s.health, Health::Online(_) | Health::Limited(_)));
    if !search_up {
        out.push_str("\nNo search provider is reachable; research will run in offline mode.\n");
    }
    out
}
