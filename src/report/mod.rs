//! The structured research result and everything that fills or renders it.

pub mod analysis;
pub mod prompt;
pub mod render;
pub mod source;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::search::dispatch::ProviderFailure;
use crate::settings::SearchSettings;
pub use source::SourceKind;

/// Score at or above which a source counts as reliable in summaries.
pub const RELIABLE_SCORE: u8 = 80;

/// One research run's output. Every section is always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub executive_summary: ExecutiveSummary,
    pub detailed_findings: DetailedFindings,
    pub context: Context,
    pub recommendations: Recommendations,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub overview: String,
    pub key_themes: Vec<String>,
    pub highlights: Vec<String>,
    pub conclusions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedFindings {
    pub themes: Vec<Theme>,
    pub opposing_views: Vec<String>,
    pub patterns: Vec<String>,
    pub sources: Vec<SourceFinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub evidence: Vec<String>,
}

/// A source as it appears in the findings: excerpt plus credibility notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFinding {
    pub position: u32,
    pub title: String,
    pub url: String,
    pub kind: SourceKind,
    pub excerpt: String,
    /// Excerpt came from the fetched page rather than the provider snippet.
    pub from_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    pub credibility_score: Option<u8>,
    pub credibility_note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    #[serde(deserialize_with = "null_as_default")]
    pub historical: String,
    #[serde(deserialize_with = "null_as_default")]
    pub current: String,
    #[serde(deserialize_with = "null_as_default")]
    pub future: String,
    #[serde(deserialize_with = "null_as_default")]
    pub impacts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendations {
    #[serde(deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub research_gaps: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub risks: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub strategy: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Live,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Ai,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFetch {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub query: String,
    pub settings: SearchSettings,
    pub timestamp: DateTime<Utc>,
    pub apis_used: Vec<String>,
    pub search_mode: SearchMode,
    pub analysis_mode: AnalysisMode,
    pub notices: Vec<String>,
    pub provider_failures: Vec<ProviderFailure>,
    pub failed_fetches: Vec<FailedFetch>,
}

impl ResearchResult {
    pub fn sources(&self) -> &[SourceFinding] {
        &self.detailed_findings.sources
    }

    /// Mean credibility over the sources that were scored.
    pub fn average_credibility(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .sources()
            .iter()
            .filter_map(|s| s.credibility_score)
            .map(f64::from)
            .collect();
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn reliable_sources(&self) -> usize {
        self.sources()
            .iter()
            .filter(|s| s.credibility_score.is_some_and(|c| c >= RELIABLE_SCORE))
            .count()
    }
}

/// Reads an explicit JSON `null` as the field's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use super::fixtures::{finding, result_with};

    #[test]
    fn average_ignores_unscored_sources() {
        let result = result_with(vec![
            finding("https://a.com", "A", Some(90)),
            finding("https://b.com", "B", Some(70)),
            finding("https://c.com", "C", None),
        ]);
        assert_eq!(result.average_credibility(), Some(80.0));
        assert_eq!(result.reliable_sources(), 1);
    }

    #[test]
    fn average_is_none_without_scores() {
        let result = result_with(vec![finding("https://a.com", "A", None)]);
        assert_eq!(result.average_credibility(), None);
        assert_eq!(result.reliable_sources(), 0);
    }

    #[test]
    fn serializes_modes_lowercase() {
        let json = serde_json::to_value(result_with(vec![])).unwrap();
        assert_eq!(json["metadata"]["search_mode"], "live");
        assert_eq!(json["metadata"]["analysis_mode"], "ai");
        assert_eq!(json["metadata"]["settings"]["time_range"], "month");
    }
}
