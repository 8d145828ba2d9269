//! Turning model output (or its absence) into the report sections.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::{
    Context, DetailedFindings, ExecutiveSummary, Recommendations, SourceFinding, Theme,
    null_as_default,
};

/// Leads every overview produced without a usable model answer.
pub const ANALYSIS_UNAVAILABLE: &str = "AI analysis unavailable";

const BASIC_THEME_LIMIT: usize = 5;
const HIGHLIGHT_LIMIT: usize = 5;
const HIGHLIGHT_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("model output contains no JSON object")]
    NoJson,

    #[error("model output is not the expected JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model output has an empty overview")]
    MissingOverview,
}

/// The four narrative sections of a result; metadata is added by the caller.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub executive_summary: ExecutiveSummary,
    pub detailed_findings: DetailedFindings,
    pub context: Context,
    pub recommendations: Recommendations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelAnalysis {
    #[serde(deserialize_with = "null_as_default")]
    executive_summary: ModelSummary,
    #[serde(deserialize_with = "null_as_default")]
    detailed_findings: ModelFindings,
    #[serde(deserialize_with = "null_as_default")]
    source_analysis: Vec<SourceAssessment>,
    #[serde(deserialize_with = "null_as_default")]
    context: Context,
    #[serde(deserialize_with = "null_as_default")]
    recommendations: Recommendations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelSummary {
    #[serde(deserialize_with = "null_as_default")]
    overview: String,
    #[serde(deserialize_with = "null_as_default")]
    key_themes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    highlights: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    conclusions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelFindings {
    #[serde(deserialize_with = "null_as_default")]
    themes: Vec<ThemeEntry>,
    #[serde(deserialize_with = "null_as_default")]
    opposing_views: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    patterns: Vec<String>,
}

/// Models sometimes answer with bare theme names instead of objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThemeEntry {
    Title(String),
    Detailed(Theme),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceAssessment {
    #[serde(deserialize_with = "null_as_default")]
    url: String,
    credibility_score: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    expertise: String,
    #[serde(deserialize_with = "null_as_default")]
    bias: String,
    #[serde(deserialize_with = "null_as_default")]
    notes: String,
}

/// Parses the model's answer, tolerating code fences and chatter around the JSON.
///
/// Only the first complete object is decoded; anything after it is ignored.
pub fn parse_model_output(text: &str) -> Result<ModelAnalysis, AnalysisError> {
    let start = text.find('{').ok_or(AnalysisError::NoJson)?;
    let parsed = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<ModelAnalysis>()
        .next()
        .ok_or(AnalysisError::NoJson)??;
    if parsed.executive_summary.overview.trim().is_empty() {
        return Err(AnalysisError::MissingOverview);
    }
    Ok(parsed)
}

/// Merges a parsed model answer with the extracted sources.
pub fn from_model(model: ModelAnalysis, mut sources: Vec<SourceFinding>, max_items: usize) -> Analysis {
    let assessments: HashMap<String, SourceAssessment> = model
        .source_analysis
        .into_iter()
        .filter(|a| !a.url.trim().is_empty())
        .map(|a| (url_key(&a.url), a))
        .collect();

    for source in &mut sources {
        match assessments.get(&url_key(&source.url)) {
            Some(a) => {
                source.credibility_score = a.credibility_score.as_ref().and_then(score_from);
                let notes: Vec<&str> = [&a.expertise, &a.bias, &a.notes]
                    .into_iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                source.credibility_note = if notes.is_empty() {
                    "Assessed by the model without notes".to_string()
                } else {
                    notes.join("; ")
                };
            }
            None => {
                source.credibility_score = None;
                source.credibility_note = "Not assessed by the model".to_string();
            }
        }
    }

    let mut themes: Vec<Theme> = model
        .detailed_findings
        .themes
        .into_iter()
        .map(|entry| match entry {
            ThemeEntry::Title(title) => Theme {
                title,
                ..Default::default()
            },
            ThemeEntry::Detailed(theme) => theme,
        })
        .map(|mut t| {
            t.title = strip_bullet(&t.title);
            t.evidence = clean(t.evidence);
            t
        })
        .filter(|t| !t.title.is_empty())
        .collect();
    themes.truncate(max_items);

    let mut key_themes = clean(model.executive_summary.key_themes);
    if key_themes.is_empty() {
        key_themes = themes.iter().map(|t| t.title.clone()).collect();
    }
    key_themes.truncate(max_items);

    let context = Context {
        impacts: clean(model.context.impacts),
        ..model.context
    };
    let recommendations = Recommendations {
        actions: clean(model.recommendations.actions),
        research_gaps: clean(model.recommendations.research_gaps),
        risks: clean(model.recommendations.risks),
        strategy: clean(model.recommendations.strategy),
    };

    Analysis {
        executive_summary: ExecutiveSummary {
            overview: model.executive_summary.overview.trim().to_string(),
            key_themes,
            highlights: clean(model.executive_summary.highlights),
            conclusions: clean(model.executive_summary.conclusions),
        },
        detailed_findings: DetailedFindings {
            themes,
            opposing_views: clean(model.detailed_findings.opposing_views),
            patterns: clean(model.detailed_findings.patterns),
            sources,
        },
        context,
        recommendations,
    }
}

/// Summary built from titles and excerpts alone, used whenever the model is unavailable.
pub fn basic(query: &str, mut sources: Vec<SourceFinding>, max_items: usize, reason: &str) -> Analysis {
    let count = sources.len();
    let theme_limit = BASIC_THEME_LIMIT.min(max_items);

    for source in &mut sources {
        source.credibility_score = None;
        source.credibility_note = format!("Not assessed: {ANALYSIS_UNAVAILABLE}");
    }

    let themes: Vec<Theme> = sources
        .iter()
        .filter(|s| !s.title.trim().is_empty())
        .take(theme_limit)
        .map(|s| Theme {
            title: s.title.trim().to_string(),
            description: shorten(&s.excerpt, HIGHLIGHT_CHARS),
            evidence: vec![s.url.clone()],
        })
        .collect();

    let highlights: Vec<String> = sources
        .iter()
        .map(|s| shorten(&s.excerpt, HIGHLIGHT_CHARS))
        .filter(|h| !h.is_empty())
        .take(HIGHLIGHT_LIMIT)
        .collect();

    Analysis {
        executive_summary: ExecutiveSummary {
            overview: format!(
                "{ANALYSIS_UNAVAILABLE} ({reason}). Basic summary of {count} sources about '{query}'."
            ),
            key_themes: themes.iter().map(|t| t.title.clone()).collect(),
            highlights,
            conclusions: vec![
                format!("Found {count} relevant sources"),
                "Basic analysis provided due to AI service unavailability".to_string(),
            ],
        },
        detailed_findings: DetailedFindings {
            themes,
            sources,
            ..Default::default()
        },
        context: Context {
            current: "Analysis performed without AI assistance".to_string(),
            ..Default::default()
        },
        recommendations: Recommendations {
            actions: vec!["Try again later for AI-powered analysis".to_string()],
            research_gaps: vec!["Review sources manually".to_string()],
            risks: vec!["Limited analysis depth".to_string()],
            strategy: vec!["Focus on source content review".to_string()],
        },
    }
}

/// Sections for a run with nothing to analyze.
pub fn empty(overview: String) -> Analysis {
    Analysis {
        executive_summary: ExecutiveSummary {
            overview,
            ..Default::default()
        },
        detailed_findings: DetailedFindings::default(),
        context: Context::default(),
        recommendations: Recommendations::default(),
    }
}

fn url_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn score_from(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.round().clamp(0.0, 100.0) as u8)
}

fn strip_bullet(s: &str) -> String {
    s.trim()
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .to_string()
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .map(|s| strip_bullet(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn shorten(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max {
        return flat;
    }
    format!("{}…", &flat[..flat.floor_char_boundary(max)])
}
