//! One research run: search, page extraction, analysis, assembly.

use std::collections::HashSet;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::fetch::PageFetcher;
use crate::gemini::Summarizer;
use crate::report::analysis::{self, ANALYSIS_UNAVAILABLE, Analysis};
use crate::report::prompt::{self, MAX_SOURCE_CHARS, SYSTEM_INSTRUCTION};
use crate::report::source::prefer_kinds;
use crate::report::{
    AnalysisMode, FailedFetch, Metadata, ResearchResult, SearchMode, SourceFinding, SourceKind,
};
use crate::search::dispatch::{ProviderFailure, SearchOutcome, search_with_fallback};
use crate::search::{SearchClient, SearchHit};
use crate::settings::SearchSettings;

const MAX_CONCURRENT_FETCHES: usize = 5;

#[derive(Debug, Clone)]
pub struct ResearchRequest<'a> {
    pub query: &'a str,
    pub settings: SearchSettings,
    /// Replace snippets of the top `depth` sources with extracted page text.
    pub fetch_pages: bool,
    /// Return an offline result instead of an error when every provider fails.
    pub allow_offline: bool,
    /// Skip search entirely.
    pub force_offline: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("no search provider configured: set SERPER_API_KEY or TAVILY_API_KEY, or pass --offline")]
    NoProviderConfigured,

    #[error("all search providers failed: {}", describe(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),
}

fn describe(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn conduct<C, M, F>(
    search: &[C],
    summarizer: Option<&M>,
    fetcher: &F,
    request: ResearchRequest<'_>,
) -> Result<ResearchResult, ResearchError>
where
    C: SearchClient,
    M: Summarizer,
    F: PageFetcher,
{
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ResearchError::EmptyQuery);
    }
    if search.is_empty() && !request.force_offline {
        return Err(ResearchError::NoProviderConfigured);
    }

    let settings = request.settings.normalized();
    info!(
        query = %query,
        provider = %settings.search_api,
        max_results = settings.max_results,
        time_range = %settings.time_range,
        "starting research"
    );

    let mut notices = Vec::new();
    let outcome = if request.force_offline {
        notices.push("Offline mode requested, search skipped".to_string());
        SearchOutcome {
            provider: None,
            hits: Vec::new(),
            failures: Vec::new(),
        }
    } else {
        search_with_fallback(search, query, &settings).await
    };
    notices.extend(
        outcome
            .failures
            .iter()
            .map(|f| format!("{} failed: {}", f.provider, f.reason)),
    );

    let Some(provider) = outcome.provider else {
        if !request.force_offline && !request.allow_offline {
            return Err(ResearchError::AllProvidersFailed(outcome.failures));
        }
        let analysis = offline_analysis(query, &outcome.failures);
        return Ok(assemble(
            analysis,
            Metadata {
                query: query.to_string(),
                settings,
                timestamp: Utc::now(),
                apis_used: Vec::new(),
                search_mode: SearchMode::Offline,
                analysis_mode: AnalysisMode::Basic,
                notices,
                provider_failures: outcome.failures,
                failed_fetches: Vec::new(),
            },
        ));
    };

    let mut sources = findings_from(outcome.hits);
    prefer_kinds(&mut sources, &settings.sources, |s| s.kind);
    for (i, source) in sources.iter_mut().enumerate() {
        source.position = i as u32 + 1;
    }

    let failed_fetches = if request.fetch_pages {
        enrich_with_pages(fetcher, &mut sources, usize::from(settings.depth)).await
    } else {
        Vec::new()
    };

    let mut apis_used = vec![provider.to_string()];
    let max_items = usize::from(settings.max_results);
    let (analysis, analysis_mode) = match summarizer {
        Some(model) => {
            let (analysis, mode) =
                analyze(model, query, &settings, sources, &mut notices).await;
            if mode == AnalysisMode::Ai {
                apis_used.push(format!("gemini:{}", model.model()));
            }
            (analysis, mode)
        }
        None => {
            let reason = "GEMINI_API_KEY not set";
            notices.push(format!("{ANALYSIS_UNAVAILABLE}: {reason}"));
            (
                analysis::basic(query, sources, max_items, reason),
                AnalysisMode::Basic,
            )
        }
    };

    info!(
        sources = analysis.detailed_findings.sources.len(),
        failed_fetches = failed_fetches.len(),
        mode = ?analysis_mode,
        "research complete"
    );

    Ok(assemble(
        analysis,
        Metadata {
            query: query.to_string(),
            settings,
            timestamp: Utc::now(),
            apis_used,
            search_mode: SearchMode::Live,
            analysis_mode,
            notices,
            provider_failures: outcome.failures,
            failed_fetches,
        },
    ))
}

fn assemble(analysis: Analysis, metadata: Metadata) -> ResearchResult {
    ResearchResult {
        executive_summary: analysis.executive_summary,
        detailed_findings: analysis.detailed_findings,
        context: analysis.context,
        recommendations: analysis.recommendations,
        metadata,
    }
}

/// Hits in provider order with duplicate URLs dropped.
fn findings_from(hits: Vec<SearchHit>) -> Vec<SourceFinding> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| !hit.url.is_empty() && seen.insert(hit.url.clone()))
        .map(|hit| SourceFinding {
            position: hit.position,
            kind: SourceKind::classify(&hit.url),
            title: hit.title,
            url: hit.url,
            excerpt: hit.snippet,
            from_page: false,
            published: hit.published,
            credibility_score: None,
            credibility_note: String::new(),
        })
        .collect()
}

async fn enrich_with_pages<F: PageFetcher>(
    fetcher: &F,
    sources: &mut [SourceFinding],
    depth: usize,
) -> Vec<FailedFetch> {
    let targets: Vec<(usize, String)> = sources
        .iter()
        .take(depth)
        .enumerate()
        .map(|(i, s)| (i, s.url.clone()))
        .collect();

    let outcomes: Vec<_> = stream::iter(targets)
        .map(|(i, url)| async move {
            let result = fetcher.fetch(&url).await;
            (i, url, result)
        })
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await;

    let mut failed = Vec::new();
    for (i, url, outcome) in outcomes {
        let reason = match outcome {
            Ok(page) if !page.text.trim().is_empty() => {
                debug!(
                    url = %page.url,
                    raw_fallback = page.used_raw_fallback,
                    chars = page.text.len(),
                    "page text extracted"
                );
                let source = &mut sources[i];
                source.excerpt = prompt::clip(&page.text, MAX_SOURCE_CHARS).to_string();
                source.from_page = true;
                if source.title.trim().is_empty()
                    && let Some(title) = page.title
                {
                    source.title = title;
                }
                continue;
            }
            Ok(_) => "no readable text".to_string(),
            Err(e) => e.to_string(),
        };
        warn!(url = %url, reason = %reason, "page fetch failed, keeping snippet");
        failed.push(FailedFetch { url, reason });
    }
    failed
}

async fn analyze<M: Summarizer>(
    model: &M,
    query: &str,
    settings: &SearchSettings,
    sources: Vec<SourceFinding>,
    notices: &mut Vec<String>,
) -> (Analysis, AnalysisMode) {
    let max_items = usize::from(settings.max_results);
    let request = prompt::build_prompt(query, settings, &sources);

    let reason = match model.generate(SYSTEM_INSTRUCTION, &request).await {
        Ok(text) => match analysis::parse_model_output(&text) {
            Ok(parsed) => {
                return (
                    analysis::from_model(parsed, sources, max_items),
                    AnalysisMode::Ai,
                );
            }
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    warn!(model = model.model(), reason = %reason, "falling back to basic analysis");
    notices.push(format!("{ANALYSIS_UNAVAILABLE}: {reason}"));
    (
        analysis::basic(query, sources, max_items, &reason),
        AnalysisMode::Basic,
    )
}

fn offline_analysis(query: &str, failures: &[ProviderFailure]) -> Analysis {
    let overview = if failures.is_empty() {
        format!("Offline mode: no search was performed for '{query}'.")
    } else {
        format!(
            "Offline mode: no search provider could answer '{query}' ({}).",
            describe(failures)
        )
    };
    let mut analysis = analysis::empty(overview);
    analysis.recommendations.actions = vec![
        "Check SERPER_API_KEY and TAVILY_API_KEY".to_string(),
        "Run `quarry status` to see which services respond".to_string(),
    ];
    analysis
}
