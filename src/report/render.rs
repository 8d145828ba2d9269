use clap::ValueEnum;

use super::source::domain_of;
use super::{AnalysisMode, ResearchResult, SearchMode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ViewMode {
    /// Metrics header followed by compact sections.
    #[default]
    Dashboard,
    /// Full Markdown report.
    Classic,
    /// The result as pretty-printed JSON.
    Raw,
}

pub fn render(result: &ResearchResult, view: ViewMode) -> Result<String, serde_json::Error> {
    match view {
        ViewMode::Dashboard => Ok(dashboard(result)),
        ViewMode::Classic => Ok(classic(result)),
        ViewMode::Raw => serde_json::to_string_pretty(result),
    }
}

fn reliability(result: &ResearchResult) -> String {
    result
        .average_credibility()
        .map_or_else(|| "N/A".to_string(), |avg| format!("{avg:.0}%"))
}

fn mode_line(result: &ResearchResult) -> String {
    let meta = &result.metadata;
    let search = match meta.search_mode {
        SearchMode::Live => "live",
        SearchMode::Offline => "offline",
    };
    let analysis = match meta.analysis_mode {
        AnalysisMode::Ai => "ai",
        AnalysisMode::Basic => "basic",
    };
    let apis = if meta.apis_used.is_empty() {
        "none".to_string()
    } else {
        meta.apis_used.join(", ")
    };
    format!("search: {search} | analysis: {analysis} | apis: {apis}")
}

fn dashboard(result: &ResearchResult) -> String {
    let summary = &result.executive_summary;
    let findings = &result.detailed_findings;
    let mut out = String::new();

    out.push_str(&format!("== {} ==\n", one_line(&result.metadata.query)));
    out.push_str(&format!(
        "Sources found: {} | Key findings: {} | Avg reliability: {} | Reliable: {}/{}\n",
        result.sources().len(),
        summary.key_themes.len(),
        reliability(result),
        result.reliable_sources(),
        result.sources().len(),
    ));
    out.push_str(&format!("{}\n", mode_line(result)));
    out.push_str(&format!(
        "{}\n\n",
        result.metadata.timestamp.format("%Y-%m-%d %H:%M UTC")
    ));

    out.push_str(&format!("-- Overview --\n{}\n\n", summary.overview));
    dashboard_list(&mut out, "Key themes", &summary.key_themes);
    dashboard_list(&mut out, "Highlights", &summary.highlights);

    if !findings.themes.is_empty() {
        out.push_str("-- Findings --\n");
        for theme in &findings.themes {
            out.push_str(&format!("* {}\n", theme.title));
            if !theme.description.is_empty() {
                out.push_str(&format!("    {}\n", theme.description));
            }
        }
        out.push('\n');
    }

    if !findings.sources.is_empty() {
        out.push_str("-- Sources --\n");
        for s in &findings.sources {
            let score = s
                .credibility_score
                .map_or_else(|| "--".to_string(), |c| c.to_string());
            out.push_str(&format!(
                "[{:>2}] {:<8} {:>3}  {} ({})\n",
                s.position,
                s.kind.label(),
                score,
                one_line(&s.title),
                domain_of(&s.url),
            ));
        }
        out.push('\n');
    }

    dashboard_list(&mut out, "Next steps", &result.recommendations.actions);
    dashboard_list(&mut out, "Notices", &result.metadata.notices);
    out
}

fn dashboard_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("-- {heading} --\n"));
    for item in items {
        out.push_str(&format!("* {item}\n"));
    }
    out.push('\n');
}

fn classic(result: &ResearchResult) -> String {
    let summary = &result.executive_summary;
    let findings = &result.detailed_findings;
    let meta = &result.metadata;

    let mut output = format!("# Research: {}\n\n", one_line(&meta.query));
    output.push_str(&format!(
        "_Generated {} | {}_\n\n",
        meta.timestamp.to_rfc3339(),
        mode_line(result)
    ));

    output.push_str("## Executive Summary\n\n");
    output.push_str(&summary.overview);
    output.push_str("\n\n");
    md_list(&mut output, "### Key Themes", &summary.key_themes);
    md_list(&mut output, "### Highlights", &summary.highlights);
    md_list(&mut output, "### Conclusions", &summary.conclusions);

    output.push_str("## Detailed Findings\n\n");
    for theme in &findings.themes {
        output.push_str(&format!("### {}\n\n", one_line(&theme.title)));
        if !theme.description.is_empty() {
            output.push_str(&theme.description);
            output.push_str("\n\n");
        }
        for evidence in &theme.evidence {
            output.push_str(&format!("- {evidence}\n"));
        }
        if !theme.evidence.is_empty() {
            output.push('\n');
        }
    }
    md_list(&mut output, "### Opposing Views", &findings.opposing_views);
    md_list(&mut output, "### Patterns", &findings.patterns);

    let ctx = &result.context;
    if !(ctx.historical.is_empty() && ctx.current.is_empty() && ctx.future.is_empty()) {
        output.push_str("## Context\n\n");
        for (label, text) in [
            ("Historical", &ctx.historical),
            ("Current", &ctx.current),
            ("Future", &ctx.future),
        ] {
            if !text.is_empty() {
                output.push_str(&format!("**{label}:** {text}\n\n"));
            }
        }
    }
    md_list(&mut output, "### Impacts", &ctx.impacts);

    let recs = &result.recommendations;
    md_list(&mut output, "## Recommended Actions", &recs.actions);
    md_list(&mut output, "## Research Gaps", &recs.research_gaps);
    md_list(&mut output, "## Risks", &recs.risks);
    md_list(&mut output, "## Strategy", &recs.strategy);

    if !findings.sources.is_empty() {
        output.push_str(&format!(
            "## Sources\n\nAverage reliability: {} ({} of {} rated reliable)\n\n",
            reliability(result),
            result.reliable_sources(),
            findings.sources.len()
        ));
        for s in &findings.sources {
            output.push_str(&format!(
                "{}. [{}]({}) ({}",
                s.position,
                escape_link_text(&one_line(&s.title)),
                s.url,
                s.kind.label()
            ));
            if let Some(score) = s.credibility_score {
                output.push_str(&format!(", credibility {score}/100"));
            }
            output.push(')');
            if !s.credibility_note.is_empty() {
                output.push_str(&format!(": {}", s.credibility_note));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    if !meta.failed_fetches.is_empty() {
        output.push_str("## Failed URLs\n\n");
        for failed in &meta.failed_fetches {
            output.push_str(&format!("- {} ({})\n", failed.url, failed.reason));
        }
        output.push('\n');
    }

    md_list(&mut output, "## Notices", &meta.notices);
    output
}

fn md_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str("\n\n");
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
    out.push('\n');
}

/// Backslash-escapes brackets and parentheses so the text stays inside `[...]`.
fn escape_link_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Collapses line breaks so headings and list rows stay on one line.
fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::{finding, result_with};
    use crate::report::FailedFetch;

    fn sample() -> ResearchResult {
        let mut result = result_with(vec![
            finding("https://arxiv.org/abs/1", "Paper [v2]", Some(92)),
            finding("https://www.example.com/post", "Post", Some(60)),
        ]);
        result.metadata.failed_fetches.push(FailedFetch {
            url: "https://fail.com".into(),
            reason: "timeout".into(),
        });
        result.metadata.notices.push("serper failed: rate limited".into());
        result
    }

    #[test]
    fn dashboard_shows_metrics() {
        let text = render(&sample(), ViewMode::Dashboard).unwrap();
        assert!(text.contains("== test query =="));
        assert!(text.contains("Sources found: 2 | Key findings: 1 | Avg reliability: 76% | Reliable: 1/2"));
        assert!(text.contains("search: live | analysis: ai | apis: serper"));
        assert!(text.contains("-- Overview --\nOverview text"));
        assert!(text.contains("academic"));
        assert!(text.contains("(example.com)"));
        assert!(text.contains("serper failed: rate limited"));
    }

    #[test]
    fn dashboard_without_scores_reports_na() {
        let result = result_with(vec![finding("https://a.com", "A", None)]);
        let text = render(&result, ViewMode::Dashboard).unwrap();
        assert!(text.contains("Avg reliability: N/A | Reliable: 0/1"));
        assert!(text.contains(" -- "));
    }

    #[test]
    fn classic_includes_sections() {
        let text = render(&sample(), ViewMode::Classic).unwrap();
        assert!(text.contains("# Research: test query"));
        assert!(text.contains("## Executive Summary\n\nOverview text"));
        assert!(text.contains("### Key Themes\n\n- Theme A"));
        assert!(text.contains("### Theme A\n\nAbout A\n\n- Evidence for A"));
        assert!(text.contains("### Opposing Views"));
        assert!(!text.contains("### Patterns"));
        assert!(text.contains(r"1. [Paper \[v2\]](https://arxiv.org/abs/1) (academic, credibility 92/100)"));
        assert!(text.contains("## Failed URLs\n\n- https://fail.com (timeout)"));
        assert!(text.contains("## Notices"));
    }

    #[test]
    fn classic_keeps_heading_on_one_line() {
        let mut result = result_with(vec![]);
        result.metadata.query = "line1\nline2".into();
        let text = render(&result, ViewMode::Classic).unwrap();
        assert!(text.starts_with("# Research: line1 line2\n"));
    }

    #[test]
    fn raw_is_parseable_json() {
        let text = render(&sample(), ViewMode::Raw).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["executive_summary"]["overview"], "Overview text");
        assert_eq!(value["detailed_findings"]["sources"][0]["kind"], "academic");
        assert_eq!(value["metadata"]["failed_fetches"][0]["url"], "https://fail.com");
    }

    #[test]
    fn escapes_link_text() {
        assert_eq!(escape_link_text("plain"), "plain");
        assert_eq!(escape_link_text("a[b]c(d)"), r"a\[b\]c\(d\)");
    }
}
