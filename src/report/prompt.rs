use super::SourceFinding;
use crate::settings::SearchSettings;

/// Per-source excerpt budget sent to the model.
pub const MAX_SOURCE_CHARS: usize = 2_000;
/// Budget for all excerpts combined.
pub const MAX_TOTAL_CHARS: usize = 24_000;

pub const SYSTEM_INSTRUCTION: &str = "You are a meticulous research analyst. \
Work only from the supplied sources, cite them by URL, and flag uncertainty. \
Respond with a single JSON object and nothing else.";

const RESPONSE_SHAPE: &str = r#"{
  "executive_summary": {
    "overview": "2-3 paragraph summary",
    "key_themes": ["short theme name"],
    "highlights": ["most important point"],
    "conclusions": ["primary takeaway"]
  },
  "detailed_findings": {
    "themes": [{"title": "theme", "description": "what the sources say", "evidence": ["supporting fact, with source URL"]}],
    "opposing_views": ["alternative perspective or counter-argument"],
    "patterns": ["emerging trend or common element"]
  },
  "source_analysis": [
    {"url": "source URL", "credibility_score": 0, "expertise": "expertise level", "bias": "bias assessment"}
  ],
  "context": {"historical": "", "current": "", "future": "", "impacts": ["potential impact"]},
  "recommendations": {"actions": [], "research_gaps": [], "risks": [], "strategy": []}
}"#;

/// Builds the user prompt, trimming excerpts to the per-source and total budgets.
pub fn build_prompt(query: &str, settings: &SearchSettings, sources: &[SourceFinding]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("RESEARCH TOPIC: {query}\n"));
    prompt.push_str(&format!("TIME RANGE: {}\n", settings.time_range));
    if !settings.sources.is_empty() {
        let kinds: Vec<String> = settings.sources.iter().map(ToString::to_string).collect();
        prompt.push_str(&format!("PREFERRED SOURCE TYPES: {}\n", kinds.join(", ")));
    }
    prompt.push('\n');

    prompt.push_str(&format!(
        "Analyze the sources below and answer with JSON of exactly this shape:\n{RESPONSE_SHAPE}\n\n"
    ));
    prompt.push_str(&format!(
        "Rules: at most {max} key_themes and at most {max} themes; \
credibility_score is an integer 0-100 for every source listed; \
use \"\" or [] for anything the sources do not support.\n\n",
        max = settings.max_results
    ));

    prompt.push_str("SOURCES:\n");
    let mut budget = MAX_TOTAL_CHARS;
    for (i, source) in sources.iter().enumerate() {
        if budget == 0 {
            prompt.push_str(&format!("({} more sources omitted)\n", sources.len() - i));
            break;
        }
        let excerpt = clip(&source.excerpt, MAX_SOURCE_CHARS.min(budget));
        budget -= excerpt.len();
        prompt.push_str(&format!(
            "\n[{n}] {title}\nURL: {url}\nType: {kind}\nContent: {excerpt}\n",
            n = i + 1,
            title = source.title,
            url = source.url,
            kind = source.kind.label(),
        ));
    }

    prompt
}

/// Trims `text` and cuts it to at most `max` bytes on a char boundary.
pub(crate) fn clip(text: &str, max: usize) -> &str {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        return trimmed;
    }
    &trimmed[..trimmed.floor_char_boundary(max)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::finding;

    #[test]
    fn includes_topic_settings_and_sources() {
        let sources = vec![finding("https://arxiv.org/abs/1", "Paper", None)];
        let prompt = build_prompt("quantum error correction", &SearchSettings::default(), &sources);

        assert!(prompt.contains("RESEARCH TOPIC: quantum error correction"));
        assert!(prompt.contains("TIME RANGE: month"));
        assert!(prompt.contains("PREFERRED SOURCE TYPES: news, academic"));
        assert!(prompt.contains("URL: https://arxiv.org/abs/1"));
        assert!(prompt.contains("Type: academic"));
        assert!(prompt.contains("at most 10 key_themes"));
    }

    #[test]
    fn trims_each_excerpt() {
        let mut source = finding("https://a.com", "A", None);
        source.excerpt = "y".repeat(MAX_SOURCE_CHARS * 3);
        let prompt = build_prompt("q", &SearchSettings::default(), &[source]);
        let longest_run = prompt
            .split(|c| c != 'y')
            .map(str::len)
            .max()
            .unwrap_or(0);
        assert_eq!(longest_run, MAX_SOURCE_CHARS);
    }

    #[test]
    fn stops_when_total_budget_is_spent() {
        let sources: Vec<_> = (0..20)
            .map(|i| {
                let mut s = finding(&format!("https://site{i}.com"), &format!("S{i}"), None);
                s.excerpt = "z".repeat(MAX_SOURCE_CHARS);
                s
            })
            .collect();
        let prompt = build_prompt("q", &SearchSettings::default(), &sources);

        let sent = MAX_TOTAL_CHARS / MAX_SOURCE_CHARS;
        assert!(prompt.contains(&format!("URL: https://site{}.com", sent - 1)));
        assert!(!prompt.contains(&format!("URL: https://site{sent}.com")));
        assert!(prompt.contains(&format!("({} more sources omitted)", 20 - sent)));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("  héllo  ", 3), "hé");
        assert_eq!(clip("short", 100), "short");
    }
}
