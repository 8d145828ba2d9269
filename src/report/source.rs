use serde::{Deserialize, Serialize};
use url::Url;

use crate::settings::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    News,
    Academic,
    Blog,
    Forum,
    Other,
}

const FORUM_HOSTS: &[&str] = &[
    "reddit.com",
    "news.ycombinator.com",
    "stackoverflow.com",
    "stackexchange.com",
    "quora.com",
    "lobste.rs",
];

const ACADEMIC_HOSTS: &[&str] = &[
    "arxiv.org",
    "scholar.google.com",
    "semanticscholar.org",
    "ieee.org",
    "acm.org",
    "nature.com",
    "science.org",
    "sciencedirect.com",
    "springer.com",
    "ncbi.nlm.nih.gov",
    "jstor.org",
    "researchgate.net",
];

const NEWS_HOSTS: &[&str] = &[
    "reuters.com",
    "apnews.com",
    "bbc.com",
    "bbc.co.uk",
    "nytimes.com",
    "theguardian.com",
    "cnn.com",
    "bloomberg.com",
    "ft.com",
    "wsj.com",
    "washingtonpost.com",
    "theverge.com",
    "techcrunch.com",
    "wired.com",
    "arstechnica.com",
];

const BLOG_HOSTS: &[&str] = &[
    "medium.com",
    "substack.com",
    "dev.to",
    "hashnode.dev",
    "wordpress.com",
    "blogspot.com",
];

impl SourceKind {
    /// Best-effort classification from the URL's host and path.
    pub fn classify(raw: &str) -> Self {
        let Ok(url) = Url::parse(raw) else {
            return SourceKind::Other;
        };
        let Some(host) = url.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
        else {
            return SourceKind::Other;
        };

        if host_in(&host, FORUM_HOSTS) || host.contains("forum") || host.starts_with("discourse.")
        {
            SourceKind::Forum
        } else if host_in(&host, ACADEMIC_HOSTS) || host.ends_with(".edu") || host.contains(".ac.")
        {
            SourceKind::Academic
        } else if host_in(&host, NEWS_HOSTS) || host.starts_with("news.") {
            SourceKind::News
        } else if host_in(&host, BLOG_HOSTS)
            || host.starts_with("blog.")
            || url.path().starts_with("/blog")
        {
            SourceKind::Blog
        } else {
            SourceKind::Other
        }
    }

    pub fn matches(self, wanted: SourceType) -> bool {
        matches!(
            (self, wanted),
            (SourceKind::News, SourceType::News)
                | (SourceKind::Academic, SourceType::Academic)
                | (SourceKind::Blog, SourceType::Blogs)
                | (SourceKind::Forum, SourceType::Forums)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Academic => "academic",
            SourceKind::Blog => "blog",
            SourceKind::Forum => "forum",
            SourceKind::Other => "web",
        }
    }
}

/// Matches the host itself or any subdomain of it.
fn host_in(host: &str, list: &[&str]) -> bool {
    list.iter().any(|d| {
        host == *d
            || host
                .strip_suffix(d)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Readable site name for display, e.g. `https://www.nature.com/x` → `nature.com`.
pub fn domain_of(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| raw.to_string())
}

/// Stable reorder putting sources of the wanted kinds first.
pub(crate) fn prefer_kinds<T>(items: &mut [T], wanted: &[SourceType], kind: impl Fn(&T) -> SourceKind) {
    if wanted.is_empty() {
        return;
    }
    items.sort_by_key(|item| {
        let k = kind(item);
        !wanted.iter().any(|w| k.matches(*w))
    });
}
