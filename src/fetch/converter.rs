use super::extractor::Article;

/// Readable text of one fetched page.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub used_raw_fallback: bool,
}

pub(super) fn to_page(article: Article, url: String) -> ExtractedPage {
    let markdown = html2md::rewrite_html(&article.content_html, false);
    ExtractedPage {
        url,
        title: article.title,
        text: collapse_blank_lines(&markdown),
        used_raw_fallback: article.used_raw_fallback,
    }
}

/// Trims trailing whitespace and squeezes runs of blank lines to one.
fn collapse_blank_lines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = false;
    for line in s.lines().map(str::trim_end) {
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push('\n');
            }
            blank_run = true;
            continue;
        }
        blank_run = false;
        out.push_str(line);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_article_html_to_markdown() {
        let article = Article {
            title: Some("Heading".into()),
            content_html: "<h2>Findings</h2><p>Prices <strong>fell</strong>.</p>".into(),
            used_raw_fallback: false,
        };

        let page = to_page(article, "https://example.com".into());

        assert_eq!(page.url, "https://example.com");
        assert_eq!(page.title.as_deref(), Some("Heading"));
        assert!(page.text.contains("Findings"));
        assert!(page.text.contains("**fell**"));
        assert!(!page.used_raw_fallback);
    }

    #[test]
    fn squeezes_blank_lines() {
        assert_eq!(collapse_blank_lines("a  \n\n\n\nb\n\n"), "a\n\nb");
        assert_eq!(collapse_blank_lines("\n\nstart"), "start");
    }
}
