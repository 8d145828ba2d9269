use dom_smoothie::{Config, Readability};
use tracing::debug;

pub(super) struct Article {
    pub title: Option<String>,
    pub content_html: String,
    /// Readability found no main content and the whole document was kept.
    pub used_raw_fallback: bool,
}

pub(super) fn extract_article(html: &str, url: &str) -> Article {
    let mut readability = match Readability::new(html, Some(url), Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            debug!(%e, "readability init failed, keeping whole document");
            return whole_document(html);
        }
    };

    let readable = readability.is_probably_readable();

    match readability.parse() {
        Ok(article) if readable => Article {
            title: non_empty(article.title.to_string()),
            content_html: article.content.to_string(),
            used_raw_fallback: false,
        },
        Ok(article) => Article {
            title: non_empty(article.title.to_string()).or_else(|| title_tag(html)),
            content_html: html.to_string(),
            used_raw_fallback: true,
        },
        Err(e) => {
            debug!(%e, "readability parse failed, keeping whole document");
            whole_document(html)
        }
    }
}

fn whole_document(html: &str) -> Article {
    Article {
        title: title_tag(html),
        content_html: html.to_string(),
        used_raw_fallback: true,
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `<title>` lookup by byte search, for documents readability rejects.
fn title_tag(html: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    non_empty(html[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head><title>Solar Storage in 2025</title></head>
<body>
<nav>Home | About | Contact</nav>
<article>
    <h1>Grid batteries are finally cheap</h1>
    <p>Utility-scale battery storage prices fell sharply over the last two years,
    driven by lithium iron phosphate chemistry and manufacturing scale.</p>
    <p>Operators now pair new solar farms with four-hour batteries by default,
    shifting midday generation into the evening demand peak.</p>
    <p>Analysts expect installed capacity to double again as interconnection
    queues clear and regulators adopt capacity-market rules for storage.</p>
    <p>Critics point out that long-duration storage remains unsolved and that
    seasonal balancing still relies on gas turbines in most markets.</p>
    <p>Still, the economics have changed enough that storage is no longer a
    niche add-on but a core part of new generation planning.</p>
</article>
<footer>Copyright notice</footer>
</body>
</html>"#;

    #[test]
    fn extracts_main_content() {
        let article = extract_article(ARTICLE_HTML, "https://example.com/solar");
        assert!(!article.used_raw_fallback);
        assert!(article.content_html.contains("battery storage"));
    }

    #[test]
    fn thin_pages_keep_whole_document() {
        let html = "<html><head><title>Stub</title></head><body><p>hi</p></body></html>";
        let article = extract_article(html, "https://example.com/");
        assert!(article.used_raw_fallback);
        assert!(article.content_html.contains("hi"));
        assert_eq!(article.title.as_deref(), Some("Stub"));
    }

    #[test]
    fn title_tag_handles_attributes_and_case() {
        assert_eq!(
            title_tag(r#"<HTML><TITLE lang="en"> Mixed Case </TITLE></HTML>"#),
            Some("Mixed Case".to_string())
        );
    }

    #[test]
    fn title_tag_missing_or_empty() {
        assert_eq!(title_tag("<html><head></head></html>"), None);
        assert_eq!(title_tag("<title>   </title>"), None);
    }

    #[test]
    fn title_tag_survives_multibyte_text() {
        let html = "<html><head><title>Énergie solaire</title></head><body>İİ</body></html>";
        assert_eq!(title_tag(html), Some("Énergie solaire".to_string()));
    }
}
