//! HTML helpers for blogs without a usable feed.
//!
//! Link discovery runs a fixed list of CSS selectors that match how most blog
//! engines mark up post listings. Body extraction picks the most specific
//! content container it can find and renders it to plain text.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{Error, Result};

/// Selectors that commonly point at article links on a blog index page
const LINK_SELECTORS: &[&str] = &[
    r#"a[href*="/blog/"]"#,
    r#"a[href*="/post/"]"#,
    r#"a[href*="/article/"]"#,
    "h2 a",
    "h3 a",
    ".post-title a",
    ".article-title a",
    ".entry-title a",
];

/// Links taken from each selector, to bound the number of page requests
const LINKS_PER_SELECTOR: usize = 10;

/// Containers tried in order when extracting the article body
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    ".post-content",
    ".entry-content",
    "body",
];

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Scrape(format!("Invalid selector '{}': {}", css, e)))
}

/// Collect candidate article URLs from a blog index page.
///
/// Relative links are resolved against `base_url`; only http(s) links are kept,
/// fragments are dropped and order of first discovery is preserved.
pub fn extract_article_links(html: &str, base_url: &str) -> Result<Vec<String>> {
    let base = Url::parse(base_url)?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for css in LINK_SELECTORS {
        let sel = selector(css)?;

        for element in document.select(&sel).take(LINKS_PER_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let Ok(mut resolved) = base.join(href.trim()) else {
                continue;
            };

            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }

            resolved.set_fragment(None);

            if resolved == base {
                continue;
            }

            let resolved = resolved.to_string();
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    Ok(links)
}

/// Extract readable text from an article page
pub fn extract_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let container = CONTENT_SELECTORS.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        document.select(&sel).next()
    })?;

    let text = html_to_text(&container.html());

    if text.is_empty() {
        tracing::debug!("Extracted content is empty");
        None
    } else {
        Some(text)
    }
}

/// Page title from og:title, the first <h1>, or <title>
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let og_title = Selector::parse(r#"meta[property="og:title"]"#)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(|content| content.trim().to_string())
        });

    og_title
        .filter(|t| !t.is_empty())
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| first_text(&document, "title"))
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    document
        .select(&sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First line of reasonable title length among the opening lines of the text
pub fn title_from_text(text: &str) -> Option<String> {
    text.trim()
        .lines()
        .take(5)
        .map(str::trim)
        .find(|line| {
            let len = line.chars().count();
            len > 10 && len < 200
        })
        .map(str::to_string)
}

/// Title-cased last path segment, e.g. `/blog/detecting-lateral-movement` -> "Detecting Lateral Movement"
pub fn title_from_url(url: &str) -> String {
    let segment = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);

    segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert HTML content to plain text, dropping blank lines
pub fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 100)
        .unwrap_or_else(|_| html.to_string());

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r##"<html><body>
        <nav><a href="/about">About</a></nav>
        <h2 class="entry-title"><a href="/blog/detecting-lateral-movement">Detecting lateral movement</a></h2>
        <h2><a href="https://detect.test/blog/detecting-lateral-movement#comments">Comments</a></h2>
        <h3><a href="posts/edr-telemetry">EDR telemetry</a></h3>
        <div class="post-title"><a href="mailto:editor@detect.test">Mail</a></div>
        <a href="/article/cloud-iam">Cloud IAM</a>
        <h2><a href="#">Top</a></h2>
    </body></html>"##;

    #[test]
    fn test_extract_article_links() {
        let links = extract_article_links(INDEX, "https://detect.test/").unwrap();

        assert_eq!(
            links,
            vec![
                "https://detect.test/blog/detecting-lateral-movement".to_string(),
                "https://detect.test/article/cloud-iam".to_string(),
                "https://detect.test/posts/edr-telemetry".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_bad_base_url() {
        assert!(matches!(
            extract_article_links(INDEX, "not a url"),
            Err(Error::UrlParse(_))
        ));
    }

    #[test]
    fn test_extract_text_prefers_article() {
        let html = r#"<html><body>
            <nav>Home | Archive</nav>
            <article><h1>Threat report</h1><p>Attackers abused OAuth tokens.</p></article>
            <footer>Copyright</footer>
        </body></html>"#;

        let text = extract_text(html).unwrap();
        assert!(text.contains("Attackers abused OAuth tokens."));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Archive"));
    }

    #[test]
    fn test_extract_title_sources() {
        let og = r#"<html><head><meta property="og:title" content="OG Title"><title>Doc</title></head><body><h1>H1</h1></body></html>"#;
        assert_eq!(extract_title(og).as_deref(), Some("OG Title"));

        let h1 = r#"<html><head><title>Doc Title</title></head><body><h1>  Heading
            One </h1></body></html>"#;
        assert_eq!(extract_title(h1).as_deref(), Some("Heading One"));

        let title = r#"<html><head><title>Doc Title</title></head><body></body></html>"#;
        assert_eq!(extract_title(title).as_deref(), Some("Doc Title"));
    }

    #[test]
    fn test_title_heuristics() {
        assert_eq!(
            title_from_text("Short\nA proper article headline\nbody").as_deref(),
            Some("A proper article headline")
        );
        assert_eq!(title_from_text("tiny\nsmall"), None);
        assert_eq!(
            title_from_url("https://detect.test/blog/detecting-lateral-movement/"),
            "Detecting Lateral Movement"
        );
    }
}
