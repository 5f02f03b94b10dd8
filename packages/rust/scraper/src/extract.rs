//! Plain-text extraction and content hashing for fetched article pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extract readable text from an article page.
///
/// Readability heuristics: try `<main>`, `<article>`, then common content
/// containers; fall back to the body with navigation chrome stripped.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let selectors = ["main", "article", r#"[role="main"]"#, ".content"];
    for sel_str in selectors {
        let sel = Selector::parse(sel_str).unwrap();
        if let Some(el) = doc.select(&sel).next() {
            return normalize(&el.text().collect::<Vec<_>>().join(" "));
        }
    }

    // Last resort: the whole body, minus nav/header/footer/script/style/aside
    let body_sel = Selector::parse("body").unwrap();
    if let Some(body) = doc.select(&body_sel).next() {
        let stripped = strip_chrome(&body.inner_html());
        let fragment = Html::parse_fragment(&stripped);
        let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        return normalize(&text);
    }

    String::new()
}

/// Strip common navigation/chrome elements from HTML content.
fn strip_chrome(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let chrome_sel =
        Selector::parse("nav, header, footer, aside, script, style, .sidebar, .nav").unwrap();

    let mut result = html.to_string();
    for el in doc.select(&chrome_sel) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result
}

fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Compute the SHA-256 hash of page content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
