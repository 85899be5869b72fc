//! Article download and main-text extraction.
//!
//! [`fetch_full_article`] downloads a page with a blocking `reqwest` client
//! and hands the HTML to [`extract_article_text`], which picks the container
//! most likely to hold the story and returns its text blocks separated by
//! blank lines.
//!
//! Failures never reach the caller: they are logged and `None` is returned.

use crate::utils::{collapse_whitespace, truncate_for_log};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Per-request timeout applied by the HTTP client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);

/// User-Agent sent with every download.
const USER_AGENT: &str = concat!("news_xml/", env!("CARGO_PKG_VERSION"));

/// Containers that may hold the story, most specific first.
const CONTAINERS: [&str; 5] = [
    "[itemprop=\"articleBody\"]",
    "article",
    "main",
    "[role=\"main\"]",
    "body",
];

const BLOCKS: &str = "p, h2, h3, li, blockquote";
const BLOCK_TAGS: [&str; 5] = ["p", "h2", "h3", "li", "blockquote"];
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

static CONTAINER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTAINERS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static BLOCK_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(BLOCKS).ok());
static PARAGRAPH_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("p").ok());

/// Download an article and return its main text.
///
/// # Arguments
///
/// * `url` - Absolute `http` or `https` URL of the article
///
/// # Returns
///
/// * `Some(text)` once the page was downloaded. The text may be empty when
///   the page has no recognizable article blocks; a warning is logged.
/// * `None` on any failure: malformed URL, unsupported scheme, network
///   error, timeout, or a non-success HTTP status. The failure is logged.
///
/// No retries are attempted.
#[instrument(level = "info", skip_all, fields(%url))]
pub fn fetch_full_article(url: &str) -> Option<String> {
    match try_fetch(url) {
        Ok(text) => {
            if text.is_empty() {
                warn!("Article page produced no extractable text");
            } else {
                info!(bytes = text.len(), "Fetched article");
            }
            Some(text)
        }
        Err(e) => {
            error!(error = %e, %url, "Error fetching article");
            None
        }
    }
}

fn try_fetch(url: &str) -> Result<String, Box<dyn Error>> {
    let parsed = Url::parse(url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported URL scheme {:?}", parsed.scheme()).into());
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let body = client.get(parsed).send()?.error_for_status()?.text()?;
    debug!(bytes = body.len(), preview = %truncate_for_log(&body, 200), "Downloaded article HTML");

    Ok(extract_article_text(&body))
}

/// Extract the main text of an article page.
///
/// Candidate containers are tried in order: `[itemprop="articleBody"]`,
/// `article`, `main`, `[role="main"]`, then `body`. The first kind that
/// holds any paragraph text wins, and among several matches of that kind
/// the one with the most paragraph text is used. Its `p`, `h2`, `h3`, `li`, and
/// `blockquote` blocks are returned with whitespace collapsed, joined by a
/// blank line. Blocks nested in another block are not repeated, and text
/// inside `script`, `style`, and `noscript` is ignored.
///
/// # Examples
///
/// ```
/// use news_xml::fetch::extract_article_text;
///
/// let html = "<html><body><nav><a>Home</a></nav>\
///             <article><h2>Storm</h2><p>Gales  expected.</p></article></body></html>";
/// assert_eq!(extract_article_text(html), "Storm\n\nGales expected.");
/// ```
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let (Some(blocks), Some(paragraphs)) = (BLOCK_SELECTOR.as_ref(), PARAGRAPH_SELECTOR.as_ref())
    else {
        return String::new();
    };

    let mut chosen = None;
    let mut fallback = None;
    for selector in CONTAINER_SELECTORS.iter() {
        let mut best: Option<(ElementRef<'_>, usize)> = None;
        for container in document.select(selector) {
            let score: usize = container
                .select(paragraphs)
                .map(|p| visible_text(p).trim().len())
                .sum();
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((container, score));
            }
        }
        match best {
            Some((container, score)) if score > 0 => {
                chosen = Some(container);
                break;
            }
            Some((container, _)) if fallback.is_none() => fallback = Some(container),
            _ => {}
        }
    }

    let Some(container) = chosen.or(fallback) else {
        return String::new();
    };

    container
        .select(blocks)
        .filter(|block| !inside_block(*block, container))
        .map(|block| collapse_whitespace(&visible_text(block)))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text of `element`, skipping script-like descendants.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// True if a block element sits inside another block below `container`.
fn inside_block(block: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    for ancestor in block.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.id() == container.id() {
            return false;
        }
        if BLOCK_TAGS.contains(&ancestor.value().name()) {
            return true;
        }
    }
    false
}
