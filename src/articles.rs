//! Reading article records out of XML files.
//!
//! Two readers with deliberately different reach:
//!
//! | Function | Finds `article` elements | Field lookup | Fields |
//! |----------|--------------------------|--------------|--------|
//! | [`extract_article_content_from_xml`] | anywhere, root included | any descendant | 3 |
//! | [`parse_xml`] | direct children of the root | direct children | 7 |
//!
//! Callers depend on each behavior separately, so the two are kept apart.
//! Both propagate read and parse failures to the caller.

use crate::error::XmlError;
use crate::models::{ArticleContent, ArticleRecord};
use crate::xml::{XmlDocument, XmlElement};
use std::path::Path;
use tracing::{info, instrument};

/// Extract `title`, `author`, and `full_content` from every `article`
/// element in an XML file.
///
/// `article` elements are matched at any depth, including the document
/// element itself, and returned in document order. Each field takes the
/// first text node found directly inside any descendant element of that
/// name, so `<article><meta><title>T</title></meta></article>` yields
/// `title = "T"`.
///
/// # Arguments
///
/// * `path` - Path to a UTF-8 XML file
///
/// # Errors
///
/// [`XmlError::Read`] if the file cannot be read, [`XmlError::Malformed`]
/// if it is not well-formed XML.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn extract_article_content_from_xml(
    path: impl AsRef<Path>,
) -> Result<Vec<ArticleContent>, XmlError> {
    let document = XmlDocument::from_file(path)?;
    let articles = extract_article_content(&document);
    info!(count = articles.len(), "Extracted article content");
    Ok(articles)
}

/// Document-level half of [`extract_article_content_from_xml`].
pub fn extract_article_content(document: &XmlDocument) -> Vec<ArticleContent> {
    document
        .elements()
        .filter(|e| e.is_named("article"))
        .map(|article| ArticleContent {
            title: first_descendant_text(article, "title"),
            author: first_descendant_text(article, "author"),
            full_content: first_descendant_text(article, "full_content"),
        })
        .collect()
}

/// Parse an XML file of articles following the canonical schema.
///
/// Only direct `article` children of the document element are read, and
/// each field is looked up among the article's direct children by exact
/// name. `publishedAt` maps to `published_at` and `source/name` to
/// `source_name`. Every returned record carries all seven fields.
///
/// # Arguments
///
/// * `path` - Path to a UTF-8 XML file
///
/// # Returns
///
/// One [`ArticleRecord`] per direct `article` child, in document order.
///
/// # Errors
///
/// [`XmlError::Read`] if the file cannot be read, [`XmlError::Malformed`]
/// if it is not well-formed XML.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_xml(path: impl AsRef<Path>) -> Result<Vec<ArticleRecord>, XmlError> {
    let document = XmlDocument::from_file(path)?;
    let articles = parse_articles(&document);
    info!(count = articles.len(), "Parsed articles");
    Ok(articles)
}

/// Document-level half of [`parse_xml`].
pub fn parse_articles(document: &XmlDocument) -> Vec<ArticleRecord> {
    document
        .root()
        .children_named("article")
        .map(|article| ArticleRecord {
            title: child_text(article, "title"),
            author: child_text(article, "author"),
            description: child_text(article, "description"),
            source_name: article
                .children_named("source")
                .flat_map(|source| source.children_named("name"))
                .next()
                .and_then(XmlElement::text)
                .map(str::to_owned),
            published_at: child_text(article, "publishedAt"),
            url: child_text(article, "url"),
            full_content: child_text(article, "full_content"),
        })
        .collect()
}

fn child_text(element: &XmlElement, name: &str) -> Option<String> {
    element.child(name).and_then(XmlElement::text).map(str::to_owned)
}

fn first_descendant_text(element: &XmlElement, name: &str) -> Option<String> {
    element
        .descendants()
        .filter(|d| d.is_named(name))
        .flat_map(|d| d.text_nodes())
        .next()
        .map(str::to_owned)
}
