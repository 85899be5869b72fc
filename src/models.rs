//! Article records read from XML.
//!
//! - [`ArticleRecord`]: the seven-field record produced by
//!   [`crate::articles::parse_xml`] from the canonical article schema
//! - [`ArticleContent`]: the three-field record produced by
//!   [`crate::articles::extract_article_content_from_xml`]
//!
//! Every field is optional. A field that is missing from the source document
//! is `None`, never an empty string.

use serde::{Deserialize, Serialize};

/// One article from a document following the canonical schema.
///
/// ```xml
/// <article>
///   <title>...</title>
///   <author>...</author>
///   <description>...</description>
///   <source><name>...</name></source>
///   <publishedAt>...</publishedAt>
///   <url>...</url>
///   <full_content>...</full_content>
/// </article>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Headline.
    pub title: Option<String>,
    /// Byline.
    pub author: Option<String>,
    /// Short summary or standfirst.
    pub description: Option<String>,
    /// Name of the publishing outlet, read from `source/name`.
    pub source_name: Option<String>,
    /// Publication timestamp as written in `publishedAt`.
    pub published_at: Option<String>,
    /// Canonical article URL.
    pub url: Option<String>,
    /// Full article text.
    pub full_content: Option<String>,
}

/// The fields recovered by the depth-unbounded extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleContent {
    pub title: Option<String>,
    pub author: Option<String>,
    pub full_content: Option<String>,
}
