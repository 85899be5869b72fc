//! # news_xml
//!
//! Helpers for a news-article pipeline.
//!
//! | Module | Purpose | On failure |
//! |--------|---------|------------|
//! | [`fetch`] | Download an article page and extract its main text | logs, returns `None` |
//! | [`xml`] | Convert mappings and sequences to pretty-printed XML | `Err(XmlError)` |
//! | [`articles`] | Read article records out of XML files | `Err(XmlError)` |
//! | [`schema`] | Validate XML files against XSD schemas | logs, returns `false` |
//!
//! Supporting modules: [`models`] for the record types, [`error`] for the
//! error enums, [`config`] for the YAML configuration used by the binary,
//! and [`utils`] for string helpers.
//!
//! Every operation is synchronous. Diagnostics are emitted as `tracing`
//! events; install a subscriber to see them.
//!
//! ## Example
//!
//! ```
//! use news_xml::xml::{dict_to_xml, XmlOptions};
//! use serde_json::json;
//!
//! let xml = dict_to_xml(&json!({"title": "Storm"}), &XmlOptions::default()).unwrap();
//! assert!(xml.contains("<root>"));
//! assert!(xml.contains("<title>Storm</title>"));
//! ```

pub mod articles;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod schema;
pub mod utils;
pub mod xml;

pub use articles::{extract_article_content_from_xml, parse_xml};
pub use error::{SchemaError, ValidateError, Violation, Violations, XmlError};
pub use fetch::fetch_full_article;
pub use models::{ArticleContent, ArticleRecord};
pub use schema::{validate_file, validate_xml, Schema};
pub use xml::{dict_to_xml, XmlOptions};
