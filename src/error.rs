//! Error types for XML parsing, serialization, and schema validation.
//!
//! Two propagation policies coexist in this crate. The XML helpers
//! ([`crate::xml`], [`crate::articles`]) return these errors to the caller,
//! while [`crate::fetch::fetch_full_article`] and
//! [`crate::schema::validate_xml`] log them and return a default value.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, parsing, or writing XML.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed {
        /// Byte offset reported by the reader
        position: u64,
        /// Description of the problem
        message: String,
    },

    /// I/O error while writing XML
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level reader/writer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The value could not be converted to JSON for serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generated output was not valid UTF-8
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Input shape the serializer does not handle
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// Errors raised while loading or compiling an XSD schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema document itself could not be read or parsed.
    #[error("schema document: {0}")]
    Document(#[from] XmlError),

    /// A schema construct outside the supported subset
    #[error("unsupported schema construct: {0}")]
    Unsupported(String),

    /// A `type`, `ref`, `base`, or group reference that names nothing
    #[error("unresolved {kind} reference: {name}")]
    Unresolved {
        /// Kind of component (type, element, group, ...)
        kind: &'static str,
        /// The reference as written in the schema
        name: String,
    },

    /// The schema is structurally invalid.
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// A single schema violation found in an instance document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending element, e.g. `/articles/article[2]/url`
    pub path: String,
    /// What is wrong at that location
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found while validating one document, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    /// Number of violations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no violation was recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the violations
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Violations {}

/// Outcome of [`crate::schema::validate_file`] when the document is not accepted.
///
/// Unlike [`crate::schema::validate_xml`], this keeps schema violations
/// apart from load and compile failures.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// The instance was read and checked, and it does not conform.
    #[error("document does not conform to schema:\n{0}")]
    Invalid(Violations),

    /// The schema could not be loaded or compiled.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// The instance document could not be read or parsed.
    #[error("instance document: {0}")]
    Document(#[from] XmlError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_display_one_per_line() {
        let v = Violations(vec![
            Violation {
                path: "/a".to_string(),
                message: "first".to_string(),
            },
            Violation {
                path: "/a/b".to_string(),
                message: "second".to_string(),
            },
        ]);
        assert_eq!(v.to_string(), "/a: first\n/a/b: second");
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_read_error_mentions_path() {
        let err = XmlError::Read {
            path: PathBuf::from("/nope/articles.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/articles.xml"));
    }
}
