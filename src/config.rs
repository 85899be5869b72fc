//! YAML configuration for the `news_xml` binary.
//!
//! Every key is optional; missing keys fall back to the library defaults.
//!
//! ```yaml
//! xml:
//!   root_name: articles
//!   item_name: article
//! ```
//!
//! Command-line flags take precedence over the file.

use crate::xml::XmlOptions;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Element names used by `to-xml`
    pub xml: XmlOptions,
}

impl Config {
    /// Load a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure. Unknown keys are rejected so typos surface early.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        let config = Self::from_yaml(&raw)?;
        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from YAML text. An empty document yields the defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.xml.root_name, "root");
        assert_eq!(config.xml.item_name, "item");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml("xml:\n  root_name: articles\n").unwrap();
        assert_eq!(config.xml.root_name, "articles");
        assert_eq!(config.xml.item_name, "item");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml("xml:\n  rot_name: typo\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "xml:\n  root_name: feed\n  item_name: entry").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.xml, XmlOptions::new("feed", "entry"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("missing.yaml")).is_err());
        assert_eq!(Config::load_or_default(None).unwrap(), Config::default());
    }
}
