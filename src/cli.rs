//! Command-line interface definitions for `news_xml`.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. The configuration file can also be given through the
//! `NEWS_XML_CONFIG` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the `news_xml` tool.
///
/// # Examples
///
/// ```sh
/// # Print the main text of an article
/// news_xml fetch https://example.com/story
///
/// # Convert JSON records to XML with custom element names
/// news_xml to-xml --root articles --item article records.json
///
/// # Read articles back as JSON
/// news_xml parse articles.xml
///
/// # Validate against a schema (exit status 1 when invalid)
/// news_xml validate articles.xml articles.xsd
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, global = true, env = "NEWS_XML_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Download an article and print its main text
    Fetch {
        /// Absolute http or https URL
        url: String,
    },

    /// Convert JSON (a mapping or a sequence) to XML
    ToXml {
        /// Name of the document element [config: xml.root_name, default: root]
        #[arg(short, long)]
        root: Option<String>,

        /// Name of the element wrapping sequence members [config: xml.item_name, default: item]
        #[arg(short, long)]
        item: Option<String>,

        /// JSON input file; standard input when omitted
        input: Option<PathBuf>,
    },

    /// Print title, author, and full_content of every article element as JSON
    Extract {
        /// XML file to read
        file: PathBuf,
    },

    /// Print the seven-field records of the root's article children as JSON
    Parse {
        /// XML file to read
        file: PathBuf,
    },

    /// Validate an XML file against an XSD schema
    Validate {
        /// XML instance document
        xml: PathBuf,

        /// XSD schema document
        xsd: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_fetch() {
        let cli = Cli::parse_from(["news_xml", "fetch", "https://example.com/a"]);
        assert_eq!(
            cli.command,
            Command::Fetch {
                url: "https://example.com/a".to_string()
            }
        );
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_cli_to_xml_flags() {
        let cli = Cli::parse_from([
            "news_xml",
            "to-xml",
            "--root",
            "articles",
            "-i",
            "article",
            "records.json",
        ]);
        assert_eq!(
            cli.command,
            Command::ToXml {
                root: Some("articles".to_string()),
                item: Some("article".to_string()),
                input: Some(PathBuf::from("records.json")),
            }
        );
    }

    #[test]
    fn test_cli_to_xml_reads_stdin_by_default() {
        let cli = Cli::parse_from(["news_xml", "to-xml"]);
        assert_eq!(
            cli.command,
            Command::ToXml {
                root: None,
                item: None,
                input: None,
            }
        );
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::parse_from(["news_xml", "parse", "feed.xml", "--config", "news.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("news.yaml")));
        assert_eq!(
            cli.command,
            Command::Parse {
                file: PathBuf::from("feed.xml")
            }
        );
    }

    #[test]
    fn test_cli_validate_needs_two_paths() {
        assert!(Cli::try_parse_from(["news_xml", "validate", "a.xml"]).is_err());
        let cli = Cli::parse_from(["news_xml", "-c", "cfg.yaml", "validate", "a.xml", "a.xsd"]);
        assert_eq!(
            cli.command,
            Command::Validate {
                xml: PathBuf::from("a.xml"),
                xsd: PathBuf::from("a.xsd"),
            }
        );
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
