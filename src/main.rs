//! # news_xml
//!
//! Command-line driver for the `news_xml` library: fetch article text,
//! convert JSON records to XML, read article XML back as JSON, and validate
//! XML against XSD schemas.
//!
//! ## Usage
//!
//! ```sh
//! news_xml fetch https://example.com/story
//! news_xml to-xml --root articles --item article records.json > articles.xml
//! news_xml parse articles.xml
//! news_xml validate articles.xml articles.xsd
//! ```
//!
//! Results go to standard output. Logs go to standard error and follow
//! `RUST_LOG` (default `info`).
//!
//! ## Exit status
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 0 | Success |
//! | 1 | `fetch` got no article, `validate` rejected the document, or a command failed |
//! | 2 | Bad arguments |

use clap::Parser;
use news_xml::articles::{extract_article_content_from_xml, parse_xml};
use news_xml::config::Config;
use news_xml::fetch::fetch_full_article;
use news_xml::schema::validate_xml;
use news_xml::xml::{value_to_xml, XmlOptions};
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::{Cli, Command};

fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(io::stderr)
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = Config::load_or_default(args.config.as_deref())?;
    let status = run(args.command, &config)?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(status)
}

#[instrument(level = "info", skip_all)]
fn run(command: Command, config: &Config) -> Result<ExitCode, Box<dyn Error>> {
    let mut stdout = io::stdout().lock();

    match command {
        Command::Fetch { url } => match fetch_full_article(&url) {
            Some(text) => writeln!(stdout, "{text}")?,
            None => return Ok(ExitCode::FAILURE),
        },

        Command::ToXml { root, item, input } => {
            let raw = match input {
                Some(path) => fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let value: Value = serde_json::from_str(&raw)?;
            let options = XmlOptions {
                root_name: root.unwrap_or_else(|| config.xml.root_name.clone()),
                item_name: item.unwrap_or_else(|| config.xml.item_name.clone()),
            };
            write!(stdout, "{}", value_to_xml(&value, &options)?)?;
        }

        Command::Extract { file } => {
            let articles = extract_article_content_from_xml(&file)?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&articles)?)?;
        }

        Command::Parse { file } => {
            let articles = parse_xml(&file)?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&articles)?)?;
        }

        Command::Validate { xml, xsd } => {
            if !validate_xml(&xml, &xsd) {
                return Ok(ExitCode::FAILURE);
            }
            writeln!(stdout, "valid")?;
        }
    }

    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}
