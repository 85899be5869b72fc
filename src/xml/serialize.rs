//! Convert mappings and sequences into pretty-printed XML.
//!
//! Input is anything `serde` can serialize. It is first turned into a
//! [`serde_json::Value`] (with key order preserved) and then written with the
//! indenting `quick-xml` writer:
//!
//! ```text
//! {"title": "A", "tags": ["x", "y"]}
//!
//! <?xml version="1.0"?>
//! <root>
//!     <title>A</title>
//!     <tags>
//!         <item>x</item>
//!         <item>y</item>
//!     </tags>
//! </root>
//! ```

use crate::error::XmlError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Element naming used by [`dict_to_xml`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XmlOptions {
    /// Name of the document element.
    pub root_name: String,
    /// Name of the element wrapping every sequence member.
    pub item_name: String,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            root_name: "root".to_string(),
            item_name: "item".to_string(),
        }
    }
}

impl XmlOptions {
    /// Options with explicit root and item names.
    pub fn new(root_name: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            item_name: item_name.into(),
        }
    }
}

/// Convert a mapping or a sequence of mappings to a pretty-printed XML string.
///
/// The root element is named `options.root_name`. Mapping keys become child
/// elements in insertion order. Every sequence member, at any depth, is
/// wrapped in an element named `options.item_name`. Nulls, empty strings,
/// and empty containers become self-closed elements. No type attributes are
/// written.
///
/// Keys that are not usable as element names are rewritten: all-digit keys
/// get an `n` prefix, spaces become underscores, and anything still invalid
/// is written as `<key name="original">`.
///
/// # Arguments
///
/// * `data` - A value serializing to a JSON object or array
/// * `options` - Root and item element names
///
/// # Returns
///
/// The document with an XML declaration, tab indentation, and a trailing
/// newline.
///
/// # Errors
///
/// * [`XmlError::Unsupported`] if `data` is not a mapping or sequence, or if
///   a configured element name is not a valid XML name
/// * [`XmlError::Json`] if `data` cannot be serialized
///
/// # Examples
///
/// ```
/// use news_xml::xml::{dict_to_xml, XmlOptions};
/// use serde_json::json;
///
/// let xml = dict_to_xml(&json!([{"title": "A"}]), &XmlOptions::default()).unwrap();
/// assert!(xml.contains("<item>"));
/// assert!(xml.contains("<title>A</title>"));
/// ```
#[instrument(level = "debug", skip_all, fields(root = %options.root_name, item = %options.item_name))]
pub fn dict_to_xml<T>(data: &T, options: &XmlOptions) -> Result<String, XmlError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(data)?;
    value_to_xml(&value, options)
}

/// Same as [`dict_to_xml`] for a value that is already a [`Value`].
pub fn value_to_xml(value: &Value, options: &XmlOptions) -> Result<String, XmlError> {
    match value {
        Value::Object(_) | Value::Array(_) => {}
        other => {
            return Err(XmlError::Unsupported(format!(
                "expected a mapping or a sequence, got {}",
                kind_of(other)
            )));
        }
    }
    for name in [&options.root_name, &options.item_name] {
        if !is_valid_xml_name(name) {
            return Err(XmlError::Unsupported(format!(
                "{name:?} is not a valid element name"
            )));
        }
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    write_value(&mut writer, &options.root_name, None, value, options)?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    debug!(bytes = xml.len(), "Serialized value to XML");
    Ok(xml)
}

fn write_value(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    name_attr: Option<&str>,
    value: &Value,
    options: &XmlOptions,
) -> Result<(), XmlError> {
    let mut start = BytesStart::new(tag);
    if let Some(original) = name_attr {
        start.push_attribute(("name", original));
    }

    match value {
        Value::Null => writer.write_event(Event::Empty(start))?,
        Value::String(s) if s.is_empty() => writer.write_event(Event::Empty(start))?,
        Value::Object(map) if map.is_empty() => writer.write_event(Event::Empty(start))?,
        Value::Array(items) if items.is_empty() => writer.write_event(Event::Empty(start))?,
        Value::Object(map) => {
            writer.write_event(Event::Start(start))?;
            for (key, child) in map {
                let (child_tag, original) = element_name(key);
                write_value(writer, &child_tag, original, child, options)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        Value::Array(items) => {
            writer.write_event(Event::Start(start))?;
            for item in items {
                write_value(writer, &options.item_name, None, item, options)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        scalar => {
            let text = match scalar {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
    }
    Ok(())
}

/// Pick the element name for a mapping key.
///
/// Returns the name and, when the key had to be replaced entirely, the
/// original key for the `name` attribute.
fn element_name(key: &str) -> (String, Option<&str>) {
    if is_valid_xml_name(key) {
        return (key.to_string(), None);
    }
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        return (format!("n{key}"), None);
    }
    let underscored = key.replace(' ', "_");
    if is_valid_xml_name(&underscored) {
        return (underscored, None);
    }
    ("key".to_string(), Some(key))
}

/// True if `name` can be used as an unprefixed element name.
pub fn is_valid_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
