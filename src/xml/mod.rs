//! XML reading and writing.
//!
//! - [`document`]: the read-only [`XmlDocument`] tree used by the article
//!   parsers and the schema validator
//! - [`serialize`]: [`dict_to_xml`], turning mappings and sequences into
//!   pretty-printed XML

pub mod document;
pub mod serialize;

pub use document::{XmlAttribute, XmlDocument, XmlElement, XmlNode};
pub use serialize::{dict_to_xml, value_to_xml, XmlOptions};
