//! Read-only XML element tree built from `quick-xml` reader events.
//!
//! Documents are parsed in one pass and never mutated afterwards. Character
//! data is kept verbatim: adjacent text, CDATA sections, and entity or
//! character references are merged into a single [`XmlNode::Text`]. Comments
//! and processing instructions inside the root are kept as their own nodes,
//! so they end the current text node and an element that starts with one
//! has no leading text.
//!
//! Elements may nest at most [`MAX_DEPTH`] levels; deeper input is rejected
//! as malformed before the tree is built.
//!
//! Namespace prefixes are resolved while parsing, so every element and
//! attribute carries its namespace URI, and every element can resolve
//! prefixes that are in scope at its position (needed for QName-valued
//! attributes such as `type="xs:string"` in schemas).

use crate::error::XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Namespace bound to the `xml` prefix by definition.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` and `xmlns:*` declarations.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Deepest element nesting accepted by [`XmlDocument::parse`].
pub const MAX_DEPTH: usize = 256;

type Scope = BTreeMap<String, String>;

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    root: XmlElement,
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// A child element
    Element(XmlElement),
    /// Character data between markup
    Text(String),
    /// `<!--...-->` content
    Comment(String),
    /// `<?target data?>` content
    ProcessingInstruction(String),
}

/// An attribute with its namespace resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Name as written, including any prefix
    pub name: String,
    /// Namespace URI; `None` for unprefixed attributes
    pub namespace: Option<String>,
    /// Unescaped value
    pub value: String,
}

impl XmlAttribute {
    /// Name without its prefix.
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// True for `xmlns` and `xmlns:*` declarations.
    pub fn is_namespace_declaration(&self) -> bool {
        self.namespace.as_deref() == Some(XMLNS_NS)
    }
}

/// An element with its attributes and children.
#[derive(Debug, Clone)]
pub struct XmlElement {
    name: String,
    namespace: Option<String>,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlNode>,
    scope: Arc<Scope>,
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.namespace == other.namespace
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl XmlDocument {
    /// Parse a document from a string.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Malformed`] when the input is not well-formed:
    /// mismatched or unclosed tags, more than one root element, text outside
    /// the root, undefined entities, unbound prefixes, elements nested deeper
    /// than [`MAX_DEPTH`], or no root at all.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut text = String::new();

        loop {
            let event = reader.read_event().map_err(|e| malformed(&reader, e))?;
            match event {
                Event::Start(start) => {
                    flush_text(&reader, &mut stack, &mut text)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(malformed(&reader, "more than one root element"));
                    }
                    check_depth(&reader, &stack)?;
                    let element = open_element(&reader, &start, stack.last().map(|e| &e.scope))?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    flush_text(&reader, &mut stack, &mut text)?;
                    check_depth(&reader, &stack)?;
                    let element = open_element(&reader, &start, stack.last().map(|e| &e.scope))?;
                    attach(&reader, &mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    flush_text(&reader, &mut stack, &mut text)?;
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed(&reader, "closing tag without opening tag"))?;
                    attach(&reader, &mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let s = reader.decoder().decode(&t).map_err(|e| malformed(&reader, e))?;
                    text.push_str(&s);
                }
                Event::CData(c) => {
                    let s = reader.decoder().decode(&c).map_err(|e| malformed(&reader, e))?;
                    text.push_str(&s);
                }
                Event::GeneralRef(r) => {
                    if let Some(ch) = r.resolve_char_ref().map_err(|e| malformed(&reader, e))? {
                        text.push(ch);
                    } else {
                        let name = r.decode().map_err(|e| malformed(&reader, e))?;
                        match predefined_entity(&name) {
                            Some(s) => text.push_str(s),
                            None => {
                                return Err(malformed(
                                    &reader,
                                    format!("undefined entity &{name};"),
                                ));
                            }
                        }
                    }
                }
                Event::Comment(c) => {
                    flush_text(&reader, &mut stack, &mut text)?;
                    let s = reader.decoder().decode(&c).map_err(|e| malformed(&reader, e))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Comment(s.into_owned()));
                    }
                }
                Event::PI(pi) => {
                    flush_text(&reader, &mut stack, &mut text)?;
                    let s = reader.decoder().decode(&pi).map_err(|e| malformed(&reader, e))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::ProcessingInstruction(s.into_owned()));
                    }
                }
                Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        flush_text(&reader, &mut stack, &mut text)?;
        if let Some(open) = stack.last() {
            return Err(malformed(&reader, format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| malformed(&reader, "document has no root element"))?;
        Ok(Self { root })
    }

    /// Read a UTF-8 file and parse it.
    ///
    /// # Errors
    ///
    /// [`XmlError::Read`] if the file cannot be read, otherwise the same
    /// errors as [`XmlDocument::parse`].
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, XmlError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| XmlError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(bytes = content.len(), "Read XML file");
        Self::parse(&content)
    }

    /// The document element.
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Every element in document order, starting with the root.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        std::iter::once(&self.root).chain(self.root.descendants())
    }
}

impl XmlElement {
    /// Qualified name as written, e.g. `xs:element`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its prefix.
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Resolved namespace URI, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// True if this element has no namespace and the given local name.
    ///
    /// This is how unprefixed path steps such as `article` match.
    pub fn is_named(&self, name: &str) -> bool {
        self.namespace.is_none() && self.local_name() == name
    }

    /// True if this element is in namespace `ns` with local name `name`.
    pub fn is(&self, ns: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(ns) && self.local_name() == name
    }

    /// All attributes in document order, including namespace declarations.
    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Value of the unprefixed attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of the attribute `name` in namespace `ns`.
    pub fn attribute_ns(&self, ns: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(ns) && a.local_name() == name)
            .map(|a| a.value.as_str())
    }

    /// Child nodes in document order.
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Direct children matching [`XmlElement::is_named`].
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a XmlElement> + use<'a, 'n> {
        self.child_elements().filter(move |e| e.is_named(name))
    }

    /// First direct child matching [`XmlElement::is_named`].
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children_named(name).next()
    }

    /// Direct text children in document order.
    pub fn text_nodes(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// Text that appears before the first child element, comment, or
    /// processing instruction.
    ///
    /// `None` when the element starts with markup or has no content.
    pub fn text(&self) -> Option<&str> {
        match self.children.first() {
            Some(XmlNode::Text(t)) => Some(t),
            _ => None,
        }
    }

    /// Concatenation of every direct text child.
    pub fn direct_text(&self) -> String {
        self.text_nodes().collect()
    }

    /// Descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// Resolve a prefix in the scope of this element.
    ///
    /// The empty prefix resolves the default namespace.
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.scope
            .get(prefix)
            .map(String::as_str)
            .filter(|ns| !ns.is_empty())
    }

    /// Resolve a QName-valued attribute value (such as `xs:string`) to
    /// `(namespace, local_name)`.
    ///
    /// Returns `None` when the prefix is not bound.
    pub fn resolve_qname<'a>(&'a self, qname: &'a str) -> Option<(Option<&'a str>, &'a str)> {
        let (prefix, local) = split_qname(qname.trim());
        match prefix {
            Some(p) => self.lookup_namespace(p).map(|ns| (Some(ns), local)),
            None => Some((self.lookup_namespace(""), local)),
        }
    }
}

/// Pre-order iterator over descendant elements.
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, XmlNode>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(XmlNode::Element(e)) => {
                    self.stack.push(e.children.iter());
                    return Some(e);
                }
                Some(_) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Split `prefix:local` into its parts.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

fn malformed(reader: &Reader<&[u8]>, message: impl Display) -> XmlError {
    XmlError::Malformed {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}

fn check_depth(reader: &Reader<&[u8]>, stack: &[XmlElement]) -> Result<(), XmlError> {
    if stack.len() >= MAX_DEPTH {
        return Err(malformed(
            reader,
            format!("elements nested deeper than {MAX_DEPTH} levels"),
        ));
    }
    Ok(())
}

fn flush_text(
    reader: &Reader<&[u8]>,
    stack: &mut [XmlElement],
    text: &mut String,
) -> Result<(), XmlError> {
    if text.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Text(std::mem::take(text))),
        None if text.trim().is_empty() => text.clear(),
        None => return Err(malformed(reader, "text content outside the root element")),
    }
    Ok(())
}

fn attach(
    reader: &Reader<&[u8]>,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_some() => return Err(malformed(reader, "more than one root element")),
        None => *root = Some(element),
    }
    Ok(())
}

fn open_element(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    parent_scope: Option<&Arc<Scope>>,
) -> Result<XmlElement, XmlError> {
    let decoder = reader.decoder();
    let name = decoder
        .decode(start.name().as_ref())
        .map_err(|e| malformed(reader, e))?
        .into_owned();

    let mut raw = Vec::new();
    let mut declared = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(reader, e))?;
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(|e| malformed(reader, e))?
            .into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(reader, e))?
            .into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
        raw.push((key, value));
    }

    let scope = match (parent_scope, declared.is_empty()) {
        (Some(parent), true) => Arc::clone(parent),
        (parent, _) => {
            let mut scope = parent.map(|p| (**p).clone()).unwrap_or_else(|| {
                let mut s = Scope::new();
                s.insert("xml".to_string(), XML_NS.to_string());
                s
            });
            scope.extend(declared);
            Arc::new(scope)
        }
    };

    let namespace = match split_qname(&name).0 {
        Some(prefix) => Some(
            scope
                .get(prefix)
                .filter(|ns| !ns.is_empty())
                .cloned()
                .ok_or_else(|| malformed(reader, format!("unbound prefix in <{name}>")))?,
        ),
        None => scope.get("").filter(|ns| !ns.is_empty()).cloned(),
    };

    let mut attributes = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let namespace = if key == "xmlns" || key.starts_with("xmlns:") {
            Some(XMLNS_NS.to_string())
        } else {
            match split_qname(&key).0 {
                Some(prefix) => Some(
                    scope
                        .get(prefix)
                        .filter(|ns| !ns.is_empty())
                        .cloned()
                        .ok_or_else(|| {
                            malformed(reader, format!("unbound prefix in attribute {key}"))
                        })?,
                ),
                None => None,
            }
        };
        attributes.push(XmlAttribute {
            name: key,
            namespace,
            value,
        });
    }

    Ok(XmlElement {
        name,
        namespace,
        attributes,
        children: Vec::new(),
        scope,
    })
}
