//! Compiled schema components.
//!
//! Components live in arenas on [`Schema`] and refer to each other by index,
//! which lets recursive and forward references resolve without reference
//! counting.

use super::types::{Builtin, WhiteSpace};
use regex::Regex;
use std::collections::HashMap;

/// Namespace of XML Schema itself.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
/// Namespace of `xsi:nil`, `xsi:type`, and schema location hints.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// A compiled XSD schema, ready to validate any number of documents.
#[derive(Debug, Default)]
pub struct Schema {
    pub(crate) target_namespace: Option<String>,
    pub(crate) elements: Vec<ElementDecl>,
    pub(crate) simple_types: Vec<SimpleType>,
    pub(crate) complex_types: Vec<ComplexType>,
    /// Global element declarations by local name
    pub(crate) global_elements: HashMap<String, usize>,
    /// Named types by local name
    pub(crate) named_types: HashMap<String, TypeRef>,
}

/// Reference to a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeRef {
    /// `xs:anyType`: any attributes, any content
    AnyType,
    Builtin(Builtin),
    Simple(usize),
    Complex(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementDecl {
    pub name: String,
    pub namespace: Option<String>,
    pub type_ref: TypeRef,
    pub nillable: bool,
    pub fixed: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimpleType {
    pub variety: Variety,
    pub facets: Facets,
}

#[derive(Debug, Clone)]
pub(crate) enum Variety {
    /// Restriction of another simple type
    Atomic(TypeRef),
    /// Whitespace-separated list of the item type
    List(TypeRef),
    Union(Vec<TypeRef>),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Facets {
    pub enumeration: Vec<String>,
    /// Source text and anchored regex; patterns of one restriction are OR'd
    pub pattern: Option<(String, Regex)>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub total_digits: Option<usize>,
    pub fraction_digits: Option<usize>,
    pub white_space: Option<WhiteSpace>,
}

#[derive(Debug, Clone)]
pub(crate) struct ComplexType {
    pub mixed: bool,
    pub content: Content,
    pub attributes: Vec<AttributeUse>,
    pub any_attribute: Option<Wildcard>,
    /// Derivation from another complex type, merged in once all bodies are compiled
    pub pending: Option<Derivation>,
}

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Empty,
    Simple(TypeRef),
    Elements(Particle),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Derivation {
    /// `complexContent/extension` of complex type `base`
    Extend { base: usize },
    /// `complexContent/restriction` of complex type `base`
    Restrict { base: usize },
    /// `simpleContent/extension` of complex type `base`
    ExtendSimple { base: usize },
    /// `simpleContent/restriction` of complex type `base`; `facets` is the
    /// simple type carrying the restriction's facets
    RestrictSimple { base: usize, facets: usize },
}

impl Derivation {
    pub fn base(self) -> usize {
        match self {
            Derivation::Extend { base }
            | Derivation::Restrict { base }
            | Derivation::ExtendSimple { base }
            | Derivation::RestrictSimple { base, .. } => base,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeUse {
    pub name: String,
    pub namespace: Option<String>,
    pub type_ref: TypeRef,
    pub required: bool,
    pub prohibited: bool,
    pub fixed: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Particle {
    pub min: u32,
    /// `None` for `maxOccurs="unbounded"`
    pub max: Option<u32>,
    pub term: Term,
}

impl Particle {
    pub fn once(term: Term) -> Self {
        Self {
            min: 1,
            max: Some(1),
            term,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Term {
    Element(usize),
    Any(Wildcard),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    All(Vec<Particle>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NamespaceConstraint {
    Any,
    /// `##other`: any namespace except the target and except no namespace
    Other(Option<String>),
    /// Explicit list; `None` stands for `##local`
    List(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wildcard {
    pub namespaces: NamespaceConstraint,
    pub process: ProcessContents,
}

impl Wildcard {
    /// True if an item in namespace `ns` is allowed by this wildcard.
    pub fn allows(&self, ns: Option<&str>) -> bool {
        match &self.namespaces {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => ns.is_some() && ns != target.as_deref(),
            NamespaceConstraint::List(list) => list.iter().any(|n| n.as_deref() == ns),
        }
    }
}

impl Schema {
    /// Global element declaration for `{ns}local`, if any.
    pub(crate) fn global_element(&self, ns: Option<&str>, local: &str) -> Option<usize> {
        if ns != self.target_namespace.as_deref() {
            return None;
        }
        self.global_elements.get(local).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wildcard(namespaces: NamespaceConstraint) -> Wildcard {
        Wildcard {
            namespaces,
            process: ProcessContents::Lax,
        }
    }

    #[test]
    fn test_wildcard_any() {
        let w = wildcard(NamespaceConstraint::Any);
        assert!(w.allows(None));
        assert!(w.allows(Some("urn:x")));
    }

    #[test]
    fn test_wildcard_other_excludes_target_and_local() {
        let w = wildcard(NamespaceConstraint::Other(Some("urn:t".to_string())));
        assert!(!w.allows(None));
        assert!(!w.allows(Some("urn:t")));
        assert!(w.allows(Some("urn:x")));
    }

    #[test]
    fn test_wildcard_list_with_local() {
        let w = wildcard(NamespaceConstraint::List(vec![None, Some("urn:a".to_string())]));
        assert!(w.allows(None));
        assert!(w.allows(Some("urn:a")));
        assert!(!w.allows(Some("urn:b")));
    }
}
