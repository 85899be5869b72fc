//! Compiling an `xs:schema` document into [`Schema`] components.
//!
//! Compilation runs in three passes:
//!
//! 1. **Register** every top-level named component so references can point
//!    forward.
//! 2. **Compile** bodies of named types and global elements. Anonymous types
//!    and local elements are appended to the arenas as they are met.
//! 3. **Finalize** complex type derivations, merging base content and
//!    attributes once every base has its own body.

use super::model::{
    AttributeUse, ComplexType, Content, Derivation, ElementDecl, Facets, NamespaceConstraint,
    Particle, ProcessContents, Schema, SimpleType, Term, TypeRef, Variety, Wildcard, XSD_NS,
};
use super::types::{translate_pattern, Builtin, WhiteSpace};
use crate::error::SchemaError;
use crate::xml::{XmlDocument, XmlElement};
use regex::Regex;
use std::collections::HashMap;
use std::mem;
use tracing::debug;

/// Deepest nesting of group and attribute group references.
const MAX_GROUP_DEPTH: usize = 32;

/// Compile a parsed schema document.
pub(crate) fn compile(document: &XmlDocument) -> Result<Schema, SchemaError> {
    let root = document.root();
    if !root.is(XSD_NS, "schema") {
        return Err(SchemaError::Invalid(format!(
            "document element <{}> is not xs:schema",
            root.name()
        )));
    }

    let mut compiler = Compiler::new(root);
    compiler.register()?;
    compiler.compile_bodies()?;
    compiler.finalize()?;

    let schema = compiler.schema;
    debug!(
        elements = schema.elements.len(),
        simple_types = schema.simple_types.len(),
        complex_types = schema.complex_types.len(),
        "Compiled schema"
    );
    Ok(schema)
}

struct Compiler<'d> {
    root: &'d XmlElement,
    target: Option<String>,
    elements_qualified: bool,
    attributes_qualified: bool,
    schema: Schema,
    groups: HashMap<String, &'d XmlElement>,
    attribute_groups: HashMap<String, &'d XmlElement>,
    global_attributes: HashMap<String, &'d XmlElement>,
    depth: usize,
}

/// Schema children in the XSD namespace, annotations skipped.
fn xs_children(element: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    element
        .child_elements()
        .filter(|c| c.namespace() == Some(XSD_NS) && c.local_name() != "annotation")
}

fn xs_child<'a>(element: &'a XmlElement, name: &str) -> Option<&'a XmlElement> {
    xs_children(element).find(|c| c.local_name() == name)
}

fn required_attribute<'a>(element: &'a XmlElement, name: &str) -> Result<&'a str, SchemaError> {
    element.attribute(name).ok_or_else(|| {
        SchemaError::Invalid(format!("<xs:{}> is missing @{name}", element.local_name()))
    })
}

fn flag(element: &XmlElement, name: &str) -> bool {
    matches!(element.attribute(name).map(str::trim), Some("true" | "1"))
}

fn occurs(element: &XmlElement) -> Result<(u32, Option<u32>), SchemaError> {
    let parse = |name: &str, default: u32| -> Result<u32, SchemaError> {
        match element.attribute(name).map(str::trim) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|_| SchemaError::Invalid(format!("@{name}={v:?} is not a count"))),
        }
    };
    let min = parse("minOccurs", 1)?;
    let max = match element.attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => None,
        _ => Some(parse("maxOccurs", 1)?),
    };
    if max.is_some_and(|max| max < min) {
        return Err(SchemaError::Invalid(format!(
            "maxOccurs is below minOccurs on <xs:{}>",
            element.local_name()
        )));
    }
    Ok((min, max))
}

fn parse_facet_count(element: &XmlElement) -> Result<usize, SchemaError> {
    let value = required_attribute(element, "value")?;
    value.trim().parse().map_err(|_| {
        SchemaError::Invalid(format!("{} facet {value:?} is not a count", element.local_name()))
    })
}

impl<'d> Compiler<'d> {
    fn new(root: &'d XmlElement) -> Self {
        let target = root.attribute("targetNamespace").map(str::to_owned);
        Self {
            root,
            schema: Schema {
                target_namespace: target.clone(),
                ..Schema::default()
            },
            target,
            elements_qualified: root.attribute("elementFormDefault") == Some("qualified"),
            attributes_qualified: root.attribute("attributeFormDefault") == Some("qualified"),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
            global_attributes: HashMap::new(),
            depth: 0,
        }
    }

    fn register(&mut self) -> Result<(), SchemaError> {
        let root = self.root;
        for child in xs_children(root) {
            match child.local_name() {
                "element" => {
                    let name = required_attribute(child, "name")?;
                    let id = self.schema.elements.len();
                    self.schema.elements.push(ElementDecl {
                        name: name.to_string(),
                        namespace: self.target.clone(),
                        type_ref: TypeRef::AnyType,
                        nillable: false,
                        fixed: None,
                    });
                    if self.schema.global_elements.insert(name.to_string(), id).is_some() {
                        return Err(SchemaError::Invalid(format!("duplicate element {name}")));
                    }
                }
                "complexType" => {
                    let name = required_attribute(child, "name")?;
                    let id = self.push_complex(empty_complex());
                    self.register_type(name, TypeRef::Complex(id))?;
                }
                "simpleType" => {
                    let name = required_attribute(child, "name")?;
                    let id = self.push_simple(SimpleType {
                        variety: Variety::Atomic(TypeRef::Builtin(Builtin::AnySimpleType)),
                        facets: Facets::default(),
                    });
                    self.register_type(name, TypeRef::Simple(id))?;
                }
                "group" => {
                    self.groups
                        .insert(required_attribute(child, "name")?.to_string(), child);
                }
                "attributeGroup" => {
                    self.attribute_groups
                        .insert(required_attribute(child, "name")?.to_string(), child);
                }
                "attribute" => {
                    self.global_attributes
                        .insert(required_attribute(child, "name")?.to_string(), child);
                }
                "notation" => {}
                other @ ("include" | "import" | "redefine" | "override") => {
                    return Err(SchemaError::Unsupported(format!("xs:{other}")));
                }
                other => {
                    return Err(SchemaError::Invalid(format!(
                        "unexpected top-level xs:{other}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn register_type(&mut self, name: &str, type_ref: TypeRef) -> Result<(), SchemaError> {
        if self
            .schema
            .named_types
            .insert(name.to_string(), type_ref)
            .is_some()
        {
            return Err(SchemaError::Invalid(format!("duplicate type {name}")));
        }
        Ok(())
    }

    fn compile_bodies(&mut self) -> Result<(), SchemaError> {
        let root = self.root;
        for child in xs_children(root) {
            let Some(name) = child.attribute("name") else {
                continue;
            };
            match child.local_name() {
                "element" => {
                    let id = self.schema.global_elements[name];
                    let decl = self.compile_element_decl(child, true)?;
                    self.schema.elements[id] = decl;
                }
                "complexType" => {
                    if let Some(TypeRef::Complex(id)) = self.schema.named_types.get(name).copied() {
                        let body = self.compile_complex(child)?;
                        self.schema.complex_types[id] = body;
                    }
                }
                "simpleType" => {
                    if let Some(TypeRef::Simple(id)) = self.schema.named_types.get(name).copied() {
                        let body = self.compile_simple(child)?;
                        self.schema.simple_types[id] = body;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_simple(&mut self, simple: SimpleType) -> usize {
        self.schema.simple_types.push(simple);
        self.schema.simple_types.len() - 1
    }

    fn push_complex(&mut self, complex: ComplexType) -> usize {
        self.schema.complex_types.push(complex);
        self.schema.complex_types.len() - 1
    }

    /// Resolve a QName written on `context` to a type.
    fn resolve_type(&self, context: &XmlElement, qname: &str) -> Result<TypeRef, SchemaError> {
        let unresolved = || SchemaError::Unresolved {
            kind: "type",
            name: qname.to_string(),
        };
        let (ns, local) = context.resolve_qname(qname.trim()).ok_or_else(unresolved)?;
        if ns == Some(XSD_NS) {
            if local == "anyType" {
                return Ok(TypeRef::AnyType);
            }
            if let Some(builtin) = Builtin::from_name(local) {
                return Ok(TypeRef::Builtin(builtin));
            }
        }
        // A schema without a target namespace may still default to the XSD
        // namespace, so its own types are also tried from there.
        if ns == self.target.as_deref() || (ns == Some(XSD_NS) && self.target.is_none()) {
            if let Some(found) = self.schema.named_types.get(local) {
                return Ok(*found);
            }
        }
        Err(unresolved())
    }

    /// Resolve a QName naming a top-level component in the target namespace.
    fn resolve_local_name<'a>(
        &self,
        context: &'a XmlElement,
        qname: &'a str,
        kind: &'static str,
    ) -> Result<&'a str, SchemaError> {
        match context.resolve_qname(qname.trim()) {
            Some((ns, local)) if ns == self.target.as_deref() || self.target.is_none() => Ok(local),
            _ => Err(SchemaError::Unresolved {
                kind,
                name: qname.to_string(),
            }),
        }
    }

    fn enter(&mut self, what: &str) -> Result<(), SchemaError> {
        self.depth += 1;
        if self.depth > MAX_GROUP_DEPTH {
            return Err(SchemaError::Invalid(format!("{what} references nest too deeply")));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- elements ----

    fn compile_element_decl(
        &mut self,
        element: &XmlElement,
        global: bool,
    ) -> Result<ElementDecl, SchemaError> {
        let name = required_attribute(element, "name")?;
        if element.attribute("substitutionGroup").is_some() {
            return Err(SchemaError::Unsupported(format!(
                "substitutionGroup on element {name}"
            )));
        }
        if let Some(constraint) = xs_children(element)
            .find(|c| matches!(c.local_name(), "key" | "keyref" | "unique"))
        {
            return Err(SchemaError::Unsupported(format!(
                "identity constraint xs:{} on element {name}",
                constraint.local_name()
            )));
        }

        let type_ref = if let Some(qname) = element.attribute("type") {
            self.resolve_type(element, qname)?
        } else if let Some(inline) = xs_child(element, "complexType") {
            let body = self.compile_complex(inline)?;
            TypeRef::Complex(self.push_complex(body))
        } else if let Some(inline) = xs_child(element, "simpleType") {
            let body = self.compile_simple(inline)?;
            TypeRef::Simple(self.push_simple(body))
        } else {
            TypeRef::AnyType
        };

        let qualified = match element.attribute("form") {
            Some(form) => form == "qualified",
            None => global || self.elements_qualified,
        };

        Ok(ElementDecl {
            name: name.to_string(),
            namespace: if qualified { self.target.clone() } else { None },
            type_ref,
            nillable: flag(element, "nillable"),
            fixed: element.attribute("fixed").map(str::to_owned),
        })
    }

    fn compile_element_particle(&mut self, element: &XmlElement) -> Result<Particle, SchemaError> {
        let (min, max) = occurs(element)?;
        let id = if let Some(reference) = element.attribute("ref") {
            let local = self.resolve_local_name(element, reference, "element")?;
            self.schema
                .global_elements
                .get(local)
                .copied()
                .ok_or_else(|| SchemaError::Unresolved {
                    kind: "element",
                    name: reference.to_string(),
                })?
        } else {
            let decl = self.compile_element_decl(element, false)?;
            self.schema.elements.push(decl);
            self.schema.elements.len() - 1
        };
        Ok(Particle {
            min,
            max,
            term: Term::Element(id),
        })
    }

    // ---- model groups ----

    /// Compile `sequence`, `choice`, `all`, `any`, `element`, or a `group` reference.
    fn compile_particle(&mut self, element: &XmlElement) -> Result<Particle, SchemaError> {
        match element.local_name() {
            "element" => self.compile_element_particle(element),
            "any" => {
                let (min, max) = occurs(element)?;
                Ok(Particle {
                    min,
                    max,
                    term: Term::Any(self.wildcard(element)),
                })
            }
            "group" => self.compile_group_ref(element),
            kind @ ("sequence" | "choice" | "all") => {
                let (min, max) = occurs(element)?;
                let items = xs_children(element)
                    .map(|item| self.compile_particle(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let term = match kind {
                    "sequence" => Term::Sequence(items),
                    "choice" => Term::Choice(items),
                    _ => Term::All(items),
                };
                Ok(Particle { min, max, term })
            }
            other => Err(SchemaError::Invalid(format!(
                "xs:{other} is not allowed in a content model"
            ))),
        }
    }

    fn compile_group_ref(&mut self, element: &XmlElement) -> Result<Particle, SchemaError> {
        let reference = required_attribute(element, "ref")?;
        let local = self.resolve_local_name(element, reference, "group")?;
        let definition = *self.groups.get(local).ok_or_else(|| SchemaError::Unresolved {
            kind: "group",
            name: reference.to_string(),
        })?;
        let model = xs_children(definition)
            .find(|c| matches!(c.local_name(), "sequence" | "choice" | "all"))
            .ok_or_else(|| SchemaError::Invalid(format!("group {local} has no model group")))?;

        self.enter("group")?;
        let inner = self.compile_particle(model);
        self.leave();

        let (min, max) = occurs(element)?;
        Ok(Particle {
            min,
            max,
            term: inner?.term,
        })
    }

    fn wildcard(&self, element: &XmlElement) -> Wildcard {
        let process = match element.attribute("processContents") {
            Some("lax") => ProcessContents::Lax,
            Some("skip") => ProcessContents::Skip,
            _ => ProcessContents::Strict,
        };
        let namespaces = match element.attribute("namespace").map(str::trim) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Other(self.target.clone()),
            Some(list) => NamespaceConstraint::List(
                list.split_whitespace()
                    .map(|token| match token {
                        "##local" => None,
                        "##targetNamespace" => self.target.clone(),
                        uri => Some(uri.to_string()),
                    })
                    .collect(),
            ),
        };
        Wildcard {
            namespaces,
            process,
        }
    }

    // ---- attributes ----

    fn compile_attribute(&mut self, element: &XmlElement) -> Result<AttributeUse, SchemaError> {
        let use_ = element.attribute("use").unwrap_or("optional");
        let mut attribute = if let Some(reference) = element.attribute("ref") {
            let local = self.resolve_local_name(element, reference, "attribute")?;
            let definition =
                *self
                    .global_attributes
                    .get(local)
                    .ok_or_else(|| SchemaError::Unresolved {
                        kind: "attribute",
                        name: reference.to_string(),
                    })?;
            let mut global = self.compile_attribute_decl(definition, true)?;
            if let Some(fixed) = element.attribute("fixed") {
                global.fixed = Some(fixed.to_string());
            }
            global
        } else {
            self.compile_attribute_decl(element, false)?
        };
        attribute.required = use_ == "required";
        attribute.prohibited = use_ == "prohibited";
        Ok(attribute)
    }

    fn compile_attribute_decl(
        &mut self,
        element: &XmlElement,
        global: bool,
    ) -> Result<AttributeUse, SchemaError> {
        let name = required_attribute(element, "name")?;
        let type_ref = if let Some(qname) = element.attribute("type") {
            self.resolve_type(element, qname)?
        } else if let Some(inline) = xs_child(element, "simpleType") {
            let body = self.compile_simple(inline)?;
            TypeRef::Simple(self.push_simple(body))
        } else {
            TypeRef::Builtin(Builtin::AnySimpleType)
        };
        let qualified = match element.attribute("form") {
            Some(form) => form == "qualified",
            None => global || self.attributes_qualified,
        };
        Ok(AttributeUse {
            name: name.to_string(),
            namespace: if qualified { self.target.clone() } else { None },
            type_ref,
            required: false,
            prohibited: false,
            fixed: element.attribute("fixed").map(str::to_owned),
        })
    }

    /// Collect `attribute`, `attributeGroup`, and `anyAttribute` children.
    fn compile_attributes(
        &mut self,
        parent: &XmlElement,
        complex: &mut ComplexType,
    ) -> Result<(), SchemaError> {
        for child in xs_children(parent) {
            match child.local_name() {
                "attribute" => {
                    let attribute = self.compile_attribute(child)?;
                    merge_attribute(&mut complex.attributes, attribute);
                }
                "attributeGroup" => {
                    let reference = required_attribute(child, "ref")?;
                    let local = self.resolve_local_name(child, reference, "attributeGroup")?;
                    let definition = *self.attribute_groups.get(local).ok_or_else(|| {
                        SchemaError::Unresolved {
                            kind: "attributeGroup",
                            name: reference.to_string(),
                        }
                    })?;
                    self.enter("attributeGroup")?;
                    let result = self.compile_attributes(definition, complex);
                    self.leave();
                    result?;
                }
                "anyAttribute" => complex.any_attribute = Some(self.wildcard(child)),
                _ => {}
            }
        }
        Ok(())
    }

    // ---- complex types ----

    fn compile_complex(&mut self, element: &XmlElement) -> Result<ComplexType, SchemaError> {
        let mut complex = ComplexType {
            mixed: flag(element, "mixed"),
            ..empty_complex()
        };

        for child in xs_children(element) {
            match child.local_name() {
                "sequence" | "choice" | "all" | "group" => {
                    complex.content = Content::Elements(self.compile_particle(child)?);
                }
                "attribute" | "attributeGroup" | "anyAttribute" => {}
                "simpleContent" => self.compile_simple_content(child, &mut complex)?,
                "complexContent" => self.compile_complex_content(child, &mut complex)?,
                other @ ("assert" | "openContent") => {
                    return Err(SchemaError::Unsupported(format!("xs:{other}")));
                }
                other => {
                    return Err(SchemaError::Invalid(format!(
                        "xs:{other} is not allowed in xs:complexType"
                    )));
                }
            }
        }
        self.compile_attributes(element, &mut complex)?;
        Ok(complex)
    }

    fn derivation<'a>(
        &self,
        content: &'a XmlElement,
    ) -> Result<(&'a XmlElement, bool, TypeRef), SchemaError> {
        let step = xs_children(content)
            .find(|c| matches!(c.local_name(), "extension" | "restriction"))
            .ok_or_else(|| {
                SchemaError::Invalid(format!(
                    "xs:{} needs an extension or restriction",
                    content.local_name()
                ))
            })?;
        let base = self.resolve_type(step, required_attribute(step, "base")?)?;
        Ok((step, step.local_name() == "extension", base))
    }

    fn compile_simple_content(
        &mut self,
        content: &XmlElement,
        complex: &mut ComplexType,
    ) -> Result<(), SchemaError> {
        let (step, extension, base) = self.derivation(content)?;
        self.compile_attributes(step, complex)?;

        match (base, extension) {
            (TypeRef::Builtin(_) | TypeRef::Simple(_), true) => {
                complex.content = Content::Simple(base);
            }
            (TypeRef::Builtin(_) | TypeRef::Simple(_), false) => {
                let facets = self.compile_facets(step)?;
                let id = self.push_simple(SimpleType {
                    variety: Variety::Atomic(base),
                    facets,
                });
                complex.content = Content::Simple(TypeRef::Simple(id));
            }
            (TypeRef::Complex(base), true) => {
                complex.pending = Some(Derivation::ExtendSimple { base });
            }
            (TypeRef::Complex(base), false) => {
                let facets = self.compile_facets(step)?;
                // Base type filled in once the base complex type is final.
                let id = self.push_simple(SimpleType {
                    variety: Variety::Atomic(TypeRef::Builtin(Builtin::AnySimpleType)),
                    facets,
                });
                complex.pending = Some(Derivation::RestrictSimple { base, facets: id });
            }
            (TypeRef::AnyType, _) => {
                return Err(SchemaError::Invalid(
                    "xs:simpleContent cannot derive from xs:anyType".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn compile_complex_content(
        &mut self,
        content: &XmlElement,
        complex: &mut ComplexType,
    ) -> Result<(), SchemaError> {
        if content.attribute("mixed").is_some() {
            complex.mixed = flag(content, "mixed");
        }
        let (step, extension, base) = self.derivation(content)?;
        if let Some(model) = xs_children(step)
            .find(|c| matches!(c.local_name(), "sequence" | "choice" | "all" | "group"))
        {
            complex.content = Content::Elements(self.compile_particle(model)?);
        }
        self.compile_attributes(step, complex)?;

        match base {
            TypeRef::AnyType => {}
            TypeRef::Complex(base) if extension => {
                complex.pending = Some(Derivation::Extend { base });
            }
            TypeRef::Complex(base) => complex.pending = Some(Derivation::Restrict { base }),
            TypeRef::Builtin(_) | TypeRef::Simple(_) => {
                return Err(SchemaError::Invalid(
                    "xs:complexContent cannot derive from a simple type".to_string(),
                ));
            }
        }
        Ok(())
    }

    // ---- simple types ----

    fn compile_simple(&mut self, element: &XmlElement) -> Result<SimpleType, SchemaError> {
        let step = xs_children(element)
            .find(|c| matches!(c.local_name(), "restriction" | "list" | "union"))
            .ok_or_else(|| {
                SchemaError::Invalid("xs:simpleType needs restriction, list, or union".to_string())
            })?;

        match step.local_name() {
            "restriction" => {
                let base = self.simple_base(step, "base")?;
                Ok(SimpleType {
                    variety: Variety::Atomic(base),
                    facets: self.compile_facets(step)?,
                })
            }
            "list" => Ok(SimpleType {
                variety: Variety::List(self.simple_base(step, "itemType")?),
                facets: Facets::default(),
            }),
            _ => {
                let mut members = Vec::new();
                if let Some(names) = step.attribute("memberTypes") {
                    for qname in names.split_whitespace() {
                        members.push(self.resolve_type(step, qname)?);
                    }
                }
                for inline in xs_children(step).filter(|c| c.local_name() == "simpleType") {
                    let body = self.compile_simple(inline)?;
                    members.push(TypeRef::Simple(self.push_simple(body)));
                }
                if members.is_empty() {
                    return Err(SchemaError::Invalid("xs:union has no member types".to_string()));
                }
                Ok(SimpleType {
                    variety: Variety::Union(members),
                    facets: Facets::default(),
                })
            }
        }
    }

    /// Base of a restriction or item type of a list: an attribute or an inline type.
    fn simple_base(&mut self, step: &XmlElement, attribute: &str) -> Result<TypeRef, SchemaError> {
        let base = if let Some(qname) = step.attribute(attribute) {
            self.resolve_type(step, qname)?
        } else if let Some(inline) = xs_child(step, "simpleType") {
            let body = self.compile_simple(inline)?;
            TypeRef::Simple(self.push_simple(body))
        } else {
            return Err(SchemaError::Invalid(format!(
                "xs:{} has neither @{attribute} nor an inline xs:simpleType",
                step.local_name()
            )));
        };
        match base {
            TypeRef::Complex(_) | TypeRef::AnyType => Err(SchemaError::Invalid(format!(
                "xs:{} must name a simple type",
                step.local_name()
            ))),
            simple => Ok(simple),
        }
    }

    fn compile_facets(&self, step: &XmlElement) -> Result<Facets, SchemaError> {
        let mut facets = Facets::default();
        let mut patterns = Vec::new();
        for facet in xs_children(step) {
            let value = || required_attribute(facet, "value").map(str::to_owned);
            match facet.local_name() {
                "enumeration" => facets.enumeration.push(value()?),
                "pattern" => patterns.push(value()?),
                "length" => facets.length = Some(parse_facet_count(facet)?),
                "minLength" => facets.min_length = Some(parse_facet_count(facet)?),
                "maxLength" => facets.max_length = Some(parse_facet_count(facet)?),
                "totalDigits" => facets.total_digits = Some(parse_facet_count(facet)?),
                "fractionDigits" => facets.fraction_digits = Some(parse_facet_count(facet)?),
                "minInclusive" => facets.min_inclusive = Some(value()?),
                "maxInclusive" => facets.max_inclusive = Some(value()?),
                "minExclusive" => facets.min_exclusive = Some(value()?),
                "maxExclusive" => facets.max_exclusive = Some(value()?),
                "whiteSpace" => {
                    let name = value()?;
                    facets.white_space = Some(WhiteSpace::from_name(name.trim()).ok_or_else(
                        || SchemaError::Invalid(format!("unknown whiteSpace value {name:?}")),
                    )?);
                }
                "simpleType" | "attribute" | "attributeGroup" | "anyAttribute" | "sequence"
                | "choice" | "all" | "group" => {}
                other => return Err(SchemaError::Unsupported(format!("facet xs:{other}"))),
            }
        }

        if !patterns.is_empty() {
            let source = patterns.join("|");
            let alternatives: Vec<String> = patterns.iter().map(|p| translate_pattern(p)).collect();
            let regex = Regex::new(&alternatives.join("|")).map_err(|e| {
                SchemaError::Unsupported(format!("pattern {source:?}: {e}"))
            })?;
            facets.pattern = Some((source, regex));
        }
        Ok(facets)
    }

    // ---- derivations ----

    fn finalize(&mut self) -> Result<(), SchemaError> {
        let mut state = vec![Visit::New; self.schema.complex_types.len()];
        for id in 0..state.len() {
            self.finalize_type(id, &mut state)?;
        }
        for complex in &mut self.schema.complex_types {
            complex.attributes.retain(|a| !a.prohibited);
        }
        Ok(())
    }

    fn finalize_type(&mut self, id: usize, state: &mut [Visit]) -> Result<(), SchemaError> {
        match state[id] {
            Visit::Done => return Ok(()),
            Visit::InProgress => {
                return Err(SchemaError::Invalid("circular type derivation".to_string()));
            }
            Visit::New => state[id] = Visit::InProgress,
        }

        if let Some(derivation) = self.schema.complex_types[id].pending.take() {
            let base_id = derivation.base();
            self.finalize_type(base_id, state)?;
            let base = self.schema.complex_types[base_id].clone();
            let Schema {
                complex_types,
                simple_types,
                ..
            } = &mut self.schema;
            let complex = &mut complex_types[id];

            let own_attributes = mem::take(&mut complex.attributes);
            complex.attributes = base.attributes.clone();
            for attribute in own_attributes {
                merge_attribute(&mut complex.attributes, attribute);
            }

            match derivation {
                Derivation::Extend { .. } => {
                    complex.content = match (base.content, mem::replace(&mut complex.content, Content::Empty)) {
                        (Content::Elements(inherited), Content::Elements(own)) => Content::Elements(
                            Particle::once(Term::Sequence(vec![inherited, own])),
                        ),
                        (Content::Elements(inherited), _) => Content::Elements(inherited),
                        (Content::Empty, own) => own,
                        (Content::Simple(_), _) => {
                            return Err(SchemaError::Invalid(
                                "xs:complexContent cannot extend a type with simple content"
                                    .to_string(),
                            ));
                        }
                    };
                    complex.mixed |= base.mixed;
                    complex.any_attribute = complex.any_attribute.take().or(base.any_attribute);
                }
                Derivation::Restrict { .. } => {}
                Derivation::ExtendSimple { .. } => {
                    let Content::Simple(simple) = base.content else {
                        return Err(SchemaError::Invalid(
                            "xs:simpleContent base has no simple content".to_string(),
                        ));
                    };
                    complex.content = Content::Simple(simple);
                    complex.any_attribute = complex.any_attribute.take().or(base.any_attribute);
                }
                Derivation::RestrictSimple { facets, .. } => {
                    let Content::Simple(simple) = base.content else {
                        return Err(SchemaError::Invalid(
                            "xs:simpleContent base has no simple content".to_string(),
                        ));
                    };
                    simple_types[facets].variety = Variety::Atomic(simple);
                    complex.content = Content::Simple(TypeRef::Simple(facets));
                }
            }
        }

        state[id] = Visit::Done;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    InProgress,
    Done,
}

fn empty_complex() -> ComplexType {
    ComplexType {
        mixed: false,
        content: Content::Empty,
        attributes: Vec::new(),
        any_attribute: None,
        pending: None,
    }
}

/// Add an attribute use, replacing one with the same expanded name.
fn merge_attribute(attributes: &mut Vec<AttributeUse>, attribute: AttributeUse) {
    match attributes
        .iter_mut()
        .find(|a| a.name == attribute.name && a.namespace == attribute.namespace)
    {
        Some(existing) => *existing = attribute,
        None => attributes.push(attribute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(xsd: &str) -> Result<Schema, SchemaError> {
        compile(&XmlDocument::parse(xsd).unwrap())
    }

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    #[test]
    fn test_registers_globals_and_forward_references() {
        let schema = compile_str(&format!(
            r#"<xs:schema {XS}>
                 <xs:element name="feed" type="feedType"/>
                 <xs:complexType name="feedType">
                   <xs:sequence><xs:element name="title" type="titleType"/></xs:sequence>
                 </xs:complexType>
                 <xs:simpleType name="titleType">
                   <xs:restriction base="xs:string"><xs:maxLength value="80"/></xs:restriction>
                 </xs:simpleType>
               </xs:schema>"#
        ))
        .unwrap();

        let feed = schema.global_elements["feed"];
        assert_eq!(schema.elements[feed].type_ref, TypeRef::Complex(0));
        let TypeRef::Simple(title) = schema.named_types["titleType"] else {
            panic!("titleType should be simple");
        };
        assert_eq!(schema.simple_types[title].facets.max_length, Some(80));
    }

    #[test]
    fn test_rejects_non_schema_root() {
        assert!(matches!(
            compile_str("<schema/>"),
            Err(SchemaError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_constructs() {
        let import = format!(r#"<xs:schema {XS}><xs:import namespace="urn:x"/></xs:schema>"#);
        assert!(matches!(compile_str(&import), Err(SchemaError::Unsupported(_))));

        let key = format!(
            r#"<xs:schema {XS}><xs:element name="a"><xs:key name="k"/></xs:element></xs:schema>"#
        );
        assert!(matches!(compile_str(&key), Err(SchemaError::Unsupported(_))));

        let substitution = format!(
            r#"<xs:schema {XS}><xs:element name="a"/><xs:element name="b" substitutionGroup="a"/></xs:schema>"#
        );
        assert!(matches!(
            compile_str(&substitution),
            Err(SchemaError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unresolved_type() {
        let xsd = format!(r#"<xs:schema {XS}><xs:element name="a" type="missing"/></xs:schema>"#);
        assert!(matches!(
            compile_str(&xsd),
            Err(SchemaError::Unresolved { kind: "type", .. })
        ));
    }

    #[test]
    fn test_occurs_validation() {
        let xsd = format!(
            r#"<xs:schema {XS}><xs:element name="a"><xs:complexType><xs:sequence>
                 <xs:element name="b" minOccurs="3" maxOccurs="2"/>
               </xs:sequence></xs:complexType></xs:element></xs:schema>"#
        );
        assert!(matches!(compile_str(&xsd), Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn test_extension_merges_content_and_attributes() {
        let schema = compile_str(&format!(
            r#"<xs:schema {XS}>
                 <xs:complexType name="base">
                   <xs:sequence><xs:element name="a"/></xs:sequence>
                   <xs:attribute name="id" use="required"/>
                 </xs:complexType>
                 <xs:complexType name="derived">
                   <xs:complexContent><xs:extension base="base">
                     <xs:sequence><xs:element name="b"/></xs:sequence>
                     <xs:attribute name="lang"/>
                   </xs:extension></xs:complexContent>
                 </xs:complexType>
               </xs:schema>"#
        ))
        .unwrap();

        let TypeRef::Complex(derived) = schema.named_types["derived"] else {
            panic!("derived should be complex");
        };
        let derived = &schema.complex_types[derived];
        let names: Vec<&str> = derived.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["id", "lang"]);
        let Content::Elements(Particle {
            term: Term::Sequence(parts),
            ..
        }) = &derived.content
        else {
            panic!("extension should produce a sequence");
        };
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_restriction_drops_prohibited_attribute() {
        let schema = compile_str(&format!(
            r#"<xs:schema {XS}>
                 <xs:complexType name="base">
                   <xs:attribute name="a"/><xs:attribute name="b"/>
                 </xs:complexType>
                 <xs:complexType name="narrow">
                   <xs:complexContent><xs:restriction base="base">
                     <xs:attribute name="b" use="prohibited"/>
                   </xs:restriction></xs:complexContent>
                 </xs:complexType>
               </xs:schema>"#
        ))
        .unwrap();
        let TypeRef::Complex(narrow) = schema.named_types["narrow"] else {
            panic!("narrow should be complex");
        };
        let names: Vec<&str> = schema.complex_types[narrow]
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, ["a"]);
    }

    #[test]
    fn test_circular_derivation() {
        let xsd = format!(
            r#"<xs:schema {XS}>
                 <xs:complexType name="a"><xs:complexContent><xs:extension base="b"/></xs:complexContent></xs:complexType>
                 <xs:complexType name="b"><xs:complexContent><xs:extension base="a"/></xs:complexContent></xs:complexType>
               </xs:schema>"#
        );
        assert!(matches!(compile_str(&xsd), Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn test_recursive_group_is_bounded() {
        let xsd = format!(
            r#"<xs:schema {XS}>
                 <xs:group name="g"><xs:sequence><xs:group ref="g"/></xs:sequence></xs:group>
                 <xs:element name="a"><xs:complexType><xs:group ref="g"/></xs:complexType></xs:element>
               </xs:schema>"#
        );
        assert!(matches!(compile_str(&xsd), Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn test_bad_pattern_is_unsupported() {
        let xsd = format!(
            r#"<xs:schema {XS}><xs:simpleType name="t">
                 <xs:restriction base="xs:string"><xs:pattern value="\p{{IsBasicLatin}}+"/></xs:restriction>
               </xs:simpleType></xs:schema>"#
        );
        assert!(matches!(compile_str(&xsd), Err(SchemaError::Unsupported(_))));
    }
}
