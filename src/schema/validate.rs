//! Walking an instance document against a compiled schema.

use super::content::Attribution;
use super::model::{
    AttributeUse, ComplexType, Content, ProcessContents, Schema, TypeRef, Wildcard, XSD_NS, XSI_NS,
};
use super::types::Builtin;
use crate::error::{Violation, Violations};
use crate::utils::collapse_whitespace;
use crate::xml::{XmlDocument, XmlElement};
use itertools::Itertools;

pub(crate) struct Validator<'s> {
    schema: &'s Schema,
    violations: Vec<Violation>,
}

impl<'s> Validator<'s> {
    pub(crate) fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            violations: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, document: &XmlDocument) -> Result<(), Violations> {
        let root = document.root();
        let path = format!("/{}", root.name());
        match self.schema.global_element(root.namespace(), root.local_name()) {
            Some(id) => self.element(root, id, &path),
            None => self.report(
                &path,
                format!(
                    "no global element declaration matches {}",
                    expanded_name(root)
                ),
            ),
        }
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(Violations(self.violations))
        }
    }

    fn report(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn element(&mut self, element: &XmlElement, id: usize, path: &str) {
        let schema = self.schema;
        let decl = &schema.elements[id];

        let nil = element
            .attribute_ns(XSI_NS, "nil")
            .is_some_and(|v| matches!(v.trim(), "true" | "1"));
        if nil {
            if !decl.nillable {
                self.report(path, "xsi:nil is set but the element is not nillable");
            } else if element.child_elements().next().is_some()
                || !element.direct_text().is_empty()
            {
                self.report(path, "an element with xsi:nil=\"true\" must be empty");
            }
            if let TypeRef::Complex(ct) = decl.type_ref {
                let complex = &schema.complex_types[ct];
                self.attributes(element, &complex.attributes, complex.any_attribute.as_ref(), path);
            }
            return;
        }

        let type_ref = match element.attribute_ns(XSI_NS, "type") {
            Some(qname) => match self.instance_type(element, qname) {
                Some(t) => t,
                None => {
                    self.report(path, format!("xsi:type {qname:?} names no known type"));
                    return;
                }
            },
            None => decl.type_ref,
        };

        self.typed(element, type_ref, path);

        if let Some(fixed) = &decl.fixed {
            if element.child_elements().next().is_none() {
                let text = element.direct_text();
                if !text.is_empty() && collapse_whitespace(&text) != collapse_whitespace(fixed) {
                    self.report(path, format!("value must be the fixed value {fixed:?}"));
                }
            }
        }
    }

    /// Resolve an `xsi:type` override.
    fn instance_type(&self, element: &XmlElement, qname: &str) -> Option<TypeRef> {
        let (ns, local) = element.resolve_qname(qname)?;
        if ns == Some(XSD_NS) {
            return match local {
                "anyType" => Some(TypeRef::AnyType),
                _ => Builtin::from_name(local).map(TypeRef::Builtin),
            };
        }
        if ns != self.schema.target_namespace.as_deref() {
            return None;
        }
        self.schema.named_types.get(local).copied()
    }

    fn typed(&mut self, element: &XmlElement, type_ref: TypeRef, path: &str) {
        match type_ref {
            TypeRef::AnyType => {}
            TypeRef::Builtin(_) | TypeRef::Simple(_) => {
                self.attributes(element, &[], None, path);
                self.simple_value(element, type_ref, path);
            }
            TypeRef::Complex(id) => {
                let schema = self.schema;
                self.complex(element, &schema.complex_types[id], path);
            }
        }
    }

    fn simple_value(&mut self, element: &XmlElement, type_ref: TypeRef, path: &str) {
        if element.child_elements().next().is_some() {
            self.report(path, "element children are not allowed in simple content");
            return;
        }
        if let Err(message) = self.schema.check_simple(type_ref, &element.direct_text()) {
            self.report(path, message);
        }
    }

    fn complex(&mut self, element: &XmlElement, complex: &ComplexType, path: &str) {
        self.attributes(element, &complex.attributes, complex.any_attribute.as_ref(), path);

        match &complex.content {
            Content::Empty => {
                if element.child_elements().next().is_some() {
                    self.report(path, "element must be empty");
                } else if !complex.mixed && has_text(element) {
                    self.report(path, "text is not allowed in empty content");
                }
            }
            Content::Simple(simple) => self.simple_value(element, *simple, path),
            Content::Elements(particle) => {
                if !complex.mixed && has_text(element) {
                    self.report(path, "text is not allowed in element-only content");
                }
                let children: Vec<&XmlElement> = element.child_elements().collect();
                let schema = self.schema;
                let Some(attributions) = schema.match_content(particle, &children) else {
                    let found = children.iter().map(|c| c.name()).join(", ");
                    self.report(
                        path,
                        format!("child elements [{found}] do not match the content model"),
                    );
                    return;
                };
                for (child, attribution) in children.iter().zip(attributions) {
                    let location = child_path(path, element, child);
                    match attribution {
                        Attribution::Element(id) => self.element(child, id, &location),
                        Attribution::Wildcard(process) => self.wildcard_match(child, process, &location),
                    }
                }
            }
        }
    }

    fn wildcard_match(&mut self, element: &XmlElement, process: ProcessContents, path: &str) {
        let global = self.schema.global_element(element.namespace(), element.local_name());
        match (process, global) {
            (ProcessContents::Skip, _) => {}
            (_, Some(id)) => self.element(element, id, path),
            (ProcessContents::Strict, None) => self.report(
                path,
                format!("no global element declaration matches {}", expanded_name(element)),
            ),
            (ProcessContents::Lax, None) => {}
        }
    }

    fn attributes(
        &mut self,
        element: &XmlElement,
        uses: &[AttributeUse],
        any: Option<&Wildcard>,
        path: &str,
    ) {
        for attribute in element.attributes() {
            let namespace = attribute.namespace.as_deref();
            if attribute.is_namespace_declaration() || namespace == Some(XSI_NS) {
                continue;
            }
            let local = attribute.local_name();
            match uses
                .iter()
                .find(|u| u.name == local && u.namespace.as_deref() == namespace)
            {
                Some(declared) => {
                    if let Err(message) = self.schema.check_simple(declared.type_ref, &attribute.value) {
                        self.report(path, format!("attribute {}: {message}", attribute.name));
                    } else if let Some(fixed) = &declared.fixed {
                        if collapse_whitespace(&attribute.value) != collapse_whitespace(fixed) {
                            self.report(
                                path,
                                format!("attribute {} must be {fixed:?}", attribute.name),
                            );
                        }
                    }
                }
                None if any.is_some_and(|w| w.allows(namespace)) => {}
                None => self.report(path, format!("attribute {} is not allowed", attribute.name)),
            }
        }

        for required in uses.iter().filter(|u| u.required) {
            let present = element.attributes().iter().any(|a| {
                a.local_name() == required.name && a.namespace.as_deref() == required.namespace.as_deref()
            });
            if !present {
                self.report(path, format!("missing required attribute {}", required.name));
            }
        }
    }
}

fn has_text(element: &XmlElement) -> bool {
    element.text_nodes().any(|t| !t.trim().is_empty())
}

fn expanded_name(element: &XmlElement) -> String {
    match element.namespace() {
        Some(ns) => format!("{{{ns}}}{}", element.local_name()),
        None => element.local_name().to_string(),
    }
}

/// `parent/name`, with a 1-based position when the name repeats among siblings.
fn child_path(parent_path: &str, parent: &XmlElement, child: &XmlElement) -> String {
    let mut same = parent.child_elements().filter(|c| c.name() == child.name());
    let index = same
        .by_ref()
        .position(|c| std::ptr::eq(c, child))
        .map_or(1, |i| i + 1);
    let total = index + same.count();
    if total > 1 {
        format!("{parent_path}/{}[{index}]", child.name())
    } else {
        format!("{parent_path}/{}", child.name())
    }
}
