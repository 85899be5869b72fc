//! XSD validation of XML documents.
//!
//! The validator is pure Rust and covers the commonly used part of XML
//! Schema 1.0:
//!
//! | Area | Supported |
//! |------|-----------|
//! | Declarations | global and local `element`, `attribute`, `group`, `attributeGroup` |
//! | Content models | `sequence`, `choice`, `all`, `any`, occurrence bounds, `mixed` |
//! | Derivation | `simpleContent` and `complexContent` by extension or restriction |
//! | Simple types | built-ins, `restriction` with all 1.0 facets, `list`, `union` |
//! | Instance attributes | `xsi:nil`, `xsi:type`, schema location hints |
//!
//! `include`, `import`, `redefine`, identity constraints, and substitution
//! groups are rejected when the schema is compiled.
//!
//! # Entry points
//!
//! - [`validate_xml`] answers yes or no and logs why. Every failure,
//!   including a missing file or a broken schema, is reported as `false`.
//! - [`validate_file`] returns a [`ValidateError`] that separates schema
//!   violations from load and compile failures.
//! - [`Schema`] compiles once and validates many documents.

mod compile;
mod content;
mod model;
mod types;
mod validate;

pub use model::{Schema, XSD_NS, XSI_NS};
pub use types::{Builtin, WhiteSpace};

use crate::error::{SchemaError, ValidateError, Violations};
use crate::xml::XmlDocument;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info, instrument};
use validate::Validator;

impl Schema {
    /// Compile an already parsed schema document.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] if the document is not an `xs:schema`, uses an
    /// unsupported construct, or references undefined components.
    pub fn from_document(document: &XmlDocument) -> Result<Self, SchemaError> {
        compile::compile(document)
    }

    /// Read and compile a schema file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let document = XmlDocument::from_file(path)?;
        Self::from_document(&document)
    }

    /// Target namespace of the schema, if it declares one.
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Validate a parsed document.
    ///
    /// # Errors
    ///
    /// Every violation found, in document order.
    pub fn validate(&self, document: &XmlDocument) -> Result<(), Violations> {
        Validator::new(self).run(document)
    }
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(xsd: &str) -> Result<Self, Self::Err> {
        let document = XmlDocument::parse(xsd)?;
        Self::from_document(&document)
    }
}

/// Validate an XML file against an XSD file, keeping failure kinds apart.
///
/// # Errors
///
/// * [`ValidateError::Schema`] if the schema cannot be read or compiled
/// * [`ValidateError::Document`] if the instance cannot be read or parsed
/// * [`ValidateError::Invalid`] with every violation if it does not conform
pub fn validate_file(
    xml_path: impl AsRef<Path>,
    xsd_path: impl AsRef<Path>,
) -> Result<(), ValidateError> {
    let schema = Schema::from_file(xsd_path)?;
    let document = XmlDocument::from_file(xml_path)?;
    schema.validate(&document).map_err(ValidateError::Invalid)
}

/// Validate an XML file against an XSD schema file.
///
/// # Arguments
///
/// * `xml_path` - Instance document
/// * `xsd_path` - Schema document
///
/// # Returns
///
/// `true` if the document conforms. `false` if it does not, and also if
/// either file is missing or malformed or the schema cannot be compiled.
/// Violations are logged as "XML validation error"; every other failure as
/// "An error occurred during validation".
#[instrument(level = "info", skip_all, fields(xml = %xml_path.as_ref().display(), xsd = %xsd_path.as_ref().display()))]
pub fn validate_xml(xml_path: impl AsRef<Path>, xsd_path: impl AsRef<Path>) -> bool {
    match validate_file(&xml_path, &xsd_path) {
        Ok(()) => {
            info!("XML document is valid");
            true
        }
        Err(ValidateError::Invalid(violations)) => {
            error!(count = violations.len(), "XML validation error");
            for violation in violations.iter() {
                error!(path = %violation.path, "XML validation error: {}", violation.message);
            }
            false
        }
        Err(e) => {
            error!(error = %e, "An error occurred during validation");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XmlError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const ARTICLES_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="articles">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="article" type="articleType" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="articleType">
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="author" type="xs:string" minOccurs="0" nillable="true"/>
      <xs:element name="source" minOccurs="0">
        <xs:complexType>
          <xs:sequence><xs:element name="name" type="xs:string"/></xs:sequence>
        </xs:complexType>
      </xs:element>
      <xs:element name="publishedAt" type="xs:dateTime" minOccurs="0"/>
      <xs:element name="url" type="xs:anyURI" minOccurs="0"/>
      <xs:element name="full_content" type="xs:string" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:positiveInteger" use="required"/>
    <xs:attribute name="lang" type="languageCode"/>
  </xs:complexType>
  <xs:simpleType name="languageCode">
    <xs:restriction base="xs:string">
      <xs:enumeration value="en"/>
      <xs:enumeration value="fr"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

    fn schema() -> Schema {
        ARTICLES_XSD.parse().unwrap()
    }

    fn violations(xml: &str) -> Vec<String> {
        match schema().validate(&XmlDocument::parse(xml).unwrap()) {
            Ok(()) => Vec::new(),
            Err(v) => v.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_validate_xml_valid_document() {
        let xsd = write_file(ARTICLES_XSD);
        let xml = write_file(
            r#"<articles>
  <article id="1" lang="en">
    <title>Rates hold</title>
    <author>J. Doe</author>
    <source><name>Wire</name></source>
    <publishedAt>2025-05-06T08:00:00Z</publishedAt>
    <url>https://example.com/rates</url>
    <full_content>The bank held rates.</full_content>
  </article>
  <article id="2"><title>Second</title></article>
</articles>"#,
        );
        assert!(validate_xml(xml.path(), xsd.path()));
    }

    #[test]
    fn test_validate_xml_violating_document() {
        let xsd = write_file(ARTICLES_XSD);
        let xml = write_file(r#"<articles><article id="1"><author>No title</author></article></articles>"#);
        assert!(!validate_xml(xml.path(), xsd.path()));
    }

    #[test]
    fn test_validate_xml_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let xsd = write_file(ARTICLES_XSD);
        let xml = write_file("<articles/>");
        assert!(!validate_xml(dir.path().join("missing.xml"), xsd.path()));
        assert!(!validate_xml(xml.path(), dir.path().join("missing.xsd")));
    }

    #[test]
    fn test_validate_xml_malformed_inputs() {
        let xsd = write_file(ARTICLES_XSD);
        let broken = write_file("<articles><article>");
        assert!(!validate_xml(broken.path(), xsd.path()));

        let xml = write_file("<articles/>");
        let bad_schema = write_file("<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">");
        assert!(!validate_xml(xml.path(), bad_schema.path()));
    }

    #[test]
    fn test_validate_file_separates_failure_kinds() {
        let xsd = write_file(ARTICLES_XSD);
        let invalid = write_file("<feed/>");
        assert!(matches!(
            validate_file(invalid.path(), xsd.path()),
            Err(ValidateError::Invalid(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_file(invalid.path(), dir.path().join("none.xsd")),
            Err(ValidateError::Schema(SchemaError::Document(XmlError::Read { .. })))
        ));
        assert!(matches!(
            validate_file(dir.path().join("none.xml"), xsd.path()),
            Err(ValidateError::Document(XmlError::Read { .. }))
        ));

        let unsupported = write_file(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:include schemaLocation="other.xsd"/></xs:schema>"#,
        );
        assert!(matches!(
            validate_file(invalid.path(), unsupported.path()),
            Err(ValidateError::Schema(SchemaError::Unsupported(_)))
        ));
    }

    #[test]
    fn test_violation_paths_point_at_offending_element() {
        let found = violations(
            r#"<articles>
                 <article id="1"><title>A</title></article>
                 <article id="2"><title>B</title><publishedAt>yesterday</publishedAt></article>
               </articles>"#,
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with("/articles/article[2]/publishedAt: "), "{found:?}");
        assert!(found[0].contains("dateTime"));
    }

    #[test]
    fn test_attribute_rules() {
        let found = violations(r#"<articles><article lang="de" extra="x"><title>A</title></article></articles>"#);
        assert_eq!(found.len(), 3, "{found:?}");
        assert!(found.iter().any(|v| v.contains("attribute lang")));
        assert!(found.iter().any(|v| v.contains("attribute extra is not allowed")));
        assert!(found.iter().any(|v| v.contains("missing required attribute id")));

        let zero = violations(r#"<articles><article id="0"><title>A</title></article></articles>"#);
        assert_eq!(zero.len(), 1);
    }

    #[test]
    fn test_out_of_order_children() {
        let found = violations(
            r#"<articles><article id="1"><url>https://example.com</url><title>A</title></article></articles>"#,
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("[url, title]"));
    }

    #[test]
    fn test_text_in_element_only_content() {
        let found = violations(r#"<articles>stray<article id="1"><title>A</title></article></articles>"#);
        assert_eq!(found, vec!["/articles: text is not allowed in element-only content"]);
    }

    #[test]
    fn test_nil_and_instance_namespace_attributes() {
        let found = violations(
            r#"<articles xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                         xsi:noNamespaceSchemaLocation="articles.xsd">
                 <article id="1"><title>A</title><author xsi:nil="true"/></article>
               </articles>"#,
        );
        assert!(found.is_empty(), "{found:?}");

        let not_nillable = violations(
            r#"<articles xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
                 <article id="1"><title xsi:nil="true"/></article>
               </articles>"#,
        );
        assert_eq!(not_nillable.len(), 1);
        assert!(not_nillable[0].contains("not nillable"));
    }

    #[test]
    fn test_target_namespace_and_qualified_elements() {
        let schema: Schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                       xmlns:n="urn:news" targetNamespace="urn:news" elementFormDefault="qualified">
              <xs:element name="feed">
                <xs:complexType><xs:sequence>
                  <xs:element name="item" type="n:itemType" maxOccurs="unbounded"/>
                </xs:sequence></xs:complexType>
              </xs:element>
              <xs:simpleType name="itemType">
                <xs:restriction base="xs:token"><xs:pattern value="[A-Z]\d{2}"/></xs:restriction>
              </xs:simpleType>
            </xs:schema>"#
            .parse()
            .unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:news"));

        let ok = XmlDocument::parse(r#"<feed xmlns="urn:news"><item> A12 </item><item>B34</item></feed>"#).unwrap();
        assert!(schema.validate(&ok).is_ok());

        let unqualified = XmlDocument::parse("<feed><item>A12</item></feed>").unwrap();
        assert!(schema.validate(&unqualified).is_err());

        let bad_pattern = XmlDocument::parse(r#"<n:feed xmlns:n="urn:news"><n:item>a12</n:item></n:feed>"#).unwrap();
        let err = schema.validate(&bad_pattern).unwrap_err();
        assert!(err.to_string().contains("does not match pattern"));
    }

    #[test]
    fn test_simple_content_extension_and_facets() {
        let schema: Schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
              <xs:element name="price">
                <xs:complexType>
                  <xs:simpleContent>
                    <xs:extension base="amount">
                      <xs:attribute name="currency" type="xs:string" use="required" fixed="EUR"/>
                    </xs:extension>
                  </xs:simpleContent>
                </xs:complexType>
              </xs:element>
              <xs:simpleType name="amount">
                <xs:restriction base="xs:decimal">
                  <xs:minInclusive value="0"/>
                  <xs:maxExclusive value="1000"/>
                  <xs:fractionDigits value="2"/>
                </xs:restriction>
              </xs:simpleType>
            </xs:schema>"#
            .parse()
            .unwrap();

        let check = |xml: &str| schema.validate(&XmlDocument::parse(xml).unwrap()).is_ok();
        assert!(check(r#"<price currency="EUR">12.50</price>"#));
        assert!(!check(r#"<price currency="USD">12.50</price>"#));
        assert!(!check(r#"<price currency="EUR">-1</price>"#));
        assert!(!check(r#"<price currency="EUR">1000</price>"#));
        assert!(!check(r#"<price currency="EUR">1.005</price>"#));
        assert!(!check("<price>1</price>"));
    }

    #[test]
    fn test_list_union_and_length_facets() {
        let schema: Schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
              <xs:element name="tags" type="tagList"/>
              <xs:simpleType name="tagList">
                <xs:restriction>
                  <xs:simpleType><xs:list itemType="sizeOrAuto"/></xs:simpleType>
                  <xs:maxLength value="3"/>
                </xs:restriction>
              </xs:simpleType>
              <xs:simpleType name="sizeOrAuto">
                <xs:union memberTypes="xs:positiveInteger">
                  <xs:simpleType>
                    <xs:restriction base="xs:token"><xs:enumeration value="auto"/></xs:restriction>
                  </xs:simpleType>
                </xs:union>
              </xs:simpleType>
            </xs:schema>"#
            .parse()
            .unwrap();

        let check = |xml: &str| schema.validate(&XmlDocument::parse(xml).unwrap()).is_ok();
        assert!(check("<tags>1 auto 3</tags>"));
        assert!(!check("<tags>1 2 3 4</tags>"));
        assert!(!check("<tags>1 big</tags>"));
    }

    #[test]
    fn test_wildcards_and_mixed_content() {
        let schema: Schema = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
              <xs:element name="note">
                <xs:complexType mixed="true">
                  <xs:sequence>
                    <xs:element name="b" type="xs:string" minOccurs="0"/>
                    <xs:any namespace="##other" processContents="lax" minOccurs="0" maxOccurs="unbounded"/>
                  </xs:sequence>
                  <xs:anyAttribute namespace="##any" processContents="skip"/>
                </xs:complexType>
              </xs:element>
            </xs:schema>"###
            .parse()
            .unwrap();

        let check = |xml: &str| schema.validate(&XmlDocument::parse(xml).unwrap()).is_ok();
        assert!(check(r#"<note data-x="1">Hello <b>world</b><x:ext xmlns:x="urn:ext"><anything/></x:ext></note>"#));
        assert!(!check("<note><b>a</b><c/></note>"));
    }

    const NESTED_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="a" type="nest"/>
  <xs:complexType name="nest">
    <xs:sequence><xs:element name="a" type="nest" minOccurs="0"/></xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    fn nested(depth: usize) -> String {
        format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth))
    }

    #[test]
    fn test_validate_xml_recursive_type_within_depth_limit() {
        let xsd = write_file(NESTED_XSD);
        let xml = write_file(&nested(200));
        assert!(validate_xml(xml.path(), xsd.path()));
    }

    #[test]
    fn test_validate_xml_excessive_nesting_is_false() {
        let xsd = write_file(NESTED_XSD);
        let xml = write_file(&nested(5_000));
        assert!(!validate_xml(xml.path(), xsd.path()));
        assert!(matches!(
            validate_file(xml.path(), xsd.path()),
            Err(ValidateError::Document(XmlError::Malformed { .. }))
        ));
    }

    /// One element `v` of an anonymous simple type restricting `base`.
    fn restricted(base: &str, facets: &str) -> Schema {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="v">
                   <xs:simpleType><xs:restriction base="xs:{base}">{facets}</xs:restriction></xs:simpleType>
                 </xs:element>
               </xs:schema>"#
        )
        .parse()
        .unwrap()
    }

    fn accepts(schema: &Schema, value: &str) -> bool {
        let document = XmlDocument::parse(&format!("<v>{value}</v>")).unwrap();
        schema.validate(&document).is_ok()
    }

    #[test]
    fn test_validate_xml_rejects_non_ascii_digits() {
        let xsd = write_file(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="r"><xs:complexType><xs:sequence>
                   <xs:element name="n" type="xs:integer"/>
                   <xs:element name="d" type="xs:date"/>
                 </xs:sequence></xs:complexType></xs:element>
               </xs:schema>"#,
        );
        let ascii = write_file("<r><n>123</n><d>2025-05-06</d></r>");
        assert!(validate_xml(ascii.path(), xsd.path()));
        let arabic_integer = write_file("<r><n>\u{661}\u{662}\u{663}</n><d>2025-05-06</d></r>");
        assert!(!validate_xml(arabic_integer.path(), xsd.path()));
        let arabic_date = write_file("<r><n>1</n><d>\u{662}\u{660}\u{662}\u{665}-05-06</d></r>");
        assert!(!validate_xml(arabic_date.path(), xsd.path()));
    }

    #[test]
    fn test_long_bound_above_f64_precision() {
        let schema = restricted("long", r#"<xs:maxInclusive value="9007199254740992"/>"#);
        assert!(accepts(&schema, "9007199254740992"));
        assert!(!accepts(&schema, "9007199254740993"));
    }

    #[test]
    fn test_decimal_bound_compares_exactly() {
        let schema = restricted("decimal", r#"<xs:maxExclusive value="0.3"/>"#);
        assert!(accepts(&schema, "0.29999999999999999999"));
        assert!(!accepts(&schema, "0.30000000000000000001"));
        assert!(!accepts(&schema, "0.300"));
    }

    #[test]
    fn test_date_time_bound_respects_timezone() {
        let schema = restricted("dateTime", r#"<xs:maxInclusive value="2025-05-06T10:00:00Z"/>"#);
        assert!(accepts(&schema, "2025-05-06T11:00:00+02:00"));
        assert!(accepts(&schema, "2025-05-06T10:00:00Z"));
        assert!(!accepts(&schema, "2025-05-06T10:00:00-00:30"));

        let years = restricted("gYear", r#"<xs:minInclusive value="9999"/>"#);
        assert!(accepts(&years, "10000"));
        assert!(!accepts(&years, "-10000"));
    }

    #[test]
    fn test_huge_min_occurs_on_optional_content_terminates() {
        let xsd = write_file(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="r"><xs:complexType>
                   <xs:sequence minOccurs="4000000000" maxOccurs="unbounded">
                     <xs:element name="a" minOccurs="0"/>
                   </xs:sequence>
                 </xs:complexType></xs:element>
               </xs:schema>"#,
        );
        let xml = write_file("<r><a/><a/></r>");
        assert!(validate_xml(xml.path(), xsd.path()));
        let wrong = write_file("<r><b/></r>");
        assert!(!validate_xml(wrong.path(), xsd.path()));
    }

    /// Verdicts fixed by the XML Schema 1.0 datatypes recommendation, which
    /// `xmllint --schema` reports the same way.
    #[test]
    fn test_datatype_verdicts_table() {
        let cases: &[(&str, &str, &str, bool)] = &[
            ("integer", "", " 42 ", true),
            ("integer", "", "4.0", false),
            ("integer", "", "\u{661}\u{662}", false),
            ("long", "", "9223372036854775807", true),
            ("long", "", "9223372036854775808", false),
            ("byte", "", "-129", false),
            ("unsignedByte", "", "255", true),
            ("boolean", "", "TRUE", false),
            ("boolean", "", "0", true),
            ("date", "", "2024-02-29", true),
            ("date", "", "2025-02-29", false),
            ("dateTime", "", "2025-05-06T08:00:00", true),
            ("dateTime", "", "2025-05-06T08:00", false),
            ("gMonth", "", "--13", false),
            ("hexBinary", "", "0FB7", true),
            ("hexBinary", "", "0FB", false),
            ("decimal", r#"<xs:totalDigits value="3"/>"#, "12.3", true),
            ("decimal", r#"<xs:totalDigits value="3"/>"#, "12.34", false),
            ("string", r#"<xs:length value="2"/>"#, "\u{e9}t", true),
            ("string", r#"<xs:pattern value="\d+"/>"#, "\u{661}\u{662}", true),
            ("int", r#"<xs:minExclusive value="-5"/>"#, "-5", false),
            ("date", r#"<xs:minInclusive value="2025-01-01"/>"#, "2024-12-31", false),
        ];
        for (base, facets, value, expected) in cases {
            let schema = restricted(base, facets);
            assert_eq!(
                accepts(&schema, value),
                *expected,
                "xs:{base} {facets} with {value:?}"
            );
        }
    }

    #[test]
    fn test_schema_is_reusable() {
        let schema = schema();
        let one = XmlDocument::parse(r#"<articles><article id="1"><title>A</title></article></articles>"#).unwrap();
        let two = XmlDocument::parse("<articles/>").unwrap();
        assert!(schema.validate(&one).is_ok());
        assert!(schema.validate(&two).is_ok());
    }
}
