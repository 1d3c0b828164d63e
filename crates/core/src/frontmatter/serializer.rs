//! Frontmatter serialization back to markdown.

use super::types::{Frontmatter, ParsedDocument};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Serialize a parsed document back to a markdown string.
///
/// The body is emitted verbatim right after the closing delimiter, so parsing
/// the output yields the same body again.
pub fn serialize(doc: &ParsedDocument) -> String {
    if let Some(fm) = &doc.frontmatter
        && !fm.fields.is_empty()
    {
        let yaml = serialize_frontmatter(&fm.fields);
        return format!("---\n{}---\n{}", yaml, doc.body);
    }
    doc.body.clone()
}

/// Serialize frontmatter fields to YAML string (keys sorted).
fn serialize_frontmatter(fields: &BTreeMap<String, Value>) -> String {
    let mut mapping = serde_yaml::Mapping::new();
    for (key, value) in fields {
        mapping.insert(Value::String(key.clone()), value.clone());
    }
    serde_yaml::to_string(&mapping).unwrap_or_default()
}

/// Serialize a Frontmatter struct to YAML string (without delimiters).
pub fn frontmatter_to_yaml(fm: &Frontmatter) -> String {
    serialize_frontmatter(&fm.fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parser::parse;

    #[test]
    fn serialize_document_without_frontmatter() {
        let doc = ParsedDocument {
            frontmatter: None,
            body: "# Hello\n\nWorld".to_string(),
            body_offset: 0,
        };
        assert_eq!(serialize(&doc), "# Hello\n\nWorld");
    }

    #[test]
    fn serialize_document_with_frontmatter() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Value::String("Test".to_string()));
        let doc = ParsedDocument {
            frontmatter: Some(Frontmatter { fields }),
            body: "# Content".to_string(),
            body_offset: 0,
        };
        assert_eq!(serialize(&doc), "---\ntitle: Test\n---\n# Content");
    }

    #[test]
    fn empty_frontmatter_is_dropped() {
        let doc = ParsedDocument {
            frontmatter: Some(Frontmatter::default()),
            body: "Body".to_string(),
            body_offset: 0,
        };
        assert_eq!(serialize(&doc), "Body");
    }

    #[test]
    fn roundtrip_preserves_body() {
        let original = "---\nb: 2\na: 1\n---\n\n# Title\nText\n";
        let parsed = parse(original).unwrap();
        let output = serialize(&parsed);
        let reparsed = parse(&output).unwrap();
        assert_eq!(reparsed.body, parsed.body);
        assert_eq!(reparsed.frontmatter, parsed.frontmatter);
        assert!(output.starts_with("---\na: 1\nb: 2\n---\n"));
    }
}
