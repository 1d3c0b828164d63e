//! Frontmatter types and data structures.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Represents parsed YAML frontmatter from a markdown document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    /// Fields as key-value pairs, ordered by key.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Result of splitting frontmatter from markdown.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Parsed frontmatter (if present).
    pub frontmatter: Option<Frontmatter>,
    /// The markdown body (everything after frontmatter).
    pub body: String,
    /// Byte offset of the body within the original content.
    pub body_offset: usize,
}

/// Flatten a YAML value into the strings it can be compared by.
///
/// Scalars yield a single string, sequences yield one string per scalar
/// element, nulls and mappings yield nothing.
pub fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Sequence(items) => items.iter().flat_map(value_strings).collect(),
        Value::Tagged(tagged) => value_strings(&tagged.value),
        Value::Null | Value::Mapping(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_strings_flattens_sequences() {
        let value: Value = serde_yaml::from_str("[a, 2, true, ~]").unwrap();
        assert_eq!(value_strings(&value), vec!["a", "2", "true"]);
    }

    #[test]
    fn value_strings_skips_mappings() {
        let value: Value = serde_yaml::from_str("{a: 1}").unwrap();
        assert!(value_strings(&value).is_empty());
    }
}
