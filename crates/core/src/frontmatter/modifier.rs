//! Frontmatter merge and replace.

use super::types::Frontmatter;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// How new frontmatter values are combined with the existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontmatterMode {
    /// Shallow merge; a `null` value deletes the key.
    #[default]
    Merge,
    /// The given mapping becomes the entire frontmatter.
    Replace,
}

/// Compute the frontmatter that results from applying `values` in `mode`.
pub fn apply_update(
    current: Option<&Frontmatter>,
    mode: FrontmatterMode,
    values: &BTreeMap<String, Value>,
) -> Frontmatter {
    match mode {
        FrontmatterMode::Replace => Frontmatter { fields: values.clone() },
        FrontmatterMode::Merge => {
            let mut fields = current.map(|fm| fm.fields.clone()).unwrap_or_default();
            for (key, value) in values {
                if value.is_null() {
                    fields.remove(key);
                } else {
                    fields.insert(key.clone(), value.clone());
                }
            }
            Frontmatter { fields }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(yaml: &str) -> Frontmatter {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn values(yaml: &str) -> BTreeMap<String, Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn merge_sets_and_overwrites() {
        let current = fm("status: draft\ntitle: Note");
        let result =
            apply_update(Some(&current), FrontmatterMode::Merge, &values("status: done"));
        assert_eq!(result.get("status").and_then(|v| v.as_str()), Some("done"));
        assert_eq!(result.get("title").and_then(|v| v.as_str()), Some("Note"));
    }

    #[test]
    fn merge_null_deletes_key() {
        let current = fm("status: draft\ntitle: Note");
        let result = apply_update(Some(&current), FrontmatterMode::Merge, &values("status: ~"));
        assert!(result.get("status").is_none());
        assert!(result.get("title").is_some());
    }

    #[test]
    fn merge_without_existing_frontmatter() {
        let result = apply_update(None, FrontmatterMode::Merge, &values("a: 1"));
        assert_eq!(result.fields.len(), 1);
    }

    #[test]
    fn replace_substitutes_everything() {
        let current = fm("status: draft\ntitle: Note");
        let result = apply_update(Some(&current), FrontmatterMode::Replace, &values("x: y"));
        assert_eq!(result.fields.len(), 1);
        assert!(result.get("title").is_none());
    }
}
