//! Set command: frontmatter updates from `key=value` assignments.

use std::collections::BTreeMap;

use serde_yaml::Value;
use vaultindex_core::Operation;
use vaultindex_core::config::ResolvedConfig;
use vaultindex_core::frontmatter::FrontmatterMode;

use super::{fail, find_document, open_index, run_operation};
use crate::SetArgs;

pub fn run(rc: &ResolvedConfig, args: &SetArgs) {
    let values = match parse_assignments(&args.values) {
        Ok(values) => values,
        Err(e) => fail(e),
    };
    let mode = if args.replace { FrontmatterMode::Replace } else { FrontmatterMode::Merge };

    let indexer = open_index(rc);
    let doc = find_document(&indexer, &args.path);
    let operation = Operation::UpdateFrontmatter { mode, values };
    run_operation(rc, &indexer, &doc, &operation, args.mutation);
}

/// Parse `key=value` pairs. Values are YAML scalars or flow collections;
/// an empty value becomes `null`, which removes the key when merging.
fn parse_assignments(raw: &[String]) -> Result<BTreeMap<String, Value>, String> {
    let mut values = BTreeMap::new();
    for assignment in raw {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(format!("expected key=value, got '{assignment}'"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing key in '{assignment}'"));
        }
        let value = value.trim();
        let value = if value.is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        };
        values.insert(key.to_string(), value);
    }
    Ok(values)
}
