//! Frontmatter updates in place.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_yaml::Value;

use super::types::PlannedChange;
use super::{Finish, OperationContext, OperationError, OperationKind, Plan, ValidationResult};
use crate::frontmatter::{self, FrontmatterMode, ParsedDocument, apply_update};
use crate::index::DocumentRecord;

pub(super) fn validate(mode: FrontmatterMode, values: &BTreeMap<String, Value>) -> ValidationResult {
    if values.keys().any(|k| k.trim().is_empty()) {
        return ValidationResult::invalid("frontmatter keys must not be empty");
    }
    if mode == FrontmatterMode::Merge && values.is_empty() {
        return ValidationResult::invalid("no frontmatter values given");
    }
    ValidationResult::ok()
}

pub(super) fn plan(
    doc: &DocumentRecord,
    mode: FrontmatterMode,
    values: &BTreeMap<String, Value>,
    ctx: &OperationContext<'_>,
) -> Result<Plan, OperationError> {
    let content = ctx.fs().read_to_string(&doc.path)?;
    let parsed = frontmatter::parse(&content)
        .map_err(|source| OperationError::Frontmatter { path: doc.path.clone(), source })?;
    let before = parsed.frontmatter.as_ref().map(|fm| fm.fields.clone()).unwrap_or_default();
    let updated = apply_update(parsed.frontmatter.as_ref(), mode, values);
    let diff = render_diff(&before, &updated.fields);

    let rendered = frontmatter::serialize(&ParsedDocument {
        frontmatter: Some(updated),
        body: parsed.body,
        body_offset: 0,
    });

    let mut plan = Plan::new(OperationKind::UpdateFrontmatter, doc, Finish::InPlace);
    plan.changes.push(PlannedChange::UpdateFrontmatter { path: doc.path.clone(), diff });
    plan.content = Some(rendered);
    Ok(plan)
}

/// `~ key: old -> new`, `+ key: new` and `- key: old`, one line per changed key.
pub(super) fn render_diff(before: &BTreeMap<String, Value>, after: &BTreeMap<String, Value>) -> String {
    let mut out = String::new();
    let keys: std::collections::BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for key in keys {
        let _ = match (before.get(key), after.get(key)) {
            (Some(old), Some(new)) if old != new => {
                writeln!(out, "~ {key}: {} -> {}", render_value(old), render_value(new))
            }
            (None, Some(new)) => writeln!(out, "+ {key}: {}", render_value(new)),
            (Some(old), None) => writeln!(out, "- {key}: {}", render_value(old)),
            _ => Ok(()),
        };
    }
    if out.is_empty() {
        out.push_str("(no changes)\n");
    }
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}
