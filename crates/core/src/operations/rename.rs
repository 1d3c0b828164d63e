//! Rename within the same folder.

use std::path::{Path, PathBuf};

use super::references::{Rewrite, plan_edits};
use super::{Finish, OperationContext, OperationError, OperationKind, Plan, ValidationResult};
use crate::index::DocumentRecord;
use crate::index::resolver::with_extension;

/// The new file name: `new_name` with the vault extension appended if missing.
pub(super) fn target_path(doc: &DocumentRecord, new_name: &str, ctx: &OperationContext<'_>) -> PathBuf {
    let file_name = with_extension(new_name.trim(), ctx.indexer.extension());
    doc.path.parent().unwrap_or(ctx.vault_root()).join(file_name)
}

pub(super) fn validate(
    doc: &DocumentRecord,
    new_name: &str,
    ctx: &OperationContext<'_>,
) -> ValidationResult {
    let name = new_name.trim();
    if name.is_empty() {
        return ValidationResult::invalid("new name is empty");
    }
    if name.contains(['/', '\\']) {
        return ValidationResult::invalid(format!("new name must not contain path separators: {name}"));
    }
    if name.trim_matches('.').is_empty() {
        return ValidationResult::invalid(format!("invalid name: {name}"));
    }

    let target = target_path(doc, name, ctx);
    if target == doc.path {
        return ValidationResult::invalid(format!("{} already has that name", doc.relative_path));
    }
    if let Some(existing) = ctx.indexer.get_document(&target) {
        return ValidationResult::invalid(format!("{} already exists", existing.relative_path));
    }
    ValidationResult::ok()
}

pub(super) fn plan(
    doc: &DocumentRecord,
    new_name: &str,
    ctx: &OperationContext<'_>,
) -> Result<Plan, OperationError> {
    let to = target_path(doc, new_name, ctx);
    let new_stem = stem(&to);
    let finish = Finish::Relocate { to: to.clone(), create_dir: None };
    let plan = Plan::new(OperationKind::Rename, doc, finish);
    if !ctx.options.update_links {
        return Ok(plan);
    }

    let rewrite = Rewrite::Rename { old_name: &doc.name, new_name: &new_stem };
    let self_dir = to.parent().unwrap_or(ctx.vault_root());
    let edits = plan_edits(ctx.indexer, &doc.path, rewrite, true, self_dir)?;
    Ok(plan.with_edits(edits))
}

fn stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationSettings;
    use crate::indexer::VaultIndexer;
    use crate::operations::{Operation, OperationOptions};
    use crate::vault::{MemoryFs, VaultFs};
    use rstest::rstest;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryFs>, VaultIndexer) {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/v/notes/original.md", "# First Draft\nSee [[original#Top]] and [[other]].")
                .with_file("/v/notes/sibling.md", "")
                .with_file("/v/b.md", "Refs: [[original]], [[notes/original|O]], [o](notes/original.md).")
                .with_file("/v/other.md", "[[First Draft]] by title, originality is not a link."),
        );
        let indexer = VaultIndexer::new("/v", fs.clone());
        indexer.initialize().unwrap();
        (fs, indexer)
    }

    #[rstest]
    #[case("", "empty")]
    #[case("a/b", "separators")]
    #[case("..", "invalid name")]
    #[case("original", "already has that name")]
    #[case("sibling.md", "already exists")]
    fn rejects_bad_names(#[case] name: &str, #[case] message: &str) {
        let (_, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("notes/original.md")).unwrap();
        let result = validate(&doc, name, &ctx);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains(message), "{name}");
    }

    #[test]
    fn appends_extension() {
        let (_, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("notes/original.md")).unwrap();
        assert_eq!(target_path(&doc, "renamed", &ctx), PathBuf::from("/v/notes/renamed.md"));
        assert_eq!(target_path(&doc, "renamed.md", &ctx), PathBuf::from("/v/notes/renamed.md"));
    }

    #[test]
    fn rewrites_backlinks_and_self_references() {
        let (fs, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("notes/original.md")).unwrap();

        let result = Operation::Rename { new_name: "renamed".into() }.execute_and_apply(&doc, &ctx);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.references_updated, 4);
        assert_eq!(
            fs.read_to_string(Path::new("/v/b.md")).unwrap(),
            "Refs: [[renamed]], [[notes/renamed|O]], [o](notes/renamed.md)."
        );
        assert_eq!(
            fs.read_to_string(Path::new("/v/notes/renamed.md")).unwrap(),
            "# First Draft\nSee [[renamed#Top]] and [[other]]."
        );
        // Title references still resolve and are left alone.
        assert_eq!(
            fs.read_to_string(Path::new("/v/other.md")).unwrap(),
            "[[First Draft]] by title, originality is not a link."
        );
        assert!(!fs.exists(Path::new("/v/notes/original.md")));
        assert!(indexer.get_backlinks(Path::new("notes/renamed.md")).contains(&PathBuf::from("/v/b.md")));
    }

    #[test]
    fn link_updates_can_be_disabled() {
        let (fs, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings)
            .with_options(OperationOptions { update_links: false, ..OperationOptions::default() });
        let doc = indexer.get_document(Path::new("notes/original.md")).unwrap();

        let result = Operation::Rename { new_name: "renamed".into() }.execute(&doc, &ctx);
        assert!(result.success);
        assert_eq!(result.references_updated, 0);
        assert!(fs.read_to_string(Path::new("/v/b.md")).unwrap().contains("[[original]]"));
    }
}
