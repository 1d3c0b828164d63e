//! Move into another folder of the vault.

use std::path::{Path, PathBuf};

use super::references::{FileEdit, Rewrite, plan_edits, relative_links_after_move};
use super::{
    Finish, OperationContext, OperationError, OperationKind, Plan, ValidationResult, missing_parent,
};
use crate::index::DocumentRecord;
use crate::vault::{is_within, normalize_path};

fn target_dir(folder: &str, ctx: &OperationContext<'_>) -> PathBuf {
    let folder = folder.trim();
    let dir = Path::new(folder);
    if dir.is_absolute() {
        normalize_path(dir)
    } else {
        normalize_path(&ctx.vault_root().join(dir))
    }
}

/// `None` when the folder lies outside the vault.
pub(super) fn target_path(
    doc: &DocumentRecord,
    folder: &str,
    ctx: &OperationContext<'_>,
) -> Option<PathBuf> {
    let dir = target_dir(folder, ctx);
    is_within(ctx.vault_root(), &dir).then(|| dir.join(doc.file_name()))
}

pub(super) fn validate(
    doc: &DocumentRecord,
    folder: &str,
    ctx: &OperationContext<'_>,
) -> ValidationResult {
    let Some(target) = target_path(doc, folder, ctx) else {
        return ValidationResult::invalid(format!("target folder {folder} is outside the vault"));
    };
    if target == doc.path {
        return ValidationResult::invalid(format!("{} is already in that folder", doc.relative_path));
    }
    if let Some(existing) = ctx.indexer.get_document(&target) {
        return ValidationResult::invalid(format!("{} already exists", existing.relative_path));
    }
    ValidationResult::ok()
}

pub(super) fn plan(
    doc: &DocumentRecord,
    folder: &str,
    ctx: &OperationContext<'_>,
) -> Result<Plan, OperationError> {
    let to = target_path(doc, folder, ctx)
        .ok_or_else(|| OperationError::Invalid(format!("target folder {folder} is outside the vault")))?;
    let new_dir = to.parent().unwrap_or(ctx.vault_root()).to_path_buf();
    let finish = Finish::Relocate { to: to.clone(), create_dir: missing_parent(ctx, &to) };
    let plan = Plan::new(OperationKind::Move, doc, finish);
    if !ctx.options.update_links {
        return Ok(plan);
    }

    let rewrite = Rewrite::Move { new_path: &to };
    let mut edits = plan_edits(ctx.indexer, &doc.path, rewrite, true, &new_dir)?;

    // The document's own relative links must follow it.
    let own = edits.iter().position(|e| e.path == doc.path);
    let content = match own {
        Some(i) => edits[i].original.clone(),
        None => ctx.fs().read_to_string(&doc.path)?,
    };
    let mut replacements = relative_links_after_move(ctx.indexer, &doc.path, &content, &new_dir);
    if !replacements.is_empty() {
        if let Some(i) = own {
            replacements.extend(edits.remove(i).replacements);
        }
        edits.push(FileEdit::new(doc.path.clone(), content, replacements));
    }
    Ok(plan.with_edits(edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationSettings;
    use crate::indexer::VaultIndexer;
    use crate::operations::Operation;
    use crate::vault::{MemoryFs, VaultFs};
    use rstest::rstest;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryFs>, VaultIndexer) {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/v/inbox/task.md", "[list](../lists/todo.md) and [me](task.md)")
                .with_file("/v/lists/todo.md", "[[task]] [[inbox/task]] [t](../inbox/task.md)")
                .with_file("/v/archive/keep.md", ""),
        );
        let indexer = VaultIndexer::new("/v", fs.clone());
        indexer.initialize().unwrap();
        (fs, indexer)
    }

    #[rstest]
    #[case("../outside", "outside the vault")]
    #[case("inbox", "already in that folder")]
    fn rejects_bad_folders(#[case] folder: &str, #[case] message: &str) {
        let (_, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("inbox/task.md")).unwrap();
        let result = validate(&doc, folder, &ctx);
        assert!(result.error.unwrap().contains(message));
    }

    #[test]
    fn rejects_collisions() {
        let (fs, indexer) = setup();
        fs.write(Path::new("/v/archive/task.md"), "").unwrap();
        indexer.update_file(Path::new("archive/task.md")).unwrap();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("inbox/task.md")).unwrap();
        assert!(!validate(&doc, "archive", &ctx).valid);
    }

    #[test]
    fn moves_and_rewrites_path_links() {
        let (fs, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("inbox/task.md")).unwrap();

        let result = Operation::Move { target_folder: "archive/2024".into() }.execute_and_apply(&doc, &ctx);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.document, Some(PathBuf::from("/v/archive/2024/task.md")));
        assert_eq!(
            fs.read_to_string(Path::new("/v/lists/todo.md")).unwrap(),
            "[[task]] [[archive/2024/task]] [t](../archive/2024/task.md)"
        );
        assert_eq!(
            fs.read_to_string(Path::new("/v/archive/2024/task.md")).unwrap(),
            "[list](../../lists/todo.md) and [me](task.md)"
        );
        assert_eq!(
            indexer.get_backlinks(Path::new("archive/2024/task.md")),
            vec![PathBuf::from("/v/archive/2024/task.md"), PathBuf::from("/v/lists/todo.md")]
        );
        assert!(indexer.verify_consistency().is_empty());
    }
}
