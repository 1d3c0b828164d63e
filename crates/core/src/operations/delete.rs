//! Soft and permanent deletion.

use std::path::PathBuf;

use super::references::{Rewrite, plan_edits};
use super::{
    DeleteMode, Finish, OperationContext, OperationError, OperationKind, Plan, ValidationResult,
    missing_parent,
};
use crate::index::DocumentRecord;

/// `<trash>[/YYYY-MM-DD]/<YYYYMMDD-HHMMSS>-<file name>`
pub(super) fn trash_path(doc: &DocumentRecord, ctx: &OperationContext<'_>) -> PathBuf {
    let mut dir = ctx.vault_root().join(&ctx.settings.trash_dir);
    if ctx.settings.trash_by_date {
        dir.push(ctx.now.format("%Y-%m-%d").to_string());
    }
    dir.join(format!("{}-{}", ctx.timestamp(), doc.file_name()))
}

pub(super) fn validate(doc: &DocumentRecord, ctx: &OperationContext<'_>) -> ValidationResult {
    if ctx.indexer.get_document(&doc.path).is_none() {
        return ValidationResult::invalid(format!("{} is not indexed", doc.relative_path));
    }
    ValidationResult::ok()
}

pub(super) fn plan(
    doc: &DocumentRecord,
    mode: DeleteMode,
    ctx: &OperationContext<'_>,
) -> Result<Plan, OperationError> {
    let finish = match mode {
        DeleteMode::Soft => {
            let to = trash_path(doc, ctx);
            Finish::Trash { create_dir: missing_parent(ctx, &to), to }
        }
        DeleteMode::Permanent => Finish::Unlink,
    };
    let plan = Plan::new(OperationKind::Delete, doc, finish);
    if !ctx.options.update_links {
        return Ok(plan);
    }
    let self_dir = doc.path.parent().unwrap_or(ctx.vault_root());
    let edits = plan_edits(ctx.indexer, &doc.path, Rewrite::Deleted, false, self_dir)?;
    Ok(plan.with_edits(edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationSettings;
    use crate::indexer::VaultIndexer;
    use crate::operations::Operation;
    use crate::vault::{MemoryFs, VaultFs};
    use chrono::{Local, TimeZone};
    use std::path::Path;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryFs>, VaultIndexer) {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/v/gone.md", "# Gone\n[[gone]] self")
                .with_file("/v/ref.md", "See [[gone]], [[gone|the old one]] and ![[gone]]."),
        );
        let indexer = VaultIndexer::new("/v", fs.clone());
        indexer.initialize().unwrap();
        (fs, indexer)
    }

    #[test]
    fn soft_delete_moves_into_trash() {
        let (fs, indexer) = setup();
        let settings = OperationSettings { trash_by_date: true, ..OperationSettings::default() };
        let ctx = OperationContext::new(&indexer, &settings)
            .with_now(Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let doc = indexer.get_document(Path::new("gone.md")).unwrap();

        let result = Operation::Delete { mode: DeleteMode::Soft }.execute_and_apply(&doc, &ctx);
        let trashed = PathBuf::from("/v/.trash/2024-01-02/20240102-030405-gone.md");
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.document, Some(trashed.clone()));
        assert!(fs.exists(&trashed));
        assert!(!fs.exists(Path::new("/v/gone.md")));
        assert!(indexer.get_document(Path::new("gone.md")).is_none());
    }

    #[test]
    fn references_become_deleted_markers() {
        let (fs, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let doc = indexer.get_document(Path::new("gone.md")).unwrap();

        let result = Operation::Delete { mode: DeleteMode::Permanent }.execute_and_apply(&doc, &ctx);
        assert!(result.success);
        assert_eq!(result.references_updated, 3);
        assert_eq!(
            fs.read_to_string(Path::new("/v/ref.md")).unwrap(),
            "See ~~gone~~ (deleted), ~~the old one~~ (deleted) and ~~gone~~ (deleted embed)."
        );
        assert_eq!(fs.paths(), vec![PathBuf::from("/v/ref.md")]);
    }

    #[test]
    fn unindexed_documents_are_rejected() {
        let (_, indexer) = setup();
        let settings = OperationSettings::default();
        let ctx = OperationContext::new(&indexer, &settings);
        let mut doc = indexer.get_document(Path::new("gone.md")).unwrap();
        doc.path = PathBuf::from("/v/never.md");
        assert!(!validate(&doc, &ctx).valid);
    }
}
