//! Document mutations: move, rename, delete and frontmatter updates.
//!
//! Every operation follows the same contract. `validate` is pure, `preview`
//! computes the full set of side effects without writing, and `execute`
//! validates, optionally backs up the original, changes the filesystem and
//! rewrites references. Failures become `OperationResult { success: false }`.

mod delete;
mod frontmatter;
pub mod references;
mod relocate;
mod rename;
mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use types::{
    LinkRewrite, OperationKind, OperationPreview, OperationResult, PlannedChange, ValidationResult,
};

use crate::config::OperationSettings;
use crate::frontmatter::{FrontmatterMode, FrontmatterParseError};
use crate::index::DocumentRecord;
use crate::indexer::{IndexerError, VaultIndexer};
use crate::vault::{VaultFs, VaultFsError, is_within};
use references::FileEdit;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Fs(#[from] VaultFsError),

    #[error("failed to parse frontmatter of {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterParseError,
    },

    #[error("failed to update index: {0}")]
    Index(#[from] IndexerError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Move into the trash folder.
    #[default]
    Soft,
    Permanent,
}

/// A mutation of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Relocate into a folder, relative to the vault root.
    Move { target_folder: String },
    /// New file name in the same folder; the extension is optional.
    Rename { new_name: String },
    Delete {
        #[serde(default)]
        mode: DeleteMode,
    },
    UpdateFrontmatter {
        #[serde(default)]
        mode: FrontmatterMode,
        values: BTreeMap<String, serde_yaml::Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOptions {
    pub dry_run: bool,
    pub create_backup: bool,
    pub update_links: bool,
    /// Batch level: keep going after a failure.
    pub continue_on_error: bool,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self { dry_run: false, create_backup: false, update_links: true, continue_on_error: false }
    }
}

impl OperationOptions {
    pub fn from_settings(settings: &OperationSettings) -> Self {
        Self {
            create_backup: settings.create_backup,
            update_links: settings.update_links,
            ..Self::default()
        }
    }
}

/// Everything an operation needs besides the document.
pub struct OperationContext<'a> {
    pub indexer: &'a VaultIndexer,
    pub settings: &'a OperationSettings,
    pub options: OperationOptions,
    /// Used for trash and backup names.
    pub now: DateTime<Local>,
}

impl<'a> OperationContext<'a> {
    pub fn new(indexer: &'a VaultIndexer, settings: &'a OperationSettings) -> Self {
        Self { indexer, settings, options: OperationOptions::from_settings(settings), now: Local::now() }
    }

    pub fn with_options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_now(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    fn vault_root(&self) -> &Path {
        self.indexer.vault_root()
    }

    fn fs(&self) -> &dyn VaultFs {
        self.indexer.fs()
    }

    fn timestamp(&self) -> String {
        self.now.format("%Y%m%d-%H%M%S").to_string()
    }

    fn backup_path(&self, doc: &DocumentRecord) -> PathBuf {
        self.vault_root()
            .join(&self.settings.backup_dir)
            .join(format!("{}-{}", self.timestamp(), doc.file_name()))
    }
}

/// How the document itself ends up.
#[derive(Debug, Clone)]
enum Finish {
    InPlace,
    Relocate { to: PathBuf, create_dir: Option<PathBuf> },
    Trash { to: PathBuf, create_dir: Option<PathBuf> },
    Unlink,
}

/// Everything `execute` will do, computed up front.
#[derive(Debug)]
struct Plan {
    kind: OperationKind,
    source: PathBuf,
    finish: Finish,
    /// New content of the document itself.
    content: Option<String>,
    /// Describes `content`.
    changes: Vec<PlannedChange>,
    /// Link rewrites in other documents.
    edits: Vec<FileEdit>,
    references: usize,
}

impl Plan {
    fn new(kind: OperationKind, doc: &DocumentRecord, finish: Finish) -> Self {
        Self {
            kind,
            source: doc.path.clone(),
            finish,
            content: None,
            changes: Vec::new(),
            edits: Vec::new(),
            references: 0,
        }
    }

    /// Split the document's own edit out of `edits`.
    fn with_edits(mut self, edits: Vec<FileEdit>) -> Self {
        for edit in edits {
            self.references += edit.replacements.len();
            if edit.path == self.source {
                self.changes.push(edit.planned_change(edit.path.clone()));
                self.content = Some(edit.updated);
            } else {
                self.edits.push(edit);
            }
        }
        self
    }

    fn target(&self) -> Option<PathBuf> {
        match &self.finish {
            Finish::Relocate { to, .. } | Finish::Trash { to, .. } => Some(to.clone()),
            Finish::InPlace | Finish::Unlink => None,
        }
    }

    fn preview(self, ctx: &OperationContext<'_>, doc: &DocumentRecord) -> OperationPreview {
        let mut changes = Vec::new();
        if ctx.options.create_backup {
            changes.push(PlannedChange::Backup { path: self.source.clone(), to: ctx.backup_path(doc) });
        }
        let target = self.target();
        let removal = matches!(self.finish, Finish::Trash { .. } | Finish::Unlink);
        let others: Vec<PlannedChange> =
            self.edits.iter().map(|e| e.planned_change(e.path.clone())).collect();
        if removal {
            changes.extend(others.iter().cloned());
        }
        changes.extend(self.changes);
        match &self.finish {
            Finish::InPlace => {}
            Finish::Relocate { to, create_dir } | Finish::Trash { to, create_dir } => {
                if let Some(dir) = create_dir {
                    changes.push(PlannedChange::CreateDir { path: dir.clone() });
                }
                changes.push(PlannedChange::MoveFile { from: self.source.clone(), to: to.clone() });
            }
            Finish::Unlink => changes.push(PlannedChange::DeleteFile { path: self.source.clone() }),
        }
        if !removal {
            changes.extend(others);
        }
        OperationPreview { kind: self.kind, source: self.source, target, changes }
    }

    fn apply(self, fs: &dyn VaultFs) -> Result<OperationResult, OperationError> {
        let mut result = OperationResult::new(self.kind, self.source.clone());
        result.references_updated = self.references;

        match &self.finish {
            Finish::InPlace => {
                if let Some(content) = &self.content {
                    fs.write(&self.source, content)?;
                }
                result.document = Some(self.source.clone());
                result.touched.push(self.source.clone());
                write_edits(fs, &self.edits)?;
            }
            Finish::Relocate { to, create_dir } => {
                if let Some(dir) = create_dir {
                    fs.create_dir_all(dir)?;
                }
                fs.rename(&self.source, to)?;
                if let Some(content) = &self.content {
                    fs.write(to, content)?;
                }
                result.document = Some(to.clone());
                result.touched.push(to.clone());
                result.removed.push(self.source.clone());
                write_edits(fs, &self.edits)?;
            }
            Finish::Trash { to, create_dir } => {
                write_edits(fs, &self.edits)?;
                if let Some(dir) = create_dir {
                    fs.create_dir_all(dir)?;
                }
                fs.rename(&self.source, to)?;
                result.document = Some(to.clone());
                result.removed.push(self.source.clone());
            }
            Finish::Unlink => {
                write_edits(fs, &self.edits)?;
                fs.remove_file(&self.source)?;
                result.removed.push(self.source.clone());
            }
        }
        result.touched.extend(self.edits.into_iter().map(|e| e.path));
        Ok(result)
    }
}

fn write_edits(fs: &dyn VaultFs, edits: &[FileEdit]) -> Result<(), OperationError> {
    for edit in edits {
        fs.write(&edit.path, &edit.updated)?;
        debug!("rewrote {} link(s) in {}", edit.replacements.len(), edit.path.display());
    }
    Ok(())
}

/// The folder to create for `target`, if it does not exist yet.
fn missing_parent(ctx: &OperationContext<'_>, target: &Path) -> Option<PathBuf> {
    target.parent().filter(|dir| !ctx.fs().exists(dir)).map(Path::to_path_buf)
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Move { .. } => OperationKind::Move,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Delete { .. } => OperationKind::Delete,
            Self::UpdateFrontmatter { .. } => OperationKind::UpdateFrontmatter,
        }
    }

    /// Structural checks against the index. Touches no files.
    pub fn validate(&self, doc: &DocumentRecord, ctx: &OperationContext<'_>) -> ValidationResult {
        if !is_within(ctx.vault_root(), &doc.path) {
            return ValidationResult::invalid(format!(
                "{} is outside the vault",
                doc.path.display()
            ));
        }
        match self {
            Self::Move { target_folder } => relocate::validate(doc, target_folder, ctx),
            Self::Rename { new_name } => rename::validate(doc, new_name, ctx),
            Self::Delete { .. } => delete::validate(doc, ctx),
            Self::UpdateFrontmatter { mode, values } => frontmatter::validate(*mode, values),
        }
    }

    /// Where the document will live afterwards. Pure.
    pub fn destination(&self, doc: &DocumentRecord, ctx: &OperationContext<'_>) -> Option<PathBuf> {
        match self {
            Self::Move { target_folder } => relocate::target_path(doc, target_folder, ctx),
            Self::Rename { new_name } => Some(rename::target_path(doc, new_name, ctx)),
            Self::Delete { mode: DeleteMode::Soft } => Some(delete::trash_path(doc, ctx)),
            Self::Delete { mode: DeleteMode::Permanent } => None,
            Self::UpdateFrontmatter { .. } => Some(doc.path.clone()),
        }
    }

    /// Every side effect `execute` would have, without writing anything.
    pub fn preview(
        &self,
        doc: &DocumentRecord,
        ctx: &OperationContext<'_>,
    ) -> Result<OperationPreview, OperationError> {
        let validation = self.validate(doc, ctx);
        if let Some(error) = validation.error {
            return Err(OperationError::Invalid(error));
        }
        Ok(self.plan(doc, ctx)?.preview(ctx, doc))
    }

    pub fn execute(&self, doc: &DocumentRecord, ctx: &OperationContext<'_>) -> OperationResult {
        let kind = self.kind();
        let validation = self.validate(doc, ctx);
        if let Some(error) = validation.error {
            debug!("{} of {} rejected: {}", kind, doc.relative_path, error);
            return OperationResult::failed(kind, doc.path.clone(), error);
        }

        if ctx.options.dry_run {
            let mut result = OperationResult::new(kind, doc.path.clone());
            result.dry_run = true;
            result.document = self.destination(doc, ctx);
            return result;
        }

        let mut backup = None;
        if ctx.options.create_backup {
            let to = ctx.backup_path(doc);
            if let Err(e) = ctx.fs().copy(&doc.path, &to) {
                return OperationResult::failed(kind, doc.path.clone(), format!("backup failed: {e}"));
            }
            backup = Some(to);
        }

        match self.plan(doc, ctx).and_then(|plan| plan.apply(ctx.fs())) {
            Ok(mut result) => {
                result.backup = backup;
                info!(
                    "{} {} ({} reference(s) updated)",
                    kind, doc.relative_path, result.references_updated
                );
                result
            }
            Err(e) => {
                warn!("{} of {} failed: {}", kind, doc.relative_path, e);
                let mut result = OperationResult::failed(kind, doc.path.clone(), e.to_string());
                result.backup = backup;
                result
            }
        }
    }

    /// [`execute`](Self::execute), then bring the index up to date.
    pub fn execute_and_apply(
        &self,
        doc: &DocumentRecord,
        ctx: &OperationContext<'_>,
    ) -> OperationResult {
        let result = self.execute(doc, ctx);
        if let Err(e) = ctx.indexer.apply_result(&result) {
            warn!("index update after {} of {} failed: {}", result.kind, doc.relative_path, e);
        }
        result
    }

    fn plan(&self, doc: &DocumentRecord, ctx: &OperationContext<'_>) -> Result<Plan, OperationError> {
        match self {
            Self::Move { target_folder } => relocate::plan(doc, target_folder, ctx),
            Self::Rename { new_name } => rename::plan(doc, new_name, ctx),
            Self::Delete { mode } => delete::plan(doc, *mode, ctx),
            Self::UpdateFrontmatter { mode, values } => frontmatter::plan(doc, *mode, values, ctx),
        }
    }
}

/// Results of a sequential batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub results: Vec<OperationResult>,
    /// Documents never attempted because an earlier failure aborted the batch.
    pub skipped: Vec<PathBuf>,
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Run operations one after another, applying each result to the index.
///
/// Without `continue_on_error` the first failure aborts the rest, which are
/// reported as skipped. Nothing already done is rolled back.
pub fn run_batch(items: &[(DocumentRecord, Operation)], ctx: &OperationContext<'_>) -> BatchReport {
    let mut report = BatchReport::default();
    for (doc, operation) in items {
        if report.aborted {
            report.skipped.push(doc.path.clone());
            continue;
        }
        let result = operation.execute_and_apply(doc, ctx);
        let failed = !result.success;
        report.results.push(result);
        if failed && !ctx.options.continue_on_error {
            report.aborted = true;
        }
    }
    report
}
