//! Values produced by validate, preview and execute.

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
    Rename,
    Delete,
    UpdateFrontmatter,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Move => "move",
            Self::Rename => "rename",
            Self::Delete => "delete",
            Self::UpdateFrontmatter => "update-frontmatter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, error: None }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self { valid: false, error: Some(error.into()) }
    }
}

/// One link rewritten inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRewrite {
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// A side effect an operation would have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannedChange {
    Backup { path: PathBuf, to: PathBuf },
    CreateDir { path: PathBuf },
    MoveFile { from: PathBuf, to: PathBuf },
    DeleteFile { path: PathBuf },
    RewriteLinks { path: PathBuf, rewrites: Vec<LinkRewrite> },
    UpdateFrontmatter { path: PathBuf, diff: String },
}

impl std::fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backup { path, to } => write!(f, "backup {} -> {}", path.display(), to.display()),
            Self::CreateDir { path } => write!(f, "create folder {}", path.display()),
            Self::MoveFile { from, to } => write!(f, "move {} -> {}", from.display(), to.display()),
            Self::DeleteFile { path } => write!(f, "delete {}", path.display()),
            Self::RewriteLinks { path, rewrites } => {
                write!(f, "rewrite {} link(s) in {}", rewrites.len(), path.display())?;
                for r in rewrites {
                    write!(f, "\n  line {}: {} -> {}", r.line, r.before, r.after)?;
                }
                Ok(())
            }
            Self::UpdateFrontmatter { path, diff } => {
                write!(f, "update frontmatter of {}", path.display())?;
                for line in diff.lines() {
                    write!(f, "\n  {line}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationPreview {
    pub kind: OperationKind,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    pub changes: Vec<PlannedChange>,
}

/// Outcome of `execute`.
///
/// `touched` lists files that exist afterwards with new content or location,
/// `removed` the paths that no longer hold the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub kind: OperationKind,
    pub source: PathBuf,
    pub success: bool,
    /// Where the document lives afterwards, if anywhere.
    pub document: Option<PathBuf>,
    pub error: Option<String>,
    pub backup: Option<PathBuf>,
    pub dry_run: bool,
    pub touched: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub references_updated: usize,
}

impl OperationResult {
    pub(crate) fn new(kind: OperationKind, source: PathBuf) -> Self {
        Self {
            kind,
            source,
            success: true,
            document: None,
            error: None,
            backup: None,
            dry_run: false,
            touched: Vec::new(),
            removed: Vec::new(),
            references_updated: 0,
        }
    }

    pub(crate) fn failed(kind: OperationKind, source: PathBuf, error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Self::new(kind, source) }
    }
}
