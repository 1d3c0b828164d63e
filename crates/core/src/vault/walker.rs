//! Recursive vault directory walker.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum VaultWalkerError {
    #[error("vault root does not exist: {0}")]
    MissingRoot(String),

    #[error("failed to walk vault directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),

    #[error("failed to read file metadata {0}: {1}")]
    MetadataError(String, #[source] std::io::Error),
}

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Path under the root the walker was given.
    pub absolute_path: PathBuf,
    /// Path relative to vault root.
    pub relative_path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// Walker for discovering document files in a vault.
#[derive(Debug)]
pub struct VaultWalker {
    root: PathBuf,
    extension: String,
    /// Folders to exclude from walking (relative paths from vault root).
    excluded_folders: Vec<PathBuf>,
}

impl VaultWalker {
    /// Create a walker for `.md` files under `root`.
    pub fn new(root: &Path) -> Result<Self, VaultWalkerError> {
        Self::with_exclusions(root, "md", Vec::new())
    }

    /// Create a walker for files with `extension`, skipping `excluded_folders`.
    ///
    /// Excluded folders may be relative to the vault root or absolute paths
    /// inside it.
    pub fn with_exclusions(
        root: &Path,
        extension: &str,
        excluded_folders: Vec<PathBuf>,
    ) -> Result<Self, VaultWalkerError> {
        if !root.is_dir() {
            return Err(VaultWalkerError::MissingRoot(root.display().to_string()));
        }

        let excluded_folders = excluded_folders
            .into_iter()
            .map(|p| {
                if p.is_absolute() {
                    p.strip_prefix(root).map(Path::to_path_buf).unwrap_or(p)
                } else {
                    p
                }
            })
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            excluded_folders,
        })
    }

    /// Walk the vault and return all matching files, sorted by relative path.
    ///
    /// Hidden entries, common non-vault directories and configured exclusions
    /// are skipped.
    pub fn walk(&self) -> Result<Vec<WalkedFile>, VaultWalkerError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = entry.map_err(|e| {
                VaultWalkerError::WalkError(self.root.display().to_string(), e)
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() || !has_extension(path, &self.extension) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                VaultWalkerError::MetadataError(path.display().to_string(), e.into())
            })?;

            let relative_path =
                path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();

            files.push(WalkedFile {
                absolute_path: path.to_path_buf(),
                relative_path,
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // Never filter the root directory
        if entry.depth() == 0 {
            return false;
        }

        if is_skipped_name(&entry.file_name().to_string_lossy()) {
            return true;
        }

        if let Ok(relative) = entry.path().strip_prefix(&self.root) {
            return self.excluded_folders.iter().any(|excluded| relative.starts_with(excluded));
        }

        false
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hidden entries and common non-vault directories.
pub fn is_skipped_name(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "node_modules" | "target" | "__pycache__" | "venv")
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("note1.md"), "# Note 1").unwrap();
        fs::write(root.join("note2.md"), "# Note 2").unwrap();

        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/note3.md"), "# Note 3").unwrap();

        fs::create_dir(root.join(".trash")).unwrap();
        fs::write(root.join(".trash/old.md"), "# Old").unwrap();

        fs::write(root.join("readme.txt"), "Not markdown").unwrap();

        dir
    }

    fn relative(files: &[WalkedFile]) -> Vec<String> {
        files.iter().map(|f| f.relative_path.to_string_lossy().replace('\\', "/")).collect()
    }

    #[test]
    fn walk_finds_markdown_files_sorted() {
        let vault = create_test_vault();
        let files = VaultWalker::new(vault.path()).unwrap().walk().unwrap();
        assert_eq!(relative(&files), vec!["note1.md", "note2.md", "subdir/note3.md"]);
    }

    #[test]
    fn walk_skips_hidden_directories() {
        let vault = create_test_vault();
        let files = VaultWalker::new(vault.path()).unwrap().walk().unwrap();
        assert!(!relative(&files).iter().any(|p| p.contains(".trash")));
    }

    #[test]
    fn walk_honours_extension() {
        let vault = create_test_vault();
        let walker = VaultWalker::with_exclusions(vault.path(), "txt", Vec::new()).unwrap();
        assert_eq!(relative(&walker.walk().unwrap()), vec!["readme.txt"]);
    }

    #[test]
    fn walk_with_exclusions() {
        let vault = create_test_vault();
        let root = vault.path();
        fs::create_dir_all(root.join("templates/nested")).unwrap();
        fs::write(root.join("templates/nested/t.md"), "# T").unwrap();

        let walker = VaultWalker::with_exclusions(
            root,
            "md",
            vec![PathBuf::from("templates"), root.join("subdir")],
        )
        .unwrap();
        assert_eq!(relative(&walker.walk().unwrap()), vec!["note1.md", "note2.md"]);
    }

    #[test]
    fn missing_root() {
        let result = VaultWalker::new(Path::new("/nonexistent/path"));
        assert!(matches!(result.unwrap_err(), VaultWalkerError::MissingRoot(_)));
    }
}
