//! Filesystem access used by the indexer and the mutation operations.
//!
//! [`OsFs`] talks to the real filesystem, [`MemoryFs`] keeps everything in
//! memory and is meant for tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::walker::{VaultWalker, VaultWalkerError, has_extension, is_skipped_name};

#[derive(Debug, Error)]
pub enum VaultFsError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Walk(#[from] VaultWalkerError),
}

impl VaultFsError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io { path: path.to_path_buf(), source }
        }
    }
}

/// Size and timestamps of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Falls back to `modified` where the platform has no birth time.
    pub created: DateTime<Utc>,
}

/// Blocking filesystem operations over absolute paths.
pub trait VaultFs: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, VaultFsError>;
    /// Write a file, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> Result<(), VaultFsError>;
    /// Move a file. Fails if the destination exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), VaultFsError>;
    fn copy(&self, from: &Path, to: &Path) -> Result<(), VaultFsError>;
    fn remove_file(&self, path: &Path) -> Result<(), VaultFsError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), VaultFsError>;
    fn exists(&self, path: &Path) -> bool;
    fn stats(&self, path: &Path) -> Result<FileStats, VaultFsError>;
    /// All files under `root` with `extension`, skipping hidden entries and
    /// `excluded` folders (relative to `root`). Sorted.
    fn list_files(
        &self,
        root: &Path,
        extension: &str,
        excluded: &[PathBuf],
    ) -> Result<Vec<PathBuf>, VaultFsError>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl VaultFs for OsFs {
    fn read_to_string(&self, path: &Path) -> Result<String, VaultFsError> {
        std::fs::read_to_string(path).map_err(|e| VaultFsError::io(path, e))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), VaultFsError> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        std::fs::write(path, contents).map_err(|e| VaultFsError::io(path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), VaultFsError> {
        if to.exists() {
            return Err(VaultFsError::AlreadyExists(to.to_path_buf()));
        }
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent)?;
        }
        std::fs::rename(from, to).map_err(|e| VaultFsError::io(from, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), VaultFsError> {
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent)?;
        }
        std::fs::copy(from, to).map(|_| ()).map_err(|e| VaultFsError::io(from, e))
    }

    fn remove_file(&self, path: &Path) -> Result<(), VaultFsError> {
        std::fs::remove_file(path).map_err(|e| VaultFsError::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), VaultFsError> {
        std::fs::create_dir_all(path).map_err(|e| VaultFsError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn stats(&self, path: &Path) -> Result<FileStats, VaultFsError> {
        let metadata = std::fs::metadata(path).map_err(|e| VaultFsError::io(path, e))?;
        if !metadata.is_file() {
            return Err(VaultFsError::NotFound(path.to_path_buf()));
        }
        let modified: DateTime<Utc> =
            metadata.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
        let created = metadata.created().map(DateTime::from).unwrap_or(modified);
        Ok(FileStats { size: metadata.len(), modified, created })
    }

    fn list_files(
        &self,
        root: &Path,
        extension: &str,
        excluded: &[PathBuf],
    ) -> Result<Vec<PathBuf>, VaultFsError> {
        let walker = VaultWalker::with_exclusions(root, extension, excluded.to_vec())?;
        Ok(walker.walk()?.into_iter().map(|f| root.join(f.relative_path)).collect())
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

/// An in-memory filesystem.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, MemoryFile>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, builder style.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        let path = path.into();
        let now = Utc::now();
        self.files
            .lock()
            .insert(path, MemoryFile { contents: contents.to_string(), created: now, modified: now });
        self
    }

    /// Every file path currently stored.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }
}

impl VaultFs for MemoryFs {
    fn read_to_string(&self, path: &Path) -> Result<String, VaultFsError> {
        self.files
            .lock()
            .get(path)
            .map(|f| f.contents.clone())
            .ok_or_else(|| VaultFsError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), VaultFsError> {
        let now = Utc::now();
        let mut files = self.files.lock();
        let created = files.get(path).map_or(now, |f| f.created);
        files.insert(
            path.to_path_buf(),
            MemoryFile { contents: contents.to_string(), created, modified: now },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), VaultFsError> {
        let mut files = self.files.lock();
        if files.contains_key(to) {
            return Err(VaultFsError::AlreadyExists(to.to_path_buf()));
        }
        let file = files.remove(from).ok_or_else(|| VaultFsError::NotFound(from.to_path_buf()))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), VaultFsError> {
        let mut files = self.files.lock();
        let mut file =
            files.get(from).cloned().ok_or_else(|| VaultFsError::NotFound(from.to_path_buf()))?;
        file.created = Utc::now();
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), VaultFsError> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| VaultFsError::NotFound(path.to_path_buf()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), VaultFsError> {
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().keys().any(|f| f.starts_with(path))
            || self.dirs.lock().iter().any(|d| d.starts_with(path))
    }

    fn stats(&self, path: &Path) -> Result<FileStats, VaultFsError> {
        self.files
            .lock()
            .get(path)
            .map(|f| FileStats {
                size: f.contents.len() as u64,
                modified: f.modified,
                created: f.created,
            })
            .ok_or_else(|| VaultFsError::NotFound(path.to_path_buf()))
    }

    fn list_files(
        &self,
        root: &Path,
        extension: &str,
        excluded: &[PathBuf],
    ) -> Result<Vec<PathBuf>, VaultFsError> {
        let files = self.files.lock();
        Ok(files
            .keys()
            .filter(|path| has_extension(path, extension))
            .filter(|path| {
                let Ok(relative) = path.strip_prefix(root) else {
                    return false;
                };
                let skipped = relative
                    .components()
                    .any(|c| is_skipped_name(&c.as_os_str().to_string_lossy()));
                !skipped && !excluded.iter().any(|e| relative.starts_with(e))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_fs_roundtrip() {
        let fs = MemoryFs::new();
        let path = Path::new("/vault/a.md");
        fs.write(path, "hello").unwrap();
        assert_eq!(fs.read_to_string(path).unwrap(), "hello");
        assert_eq!(fs.stats(path).unwrap().size, 5);
    }

    #[test]
    fn memory_fs_rename_refuses_overwrite() {
        let fs = MemoryFs::new().with_file("/v/a.md", "a").with_file("/v/b.md", "b");
        let err = fs.rename(Path::new("/v/a.md"), Path::new("/v/b.md")).unwrap_err();
        assert!(matches!(err, VaultFsError::AlreadyExists(_)));
    }

    #[test]
    fn memory_fs_lists_visible_files() {
        let fs = MemoryFs::new()
            .with_file("/v/a.md", "")
            .with_file("/v/sub/b.MD", "")
            .with_file("/v/.trash/c.md", "")
            .with_file("/v/skip/d.md", "")
            .with_file("/v/e.txt", "");
        let files = fs.list_files(Path::new("/v"), "md", &[PathBuf::from("skip")]).unwrap();
        assert_eq!(files, vec![PathBuf::from("/v/a.md"), PathBuf::from("/v/sub/b.MD")]);
    }

    #[test]
    fn memory_fs_missing_file() {
        let fs = MemoryFs::new();
        assert!(matches!(
            fs.read_to_string(Path::new("/nope.md")),
            Err(VaultFsError::NotFound(_))
        ));
    }

    #[test]
    fn os_fs_rename_creates_parent() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.md");
        let to = dir.path().join("nested/deeper/a.md");
        OsFs.write(&from, "content").unwrap();
        OsFs.rename(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(OsFs.read_to_string(&to).unwrap(), "content");
    }

    #[test]
    fn os_fs_missing_file_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let err = OsFs.stats(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, VaultFsError::NotFound(_)));
    }
}
