use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::vault::to_slash;
use crate::watcher::{WatchConfig, default_ignore_patterns};

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub operations: OperationSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub vault_root: String,
    /// Folders to exclude from indexing (relative to vault_root).
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    /// Managed file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// SQLite metadata cache location. No cache when unset.
    #[serde(default)]
    pub cache_path: Option<String>,
}

fn default_extension() -> String {
    "md".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            recursive: true,
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// Defaults for the mutation operations.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OperationSettings {
    /// Soft-deleted files go here, relative to the vault root.
    #[serde(default = "default_trash_dir")]
    pub trash_dir: String,
    /// Backups go here, relative to the vault root.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Bucket trashed files into `YYYY-MM-DD` subfolders.
    #[serde(default)]
    pub trash_by_date: bool,
    #[serde(default = "default_true")]
    pub update_links: bool,
    #[serde(default)]
    pub create_backup: bool,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            trash_dir: default_trash_dir(),
            backup_dir: default_backup_dir(),
            trash_by_date: false,
            update_links: true,
            create_backup: false,
        }
    }
}

fn default_trash_dir() -> String {
    ".trash".to_string()
}

fn default_backup_dir() -> String {
    ".backups".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub active_profile: String,
    pub vault_root: PathBuf,
    /// Folders to exclude from indexing, as configured.
    pub excluded_folders: Vec<PathBuf>,
    pub extension: String,
    pub cache_path: Option<PathBuf>,
    pub watch: WatchSettings,
    pub operations: OperationSettings,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    /// Watcher settings for the vault root.
    ///
    /// Excluded, trash and backup folders are added to the ignore patterns.
    pub fn watch_config(&self) -> WatchConfig {
        let mut patterns = self.watch.ignore_patterns.clone();
        for folder in self.skipped_folders() {
            let pattern = format!("{}/**", globset::escape(&to_slash(&folder)));
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        WatchConfig::new(&self.vault_root)
            .with_extension(&self.extension)
            .with_debounce(Duration::from_millis(self.watch.debounce_ms))
            .with_recursive(self.watch.recursive)
            .with_ignore_patterns(patterns)
    }

    /// Folders never indexed, relative to the vault root.
    pub fn skipped_folders(&self) -> Vec<PathBuf> {
        self.excluded_folders
            .iter()
            .map(|p| p.strip_prefix(&self.vault_root).map(Path::to_path_buf).unwrap_or_else(|_| p.clone()))
            .chain([
                PathBuf::from(&self.operations.trash_dir),
                PathBuf::from(&self.operations.backup_dir),
            ])
            .map(|p| PathBuf::from(to_slash(&p)))
            .filter(|p| !p.as_os_str().is_empty())
            .collect()
    }
}
