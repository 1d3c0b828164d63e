//! Watcher configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Patterns ignored unless the configuration replaces them.
///
/// Matched against paths relative to the watched root.
pub fn default_ignore_patterns() -> Vec<String> {
    [
        "**/.*",
        "**/.*/**",
        "**/*~",
        "**/*.tmp",
        "**/*.temp",
        "**/*.swp",
        "**/*.swo",
        "**/*.bak",
        "**/.trash/**",
        "**/.backups/**",
        "**/node_modules/**",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Root directories to observe.
    pub roots: Vec<PathBuf>,
    /// Managed file extension, without the dot.
    pub extension: String,
    pub ignore_patterns: Vec<String>,
    pub debounce: Duration,
    /// When false, only direct children of each root are reported.
    pub recursive: bool,
}

impl WatchConfig {
    /// Watch `root` recursively for `.md` files with the default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            extension: "md".to_string(),
            ignore_patterns: default_ignore_patterns(),
            debounce: DEFAULT_DEBOUNCE,
            recursive: true,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }
}
