//! Path filtering by extension, ignore globs and depth.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use super::WatchError;
use crate::vault::walker::has_extension;

#[derive(Debug)]
pub struct PathFilter {
    roots: Vec<PathBuf>,
    extension: String,
    ignore: GlobSet,
    recursive: bool,
}

impl PathFilter {
    pub fn new(
        roots: Vec<PathBuf>,
        extension: &str,
        patterns: &[String],
        recursive: bool,
    ) -> Result<Self, WatchError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|source| WatchError::InvalidPattern { pattern: pattern.clone(), source })?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|source| WatchError::InvalidPattern { pattern: patterns.join(", "), source })?;
        Ok(Self { roots, extension: extension.to_string(), ignore, recursive })
    }

    /// Whether events for `path` should be reported.
    pub fn accepts(&self, path: &Path) -> bool {
        if !has_extension(path, &self.extension) {
            return false;
        }
        let Some(relative) = self.roots.iter().find_map(|root| path.strip_prefix(root).ok())
        else {
            return false;
        };
        if !self.recursive && relative.components().count() > 1 {
            return false;
        }
        !self.ignore.is_match(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::config::default_ignore_patterns;
    use rstest::rstest;

    fn filter(recursive: bool) -> PathFilter {
        PathFilter::new(vec![PathBuf::from("/v")], "md", &default_ignore_patterns(), recursive)
            .unwrap()
    }

    #[rstest]
    #[case("/v/note.md", true)]
    #[case("/v/deep/dir/note.md", true)]
    #[case("/v/Note.MD", true)]
    #[case("/v/note.txt", false)]
    #[case("/v/.hidden.md", false)]
    #[case("/v/.obsidian/cfg.md", false)]
    #[case("/v/.trash/old.md", false)]
    #[case("/v/node_modules/pkg/readme.md", false)]
    #[case("/v/note.md.swp", false)]
    #[case("/elsewhere/note.md", false)]
    fn recursive_filter(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(filter(true).accepts(Path::new(path)), expected);
    }

    #[test]
    fn non_recursive_skips_nested_paths() {
        let filter = filter(false);
        assert!(filter.accepts(Path::new("/v/top.md")));
        assert!(!filter.accepts(Path::new("/v/sub/nested.md")));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = PathFilter::new(vec![], "md", &["[".to_string()], true).unwrap_err();
        assert!(matches!(err, WatchError::InvalidPattern { .. }));
    }
}
