//! Link target resolution against the current record set.

use std::path::{Path, PathBuf};

use super::storage::{MultiIndexStorage, normalize_key};
use super::types::{DocumentRecord, LinkEntry, LinkSyntax, RawLink};
use crate::vault::normalize_path;
use crate::vault::walker::has_extension;

/// Resolves raw link targets to absolute document paths.
///
/// Order: explicit path (relative to the source folder for markdown links,
/// then vault-relative), then file stem (same folder first), then title or
/// alias. Unresolvable targets get the path they would have if created.
pub struct LinkResolver<'a> {
    storage: &'a MultiIndexStorage,
    vault_root: &'a Path,
    extension: &'a str,
}

impl<'a> LinkResolver<'a> {
    pub fn new(storage: &'a MultiIndexStorage, vault_root: &'a Path, extension: &'a str) -> Self {
        Self { storage, vault_root, extension }
    }

    pub fn resolve(&self, source: &Path, link: &RawLink) -> PathBuf {
        let candidates = self.path_candidates(source, link);
        if let Some(found) = candidates.iter().find(|c| self.storage.contains(c)) {
            return found.clone();
        }

        let stem = target_stem(&link.target, self.extension);
        let by_name = self.storage.by_name(stem);
        let source_dir = source.parent();
        if let Some(same_folder) = by_name.iter().find(|p| p.parent() == source_dir) {
            return same_folder.clone();
        }
        if let Some(first) = by_name.into_iter().next() {
            return first;
        }

        if let Some(first) = self.storage.by_title(&link.target).into_iter().next() {
            return first;
        }

        candidates.into_iter().next().unwrap_or_else(|| self.vault_root.join(&link.target))
    }

    /// Resolve every raw link of `source` into graph entries.
    pub fn resolve_all(&self, source: &Path, links: &[RawLink]) -> Vec<LinkEntry> {
        links
            .iter()
            .map(|link| LinkEntry {
                source: source.to_path_buf(),
                target: self.resolve(source, link),
                raw_target: link.target.clone(),
                display: link.display.clone(),
                kind: link.kind,
                syntax: link.syntax,
                line: link.line,
                column: link.column,
            })
            .collect()
    }

    fn path_candidates(&self, source: &Path, link: &RawLink) -> Vec<PathBuf> {
        let target = with_extension(&link.target, self.extension);
        let mut candidates = Vec::new();
        if link.syntax == LinkSyntax::Markdown
            && !target.starts_with('/')
            && let Some(dir) = source.parent()
        {
            candidates.push(normalize_path(&dir.join(&target)));
        }
        candidates.push(normalize_path(&self.vault_root.join(target.trim_start_matches('/'))));
        candidates
    }
}

/// Append `.extension` unless the target already has it.
pub fn with_extension(target: &str, extension: &str) -> String {
    if has_extension(Path::new(target), extension) {
        target.to_string()
    } else {
        format!("{target}.{extension}")
    }
}

/// Last path segment of a link target, without the extension.
pub fn target_stem<'t>(target: &'t str, extension: &str) -> &'t str {
    let last = target.rsplit('/').next().unwrap_or(target);
    match last.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(extension) && !stem.is_empty() => stem,
        _ => last,
    }
}

/// Whether a raw target could name `record` by stem, title or alias.
pub fn could_name(raw_target: &str, extension: &str, record: &DocumentRecord) -> bool {
    let key = normalize_key(target_stem(raw_target, extension));
    key == normalize_key(&record.name)
        || normalize_key(raw_target) == normalize_key(&record.title)
        || record.aliases.iter().any(|a| normalize_key(a) == normalize_key(raw_target))
}
