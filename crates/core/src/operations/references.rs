//! Reference detection and format-preserving rewrites.
//!
//! References are found by resolving every link in a file against the index,
//! so only links that actually point at the document are touched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::OperationError;
use super::types::{LinkRewrite, PlannedChange};
use crate::index::resolver::{target_stem, with_extension};
use crate::index::storage::normalize_key;
use crate::index::{LinkKind, LinkSyntax, RawLink};
use crate::indexer::VaultIndexer;
use crate::vault::{extract_links, normalize_path, relative_path, to_slash};
use crate::vault::walker::has_extension;

/// How links to the document change.
#[derive(Debug, Clone, Copy)]
pub enum Rewrite<'a> {
    /// The document keeps its folder and gets a new stem.
    Rename { old_name: &'a str, new_name: &'a str },
    /// The document moves to `new_path`.
    Move { new_path: &'a Path },
    /// The document goes away; links become a visible marker.
    Deleted,
}

/// A single text replacement in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub original: String,
    pub updated: String,
}

/// Planned new content for one file.
#[derive(Debug, Clone)]
pub struct FileEdit {
    pub path: PathBuf,
    pub original: String,
    pub updated: String,
    pub replacements: Vec<Replacement>,
}

impl FileEdit {
    pub fn new(path: PathBuf, original: String, replacements: Vec<Replacement>) -> Self {
        let updated = apply_replacements(&original, &replacements);
        Self { path, original, updated, replacements }
    }

    pub fn planned_change(&self, path: PathBuf) -> PlannedChange {
        PlannedChange::RewriteLinks {
            path,
            rewrites: self
                .replacements
                .iter()
                .map(|r| LinkRewrite { line: r.line, before: r.original.clone(), after: r.updated.clone() })
                .collect(),
        }
    }
}

/// Apply replacements to content, last first so earlier offsets stay valid.
pub fn apply_replacements(content: &str, replacements: &[Replacement]) -> String {
    let mut sorted: Vec<_> = replacements.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = content.to_string();
    for r in sorted {
        if r.start <= r.end && r.end <= result.len() {
            result.replace_range(r.start..r.end, &r.updated);
        }
    }
    result
}

/// Plan edits for every file that links to `target`.
///
/// With `include_self`, links inside `target` pointing back at itself are
/// rewritten as well; `self_dir` is the folder the document ends up in.
pub fn plan_edits(
    indexer: &VaultIndexer,
    target: &Path,
    rewrite: Rewrite<'_>,
    include_self: bool,
    self_dir: &Path,
) -> Result<Vec<FileEdit>, OperationError> {
    let mut sources: BTreeSet<PathBuf> = indexer.get_backlinks(target).into_iter().collect();
    if include_self {
        sources.insert(target.to_path_buf());
    } else {
        sources.remove(target);
    }

    let mut edits = Vec::new();
    for source in sources {
        if !indexer.fs().exists(&source) {
            continue;
        }
        let content = indexer.fs().read_to_string(&source)?;
        let source_dir = if source == target { self_dir } else { source.parent().unwrap_or(self_dir) };
        let replacements: Vec<Replacement> =
            find_references(indexer, &source, &content, target)
                .iter()
                .filter_map(|link| {
                    let updated = rewrite.replacement(link, source_dir, indexer)?;
                    let original = content.get(link.start..link.end)?.to_string();
                    (updated != original).then_some(Replacement {
                        start: link.start,
                        end: link.end,
                        line: link.line,
                        original,
                        updated,
                    })
                })
                .collect();
        if !replacements.is_empty() {
            edits.push(FileEdit::new(source, content, replacements));
        }
    }
    Ok(edits)
}

/// Links in `content` (of file `source`) that resolve to `target`.
pub fn find_references(
    indexer: &VaultIndexer,
    source: &Path,
    content: &str,
    target: &Path,
) -> Vec<RawLink> {
    let links = extract_links(content, indexer.extension());
    let resolved = indexer.resolve_links(source, &links);
    links
        .into_iter()
        .zip(resolved)
        .filter(|(_, entry)| entry.target == target)
        .map(|(link, _)| link)
        .collect()
}

/// Relative markdown links in a moved document that must change so they
/// keep pointing at the same files from `new_dir`. Self-links are left to
/// [`plan_edits`].
pub fn relative_links_after_move(
    indexer: &VaultIndexer,
    source: &Path,
    content: &str,
    new_dir: &Path,
) -> Vec<Replacement> {
    let Some(old_dir) = source.parent() else {
        return Vec::new();
    };
    let links = extract_links(content, indexer.extension());
    let resolved = indexer.resolve_links(source, &links);
    links
        .iter()
        .zip(resolved)
        .filter(|(link, entry)| {
            link.syntax == LinkSyntax::Markdown
                && !link.target.starts_with('/')
                && entry.target != source
                && entry.target
                    == normalize_path(&old_dir.join(with_extension(&link.target, indexer.extension())))
        })
        .filter_map(|(link, entry)| {
            let mut target = to_slash(&relative_path(new_dir, &entry.target));
            if !has_extension(Path::new(&link.target), indexer.extension()) {
                target = strip_extension(&target, indexer.extension()).to_string();
            }
            let updated = render(link, &target);
            let original = content.get(link.start..link.end)?.to_string();
            (updated != original).then_some(Replacement {
                start: link.start,
                end: link.end,
                line: link.line,
                original,
                updated,
            })
        })
        .collect()
}

impl Rewrite<'_> {
    /// New text for `link`, or `None` to leave it as written.
    pub fn replacement(&self, link: &RawLink, source_dir: &Path, indexer: &VaultIndexer) -> Option<String> {
        let extension = indexer.extension();
        match *self {
            Rewrite::Rename { old_name, new_name } => {
                if normalize_key(target_stem(&link.target, extension)) != normalize_key(old_name) {
                    // Reached through a title or alias, which still resolves.
                    return None;
                }
                let target = renamed_target(&link.target, new_name, extension);
                Some(render(link, &target))
            }
            Rewrite::Move { new_path } => {
                let relative = new_path.strip_prefix(indexer.vault_root()).ok()?;
                match link.syntax {
                    LinkSyntax::Wiki if link.target.contains('/') => {
                        let mut target = to_slash(relative);
                        if !has_extension(Path::new(&link.target), extension) {
                            target = strip_extension(&target, extension).to_string();
                        }
                        Some(render(link, &target))
                    }
                    LinkSyntax::Wiki => None,
                    LinkSyntax::Markdown if link.target.starts_with('/') => {
                        Some(render(link, &format!("/{}", to_slash(relative))))
                    }
                    LinkSyntax::Markdown => {
                        Some(render(link, &to_slash(&relative_path(source_dir, new_path))))
                    }
                }
            }
            Rewrite::Deleted => Some(deleted_marker(link, extension)),
        }
    }
}

/// Replace the last path segment's stem, keeping folders and extension.
fn renamed_target(original: &str, new_name: &str, extension: &str) -> String {
    let (dir, last) = match original.rfind('/') {
        Some(pos) => original.split_at(pos + 1),
        None => ("", original),
    };
    if has_extension(Path::new(last), extension) {
        format!("{dir}{}", with_extension(new_name, extension))
    } else {
        format!("{dir}{new_name}")
    }
}

fn strip_extension<'t>(target: &'t str, extension: &str) -> &'t str {
    if has_extension(Path::new(target), extension) {
        &target[..target.len() - extension.len() - 1]
    } else {
        target
    }
}

/// Render a link with a new target, keeping kind, section and display text.
fn render(link: &RawLink, target: &str) -> String {
    let bang = if link.kind == LinkKind::Embed { "!" } else { "" };
    let section = link.section.as_deref().map(|s| format!("#{s}")).unwrap_or_default();
    match link.syntax {
        LinkSyntax::Wiki => match &link.display {
            Some(display) => format!("{bang}[[{target}{section}|{display}]]"),
            None => format!("{bang}[[{target}{section}]]"),
        },
        LinkSyntax::Markdown => {
            let display = link.display.as_deref().unwrap_or_default();
            format!("{bang}[{display}]({}{section})", target.replace(' ', "%20"))
        }
    }
}

/// `~~name~~ (deleted)`, or `(deleted embed)` for embeds.
fn deleted_marker(link: &RawLink, extension: &str) -> String {
    let label = match link.display.as_deref().map(str::trim) {
        Some(display) if !display.is_empty() => display.to_string(),
        _ => target_stem(&link.target, extension).to_string(),
    };
    match link.kind {
        LinkKind::Embed => format!("~~{label}~~ (deleted embed)"),
        LinkKind::Reference => format!("~~{label}~~ (deleted)"),
    }
}
