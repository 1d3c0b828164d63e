//! Index data types for vault documents and links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Structured metadata for one indexed file.
///
/// Records are replaced wholesale on every update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Path relative to the vault root, `/`-separated.
    pub relative_path: String,
    /// Folder part of `relative_path` (empty for the vault root).
    pub folder: String,
    /// File stem without extension.
    pub name: String,
    /// First level-1 heading, or the prettified file name.
    pub title: String,
    pub aliases: Vec<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// File size in bytes.
    pub size: u64,
    /// Lowercased tags with hierarchy expansion.
    pub tags: BTreeSet<String>,
    /// Tags as written.
    pub exact_tags: BTreeSet<String>,
    pub frontmatter: BTreeMap<String, Value>,
    pub headings: Vec<Heading>,
    pub list_items: usize,
    pub tasks: TaskCounts,
    /// SHA-256 hex digest of the raw content.
    pub content_hash: String,
}

impl DocumentRecord {
    /// File name including extension.
    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

/// A heading in the document outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
}

/// Whether a link references or embeds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Reference,
    Embed,
}

/// Surface syntax a link was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSyntax {
    /// `[[target]]`, `[[target|alias]]`, `![[target]]`
    Wiki,
    /// `[text](target.md)`
    Markdown,
}

/// A link as written in a document, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    /// Target text without section or alias.
    pub target: String,
    /// `#section` part, without the `#`.
    pub section: Option<String>,
    /// Alias for wikilinks, link text for markdown links.
    pub display: Option<String>,
    pub kind: LinkKind,
    pub syntax: LinkSyntax,
    /// 1-based line in the full file content.
    pub line: usize,
    /// 1-based column (in characters) in that line.
    pub column: usize,
    /// Byte range of the whole link in the full file content.
    pub start: usize,
    pub end: usize,
}

/// A resolved edge of the link graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub source: PathBuf,
    /// Resolved absolute target path. May name a file that is not indexed.
    pub target: PathBuf,
    /// Target text as written.
    pub raw_target: String,
    pub display: Option<String>,
    pub kind: LinkKind,
    pub syntax: LinkSyntax,
    pub line: usize,
    pub column: usize,
}
