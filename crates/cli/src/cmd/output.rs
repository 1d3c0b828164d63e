//! Shared output formatting.

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use vaultindex_core::OperationPreview;
use vaultindex_core::VaultIndexer;
use vaultindex_core::index::{DocumentRecord, LinkEntry, LinkKind};

use super::display_path;

/// Formatted document for JSON output.
#[derive(Debug, Serialize)]
pub struct DocumentOutput {
    pub path: String,
    pub title: String,
    pub tags: Vec<String>,
    pub modified: String,
    pub size: u64,
}

impl From<&DocumentRecord> for DocumentOutput {
    fn from(doc: &DocumentRecord) -> Self {
        Self {
            path: doc.relative_path.clone(),
            title: doc.title.clone(),
            tags: doc.exact_tags.iter().cloned().collect(),
            modified: doc.modified.format("%Y-%m-%d %H:%M").to_string(),
            size: doc.size,
        }
    }
}

#[derive(Tabled)]
struct DocumentRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

/// Formatted link for JSON output.
#[derive(Debug, Serialize)]
pub struct LinkOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<LinkKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Whether the target is an indexed document.
    pub resolved: bool,
}

impl LinkOutput {
    pub fn outgoing(indexer: &VaultIndexer, link: &LinkEntry) -> Self {
        Self {
            source: None,
            target: Some(display_path(indexer, &link.target)),
            raw_target: Some(link.raw_target.clone()),
            kind: Some(link.kind),
            line: Some(link.line),
            resolved: indexer.get_document(&link.target).is_some(),
        }
    }

    pub fn backlink(source: String) -> Self {
        Self { source: Some(source), target: None, raw_target: None, kind: None, line: None, resolved: true }
    }
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Line")]
    line: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "Target")]
    target: String,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => super::fail(format!("serializing output: {e}")),
    }
}

pub fn print_documents_table(docs: &[DocumentRecord]) {
    if docs.is_empty() {
        println!("(no documents found)");
        return;
    }
    let rows: Vec<DocumentRow> = docs
        .iter()
        .map(|doc| DocumentRow {
            path: doc.relative_path.clone(),
            title: doc.title.clone(),
            tags: doc.exact_tags.iter().cloned().collect::<Vec<_>>().join(", "),
            modified: doc.modified.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!("{} document(s)", docs.len());
}

pub fn print_documents_json(docs: &[DocumentRecord]) {
    let outputs: Vec<DocumentOutput> = docs.iter().map(DocumentOutput::from).collect();
    print_json(&outputs);
}

pub fn print_documents_quiet(docs: &[DocumentRecord]) {
    for doc in docs {
        println!("{}", doc.relative_path);
    }
}

pub fn print_links_table(indexer: &VaultIndexer, links: &[LinkEntry]) {
    println!("Outgoing links ({}):", links.len());
    if links.is_empty() {
        println!("  (none)");
        return;
    }
    let rows: Vec<LinkRow> = links
        .iter()
        .map(|link| {
            let mut target = display_path(indexer, &link.target);
            if indexer.get_document(&link.target).is_none() {
                target.push_str(" (unresolved)");
            }
            let link_text = match link.kind {
                LinkKind::Embed => format!("!{}", link.raw_target),
                LinkKind::Reference => link.raw_target.clone(),
            };
            LinkRow { line: link.line.to_string(), link: link_text, target }
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_backlinks(sources: &[String]) {
    println!("Backlinks ({}):", sources.len());
    if sources.is_empty() {
        println!("  (none)");
    }
    for source in sources {
        println!("  {source}");
    }
}

pub fn print_preview(indexer: &VaultIndexer, preview: &OperationPreview) {
    let source = display_path(indexer, &preview.source);
    match &preview.target {
        Some(target) if *target != preview.source => {
            println!("{}: {} -> {}", preview.kind, source, display_path(indexer, target));
        }
        _ => println!("{}: {}", preview.kind, source),
    }
    println!();
    if preview.changes.is_empty() {
        println!("No changes.");
    }
    for change in &preview.changes {
        println!("  {change}");
    }
    println!();
    println!("(dry-run mode - no changes made)");
}
