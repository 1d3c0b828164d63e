//! In-memory record set with derived lookup indices and the link graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use super::types::{DocumentRecord, LinkEntry};
use crate::frontmatter::value_strings;

/// Normalize a title, alias or basename for lookup.
pub fn normalize_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Component-wise prefix tree over vault-relative paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PathTrie {
    children: BTreeMap<String, PathTrie>,
    documents: BTreeSet<PathBuf>,
}

impl PathTrie {
    fn insert(&mut self, relative: &str, path: &Path) {
        let mut node = self;
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.documents.insert(path.to_path_buf());
    }

    fn remove(&mut self, relative: &str, path: &Path) {
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        self.remove_at(&segments, path);
    }

    /// Returns true when this node became empty.
    fn remove_at(&mut self, segments: &[&str], path: &Path) -> bool {
        match segments.split_first() {
            None => {
                self.documents.remove(path);
            }
            Some((head, rest)) => {
                if let Some(child) = self.children.get_mut(*head)
                    && child.remove_at(rest, path)
                {
                    self.children.remove(*head);
                }
            }
        }
        self.documents.is_empty() && self.children.is_empty()
    }

    fn collect_under(&self, prefix: &str) -> BTreeSet<PathBuf> {
        let mut node = self;
        for segment in prefix.split('/').filter(|s| !s.is_empty()) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return BTreeSet::new(),
            }
        }
        let mut out = BTreeSet::new();
        node.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut BTreeSet<PathBuf>) {
        out.extend(self.documents.iter().cloned());
        for child in self.children.values() {
            child.collect_into(out);
        }
    }
}

type PathIndex<K> = HashMap<K, BTreeSet<PathBuf>>;

fn index_insert<K: Eq + Hash>(index: &mut PathIndex<K>, key: K, path: &Path) {
    index.entry(key).or_default().insert(path.to_path_buf());
}

fn index_remove<K: Eq + Hash>(index: &mut PathIndex<K>, key: &K, path: &Path) {
    if let Some(set) = index.get_mut(key) {
        set.remove(path);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

fn index_get<K: Eq + Hash>(index: &PathIndex<K>, key: &K) -> Vec<PathBuf> {
    index.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

/// The canonical document set plus every derived index.
///
/// Each secondary index membership is derived from the current records only:
/// replacing a record removes its old memberships before adding the new ones.
/// `backlinks` is kept as the exact inverse of `outgoing`.
#[derive(Debug, Default)]
pub struct MultiIndexStorage {
    documents: HashMap<PathBuf, DocumentRecord>,
    by_tag: PathIndex<String>,
    by_exact_tag: PathIndex<String>,
    by_title: PathIndex<String>,
    by_name: PathIndex<String>,
    by_property: PathIndex<(String, String)>,
    by_key: PathIndex<String>,
    prefix: PathTrie,
    outgoing: HashMap<PathBuf, Vec<LinkEntry>>,
    backlinks: PathIndex<PathBuf>,
    revision: u64,
}

impl MultiIndexStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record at `record.path`.
    pub fn add_document(&mut self, record: DocumentRecord) {
        if let Some(old) = self.documents.remove(&record.path) {
            self.unindex(&old);
        }
        self.index(&record);
        self.documents.insert(record.path.clone(), record);
        self.revision += 1;
    }

    /// Remove the record at `path` along with its outgoing links.
    ///
    /// Links from other documents that still name `path` are left alone, so
    /// `get_backlinks(path)` keeps reporting them.
    pub fn remove_document(&mut self, path: &Path) -> Option<DocumentRecord> {
        let old = self.documents.remove(path)?;
        self.unindex(&old);
        self.drop_outgoing(path);
        self.revision += 1;
        Some(old)
    }

    /// Replace the outgoing links of `source`, keeping backlinks in sync.
    pub fn update_links(&mut self, source: &Path, links: Vec<LinkEntry>) {
        self.drop_outgoing(source);
        for link in &links {
            index_insert(&mut self.backlinks, link.target.clone(), source);
        }
        if !links.is_empty() {
            self.outgoing.insert(source.to_path_buf(), links);
        }
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        let revision = self.revision;
        *self = Self::default();
        self.revision = revision + 1;
    }

    fn drop_outgoing(&mut self, source: &Path) {
        if let Some(old_links) = self.outgoing.remove(source) {
            for link in old_links {
                index_remove(&mut self.backlinks, &link.target, source);
            }
        }
    }

    fn index(&mut self, record: &DocumentRecord) {
        let path = record.path.as_path();
        for tag in &record.tags {
            index_insert(&mut self.by_tag, tag.clone(), path);
        }
        for tag in &record.exact_tags {
            index_insert(&mut self.by_exact_tag, tag.clone(), path);
        }
        for key in title_keys(record) {
            index_insert(&mut self.by_title, key, path);
        }
        index_insert(&mut self.by_name, normalize_key(&record.name), path);
        for (key, value) in &record.frontmatter {
            index_insert(&mut self.by_key, key.clone(), path);
            for v in value_strings(value) {
                index_insert(&mut self.by_property, (key.clone(), normalize_key(&v)), path);
            }
        }
        self.prefix.insert(&record.relative_path, path);
    }

    fn unindex(&mut self, record: &DocumentRecord) {
        let path = record.path.as_path();
        for tag in &record.tags {
            index_remove(&mut self.by_tag, tag, path);
        }
        for tag in &record.exact_tags {
            index_remove(&mut self.by_exact_tag, tag, path);
        }
        for key in title_keys(record) {
            index_remove(&mut self.by_title, &key, path);
        }
        index_remove(&mut self.by_name, &normalize_key(&record.name), path);
        for (key, value) in &record.frontmatter {
            index_remove(&mut self.by_key, key, path);
            for v in value_strings(value) {
                index_remove(&mut self.by_property, &(key.clone(), normalize_key(&v)), path);
            }
        }
        self.prefix.remove(&record.relative_path, path);
    }

    pub fn get(&self, path: &Path) -> Option<&DocumentRecord> {
        self.documents.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All records, sorted by relative path.
    pub fn all_documents(&self) -> Vec<&DocumentRecord> {
        let mut docs: Vec<_> = self.documents.values().collect();
        docs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        docs
    }

    /// Documents carrying `tag` (normalized, hierarchy-aware).
    pub fn by_tag(&self, tag: &str) -> Vec<PathBuf> {
        index_get(&self.by_tag, &normalize_key(tag.trim().trim_start_matches('#')))
    }

    /// Documents carrying `tag` exactly as written.
    pub fn by_exact_tag(&self, tag: &str) -> Vec<PathBuf> {
        index_get(&self.by_exact_tag, &tag.trim().to_string())
    }

    /// Documents whose title or one of whose aliases equals `title`
    /// (case-insensitive).
    pub fn by_title(&self, title: &str) -> Vec<PathBuf> {
        index_get(&self.by_title, &normalize_key(title))
    }

    /// Documents whose file stem equals `name` (case-insensitive).
    pub fn by_name(&self, name: &str) -> Vec<PathBuf> {
        index_get(&self.by_name, &normalize_key(name))
    }

    /// Documents under the folder `prefix` (component-wise).
    pub fn by_path_prefix(&self, prefix: &str) -> Vec<PathBuf> {
        self.prefix.collect_under(prefix).into_iter().collect()
    }

    /// Documents whose frontmatter `key` equals or contains `value`
    /// (case-insensitive).
    pub fn by_property(&self, key: &str, value: &str) -> Vec<PathBuf> {
        index_get(&self.by_property, &(key.to_string(), normalize_key(value)))
    }

    /// Documents with a frontmatter `key`, whatever its value.
    pub fn by_property_key(&self, key: &str) -> Vec<PathBuf> {
        index_get(&self.by_key, &key.to_string())
    }

    pub fn get_outgoing_links(&self, source: &Path) -> &[LinkEntry] {
        self.outgoing.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sources linking to `target`, sorted.
    pub fn get_backlinks(&self, target: &Path) -> Vec<PathBuf> {
        index_get(&self.backlinks, &target.to_path_buf())
    }

    /// Sources with at least one link to a path that is not indexed.
    pub fn dangling_sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<_> = self
            .outgoing
            .iter()
            .filter(|(_, links)| links.iter().any(|l| !self.documents.contains_key(&l.target)))
            .map(|(source, _)| source.clone())
            .collect();
        sources.sort();
        sources
    }

    /// Rebuild every index from the records and links and report differences.
    ///
    /// An empty result means the storage is internally consistent.
    pub fn verify_consistency(&self) -> Vec<String> {
        let mut fresh = Self::default();
        for record in self.documents.values() {
            fresh.add_document(record.clone());
        }
        for (source, links) in &self.outgoing {
            fresh.update_links(source, links.clone());
        }

        let mut problems = Vec::new();
        let mut check = |name: &str, same: bool| {
            if !same {
                problems.push(format!("{name} index differs from a rebuild"));
            }
        };
        check("tag", fresh.by_tag == self.by_tag);
        check("exact tag", fresh.by_exact_tag == self.by_exact_tag);
        check("title", fresh.by_title == self.by_title);
        check("name", fresh.by_name == self.by_name);
        check("property", fresh.by_property == self.by_property);
        check("property key", fresh.by_key == self.by_key);
        check("path prefix", fresh.prefix == self.prefix);
        check("backlink", fresh.backlinks == self.backlinks);

        for (source, links) in &self.outgoing {
            if !self.documents.contains_key(source) {
                problems.push(format!("outgoing links for unindexed {}", source.display()));
            }
            if links.is_empty() {
                problems.push(format!("empty outgoing entry for {}", source.display()));
            }
        }
        problems
    }
}

fn title_keys(record: &DocumentRecord) -> BTreeSet<String> {
    std::iter::once(&record.title)
        .chain(record.aliases.iter())
        .map(|t| normalize_key(t))
        .filter(|t| !t.is_empty())
        .collect()
}
