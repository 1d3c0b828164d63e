//! The vault indexer: wires extraction, storage, link resolution and the
//! watcher together.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Weak};
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::index::filter::{self, FilterCollection, FilterError};
use crate::index::query::{self, Query, QueryError};
use crate::index::resolver::{LinkResolver, could_name};
use crate::index::{
    CacheError, CachedDocument, DocumentRecord, LinkEntry, MetadataCache, MultiIndexStorage,
    RawLink, SqliteCache,
};
use crate::operations::OperationResult;
use crate::vault::walker::{has_extension, is_skipped_name};
use crate::vault::{OsFs, VaultFs, VaultFsError, extract, extract_links, is_within, normalize_path};
use crate::watcher::{ChangeEvent, ChangeKind, FileWatcher, ListenerError, WatchConfig, WatchError};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("vault root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("path is outside the vault: {0}")]
    OutsideVault(PathBuf),

    #[error(transparent)]
    Fs(#[from] VaultFsError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    #[error("filter failed: {0}")]
    Filter(#[from] FilterError),

    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),
}

/// Statistics from a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files_found: usize,
    pub documents_indexed: usize,
    /// Files that could not be read.
    pub documents_skipped: usize,
    pub cache_hits: usize,
    pub links_indexed: usize,
    /// Links whose target is not an indexed document.
    pub unresolved_links: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPhase {
    Scanning,
    Extracting,
    Linking,
    Done,
}

/// A snapshot of initialization progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub current: usize,
    pub total: usize,
    /// Relative path of the file being processed.
    pub path: Option<String>,
}

/// What `update_file` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Indexed,
    Removed,
}

/// Live index over one vault.
///
/// Reads go through a `RwLock` on the storage; every mutation is serialized
/// by `update_lock`.
pub struct VaultIndexer {
    vault_root: PathBuf,
    canonical_root: PathBuf,
    extension: String,
    excluded: Vec<PathBuf>,
    fs: Arc<dyn VaultFs>,
    cache: Option<Arc<dyn MetadataCache>>,
    storage: RwLock<MultiIndexStorage>,
    update_lock: Mutex<()>,
    watch_config: WatchConfig,
    watcher: Mutex<Option<FileWatcher>>,
}

impl VaultIndexer {
    pub fn new(vault_root: impl Into<PathBuf>, fs: Arc<dyn VaultFs>) -> Self {
        let vault_root = normalize_path(&vault_root.into());
        let canonical_root = vault_root.canonicalize().unwrap_or_else(|_| vault_root.clone());
        Self {
            watch_config: WatchConfig::new(&vault_root),
            vault_root,
            canonical_root,
            extension: "md".to_string(),
            excluded: Vec::new(),
            fs,
            cache: None,
            storage: RwLock::new(MultiIndexStorage::new()),
            update_lock: Mutex::new(()),
            watcher: Mutex::new(None),
        }
    }

    /// Build an indexer over the real filesystem from resolved configuration.
    ///
    /// The trash and backup folders are excluded from indexing.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, IndexerError> {
        let mut indexer = Self::new(&config.vault_root, Arc::new(OsFs))
            .with_extension(&config.extension)
            .with_excluded(config.skipped_folders())
            .with_watch_config(config.watch_config());
        if let Some(path) = &config.cache_path {
            indexer = indexer.with_cache(Arc::new(SqliteCache::open(path)?));
        }
        Ok(indexer)
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self.watch_config.extension = self.extension.clone();
        self
    }

    /// Folders to skip, relative to the vault root or absolute inside it.
    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded
            .into_iter()
            .map(|p| match p.strip_prefix(&self.vault_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => p,
            })
            .collect();
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_watch_config(mut self, config: WatchConfig) -> Self {
        self.watch_config = config;
        self
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn fs(&self) -> &dyn VaultFs {
        self.fs.as_ref()
    }

    /// Map a vault-relative or absolute path onto the absolute path records
    /// are keyed by.
    pub fn resolve_path(&self, path: &Path) -> Result<PathBuf, IndexerError> {
        let absolute = if path.is_absolute() {
            match path.strip_prefix(&self.canonical_root) {
                Ok(relative) if !path.starts_with(&self.vault_root) => {
                    self.vault_root.join(relative)
                }
                _ => path.to_path_buf(),
            }
        } else {
            self.vault_root.join(path)
        };
        let absolute = normalize_path(&absolute);
        if is_within(&self.vault_root, &absolute) {
            Ok(absolute)
        } else {
            Err(IndexerError::OutsideVault(path.to_path_buf()))
        }
    }

    /// Full scan: index every file and resolve the link graph.
    pub fn initialize(&self) -> Result<IndexStats, IndexerError> {
        self.initialize_with_progress(None)
    }

    /// [`initialize`](Self::initialize), publishing progress snapshots.
    pub fn initialize_with_progress(
        &self,
        progress: Option<&Sender<IndexProgress>>,
    ) -> Result<IndexStats, IndexerError> {
        let start = Instant::now();
        let publish = |phase, current, total, path: Option<String>| {
            if let Some(tx) = progress {
                // Nobody listening is fine.
                let _ = tx.send(IndexProgress { phase, current, total, path });
            }
        };

        let _guard = self.update_lock.lock();
        if !self.fs.exists(&self.vault_root) {
            return Err(IndexerError::MissingRoot(self.vault_root.clone()));
        }

        publish(IndexPhase::Scanning, 0, 0, None);
        let files = self.fs.list_files(&self.vault_root, &self.extension, &self.excluded)?;
        let total = files.len();
        let mut stats = IndexStats { files_found: total, ..IndexStats::default() };
        info!("indexing {} files under {}", total, self.vault_root.display());

        let mut loaded = Vec::with_capacity(total);
        for (i, path) in files.iter().enumerate() {
            publish(IndexPhase::Extracting, i + 1, total, Some(self.relative(path)));
            match self.load(path) {
                Ok((document, hit)) => {
                    stats.cache_hits += usize::from(hit);
                    loaded.push(document);
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", path.display(), e);
                    stats.documents_skipped += 1;
                }
            }
        }

        let mut storage = self.storage.write();
        storage.clear();
        for document in &loaded {
            storage.add_document(document.record.clone());
        }
        stats.documents_indexed = loaded.len();

        let resolver = LinkResolver::new(&storage, &self.vault_root, &self.extension);
        let graph: Vec<(PathBuf, Vec<LinkEntry>)> = loaded
            .iter()
            .enumerate()
            .map(|(i, document)| {
                publish(IndexPhase::Linking, i + 1, total, Some(document.record.relative_path.clone()));
                let source = &document.record.path;
                (source.clone(), resolver.resolve_all(source, &document.links))
            })
            .collect();
        for (source, links) in graph {
            stats.links_indexed += links.len();
            stats.unresolved_links += links.iter().filter(|l| !storage.contains(&l.target)).count();
            storage.update_links(&source, links);
        }
        drop(storage);

        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        publish(IndexPhase::Done, total, total, None);
        info!(
            "indexed {} documents ({} skipped, {} links, {} unresolved) in {} ms",
            stats.documents_indexed,
            stats.documents_skipped,
            stats.links_indexed,
            stats.unresolved_links,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Re-extract one file and refresh its links. A missing file is removed.
    pub fn update_file(&self, path: &Path) -> Result<UpdateOutcome, IndexerError> {
        let path = self.resolve_path(path)?;
        let _guard = self.update_lock.lock();
        self.update_locked(&path)
    }

    /// Drop one file from the index. Returns whether it was indexed.
    pub fn remove_file(&self, path: &Path) -> Result<bool, IndexerError> {
        let path = self.resolve_path(path)?;
        let _guard = self.update_lock.lock();
        Ok(self.remove_locked(&path))
    }

    /// Apply a watcher event.
    pub fn handle_change(&self, event: &ChangeEvent) -> Result<(), IndexerError> {
        match event.kind {
            ChangeKind::Deleted => {
                self.remove_file(&event.path)?;
            }
            ChangeKind::Created | ChangeKind::Modified => {
                self.update_file(&event.path)?;
            }
        }
        Ok(())
    }

    /// Whether a full scan would pick up `path`.
    fn is_indexable(&self, path: &Path) -> bool {
        if !has_extension(path, &self.extension) {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.vault_root) else {
            return false;
        };
        let skipped =
            relative.components().any(|c| is_skipped_name(&c.as_os_str().to_string_lossy()));
        !skipped && !self.excluded.iter().any(|e| relative.starts_with(e))
    }

    fn update_locked(&self, path: &Path) -> Result<UpdateOutcome, IndexerError> {
        if !self.is_indexable(path) {
            if self.remove_locked(path) {
                debug!("{} is no longer indexable", path.display());
            }
            return Ok(UpdateOutcome::Removed);
        }
        if !self.fs.exists(path) {
            self.remove_locked(path);
            return Ok(UpdateOutcome::Removed);
        }
        let document = match self.load(path) {
            Ok((document, _)) => document,
            Err(IndexerError::Fs(VaultFsError::NotFound(_))) => {
                self.remove_locked(path);
                return Ok(UpdateOutcome::Removed);
            }
            Err(e) => return Err(e),
        };

        let mut storage = self.storage.write();
        let renamed = storage.get(path).is_none_or(|old| {
            old.name != document.record.name
                || old.title != document.record.title
                || old.aliases != document.record.aliases
        });
        let record = document.record;
        storage.add_document(record.clone());
        let links =
            LinkResolver::new(&storage, &self.vault_root, &self.extension).resolve_all(path, &document.links);
        storage.update_links(path, links);

        if renamed {
            let sources: Vec<PathBuf> = storage
                .dangling_sources()
                .into_iter()
                .filter(|source| source != path)
                .filter(|source| {
                    storage.get_outgoing_links(source).iter().any(|l| {
                        !storage.contains(&l.target) && could_name(&l.raw_target, &self.extension, &record)
                    })
                })
                .collect();
            for source in sources {
                self.reresolve(&mut storage, &source);
            }
        }
        debug!("indexed {}", record.relative_path);
        Ok(UpdateOutcome::Indexed)
    }

    fn remove_locked(&self, path: &Path) -> bool {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.delete(path)
        {
            warn!("failed to drop cache entry for {}: {}", path.display(), e);
        }
        let removed = self.storage.write().remove_document(path).is_some();
        if removed {
            debug!("removed {}", path.display());
        }
        removed
    }

    /// Re-resolve the links of documents pointing at paths that are not
    /// indexed. Returns how many sources were re-resolved.
    pub fn refresh_dangling(&self) -> usize {
        let _guard = self.update_lock.lock();
        let mut storage = self.storage.write();
        let sources = storage.dangling_sources();
        for source in &sources {
            self.reresolve(&mut storage, source);
        }
        sources.len()
    }

    fn reresolve(&self, storage: &mut MultiIndexStorage, source: &Path) {
        let resolver = LinkResolver::new(storage, &self.vault_root, &self.extension);
        let links: Vec<LinkEntry> = storage
            .get_outgoing_links(source)
            .iter()
            .map(|entry| LinkEntry { target: resolver.resolve(source, &raw_link(entry)), ..entry.clone() })
            .collect();
        storage.update_links(source, links);
    }

    /// Read a file through the cache, returning whether the cache was hit.
    fn load(&self, path: &Path) -> Result<(CachedDocument, bool), IndexerError> {
        let stats = self.fs.stats(path)?;
        if let Some(cache) = &self.cache {
            match cache.is_valid(path, &stats).and_then(|valid| {
                if valid { cache.get(path) } else { Ok(None) }
            }) {
                Ok(Some(hit)) => return Ok((hit, true)),
                Ok(None) => {}
                Err(e) => warn!("cache lookup failed for {}: {}", path.display(), e),
            }
        }

        let content = self.fs.read_to_string(path)?;
        let document = CachedDocument {
            record: extract(path, &self.vault_root, &content, &stats),
            links: extract_links(&content, &self.extension),
        };
        if let Some(cache) = &self.cache
            && let Err(e) = cache.set(path, &document)
        {
            warn!("failed to cache {}: {}", path.display(), e);
        }
        Ok((document, false))
    }

    fn relative(&self, path: &Path) -> String {
        crate::vault::to_slash(path.strip_prefix(&self.vault_root).unwrap_or(path))
    }

    /// Run a structured query. Results are sorted by relative path.
    pub fn query(&self, query: &Query) -> Result<Vec<DocumentRecord>, IndexerError> {
        let storage = self.storage.read();
        Ok(query::evaluate(&storage, query)?.into_iter().cloned().collect())
    }

    /// Run a query, then keep the results matching `filter`.
    pub fn query_filtered(
        &self,
        query: &Query,
        filter: &FilterCollection,
    ) -> Result<Vec<DocumentRecord>, IndexerError> {
        let documents = self.query(query)?;
        Ok(filter::apply(documents, filter, Utc::now(), |record| {
            self.fs.read_to_string(&record.path).ok()
        })?)
    }

    /// Every record, sorted by relative path.
    pub fn get_all_documents(&self) -> Vec<DocumentRecord> {
        self.storage.read().all_documents().into_iter().cloned().collect()
    }

    pub fn get_document(&self, path: &Path) -> Option<DocumentRecord> {
        let path = self.resolve_path(path).ok()?;
        self.storage.read().get(&path).cloned()
    }

    pub fn get_outgoing_links(&self, path: &Path) -> Vec<LinkEntry> {
        match self.resolve_path(path) {
            Ok(path) => self.storage.read().get_outgoing_links(&path).to_vec(),
            Err(_) => Vec::new(),
        }
    }

    /// Sources linking to `path`, sorted.
    pub fn get_backlinks(&self, path: &Path) -> Vec<PathBuf> {
        match self.resolve_path(path) {
            Ok(path) => self.storage.read().get_backlinks(&path),
            Err(_) => Vec::new(),
        }
    }

    /// Resolve links written in `source` against the current index.
    pub fn resolve_links(&self, source: &Path, links: &[RawLink]) -> Vec<LinkEntry> {
        let storage = self.storage.read();
        LinkResolver::new(&storage, &self.vault_root, &self.extension).resolve_all(source, links)
    }

    pub fn document_count(&self) -> usize {
        self.storage.read().len()
    }

    pub fn revision(&self) -> u64 {
        self.storage.read().revision()
    }

    /// Differences between the live indices and a rebuild; empty when
    /// consistent.
    pub fn verify_consistency(&self) -> Vec<String> {
        self.storage.read().verify_consistency()
    }

    /// Bring the index in line with what an operation did on disk.
    ///
    /// Failed and dry-run results change nothing.
    pub fn apply_result(&self, result: &OperationResult) -> Result<(), IndexerError> {
        if !result.success || result.dry_run {
            return Ok(());
        }
        let _guard = self.update_lock.lock();
        for path in &result.removed {
            self.remove_locked(path);
        }
        for path in &result.touched {
            self.update_locked(path)?;
        }
        Ok(())
    }

    /// Watch the vault and keep the index current until [`shutdown`](Self::shutdown).
    pub fn start_watching(self: &Arc<Self>) -> Result<(), IndexerError> {
        let mut slot = self.watcher.lock();
        if slot.as_ref().is_some_and(FileWatcher::is_running) {
            return Err(WatchError::AlreadyRunning.into());
        }
        let mut watcher = FileWatcher::new(self.watch_config.clone());
        let indexer: Weak<Self> = Arc::downgrade(self);
        watcher.add_listener(move |event: &ChangeEvent| -> Result<(), ListenerError> {
            match indexer.upgrade() {
                Some(indexer) => indexer.handle_change(event).map_err(ListenerError::from),
                None => Ok(()),
            }
        })?;
        watcher.start()?;
        *slot = Some(watcher);
        Ok(())
    }

    /// Subscribe to the watcher's change stream, if watching.
    pub fn subscribe(
        &self,
    ) -> Result<Option<std::sync::mpsc::Receiver<ChangeEvent>>, IndexerError> {
        match self.watcher.lock().as_ref() {
            Some(watcher) => Ok(Some(watcher.subscribe()?.1)),
            None => Ok(None),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().as_ref().is_some_and(FileWatcher::is_running)
    }

    /// Stop the watcher, if any, and release it.
    pub fn shutdown(&self) {
        let watcher = self.watcher.lock().take();
        if let Some(mut watcher) = watcher {
            watcher.stop();
            info!("indexer for {} shut down", self.vault_root.display());
        }
    }
}

fn raw_link(entry: &LinkEntry) -> RawLink {
    RawLink {
        target: entry.raw_target.clone(),
        section: None,
        display: entry.display.clone(),
        kind: entry.kind,
        syntax: entry.syntax,
        line: entry.line,
        column: entry.column,
        start: 0,
        end: 0,
    }
}
