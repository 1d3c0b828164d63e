//! Debounced filesystem watching.
//!
//! A [`FileWatcher`] observes one or more roots with `notify`, keeps the
//! last raw event per path for a debounce window, classifies it as created,
//! modified or deleted and fans the result out to registered listeners.

pub mod config;
pub mod events;
pub mod filter;
pub mod listener;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use config::{DEFAULT_DEBOUNCE, WatchConfig, default_ignore_patterns};
pub use events::{ChangeEvent, ChangeKind};
pub use filter::PathFilter;
pub use listener::{ChangeListener, ListenerError, ListenerId};

use listener::{ChannelListener, Delivery, Gate, ListenerSlot, run_listener};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher is already running")]
    AlreadyRunning,

    #[error("watch root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to spawn watcher thread: {0}")]
    Spawn(#[source] std::io::Error),
}

enum Signal {
    Raw(notify::Result<Event>),
    Shutdown,
}

struct Running {
    // Dropping the watcher unregisters every OS watch.
    watcher: RecommendedWatcher,
    signals: Sender<Signal>,
    debounce: JoinHandle<()>,
}

/// Debounced watcher over a set of roots.
pub struct FileWatcher {
    config: WatchConfig,
    gate: Arc<Gate>,
    listeners: Arc<Mutex<Vec<ListenerSlot>>>,
    next_listener: Mutex<u64>,
    generation: u64,
    running: Option<Running>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            gate: Arc::new(Gate::default()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: Mutex::new(0),
            generation: 0,
            running: None,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Register a listener. It receives events from the next emission on.
    pub fn add_listener<L: ChangeListener>(&self, listener: L) -> Result<ListenerId, WatchError> {
        let id = {
            let mut next = self.next_listener.lock();
            *next += 1;
            ListenerId(*next)
        };
        let (sender, deliveries) = mpsc::channel();
        let gate = Arc::clone(&self.gate);
        let boxed: Box<dyn ChangeListener> = Box::new(listener);
        let worker = thread::Builder::new()
            .name(format!("vaultindex-listener-{}", id.0))
            .spawn(move || run_listener(id, boxed, deliveries, gate))
            .map_err(WatchError::Spawn)?;
        self.listeners.lock().push(ListenerSlot { id, sender, worker: Some(worker) });
        Ok(id)
    }

    /// Unregister a listener and wait for its worker to finish.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let slot = {
            let mut listeners = self.listeners.lock();
            let Some(index) = listeners.iter().position(|s| s.id == id) else {
                return false;
            };
            listeners.remove(index)
        };
        shutdown_slot(slot);
        true
    }

    /// An ordered stream of events, backed by a listener.
    pub fn subscribe(&self) -> Result<(ListenerId, Receiver<ChangeEvent>), WatchError> {
        let (tx, rx) = mpsc::channel();
        let id = self.add_listener(ChannelListener(tx))?;
        Ok((id, rx))
    }

    /// Start observing the configured roots.
    ///
    /// Files present at start are recorded but produce no events.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let mut roots = Vec::with_capacity(self.config.roots.len());
        for root in &self.config.roots {
            let canonical =
                root.canonicalize().map_err(|_| WatchError::RootNotFound(root.clone()))?;
            roots.push(canonical);
        }

        let filter = PathFilter::new(
            roots.clone(),
            &self.config.extension,
            &self.config.ignore_patterns,
            self.config.recursive,
        )?;
        let known = initial_scan(&roots, &filter, self.config.recursive);
        debug!("watcher initial scan found {} files", known.len());

        let (signals, incoming) = mpsc::channel();
        let raw_sender = signals.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone once the debounce thread exits.
            let _ = raw_sender.send(Signal::Raw(res));
        })?;
        let mode =
            if self.config.recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
        for root in &roots {
            watcher.watch(root, mode)?;
        }

        self.generation += 1;
        let generation = self.generation;
        self.gate.open(generation);

        let classifier = Classifier { filter, known };
        let listeners = Arc::clone(&self.listeners);
        let window = self.config.debounce;
        let debounce = thread::Builder::new()
            .name("vaultindex-watcher".to_string())
            .spawn(move || debounce_loop(incoming, classifier, window, listeners, generation))
            .map_err(WatchError::Spawn);
        let debounce = match debounce {
            Ok(handle) => handle,
            Err(e) => {
                self.gate.close(false);
                return Err(e);
            }
        };

        self.running = Some(Running { watcher, signals, debounce });
        info!("watching {} root(s) for .{} files", roots.len(), self.config.extension);
        Ok(())
    }

    /// Stop watching. No listener is invoked after this returns.
    ///
    /// When called from inside a listener callback, only that callback may
    /// still be running on return.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        self.gate.close(!self.on_listener_thread());
        let _ = running.signals.send(Signal::Shutdown);
        drop(running.watcher);
        if running.debounce.join().is_err() {
            warn!("watcher debounce thread panicked");
        }
        info!("watcher stopped");
    }
}

impl FileWatcher {
    fn on_listener_thread(&self) -> bool {
        let current = thread::current().id();
        self.listeners
            .lock()
            .iter()
            .any(|s| s.worker.as_ref().is_some_and(|w| w.thread().id() == current))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
        let slots: Vec<ListenerSlot> = self.listeners.lock().drain(..).collect();
        for slot in slots {
            shutdown_slot(slot);
        }
    }
}

fn shutdown_slot(mut slot: ListenerSlot) {
    let _ = slot.sender.send(Delivery::Shutdown);
    if let Some(worker) = slot.worker.take()
        && worker.thread().id() != thread::current().id()
        && worker.join().is_err()
    {
        warn!("listener {:?} worker panicked", slot.id);
    }
}

fn initial_scan(roots: &[PathBuf], filter: &PathFilter, recursive: bool) -> HashSet<PathBuf> {
    let depth = if recursive { usize::MAX } else { 1 };
    roots
        .iter()
        .flat_map(|root| WalkDir::new(root).max_depth(depth).into_iter().filter_map(Result::ok))
        .filter(|entry| entry.file_type().is_file() && filter.accepts(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Maps raw notify events onto change kinds using the set of known files.
struct Classifier {
    filter: PathFilter,
    known: HashSet<PathBuf>,
}

impl Classifier {
    fn classify(&mut self, event: Event) -> Vec<(PathBuf, ChangeKind)> {
        let mut out = Vec::new();
        match event.kind {
            EventKind::Create(_) => {
                for path in event.paths {
                    self.appeared(path, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    for path in event.paths {
                        self.vanished(path, &mut out);
                    }
                }
                RenameMode::To => {
                    for path in event.paths {
                        self.appeared(path, &mut out);
                    }
                }
                RenameMode::Both => {
                    let mut paths = event.paths.into_iter();
                    if let Some(from) = paths.next() {
                        self.vanished(from, &mut out);
                    }
                    for to in paths {
                        self.appeared(to, &mut out);
                    }
                }
                _ => {
                    for path in event.paths {
                        if path.exists() {
                            self.appeared(path, &mut out);
                        } else {
                            self.vanished(path, &mut out);
                        }
                    }
                }
            },
            EventKind::Modify(_) => {
                for path in event.paths {
                    self.appeared(path, &mut out);
                }
            }
            EventKind::Remove(_) => {
                for path in event.paths {
                    self.vanished(path, &mut out);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }
        out
    }

    fn appeared(&mut self, path: PathBuf, out: &mut Vec<(PathBuf, ChangeKind)>) {
        if !self.filter.accepts(&path) || path.is_dir() {
            return;
        }
        let kind = if self.known.insert(path.clone()) {
            ChangeKind::Created
        } else {
            ChangeKind::Modified
        };
        out.push((path, kind));
    }

    fn vanished(&mut self, path: PathBuf, out: &mut Vec<(PathBuf, ChangeKind)>) {
        if !self.filter.accepts(&path) {
            return;
        }
        self.known.remove(&path);
        out.push((path, ChangeKind::Deleted));
    }
}

struct Pending {
    kind: ChangeKind,
    deadline: Instant,
}

fn debounce_loop(
    incoming: Receiver<Signal>,
    mut classifier: Classifier,
    window: Duration,
    listeners: Arc<Mutex<Vec<ListenerSlot>>>,
    generation: u64,
) {
    let mut pending: HashMap<PathBuf, Pending> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();
        let signal = match next_deadline {
            Some(deadline) => {
                match incoming.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(signal) => Some(signal),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match incoming.recv() {
                Ok(signal) => Some(signal),
                Err(_) => break,
            },
        };

        match signal {
            // Pending entries are dropped unflushed.
            Some(Signal::Shutdown) => break,
            Some(Signal::Raw(Ok(event))) => {
                for (path, kind) in classifier.classify(event) {
                    let kind = match pending.get(&path) {
                        Some(previous) => coalesce(previous.kind, kind),
                        None => kind,
                    };
                    pending.insert(path, Pending { kind, deadline: Instant::now() + window });
                }
            }
            Some(Signal::Raw(Err(error))) => {
                warn!("watcher error: {}", error);
                let error = Arc::new(WatchError::Notify(error));
                broadcast(&listeners, |_| Delivery::Error { generation, error: Arc::clone(&error) });
            }
            None => {}
        }

        let now = Instant::now();
        let mut due: Vec<PathBuf> =
            pending.iter().filter(|(_, p)| p.deadline <= now).map(|(path, _)| path.clone()).collect();
        due.sort();
        for path in due {
            if let Some(entry) = pending.remove(&path) {
                debug!("{} {}", entry.kind, path.display());
                let event = ChangeEvent::new(entry.kind, path);
                broadcast(&listeners, |_| Delivery::Event { generation, event: event.clone() });
            }
        }
    }
    debug!("debounce loop exited with {} pending change(s) dropped", pending.len());
}

/// Kind to report when `next` arrives while `previous` is still pending.
///
/// A write right after a create is still a creation, and a file replaced
/// within the window was modified. Otherwise the latest event wins.
fn coalesce(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (previous, next) {
        (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
        (ChangeKind::Deleted, ChangeKind::Created) => ChangeKind::Modified,
        (_, next) => next,
    }
}

fn broadcast(
    listeners: &Mutex<Vec<ListenerSlot>>,
    delivery: impl Fn(&ListenerSlot) -> Delivery,
) {
    for slot in listeners.lock().iter() {
        if slot.sender.send(delivery(slot)).is_err() {
            warn!("listener {:?} is gone", slot.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn classifier(known: &[&str]) -> Classifier {
        let filter =
            PathFilter::new(vec![PathBuf::from("/v")], "md", &default_ignore_patterns(), true)
                .unwrap();
        Classifier { filter, known: known.iter().map(PathBuf::from).collect() }
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths.iter().fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn create_of_known_file_is_modification() {
        let mut c = classifier(&["/v/a.md"]);
        let out = c.classify(event(EventKind::Create(CreateKind::File), &["/v/a.md"]));
        assert_eq!(out, vec![(PathBuf::from("/v/a.md"), ChangeKind::Modified)]);
    }

    #[test]
    fn modify_of_unknown_file_is_creation() {
        let mut c = classifier(&[]);
        let kind = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let out = c.classify(event(kind, &["/v/new.md"]));
        assert_eq!(out, vec![(PathBuf::from("/v/new.md"), ChangeKind::Created)]);
        let again = c.classify(event(kind, &["/v/new.md"]));
        assert_eq!(again[0].1, ChangeKind::Modified);
    }

    #[test]
    fn rename_both_yields_delete_and_create() {
        let mut c = classifier(&["/v/old.md"]);
        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        let out = c.classify(event(kind, &["/v/old.md", "/v/new.md"]));
        assert_eq!(
            out,
            vec![
                (PathBuf::from("/v/old.md"), ChangeKind::Deleted),
                (PathBuf::from("/v/new.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn removals_and_ignored_paths() {
        let mut c = classifier(&["/v/a.md"]);
        let out = c.classify(event(
            EventKind::Remove(RemoveKind::File),
            &["/v/a.md", "/v/.trash/a.md", "/v/a.txt"],
        ));
        assert_eq!(out, vec![(PathBuf::from("/v/a.md"), ChangeKind::Deleted)]);
        assert!(c.known.is_empty());
    }

    #[test]
    fn access_events_are_ignored() {
        let mut c = classifier(&["/v/a.md"]);
        let kind = EventKind::Access(notify::event::AccessKind::Read);
        assert!(c.classify(event(kind, &["/v/a.md"])).is_empty());
    }

    #[test]
    fn pending_kinds_coalesce() {
        use ChangeKind::{Created, Deleted, Modified};
        assert_eq!(coalesce(Created, Modified), Created);
        assert_eq!(coalesce(Deleted, Created), Modified);
        assert_eq!(coalesce(Modified, Modified), Modified);
        assert_eq!(coalesce(Created, Deleted), Deleted);
        assert_eq!(coalesce(Modified, Deleted), Deleted);
    }

    #[test]
    fn start_twice_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(WatchConfig::new(dir.path()));
        watcher.start().unwrap();
        assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));
        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[test]
    fn missing_root_fails_to_start() {
        let mut watcher = FileWatcher::new(WatchConfig::new("/definitely/not/here"));
        assert!(matches!(watcher.start(), Err(WatchError::RootNotFound(_))));
    }
}
