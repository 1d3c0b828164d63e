//! Change listeners, each served by its own worker thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::WatchError;
use super::events::ChangeEvent;

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Receives debounced change events.
///
/// Invocations for one listener are sequential and in emission order. A
/// failing or slow listener does not hold up other listeners or the watcher.
pub trait ChangeListener: Send + 'static {
    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), ListenerError>;

    /// Called for errors reported by the underlying watcher.
    fn on_error(&mut self, error: &WatchError) {
        warn!("watcher error: {}", error);
    }
}

impl<F> ChangeListener for F
where
    F: FnMut(&ChangeEvent) -> Result<(), ListenerError> + Send + 'static,
{
    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Forwards events into a channel; backs `FileWatcher::subscribe`.
pub(crate) struct ChannelListener(pub(crate) Sender<ChangeEvent>);

impl ChangeListener for ChannelListener {
    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), ListenerError> {
        if self.0.send(event.clone()).is_err() {
            debug!("subscriber for {} dropped its receiver", event.path.display());
        }
        Ok(())
    }
}

/// Decides whether deliveries of a generation may still be invoked.
///
/// `active` holds the running generation (0 when stopped). Workers hold
/// `in_flight` for reading during an invocation so `stop()` can wait for
/// in-flight calls by taking it for writing.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    pub(crate) active: AtomicU64,
    pub(crate) in_flight: RwLock<()>,
}

impl Gate {
    pub(crate) fn open(&self, generation: u64) {
        self.active.store(generation, Ordering::SeqCst);
    }

    /// Close the gate. With `wait`, returns only once no listener is mid-call.
    pub(crate) fn close(&self, wait: bool) {
        self.active.store(0, Ordering::SeqCst);
        if wait {
            drop(self.in_flight.write());
        }
    }

    fn admits(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) == generation
    }
}

pub(crate) enum Delivery {
    Event { generation: u64, event: ChangeEvent },
    Error { generation: u64, error: Arc<WatchError> },
    Shutdown,
}

pub(crate) struct ListenerSlot {
    pub(crate) id: ListenerId,
    pub(crate) sender: Sender<Delivery>,
    pub(crate) worker: Option<JoinHandle<()>>,
}

/// Worker loop for one listener.
pub(crate) fn run_listener(
    id: ListenerId,
    mut listener: Box<dyn ChangeListener>,
    deliveries: Receiver<Delivery>,
    gate: Arc<Gate>,
) {
    while let Ok(delivery) = deliveries.recv() {
        let (generation, outcome) = match delivery {
            Delivery::Shutdown => break,
            Delivery::Event { generation, event } => {
                let _in_flight = gate.in_flight.read();
                if !gate.admits(generation) {
                    continue;
                }
                (generation, catch_unwind(AssertUnwindSafe(|| listener.on_change(&event))))
            }
            Delivery::Error { generation, error } => {
                let _in_flight = gate.in_flight.read();
                if !gate.admits(generation) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    listener.on_error(&error);
                    Ok(())
                }));
                (generation, outcome)
            }
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("listener {:?} failed (generation {}): {}", id, generation, e),
            Err(_) => warn!("listener {:?} panicked (generation {})", id, generation),
        }
    }
    debug!("listener {:?} stopped", id);
}
