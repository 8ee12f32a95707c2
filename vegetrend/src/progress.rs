use std::sync::{Arc, Mutex};

use crossbeam::channel::{unbounded, Receiver, Sender};

/// Sink for human-readable progress lines emitted while a scan works.
///
/// Implementations must never block the scanner; delivery is best effort.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Sink that discards every message.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _message: &str) {}
}

struct Listener {
    id: u64,
    tx: Sender<String>,
}

struct HubInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Broadcast registry fanning progress lines out to any number of listeners.
///
/// Each listener gets its own unbounded channel, so a slow or abandoned
/// receiver never stalls the emitting scan. Listeners whose receiver has
/// been dropped are pruned on the next broadcast. There is no replay:
/// a subscriber only sees lines emitted after it subscribed.
#[derive(Clone)]
pub struct ProgressHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        ProgressHub {
            inner: Arc::new(Mutex::new(HubInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a new listener and hand back its receiving end.
    pub fn subscribe(&self) -> ProgressReceiver {
        let (tx, rx) = unbounded();
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Listener { id, tx });
        ProgressReceiver { id, rx }
    }

    /// Remove a listener by id. Dropping the receiver works too; this just
    /// frees the slot immediately instead of at the next broadcast.
    pub fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.listeners.retain(|l| l.id != id);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressHub {
    fn emit(&self, message: &str) {
        log::info!("{}", message);
        let mut inner = self.inner.lock().unwrap();
        // send() on an unbounded channel never blocks; it only fails once
        // the receiver is gone, which drops the listener here.
        inner
            .listeners
            .retain(|l| l.tx.send(message.to_string()).is_ok());
    }
}

/// Receiving end of one [`ProgressHub`] subscription.
pub struct ProgressReceiver {
    id: u64,
    rx: Receiver<String>,
}

impl ProgressReceiver {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the next line, or `None` once the hub has gone away.
    pub fn recv(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    /// Fetch a pending line without blocking.
    pub fn try_recv(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}
