use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by a registry and every transport it created
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Number of sessions that were registered
    opened: AtomicUsize,
    /// Number of sessions that were removed from the registry
    closed: AtomicUsize,
    /// Number of posted messages handed to a session
    routed_messages: AtomicUsize,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the number of sessions that were registered
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    /// Gets the number of sessions that were removed
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::Relaxed)
    }

    /// Gets the number of posted messages delivered to a session
    pub fn routed_messages(&self) -> usize {
        self.routed_messages.load(Ordering::Relaxed)
    }

    pub(crate) fn increment_opened(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_routed_messages(&self) {
        self.routed_messages.fetch_add(1, Ordering::Relaxed);
    }
}
