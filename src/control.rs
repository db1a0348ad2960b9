//! Cooperative cancellation for long-running pipeline tasks.
//!
//! A [`CancelSignal`] is a cheap, cloneable token observed at stage
//! boundaries. Cancellation is cooperative: external calls already in flight
//! run to their own deadline; the pipeline aborts before starting the next
//! stage.

use tokio::sync::watch;

/// Sender half; dropping it does NOT cancel the linked signals.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation of all linked [`CancelSignal`]s.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half checked by pipeline tasks at stage boundaries.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a linked handle/signal pair.
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires, for callers without a cancellation path.
    pub fn never() -> CancelSignal {
        let (_tx, rx) = watch::channel(false);
        // The sender is dropped here; the value can no longer change.
        CancelSignal { rx }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_cancelled() {
        let (handle, signal) = CancelSignal::new();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.clone().is_cancelled());
    }

    #[test]
    fn never_stays_quiet() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
    }
}
