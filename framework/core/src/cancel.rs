use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// A stop signal shared between the coordinator and its workers.
///
/// Cancelling is cooperative. Nothing is killed when [CancelHandle::cancel] is called, the workers
/// check their [CancelListener] between executions and stop picking up new work.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Err(e) = self.sender.send(()) {
            // Fails when nobody has subscribed yet. The flag above still records the request.
            log::debug!("No listeners for cancel signal: {e:?}");
        }
    }

    /// Whether [CancelHandle::cancel] has been called on this handle or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener::new(self.sender.subscribe(), self.cancelled.clone())
    }
}

/// Receiving side of a [CancelHandle].
///
/// Once a listener has observed the signal it keeps reporting it, so it is safe to check more than
/// once.
#[derive(Clone, Debug)]
pub struct CancelListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    cancelled: Arc<AtomicBool>,
    received: bool,
}

impl CancelListener {
    pub(crate) fn new(receiver: Receiver<()>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            cancelled,
            received: false,
        }
    }

    /// Point in time check for the cancel signal. When this returns true, no new work should be
    /// started.
    pub fn should_stop(&mut self) -> bool {
        if self.received {
            return true;
        }

        let signalled = match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
                Err(TryRecvError::Empty) => false,
            },
            Err(_) => false,
        };

        self.received = signalled || self.cancelled.load(Ordering::SeqCst);
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_sees_cancel() {
        let handle = CancelHandle::new();
        let mut listener = handle.new_listener();
        assert!(!listener.should_stop());

        handle.cancel();
        assert!(listener.should_stop());
        // Latched after the first observation
        assert!(listener.should_stop());
    }

    #[test]
    fn listener_created_after_cancel_still_stops() {
        let handle = CancelHandle::new();
        handle.cancel();

        let mut listener = handle.clone().new_listener();
        assert!(listener.should_stop());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn independent_handles_do_not_interfere() {
        let a = CancelHandle::new();
        let b = CancelHandle::new();
        let mut listener = b.new_listener();

        a.cancel();
        assert!(!listener.should_stop());
    }
}
