//! Bounded mailbox carrying remote-submitted lines into the session.
//!
//! Any number of submitters, exactly one consumer. `submit` never blocks:
//! a full mailbox rejects the line instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use termwarp_common::QueueError;

/// Default number of pending lines.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Submission side of the remote input mailbox.
pub struct RemoteInputQueue {
    sender: Mutex<Option<SyncSender<String>>>,
    capacity: usize,
    pending: Arc<AtomicUsize>,
}

/// Consumption side, owned by the remote-input drainer.
pub struct RemoteInputReceiver {
    rx: Receiver<String>,
    pending: Arc<AtomicUsize>,
}

impl RemoteInputQueue {
    /// Create a mailbox holding at most `capacity` pending lines (minimum 1).
    pub fn new(capacity: usize) -> (Self, RemoteInputReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::sync_channel(capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let queue = Self {
            sender: Mutex::new(Some(tx)),
            capacity,
            pending: Arc::clone(&pending),
        };
        (queue, RemoteInputReceiver { rx, pending })
    }

    fn sender(&self) -> MutexGuard<'_, Option<SyncSender<String>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a line without blocking.
    ///
    /// Fails with [`QueueError::Full`] at capacity and [`QueueError::Closed`]
    /// after [`close`](Self::close).
    pub fn submit(&self, line: impl Into<String>) -> Result<(), QueueError> {
        let guard = self.sender();
        let tx = guard.as_ref().ok_or(QueueError::Closed)?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(line.into()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                match e {
                    TrySendError::Full(_) => Err(QueueError::Full {
                        capacity: self.capacity,
                    }),
                    TrySendError::Disconnected(_) => Err(QueueError::Closed),
                }
            }
        }
    }

    /// Stop accepting submissions. Returns `true` only for the call that
    /// actually closed the queue.
    ///
    /// Lines accepted before the close are still delivered to the consumer.
    pub fn close(&self) -> bool {
        let closed = self.sender().take().is_some();
        if closed {
            tracing::debug!("Remote input queue closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines accepted but not yet taken by the consumer.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemoteInputReceiver {
    /// Block until the next line arrives. Returns `None` once the queue is
    /// closed and every accepted line has been taken.
    pub fn recv(&self) -> Option<String> {
        let line = self.rx.recv().ok()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn submit_beyond_capacity_is_rejected() {
        let (queue, _rx) = RemoteInputQueue::new(100);
        for i in 0..100 {
            queue.submit(format!("line {i}")).expect("within capacity");
        }
        assert_eq!(queue.len(), 100);

        let err = queue.submit("one too many").unwrap_err();
        assert_eq!(err, QueueError::Full { capacity: 100 });
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn full_submit_does_not_block() {
        let (queue, _rx) = RemoteInputQueue::new(1);
        queue.submit("a").unwrap();

        let start = Instant::now();
        for _ in 0..1000 {
            assert!(queue.submit("b").is_err());
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn freed_capacity_accepts_again() {
        let (queue, rx) = RemoteInputQueue::new(2);
        queue.submit("a").unwrap();
        queue.submit("b").unwrap();
        assert!(queue.submit("c").is_err());

        assert_eq!(rx.recv().as_deref(), Some("a"));
        queue.submit("c").expect("capacity freed");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn delivery_is_fifo() {
        let (queue, rx) = RemoteInputQueue::new(10);
        for line in ["one", "two", "three"] {
            queue.submit(line).unwrap();
        }
        assert_eq!(rx.recv().as_deref(), Some("one"));
        assert_eq!(rx.recv().as_deref(), Some("two"));
        assert_eq!(rx.recv().as_deref(), Some("three"));
        assert!(queue.is_empty());
    }

    #[test]
    fn close_rejects_submissions_but_drains_accepted() {
        let (queue, rx) = RemoteInputQueue::new(4);
        queue.submit("kept").unwrap();

        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());
        assert_eq!(queue.submit("late").unwrap_err(), QueueError::Closed);

        assert_eq!(rx.recv().as_deref(), Some("kept"));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (queue, _rx) = RemoteInputQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.submit("x").unwrap();
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (queue, rx) = RemoteInputQueue::new(4);
        drop(rx);
        assert_eq!(queue.submit("x").unwrap_err(), QueueError::Closed);
    }
}
