//! Hub observer backed by a bounded tokio channel.

use std::sync::Arc;

use termwarp_common::DeliveryError;
use termwarp_session::{Observer, TranscriptEntry};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Entries a connection may have in flight before it counts as fallen behind.
pub const OBSERVER_CHANNEL_CAPACITY: usize = 1024;

/// Hands entries to a connection task without blocking the hub.
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<TranscriptEntry>>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<Arc<TranscriptEntry>>) -> Self {
        Self { tx }
    }

    /// A new observer plus the receiving end for its connection task.
    pub fn channel() -> (Self, mpsc::Receiver<Arc<TranscriptEntry>>) {
        let (tx, rx) = mpsc::channel(OBSERVER_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, entry: &Arc<TranscriptEntry>) -> Result<(), DeliveryError> {
        self.tx.try_send(Arc::clone(entry)).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use termwarp_session::{EntryKind, Payload};

    fn entry() -> Arc<TranscriptEntry> {
        Arc::new(TranscriptEntry {
            seq: 0,
            kind: EntryKind::RawOutput,
            payload: Payload::Bytes(b"x".to_vec()),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn full_channel_is_lagged() {
        let (tx, _rx) = mpsc::channel(1);
        let observer = ChannelObserver::new(tx);
        observer.deliver(&entry()).unwrap();
        assert!(matches!(observer.deliver(&entry()), Err(DeliveryError::Lagged)));
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        assert!(matches!(observer.deliver(&entry()), Err(DeliveryError::Closed)));
    }
}
