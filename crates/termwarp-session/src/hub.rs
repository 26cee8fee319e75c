//! Broadcast hub: the append-only session transcript and its observers.
//!
//! One read/write lock guards both the transcript and the observer set.
//! Appends, registration and removal take the write lock, so entries are
//! totally ordered and every observer receives them in that order. A
//! snapshot only needs the read lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use termwarp_common::DeliveryError;

/// What a transcript entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Bytes the subprocess wrote, verbatim.
    RawOutput,
    /// A line submitted by a remote observer and written to the session.
    RemoteInput,
    /// A non-fatal failure on one of the relay paths.
    Error,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::RawOutput => "raw_output",
            EntryKind::RemoteInput => "remote_input",
            EntryKind::Error => "error",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(b) => b,
            Payload::Text(s) => s.as_bytes(),
        }
    }
}

/// One event in the transcript. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Position in the transcript, starting at 0.
    pub seq: u64,
    pub kind: EntryKind,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

/// A connected party receiving the live feed.
///
/// `deliver` must not block: it runs under the hub's write lock.
pub trait Observer: Send + Sync {
    fn deliver(&self, entry: &Arc<TranscriptEntry>) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

#[derive(Default)]
struct HubState {
    transcript: Vec<Arc<TranscriptEntry>>,
    observers: HashMap<ObserverId, Box<dyn Observer>>,
    next_observer: u64,
}

impl HubState {
    fn append(&mut self, kind: EntryKind, payload: Payload) -> Arc<TranscriptEntry> {
        let entry = Arc::new(TranscriptEntry {
            seq: self.transcript.len() as u64,
            kind,
            payload,
            timestamp: Utc::now(),
        });
        self.transcript.push(Arc::clone(&entry));
        entry
    }

    /// Deliver to every observer, returning the ones that failed.
    fn fan_out(&self, entry: &Arc<TranscriptEntry>) -> Vec<(ObserverId, DeliveryError)> {
        self.observers
            .iter()
            .filter_map(|(id, observer)| observer.deliver(entry).err().map(|e| (*id, e)))
            .collect()
    }
}

/// Shared sink for transcript events.
#[derive(Default)]
pub struct BroadcastHub {
    state: RwLock<HubState>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry and deliver it to every observer. Returns its `seq`.
    ///
    /// Observers whose delivery fails are removed at once, and the removal
    /// is itself recorded as an `error` entry.
    pub fn record(&self, kind: EntryKind, payload: Payload) -> u64 {
        let mut state = self.write();
        let entry = state.append(kind, payload);
        let seq = entry.seq;

        let mut failed = state.fan_out(&entry);
        while !failed.is_empty() {
            let mut notes = Vec::with_capacity(failed.len());
            for (id, err) in failed {
                state.observers.remove(&id);
                tracing::warn!(observer = %id, error = %err, "Dropping observer after failed delivery");
                notes.push(format!("{id} dropped: {err}"));
            }
            // The set only shrinks, so this terminates.
            let note = state.append(EntryKind::Error, Payload::Text(notes.join("; ")));
            failed = state.fan_out(&note);
        }

        seq
    }

    pub fn record_output(&self, bytes: &[u8]) -> u64 {
        self.record(EntryKind::RawOutput, Payload::Bytes(bytes.to_vec()))
    }

    pub fn record_remote_input(&self, line: &str) -> u64 {
        self.record(EntryKind::RemoteInput, Payload::Text(line.to_string()))
    }

    pub fn record_error(&self, message: impl Into<String>) -> u64 {
        self.record(EntryKind::Error, Payload::Text(message.into()))
    }

    /// The full transcript as of this call.
    pub fn snapshot(&self) -> Vec<Arc<TranscriptEntry>> {
        self.read().transcript.clone()
    }

    /// Register an observer and take the snapshot it should replay, in one
    /// step. Live delivery to the observer starts with entry `snapshot.len()`.
    pub fn attach(&self, observer: Box<dyn Observer>) -> (ObserverId, Vec<Arc<TranscriptEntry>>) {
        let mut state = self.write();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.insert(id, observer);
        tracing::debug!(observer = %id, observers = state.observers.len(), "Observer attached");
        (id, state.transcript.clone())
    }

    /// Remove an observer. Returns `false` if it was already gone.
    pub fn detach(&self, id: ObserverId) -> bool {
        let removed = self.write().observers.remove(&id).is_some();
        if removed {
            tracing::debug!(observer = %id, "Observer detached");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.read().observers.len()
    }

    /// Number of transcript entries.
    pub fn len(&self) -> usize {
        self.read().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
