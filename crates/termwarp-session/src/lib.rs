//! termwarp-session: the session-hijacking engine.
//!
//! Owns the hijacked subprocess behind a pseudoterminal and relays bytes
//! between it, the local terminal and remote observers. The byte stream is
//! never interpreted; it is copied verbatim.
//!
//! # Architecture
//!
//! - [`RawTerminalGuard`]: scoped raw mode for the controlling terminal.
//! - [`PtySession`]: subprocess + pseudoterminal master (spawn, read, write, resize, terminate).
//! - [`RemoteInputQueue`]: bounded, non-blocking mailbox for remote lines.
//! - [`BroadcastHub`]: append-only transcript and observer fan-out.
//! - [`IoRelay`]: the output tee and both input paths.
//! - [`LifecycleCoordinator`]: idempotent, ordered shutdown.

pub mod geometry;
pub mod hub;
pub mod lifecycle;
pub mod pty;
pub mod queue;
pub mod relay;
pub mod terminal;

pub use geometry::{apply_geometry, watch_geometry};
pub use hub::{BroadcastHub, EntryKind, Observer, ObserverId, Payload, TranscriptEntry};
pub use lifecycle::{LifecycleCoordinator, LifecycleState, ShutdownTrigger, Terminate};
pub use pty::{Geometry, PtyReader, PtySession, Resize, SessionCommand};
pub use queue::{RemoteInputQueue, RemoteInputReceiver, DEFAULT_QUEUE_CAPACITY};
pub use relay::{IoRelay, SessionInput, INTERRUPT_BYTE};
pub use terminal::{current_geometry, CrosstermBackend, RawModeBackend, RawTerminalGuard};
