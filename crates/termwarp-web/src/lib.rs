//! termwarp-web: HTTP + WebSocket transport for remote observers.
//!
//! A thin adapter over [`BroadcastHub`](termwarp_session::BroadcastHub) and
//! [`RemoteInputQueue`](termwarp_session::RemoteInputQueue). Routes:
//!
//! - `GET /` observer page
//! - `GET /ws` live feed (snapshot first, then live entries)
//! - `GET /api/messages` transcript snapshot
//! - `POST /api/input` remote input submission

pub mod observer;
pub mod protocol;
pub mod server;

pub use observer::{ChannelObserver, OBSERVER_CHANNEL_CAPACITY};
pub use protocol::{InputRequest, MessageType, WireEvent};
pub use server::{router, serve, AppState};
