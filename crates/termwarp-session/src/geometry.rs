//! Window-size propagation from the controlling terminal to the session.

use std::io;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::hub::BroadcastHub;
use crate::pty::{Geometry, Resize};
use crate::terminal::current_geometry;

/// Push `geometry` to `target`.
///
/// A query or resize failure is logged and recorded as an error entry; the
/// session keeps running with its previous size.
pub fn apply_geometry(
    target: &dyn Resize,
    hub: &BroadcastHub,
    geometry: io::Result<Geometry>,
) -> Option<Geometry> {
    let geometry = match geometry {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(error = %e, "Could not query terminal size");
            hub.record_error(format!("terminal size query failed: {e}"));
            return None;
        }
    };

    match target.resize(geometry) {
        Ok(()) => {
            tracing::debug!(rows = geometry.rows, cols = geometry.cols, "Session resized");
            Some(geometry)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session resize failed");
            hub.record_error(e.to_string());
            None
        }
    }
}

/// Resize `target` on every `SIGWINCH` until `token` is cancelled.
#[cfg(unix)]
pub async fn watch_geometry(
    target: Arc<dyn Resize>,
    hub: Arc<BroadcastHub>,
    token: CancellationToken,
) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = signal(SignalKind::window_change())?;
    tracing::debug!("Geometry listener started");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = winch.recv() => {
                if received.is_none() {
                    break;
                }
                apply_geometry(target.as_ref(), &hub, current_geometry());
            }
        }
    }
    tracing::debug!("Geometry listener stopped");
    Ok(())
}

#[cfg(not(unix))]
pub async fn watch_geometry(
    _target: Arc<dyn Resize>,
    _hub: Arc<BroadcastHub>,
    token: CancellationToken,
) -> io::Result<()> {
    token.cancelled().await;
    Ok(())
}
