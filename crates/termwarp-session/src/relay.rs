//! I/O relay: the output tee and the two input paths.
//!
//! Each path is a blocking loop meant to run on its own named thread, the
//! same way the PTY reader thread is run:
//!
//! - **output**: session → local terminal + hub (verbatim bytes)
//! - **local input**: controlling terminal → session, watching for `0x03`
//! - **remote input**: queue → session, one line at a time

use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use termwarp_common::SessionError;

use crate::hub::BroadcastHub;
use crate::lifecycle::{LifecycleCoordinator, ShutdownTrigger};
use crate::queue::RemoteInputReceiver;

/// The byte a raw-mode terminal produces for Ctrl-C.
pub const INTERRUPT_BYTE: u8 = 0x03;

const OUTPUT_CHUNK: usize = 8192;
const INPUT_CHUNK: usize = 1024;

/// The write side of a session, shared by both input paths.
pub trait SessionInput: Send + Sync {
    fn write_input(&self, data: &[u8]) -> Result<(), SessionError>;
}

#[derive(Clone)]
pub struct IoRelay {
    session: Arc<dyn SessionInput>,
    hub: Arc<BroadcastHub>,
    lifecycle: Arc<LifecycleCoordinator>,
}

impl IoRelay {
    pub fn new(
        session: Arc<dyn SessionInput>,
        hub: Arc<BroadcastHub>,
        lifecycle: Arc<LifecycleCoordinator>,
    ) -> Self {
        Self {
            session,
            hub,
            lifecycle,
        }
    }

    /// Copy every chunk from `source` to `local` and to the hub, unmodified,
    /// until end of stream. Then shut down with [`ShutdownTrigger::SessionEnded`].
    ///
    /// A failing local sink is logged and skipped; observers still get the bytes.
    pub fn pump_output<R: Read, W: Write>(&self, mut source: R, mut local: W) {
        let mut buf = [0u8; OUTPUT_CHUNK];
        let mut local_ok = true;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Session output read failed");
                    break;
                }
            };
            let chunk = &buf[..n];

            if let Err(e) = local.write_all(chunk).and_then(|()| local.flush()) {
                if local_ok {
                    tracing::warn!(error = %e, "Local terminal write failed");
                    local_ok = false;
                }
            } else {
                local_ok = true;
            }

            self.hub.record_output(chunk);
        }

        tracing::info!("Session output reached end of stream");
        self.lifecycle.shutdown(ShutdownTrigger::SessionEnded);
    }

    /// Forward keystrokes from `source` to the session.
    ///
    /// The interrupt byte is never forwarded: bytes before it in the same
    /// chunk are written, then shutdown runs with
    /// [`ShutdownTrigger::Interrupt`] and the loop ends. End of stream on
    /// `source` only stops this path.
    pub fn pump_local_input<R: Read>(&self, mut source: R) {
        let mut buf = [0u8; INPUT_CHUNK];
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!("Local input closed");
                    return;
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Local input read failed");
                    return;
                }
            };
            let chunk = &buf[..n];

            match chunk.iter().position(|b| *b == INTERRUPT_BYTE) {
                Some(at) => {
                    self.forward_local(&chunk[..at]);
                    tracing::info!("Interrupt received on local input");
                    self.lifecycle.shutdown(ShutdownTrigger::Interrupt);
                    return;
                }
                None => self.forward_local(chunk),
            }
        }
    }

    fn forward_local(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Err(e) = self.session.write_input(data) {
            tracing::warn!(error = %e, "Local input write failed");
            self.hub.record_error(format!("local input write failed: {e}"));
        }
    }

    /// Write each queued line followed by `\n`, recording it in the hub once
    /// written. Ends when the queue is closed and drained.
    pub fn drain_remote_input(&self, receiver: RemoteInputReceiver) {
        while let Some(line) = receiver.recv() {
            let mut data = Vec::with_capacity(line.len() + 1);
            data.extend_from_slice(line.as_bytes());
            data.push(b'\n');

            match self.session.write_input(&data) {
                Ok(()) => {
                    tracing::debug!(len = line.len(), "Remote input written");
                    self.hub.record_remote_input(&line);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote input write failed");
                    self.hub
                        .record_error(format!("remote input write failed: {e}"));
                }
            }
        }
        tracing::debug!("Remote input queue drained");
    }

    pub fn spawn_output<R, W>(&self, source: R, local: W) -> io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let relay = self.clone();
        thread::Builder::new()
            .name("termwarp-output".into())
            .spawn(move || relay.pump_output(source, local))
    }

    pub fn spawn_local_input<R>(&self, source: R) -> io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        let relay = self.clone();
        thread::Builder::new()
            .name("termwarp-local-input".into())
            .spawn(move || relay.pump_local_input(source))
    }

    pub fn spawn_remote_input(&self, receiver: RemoteInputReceiver) -> io::Result<JoinHandle<()>> {
        let relay = self.clone();
        thread::Builder::new()
            .name("termwarp-remote-input".into())
            .spawn(move || relay.drain_remote_input(receiver))
    }
}
