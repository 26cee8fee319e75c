//! Local terminal mode: scoped raw-mode acquisition and geometry queries.

use std::io;

use termwarp_common::TerminalError;

use crate::pty::Geometry;

/// Switches the controlling terminal in and out of raw mode.
pub trait RawModeBackend: Send {
    /// Save the current mode and switch to raw mode.
    fn enable(&mut self) -> io::Result<()>;

    /// Put back the mode saved by `enable`.
    fn disable(&mut self) -> io::Result<()>;
}

/// Raw mode on the process's controlling terminal via `crossterm`.
///
/// Crossterm captures the original termios on enable and restores that
/// snapshot on disable.
#[derive(Debug, Default)]
pub struct CrosstermBackend;

impl RawModeBackend for CrosstermBackend {
    fn enable(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable(&mut self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }
}

/// Holds the terminal in raw mode until restored or dropped.
///
/// The saved mode is restored at most once, whichever of [`restore`] or
/// `Drop` gets there first.
///
/// [`restore`]: RawTerminalGuard::restore
pub struct RawTerminalGuard {
    backend: Box<dyn RawModeBackend>,
    active: bool,
}

impl RawTerminalGuard {
    /// Put the controlling terminal into raw mode.
    pub fn acquire() -> Result<Self, TerminalError> {
        Self::with_backend(Box::new(CrosstermBackend))
    }

    pub fn with_backend(mut backend: Box<dyn RawModeBackend>) -> Result<Self, TerminalError> {
        backend.enable().map_err(TerminalError::EnterRaw)?;
        tracing::debug!("Terminal raw mode enabled");
        Ok(Self {
            backend,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Restore the saved terminal mode. A no-op after the first call.
    pub fn restore(&mut self) -> Result<(), TerminalError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.backend.disable().map_err(TerminalError::Restore)?;
        tracing::debug!("Terminal mode restored");
        Ok(())
    }
}

impl Drop for RawTerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "Terminal restore on drop failed");
        }
    }
}

/// Geometry of the controlling terminal.
pub fn current_geometry() -> io::Result<Geometry> {
    let (cols, rows) = crossterm::terminal::size()?;
    Ok(Geometry::new(rows, cols))
}
