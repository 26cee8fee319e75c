//! Pseudoterminal session: owns the hijacked subprocess and the PTY master.
//!
//! Uses `portable-pty` to spawn the command attached to a fresh PTY. The
//! master side is split into a reader (handed to the output relay), a writer
//! (shared by both input paths) and the master handle itself (for resize).

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use termwarp_common::SessionError;

use crate::lifecycle::Terminate;
use crate::relay::SessionInput;

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 24;

/// `EIO` is what Linux returns from a master read once the slave side hangs up.
const EIO: i32 = 5;

/// Window geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Geometry {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    fn to_pty_size(self) -> PtySize {
        PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

/// Anything whose window geometry can be changed.
pub trait Resize: Send + Sync {
    fn resize(&self, geometry: Geometry) -> Result<(), SessionError>;
}

// =============================================================================
// COMMAND
// =============================================================================

/// The command to hijack, plus the environment and working directory it runs in.
///
/// The environment starts as a verbatim copy of this process's environment,
/// proxy variables included.
#[derive(Debug, Clone)]
pub struct SessionCommand {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    cwd: Option<PathBuf>,
}

impl SessionCommand {
    /// Run `program` directly with the inherited environment.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: std::env::vars_os().collect(),
            cwd: std::env::current_dir().ok(),
        }
    }

    /// Run `command_line` through `shell -c`.
    pub fn shell(shell: impl AsRef<OsStr>, command_line: impl AsRef<OsStr>) -> Self {
        Self::new(shell).arg("-c").arg(command_line)
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set or replace a single environment variable.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        let key = key.as_ref().to_os_string();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.as_ref().to_os_string()));
        self
    }

    /// Replace the whole environment.
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_os_string(), v.as_ref().to_os_string()))
            .collect();
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn environment(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    /// Environment variables whose name mentions a proxy.
    pub fn proxy_vars(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .filter(|(k, _)| k.to_string_lossy().to_lowercase().contains("proxy"))
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    /// Human-readable command line, for logs and diagnostics.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_builder(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);

        cmd.env_clear();
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        // portable-pty falls back to $HOME when no cwd is given.
        if let Some(ref dir) = self.cwd {
            cmd.cwd(dir);
        }

        cmd
    }
}

// =============================================================================
// READER
// =============================================================================

/// Blocking reader over the PTY master.
///
/// Returns `Ok(0)` only at end-of-stream: the subprocess exited or the
/// pseudoterminal closed.
pub struct PtyReader {
    inner: Box<dyn Read + Send>,
}

impl Read for PtyReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inner.read(buf) {
            Err(e) if e.raw_os_error() == Some(EIO) => Ok(0),
            other => other,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Owns the hijacked subprocess and its pseudoterminal.
///
/// Every handle sits behind its own lock so the session can be shared by the
/// relay threads, the geometry listener and the lifecycle coordinator.
/// Dropping the session terminates and reaps the subprocess.
pub struct PtySession {
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    reader: Mutex<Option<PtyReader>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
    geometry: Mutex<Geometry>,
    exit_code: Mutex<Option<u32>>,
    process_id: Option<u32>,
    command_line: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PtySession {
    /// Spawn `command` attached to a newly allocated pseudoterminal.
    pub fn start(command: &SessionCommand, geometry: Geometry) -> Result<Self, SessionError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(geometry.to_pty_size())
            .map_err(|e| SessionError::Spawn(format!("failed to open PTY: {e}")))?;

        let command_line = command.display();
        let child = pair
            .slave
            .spawn_command(command.to_builder())
            .map_err(|e| SessionError::Spawn(format!("failed to spawn '{command_line}': {e}")))?;

        // Only the child needs the slave side. Holding it would keep the
        // reader from ever seeing end-of-stream.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Spawn(format!("failed to clone PTY reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Spawn(format!("failed to take PTY writer: {e}")))?;

        let process_id = child.process_id();
        tracing::info!(pid = ?process_id, command = %command_line, "Session started");

        Ok(Self {
            master: Mutex::new(Some(pair.master)),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(PtyReader { inner: reader })),
            child: Mutex::new(Some(child)),
            geometry: Mutex::new(geometry),
            exit_code: Mutex::new(None),
            process_id,
            command_line,
        })
    }

    /// Take the output reader. Only the first call returns it; the output
    /// relay is its sole consumer.
    pub fn take_reader(&self) -> Option<PtyReader> {
        lock(&self.reader).take()
    }

    /// Forward bytes verbatim to the subprocess's input.
    pub fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        let mut guard = lock(&self.writer);
        let writer = guard.as_mut().ok_or(SessionError::Closed)?;
        writer.write_all(data).map_err(SessionError::Write)?;
        writer.flush().map_err(SessionError::Write)?;
        Ok(())
    }

    /// Propagate new window geometry to the pseudoterminal.
    pub fn resize(&self, geometry: Geometry) -> Result<(), SessionError> {
        let guard = lock(&self.master);
        let master = guard
            .as_ref()
            .ok_or_else(|| SessionError::Resize("pseudoterminal is closed".into()))?;
        master
            .resize(geometry.to_pty_size())
            .map_err(|e| SessionError::Resize(e.to_string()))?;
        *lock(&self.geometry) = geometry;
        tracing::debug!(rows = geometry.rows, cols = geometry.cols, "PTY resized");
        Ok(())
    }

    /// Current window geometry.
    pub fn size(&self) -> Geometry {
        *lock(&self.geometry)
    }

    pub fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Exit code once the subprocess has been reaped.
    pub fn exit_code(&self) -> Option<u32> {
        *lock(&self.exit_code)
    }

    /// Signal the subprocess, wait for it to exit and close the PTY.
    ///
    /// Idempotent: once the subprocess has been reaped, later calls only
    /// return the recorded exit code.
    pub fn terminate(&self) -> Option<u32> {
        let child = lock(&self.child).take();

        if let Some(mut child) = child {
            let status = match child.try_wait() {
                Ok(Some(status)) => Some(status),
                _ => {
                    if let Err(e) = child.kill() {
                        tracing::debug!("PTY kill error (may already be dead): {e}");
                    }
                    match child.wait() {
                        Ok(status) => Some(status),
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to reap subprocess");
                            None
                        }
                    }
                }
            };

            let code = status.map(|s| s.exit_code());
            *lock(&self.exit_code) = code;
            tracing::info!(pid = ?self.process_id, exit_code = ?code, "Session reaped");
        }

        // Close our side of the PTY; resize and write now report a closed session.
        lock(&self.writer).take();
        lock(&self.master).take();

        self.exit_code()
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl SessionInput for PtySession {
    fn write_input(&self, data: &[u8]) -> Result<(), SessionError> {
        self.write(data)
    }
}

impl Resize for PtySession {
    fn resize(&self, geometry: Geometry) -> Result<(), SessionError> {
        PtySession::resize(self, geometry)
    }
}

impl Terminate for PtySession {
    fn terminate(&self) -> Option<u32> {
        PtySession::terminate(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
