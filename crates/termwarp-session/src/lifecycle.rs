//! Lifecycle coordinator: ordered, idempotent shutdown.
//!
//! `Running → ShuttingDown → Terminated`. The first trigger to arrive wins;
//! every later trigger is a no-op. Cleanup runs in a fixed order:
//!
//! 1. Restore the local terminal mode
//! 2. Stop geometry-change notifications
//! 3. Terminate the session (signal + wait)
//! 4. Close the remote input queue
//!
//! Each step releases its resource at most once, so concurrent callers racing
//! through [`LifecycleCoordinator::shutdown`] never double-close anything.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::queue::RemoteInputQueue;
use crate::terminal::RawTerminalGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Terminated,
}

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS termination signal.
    Signal,
    /// The local interrupt byte was typed.
    Interrupt,
    /// The hijacked program closed its output.
    SessionEnded,
    /// Startup could not complete after the session was spawned.
    StartupFailed,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownTrigger::Signal => "termination signal",
            ShutdownTrigger::Interrupt => "local interrupt",
            ShutdownTrigger::SessionEnded => "session ended",
            ShutdownTrigger::StartupFailed => "startup failure",
        })
    }
}

/// A subprocess that can be signalled and reaped.
pub trait Terminate: Send + Sync {
    /// Terminate and wait. Must be a no-op once the process is reaped.
    fn terminate(&self) -> Option<u32>;
}

struct Phase {
    state: LifecycleState,
    trigger: Option<ShutdownTrigger>,
}

pub struct LifecycleCoordinator {
    phase: Mutex<Phase>,
    changed: Condvar,
    /// Serializes cleanup; a second caller waits and then finds nothing left to do.
    cleanup: Mutex<()>,
    terminal: Mutex<Option<RawTerminalGuard>>,
    session: Mutex<Option<Arc<dyn Terminate>>>,
    geometry: CancellationToken,
    queue: Arc<RemoteInputQueue>,
    /// Status reported by the reaped subprocess.
    child_exit: Mutex<Option<u32>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LifecycleCoordinator {
    pub fn new(queue: Arc<RemoteInputQueue>) -> Self {
        Self {
            phase: Mutex::new(Phase {
                state: LifecycleState::Running,
                trigger: None,
            }),
            changed: Condvar::new(),
            cleanup: Mutex::new(()),
            terminal: Mutex::new(None),
            session: Mutex::new(None),
            geometry: CancellationToken::new(),
            queue,
            child_exit: Mutex::new(None),
        }
    }

    /// Hand over the raw-mode guard. Restored immediately if shutdown has
    /// already begun.
    pub fn attach_terminal(&self, mut guard: RawTerminalGuard) {
        let _cleanup = lock(&self.cleanup);
        if self.state() == LifecycleState::Running {
            *lock(&self.terminal) = Some(guard);
        } else if let Err(e) = guard.restore() {
            tracing::warn!(error = %e, "Terminal restore failed");
        }
    }

    /// Hand over the session. Terminated immediately if shutdown has already begun.
    pub fn attach_session(&self, session: Arc<dyn Terminate>) {
        let _cleanup = lock(&self.cleanup);
        if self.state() == LifecycleState::Running {
            *lock(&self.session) = Some(session);
        } else {
            *lock(&self.child_exit) = session.terminate();
        }
    }

    /// Cancelled at step 2 of cleanup; the geometry listener watches it.
    pub fn geometry_token(&self) -> CancellationToken {
        self.geometry.clone()
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.phase).state
    }

    /// The trigger that won, once shutdown has begun.
    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        lock(&self.phase).trigger
    }

    /// The code this process should exit with, once shutdown has begun.
    ///
    /// Only a session that ended on its own passes its status through. A
    /// process killed on the operator's behalf reports 0; a startup failure
    /// reports 1.
    pub fn exit_code(&self) -> Option<u32> {
        match self.trigger()? {
            ShutdownTrigger::SessionEnded => *lock(&self.child_exit),
            ShutdownTrigger::Interrupt | ShutdownTrigger::Signal => Some(0),
            ShutdownTrigger::StartupFailed => Some(1),
        }
    }

    /// Move from `Running` to `ShuttingDown`. Returns `true` only for the
    /// first trigger.
    pub fn begin_shutdown(&self, trigger: ShutdownTrigger) -> bool {
        let mut phase = lock(&self.phase);
        if phase.state != LifecycleState::Running {
            return false;
        }
        phase.state = LifecycleState::ShuttingDown;
        phase.trigger = Some(trigger);
        self.changed.notify_all();
        tracing::info!(%trigger, "Shutdown started");
        true
    }

    /// Begin shutdown (if nobody else has) and run the cleanup sequence.
    ///
    /// Safe to call from any thread, any number of times. Returns once
    /// cleanup has completed, whichever caller ran it.
    pub fn shutdown(&self, trigger: ShutdownTrigger) -> bool {
        let won = self.begin_shutdown(trigger);
        let _cleanup = lock(&self.cleanup);

        if self.state() == LifecycleState::Terminated {
            return won;
        }

        // 1. Terminal first, so anything printed from here on looks normal.
        let guard = lock(&self.terminal).take();
        if let Some(mut guard) = guard {
            match guard.restore() {
                Ok(()) => tracing::debug!("Cleanup: terminal restored"),
                Err(e) => tracing::warn!(error = %e, "Cleanup: terminal restore failed"),
            }
        }

        // 2. Geometry notifications.
        if !self.geometry.is_cancelled() {
            self.geometry.cancel();
            tracing::debug!("Cleanup: geometry listener stopped");
        }

        // 3. Session.
        let session = lock(&self.session).take();
        if let Some(session) = session {
            let code = session.terminate();
            *lock(&self.child_exit) = code;
            tracing::debug!(exit_code = ?code, "Cleanup: session terminated");
        }

        // 4. Remote input.
        if self.queue.close() {
            tracing::debug!("Cleanup: remote input closed");
        }

        let mut phase = lock(&self.phase);
        phase.state = LifecycleState::Terminated;
        self.changed.notify_all();
        tracing::info!("Shutdown complete");

        won
    }

    /// Block until cleanup has finished and return the winning trigger.
    pub fn wait_terminated(&self) -> Option<ShutdownTrigger> {
        let mut phase = lock(&self.phase);
        while phase.state != LifecycleState::Terminated {
            phase = self
                .changed
                .wait(phase)
                .unwrap_or_else(PoisonError::into_inner);
        }
        phase.trigger
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::terminal::tests::CountingBackend;
    use crate::terminal::RawModeBackend;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    /// Counts how often it was asked to terminate, and how often it actually had work.
    #[derive(Default)]
    pub(crate) struct CountingTerminator {
        pub calls: AtomicUsize,
        pub kills: AtomicUsize,
        reaped: Mutex<bool>,
        status: u32,
    }

    impl CountingTerminator {
        /// A terminator whose subprocess reports `status` when reaped.
        pub fn exiting_with(status: u32) -> Self {
            Self {
                status,
                ..Default::default()
            }
        }
    }

    impl Terminate for CountingTerminator {
        fn terminate(&self) -> Option<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut reaped = self.reaped.lock().unwrap();
            if !*reaped {
                *reaped = true;
                self.kills.fetch_add(1, Ordering::SeqCst);
            }
            Some(self.status)
        }
    }

    fn coordinator() -> (Arc<LifecycleCoordinator>, Arc<RemoteInputQueue>) {
        let (queue, _rx) = RemoteInputQueue::new(4);
        let queue = Arc::new(queue);
        (
            Arc::new(LifecycleCoordinator::new(Arc::clone(&queue))),
            queue,
        )
    }

    #[test]
    fn starts_running() {
        let (lc, _) = coordinator();
        assert_eq!(lc.state(), LifecycleState::Running);
        assert!(lc.trigger().is_none());
    }

    #[test]
    fn shutdown_runs_every_step() {
        let (lc, queue) = coordinator();
        let backend = CountingBackend::default();
        let terminator = Arc::new(CountingTerminator::default());
        let token = lc.geometry_token();

        lc.attach_terminal(RawTerminalGuard::with_backend(Box::new(backend.clone())).unwrap());
        lc.attach_session(terminator.clone());

        assert!(lc.shutdown(ShutdownTrigger::Interrupt));

        assert_eq!(lc.state(), LifecycleState::Terminated);
        assert_eq!(lc.trigger(), Some(ShutdownTrigger::Interrupt));
        assert_eq!(backend.disabled.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
        assert_eq!(terminator.kills.load(Ordering::SeqCst), 1);
        assert!(queue.is_closed());
        assert_eq!(lc.exit_code(), Some(0));
    }

    #[test]
    fn first_trigger_wins() {
        let (lc, _) = coordinator();
        assert!(lc.shutdown(ShutdownTrigger::SessionEnded));
        assert!(!lc.shutdown(ShutdownTrigger::Signal));
        assert_eq!(lc.trigger(), Some(ShutdownTrigger::SessionEnded));
    }

    #[test]
    fn concurrent_shutdown_releases_each_resource_once() {
        let (lc, _) = coordinator();
        let backend = CountingBackend::default();
        let terminator = Arc::new(CountingTerminator::default());
        lc.attach_terminal(RawTerminalGuard::with_backend(Box::new(backend.clone())).unwrap());
        lc.attach_session(terminator.clone());

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [ShutdownTrigger::Interrupt, ShutdownTrigger::SessionEnded]
            .into_iter()
            .map(|trigger| {
                let lc = Arc::clone(&lc);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    lc.shutdown(trigger)
                })
            })
            .collect();
        let wins: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
        assert_eq!(backend.disabled.load(Ordering::SeqCst), 1);
        assert_eq!(terminator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lc.state(), LifecycleState::Terminated);
    }

    #[test]
    fn failed_restore_does_not_stop_cleanup() {
        let (lc, queue) = coordinator();
        let backend = CountingBackend {
            fail_disable: true,
            ..Default::default()
        };
        let terminator = Arc::new(CountingTerminator::default());
        lc.attach_terminal(RawTerminalGuard::with_backend(Box::new(backend)).unwrap());
        lc.attach_session(terminator.clone());

        lc.shutdown(ShutdownTrigger::Signal);
        assert_eq!(terminator.kills.load(Ordering::SeqCst), 1);
        assert!(queue.is_closed());
        assert_eq!(lc.state(), LifecycleState::Terminated);
    }

    #[test]
    fn late_attachments_are_released_immediately() {
        let (lc, _) = coordinator();
        lc.shutdown(ShutdownTrigger::Signal);

        let backend = CountingBackend::default();
        let terminator = Arc::new(CountingTerminator::default());
        lc.attach_terminal(RawTerminalGuard::with_backend(Box::new(backend.clone())).unwrap());
        lc.attach_session(terminator.clone());

        assert_eq!(backend.disabled.load(Ordering::SeqCst), 1);
        assert_eq!(terminator.kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_terminated_returns_trigger() {
        let (lc, _) = coordinator();
        let waiter = {
            let lc = Arc::clone(&lc);
            std::thread::spawn(move || lc.wait_terminated())
        };
        lc.shutdown(ShutdownTrigger::Signal);
        assert_eq!(waiter.join().unwrap(), Some(ShutdownTrigger::Signal));
    }

    fn exit_code_after(trigger: ShutdownTrigger, child_status: u32) -> Option<u32> {
        let (lc, _) = coordinator();
        lc.attach_session(Arc::new(CountingTerminator::exiting_with(child_status)));
        lc.shutdown(trigger);
        lc.exit_code()
    }

    #[test]
    fn exit_code_unknown_while_running() {
        let (lc, _) = coordinator();
        lc.attach_session(Arc::new(CountingTerminator::exiting_with(3)));
        assert_eq!(lc.exit_code(), None);
    }

    #[test]
    fn session_end_passes_child_status_through() {
        assert_eq!(exit_code_after(ShutdownTrigger::SessionEnded, 3), Some(3));
        assert_eq!(exit_code_after(ShutdownTrigger::SessionEnded, 0), Some(0));
    }

    #[test]
    fn interrupt_exits_cleanly_even_though_child_was_killed() {
        assert_eq!(exit_code_after(ShutdownTrigger::Interrupt, 1), Some(0));
    }

    #[test]
    fn signal_exits_cleanly_even_though_child_was_killed() {
        assert_eq!(exit_code_after(ShutdownTrigger::Signal, 1), Some(0));
    }

    #[test]
    fn startup_failure_exits_with_failure() {
        assert_eq!(exit_code_after(ShutdownTrigger::StartupFailed, 0), Some(1));
    }

    type StepLog = Arc<Mutex<Vec<&'static str>>>;

    /// Raw-mode backend that logs its restore and checks nothing later ran first.
    struct OrderedBackend {
        log: StepLog,
        geometry: CancellationToken,
        queue: Arc<RemoteInputQueue>,
    }

    impl RawModeBackend for OrderedBackend {
        fn enable(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn disable(&mut self) -> io::Result<()> {
            assert!(!self.geometry.is_cancelled(), "geometry stopped before restore");
            assert!(!self.queue.is_closed(), "queue closed before restore");
            self.log.lock().unwrap().push("restore");
            Ok(())
        }
    }

    /// Session stand-in that checks geometry already stopped and the queue is still open.
    struct OrderedTerminator {
        log: StepLog,
        geometry: CancellationToken,
        queue: Arc<RemoteInputQueue>,
    }

    impl Terminate for OrderedTerminator {
        fn terminate(&self) -> Option<u32> {
            assert!(self.geometry.is_cancelled(), "session terminated before geometry stopped");
            assert!(!self.queue.is_closed(), "queue closed before session terminated");
            self.log.lock().unwrap().push("terminate");
            Some(0)
        }
    }

    #[test]
    fn cleanup_runs_in_fixed_order() {
        let (lc, queue) = coordinator();
        let log = StepLog::default();

        let backend = OrderedBackend {
            log: Arc::clone(&log),
            geometry: lc.geometry_token(),
            queue: Arc::clone(&queue),
        };
        lc.attach_terminal(RawTerminalGuard::with_backend(Box::new(backend)).unwrap());
        lc.attach_session(Arc::new(OrderedTerminator {
            log: Arc::clone(&log),
            geometry: lc.geometry_token(),
            queue: Arc::clone(&queue),
        }));

        lc.shutdown(ShutdownTrigger::Interrupt);

        assert_eq!(*log.lock().unwrap(), vec!["restore", "terminate"]);
        assert!(lc.geometry_token().is_cancelled());
        assert!(queue.is_closed());
    }
}
