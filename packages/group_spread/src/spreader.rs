use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

use crate::pal::PlatformFacade;
use crate::policy::PlacementPolicy;
use crate::primitive_types::ProcessId;
use crate::reconciler::{Reconciler, SessionOutcome};
use crate::session::SessionContext;

/// Refresh interval substituted when the requested one is below the allowed minimum.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest refresh interval a session will accept. Anything below it substitutes
/// [`DEFAULT_REFRESH_INTERVAL`].
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Manages one target process: spawns a reconciliation loop on a dedicated background thread
/// and controls its lifetime.
///
/// One spreader manages at most one session at a time. Dropping an active spreader stops the
/// session first, blocking until the background thread has exited.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use group_spread::GroupSpreader;
///
/// let mut spreader = GroupSpreader::new();
/// let (completion_tx, completion_rx) = oneshot::channel();
///
/// assert!(spreader.start_async(1234, Duration::from_millis(500), completion_tx));
///
/// // ... the session runs in the background; wait for it or stop it ...
///
/// spreader.stop();
/// ```
#[derive(Debug)]
pub struct GroupSpreader {
    policy: PlacementPolicy,
    worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl GroupSpreader {
    /// Creates a spreader using the default placement policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(PlacementPolicy::default())
    }

    /// Creates a spreader using the given placement policy.
    #[must_use]
    pub fn with_policy(policy: PlacementPolicy) -> Self {
        Self {
            policy,
            worker: None,
        }
    }

    /// Starts monitoring the given process on a background thread and returns immediately.
    ///
    /// Returns `false` without doing anything if this spreader is already active. A refresh
    /// interval below [`MIN_REFRESH_INTERVAL`] substitutes [`DEFAULT_REFRESH_INTERVAL`].
    ///
    /// The completion channel receives a [`SessionOutcome`] exactly once, when the session
    /// reaches a terminal state - whether by cancellation, target exit or fatal error.
    pub fn start_async(
        &mut self,
        pid: ProcessId,
        refresh_interval: Duration,
        completion: oneshot::Sender<SessionOutcome>,
    ) -> bool {
        if self.is_active() {
            return false;
        }

        let refresh_interval = if refresh_interval >= MIN_REFRESH_INTERVAL {
            refresh_interval
        } else {
            DEFAULT_REFRESH_INTERVAL
        };

        let policy = self.policy;
        let (cancel_tx, cancel_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name(format!("group-spread-{pid}"))
            .spawn(move || {
                info!("monitoring process {pid}");

                let platform = PlatformFacade::target();
                let outcome = match SessionContext::establish(&platform, pid) {
                    Ok(session) => {
                        Reconciler::new(platform, session, policy, refresh_interval, cancel_rx)
                            .run()
                    }
                    Err(error) => SessionOutcome::Aborted(error),
                };

                // The receiver may be gone; the session outcome is then only of interest to
                // the logs.
                let _ = completion.send(outcome);
            })
            .expect("spawning the reconciliation thread failed; the process is out of resources");

        self.worker = Some(Worker {
            cancel: cancel_tx,
            handle,
        });

        true
    }

    /// Stops the active session, blocking until the background thread has fully exited.
    ///
    /// After this returns, no further state mutation or OS affinity call can occur. Returns
    /// `false` without blocking if no session is active; calling it twice is safe.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };

        // The loop may have terminated on its own already, leaving no receiver; that is fine,
        // the join below still reaps the thread either way.
        let _ = worker.cancel.send(());

        worker
            .handle
            .join()
            .expect("reconciliation thread panicked");

        true
    }

    /// Whether a background session currently exists for this spreader.
    ///
    /// A session that terminated on its own (for example because the target exited) still
    /// counts as active until [`stop`][Self::stop] reaps it.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl Default for GroupSpreader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GroupSpreader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests run against the real platform. The target never exists (the identifier is
    // above the pid range every supported platform hands out), so sessions abort quickly with
    // a session error - which is exactly what lifecycle tests need: a terminal state without
    // a cooperative target process.
    const VANISHED_PID: ProcessId = 4_999_999;

    #[test]
    fn start_returns_false_when_already_active() {
        let mut spreader = GroupSpreader::new();
        let (first_tx, first_rx) = oneshot::channel();

        assert!(spreader.start_async(VANISHED_PID, Duration::from_millis(200), first_tx));

        let (second_tx, _second_rx) = oneshot::channel();
        assert!(!spreader.start_async(VANISHED_PID, Duration::from_millis(200), second_tx));

        spreader.stop();
        drop(first_rx);
    }

    #[test]
    fn stop_is_a_no_op_when_inactive() {
        let mut spreader = GroupSpreader::new();

        assert!(!spreader.stop());
        assert!(!spreader.is_active());
    }

    #[test]
    fn stop_reaps_the_session_and_is_idempotent() {
        let mut spreader = GroupSpreader::new();
        let (completion_tx, completion_rx) = oneshot::channel();

        spreader.start_async(VANISHED_PID, Duration::from_millis(200), completion_tx);
        assert!(spreader.is_active());

        assert!(spreader.stop());
        assert!(!spreader.is_active());
        assert!(!spreader.stop());

        // The completion channel fired exactly once with a terminal outcome.
        assert!(completion_rx.recv().is_ok());
    }

    #[test]
    fn completion_fires_even_when_the_session_aborts_immediately() {
        let mut spreader = GroupSpreader::new();
        let (completion_tx, completion_rx) = oneshot::channel();

        spreader.start_async(VANISHED_PID, Duration::from_millis(200), completion_tx);

        // The unqueryable target aborts the session without any stop() call.
        let outcome = completion_rx.recv().unwrap();
        assert!(matches!(outcome, SessionOutcome::Aborted(_)));

        // The spreader still considers the unit active until it is reaped.
        assert!(spreader.is_active());
        assert!(spreader.stop());
    }

    #[test]
    fn restarting_after_stop_is_allowed() {
        let mut spreader = GroupSpreader::new();

        let (first_tx, _first_rx) = oneshot::channel();
        spreader.start_async(VANISHED_PID, Duration::from_millis(200), first_tx);
        spreader.stop();

        let (second_tx, _second_rx) = oneshot::channel();
        assert!(spreader.start_async(VANISHED_PID, Duration::from_millis(200), second_tx));
        spreader.stop();
    }

    #[test]
    fn dropping_an_active_spreader_stops_it() {
        let (completion_tx, completion_rx) = oneshot::channel();

        {
            let mut spreader = GroupSpreader::new();
            spreader.start_async(VANISHED_PID, Duration::from_millis(200), completion_tx);
        }

        // Drop joined the background thread, so the outcome must already be available.
        assert!(completion_rx.try_recv().is_ok());
    }
}
