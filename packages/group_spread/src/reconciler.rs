use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use derive_more::Display;
use tracing::{debug, info, warn};

use crate::SessionError;
use crate::pal::{Platform, PlatformFacade};
use crate::policy::PlacementPolicy;
use crate::primitive_types::{ProcessorGroupIndex, ThreadId};
use crate::session::SessionContext;
use crate::snapshot::enumerate_threads;
use crate::tracker::AssignmentState;

/// How a monitoring session ended.
///
/// Delivered exactly once on the completion channel passed to
/// [`GroupSpreader::start_async`][crate::GroupSpreader::start_async], when the session reaches
/// a terminal state.
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum SessionOutcome {
    /// Every tracked thread disappeared from a snapshot: the target is presumed to have
    /// exited. This is a graceful stop, not an error.
    #[display("target process exited")]
    TargetExited,

    /// Cancellation was requested via [`GroupSpreader::stop`][crate::GroupSpreader::stop].
    #[display("cancelled")]
    Cancelled,

    /// A fatal error aborted the session.
    #[display("aborted: {_0}")]
    Aborted(SessionError),
}

/// Result of one reconciliation cycle that did not abort.
#[derive(Debug, Eq, PartialEq)]
enum CycleOutcome {
    Continue,
    TargetExited,
}

/// The reconciliation loop: enumerate, diff, assign, apply, log, repeat on a timer.
///
/// Owns all session state exclusively. The loop suspends only in the end-of-cycle wait on the
/// cancellation channel, with a timeout equal to the refresh interval - that wait doubles as
/// the refresh timer, so worst-case stop latency is one refresh interval plus any in-flight
/// cycle. A cycle, once started, always runs to completion.
#[derive(Debug)]
pub(crate) struct Reconciler {
    platform: PlatformFacade,
    session: SessionContext,
    state: AssignmentState,
    policy: PlacementPolicy,
    refresh_interval: Duration,
    cancel: Receiver<()>,
}

impl Reconciler {
    pub(crate) fn new(
        platform: PlatformFacade,
        session: SessionContext,
        policy: PlacementPolicy,
        refresh_interval: Duration,
        cancel: Receiver<()>,
    ) -> Self {
        let group_count = session.topology().group_count();

        Self {
            platform,
            session,
            state: AssignmentState::new(group_count),
            policy,
            refresh_interval,
            cancel,
        }
    }

    /// Runs cycles until a terminal state is reached and reports how the session ended.
    pub(crate) fn run(mut self) -> SessionOutcome {
        loop {
            match self.run_cycle() {
                Err(error) => {
                    warn!(
                        "session for process {} aborted: {error}",
                        self.session.pid()
                    );
                    return SessionOutcome::Aborted(error);
                }
                Ok(CycleOutcome::TargetExited) => {
                    info!(
                        "no threads of process {} left to manage, stopping",
                        self.session.pid()
                    );
                    return SessionOutcome::TargetExited;
                }
                Ok(CycleOutcome::Continue) => {}
            }

            // The sole suspension point: wait out the refresh interval unless cancelled first.
            // A dropped sender counts as cancellation - the controller is gone.
            match self.cancel.recv_timeout(self.refresh_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("session for process {} cancelled", self.session.pid());
                    return SessionOutcome::Cancelled;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    /// One full reconciliation cycle: enumerate, diff, assign, apply, commit, log.
    fn run_cycle(&mut self) -> Result<CycleOutcome, SessionError> {
        let snapshot = enumerate_threads(&self.platform, self.session.pid())?;

        let delta = self.state.diff(&snapshot);
        let changed = !delta.is_empty();

        for &thread_id in &delta.removed {
            if let Some(group) = self.state.apply_removal(thread_id) {
                info!("thread {thread_id} terminated on group {group}");
            }
        }

        for thread_id in delta.added {
            let chosen = self.policy.choose_group(&self.state, &self.session);
            let group = self.apply_to_thread(thread_id, chosen);

            self.state.apply_addition(thread_id, group);
            info!("thread {thread_id} found, group {group}");
        }

        if changed {
            info!("managing {} threads", self.state.tracked_count());
            for (group, count) in self.state.occupancy().iter().enumerate() {
                info!("group {group} has {count} threads");
            }
        } else {
            debug!("managing {} threads", self.state.tracked_count());
        }

        if self.state.is_empty() {
            return Ok(CycleOutcome::TargetExited);
        }

        Ok(CycleOutcome::Continue)
    }

    /// Binds a newly observed thread to its chosen group and reports the group actually
    /// committed.
    ///
    /// Threads chosen for the default group get no OS call - they are presumed to already be
    /// scheduled there acceptably. Either recoverable apply failure likewise leaves the thread
    /// in the default group, with a warning.
    fn apply_to_thread(
        &self,
        thread_id: ThreadId,
        chosen: ProcessorGroupIndex,
    ) -> ProcessorGroupIndex {
        let default_group = self.session.default_group();

        if chosen == default_group {
            debug!("leaving thread {thread_id} in default group {default_group}");
            return default_group;
        }

        let mask = self.session.topology().full_mask_of(chosen);

        match self
            .platform
            .set_thread_group_affinity(thread_id, chosen, mask)
        {
            Ok(()) => chosen,
            Err(error) => {
                warn!("{error} - leaving thread {thread_id} in default group {default_group}");
                default_group
            }
        }
    }
}
