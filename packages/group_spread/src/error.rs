use thiserror::Error;

use crate::{ProcessId, ThreadId};

/// Errors that can occur when inspecting the machine's processor group topology.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopologyError {
    /// Fewer than two processor groups are active, so there is nothing to spread threads
    /// across. A monitoring session must abort immediately when this is reported.
    #[error("only {active_groups} processor group(s) are active - nothing to do")]
    InsufficientGroups {
        /// Number of active processor groups reported by the operating system.
        active_groups: usize,
    },
}

/// Errors that can occur when enumerating the target process or its threads.
///
/// All variants are fatal for the monitoring session that encounters them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnumerationError {
    /// The target process could not be queried at all. Typically the process does not exist
    /// or the caller lacks the rights to inspect it.
    #[error("process {pid} cannot be queried - it may not exist or access may be denied")]
    TargetNotFound {
        /// Identifier of the process that could not be queried.
        pid: ProcessId,
    },

    /// The thread enumeration mechanism could not be created or iterated.
    #[error("thread snapshot for process {pid} could not be created or iterated")]
    SnapshotUnavailable {
        /// Identifier of the process whose threads were being enumerated.
        pid: ProcessId,

        /// The underlying operating system error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when binding one thread to one processor group.
///
/// These are recovered locally: the affected thread is recorded as assigned to the default
/// group without any OS-level change and the reconciliation cycle continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApplyError {
    /// A handle to the thread with the required rights could not be acquired.
    #[error("no access to thread {thread_id}")]
    AccessDenied {
        /// Identifier of the thread that could not be opened.
        thread_id: ThreadId,

        /// The underlying operating system error.
        #[source]
        source: std::io::Error,
    },

    /// The operating system rejected the group affinity change. The most common cause is the
    /// thread terminating between enumeration and this call.
    #[error("setting group affinity of thread {thread_id} was rejected (terminated too quick?)")]
    AffinityRejected {
        /// Identifier of the thread whose affinity could not be set.
        thread_id: ThreadId,

        /// The underlying operating system error.
        #[source]
        source: std::io::Error,
    },
}

/// A fatal error that aborted a monitoring session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The machine's topology made the session impossible.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The target process or its threads could not be enumerated.
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(TopologyError: Send, Sync, Debug);
    assert_impl_all!(EnumerationError: Send, Sync, Debug);
    assert_impl_all!(ApplyError: Send, Sync, Debug);
    assert_impl_all!(SessionError: Send, Sync, Debug);

    #[test]
    fn session_error_wraps_both_fatal_domains() {
        let from_topology = SessionError::from(TopologyError::InsufficientGroups {
            active_groups: 1,
        });
        assert!(matches!(from_topology, SessionError::Topology(_)));

        let from_enumeration = SessionError::from(EnumerationError::TargetNotFound { pid: 1234 });
        assert!(matches!(from_enumeration, SessionError::Enumeration(_)));
    }

    #[test]
    fn messages_name_the_subject() {
        let error = EnumerationError::TargetNotFound { pid: 4242 };
        assert!(error.to_string().contains("4242"));

        let error = ApplyError::AccessDenied {
            thread_id: 77,
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(error.to_string().contains("77"));
    }
}
