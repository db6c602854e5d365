use std::fmt::Debug;

use crate::{ApplyError, EnumerationError, ProcessId, ProcessorGroupIndex, ThreadId};

/// The operating system surface the reconciliation engine runs against.
///
/// One implementation exists per supported build target, plus a mock for testing. Methods map
/// to thin operations of the underlying platform; policy belongs to the layers above.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Number of processors in each active processor group, indexed by group.
    ///
    /// The returned vector has one entry per active group and is never empty.
    fn group_processor_counts(&self) -> Vec<usize>;

    /// The processor groups on which the given process currently has threads.
    ///
    /// The first reported group is used as the default group for a monitoring session.
    fn process_group_membership(
        &self,
        pid: ProcessId,
    ) -> Result<Vec<ProcessorGroupIndex>, EnumerationError>;

    /// Identifiers of every thread currently owned by the given process.
    ///
    /// An exited target is reported as an empty set, not as an error.
    ///
    /// The underlying enumeration mechanism misbehaves when exercised concurrently, even from
    /// logically independent callers - callers must hold the crate-wide enumeration lock.
    fn process_thread_ids(&self, pid: ProcessId) -> Result<Vec<ThreadId>, EnumerationError>;

    /// Binds one thread to the given mask within the given processor group.
    ///
    /// Acquires a handle to the thread with the rights needed to read and set its group
    /// affinity, applies the change, then releases the handle on every exit path.
    fn set_thread_group_affinity(
        &self,
        thread_id: ThreadId,
        group: ProcessorGroupIndex,
        mask: usize,
    ) -> Result<(), ApplyError>;

    /// Identifiers of every running process whose executable base name matches `name`,
    /// compared case-insensitively.
    fn process_ids_by_name(&self, name: &str) -> Vec<ProcessId>;
}
