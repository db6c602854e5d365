/// Identifies a running process.
///
/// This will match the numeric identifier used by standard tooling of the operating system.
pub type ProcessId = u32;

/// Identifies a thread of a running process.
///
/// This will match the numeric identifier used by standard tooling of the operating system.
/// Identifiers may be reused by the operating system after a thread terminates.
pub type ThreadId = u32;

/// Identifies a processor group.
///
/// Processor groups are partitions of the machine's logical processors, each small enough to be
/// addressed by a single scheduling affinity mask. Group indexes are assigned by the operating
/// system, starting from zero, and are stable for the lifetime of a monitoring session.
pub type ProcessorGroupIndex = u16;
