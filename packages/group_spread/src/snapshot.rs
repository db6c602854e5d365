use std::sync::Mutex;

use foldhash::HashSet;

use crate::EnumerationError;
use crate::pal::{Platform, PlatformFacade};
use crate::primitive_types::{ProcessId, ThreadId};

/// Serializes thread enumeration across every engine instance in this process.
///
/// The underlying enumeration mechanism is documented to misbehave when exercised concurrently,
/// even though each call logically owns an independent snapshot. The lock is held only for the
/// duration of the enumeration call, never across assignment or apply logic.
static ENUMERATION_LOCK: Mutex<()> = Mutex::new(());

/// Produces the current set of thread identifiers owned by the given process.
///
/// An exited target is reported as an empty set; a snapshot that cannot be created or iterated
/// is an [`EnumerationError`] and fatal for the session observing it.
pub(crate) fn enumerate_threads(
    platform: &PlatformFacade,
    pid: ProcessId,
) -> Result<HashSet<ThreadId>, EnumerationError> {
    let _guard = ENUMERATION_LOCK
        .lock()
        .expect("enumeration lock is never poisoned: the guarded call does not panic");

    let thread_ids = platform.process_thread_ids(pid)?;

    Ok(thread_ids.into_iter().collect())
}
