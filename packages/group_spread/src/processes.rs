use crate::pal::{Platform, PlatformFacade};
use crate::primitive_types::ProcessId;

/// Resolves a process name to the identifiers of every running process with that executable
/// base name, compared case-insensitively. The result is in ascending identifier order and
/// empty when nothing matches.
///
/// # Example
///
/// ```no_run
/// let pids = group_spread::process_ids_by_name("notepad.exe");
///
/// for pid in pids {
///     println!("found instance {pid}");
/// }
/// ```
#[must_use]
pub fn process_ids_by_name(name: &str) -> Vec<ProcessId> {
    PlatformFacade::target().process_ids_by_name(name)
}
