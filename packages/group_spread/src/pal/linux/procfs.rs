//! Parsing helpers for the procfs/sysfs files the Linux platform reads. Pure functions, so the
//! adversarial corner cases of these file formats can be pinned down by tests without a real
//! filesystem behind them.

/// Extracts the "processor last executed on" field from one `/proc/<pid>/task/<tid>/stat` line.
///
/// The second field of a stat line is the command name wrapped in parentheses. The command name
/// itself may contain spaces and parentheses, so the line must be split at the *last* closing
/// parenthesis before counting fields. The processor field is field 39 of the documented
/// format, i.e. the 37th whitespace-separated token after the command name.
pub(crate) fn last_processor_from_stat(stat: &str) -> Option<u32> {
    let after_comm = stat.rsplit_once(')').map(|(_, rest)| rest)?;

    // Field 3 ("state") is the first token after the command name; field 39 is 36 tokens later.
    after_comm
        .split_whitespace()
        .nth(36)
        .and_then(|field| field.parse().ok())
}

/// Parses a thread directory name under `/proc/<pid>/task/` into a thread identifier.
///
/// Non-numeric entries are not thread directories and are reported as `None`.
pub(crate) fn thread_id_from_task_entry(name: &str) -> Option<u32> {
    name.parse().ok()
}
