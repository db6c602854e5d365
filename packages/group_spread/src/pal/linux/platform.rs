use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::OnceLock;
use std::{fs, io, mem};

use crate::pal::Platform;
use crate::pal::linux::{last_processor_from_stat, thread_id_from_task_entry};
use crate::{ApplyError, EnumerationError, ProcessId, ProcessorGroupIndex, ThreadId};

/// Linux platform implementation.
///
/// Linux does not partition processors into scheduling-mask groups the way Windows does, so the
/// processor-group concept is realized as NUMA nodes: each node with processors becomes one
/// group, in the order the nodes appear in `/sys/devices/system/node/online`. Hosts without a
/// NUMA sysfs tree (or with a single node) report one group, which callers turn into an
/// "insufficient groups" session abort.
///
/// Thread enumeration and placement go through procfs: `/proc/<pid>/task` lists a process's
/// threads, each thread's stat file reports the processor it last executed on, and
/// `sched_setaffinity` binds a thread to the processors of its assigned group.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    /// Online processors of each group, resolved once per process on first use.
    /// Node identifiers may have gaps (memory-only nodes carry no processors and are skipped),
    /// so group indexes are positions in this vector, not raw node identifiers.
    node_processors: OnceLock<Vec<Vec<u32>>>,
}

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform::new();

impl BuildTargetPlatform {
    pub(crate) const fn new() -> Self {
        Self {
            node_processors: OnceLock::new(),
        }
    }

    fn node_processors(&self) -> &[Vec<u32>] {
        self.node_processors.get_or_init(|| {
            read_node_processors().unwrap_or_else(|| {
                // No NUMA sysfs tree - the whole machine is a single group.
                let processor_count = std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1);

                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "unrealistic to have more than u32::MAX processors"
                )]
                let processor_count = processor_count as u32;

                vec![(0..processor_count).collect()]
            })
        })
    }

    fn group_of_processor(&self, processor: u32) -> Option<ProcessorGroupIndex> {
        self.node_processors()
            .iter()
            .position(|processors| processors.contains(&processor))
            .map(|index| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "group counts are far below u16::MAX on any real machine"
                )]
                let index = index as ProcessorGroupIndex;
                index
            })
    }
}

fn read_node_processors() -> Option<Vec<Vec<u32>>> {
    let online = fs::read_to_string("/sys/devices/system/node/online").ok()?;
    let nodes = cpulist::parse(online.trim()).ok()?;

    let mut result = Vec::with_capacity(nodes.len());

    for node in nodes {
        let contents =
            fs::read_to_string(format!("/sys/devices/system/node/node{node}/cpulist")).ok()?;
        let processors = cpulist::parse(contents.trim()).ok()?;

        // Memory-only nodes (e.g. CXL expanders) have no processors and are not groups.
        if !processors.is_empty() {
            result.push(processors);
        }
    }

    if result.is_empty() { None } else { Some(result) }
}

impl Platform for BuildTargetPlatform {
    fn group_processor_counts(&self) -> Vec<usize> {
        self.node_processors()
            .iter()
            .map(Vec::len)
            .collect()
    }

    fn process_group_membership(
        &self,
        pid: ProcessId,
    ) -> Result<Vec<ProcessorGroupIndex>, EnumerationError> {
        let task_dir = format!("/proc/{pid}/task");
        let entries =
            fs::read_dir(task_dir).map_err(|_| EnumerationError::TargetNotFound { pid })?;

        let mut groups = BTreeSet::new();

        for entry in entries.flatten() {
            let Some(thread_id) = thread_id_from_task_entry(&entry.file_name().to_string_lossy())
            else {
                continue;
            };

            // Threads may vanish between the directory listing and this read; skip them.
            let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/task/{thread_id}/stat")) else {
                continue;
            };

            if let Some(group) = last_processor_from_stat(&stat).and_then(|p| self.group_of_processor(p))
            {
                groups.insert(group);
            }
        }

        // A live process always has at least one schedulable thread.
        if groups.is_empty() {
            return Err(EnumerationError::TargetNotFound { pid });
        }

        Ok(groups.into_iter().collect())
    }

    fn process_thread_ids(&self, pid: ProcessId) -> Result<Vec<ThreadId>, EnumerationError> {
        let entries = match fs::read_dir(format!("/proc/{pid}/task")) {
            Ok(entries) => entries,
            // A vanished task directory means the target exited; that is an empty snapshot,
            // not an enumeration failure.
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(EnumerationError::SnapshotUnavailable { pid, source: error });
            }
        };

        let mut thread_ids = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    return Err(EnumerationError::SnapshotUnavailable { pid, source: error });
                }
            };

            if let Some(thread_id) = thread_id_from_task_entry(&entry.file_name().to_string_lossy())
            {
                thread_ids.push(thread_id);
            }
        }

        Ok(thread_ids)
    }

    fn set_thread_group_affinity(
        &self,
        thread_id: ThreadId,
        group: ProcessorGroupIndex,
        mask: usize,
    ) -> Result<(), ApplyError> {
        let processors = self
            .node_processors()
            .get(usize::from(group))
            .expect("group index comes from the session topology and is always in range");

        // A group wider than the mask word can only be addressed by its saturated full mask.
        let saturated = processors.len() >= usize::BITS as usize && mask == usize::MAX;

        // SAFETY: An all-zeroes cpu_set_t is a valid empty set.
        let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };

        for (bit, &processor) in processors.iter().enumerate() {
            let selected =
                saturated || (bit < usize::BITS as usize && mask & (1_usize << bit) != 0);

            if selected && (processor as usize) < libc::CPU_SETSIZE as usize {
                // SAFETY: The index is below CPU_SETSIZE, so CPU_SET writes within the set.
                unsafe { libc::CPU_SET(processor as usize, &mut cpu_set) };
            }
        }

        // SAFETY: We pass a valid cpu_set_t together with its true size.
        let result = unsafe {
            libc::sched_setaffinity(
                thread_id as libc::pid_t,
                size_of::<libc::cpu_set_t>(),
                &raw const cpu_set,
            )
        };

        if result == 0 {
            return Ok(());
        }

        let source = io::Error::last_os_error();
        match source.raw_os_error() {
            Some(libc::EPERM | libc::EACCES) => Err(ApplyError::AccessDenied { thread_id, source }),
            _ => Err(ApplyError::AffinityRejected { thread_id, source }),
        }
    }

    fn process_ids_by_name(&self, name: &str) -> Vec<ProcessId> {
        let Ok(entries) = fs::read_dir("/proc") else {
            return Vec::new();
        };

        let mut pids: Vec<ProcessId> = entries
            .flatten()
            .filter_map(|entry| {
                let pid: ProcessId = entry.file_name().to_string_lossy().parse().ok()?;

                let comm = fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;

                comm.trim().eq_ignore_ascii_case(name).then_some(pid)
            })
            .collect();

        pids.sort_unstable();
        pids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests run against the real procfs/sysfs of the machine executing them. Whenever
    // possible we prefer the real platform over mocks for maximum realism.

    #[test]
    fn reports_at_least_one_group_with_processors() {
        let counts = BUILD_TARGET_PLATFORM.group_processor_counts();
        assert!(!counts.is_empty());
        assert!(counts.iter().all(|&count| count >= 1));
    }

    #[test]
    fn own_process_has_threads() {
        let thread_ids = BUILD_TARGET_PLATFORM
            .process_thread_ids(std::process::id())
            .unwrap();

        assert!(!thread_ids.is_empty());
    }

    #[test]
    fn own_process_membership_is_within_topology() {
        let group_count = BUILD_TARGET_PLATFORM.group_processor_counts().len();
        let membership = BUILD_TARGET_PLATFORM
            .process_group_membership(std::process::id())
            .unwrap();

        assert!(!membership.is_empty());
        assert!(
            membership
                .iter()
                .all(|&group| usize::from(group) < group_count)
        );
    }

    // The kernel caps pid numbers at PID_MAX_LIMIT (4194304), so this identifier can never
    // name a live process or thread.
    const VANISHED_ID: u32 = 4_999_999;

    #[test]
    fn vanished_process_is_an_empty_snapshot() {
        let thread_ids = BUILD_TARGET_PLATFORM.process_thread_ids(VANISHED_ID).unwrap();
        assert!(thread_ids.is_empty());
    }

    #[test]
    fn vanished_process_has_no_membership() {
        let result = BUILD_TARGET_PLATFORM.process_group_membership(VANISHED_ID);
        assert!(matches!(
            result,
            Err(EnumerationError::TargetNotFound { pid: VANISHED_ID })
        ));
    }

    #[test]
    fn affinity_for_vanished_thread_is_rejected() {
        let result = BUILD_TARGET_PLATFORM.set_thread_group_affinity(VANISHED_ID, 0, 1);
        assert!(matches!(
            result,
            Err(ApplyError::AffinityRejected { .. })
        ));
    }

    #[test]
    fn own_name_resolves_to_own_pid() {
        let comm = fs::read_to_string("/proc/self/comm").unwrap();
        let pids = BUILD_TARGET_PLATFORM.process_ids_by_name(comm.trim());

        assert!(pids.contains(&std::process::id()));
    }
}
