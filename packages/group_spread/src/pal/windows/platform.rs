use std::io;

use windows::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
    TH32CS_SNAPTHREAD, THREADENTRY32, Thread32First, Thread32Next,
};
use windows::Win32::System::SystemInformation::{
    GROUP_AFFINITY, GetActiveProcessorCount, GetActiveProcessorGroupCount,
};
use windows::Win32::System::Threading::{
    GetProcessGroupAffinity, OpenProcess, OpenThread, PROCESS_QUERY_LIMITED_INFORMATION,
    SetThreadGroupAffinity, THREAD_QUERY_INFORMATION, THREAD_SET_INFORMATION,
};

use crate::pal::{OwnedHandle, Platform};
use crate::{ApplyError, EnumerationError, ProcessId, ProcessorGroupIndex, ThreadId};

/// Windows platform implementation.
///
/// Windows is the platform the processor-group concept comes from, so the mapping is direct:
/// active groups and their processor counts come from the system information APIs, thread
/// enumeration goes through Toolhelp32 snapshots and placement through
/// `SetThreadGroupAffinity`.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn group_processor_counts(&self) -> Vec<usize> {
        // SAFETY: No safety requirements.
        let group_count = unsafe { GetActiveProcessorGroupCount() };

        (0..group_count)
            .map(|group| {
                // SAFETY: No safety requirements.
                let count = unsafe { GetActiveProcessorCount(group) };
                count as usize
            })
            .collect()
    }

    fn process_group_membership(
        &self,
        pid: ProcessId,
    ) -> Result<Vec<ProcessorGroupIndex>, EnumerationError> {
        // SAFETY: No safety requirements; pid validity is checked by the call itself.
        let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }
            .map_err(|_| EnumerationError::TargetNotFound { pid })?;
        let process = OwnedHandle::new(process);

        // Size query form: a zero-length buffer makes the call report the required entry
        // count via ERROR_INSUFFICIENT_BUFFER. Any other outcome means the process cannot
        // be queried.
        let mut group_count: u16 = 0;
        // SAFETY: A null group array with a zero count is the documented size query form.
        let size_query = unsafe {
            GetProcessGroupAffinity(process.get(), &mut group_count, std::ptr::null_mut())
        };

        match size_query {
            Ok(()) => return Err(EnumerationError::TargetNotFound { pid }),
            Err(error) if error.code() != ERROR_INSUFFICIENT_BUFFER.to_hresult() => {
                return Err(EnumerationError::TargetNotFound { pid });
            }
            Err(_) => {}
        }

        let mut groups = vec![0_u16; usize::from(group_count)];
        // SAFETY: The buffer holds the entry count the size query just reported.
        unsafe { GetProcessGroupAffinity(process.get(), &mut group_count, groups.as_mut_ptr()) }
            .map_err(|_| EnumerationError::TargetNotFound { pid })?;

        groups.truncate(usize::from(group_count));
        Ok(groups)
    }

    fn process_thread_ids(&self, pid: ProcessId) -> Result<Vec<ThreadId>, EnumerationError> {
        // SAFETY: No safety requirements.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) }.map_err(
            |error| EnumerationError::SnapshotUnavailable {
                pid,
                source: io::Error::other(error),
            },
        )?;
        let snapshot = OwnedHandle::new(snapshot);

        #[expect(
            clippy::cast_possible_truncation,
            reason = "struct sizes are far below u32::MAX"
        )]
        let entry_size = size_of::<THREADENTRY32>() as u32;
        let mut entry = THREADENTRY32 {
            dwSize: entry_size,
            ..Default::default()
        };

        // SAFETY: The entry's dwSize field is initialized as the iteration protocol requires.
        unsafe { Thread32First(snapshot.get(), &mut entry) }.map_err(|error| {
            EnumerationError::SnapshotUnavailable {
                pid,
                source: io::Error::other(error),
            }
        })?;

        // The snapshot is system-wide; filtering by owner yields the target's threads. An
        // exited target simply yields an empty set.
        let mut thread_ids = Vec::new();

        loop {
            if entry.th32OwnerProcessID == pid {
                thread_ids.push(entry.th32ThreadID);
            }

            // SAFETY: Continuing iteration over the snapshot this entry came from.
            if unsafe { Thread32Next(snapshot.get(), &mut entry) }.is_err() {
                break;
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
        // SAFETY: No safety requirements; thread validity is checked by the call itself.
        let thread = unsafe {
            OpenThread(
                THREAD_SET_INFORMATION | THREAD_QUERY_INFORMATION,
                false,
                thread_id,
            )
        }
        .map_err(|error| ApplyError::AccessDenied {
            thread_id,
            source: io::Error::other(error),
        })?;
        let thread = OwnedHandle::new(thread);

        let affinity = GROUP_AFFINITY {
            Mask: mask,
            Group: group,
            Reserved: [0; 3],
        };

        // SAFETY: We pass a fully initialized GROUP_AFFINITY; the previous-affinity output
        // is optional and not requested.
        unsafe { SetThreadGroupAffinity(thread.get(), &affinity, None) }.map_err(|error| {
            ApplyError::AffinityRejected {
                thread_id,
                source: io::Error::other(error),
            }
        })
    }

    fn process_ids_by_name(&self, name: &str) -> Vec<ProcessId> {
        // SAFETY: No safety requirements.
        let Ok(snapshot) = (unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }) else {
            return Vec::new();
        };
        let snapshot = OwnedHandle::new(snapshot);

        #[expect(
            clippy::cast_possible_truncation,
            reason = "struct sizes are far below u32::MAX"
        )]
        let entry_size = size_of::<PROCESSENTRY32W>() as u32;
        let mut entry = PROCESSENTRY32W {
            dwSize: entry_size,
            ..Default::default()
        };

        // SAFETY: The entry's dwSize field is initialized as the iteration protocol requires.
        if unsafe { Process32FirstW(snapshot.get(), &mut entry) }.is_err() {
            return Vec::new();
        }

        let mut pids = Vec::new();

        loop {
            let exe_file_len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            let exe_file = String::from_utf16_lossy(
                entry
                    .szExeFile
                    .get(..exe_file_len)
                    .unwrap_or(&entry.szExeFile),
            );

            if exe_file.eq_ignore_ascii_case(name) {
                pids.push(entry.th32ProcessID);
            }

            // SAFETY: Continuing iteration over the snapshot this entry came from.
            if unsafe { Process32NextW(snapshot.get(), &mut entry) }.is_err() {
                break;
            }
        }

        pids.sort_unstable();
        pids
    }
}
