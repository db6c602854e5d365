use std::num::NonZeroUsize;
use std::sync::OnceLock;

use crate::pal::Platform;
use crate::{ApplyError, EnumerationError, ProcessId, ProcessorGroupIndex, ThreadId};

/// Fallback platform implementation for operating systems without native support.
///
/// Unsupported platforms report all their processors as a single processor group. Sessions on
/// such platforms abort with `TopologyError::InsufficientGroups` before touching any other
/// platform operation, which is the honest outcome: without a group partition there is nothing
/// for this crate to do. The remaining methods exist so the code compiles and degrades
/// gracefully rather than failing the build.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

static PROCESSOR_COUNT: OnceLock<usize> = OnceLock::new();

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

impl BuildTargetPlatform {
    #[expect(clippy::unused_self, reason = "matches Platform trait signature")]
    fn processor_count(&self) -> usize {
        *PROCESSOR_COUNT.get_or_init(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

impl Platform for BuildTargetPlatform {
    fn group_processor_counts(&self) -> Vec<usize> {
        vec![self.processor_count()]
    }

    fn process_group_membership(
        &self,
        _pid: ProcessId,
    ) -> Result<Vec<ProcessorGroupIndex>, EnumerationError> {
        // Every process lives in the single simulated group.
        Ok(vec![0])
    }

    fn process_thread_ids(&self, _pid: ProcessId) -> Result<Vec<ThreadId>, EnumerationError> {
        // Unreachable in practice - the single-group topology aborts the session first.
        Ok(Vec::new())
    }

    fn set_thread_group_affinity(
        &self,
        _thread_id: ThreadId,
        _group: ProcessorGroupIndex,
        _mask: usize,
    ) -> Result<(), ApplyError> {
        // Pretend to succeed without actual OS-level affinity changes.
        Ok(())
    }

    fn process_ids_by_name(&self, _name: &str) -> Vec<ProcessId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_exactly_one_group() {
        let counts = BUILD_TARGET_PLATFORM.group_processor_counts();
        assert_eq!(counts.len(), 1);
        assert!(counts.first().is_some_and(|&count| count >= 1));
    }

    #[test]
    fn membership_is_group_zero() {
        let membership = BUILD_TARGET_PLATFORM
            .process_group_membership(1234)
            .unwrap();
        assert_eq!(membership, vec![0]);
    }

    #[test]
    fn affinity_application_is_a_no_op() {
        assert!(
            BUILD_TARGET_PLATFORM
                .set_thread_group_affinity(1, 0, 0b1111)
                .is_ok()
        );
    }
}
