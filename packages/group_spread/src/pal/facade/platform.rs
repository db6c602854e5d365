use std::fmt::Debug;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};
use crate::{ApplyError, EnumerationError, ProcessId, ProcessorGroupIndex, ThreadId};

/// Hide the real/mock platform choice behind a single type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Platform for PlatformFacade {
    fn group_processor_counts(&self) -> Vec<usize> {
        match self {
            Self::Target(p) => p.group_processor_counts(),
            #[cfg(test)]
            Self::Mock(p) => p.group_processor_counts(),
        }
    }

    fn process_group_membership(
        &self,
        pid: ProcessId,
    ) -> Result<Vec<ProcessorGroupIndex>, EnumerationError> {
        match self {
            Self::Target(p) => p.process_group_membership(pid),
            #[cfg(test)]
            Self::Mock(p) => p.process_group_membership(pid),
        }
    }

    fn process_thread_ids(&self, pid: ProcessId) -> Result<Vec<ThreadId>, EnumerationError> {
        match self {
            Self::Target(p) => p.process_thread_ids(pid),
            #[cfg(test)]
            Self::Mock(p) => p.process_thread_ids(pid),
        }
    }

    fn set_thread_group_affinity(
        &self,
        thread_id: ThreadId,
        group: ProcessorGroupIndex,
        mask: usize,
    ) -> Result<(), ApplyError> {
        match self {
            Self::Target(p) => p.set_thread_group_affinity(thread_id, group, mask),
            #[cfg(test)]
            Self::Mock(p) => p.set_thread_group_affinity(thread_id, group, mask),
        }
    }

    fn process_ids_by_name(&self, name: &str) -> Vec<ProcessId> {
        match self {
            Self::Target(p) => p.process_ids_by_name(name),
            #[cfg(test)]
            Self::Mock(p) => p.process_ids_by_name(name),
        }
    }
}

impl From<&'static BuildTargetPlatform> for PlatformFacade {
    fn from(p: &'static BuildTargetPlatform) -> Self {
        Self::Target(p)
    }
}

#[cfg(test)]
impl From<MockPlatform> for PlatformFacade {
    fn from(p: MockPlatform) -> Self {
        Self::Mock(Arc::new(p))
    }
}

impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}
