use tracing::{info, warn};

use crate::pal::{Platform, PlatformFacade};
use crate::primitive_types::{ProcessId, ProcessorGroupIndex};
use crate::topology::SessionTopology;
use crate::{EnumerationError, SessionError};

/// Everything about a monitoring session that is fixed at establishment time: the target, the
/// machine's group layout and the group new threads belong to by default.
///
/// Owned exclusively by one reconciliation loop; nothing mutates it after establishment.
#[derive(Debug)]
pub(crate) struct SessionContext {
    pid: ProcessId,
    default_group: ProcessorGroupIndex,
    topology: SessionTopology,
}

impl SessionContext {
    /// Reads the topology and fixes the target's default group.
    ///
    /// The default group is the group the target's threads already occupy when monitoring
    /// begins. A target that already spans multiple groups is not corrected; its first
    /// reported group becomes the default and the situation is surfaced as a warning.
    pub(crate) fn establish(
        platform: &PlatformFacade,
        pid: ProcessId,
    ) -> Result<Self, SessionError> {
        let topology = SessionTopology::from_platform(platform)?;

        let membership = platform.process_group_membership(pid)?;

        let Some(&default_group) = membership.first() else {
            // A live process always occupies at least one group.
            return Err(EnumerationError::TargetNotFound { pid }.into());
        };

        if membership.len() > 1 {
            warn!(
                "process {pid} is already multi-group ({membership:?}); existing placement \
                 will not be corrected"
            );
        }

        info!("process {pid} currently has threads on group(s) {membership:?}");

        Ok(Self {
            pid,
            default_group,
            topology,
        })
    }

    pub(crate) fn pid(&self) -> ProcessId {
        self.pid
    }

    pub(crate) fn default_group(&self) -> ProcessorGroupIndex {
        self.default_group
    }

    pub(crate) fn topology(&self) -> &SessionTopology {
        &self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopologyError;
    use crate::pal::MockPlatform;

    #[test]
    fn default_group_is_the_first_reported_group() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(|| vec![4, 4]);
        mock.expect_process_group_membership()
            .returning(|_| Ok(vec![1, 0]));

        let session = SessionContext::establish(&PlatformFacade::from_mock(mock), 42).unwrap();

        assert_eq!(session.pid(), 42);
        assert_eq!(session.default_group(), 1);
        assert_eq!(session.topology().group_count(), 2);
    }

    #[test]
    fn insufficient_groups_aborts_establishment() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts().returning(|| vec![8]);

        let result = SessionContext::establish(&PlatformFacade::from_mock(mock), 42);

        assert!(matches!(
            result,
            Err(SessionError::Topology(TopologyError::InsufficientGroups {
                active_groups: 1
            }))
        ));
    }

    #[test]
    fn unqueryable_target_aborts_establishment() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(|| vec![4, 4]);
        mock.expect_process_group_membership()
            .returning(|pid| Err(EnumerationError::TargetNotFound { pid }));

        let result = SessionContext::establish(&PlatformFacade::from_mock(mock), 42);

        assert!(matches!(
            result,
            Err(SessionError::Enumeration(
                EnumerationError::TargetNotFound { pid: 42 }
            ))
        ));
    }

    #[test]
    fn empty_membership_is_target_not_found() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(|| vec![4, 4]);
        mock.expect_process_group_membership()
            .returning(|_| Ok(Vec::new()));

        let result = SessionContext::establish(&PlatformFacade::from_mock(mock), 42);

        assert!(matches!(
            result,
            Err(SessionError::Enumeration(
                EnumerationError::TargetNotFound { pid: 42 }
            ))
        ));
    }
}
