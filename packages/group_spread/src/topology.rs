use crate::TopologyError;
use crate::pal::{Platform, PlatformFacade};
use crate::primitive_types::ProcessorGroupIndex;

/// Immutable description of one active processor group.
///
/// Descriptors are read from the operating system once per monitoring session and never change
/// afterwards; runtime topology changes are picked up by the next session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupDescriptor {
    index: ProcessorGroupIndex,
    processor_count: usize,
    full_mask: usize,
}

impl GroupDescriptor {
    /// The group's index, as assigned by the operating system.
    #[must_use]
    pub fn index(&self) -> ProcessorGroupIndex {
        self.index
    }

    /// Number of active processors in this group.
    ///
    /// This is also the group's thread capacity for placement purposes: one managed thread per
    /// processor before a group counts as full.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.processor_count
    }

    /// Affinity mask selecting every processor of this group: the low N bits set for an
    /// N-processor group.
    #[must_use]
    pub fn full_mask(&self) -> usize {
        self.full_mask
    }
}

/// The machine's processor group layout: how many groups are active and how many processors
/// each one carries.
///
/// # Example
///
/// ```no_run
/// use group_spread::SessionTopology;
///
/// let topology = SessionTopology::current()?;
///
/// for group in topology.groups() {
///     println!(
///         "group {} has {} processors",
///         group.index(),
///         group.processor_count()
///     );
/// }
/// # Ok::<(), group_spread::TopologyError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SessionTopology {
    groups: Vec<GroupDescriptor>,
}

impl SessionTopology {
    /// Reads the processor group layout of the current machine.
    ///
    /// # Errors
    ///
    /// [`TopologyError::InsufficientGroups`] when fewer than two groups are active - with a
    /// single group there is nothing to spread threads across and a monitoring session must
    /// not be started.
    pub fn current() -> Result<Self, TopologyError> {
        Self::from_platform(&PlatformFacade::target())
    }

    pub(crate) fn from_platform(platform: &PlatformFacade) -> Result<Self, TopologyError> {
        let processor_counts = platform.group_processor_counts();

        if processor_counts.len() < 2 {
            return Err(TopologyError::InsufficientGroups {
                active_groups: processor_counts.len(),
            });
        }

        let groups = processor_counts
            .into_iter()
            .enumerate()
            .map(|(index, processor_count)| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "the operating system reports group indexes as u16"
                )]
                let index = index as ProcessorGroupIndex;

                GroupDescriptor {
                    index,
                    processor_count,
                    full_mask: full_capacity_mask(processor_count),
                }
            })
            .collect();

        Ok(Self { groups })
    }

    /// Number of active processor groups. Always at least two.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The active groups, in ascending index order.
    #[must_use]
    pub fn groups(&self) -> &[GroupDescriptor] {
        &self.groups
    }

    pub(crate) fn descriptor(&self, group: ProcessorGroupIndex) -> &GroupDescriptor {
        self.groups
            .get(usize::from(group))
            .expect("group indexes handed out by this topology are always in range")
    }

    pub(crate) fn capacity_of(&self, group: ProcessorGroupIndex) -> usize {
        self.descriptor(group).processor_count
    }

    pub(crate) fn full_mask_of(&self, group: ProcessorGroupIndex) -> usize {
        self.descriptor(group).full_mask
    }
}

/// Builds the affinity mask with the low `processor_count` bits set.
///
/// Groups as wide as the mask word saturate to the all-ones mask.
fn full_capacity_mask(processor_count: usize) -> usize {
    if processor_count >= usize::BITS as usize {
        usize::MAX
    } else {
        (1_usize << processor_count) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::MockPlatform;

    #[test]
    fn two_groups_are_read_in_index_order() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(|| vec![4, 8]);

        let topology = SessionTopology::from_platform(&PlatformFacade::from_mock(mock)).unwrap();

        assert_eq!(topology.group_count(), 2);

        let groups = topology.groups();
        assert_eq!(groups[0].index(), 0);
        assert_eq!(groups[0].processor_count(), 4);
        assert_eq!(groups[0].full_mask(), 0b1111);
        assert_eq!(groups[1].index(), 1);
        assert_eq!(groups[1].processor_count(), 8);
        assert_eq!(groups[1].full_mask(), 0b1111_1111);
    }

    #[test]
    fn single_group_is_insufficient() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts().returning(|| vec![64]);

        let result = SessionTopology::from_platform(&PlatformFacade::from_mock(mock));

        assert!(matches!(
            result,
            Err(TopologyError::InsufficientGroups { active_groups: 1 })
        ));
    }

    #[test]
    fn full_capacity_mask_sets_low_bits() {
        assert_eq!(full_capacity_mask(1), 0b1);
        assert_eq!(full_capacity_mask(4), 0b1111);
        assert_eq!(full_capacity_mask(63), usize::MAX >> 1);
        assert_eq!(full_capacity_mask(64), usize::MAX);
    }

    #[test]
    fn capacity_and_mask_lookups_follow_descriptors() {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(|| vec![2, 4, 64]);

        let topology = SessionTopology::from_platform(&PlatformFacade::from_mock(mock)).unwrap();

        assert_eq!(topology.capacity_of(1), 4);
        assert_eq!(topology.full_mask_of(2), usize::MAX);
    }
}
