use rand::Rng;

use crate::primitive_types::ProcessorGroupIndex;
use crate::session::SessionContext;
use crate::tracker::AssignmentState;

/// Strategy for choosing the processor group of a newly observed thread.
///
/// Both strategies always produce a valid group index for the session's topology; placement
/// never fails. The choice is consulted once per new thread, immediately before it is applied,
/// so occupancy reflects every earlier choice of the same cycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum PlacementPolicy {
    /// Fill the default group to capacity first, then spill into the remaining groups in
    /// ascending index order, picking the first with spare capacity. When every group is
    /// full, fall back to the default group - oversubscription is preferred over leaving a
    /// thread unmanaged.
    #[default]
    CapacityFirst,

    /// Pick a group uniformly at random, ignoring occupancy. Accepts oversubscription by
    /// design, trading determinism for a simpler, fairer long-run spread without
    /// pathological refill patterns.
    UniformRandom,
}

impl PlacementPolicy {
    /// Chooses the processor group for one newly observed thread.
    pub(crate) fn choose_group(
        self,
        state: &AssignmentState,
        session: &SessionContext,
    ) -> ProcessorGroupIndex {
        match self {
            Self::CapacityFirst => choose_capacity_first(state, session),
            Self::UniformRandom => choose_uniform_random(session),
        }
    }
}

fn choose_capacity_first(
    state: &AssignmentState,
    session: &SessionContext,
) -> ProcessorGroupIndex {
    let topology = session.topology();
    let default_group = session.default_group();

    // If there is room in the default group, use it, then spill into the others.
    if state.occupancy_of(default_group) < topology.capacity_of(default_group) {
        return default_group;
    }

    for group in topology.groups() {
        if group.index() == default_group {
            continue;
        }

        if state.occupancy_of(group.index()) < group.processor_count() {
            return group.index();
        }
    }

    // No group has spare capacity; oversubscribe the default group.
    default_group
}

fn choose_uniform_random(session: &SessionContext) -> ProcessorGroupIndex {
    let group_count = session.topology().group_count();

    let chosen = rand::rng().random_range(0..group_count);

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the operating system reports group indexes as u16"
    )]
    let chosen = chosen as ProcessorGroupIndex;
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::{MockPlatform, PlatformFacade};

    fn session(counts: Vec<usize>, default_membership: Vec<ProcessorGroupIndex>) -> SessionContext {
        let mut mock = MockPlatform::new();
        mock.expect_group_processor_counts()
            .returning(move || counts.clone());
        mock.expect_process_group_membership()
            .returning(move |_| Ok(default_membership.clone()));

        SessionContext::establish(&PlatformFacade::from_mock(mock), 1000).unwrap()
    }

    #[test]
    fn capacity_first_prefers_default_group_with_room() {
        let session = session(vec![4, 4], vec![0]);
        let state = AssignmentState::new(2);

        let chosen = PlacementPolicy::CapacityFirst.choose_group(&state, &session);

        assert_eq!(chosen, 0);
    }

    #[test]
    fn capacity_first_spills_to_lowest_group_with_spare_capacity() {
        // Default group full; group A partially filled, group B empty - the lowest-indexed
        // group with room must win, not the emptiest one.
        let session = session(vec![2, 4, 4], vec![0]);
        let mut state = AssignmentState::new(3);
        state.apply_addition(1, 0);
        state.apply_addition(2, 0);
        state.apply_addition(3, 1);
        state.apply_addition(4, 1);

        let chosen = PlacementPolicy::CapacityFirst.choose_group(&state, &session);

        assert_eq!(chosen, 1);
    }

    #[test]
    fn capacity_first_oversubscribes_default_when_everything_is_full() {
        let session = session(vec![1, 1], vec![0]);
        let mut state = AssignmentState::new(2);
        state.apply_addition(1, 0);
        state.apply_addition(2, 1);

        let chosen = PlacementPolicy::CapacityFirst.choose_group(&state, &session);

        assert_eq!(chosen, 0);
    }

    #[test]
    fn capacity_first_respects_a_nonzero_default_group() {
        let session = session(vec![4, 2], vec![1]);
        let state = AssignmentState::new(2);

        let chosen = PlacementPolicy::CapacityFirst.choose_group(&state, &session);

        assert_eq!(chosen, 1);
    }

    #[test]
    fn uniform_random_always_returns_a_valid_group() {
        let session = session(vec![4, 4, 4], vec![0]);
        let state = AssignmentState::new(3);

        for _ in 0..1000 {
            let chosen = PlacementPolicy::UniformRandom.choose_group(&state, &session);
            assert!(usize::from(chosen) < 3);
        }
    }

    #[test]
    fn uniform_random_spread_is_close_to_uniform() {
        let session = session(vec![4, 4, 4, 4], vec![0]);
        let state = AssignmentState::new(4);

        const TRIALS: usize = 8000;
        let mut counts = [0_usize; 4];

        for _ in 0..TRIALS {
            let chosen = PlacementPolicy::UniformRandom.choose_group(&state, &session);
            counts[usize::from(chosen)] += 1;
        }

        // Expected 2000 per group; 6.5 standard deviations of slack keeps this deterministic
        // in practice while still catching any meaningful bias.
        let expected = TRIALS / 4;
        let tolerance = 250;

        for (group, &count) in counts.iter().enumerate() {
            assert!(
                count.abs_diff(expected) < tolerance,
                "group {group} was chosen {count} times, expected about {expected}"
            );
        }
    }
}
