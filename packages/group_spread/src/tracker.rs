use foldhash::{HashMap, HashSet};
use itertools::Itertools;

use crate::primitive_types::{ProcessorGroupIndex, ThreadId};

/// The difference between the tracked thread population and a fresh snapshot.
///
/// Both sets are in ascending thread-id order so every cycle processes threads
/// deterministically regardless of hash iteration order.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct SnapshotDelta {
    /// Tracked threads that are absent from the snapshot.
    pub(crate) removed: Vec<ThreadId>,

    /// Snapshot threads that are not yet tracked.
    pub(crate) added: Vec<ThreadId>,
}

impl SnapshotDelta {
    pub(crate) fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// The authoritative mapping of tracked thread to assigned processor group, with per-group
/// occupancy counts maintained alongside.
///
/// Invariant: `occupancy[g]` equals the number of assignments pointing at group `g`, for every
/// group, so the occupancy total always equals the number of tracked threads. The only
/// mutators are [`apply_addition`][Self::apply_addition] and
/// [`apply_removal`][Self::apply_removal]; both are applied from a single reconciliation cycle
/// at a time, so no addition ever observes a stale occupancy from a concurrent removal.
#[derive(Debug)]
pub(crate) struct AssignmentState {
    assignments: HashMap<ThreadId, ProcessorGroupIndex>,
    occupancy: Vec<usize>,
}

impl AssignmentState {
    /// Creates empty state covering `group_count` processor groups.
    pub(crate) fn new(group_count: usize) -> Self {
        Self {
            assignments: HashMap::default(),
            occupancy: vec![0; group_count],
        }
    }

    /// Computes which threads appeared in and disappeared from the given snapshot relative to
    /// the tracked population. Does not modify any state.
    pub(crate) fn diff(&self, snapshot: &HashSet<ThreadId>) -> SnapshotDelta {
        let removed = self
            .assignments
            .keys()
            .copied()
            .filter(|thread_id| !snapshot.contains(thread_id))
            .sorted()
            .collect();

        let added = snapshot
            .iter()
            .copied()
            .filter(|thread_id| !self.assignments.contains_key(thread_id))
            .sorted()
            .collect();

        SnapshotDelta { removed, added }
    }

    /// Starts tracking a thread as assigned to the given group.
    pub(crate) fn apply_addition(&mut self, thread_id: ThreadId, group: ProcessorGroupIndex) {
        let previous = self.assignments.insert(thread_id, group);
        debug_assert!(previous.is_none(), "thread {thread_id} was already tracked");

        *self
            .occupancy
            .get_mut(usize::from(group))
            .expect("assigned groups always come from the session topology") += 1;
    }

    /// Stops tracking a thread, returning the group it was assigned to, or `None` if the
    /// thread was not tracked.
    pub(crate) fn apply_removal(&mut self, thread_id: ThreadId) -> Option<ProcessorGroupIndex> {
        let group = self.assignments.remove(&thread_id)?;

        *self
            .occupancy
            .get_mut(usize::from(group))
            .expect("assigned groups always come from the session topology") -= 1;

        Some(group)
    }

    /// Number of threads a group currently has assigned to it.
    pub(crate) fn occupancy_of(&self, group: ProcessorGroupIndex) -> usize {
        self.occupancy.get(usize::from(group)).copied().unwrap_or(0)
    }

    /// Per-group occupancy counts, indexed by group.
    pub(crate) fn occupancy(&self) -> &[usize] {
        &self.occupancy
    }

    /// The group a tracked thread is assigned to, if the thread is tracked.
    pub(crate) fn assigned_group(&self, thread_id: ThreadId) -> Option<ProcessorGroupIndex> {
        self.assignments.get(&thread_id).copied()
    }

    /// Number of currently tracked threads.
    pub(crate) fn tracked_count(&self) -> usize {
        self.assignments.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Verifies the occupancy bookkeeping against the assignment map entry by entry.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (group, &count) in self.occupancy.iter().enumerate() {
            let actual = self
                .assignments
                .values()
                .filter(|&&assigned| usize::from(assigned) == group)
                .count();
            assert_eq!(count, actual, "occupancy of group {group} is inconsistent");
        }

        assert_eq!(self.occupancy.iter().sum::<usize>(), self.assignments.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(thread_ids: &[ThreadId]) -> HashSet<ThreadId> {
        thread_ids.iter().copied().collect()
    }

    #[test]
    fn diff_reports_added_and_removed_in_ascending_order() {
        let mut state = AssignmentState::new(2);
        state.apply_addition(30, 0);
        state.apply_addition(10, 0);
        state.apply_addition(20, 1);

        let delta = state.diff(&snapshot(&[20, 50, 40]));

        assert_eq!(delta.removed, vec![10, 30]);
        assert_eq!(delta.added, vec![40, 50]);
    }

    #[test]
    fn diff_against_unchanged_snapshot_is_empty() {
        let mut state = AssignmentState::new(2);
        state.apply_addition(1, 0);
        state.apply_addition(2, 1);

        let unchanged = snapshot(&[1, 2]);

        assert!(state.diff(&unchanged).is_empty());
        // Idempotence: diffing again yields the same empty delta.
        assert!(state.diff(&unchanged).is_empty());
    }

    #[test]
    fn additions_and_removals_keep_occupancy_consistent() {
        let mut state = AssignmentState::new(3);

        state.apply_addition(1, 0);
        state.apply_addition(2, 0);
        state.apply_addition(3, 2);
        state.assert_consistent();

        assert_eq!(state.occupancy(), &[2, 0, 1]);
        assert_eq!(state.tracked_count(), 3);

        assert_eq!(state.apply_removal(2), Some(0));
        state.assert_consistent();

        assert_eq!(state.occupancy(), &[1, 0, 1]);
        assert_eq!(state.assigned_group(1), Some(0));
        assert_eq!(state.assigned_group(2), None);
    }

    #[test]
    fn removing_an_untracked_thread_is_a_no_op() {
        let mut state = AssignmentState::new(2);
        state.apply_addition(1, 1);

        assert_eq!(state.apply_removal(99), None);

        state.assert_consistent();
        assert_eq!(state.tracked_count(), 1);
    }

    #[test]
    fn draining_all_threads_empties_the_state() {
        let mut state = AssignmentState::new(2);
        state.apply_addition(1, 0);
        state.apply_addition(2, 1);

        state.apply_removal(1);
        state.apply_removal(2);

        assert!(state.is_empty());
        assert_eq!(state.occupancy(), &[0, 0]);
        state.assert_consistent();
    }
}
