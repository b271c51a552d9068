//! The group coordinator.

use std::collections::btree_map::Entry as MemberEntry;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use strata_core::{MemberId, Offset, PartitionId};
use tracing::{debug, info};

use crate::assign::range_assignment;
use crate::error::{GroupError, GroupResult};
use crate::state::{MemberState, ResetPolicy};
use crate::store::{CommittedOffsets, MemoryOffsetStore, OffsetStore};

/// Configuration for the group coordinator.
#[derive(Debug, Clone, Copy)]
pub struct GroupCoordinatorConfig {
    /// Where consumers start when a group has no committed offset.
    pub reset_policy: ResetPolicy,
    /// Maximum number of members per group.
    pub members_per_group_max: u32,
}

impl Default for GroupCoordinatorConfig {
    fn default() -> Self {
        Self {
            reset_policy: ResetPolicy::Earliest,
            members_per_group_max: 100,
        }
    }
}

impl GroupCoordinatorConfig {
    /// Sets the reset policy.
    #[must_use]
    pub const fn with_reset_policy(mut self, reset_policy: ResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    /// Sets the member limit.
    #[must_use]
    pub const fn with_members_per_group_max(mut self, max: u32) -> Self {
        self.members_per_group_max = max;
        self
    }
}

/// The result of joining a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// The member ID minted by the coordinator.
    pub member_id: MemberId,
    /// The group generation after this join.
    pub generation: u64,
}

/// State of one consumer group.
#[derive(Debug)]
struct GroupState {
    /// Generation, bumped on every membership change.
    generation: u64,
    /// Members, ordered by ID for deterministic assignment.
    members: BTreeMap<MemberId, MemberState>,
    /// Committed offsets per topic partition.
    offsets: CommittedOffsets,
}

impl GroupState {
    fn new(offsets: CommittedOffsets) -> Self {
        Self {
            generation: 0,
            members: BTreeMap::new(),
            offsets,
        }
    }
}

/// Mutable coordinator state, all under one lock so every membership
/// change and its generation bump are observed atomically.
#[derive(Debug)]
struct Inner {
    /// Groups by name.
    groups: HashMap<String, GroupState>,
    /// Next member ID to mint.
    next_member_id: u64,
}

/// Coordinates consumer group membership, assignment, and offsets.
#[derive(Debug)]
pub struct GroupCoordinator {
    /// Configuration.
    config: GroupCoordinatorConfig,
    /// Durable backing for committed offsets.
    store: Box<dyn OffsetStore>,
    /// Group state.
    inner: Mutex<Inner>,
}

impl Default for GroupCoordinator {
    fn default() -> Self {
        Self::new(GroupCoordinatorConfig::default())
    }
}

impl GroupCoordinator {
    /// Creates a coordinator with in-memory offset storage.
    #[must_use]
    pub fn new(config: GroupCoordinatorConfig) -> Self {
        Self::with_store(config, Box::new(MemoryOffsetStore::new()))
    }

    /// Creates a coordinator backed by the given offset store.
    #[must_use]
    pub fn with_store(config: GroupCoordinatorConfig, store: Box<dyn OffsetStore>) -> Self {
        Self {
            config,
            store,
            inner: Mutex::new(Inner {
                groups: HashMap::new(),
                next_member_id: 1,
            }),
        }
    }

    /// Returns the configured reset policy.
    #[must_use]
    pub const fn reset_policy(&self) -> ResetPolicy {
        self.config.reset_policy
    }

    /// Joins a group, minting a new member ID.
    ///
    /// Every join bumps the group generation; existing members move to
    /// `Rebalancing` and must re-fetch their assignments.
    ///
    /// # Errors
    /// Returns `TooManyMembers` if the group is full, or a store error.
    pub fn join(&self, group: &str) -> GroupResult<Membership> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let member_id = MemberId::new(inner.next_member_id);
        inner.next_member_id += 1;

        let state = Self::group_entry(&mut inner, self.store.as_ref(), group)?;

        #[allow(clippy::cast_possible_truncation)] // Bounded by members_per_group_max.
        let count = state.members.len() as u32;
        if count >= self.config.members_per_group_max {
            return Err(GroupError::TooManyMembers {
                group: group.to_string(),
                count,
                max: self.config.members_per_group_max,
            });
        }

        for member_state in state.members.values_mut() {
            *member_state = MemberState::Rebalancing;
        }
        state.members.insert(member_id, MemberState::Joining);
        state.generation += 1;

        let generation = state.generation;

        info!(group, member = %member_id, generation, "member joined");

        Ok(Membership {
            member_id,
            generation,
        })
    }

    /// Removes a member from a group.
    ///
    /// The remaining members move to `Rebalancing` under a new
    /// generation.
    ///
    /// # Errors
    /// Returns `UnknownGroup` or `UnknownMember`.
    pub fn leave(&self, group: &str, member: MemberId) -> GroupResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = Self::known_group(&mut inner, group)?;

        match state.members.entry(member) {
            MemberEntry::Vacant(_) => {
                return Err(GroupError::UnknownMember {
                    group: group.to_string(),
                    member,
                });
            }
            MemberEntry::Occupied(entry) => {
                entry.remove();
            }
        }

        for member_state in state.members.values_mut() {
            *member_state = MemberState::Rebalancing;
        }
        state.generation += 1;

        info!(group, member = %member, generation = state.generation, "member left");

        Ok(())
    }

    /// Returns the current generation of a group.
    ///
    /// # Errors
    /// Returns `UnknownGroup` if the group does not exist.
    pub fn generation(&self, group: &str) -> GroupResult<u64> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::known_group(&mut inner, group)?.generation)
    }

    /// Returns the number of members in a group.
    ///
    /// # Errors
    /// Returns `UnknownGroup` if the group does not exist.
    pub fn member_count(&self, group: &str) -> GroupResult<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::known_group(&mut inner, group)?.members.len())
    }

    /// Computes the member's partition assignment for the current
    /// generation.
    ///
    /// Range assignment over members sorted by ID: contiguous chunks
    /// whose sizes differ by at most one. Fetching the assignment moves
    /// the member to `Stable`.
    ///
    /// # Errors
    /// Returns `UnknownGroup` or `UnknownMember`.
    pub fn assignment(
        &self,
        group: &str,
        member: MemberId,
        partition_count: u32,
    ) -> GroupResult<Vec<PartitionId>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = Self::known_group(&mut inner, group)?;

        if !state.members.contains_key(&member) {
            return Err(GroupError::UnknownMember {
                group: group.to_string(),
                member,
            });
        }

        let members: Vec<MemberId> = state.members.keys().copied().collect();
        let assignment = range_assignment(&members, member, partition_count);

        if let Some(member_state) = state.members.get_mut(&member) {
            *member_state = MemberState::Stable;
        }

        debug!(
            group,
            member = %member,
            partitions = assignment.len(),
            "assignment fetched"
        );

        Ok(assignment)
    }

    /// Returns a member's lifecycle state.
    ///
    /// # Errors
    /// Returns `UnknownGroup` or `UnknownMember`.
    pub fn member_state(&self, group: &str, member: MemberId) -> GroupResult<MemberState> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = Self::known_group(&mut inner, group)?;
        state
            .members
            .get(&member)
            .copied()
            .ok_or_else(|| GroupError::UnknownMember {
                group: group.to_string(),
                member,
            })
    }

    /// Commits an offset for a topic partition.
    ///
    /// Commits are monotonic: a lower offset than the stored one is
    /// rejected with `StaleCommit` and leaves the stored value unchanged,
    /// unless `reset` is set. The group is created on first commit if it
    /// does not exist yet.
    ///
    /// # Errors
    /// Returns `StaleCommit` or a store error.
    pub fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
        reset: bool,
    ) -> GroupResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = Self::group_entry(&mut inner, self.store.as_ref(), group)?;

        let key = (topic.to_string(), partition);
        if let Some(committed) = state.offsets.get(&key) {
            if *committed > offset && !reset {
                return Err(GroupError::StaleCommit {
                    committed: *committed,
                    requested: offset,
                });
            }
        }

        state.offsets.insert(key, offset);
        self.store.save(group, topic, partition, offset)?;

        debug!(group, topic, partition = partition.get(), offset = offset.get(), "offset committed");

        Ok(())
    }

    /// Fetches the committed offset for a topic partition.
    ///
    /// Returns `None` when the group has never committed for this
    /// partition; the caller resolves the start position via the reset
    /// policy.
    ///
    /// # Errors
    /// Returns a store error.
    pub fn fetch_committed(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
    ) -> GroupResult<Option<Offset>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = Self::group_entry(&mut inner, self.store.as_ref(), group)?;
        Ok(state.offsets.get(&(topic.to_string(), partition)).copied())
    }

    /// Gets or lazily creates a group, loading its offsets from the
    /// store on creation.
    fn group_entry<'a>(
        inner: &'a mut Inner,
        store: &dyn OffsetStore,
        group: &str,
    ) -> GroupResult<&'a mut GroupState> {
        match inner.groups.entry(group.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let offsets = store.load(group)?;
                Ok(entry.insert(GroupState::new(offsets)))
            }
        }
    }

    /// Looks up an existing group.
    fn known_group<'a>(inner: &'a mut Inner, group: &str) -> GroupResult<&'a mut GroupState> {
        inner
            .groups
            .get_mut(group)
            .ok_or_else(|| GroupError::UnknownGroup {
                group: group.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileOffsetStore;

    fn make_coordinator() -> GroupCoordinator {
        GroupCoordinator::new(GroupCoordinatorConfig::default())
    }

    #[test]
    fn test_join_bumps_generation() {
        let coordinator = make_coordinator();

        let first = coordinator.join("g1").unwrap();
        assert_eq!(first.generation, 1);

        let second = coordinator.join("g1").unwrap();
        assert_eq!(second.generation, 2);
        assert_ne!(first.member_id, second.member_id);

        assert_eq!(coordinator.member_count("g1").unwrap(), 2);
    }

    #[test]
    fn test_join_rebalances_existing_members() {
        let coordinator = make_coordinator();

        let first = coordinator.join("g1").unwrap();
        coordinator.assignment("g1", first.member_id, 4).unwrap();
        assert_eq!(
            coordinator.member_state("g1", first.member_id).unwrap(),
            MemberState::Stable
        );

        coordinator.join("g1").unwrap();
        assert_eq!(
            coordinator.member_state("g1", first.member_id).unwrap(),
            MemberState::Rebalancing
        );
    }

    #[test]
    fn test_two_members_split_four_partitions() {
        let coordinator = make_coordinator();

        let a = coordinator.join("g1").unwrap();
        let b = coordinator.join("g1").unwrap();

        let assignment_a = coordinator.assignment("g1", a.member_id, 4).unwrap();
        let assignment_b = coordinator.assignment("g1", b.member_id, 4).unwrap();

        assert_eq!(assignment_a.len(), 2);
        assert_eq!(assignment_b.len(), 2);

        // Disjoint, covering all 4 partitions.
        let mut all: Vec<u64> = assignment_a
            .iter()
            .chain(assignment_b.iter())
            .map(|p| p.get())
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_leave_reassigns_everything_to_survivor() {
        let coordinator = make_coordinator();

        let a = coordinator.join("g1").unwrap();
        let b = coordinator.join("g1").unwrap();

        coordinator.leave("g1", b.member_id).unwrap();

        let assignment = coordinator.assignment("g1", a.member_id, 4).unwrap();
        assert_eq!(assignment.len(), 4);
    }

    #[test]
    fn test_leave_unknown() {
        let coordinator = make_coordinator();

        assert!(matches!(
            coordinator.leave("nope", MemberId::new(1)),
            Err(GroupError::UnknownGroup { .. })
        ));

        coordinator.join("g1").unwrap();
        assert!(matches!(
            coordinator.leave("g1", MemberId::new(999)),
            Err(GroupError::UnknownMember { .. })
        ));
    }

    #[test]
    fn test_commit_and_fetch() {
        let coordinator = make_coordinator();
        let partition = PartitionId::new(0);

        assert_eq!(
            coordinator.fetch_committed("g1", "orders", partition).unwrap(),
            None
        );

        coordinator
            .commit("g1", "orders", partition, Offset::new(3), false)
            .unwrap();
        assert_eq!(
            coordinator.fetch_committed("g1", "orders", partition).unwrap(),
            Some(Offset::new(3))
        );
    }

    #[test]
    fn test_stale_commit_rejected_and_value_unchanged() {
        let coordinator = make_coordinator();
        let partition = PartitionId::new(0);

        coordinator
            .commit("g1", "orders", partition, Offset::new(3), false)
            .unwrap();

        let result = coordinator.commit("g1", "orders", partition, Offset::new(1), false);
        assert_eq!(
            result,
            Err(GroupError::StaleCommit {
                committed: Offset::new(3),
                requested: Offset::new(1),
            })
        );

        // Stored value unchanged.
        assert_eq!(
            coordinator.fetch_committed("g1", "orders", partition).unwrap(),
            Some(Offset::new(3))
        );
    }

    #[test]
    fn test_reset_commit_allows_rewind() {
        let coordinator = make_coordinator();
        let partition = PartitionId::new(0);

        coordinator
            .commit("g1", "orders", partition, Offset::new(10), false)
            .unwrap();
        coordinator
            .commit("g1", "orders", partition, Offset::new(2), true)
            .unwrap();

        assert_eq!(
            coordinator.fetch_committed("g1", "orders", partition).unwrap(),
            Some(Offset::new(2))
        );
    }

    #[test]
    fn test_repeat_commit_same_offset_is_idempotent() {
        let coordinator = make_coordinator();
        let partition = PartitionId::new(0);

        coordinator
            .commit("g1", "orders", partition, Offset::new(5), false)
            .unwrap();
        coordinator
            .commit("g1", "orders", partition, Offset::new(5), false)
            .unwrap();
    }

    #[test]
    fn test_member_limit() {
        let coordinator = GroupCoordinator::new(
            GroupCoordinatorConfig::default().with_members_per_group_max(2),
        );

        coordinator.join("g1").unwrap();
        coordinator.join("g1").unwrap();
        assert!(matches!(
            coordinator.join("g1"),
            Err(GroupError::TooManyMembers { .. })
        ));
    }

    #[test]
    fn test_commits_survive_coordinator_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets.strata");
        let partition = PartitionId::new(1);

        {
            let store = FileOffsetStore::open(&path).unwrap();
            let coordinator =
                GroupCoordinator::with_store(GroupCoordinatorConfig::default(), Box::new(store));
            coordinator
                .commit("g1", "orders", partition, Offset::new(17), false)
                .unwrap();
        }

        let store = FileOffsetStore::open(&path).unwrap();
        let coordinator =
            GroupCoordinator::with_store(GroupCoordinatorConfig::default(), Box::new(store));
        assert_eq!(
            coordinator.fetch_committed("g1", "orders", partition).unwrap(),
            Some(Offset::new(17))
        );

        // Monotonicity holds across the restart too.
        assert!(matches!(
            coordinator.commit("g1", "orders", partition, Offset::new(4), false),
            Err(GroupError::StaleCommit { .. })
        ));
    }
}
