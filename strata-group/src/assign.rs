//! Range partition assignment.
//!
//! Partitions are split into contiguous ranges across the group's
//! members, ordered by member ID. With `p` partitions and `n` members,
//! the first `p % n` members get `p / n + 1` partitions and the rest get
//! `p / n`, so assignment sizes never differ by more than one.

use strata_core::{MemberId, PartitionId};

/// Computes the range assignment for one member.
///
/// `members` must be sorted and duplicate-free; the result is empty if
/// `member` is not in the list. Deterministic: the same inputs always
/// produce the same assignment, and distinct members receive disjoint
/// ranges that together cover every partition.
#[must_use]
pub fn range_assignment(
    members: &[MemberId],
    member: MemberId,
    partition_count: u32,
) -> Vec<PartitionId> {
    debug_assert!(members.windows(2).all(|w| w[0] < w[1]));

    let Some(index) = members.iter().position(|m| *m == member) else {
        return Vec::new();
    };

    #[allow(clippy::cast_possible_truncation)] // Member count bounded by limits.
    let (n, index) = (members.len() as u32, index as u32);

    let base = partition_count / n;
    let extra = partition_count % n;

    // Members before this one, counting their +1 shares.
    let start = index * base + index.min(extra);
    let len = if index < extra { base + 1 } else { base };

    (start..start + len)
        .map(|p| PartitionId::new(u64::from(p)))
        .collect()
}
