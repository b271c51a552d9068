//! Key-hash partition routing.
//!
//! Keyed records route by a stable hash of the key so all records with
//! the same key land on the same partition, in order. The hash function
//! does not depend on process state, so routing is stable across broker
//! restarts for a fixed partition count.

use strata_core::PartitionId;
use xxhash_rust::xxh3::xxh3_64;

/// Returns the partition for a keyed record.
///
/// Deterministic: the same key and partition count always produce the
/// same partition.
#[must_use]
pub fn partition_for_key(key: &[u8], partition_count: u32) -> PartitionId {
    debug_assert!(partition_count > 0);

    let hash = xxh3_64(key);
    PartitionId::new(hash % u64::from(partition_count))
}
