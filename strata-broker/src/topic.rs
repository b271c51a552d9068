//! Topic metadata and per-partition state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use strata_core::PartitionId;
use strata_log::{PartitionLog, PartitionLogConfig, SegmentConfig};
use tokio::sync::Notify;

use crate::error::{BrokerError, BrokerResult};

/// Configuration for a topic.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Topic name.
    pub name: String,
    /// Number of partitions.
    pub partitions: u32,
    /// Replication factor (carried for interface parity; a single broker
    /// stores exactly one copy).
    pub replication_factor: u32,
}

impl TopicConfig {
    /// Creates a new topic configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor: 1,
        }
    }

    /// Sets the replication factor.
    #[must_use]
    pub const fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the name is empty or the partition count is zero.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.name.is_empty() {
            return Err(BrokerError::InvalidTopicConfig {
                reason: "topic name must not be empty".to_string(),
            });
        }
        if self.partitions == 0 {
            return Err(BrokerError::InvalidTopicConfig {
                reason: "partition count must be at least 1".to_string(),
            });
        }
        if self.replication_factor == 0 {
            return Err(BrokerError::InvalidTopicConfig {
                reason: "replication factor must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-partition state: the log plus a wakeup signal for pollers.
#[derive(Debug)]
pub(crate) struct PartitionSlot {
    /// The partition log, the serialization point for appends.
    pub(crate) log: Mutex<PartitionLog>,
    /// Notified after every successful append.
    pub(crate) data_arrived: Notify,
}

/// A topic: named partition set with routing state.
#[derive(Debug)]
pub struct Topic {
    /// Topic configuration.
    config: TopicConfig,
    /// Partition slots, indexed by partition ID.
    slots: Vec<PartitionSlot>,
    /// Round-robin counter for keyless records.
    next_keyless: AtomicU64,
}

impl Topic {
    /// Creates a topic with its partition logs.
    #[must_use]
    pub(crate) fn new(config: TopicConfig, segment_config: SegmentConfig) -> Self {
        debug_assert!(config.partitions > 0);

        let slots = (0..config.partitions)
            .map(|p| {
                let log_config = PartitionLogConfig::new(PartitionId::new(u64::from(p)))
                    .with_segment_config(segment_config);
                PartitionSlot {
                    log: Mutex::new(PartitionLog::new(log_config)),
                    data_arrived: Notify::new(),
                }
            })
            .collect();

        Self {
            config,
            slots,
            next_keyless: AtomicU64::new(0),
        }
    }

    /// Returns the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the partition count.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Bounded by config.partitions.
    pub fn partition_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Returns the slot for a partition.
    pub(crate) fn slot(&self, partition: PartitionId) -> BrokerResult<&PartitionSlot> {
        self.slots.get(partition.get() as usize).ok_or_else(|| {
            BrokerError::unknown_partition(self.config.name.clone(), partition)
        })
    }

    /// Picks the next partition for a keyless record (round-robin).
    #[must_use]
    pub(crate) fn next_keyless_partition(&self) -> PartitionId {
        let n = self.next_keyless.fetch_add(1, Ordering::Relaxed);
        PartitionId::new(n % u64::from(self.partition_count()))
    }
}
