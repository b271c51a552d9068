//! Broker error types.

use strata_core::{PartitionId, RecordTooLarge};
use strata_log::LogError;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Topic already exists.
    #[error("topic '{topic}' already exists")]
    TopicAlreadyExists {
        /// The topic name.
        topic: String,
    },

    /// Topic or partition does not exist.
    #[error("unknown topic or partition: '{topic}'{}", .partition.map_or_else(String::new, |p| format!("/{}", p.get())))]
    UnknownTopicOrPartition {
        /// The topic name.
        topic: String,
        /// The partition, if the topic exists but the partition does not.
        partition: Option<PartitionId>,
    },

    /// Topic configuration is invalid.
    #[error("invalid topic config: {reason}")]
    InvalidTopicConfig {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A record or batch exceeded a configured limit.
    #[error(transparent)]
    RecordTooLarge(#[from] RecordTooLarge),

    /// Log storage error.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The broker is closed.
    #[error("broker is closed")]
    Closed,
}

impl BrokerError {
    /// Constructs an unknown-topic error.
    #[must_use]
    pub fn unknown_topic(topic: impl Into<String>) -> Self {
        Self::UnknownTopicOrPartition {
            topic: topic.into(),
            partition: None,
        }
    }

    /// Constructs an unknown-partition error.
    #[must_use]
    pub fn unknown_partition(topic: impl Into<String>, partition: PartitionId) -> Self {
        Self::UnknownTopicOrPartition {
            topic: topic.into(),
            partition: Some(partition),
        }
    }
}
