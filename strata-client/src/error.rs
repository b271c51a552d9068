//! Client error taxonomy.
//!
//! Every failure a producer or consumer can hit surfaces as a typed
//! `ClientError` value, never a panic. Broker and coordinator errors are
//! flattened into client-level variants so callers match on one enum.

use std::time::Duration;

use strata_broker::BrokerError;
use strata_core::{Offset, PartitionId};
use strata_group::GroupError;
use strata_log::LogError;
use strata_schema::SchemaError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the producer and consumer APIs.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The record failed schema validation.
    #[error(transparent)]
    SchemaValidation(#[from] SchemaError),

    /// The topic already exists.
    #[error("topic '{topic}' already exists")]
    TopicAlreadyExists {
        /// The topic name.
        topic: String,
    },

    /// The topic or partition does not exist.
    #[error("unknown topic or partition: '{topic}'")]
    UnknownTopicOrPartition {
        /// The topic name.
        topic: String,
        /// The partition, if the topic exists but the partition does not.
        partition: Option<PartitionId>,
    },

    /// The requested offset is outside the retained range.
    #[error("offset {offset} out of range [{start}, {end})")]
    OffsetOutOfRange {
        /// Requested offset.
        offset: Offset,
        /// Earliest retained offset.
        start: Offset,
        /// Log end offset.
        end: Offset,
    },

    /// A commit was rejected for being lower than the stored offset.
    #[error("stale commit: committed {committed} > requested {requested}")]
    StaleCommit {
        /// The stored committed offset.
        committed: Offset,
        /// The rejected lower offset.
        requested: Offset,
    },

    /// An operation did not complete within its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// No broker is reachable.
    #[error("broker unavailable: {message}")]
    BrokerUnavailable {
        /// Why the broker cannot be reached.
        message: String,
    },

    /// The request was malformed or exceeded a limit.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The coordinator rejected a group operation.
    #[error("group error: {message}")]
    Group {
        /// The underlying coordinator failure.
        message: String,
    },

    /// The client or broker has been closed.
    #[error("client is closed")]
    Closed,
}

impl ClientError {
    /// Returns true if retrying the operation may succeed.
    ///
    /// Only `Timeout` and `BrokerUnavailable` are transient; validation
    /// and logic errors are surfaced immediately and never retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::BrokerUnavailable { .. })
    }
}

impl From<BrokerError> for ClientError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::TopicAlreadyExists { topic } => Self::TopicAlreadyExists { topic },
            BrokerError::UnknownTopicOrPartition { topic, partition } => {
                Self::UnknownTopicOrPartition { topic, partition }
            }
            BrokerError::Log(LogError::OffsetOutOfRange { offset, start, end }) => {
                Self::OffsetOutOfRange { offset, start, end }
            }
            BrokerError::Closed | BrokerError::Log(LogError::Closed) => Self::Closed,
            other => Self::InvalidRequest {
                message: other.to_string(),
            },
        }
    }
}

impl From<GroupError> for ClientError {
    fn from(err: GroupError) -> Self {
        match err {
            GroupError::StaleCommit {
                committed,
                requested,
            } => Self::StaleCommit {
                committed,
                requested,
            },
            other => Self::Group {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_flattening() {
        let err: ClientError = BrokerError::unknown_topic("orders").into();
        assert!(matches!(
            err,
            ClientError::UnknownTopicOrPartition { .. }
        ));

        let err: ClientError = BrokerError::Log(LogError::OffsetOutOfRange {
            offset: Offset::new(9),
            start: Offset::new(0),
            end: Offset::new(5),
        })
        .into();
        assert!(matches!(err, ClientError::OffsetOutOfRange { .. }));

        let err: ClientError = BrokerError::Closed.into();
        assert!(matches!(err, ClientError::Closed));
    }

    #[test]
    fn test_group_error_flattening() {
        let err: ClientError = GroupError::StaleCommit {
            committed: Offset::new(3),
            requested: Offset::new(1),
        }
        .into();
        assert!(matches!(err, ClientError::StaleCommit { .. }));
    }

    #[test]
    fn test_transience() {
        assert!(ClientError::BrokerUnavailable {
            message: "down".to_string()
        }
        .is_transient());
        assert!(ClientError::Timeout {
            operation: "flush",
            timeout: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!ClientError::Closed.is_transient());
    }
}
