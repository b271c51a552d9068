//! Group coordination error types.

use strata_core::{MemberId, Offset};
use thiserror::Error;

/// Result type for group operations.
pub type GroupResult<T> = Result<T, GroupError>;

/// Errors that can occur during group coordination.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Consumer group not found.
    #[error("unknown group: '{group}'")]
    UnknownGroup {
        /// The group that was not found.
        group: String,
    },

    /// Member not found in group.
    #[error("member {member} not found in group '{group}'")]
    UnknownMember {
        /// The group.
        group: String,
        /// The member that was not found.
        member: MemberId,
    },

    /// Commit offset is lower than the stored one and reset was not set.
    #[error("stale commit: committed {committed} > requested {requested}")]
    StaleCommit {
        /// The currently stored committed offset.
        committed: Offset,
        /// The rejected lower offset.
        requested: Offset,
    },

    /// Too many members in the group.
    #[error("too many members in group '{group}': {count} >= {max}")]
    TooManyMembers {
        /// The group.
        group: String,
        /// Current member count.
        count: u32,
        /// Maximum allowed.
        max: u32,
    },

    /// I/O error from the offset store.
    #[error("i/o error during {operation}: {message}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The offset store contains malformed data.
    #[error("offset store corrupt: {message}")]
    StoreCorrupt {
        /// Description of the corruption.
        message: String,
    },
}

impl GroupError {
    /// Wraps an I/O error with the operation that hit it.
    #[must_use]
    pub fn io(operation: &'static str, err: &std::io::Error) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GroupError::StaleCommit {
            committed: Offset::new(3),
            requested: Offset::new(1),
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains("stale"));

        let err = GroupError::UnknownMember {
            group: "g1".to_string(),
            member: MemberId::new(7),
        };
        assert!(err.to_string().contains("g1"));
    }
}
