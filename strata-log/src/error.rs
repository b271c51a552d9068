//! Log storage error types.

use strata_core::Offset;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Log storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// Offset is outside the retained range of the log.
    OffsetOutOfRange {
        /// Requested offset.
        offset: Offset,
        /// Earliest retained offset.
        start: Offset,
        /// Log end offset (next offset to be assigned).
        end: Offset,
    },
    /// Segment is full or sealed.
    SegmentFull {
        /// Reason for being full.
        reason: &'static str,
    },
    /// Data corruption detected.
    Corruption {
        /// Description of corruption.
        message: String,
    },
    /// The log is closed.
    Closed,
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OffsetOutOfRange { offset, start, end } => {
                write!(
                    f,
                    "offset {} out of range [{}, {})",
                    offset.get(),
                    start.get(),
                    end.get()
                )
            }
            Self::SegmentFull { reason } => write!(f, "segment full: {reason}"),
            Self::Corruption { message } => write!(f, "data corruption: {message}"),
            Self::Closed => write!(f, "log is closed"),
        }
    }
}

impl std::error::Error for LogError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogError::OffsetOutOfRange {
            offset: Offset::new(100),
            start: Offset::new(0),
            end: Offset::new(50),
        };
        assert!(format!("{err}").contains("100"));
        assert!(format!("{err}").contains("out of range"));
    }
}
