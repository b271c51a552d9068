//! System limits and configuration bounds.
//!
//! Put limits on everything: every buffer, batch, and resource has an
//! explicit maximum size. This prevents unbounded growth and makes the
//! system predictable.

/// System-wide limits for Strata.
///
/// All limits are explicit and configurable. Default values are chosen
/// to be safe for most deployments while allowing customization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Record and batch limits.
    /// Maximum size of a record value in bytes.
    pub record_value_size_bytes_max: u32,
    /// Maximum size of a record key in bytes.
    pub record_key_size_bytes_max: u32,
    /// Maximum number of records in a batch.
    pub batch_records_count_max: u32,
    /// Maximum size of a batch in bytes.
    pub batch_size_bytes_max: u32,

    // Storage limits.
    /// Maximum size of a log segment in bytes.
    pub segment_size_bytes_max: u64,
    /// Maximum number of records in a log segment.
    pub segment_records_count_max: u64,

    // Topic limits.
    /// Maximum number of partitions per topic.
    pub partitions_per_topic_max: u32,

    // Consumer limits.
    /// Maximum number of members per consumer group.
    pub members_per_group_max: u32,
    /// Maximum number of records returned by a single poll.
    pub poll_records_max: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    ///
    /// These defaults are conservative. Production systems should tune
    /// them based on hardware and workload characteristics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // Records: 1MB values, 64KB keys, 10k records / 16MB per batch.
            record_value_size_bytes_max: 1024 * 1024,
            record_key_size_bytes_max: 64 * 1024,
            batch_records_count_max: 10_000,
            batch_size_bytes_max: 16 * 1024 * 1024,

            // Storage: 1GB segments, 10M records per segment.
            segment_size_bytes_max: 1024 * 1024 * 1024,
            segment_records_count_max: 10_000_000,

            // Topics: 1024 partitions.
            partitions_per_topic_max: 1024,

            // Consumers: 100 members per group, 500 records per poll.
            members_per_group_max: 100,
            poll_records_max: 500,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns the name of the first invalid limit.
    pub const fn validate(&self) -> Result<(), InvalidLimit> {
        if self.record_value_size_bytes_max == 0 {
            return Err(InvalidLimit {
                name: "record_value_size_bytes_max",
                reason: "must be positive",
            });
        }

        // A batch must hold at least one maximal record.
        if self.batch_size_bytes_max < self.record_value_size_bytes_max {
            return Err(InvalidLimit {
                name: "batch_size_bytes_max",
                reason: "must be >= record_value_size_bytes_max",
            });
        }

        // A segment must hold at least one maximal batch.
        if self.segment_size_bytes_max < self.batch_size_bytes_max as u64 {
            return Err(InvalidLimit {
                name: "segment_size_bytes_max",
                reason: "must be >= batch_size_bytes_max",
            });
        }

        if self.partitions_per_topic_max == 0 {
            return Err(InvalidLimit {
                name: "partitions_per_topic_max",
                reason: "must be positive",
            });
        }

        if self.poll_records_max == 0 {
            return Err(InvalidLimit {
                name: "poll_records_max",
                reason: "must be positive",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

/// A limit value that is invalid or inconsistent with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLimit {
    /// The name of the invalid limit.
    pub name: &'static str,
    /// Why it is invalid.
    pub reason: &'static str,
}

impl std::fmt::Display for InvalidLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid limit '{}': {}", self.name, self.reason)
    }
}

impl std::error::Error for InvalidLimit {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_invalid_value_size() {
        let mut limits = Limits::new();
        limits.record_value_size_bytes_max = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_batch_smaller_than_record() {
        let mut limits = Limits::new();
        limits.batch_size_bytes_max = 512;
        limits.record_value_size_bytes_max = 1024;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_partitions() {
        let mut limits = Limits::new();
        limits.partitions_per_topic_max = 0;
        assert!(limits.validate().is_err());
    }
}
