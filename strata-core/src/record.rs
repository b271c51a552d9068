//! Record types for the Strata log.
//!
//! Records are the fundamental unit of data in Strata. Each record carries
//! an offset (assigned by the log store at append time, never by the
//! producer), a broker timestamp, an optional partitioning key, and an
//! opaque value payload.
//!
//! # Wire Format
//!
//! Records encode as length-prefixed little-endian fields:
//! offset (u64), timestamp (i64 millis), key (i32 length, -1 for null),
//! value (u32 length). Encoding is deterministic: identical records always
//! produce identical bytes.
//!
//! # Record Batches
//!
//! Records are grouped into batches for storage. A batch carries a base
//! offset, min/max timestamps, a record count, and a CRC over the encoded
//! records.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::limits::Limits;
use crate::PartitionId;

/// Timestamp type for records (milliseconds since Unix epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns the current time as a timestamp.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Timestamps won't overflow i64 for centuries.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp representing "no timestamp".
    #[must_use]
    pub const fn none() -> Self {
        Self(-1)
    }

    /// Returns true if this represents "no timestamp".
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 < 0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::none()
    }
}

/// Offset of a record within a partition.
///
/// Offsets are dense non-negative integers starting at 0, assigned by the
/// log store at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(u64);

impl Offset {
    /// Creates an offset from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw offset value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next offset.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single record in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Offset in the partition (assigned by the store, 0 if not yet assigned).
    pub offset: Offset,
    /// Timestamp of the record.
    pub timestamp: Timestamp,
    /// Optional key for partitioning.
    pub key: Option<Bytes>,
    /// The record value/payload.
    pub value: Bytes,
}

impl Record {
    /// Creates a new record with just a value.
    #[must_use]
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            offset: Offset::default(),
            timestamp: Timestamp::now(),
            key: None,
            value: value.into(),
        }
    }

    /// Creates a new record with key and value.
    #[must_use]
    pub fn with_key(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            offset: Offset::default(),
            timestamp: Timestamp::now(),
            key: Some(key.into()),
            value: value.into(),
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the approximate size of the record in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let key_size = self.key.as_ref().map_or(0, Bytes::len);
        8 + 8 + 4 + key_size + 4 + self.value.len()
    }

    /// Validates the record against limits.
    ///
    /// # Errors
    /// Returns a description of the violated limit.
    pub fn validate(&self, limits: &Limits) -> Result<(), RecordTooLarge> {
        if self.value.len() > limits.record_value_size_bytes_max as usize {
            return Err(RecordTooLarge {
                field: "value",
                size: self.value.len(),
                max: limits.record_value_size_bytes_max as usize,
            });
        }

        if let Some(ref key) = self.key {
            if key.len() > limits.record_key_size_bytes_max as usize {
                return Err(RecordTooLarge {
                    field: "key",
                    size: key.len(),
                    max: limits.record_key_size_bytes_max as usize,
                });
            }
        }

        Ok(())
    }

    /// Encodes the record to bytes.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // Sizes bounded by limits.
    pub fn encode(&self, buf: &mut BytesMut) {
        // Offset.
        buf.put_u64_le(self.offset.get());
        // Timestamp.
        buf.put_i64_le(self.timestamp.as_millis());
        // Key (length-prefixed, -1 for null).
        match &self.key {
            Some(k) => {
                buf.put_i32_le(k.len() as i32);
                buf.put_slice(k);
            }
            None => {
                buf.put_i32_le(-1);
            }
        }
        // Value (length-prefixed).
        buf.put_u32_le(self.value.len() as u32);
        buf.put_slice(&self.value);
    }

    /// Decodes a record from bytes.
    ///
    /// Returns `None` if the buffer is truncated.
    #[allow(clippy::cast_sign_loss)] // key_len is checked to be non-negative before cast.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < 8 + 8 + 4 {
            return None;
        }

        let offset = Offset::new(buf.get_u64_le());
        let timestamp = Timestamp::from_millis(buf.get_i64_le());

        let key_len = buf.get_i32_le();
        let key = if key_len < 0 {
            None
        } else {
            if buf.remaining() < key_len as usize {
                return None;
            }
            Some(buf.copy_to_bytes(key_len as usize))
        };

        if buf.remaining() < 4 {
            return None;
        }
        let value_len = buf.get_u32_le() as usize;
        if buf.remaining() < value_len {
            return None;
        }
        let value = buf.copy_to_bytes(value_len);

        Some(Self {
            offset,
            timestamp,
            key,
            value,
        })
    }
}

/// A batch of records for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    /// Partition this batch belongs to.
    pub partition_id: PartitionId,
    /// First offset in this batch.
    pub base_offset: Offset,
    /// Minimum timestamp of records in the batch.
    pub base_timestamp: Timestamp,
    /// Maximum timestamp in the batch.
    pub max_timestamp: Timestamp,
    /// CRC32 of the encoded records.
    pub crc: u32,
    /// Records in this batch.
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// Creates a new record batch.
    #[must_use]
    pub const fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            base_offset: Offset::new(0),
            base_timestamp: Timestamp::none(),
            max_timestamp: Timestamp::none(),
            crc: 0,
            records: Vec::new(),
        }
    }

    /// Adds a record to the batch.
    pub fn push(&mut self, record: Record) {
        // Update timestamps.
        if self.base_timestamp.is_none() || record.timestamp < self.base_timestamp {
            self.base_timestamp = record.timestamp;
        }
        if self.max_timestamp.is_none() || record.timestamp > self.max_timestamp {
            self.max_timestamp = record.timestamp;
        }
        self.records.push(record);
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the last offset in the batch.
    #[must_use]
    pub fn last_offset(&self) -> Offset {
        if self.records.is_empty() {
            self.base_offset
        } else {
            Offset::new(self.base_offset.get() + self.records.len() as u64 - 1)
        }
    }

    /// Assigns offsets to all records starting from `base`.
    pub fn assign_offsets(&mut self, base: Offset) {
        self.base_offset = base;
        let mut offset = base.get();
        for record in &mut self.records {
            record.offset = Offset::new(offset);
            offset += 1;
        }
    }

    /// Returns the approximate size of the batch in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        // Header: base_offset + timestamps + record_count + crc.
        let header_size = 8 + 8 + 8 + 4 + 4;
        let records_size: usize = self.records.iter().map(Record::size).sum();
        header_size + records_size
    }

    /// Validates the batch against limits.
    ///
    /// # Errors
    /// Returns a description of the violated limit.
    pub fn validate(&self, limits: &Limits) -> Result<(), RecordTooLarge> {
        if self.records.len() > limits.batch_records_count_max as usize {
            return Err(RecordTooLarge {
                field: "batch",
                size: self.records.len(),
                max: limits.batch_records_count_max as usize,
            });
        }

        for record in &self.records {
            record.validate(limits)?;
        }

        Ok(())
    }
}

/// A record or batch exceeded a configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTooLarge {
    /// Which part exceeded the limit.
    pub field: &'static str,
    /// Actual size or count.
    pub size: usize,
    /// Maximum allowed.
    pub max: usize,
}

impl std::fmt::Display for RecordTooLarge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record {} too large: {} > {}", self.field, self.size, self.max)
    }
}

impl std::error::Error for RecordTooLarge {}
