//! Partition log management.
//!
//! A partition log is a totally ordered, immutable sequence of records.
//! It is the single serialization point for its partition: whoever holds
//! it appends strictly in order, and every append extends the dense
//! offset sequence by exactly the batch size.

use strata_core::{Offset, PartitionId, Record, RecordBatch, Timestamp};

use crate::error::{LogError, LogResult};
use crate::segment::{LogSegment, SegmentConfig};

/// Configuration for a partition log.
#[derive(Debug, Clone)]
pub struct PartitionLogConfig {
    /// Partition this log stores.
    pub partition_id: PartitionId,
    /// Segment configuration.
    pub segment_config: SegmentConfig,
    /// Maximum number of segments to keep; older segments are trimmed.
    pub max_segments: u32,
}

impl PartitionLogConfig {
    /// Creates a new partition log configuration.
    #[must_use]
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            segment_config: SegmentConfig::default(),
            max_segments: 100,
        }
    }

    /// Sets the segment configuration.
    #[must_use]
    pub const fn with_segment_config(mut self, config: SegmentConfig) -> Self {
        self.segment_config = config;
        self
    }

    /// Sets the maximum segment count.
    ///
    /// The active segment is never dropped, so the count is clamped to at
    /// least 1.
    #[must_use]
    pub const fn with_max_segments(mut self, max_segments: u32) -> Self {
        self.max_segments = if max_segments == 0 { 1 } else { max_segments };
        self
    }
}

/// An append-only partition log backed by segments.
#[derive(Debug)]
pub struct PartitionLog {
    /// Configuration.
    config: PartitionLogConfig,
    /// Log segments (ordered by base offset).
    segments: Vec<LogSegment>,
    /// Active segment for writing.
    active_segment_idx: usize,
    /// Whether the log is closed.
    closed: bool,
}

impl PartitionLog {
    /// Creates a new, empty partition log.
    #[must_use]
    pub fn new(config: PartitionLogConfig) -> Self {
        let segment = LogSegment::new(Offset::new(0), config.segment_config);

        Self {
            config,
            segments: vec![segment],
            active_segment_idx: 0,
            closed: false,
        }
    }

    /// Returns the partition ID.
    #[must_use]
    pub const fn partition_id(&self) -> PartitionId {
        self.config.partition_id
    }

    /// Returns the earliest retained offset.
    #[must_use]
    pub fn start_offset(&self) -> Offset {
        self.segments
            .first()
            .map_or(Offset::new(0), LogSegment::base_offset)
    }

    /// Returns the log end offset (next offset to be assigned).
    #[must_use]
    pub fn end_offset(&self) -> Offset {
        self.segments
            .last()
            .map_or(Offset::new(0), LogSegment::next_offset)
    }

    /// Returns the number of retained records.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.end_offset().get() - self.start_offset().get()
    }

    /// Returns the total retained size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.segments.iter().map(LogSegment::size_bytes).sum()
    }

    /// Appends a single record, returning its offset and broker timestamp.
    ///
    /// The record's offset and timestamp fields are overwritten here: the
    /// store, never the producer, assigns them.
    ///
    /// # Errors
    /// Returns an error if the log is closed.
    pub fn append_record(&mut self, mut record: Record) -> LogResult<(Offset, Timestamp)> {
        let timestamp = Timestamp::now();
        record.timestamp = timestamp;

        let mut batch = RecordBatch::new(self.config.partition_id);
        batch.push(record);

        let offset = self.append_batch(batch)?;
        Ok((offset, timestamp))
    }

    /// Appends a record batch, returning the offset of its first record.
    ///
    /// # Errors
    /// Returns an error if the log is closed or the batch cannot be stored.
    pub fn append_batch(&mut self, mut batch: RecordBatch) -> LogResult<Offset> {
        if self.closed {
            return Err(LogError::Closed);
        }

        if batch.is_empty() {
            return Ok(self.end_offset());
        }

        let prev_end = self.end_offset();
        let batch_size = batch.size();
        let record_count = batch.len() as u64;

        // Roll to a new segment if the active one is out of space.
        let active = &self.segments[self.active_segment_idx];
        if !active.has_space_for(batch_size, record_count) {
            self.roll_segment();
        }

        debug_assert!(self.active_segment_idx < self.segments.len());

        let active = &mut self.segments[self.active_segment_idx];
        let offset = active.append(&mut batch)?;

        // Postcondition: end offset advanced by exactly the batch size.
        debug_assert!(self.end_offset().get() == prev_end.get() + record_count);

        Ok(offset)
    }

    /// Rolls to a new segment.
    fn roll_segment(&mut self) {
        self.segments[self.active_segment_idx].seal();
        debug_assert!(self.segments[self.active_segment_idx].is_sealed());

        let next_offset = self.end_offset();
        let segment = LogSegment::new(next_offset, self.config.segment_config);

        self.segments.push(segment);
        self.active_segment_idx = self.segments.len() - 1;

        // Enforce retention: drop the oldest whole segments.
        while self.segments.len() > self.config.max_segments as usize {
            self.segments.remove(0);
            self.active_segment_idx -= 1;
        }

        debug_assert!(!self.segments.is_empty());
        debug_assert!(self.active_segment_idx < self.segments.len());
    }

    /// Reads up to `max_records` records starting at `start_offset`.
    ///
    /// Reading from the log end is not an error: it returns an empty
    /// sequence immediately so callers can poll.
    ///
    /// # Errors
    /// Returns `OffsetOutOfRange` if the offset is below the earliest
    /// retained offset (trimmed away) or beyond the log end.
    pub fn read(&self, start_offset: Offset, max_records: u32) -> LogResult<Vec<Record>> {
        if self.closed {
            return Err(LogError::Closed);
        }

        let start = self.start_offset();
        let end = self.end_offset();

        // Caught up: nothing to return yet, but not an error.
        if start_offset == end {
            return Ok(Vec::new());
        }

        if start_offset < start || start_offset > end {
            return Err(LogError::OffsetOutOfRange {
                offset: start_offset,
                start,
                end,
            });
        }

        if max_records == 0 {
            return Ok(Vec::new());
        }

        // Find the segment containing start_offset.
        let segment_idx = self.find_segment(start_offset);
        debug_assert!(segment_idx < self.segments.len());

        let mut records = Vec::new();
        let mut remaining = max_records;
        let mut current_offset = start_offset;

        for segment in &self.segments[segment_idx..] {
            if remaining == 0 {
                break;
            }

            if segment.record_count() == 0 {
                continue;
            }

            let segment_records = segment.read(current_offset, remaining)?;
            #[allow(clippy::cast_possible_truncation)] // len <= remaining, which is u32.
            let records_len = segment_records.len() as u32;
            remaining -= records_len;

            if let Some(last) = segment_records.last() {
                current_offset = last.offset.next();
            }

            records.extend(segment_records);
        }

        debug_assert!(records.len() <= max_records as usize);

        Ok(records)
    }

    /// Finds the index of the segment containing `offset`.
    ///
    /// Caller must ensure `offset` is within the retained range.
    fn find_segment(&self, offset: Offset) -> usize {
        let idx = self.segments.partition_point(|s| s.base_offset() <= offset);
        debug_assert!(idx > 0);
        idx - 1
    }

    /// Trims retained data so the earliest offset is at least `offset`.
    ///
    /// Only whole segments are dropped; the actual start offset after the
    /// trim may be lower than requested. The active segment is never
    /// dropped.
    pub fn trim_to(&mut self, offset: Offset) {
        while self.segments.len() > 1 {
            let first_spans_trim = self.segments[0].next_offset() > offset;
            if first_spans_trim {
                break;
            }
            self.segments.remove(0);
            self.active_segment_idx -= 1;
        }
    }

    /// Closes the log, sealing all segments.
    pub fn close(&mut self) {
        self.closed = true;
        for segment in &mut self.segments {
            segment.seal();
        }
    }

    /// Returns true if the log is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn make_config() -> PartitionLogConfig {
        PartitionLogConfig::new(PartitionId::new(0))
    }

    fn make_batch(count: usize) -> RecordBatch {
        let mut batch = RecordBatch::new(PartitionId::new(0));
        for i in 0..count {
            batch.push(Record::new(Bytes::from(format!("message-{i}"))));
        }
        batch
    }

    #[test]
    fn test_log_creation() {
        let log = PartitionLog::new(make_config());
        assert_eq!(log.start_offset(), Offset::new(0));
        assert_eq!(log.end_offset(), Offset::new(0));
        assert_eq!(log.record_count(), 0);
    }

    #[test]
    fn test_log_append() {
        let mut log = PartitionLog::new(make_config());

        let offset = log.append_batch(make_batch(3)).unwrap();
        assert_eq!(offset, Offset::new(0));
        assert_eq!(log.end_offset(), Offset::new(3));
    }

    #[test]
    fn test_log_append_offsets_are_dense() {
        let mut log = PartitionLog::new(make_config());

        log.append_batch(make_batch(2)).unwrap();
        let offset = log.append_batch(make_batch(3)).unwrap();

        assert_eq!(offset, Offset::new(2));
        assert_eq!(log.end_offset(), Offset::new(5));

        let records = log.read(Offset::new(0), 10).unwrap();
        let offsets: Vec<u64> = records.iter().map(|r| r.offset.get()).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_log_append_record_assigns_offset_and_timestamp() {
        let mut log = PartitionLog::new(make_config());

        let (offset, timestamp) = log.append_record(Record::new("hello")).unwrap();
        assert_eq!(offset, Offset::new(0));
        assert!(!timestamp.is_none());

        let (offset, _) = log.append_record(Record::new("again")).unwrap();
        assert_eq!(offset, Offset::new(1));
    }

    #[test]
    fn test_log_read_at_end_is_empty() {
        let mut log = PartitionLog::new(make_config());
        log.append_batch(make_batch(5)).unwrap();

        // Reading at the end offset returns empty, not an error.
        let records = log.read(Offset::new(5), 10).unwrap();
        assert!(records.is_empty());

        // Reading past the end is an error.
        assert!(matches!(
            log.read(Offset::new(6), 10),
            Err(LogError::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn test_log_read_partial() {
        let mut log = PartitionLog::new(make_config());
        log.append_batch(make_batch(10)).unwrap();

        let records = log.read(Offset::new(3), 4).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].offset, Offset::new(3));
        assert_eq!(records[3].offset, Offset::new(6));
    }

    #[test]
    fn test_log_rolls_segments() {
        let config = make_config()
            .with_segment_config(SegmentConfig::small_for_testing());
        let mut log = PartitionLog::new(config);

        // Exceed the per-segment record limit several times over.
        for _ in 0..10 {
            log.append_batch(make_batch(8)).unwrap();
        }

        assert_eq!(log.end_offset(), Offset::new(80));

        // Reads span segment boundaries transparently.
        let records = log.read(Offset::new(10), 30).unwrap();
        assert_eq!(records.len(), 30);
        assert_eq!(records[0].offset, Offset::new(10));
        assert_eq!(records[29].offset, Offset::new(39));
    }

    #[test]
    fn test_log_trim_advances_start() {
        let config = make_config()
            .with_segment_config(SegmentConfig::small_for_testing());
        let mut log = PartitionLog::new(config);

        for _ in 0..10 {
            log.append_batch(make_batch(8)).unwrap();
        }

        log.trim_to(Offset::new(40));
        assert!(log.start_offset().get() > 0);
        assert!(log.start_offset().get() <= 40);

        // Reading below the retained range now fails.
        assert!(matches!(
            log.read(Offset::new(0), 10),
            Err(LogError::OffsetOutOfRange { .. })
        ));

        // Reading from the retained range still works.
        let start = log.start_offset();
        let records = log.read(start, 5).unwrap();
        assert_eq!(records[0].offset, start);
    }

    #[test]
    fn test_log_retention_by_segment_count() {
        let config = make_config()
            .with_segment_config(SegmentConfig::small_for_testing())
            .with_max_segments(3);
        let mut log = PartitionLog::new(config);

        for _ in 0..20 {
            log.append_batch(make_batch(8)).unwrap();
        }

        // Old segments were dropped; the start offset moved up.
        assert!(log.start_offset().get() > 0);
        assert_eq!(log.end_offset(), Offset::new(160));
    }

    #[test]
    fn test_log_zero_max_segments_keeps_active() {
        let config = make_config()
            .with_segment_config(SegmentConfig::small_for_testing())
            .with_max_segments(0);
        assert_eq!(config.max_segments, 1);

        let mut log = PartitionLog::new(config);

        // Rolling with the minimum retention must never drop the active
        // segment out from under the writer.
        for _ in 0..10 {
            log.append_batch(make_batch(8)).unwrap();
        }

        assert_eq!(log.end_offset(), Offset::new(80));
        let start = log.start_offset();
        let records = log.read(start, 5).unwrap();
        assert_eq!(records[0].offset, start);
    }

    #[test]
    fn test_log_close() {
        let mut log = PartitionLog::new(make_config());
        log.append_batch(make_batch(3)).unwrap();
        log.close();

        assert!(log.is_closed());
        assert!(matches!(
            log.append_batch(make_batch(1)),
            Err(LogError::Closed)
        ));
        assert!(matches!(log.read(Offset::new(0), 1), Err(LogError::Closed)));
    }
}
