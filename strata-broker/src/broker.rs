//! The broker dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use strata_core::{Limits, Offset, PartitionId, Record, Timestamp};
use strata_log::SegmentConfig;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::router::partition_for_key;
use crate::topic::{Topic, TopicConfig};

/// Broker configuration.
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Resource limits applied to incoming records.
    pub limits: Limits,
    /// Segment configuration for new partition logs.
    pub segment_config: SegmentConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::new(),
            segment_config: SegmentConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Sets the limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the segment configuration.
    #[must_use]
    pub const fn with_segment_config(mut self, segment_config: SegmentConfig) -> Self {
        self.segment_config = segment_config;
        self
    }

    /// Creates a configuration with tiny segments so tests roll quickly.
    #[must_use]
    pub fn small_for_testing() -> Self {
        Self::default().with_segment_config(SegmentConfig::small_for_testing())
    }
}

/// The broker: topic metadata plus the dispatch layer over partition logs.
///
/// All methods take `&self`; the broker is designed to be shared behind an
/// `Arc` between producers and consumers in the same process.
#[derive(Debug)]
pub struct Broker {
    /// Configuration.
    config: BrokerConfig,
    /// Topic metadata, keyed by name.
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    /// Whether the broker has been closed.
    closed: AtomicBool,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Broker {
    /// Creates a new broker.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a topic.
    ///
    /// # Errors
    /// Returns `TopicAlreadyExists` if a topic with this name exists.
    /// Repeat creation never leaks partition state.
    pub fn create_topic(&self, config: TopicConfig) -> BrokerResult<()> {
        self.check_open()?;
        config.validate()?;

        let mut topics = self
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if topics.contains_key(&config.name) {
            return Err(BrokerError::TopicAlreadyExists {
                topic: config.name,
            });
        }

        info!(
            topic = %config.name,
            partitions = config.partitions,
            "created topic"
        );

        let name = config.name.clone();
        let topic = Arc::new(Topic::new(config, self.config.segment_config));
        topics.insert(name, topic);

        Ok(())
    }

    /// Returns the names of all topics.
    #[must_use]
    pub fn topic_names(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the partition count for a topic.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` if the topic does not exist.
    pub fn partition_count(&self, topic: &str) -> BrokerResult<u32> {
        Ok(self.topic(topic)?.partition_count())
    }

    /// Routes a record to a partition.
    ///
    /// Keyed records hash to a stable partition; keyless records
    /// round-robin across the topic's partitions.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` if the topic does not exist.
    pub fn route(&self, topic: &str, key: Option<&[u8]>) -> BrokerResult<PartitionId> {
        let topic = self.topic(topic)?;
        let partition = key.map_or_else(
            || topic.next_keyless_partition(),
            |key| partition_for_key(key, topic.partition_count()),
        );

        debug_assert!(partition.get() < u64::from(topic.partition_count()));

        Ok(partition)
    }

    /// Appends a record to a specific partition.
    ///
    /// Returns the assigned offset and the broker timestamp.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition`, `RecordTooLarge`, or a log error.
    pub fn append(
        &self,
        topic: &str,
        partition: PartitionId,
        record: Record,
    ) -> BrokerResult<(Offset, Timestamp)> {
        self.check_open()?;
        record.validate(&self.config.limits)?;

        let topic_ref = self.topic(topic)?;
        let slot = topic_ref.slot(partition)?;

        let result = {
            let mut log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
            log.append_record(record)?
        };

        // Wake anyone blocked in wait_for_records on this partition.
        slot.data_arrived.notify_waiters();

        debug!(
            topic,
            partition = partition.get(),
            offset = result.0.get(),
            "appended record"
        );

        Ok(result)
    }

    /// Routes a record by key and appends it.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition`, `RecordTooLarge`, or a log error.
    pub fn append_routed(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> BrokerResult<(PartitionId, Offset, Timestamp)> {
        let partition = self.route(topic, key.as_deref())?;

        let record = match key {
            Some(key) => Record::with_key(key, value),
            None => Record::new(value),
        };

        let (offset, timestamp) = self.append(topic, partition, record)?;
        Ok((partition, offset, timestamp))
    }

    /// Reads up to `max_records` records from a partition.
    ///
    /// Reading at the log end returns an empty vec immediately.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` or `OffsetOutOfRange`.
    pub fn read(
        &self,
        topic: &str,
        partition: PartitionId,
        from: Offset,
        max_records: u32,
    ) -> BrokerResult<Vec<Record>> {
        self.check_open()?;

        let topic_ref = self.topic(topic)?;
        let slot = topic_ref.slot(partition)?;

        let log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(log.read(from, max_records)?)
    }

    /// Returns the earliest retained offset of a partition.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` if the topic or partition is unknown.
    pub fn earliest_offset(&self, topic: &str, partition: PartitionId) -> BrokerResult<Offset> {
        let topic_ref = self.topic(topic)?;
        let slot = topic_ref.slot(partition)?;
        let log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(log.start_offset())
    }

    /// Returns the log end offset of a partition (next offset to assign).
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` if the topic or partition is unknown.
    pub fn latest_offset(&self, topic: &str, partition: PartitionId) -> BrokerResult<Offset> {
        let topic_ref = self.topic(topic)?;
        let slot = topic_ref.slot(partition)?;
        let log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(log.end_offset())
    }

    /// Waits up to `timeout` for records at or after `from`.
    ///
    /// Returns as soon as at least one record is available. Returns an
    /// empty vec if the timeout elapses first; a timeout is not an error.
    ///
    /// # Errors
    /// Returns `UnknownTopicOrPartition` or `OffsetOutOfRange`.
    pub async fn wait_for_records(
        &self,
        topic: &str,
        partition: PartitionId,
        from: Offset,
        max_records: u32,
        timeout: Duration,
    ) -> BrokerResult<Vec<Record>> {
        let deadline = Instant::now() + timeout;
        let topic_ref = self.topic(topic)?;

        loop {
            let slot = topic_ref.slot(partition)?;

            // Arm the wakeup before checking, so an append between the
            // check and the await is not missed.
            let notified = slot.data_arrived.notified();

            self.check_open()?;
            let records = {
                let log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
                log.read(from, max_records)?
            };

            if !records.is_empty() {
                return Ok(records);
            }

            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }

    /// Closes the broker.
    ///
    /// Pending waiters are woken; subsequent operations fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        for topic in topics.values() {
            for p in 0..topic.partition_count() {
                if let Ok(slot) = topic.slot(PartitionId::new(u64::from(p))) {
                    let mut log = slot.log.lock().unwrap_or_else(PoisonError::into_inner);
                    log.close();
                    slot.data_arrived.notify_waiters();
                }
            }
        }

        info!("broker closed");
    }

    /// Returns true if the broker has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Looks up a topic by name.
    fn topic(&self, name: &str) -> BrokerResult<Arc<Topic>> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::unknown_topic(name))
    }

    /// Fails with `Closed` if the broker has been closed.
    fn check_open(&self) -> BrokerResult<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}
