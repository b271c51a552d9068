//! Consumer client.
//!
//! A consumer joins a group, receives a partition assignment, and polls
//! records from its partitions. Positions start from the group's
//! committed offsets, falling back to the reset policy, and move forward
//! as records are returned. Commits are manual or on an interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use strata_broker::Broker;
use strata_core::{Offset, PartitionId, Timestamp};
use strata_group::{GroupCoordinator, Membership, ResetPolicy};
use strata_schema::{Schema, TypedRecord};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Granularity of the multi-partition poll wait.
const POLL_SPIN_INTERVAL: Duration = Duration::from_millis(5);

/// A record returned by `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    /// Topic the record came from.
    pub topic: String,
    /// Partition the record came from.
    pub partition: PartitionId,
    /// Offset within the partition.
    pub offset: Offset,
    /// Record key, if any.
    pub key: Option<Bytes>,
    /// Record payload.
    pub value: Bytes,
    /// Broker timestamp.
    pub timestamp: Timestamp,
}

impl ConsumerRecord {
    /// Decodes the payload as a typed record under `schema`.
    ///
    /// # Errors
    /// Returns `SchemaValidation` if the payload is not valid under the
    /// schema's wire format.
    pub fn decode_typed(&self, schema: &Schema) -> ClientResult<TypedRecord> {
        Ok(schema.decode(&self.value)?)
    }
}

/// A consumer participating in a consumer group.
#[derive(Debug)]
pub struct Consumer {
    /// The broker handle.
    broker: Arc<Broker>,
    /// The group coordinator.
    coordinator: Arc<GroupCoordinator>,
    /// Consumer group name.
    group: String,
    /// Client configuration.
    config: ClientConfig,
    /// Group membership, set by `subscribe`.
    membership: Option<Membership>,
    /// Subscribed topics.
    topics: Vec<String>,
    /// Currently assigned topic partitions.
    assignments: Vec<(String, PartitionId)>,
    /// Generation the assignments were computed for.
    generation: u64,
    /// Next offset to read per assigned partition.
    positions: HashMap<(String, PartitionId), Offset>,
    /// When the last (auto-)commit happened.
    last_commit: Instant,
    /// Whether the consumer has been closed.
    closed: bool,
}

impl Consumer {
    /// Connects a consumer for the given group.
    ///
    /// # Errors
    /// Returns `BrokerUnavailable` if no bootstrap address is configured.
    pub fn connect(
        broker: Arc<Broker>,
        coordinator: Arc<GroupCoordinator>,
        group: impl Into<String>,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        if config.bootstrap.is_empty() {
            return Err(ClientError::BrokerUnavailable {
                message: "no bootstrap addresses configured".to_string(),
            });
        }

        let group = group.into();
        info!(group = %group, "consumer connected");

        Ok(Self {
            broker,
            coordinator,
            group,
            config,
            membership: None,
            topics: Vec::new(),
            assignments: Vec::new(),
            generation: 0,
            positions: HashMap::new(),
            last_commit: Instant::now(),
            closed: false,
        })
    }

    /// Subscribes to topics, joining the group.
    ///
    /// # Errors
    /// Returns an error if the group is full or a topic is unknown.
    pub fn subscribe(&mut self, topics: Vec<String>) -> ClientResult<()> {
        self.check_open()?;

        if self.membership.is_none() {
            let membership = self.coordinator.join(&self.group)?;
            info!(
                group = %self.group,
                member = %membership.member_id,
                "joined group"
            );
            self.membership = Some(membership);
        }

        self.topics = topics;
        self.refresh_assignments()?;

        Ok(())
    }

    /// Returns the partitions currently assigned to this consumer.
    #[must_use]
    pub fn assignments(&self) -> &[(String, PartitionId)] {
        &self.assignments
    }

    /// Returns the next offset this consumer will read for a partition.
    #[must_use]
    pub fn position(&self, topic: &str, partition: PartitionId) -> Option<Offset> {
        self.positions.get(&(topic.to_string(), partition)).copied()
    }

    /// Polls for records, waiting up to `timeout`.
    ///
    /// Returns as soon as at least one record is available; returns an
    /// empty vec when the timeout elapses with nothing to read. A timeout
    /// is not an error.
    ///
    /// # Errors
    /// Returns an error if the consumer is unsubscribed, a position falls
    /// outside the retained log range, or a commit fails.
    pub async fn poll(&mut self, timeout: Duration) -> ClientResult<Vec<ConsumerRecord>> {
        self.check_open()?;
        if self.membership.is_none() {
            return Err(ClientError::InvalidRequest {
                message: "subscribe before polling".to_string(),
            });
        }

        let deadline = Instant::now() + timeout;

        loop {
            self.refresh_assignments()?;

            let records = self.fetch_once()?;
            if !records.is_empty() {
                self.maybe_auto_commit()?;
                return Ok(records);
            }

            let now = Instant::now();
            if now >= deadline {
                self.maybe_auto_commit()?;
                return Ok(Vec::new());
            }
            let remaining = deadline - now;

            if let [(topic, partition)] = self.assignments.as_slice() {
                // Single partition: block on the broker's wakeup instead
                // of spinning.
                let key = (topic.clone(), *partition);
                let position = self.positions.get(&key).copied().unwrap_or_default();
                let records = self
                    .broker
                    .wait_for_records(
                        topic,
                        *partition,
                        position,
                        self.config.poll_records_max,
                        remaining,
                    )
                    .await?;

                if !records.is_empty() {
                    let consumed = self.take_records(&key.0, key.1, records);
                    self.maybe_auto_commit()?;
                    return Ok(consumed);
                }
            } else {
                tokio::time::sleep(remaining.min(POLL_SPIN_INTERVAL)).await;
            }
        }
    }

    /// Commits the current positions for all assigned partitions.
    ///
    /// # Errors
    /// Returns `StaleCommit` if a stored offset is already ahead.
    pub fn commit(&mut self) -> ClientResult<()> {
        self.check_open()?;

        for (topic, partition) in self.assignments.clone() {
            let key = (topic, partition);
            if let Some(position) = self.positions.get(&key).copied() {
                self.coordinator
                    .commit(&self.group, &key.0, partition, position, false)?;
            }
        }

        self.last_commit = Instant::now();
        debug!(group = %self.group, "positions committed");

        Ok(())
    }

    /// Commits an explicit offset for one partition.
    ///
    /// With `reset` set, the offset may move backward; otherwise a lower
    /// offset than the stored one fails with `StaleCommit`. A committed
    /// offset may be at most the partition's end offset (the next offset
    /// to read once everything is consumed); anything past that names a
    /// record that does not exist.
    ///
    /// # Errors
    /// Returns `StaleCommit`, `OffsetOutOfRange`, or a store error.
    pub fn commit_offset(
        &mut self,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
        reset: bool,
    ) -> ClientResult<()> {
        self.check_open()?;

        let end = self.broker.latest_offset(topic, partition)?;
        if offset > end {
            let start = self.broker.earliest_offset(topic, partition)?;
            return Err(ClientError::OffsetOutOfRange { offset, start, end });
        }

        self.coordinator
            .commit(&self.group, topic, partition, offset, reset)?;

        if reset {
            // A reset also moves the local position so the next poll
            // starts from the new offset.
            self.positions.insert((topic.to_string(), partition), offset);
        }

        Ok(())
    }

    /// Fetches the committed offset for a partition.
    ///
    /// # Errors
    /// Returns a store error.
    pub fn committed(&self, topic: &str, partition: PartitionId) -> ClientResult<Option<Offset>> {
        Ok(self.coordinator.fetch_committed(&self.group, topic, partition)?)
    }

    /// Polls in a loop until the shutdown signal flips to `true`.
    ///
    /// Records are handed to `handler` in order. On shutdown the current
    /// positions are committed before returning.
    ///
    /// # Errors
    /// Returns the first poll or commit failure.
    pub async fn run_poll_loop<F>(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        poll_timeout: Duration,
        mut handler: F,
    ) -> ClientResult<()>
    where
        F: FnMut(ConsumerRecord),
    {
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = self.poll(poll_timeout) => {
                    for record in result? {
                        handler(record);
                    }
                }
            }
        }

        self.commit()?;
        info!(group = %self.group, "poll loop stopped");

        Ok(())
    }

    /// Commits positions and leaves the group.
    ///
    /// # Errors
    /// Returns a commit or coordinator failure; the consumer is closed
    /// either way.
    pub fn close(&mut self) -> ClientResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = self.commit();
        if let Some(membership) = self.membership.take() {
            self.coordinator.leave(&self.group, membership.member_id)?;
        }
        self.closed = true;
        info!(group = %self.group, "consumer closed");

        result
    }

    /// Recomputes assignments when the group generation has moved.
    fn refresh_assignments(&mut self) -> ClientResult<()> {
        let Some(membership) = self.membership else {
            return Ok(());
        };

        let generation = self.coordinator.generation(&self.group)?;
        if generation == self.generation && !self.assignments.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::new();
        for topic in self.topics.clone() {
            let partition_count = self.broker.partition_count(&topic)?;
            let assigned =
                self.coordinator
                    .assignment(&self.group, membership.member_id, partition_count)?;
            for partition in assigned {
                assignments.push((topic.clone(), partition));
            }
        }

        // Resolve start positions for newly acquired partitions.
        for (topic, partition) in &assignments {
            let key = (topic.clone(), *partition);
            if self.positions.contains_key(&key) {
                continue;
            }

            let position = match self.coordinator.fetch_committed(&self.group, topic, *partition)? {
                Some(committed) => committed,
                None => match self.config.reset_policy {
                    ResetPolicy::Earliest => self.broker.earliest_offset(topic, *partition)?,
                    ResetPolicy::Latest => self.broker.latest_offset(topic, *partition)?,
                },
            };
            self.positions.insert(key, position);
        }

        // Drop positions for revoked partitions.
        self.positions
            .retain(|key, _| assignments.iter().any(|(t, p)| (t, p) == (&key.0, &key.1)));

        debug!(
            group = %self.group,
            generation,
            partitions = assignments.len(),
            "assignments refreshed"
        );

        self.assignments = assignments;
        self.generation = generation;

        Ok(())
    }

    /// Reads each assigned partition once, non-blocking.
    fn fetch_once(&mut self) -> ClientResult<Vec<ConsumerRecord>> {
        let mut records = Vec::new();

        for (topic, partition) in self.assignments.clone() {
            #[allow(clippy::cast_possible_truncation)] // records.len() <= poll_records_max.
            let budget = self.config.poll_records_max - records.len() as u32;
            if budget == 0 {
                break;
            }

            let key = (topic, partition);
            let position = self.positions.get(&key).copied().unwrap_or_default();
            let fetched = self.broker.read(&key.0, partition, position, budget)?;
            if !fetched.is_empty() {
                records.extend(self.take_records(&key.0, partition, fetched));
            }
        }

        Ok(records)
    }

    /// Converts raw records and advances the partition position.
    fn take_records(
        &mut self,
        topic: &str,
        partition: PartitionId,
        records: Vec<strata_core::Record>,
    ) -> Vec<ConsumerRecord> {
        if let Some(last) = records.last() {
            self.positions
                .insert((topic.to_string(), partition), last.offset.next());
        }

        records
            .into_iter()
            .map(|r| ConsumerRecord {
                topic: topic.to_string(),
                partition,
                offset: r.offset,
                key: r.key,
                value: r.value,
                timestamp: r.timestamp,
            })
            .collect()
    }

    /// Commits if the auto-commit interval has elapsed.
    fn maybe_auto_commit(&mut self) -> ClientResult<()> {
        if let Some(interval) = self.config.auto_commit_interval {
            if self.last_commit.elapsed() >= interval {
                self.commit()?;
            }
        }
        Ok(())
    }

    /// Fails with `Closed` if the consumer has been closed.
    fn check_open(&self) -> ClientResult<()> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use strata_broker::{BrokerConfig, TopicConfig};
    use strata_group::GroupCoordinatorConfig;

    fn make_cluster() -> (Arc<Broker>, Arc<GroupCoordinator>) {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        broker.create_topic(TopicConfig::new("orders", 3)).unwrap();
        let coordinator = Arc::new(GroupCoordinator::new(GroupCoordinatorConfig::default()));
        (broker, coordinator)
    }

    fn make_consumer(broker: &Arc<Broker>, coordinator: &Arc<GroupCoordinator>) -> Consumer {
        Consumer::connect(
            Arc::clone(broker),
            Arc::clone(coordinator),
            "g1",
            ClientConfig::fast_for_testing().with_auto_commit_interval(None),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_poll_requires_subscribe() {
        let (broker, coordinator) = make_cluster();
        let mut consumer = make_consumer(&broker, &coordinator);

        let result = consumer.poll(Duration::from_millis(1)).await;
        assert!(matches!(result, Err(ClientError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_single_consumer_owns_all_partitions() {
        let (broker, coordinator) = make_cluster();
        let mut consumer = make_consumer(&broker, &coordinator);

        consumer.subscribe(vec!["orders".to_string()]).unwrap();
        assert_eq!(consumer.assignments().len(), 3);
    }

    #[tokio::test]
    async fn test_poll_reads_produced_records() {
        let (broker, coordinator) = make_cluster();

        for i in 0..5 {
            broker
                .append_routed("orders", Some(Bytes::from("A")), Bytes::from(format!("v{i}")))
                .unwrap();
        }

        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["orders".to_string()]).unwrap();

        let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.offset.get(), i as u64);
            assert_eq!(record.value, Bytes::from(format!("v{i}")));
        }
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let (broker, coordinator) = make_cluster();
        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["orders".to_string()]).unwrap();

        let records = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_commit_and_resume() {
        let (broker, coordinator) = make_cluster();

        for i in 0..4 {
            broker
                .append_routed("orders", Some(Bytes::from("A")), Bytes::from(format!("v{i}")))
                .unwrap();
        }

        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["orders".to_string()]).unwrap();
        let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(records.len(), 4);
        consumer.commit().unwrap();
        consumer.close().unwrap();

        // A new consumer in the same group resumes after the commit.
        broker
            .append_routed("orders", Some(Bytes::from("A")), Bytes::from("v4"))
            .unwrap();

        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["orders".to_string()]).unwrap();
        let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, Bytes::from("v4"));
    }

    #[tokio::test]
    async fn test_commit_offset_beyond_log_end_rejected() {
        let (broker, coordinator) = make_cluster();
        broker.create_topic(TopicConfig::new("single", 1)).unwrap();

        for i in 0..2 {
            broker
                .append_routed("single", None, Bytes::from(format!("v{i}")))
                .unwrap();
        }

        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["single".to_string()]).unwrap();
        let partition = consumer.assignments()[0].1;

        // Committing the end offset (everything consumed) is allowed.
        consumer
            .commit_offset("single", partition, Offset::new(2), false)
            .unwrap();

        // Committing past the end names a record that does not exist,
        // even as an explicit reset.
        for reset in [false, true] {
            let result = consumer.commit_offset("single", partition, Offset::new(3), reset);
            assert!(matches!(
                result,
                Err(ClientError::OffsetOutOfRange { offset, end, .. })
                    if offset == Offset::new(3) && end == Offset::new(2)
            ));
        }

        // The stored offset is unchanged by the rejected commits.
        assert_eq!(
            consumer.committed("single", partition).unwrap(),
            Some(Offset::new(2))
        );
    }

    #[tokio::test]
    async fn test_latest_reset_skips_existing_records() {
        let (broker, coordinator) = make_cluster();

        broker
            .append_routed("orders", Some(Bytes::from("A")), Bytes::from("old"))
            .unwrap();

        let mut consumer = Consumer::connect(
            Arc::clone(&broker),
            Arc::clone(&coordinator),
            "g-latest",
            ClientConfig::fast_for_testing()
                .with_auto_commit_interval(None)
                .with_reset_policy(ResetPolicy::Latest),
        )
        .unwrap();
        consumer.subscribe(vec!["orders".to_string()]).unwrap();

        let records = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(records.is_empty());

        broker
            .append_routed("orders", Some(Bytes::from("A")), Bytes::from("new"))
            .unwrap();
        let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_rebalance_on_second_join() {
        let (broker, coordinator) = make_cluster();
        broker.create_topic(TopicConfig::new("events", 4)).unwrap();

        let mut first = make_consumer(&broker, &coordinator);
        first.subscribe(vec!["events".to_string()]).unwrap();
        assert_eq!(first.assignments().len(), 4);

        let mut second = make_consumer(&broker, &coordinator);
        second.subscribe(vec!["events".to_string()]).unwrap();

        // First consumer picks up the new generation on its next poll.
        first.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.assignments().len(), 2);
        assert_eq!(second.assignments().len(), 2);
    }

    #[tokio::test]
    async fn test_run_poll_loop_stops_on_shutdown() {
        let (broker, coordinator) = make_cluster();

        for i in 0..3 {
            broker
                .append_routed("orders", None, Bytes::from(format!("v{i}")))
                .unwrap();
        }

        let mut consumer = make_consumer(&broker, &coordinator);
        consumer.subscribe(vec!["orders".to_string()]).unwrap();

        let (tx, rx) = watch::channel(false);
        let mut seen = Vec::new();

        let loop_task = async {
            consumer
                .run_poll_loop(rx, Duration::from_millis(10), |record| {
                    seen.push(record.value.clone());
                })
                .await
        };

        let shutdown_task = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        };

        let (result, ()) = tokio::join!(loop_task, shutdown_task);
        result.unwrap();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_auto_commit_on_interval() {
        let (broker, coordinator) = make_cluster();

        broker
            .append_routed("orders", Some(Bytes::from("A")), Bytes::from("v0"))
            .unwrap();

        let mut consumer = Consumer::connect(
            Arc::clone(&broker),
            Arc::clone(&coordinator),
            "g1",
            ClientConfig::fast_for_testing()
                .with_auto_commit_interval(Some(Duration::from_millis(10))),
        )
        .unwrap();
        consumer.subscribe(vec!["orders".to_string()]).unwrap();

        let records = consumer.poll(Duration::from_millis(50)).await.unwrap();
        assert_eq!(records.len(), 1);
        let partition = records[0].partition;

        // Let the interval elapse; the next poll commits.
        tokio::time::sleep(Duration::from_millis(20)).await;
        consumer.poll(Duration::from_millis(5)).await.unwrap();

        assert_eq!(
            consumer.committed("orders", partition).unwrap(),
            Some(Offset::new(1))
        );
    }
}
