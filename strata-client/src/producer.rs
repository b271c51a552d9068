//! Producer client.
//!
//! The producer routes records to partitions through the broker and
//! reports each append as a `RecordMetadata`. Appends happen in `send`
//! call order, so per-partition delivery order always matches send
//! order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use strata_broker::{Broker, TopicConfig};
use strata_core::{Offset, PartitionId, Timestamp};
use strata_schema::{Schema, TypedRecord};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ClientError, ClientResult};

/// Where an acknowledged record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Topic the record was written to.
    pub topic: String,
    /// Partition the record was routed to.
    pub partition: PartitionId,
    /// Offset assigned by the log.
    pub offset: Offset,
    /// Broker timestamp assigned at append.
    pub timestamp: Timestamp,
}

/// Resolves once the corresponding send is acknowledged or fails.
#[derive(Debug)]
pub struct DeliveryFuture {
    /// Receives the delivery outcome.
    rx: oneshot::Receiver<ClientResult<RecordMetadata>>,
}

impl DeliveryFuture {
    /// Waits for the delivery outcome.
    ///
    /// # Errors
    /// Returns the send's failure, or `Closed` if the producer was
    /// dropped before resolving it.
    pub async fn wait(self) -> ClientResult<RecordMetadata> {
        self.rx.await.unwrap_or(Err(ClientError::Closed))
    }

    /// Waits for the delivery outcome with a deadline.
    ///
    /// # Errors
    /// Returns `Timeout` if the outcome is not available in time.
    pub async fn wait_timeout(self, timeout: Duration) -> ClientResult<RecordMetadata> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                operation: "delivery",
                timeout,
            }),
        }
    }
}

/// Retries `op` on transient errors with exponential backoff.
///
/// Non-transient errors are returned immediately.
pub(crate) async fn with_retry<T, F>(retry: &RetryConfig, mut op: F) -> ClientResult<T>
where
    F: FnMut() -> ClientResult<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < retry.max_attempts => {
                debug!(attempt, error = %err, "transient failure, backing off");
                tokio::time::sleep(retry.backoff(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A producer connected to a broker.
#[derive(Debug)]
pub struct Producer {
    /// The broker handle.
    broker: Arc<Broker>,
    /// Client configuration.
    config: ClientConfig,
    /// Whether the producer has been closed.
    closed: AtomicBool,
}

impl Producer {
    /// Connects a producer to a broker.
    ///
    /// # Errors
    /// Returns `BrokerUnavailable` if no bootstrap address is configured.
    pub fn connect(broker: Arc<Broker>, config: ClientConfig) -> ClientResult<Self> {
        if config.bootstrap.is_empty() {
            return Err(ClientError::BrokerUnavailable {
                message: "no bootstrap addresses configured".to_string(),
            });
        }

        info!(bootstrap = ?config.bootstrap, "producer connected");

        Ok(Self {
            broker,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Creates a topic.
    ///
    /// # Errors
    /// Returns `TopicAlreadyExists` if the topic exists; creation is
    /// explicit so callers decide whether that is a failure.
    pub fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication_factor: u32,
    ) -> ClientResult<()> {
        self.check_open()?;
        let config = TopicConfig::new(name, partitions).with_replication_factor(replication_factor);
        self.broker.create_topic(config)?;
        Ok(())
    }

    /// Sends a record, returning a future that resolves to its metadata.
    ///
    /// The append itself happens before this method returns, so calling
    /// `send` twice for the same key delivers in call order; the future
    /// only carries the outcome.
    pub fn send(&self, topic: &str, key: Option<Bytes>, value: Bytes) -> DeliveryFuture {
        let (tx, rx) = oneshot::channel();

        let result = self.try_send(topic, key, value);
        // The receiver may have been dropped; delivery still happened.
        drop(tx.send(result));

        DeliveryFuture { rx }
    }

    /// Sends a record and waits for its metadata, retrying transient
    /// failures with exponential backoff.
    ///
    /// # Errors
    /// Returns the underlying send failure once retries are exhausted.
    pub async fn send_sync(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> ClientResult<RecordMetadata> {
        with_retry(&self.config.retry, || {
            self.try_send(topic, key.clone(), value.clone())
        })
        .await
    }

    /// Validates a typed record against a schema, encodes it, and sends
    /// the bytes.
    ///
    /// # Errors
    /// Returns `SchemaValidation` without sending anything if the record
    /// does not satisfy the schema.
    pub fn send_typed(
        &self,
        topic: &str,
        key: Option<Bytes>,
        schema: &Schema,
        record: &TypedRecord,
    ) -> ClientResult<DeliveryFuture> {
        let value = schema.validate_and_encode(record)?;
        Ok(self.send(topic, key, value))
    }

    /// Waits until every outstanding send is acknowledged.
    ///
    /// Appends complete inside `send`, so once `flush` is reached all
    /// previously sent records are already in the log; this only fails
    /// if the producer is closed.
    ///
    /// # Errors
    /// Returns `Closed` if the producer has been closed.
    pub fn flush(&self) -> ClientResult<()> {
        self.check_open()
    }

    /// Closes the producer. Further sends fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("producer closed");
    }

    /// Returns true if the producer has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Performs one routed append.
    fn try_send(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: Bytes,
    ) -> ClientResult<RecordMetadata> {
        self.check_open()?;

        let (partition, offset, timestamp) = self.broker.append_routed(topic, key, value)?;

        Ok(RecordMetadata {
            topic: topic.to_string(),
            partition,
            offset,
            timestamp,
        })
    }

    /// Fails with `Closed` if the producer has been closed.
    fn check_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_broker::BrokerConfig;
    use strata_schema::{FieldDef, FieldType, FieldValue};

    fn make_producer() -> Producer {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        let producer =
            Producer::connect(broker, ClientConfig::fast_for_testing()).unwrap();
        producer.create_topic("orders", 3, 1).unwrap();
        producer
    }

    #[test]
    fn test_connect_requires_bootstrap() {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        let config = ClientConfig::new(Vec::new());
        let result = Producer::connect(broker, config);
        assert!(matches!(result, Err(ClientError::BrokerUnavailable { .. })));
    }

    #[test]
    fn test_create_topic_duplicate() {
        let producer = make_producer();
        let result = producer.create_topic("orders", 3, 1);
        assert!(matches!(result, Err(ClientError::TopicAlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_send_keyed_preserves_order() {
        let producer = make_producer();

        let mut metadata = Vec::new();
        for i in 0..5 {
            let delivery = producer.send(
                "orders",
                Some(Bytes::from("A")),
                Bytes::from(format!("payload-{i}")),
            );
            metadata.push(delivery.wait().await.unwrap());
        }

        let partition = metadata[0].partition;
        for (i, m) in metadata.iter().enumerate() {
            assert_eq!(m.partition, partition);
            assert_eq!(m.offset.get(), i as u64);
        }
    }

    #[tokio::test]
    async fn test_send_sync() {
        let producer = make_producer();

        let metadata = producer
            .send_sync("orders", None, Bytes::from("hello"))
            .await
            .unwrap();
        assert_eq!(metadata.topic, "orders");
        assert_eq!(metadata.offset, Offset::new(0));
    }

    #[tokio::test]
    async fn test_send_unknown_topic() {
        let producer = make_producer();
        let result = producer.send("missing", None, Bytes::from("x")).wait().await;
        assert!(matches!(
            result,
            Err(ClientError::UnknownTopicOrPartition { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let producer = make_producer();
        producer.close();

        let result = producer.send("orders", None, Bytes::from("x")).wait().await;
        assert!(matches!(result, Err(ClientError::Closed)));
        assert!(matches!(producer.flush(), Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_send_typed_rejects_invalid_record() {
        let producer = make_producer();
        let schema = Schema::new(
            "customer",
            1,
            vec![FieldDef::required("first_name", FieldType::String)],
        )
        .unwrap();

        // Missing required field: rejected before anything is sent.
        let record = TypedRecord::new();
        let result = producer.send_typed("orders", None, &schema, &record);
        assert!(matches!(result, Err(ClientError::SchemaValidation(_))));

        let mut record = TypedRecord::new();
        record.set("first_name", FieldValue::Str("Ada".to_string()));
        let delivery = producer.send_typed("orders", None, &schema, &record).unwrap();
        let metadata = delivery.wait().await.unwrap();
        assert_eq!(metadata.offset, Offset::new(0));
    }
}
