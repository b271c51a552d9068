//! Strata Client - producer and consumer APIs.
//!
//! Clients hold an in-process handle to a broker and, for consumers, a
//! group coordinator. Every failure surfaces as a typed [`ClientError`];
//! transient failures are retried with exponential backoff, everything
//! else is returned immediately.
//!
//! # Producer
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use bytes::Bytes;
//! # use strata_broker::{Broker, BrokerConfig};
//! # use strata_client::{ClientConfig, Producer};
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = Arc::new(Broker::new(BrokerConfig::default()));
//! let producer = Producer::connect(
//!     Arc::clone(&broker),
//!     ClientConfig::new(vec!["broker-1:9092".to_string()]),
//! )?;
//! producer.create_topic("orders", 3, 1)?;
//!
//! let metadata = producer
//!     .send("orders", Some(Bytes::from("A")), Bytes::from("payload"))
//!     .wait()
//!     .await?;
//! println!("delivered to {} at {}", metadata.partition, metadata.offset);
//! # Ok(()) }
//! ```
//!
//! # Consumer
//!
//! Consumers join a group, get a partition assignment, and poll with a
//! bounded timeout. The poll loop is cancellable through a watch signal.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod consumer;
mod error;
mod producer;

pub use config::{ClientConfig, RetryConfig};
pub use consumer::{Consumer, ConsumerRecord};
pub use error::{ClientError, ClientResult};
pub use producer::{DeliveryFuture, Producer, RecordMetadata};
