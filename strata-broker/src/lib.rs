//! Strata Broker - the dispatcher between clients and partition logs.
//!
//! The broker owns topic metadata and routes every produced record to a
//! partition: keyed records by a stable hash of the key, keyless records
//! round-robin. It holds no record data itself beyond the partition logs
//! it manages.
//!
//! # Operations
//!
//! - `create_topic`: Register a topic with a fixed partition count
//! - `append` / `append_routed`: Write records, routing by key if needed
//! - `read`: Fetch records from a partition (non-blocking)
//! - `wait_for_records`: Bounded async wait for new data (poll support)
//!
//! # Concurrency
//!
//! Appends to different partitions proceed in parallel. Appends to the
//! same partition are serialized through that partition's lock. Reads
//! clone records out under a short lock so they never block appends for
//! long.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;
mod error;
mod router;
mod topic;

pub use broker::{Broker, BrokerConfig};
pub use error::{BrokerError, BrokerResult};
pub use router::partition_for_key;
pub use topic::{Topic, TopicConfig};
