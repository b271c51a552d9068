//! Strata Log - append-only partition log storage.
//!
//! This crate provides the partition log abstraction: an ordered,
//! append-only sequence of records with dense offsets assigned at append
//! time. Each partition log is backed by one or more in-memory segments.
//!
//! # Operations
//!
//! - `append`: Add a batch of records to the end of the log
//! - `read`: Fetch records starting from an offset (non-blocking)
//! - `trim_to`: Drop whole segments below a retention boundary
//!
//! # Invariants
//!
//! - Offsets form 0,1,2,... per partition with no gaps or reordering
//! - Records are immutable once appended
//! - Reading from the log end returns an empty sequence, never blocks
//! - CRC checksums on all batch data

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod partition;
mod segment;

pub use error::{LogError, LogResult};
pub use partition::{PartitionLog, PartitionLogConfig};
pub use segment::{LogSegment, SegmentConfig, SegmentReader};
