//! Strata Core - typed identifiers, record wire format, and limits.
//!
//! This crate provides the shared vocabulary for the Strata broker:
//! strongly-typed IDs, the record/batch wire format, and explicit
//! resource limits. It has no opinion about storage or transport.
//!
//! # Design Principles
//!
//! - **Strongly-typed IDs**: Prevent mixing up `PartitionId` with `MemberId`
//! - **Explicit limits**: Every resource has a bounded maximum
//! - **Deterministic encoding**: Identical records always produce identical
//!   bytes
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod limits;
mod record;
mod types;

pub use limits::{InvalidLimit, Limits};
pub use record::{Offset, Record, RecordBatch, RecordTooLarge, Timestamp};
pub use types::{MemberId, PartitionId};
