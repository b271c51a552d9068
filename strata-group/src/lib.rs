//! Strata Group - consumer group coordination.
//!
//! The group coordinator tracks which consumers belong to which group,
//! assigns partitions to members, and records committed offsets so a
//! group can resume where it left off.
//!
//! # Operations
//!
//! - `join` / `leave`: Group membership; each change bumps the group
//!   generation and triggers a rebalance
//! - `assignment`: Range assignment of partitions to a member
//! - `commit` / `fetch_committed`: Monotonic committed-offset tracking
//!
//! # Invariants
//!
//! - Within one generation, no partition is assigned to two members
//! - Assignment sizes differ by at most one across members
//! - Committed offsets only move backward when explicitly reset

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod assign;
mod coordinator;
mod error;
mod state;
mod store;

pub use assign::range_assignment;
pub use coordinator::{GroupCoordinator, GroupCoordinatorConfig, Membership};
pub use error::{GroupError, GroupResult};
pub use state::{MemberState, ResetPolicy};
pub use store::{CommittedOffsets, FileOffsetStore, MemoryOffsetStore, OffsetStore};
