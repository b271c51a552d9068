//! Strongly-typed identifiers for Strata entities.
//!
//! Topics and consumer groups are addressed by name at the API boundary,
//! so only the numeric identities get newtypes here. Explicit types prevent
//! bugs from mixing up IDs.

use std::fmt;

/// Macro to generate strongly-typed ID wrappers.
///
/// Each ID type wraps a u64 and provides:
/// - Type safety (can't mix `PartitionId` with `MemberId`)
/// - Debug/Display formatting
/// - Zero-cost abstraction (same as raw u64)
macro_rules! define_id {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new ID from a raw u64 value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw u64 value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the next ID in sequence.
            ///
            /// # Panics
            /// Panics if the ID would overflow.
            #[inline]
            #[must_use]
            pub const fn next(self) -> Self {
                assert!(self.0 < u64::MAX, "ID overflow");
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

define_id!(
    PartitionId,
    "partition",
    "Index of a partition within a topic."
);
define_id!(
    MemberId,
    "member",
    "Unique identifier for a member within a consumer group."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_type_safety() {
        let partition = PartitionId::new(1);
        let member = MemberId::new(1);

        // These are different types even with same value.
        assert_eq!(partition.get(), member.get());
        // But they can't be compared directly (won't compile):
        // assert_ne!(partition, member);
    }

    #[test]
    fn test_id_display() {
        let partition = PartitionId::new(2);
        assert_eq!(format!("{partition}"), "partition-2");
        assert_eq!(format!("{partition:?}"), "partition(2)");
    }

    #[test]
    fn test_id_next() {
        let id = MemberId::new(0);
        assert_eq!(id.next().get(), 1);
        assert_eq!(id.next().next().get(), 2);
    }

    #[test]
    #[should_panic(expected = "ID overflow")]
    fn test_id_overflow_panics() {
        let id = PartitionId::new(u64::MAX);
        let _ = id.next();
    }
}
