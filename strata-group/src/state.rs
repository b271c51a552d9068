//! Member lifecycle and reset policy.

/// Where a consumer starts when the group has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Start from the earliest retained offset.
    #[default]
    Earliest,
    /// Start from the log end (only new records).
    Latest,
}

/// Lifecycle state of a group member.
///
/// ```text
/// Unjoined -> Joining -> Stable <-> Rebalancing
///                          |            |
///                          +-> Leaving <+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    /// Not part of any group.
    Unjoined,
    /// Join accepted; assignment not yet fetched.
    Joining,
    /// Holds an assignment for the current generation.
    Stable,
    /// Membership changed; assignment must be re-fetched.
    Rebalancing,
    /// Leave in progress.
    Leaving,
}

impl MemberState {
    /// Returns true if the member participates in assignment for the
    /// current generation.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Joining | Self::Stable | Self::Rebalancing)
    }

    /// Returns true if the member must re-fetch its assignment before
    /// consuming.
    #[must_use]
    pub const fn needs_assignment(self) -> bool {
        matches!(self, Self::Joining | Self::Rebalancing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_policy_default() {
        assert_eq!(ResetPolicy::default(), ResetPolicy::Earliest);
    }

    #[test]
    fn test_member_state_flags() {
        assert!(MemberState::Joining.is_active());
        assert!(MemberState::Stable.is_active());
        assert!(MemberState::Rebalancing.is_active());
        assert!(!MemberState::Unjoined.is_active());
        assert!(!MemberState::Leaving.is_active());

        assert!(MemberState::Joining.needs_assignment());
        assert!(MemberState::Rebalancing.needs_assignment());
        assert!(!MemberState::Stable.needs_assignment());
    }
}
