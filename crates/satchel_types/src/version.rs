//! Version ordering helpers.

/// Returns the version a conflict resolution must carry: one past the
/// larger of the two disputed versions.
///
/// Both the strategy resolvers and the sync engine's postcondition check
/// use this, so the two can never disagree about what "newer" means.
#[must_use]
pub fn next_version(local: u64, remote: u64) -> u64 {
    local.max(remote).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exceeds_both_sides() {
        assert_eq!(next_version(1, 3), 4);
        assert_eq!(next_version(7, 2), 8);
        assert_eq!(next_version(0, 0), 1);
    }

    #[test]
    fn saturates_at_max() {
        assert_eq!(next_version(u64::MAX, 1), u64::MAX);
    }

    proptest! {
        #[test]
        fn always_greater_unless_saturated(local: u64, remote: u64) {
            let next = next_version(local, remote);
            if local.max(remote) < u64::MAX {
                prop_assert!(next > local);
                prop_assert!(next > remote);
            }
        }
    }
}
