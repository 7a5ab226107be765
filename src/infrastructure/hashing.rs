//! Deterministic bucketing for experiment and rollout assignment
//!
//! The bucketer is the foundation that lets any number of stateless servers
//! agree on an assignment without a shared store: the same (subject, unit)
//! pair maps to the same bucket forever, independent of process, host or
//! library version. SHA-256 is used for its stability guarantee, not for
//! cryptographic strength; the platform hasher is unsuitable because its
//! output is allowed to change between Rust releases.

use sha2::{Digest, Sha256};

/// Number of buckets the hash space is reduced to
pub const BUCKET_COUNT: u32 = 10_000;

/// Deterministic bucketer
#[derive(Debug, Clone, Copy)]
pub struct Bucketer;

impl Bucketer {
    /// Map a (subject, unit) pair to a bucket in `[0, BUCKET_COUNT)`
    ///
    /// `subject_id` is the experiment or flag key; `unit_id` is the user id
    /// or other configured bucketing key. The two are joined with a `:`
    /// separator so distinct pairs cannot collide by concatenation.
    pub fn bucket(subject_id: &str, unit_id: &str) -> u32 {
        let mut hasher = Sha256::new();
        hasher.update(subject_id.as_bytes());
        hasher.update(b":");
        hasher.update(unit_id.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % u64::from(BUCKET_COUNT)) as u32
    }

    /// Check if a bucket falls within `[start, end)`
    pub fn in_range(bucket: u32, start: u32, end: u32) -> bool {
        bucket >= start && bucket < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_bucket() {
        let first = Bucketer::bucket("checkout-test", "user-1");
        for _ in 0..100 {
            assert_eq!(Bucketer::bucket("checkout-test", "user-1"), first);
        }
    }

    #[test]
    fn test_bucket_in_valid_range() {
        for i in 0..1_000 {
            let bucket = Bucketer::bucket("exp-1", &format!("user-{}", i));
            assert!(bucket < BUCKET_COUNT);
        }
    }

    #[test]
    fn test_known_values_are_pinned() {
        // Frozen outputs: these must never change across releases, or every
        // existing assignment in the field would silently flip.
        assert_eq!(Bucketer::bucket("exp-1", "user-1"), 5971);
        assert_eq!(Bucketer::bucket("exp-1", "user-2"), 2809);
        assert_eq!(Bucketer::bucket("exp-2", "user-1"), 2911);
        assert_eq!(Bucketer::bucket("", ""), 4368);
    }

    #[test]
    fn test_subject_and_unit_are_independent() {
        // Same concatenation, different split points
        let a = Bucketer::bucket("ab", "c");
        let b = Bucketer::bucket("a", "bc");
        // Both valid buckets; the separator keeps the inputs distinct
        assert!(a < BUCKET_COUNT && b < BUCKET_COUNT);
        assert_eq!(Bucketer::bucket("exp-1", "user-12"), 3988);
        assert_eq!(Bucketer::bucket("exp-1:user-1", "2"), 7423);
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        let mut deciles = [0u32; 10];
        for i in 0..10_000 {
            let bucket = Bucketer::bucket("distribution-test", &format!("user-{}", i));
            deciles[(bucket / 1_000) as usize] += 1;
        }

        for count in deciles {
            assert!(count > 800, "decile has too few units: {}", count);
            assert!(count < 1_200, "decile has too many units: {}", count);
        }
    }

    #[test]
    fn test_in_range() {
        assert!(Bucketer::in_range(0, 0, 10_000));
        assert!(Bucketer::in_range(2_999, 0, 3_000));
        assert!(!Bucketer::in_range(3_000, 0, 3_000));
        assert!(!Bucketer::in_range(9_999, 0, 3_000));
    }
}
