// concord/crypto/src/lib.rs

//! Hashing primitives for the Concord ledger.
//!
//! Every digest in the system is a SHA-256 hash rendered as 64 lowercase hex
//! characters, so proof-of-work difficulty can be expressed as a count of
//! leading `'0'` characters and digests can travel inside JSON unchanged.

use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 digest.
pub type Hash = String;

/// The well-known digest used as the genesis block's `previous_hash`.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hashes raw bytes and returns the lowercase hex digest.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Number of leading `'0'` characters in a hex digest.
pub fn leading_zeros(hash: &str) -> usize {
    hash.chars().take_while(|c| *c == '0').count()
}

/// Whether `hash` satisfies a proof-of-work difficulty of `difficulty`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zeros(hash) >= difficulty as usize
}

/// Derives a deterministic integer from an arbitrary seed string.
///
/// The seed is hashed first so that structured seeds (such as a block hash
/// with leading zeros from mining) still spread evenly over the `u64` range.
pub fn seed_to_u64(seed: &str) -> u64 {
    let digest = sha256_hex(seed.as_bytes());
    u64::from_str_radix(&digest[..16], 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn zero_hash_is_a_full_width_digest() {
        assert_eq!(ZERO_HASH.len(), 64);
        assert_eq!(leading_zeros(ZERO_HASH), 64);
    }

    #[test]
    fn difficulty_counts_leading_zero_characters() {
        assert!(meets_difficulty("000af3", 3));
        assert!(meets_difficulty("000af3", 2));
        assert!(!meets_difficulty("000af3", 4));
        assert!(meets_difficulty("af3", 0));
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        assert_eq!(seed_to_u64("parent"), seed_to_u64("parent"));
        assert_ne!(seed_to_u64("parent"), seed_to_u64("other-parent"));
    }
}
