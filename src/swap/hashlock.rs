//! Secret generation and hash-lock construction
//!
//! Escrow contracts release funds against a pre-committed secret (single fill)
//! or one leaf of a Merkle tree of secrets (partial/multiple fills). The byte
//! layout here follows the swap protocol's published hash-lock construction;
//! the destination escrows validate against it bit-for-bit.

use crate::error::{GatewayError, GatewayResult};

use rand::RngCore;
use sha3::{Digest, Keccak256};

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// An ordered set of fresh 32-byte secrets with their keccak256 commitments.
///
/// Secrets are generated from OS randomness immediately before order
/// placement and are never reused across orders.
pub struct SecretSet {
    secrets: Vec<[u8; 32]>,
    hashes: Vec<[u8; 32]>,
}

impl SecretSet {
    /// Generate `count` fresh secrets
    pub fn generate(count: usize) -> GatewayResult<Self> {
        if count == 0 {
            return Err(GatewayError::Protocol(
                "quote requires zero secrets".to_string(),
            ));
        }

        let mut rng = rand::rngs::OsRng;
        let mut secrets = Vec::with_capacity(count);
        let mut hashes = Vec::with_capacity(count);

        for _ in 0..count {
            let mut secret = [0u8; 32];
            rng.fill_bytes(&mut secret);
            hashes.push(keccak256(&secret));
            secrets.push(secret);
        }

        Ok(Self { secrets, hashes })
    }

    /// Build from fixed secrets. Only for deterministic construction checks.
    #[cfg(test)]
    pub fn from_secrets(secrets: Vec<[u8; 32]>) -> Self {
        let hashes = secrets.iter().map(|s| keccak256(s)).collect();
        Self { secrets, hashes }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn secrets(&self) -> &[[u8; 32]] {
        &self.secrets
    }

    /// Commitments in generation order
    pub fn hashes(&self) -> &[[u8; 32]] {
        &self.hashes
    }

    /// Hex form of one secret, for submission to the protocol
    pub fn secret_hex(&self, idx: usize) -> String {
        format!("0x{}", hex::encode(self.secrets[idx]))
    }
}

/// Commitment gating escrow release, scoped to a single order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashLock {
    /// Lock over the one secret of a single-fill order
    SingleFill([u8; 32]),
    /// Merkle root over all secret commitments of a multi-fill order
    MultiFill([u8; 32]),
}

impl HashLock {
    /// Derive the lock from a secret set: single-fill for one secret,
    /// Merkle multi-fill otherwise.
    pub fn from_secrets(set: &SecretSet) -> Self {
        if set.len() == 1 {
            HashLock::SingleFill(set.hashes()[0])
        } else {
            HashLock::MultiFill(multi_fill_root(set.hashes()))
        }
    }

    pub fn is_multi_fill(&self) -> bool {
        matches!(self, HashLock::MultiFill(_))
    }

    /// The 32-byte value submitted with the order
    pub fn value(&self) -> [u8; 32] {
        match self {
            HashLock::SingleFill(h) | HashLock::MultiFill(h) => *h,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.value()))
    }
}

/// Merkle leaf for fill `idx`: keccak256(be64(idx) || secret_hash)
fn merkle_leaf(idx: u64, secret_hash: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 40];
    buf[..8].copy_from_slice(&idx.to_be_bytes());
    buf[8..].copy_from_slice(secret_hash);
    keccak256(&buf)
}

/// Interior node: keccak256 over the sorted pair
fn merkle_node(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo);
    buf[32..].copy_from_slice(hi);
    keccak256(&buf)
}

/// Multi-fill root: Merkle tree over indexed leaves, with the parts count
/// (leaf count minus one) packed into the top 16 bits of the root, as the
/// escrow verifier expects.
fn multi_fill_root(secret_hashes: &[[u8; 32]]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = secret_hashes
        .iter()
        .enumerate()
        .map(|(i, h)| merkle_leaf(i as u64, h))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            match pair {
                [a, b] => next.push(merkle_node(a, b)),
                [a] => next.push(*a),
                _ => unreachable!(),
            }
        }
        level = next;
    }

    let mut root = level[0];
    let parts = (secret_hashes.len() as u16) - 1;
    root[..2].copy_from_slice(&parts.to_be_bytes());
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_secret_set_has_exact_count_and_size() {
        for n in [1usize, 2, 3, 8, 11] {
            let set = SecretSet::generate(n).unwrap();
            assert_eq!(set.len(), n);
            assert_eq!(set.secrets().len(), n);
            assert_eq!(set.hashes().len(), n);
            for (secret, hash) in set.secrets().iter().zip(set.hashes()) {
                assert_eq!(secret.len(), 32);
                assert_eq!(*hash, keccak256(secret));
            }
        }
    }

    #[test]
    fn test_zero_secret_count_rejected() {
        assert!(SecretSet::generate(0).is_err());
    }

    #[test]
    fn test_secrets_are_fresh_across_invocations() {
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let set = SecretSet::generate(4).unwrap();
            for secret in set.secrets() {
                assert!(seen.insert(*secret), "secret repeated across invocations");
            }
        }
    }

    #[test]
    fn test_single_fill_lock_is_secret_hash() {
        let set = SecretSet::from_secrets(vec![[7u8; 32]]);
        let lock = HashLock::from_secrets(&set);
        assert!(!lock.is_multi_fill());
        assert_eq!(lock.value(), keccak256(&[7u8; 32]));
    }

    #[test]
    fn test_lock_structure_chosen_by_secret_count() {
        let single = SecretSet::from_secrets(vec![[1u8; 32]]);
        let multi = SecretSet::from_secrets(vec![[1u8; 32], [2u8; 32], [3u8; 32]]);
        assert!(matches!(HashLock::from_secrets(&single), HashLock::SingleFill(_)));
        assert!(matches!(HashLock::from_secrets(&multi), HashLock::MultiFill(_)));
    }

    #[test]
    fn test_multi_fill_root_is_deterministic() {
        let secrets = vec![[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32], [5u8; 32]];
        let a = HashLock::from_secrets(&SecretSet::from_secrets(secrets.clone()));
        let b = HashLock::from_secrets(&SecretSet::from_secrets(secrets));
        assert_eq!(a, b);
    }

    #[test]
    fn test_multi_fill_root_depends_on_leaf_order() {
        let forward = SecretSet::from_secrets(vec![[1u8; 32], [2u8; 32], [3u8; 32]]);
        let reversed = SecretSet::from_secrets(vec![[3u8; 32], [2u8; 32], [1u8; 32]]);
        assert_ne!(
            HashLock::from_secrets(&forward).value(),
            HashLock::from_secrets(&reversed).value()
        );
    }

    #[test]
    fn test_multi_fill_root_encodes_parts_count() {
        let set = SecretSet::from_secrets(vec![[1u8; 32], [2u8; 32], [3u8; 32]]);
        let root = HashLock::from_secrets(&set).value();
        assert_eq!(u16::from_be_bytes([root[0], root[1]]), 2);
    }
}
