//! Hashing helpers used for entity IDs and state fingerprints.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use crate::Buf32;

/// Computes the sha256 hash of a byte slice.
pub fn sha256(data: &[u8]) -> Buf32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Buf32::new(hasher.finalize().into())
}

/// Computes the sha256 hash of a value's borsh encoding.
pub fn hash_borsh<T: BorshSerialize>(value: &T) -> Buf32 {
    let buf = borsh::to_vec(value).expect("hash: borsh serialize");
    sha256(&buf)
}

/// Computes a domain-separated sha256 hash over the given parts.
///
/// The tag keeps IDs derived from the same inputs in different roles from
/// colliding (e.g. the i-th coin output vs the i-th fund output of a
/// transaction).
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> Buf32 {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0u8]);
    for part in parts {
        hasher.update(part);
    }
    Buf32::new(hasher.finalize().into())
}
