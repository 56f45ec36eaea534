use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use const_hex as hex;
use serde::{Deserialize, Serialize};

/// A 32-byte buffer, the common shape of hashes and addresses.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Buf32([u8; 32]);

impl Buf32 {
    pub fn new(data: [u8; 32]) -> Self {
        Self(data)
    }

    /// Returns the all-zeroes buffer.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Buf32 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<Buf32> for [u8; 32] {
    fn from(value: Buf32) -> Self {
        value.0
    }
}

impl AsRef<[u8; 32]> for Buf32 {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Buf32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 64];
        hex::encode_to_slice(self.0, &mut buf).expect("buf: enc hex");
        f.write_str(core::str::from_utf8(&buf).expect("buf: utf8"))
    }
}

impl fmt::Display for Buf32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first 2 and last 2 bytes (4 hex chars each).
        let mut first = [0u8; 4];
        let mut last = [0u8; 4];
        hex::encode_to_slice(&self.0[..2], &mut first).expect("buf: enc hex");
        hex::encode_to_slice(&self.0[30..], &mut last).expect("buf: enc hex");
        let first = core::str::from_utf8(&first).expect("buf: utf8");
        let last = core::str::from_utf8(&last).expect("buf: utf8");
        write!(f, "{first}..{last}")
    }
}
