//! Fallible key and value codecs for the consensus key spaces.
//!
//! Keys use fixed-width big-endian encodings so that sled's lexicographic
//! ordering matches the logical ordering and range scans work; values use
//! borsh.

use borsh::{BorshDeserialize, BorshSerialize};
use silica_primitives::{BlockId, ContractId, OutputId};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Unable to deserialize a key because it has a different length than
    /// expected.
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// A scanned key does not carry the expected key-space prefix.
    #[error("key does not belong to key space '{0}'")]
    ForeignKey(&'static str),

    /// Value (de)serialization error.
    #[error("value codec error: {0}")]
    Value(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Order-preserving encoding of a key space's key type.
pub trait KeyCodec: Sized {
    fn encode_key(&self) -> CodecResult<Vec<u8>>;
    fn decode_key(buf: &[u8]) -> CodecResult<Self>;
}

/// Binary encoding of a key space's value type.
pub trait ValueCodec: Sized {
    fn encode_value(&self) -> CodecResult<Vec<u8>>;
    fn decode_value(buf: &[u8]) -> CodecResult<Self>;
}

// Every persisted value has one canonical borsh encoding.
impl<T: BorshSerialize + BorshDeserialize> ValueCodec for T {
    fn encode_value(&self) -> CodecResult<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    fn decode_value(buf: &[u8]) -> CodecResult<Self> {
        Ok(borsh::from_slice(buf)?)
    }
}

fn decode_fixed<const N: usize>(buf: &[u8]) -> CodecResult<[u8; N]> {
    if buf.len() != N {
        return Err(CodecError::InvalidKeyLength {
            expected: N,
            got: buf.len(),
        });
    }
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(buf);
    Ok(bytes)
}

impl KeyCodec for u64 {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        Ok(self.to_be_bytes().to_vec())
    }

    fn decode_key(buf: &[u8]) -> CodecResult<Self> {
        Ok(u64::from_be_bytes(decode_fixed::<8>(buf)?))
    }
}

impl KeyCodec for () {
    fn encode_key(&self) -> CodecResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn decode_key(buf: &[u8]) -> CodecResult<Self> {
        if !buf.is_empty() {
            return Err(CodecError::InvalidKeyLength {
                expected: 0,
                got: buf.len(),
            });
        }
        Ok(())
    }
}

macro_rules! impl_id_key_codec {
    ($id:ty) => {
        impl KeyCodec for $id {
            fn encode_key(&self) -> CodecResult<Vec<u8>> {
                Ok(self.as_ref().to_vec())
            }

            fn decode_key(buf: &[u8]) -> CodecResult<Self> {
                Ok(<$id>::from(decode_fixed::<32>(buf)?))
            }
        }

        // Height-scoped composite keys: big-endian height, then the ID, so
        // scans over one height stay contiguous.
        impl KeyCodec for (u64, $id) {
            fn encode_key(&self) -> CodecResult<Vec<u8>> {
                let mut buf = self.0.to_be_bytes().to_vec();
                buf.extend_from_slice(self.1.as_ref());
                Ok(buf)
            }

            fn decode_key(buf: &[u8]) -> CodecResult<Self> {
                let bytes = decode_fixed::<40>(buf)?;
                let mut height = [0u8; 8];
                height.copy_from_slice(&bytes[..8]);
                let mut id = [0u8; 32];
                id.copy_from_slice(&bytes[8..]);
                Ok((u64::from_be_bytes(height), <$id>::from(id)))
            }
        }
    };
}

impl_id_key_codec!(OutputId);
impl_id_key_codec!(ContractId);
impl_id_key_codec!(BlockId);
