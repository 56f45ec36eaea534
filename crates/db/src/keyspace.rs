//! Typed key-space partitioning of the consensus tree.

use crate::codec::{CodecResult, KeyCodec, ValueCodec};

/// A typed partition of the consensus tree.
///
/// Each key space owns a unique prefix; no prefix may be a prefix of
/// another. The trailing `:` separator guarantees that as long as the
/// leading segments are distinct.
pub trait KeySpace {
    const PREFIX: &'static str;

    type Key: KeyCodec;
    type Value: ValueCodec;
}

/// Encodes a key with its key-space prefix.
pub(crate) fn full_key<S: KeySpace>(key: &S::Key) -> CodecResult<Vec<u8>> {
    let encoded = key.encode_key()?;
    let mut buf = Vec::with_capacity(S::PREFIX.len() + encoded.len());
    buf.extend_from_slice(S::PREFIX.as_bytes());
    buf.extend_from_slice(&encoded);
    Ok(buf)
}

/// Decodes a raw tree key back into the key space's key type.
pub(crate) fn decode_full_key<S: KeySpace>(raw: &[u8]) -> CodecResult<S::Key> {
    let stripped = raw
        .strip_prefix(S::PREFIX.as_bytes())
        .ok_or(crate::codec::CodecError::ForeignKey(S::PREFIX))?;
    S::Key::decode_key(stripped)
}

/// Defines a key-space marker type.
macro_rules! define_keyspace {
    ($(#[$docs:meta])+ ($name:ident, $prefix:expr) $key:ty => $value:ty) => {
        $(#[$docs])+
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl $crate::keyspace::KeySpace for $name {
            const PREFIX: &'static str = $prefix;
            type Key = $key;
            type Value = $value;
        }
    };
}

pub(crate) use define_keyspace;
