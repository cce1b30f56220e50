//! Stored values and destination copy rules

use serde::{Deserialize, Serialize};

use crate::{Encoding, StoreError, MAX_BLOB_LEN, MAX_STR_LEN};

/// A value held by the override store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StoredValue {
    I32(i32),
    Str(String),
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl StoredValue {
    /// Encoding tag of this value
    pub fn encoding(&self) -> Encoding {
        match self {
            StoredValue::I32(_) => Encoding::I32,
            StoredValue::Str(_) => Encoding::Str,
            StoredValue::Blob(_) => Encoding::Blob,
        }
    }

    /// Byte length of the payload (4 for integers)
    pub fn len(&self) -> usize {
        match self {
            StoredValue::I32(_) => std::mem::size_of::<i32>(),
            StoredValue::Str(s) => s.len(),
            StoredValue::Blob(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject payloads larger than the store accepts
    pub(crate) fn check_size(&self) -> Result<(), StoreError> {
        let max = match self {
            StoredValue::I32(_) => return Ok(()),
            StoredValue::Str(_) => MAX_STR_LEN,
            StoredValue::Blob(_) => MAX_BLOB_LEN,
        };
        if self.len() > max {
            return Err(StoreError::ValueTooLarge {
                encoding: self.encoding(),
                len: self.len(),
                max,
            });
        }
        Ok(())
    }
}

/// Bounded string copy.
///
/// Copies `min(src.len(), dest.len())` bytes and zero-fills the rest of
/// `dest`. No terminator is written when `src` fills `dest`. Returns the
/// number of payload bytes copied.
pub fn copy_str(src: &[u8], dest: &mut [u8]) -> usize {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
    dest[n..].fill(0);
    n
}

/// Blob copy.
///
/// Copies exactly `min(src.len(), dest.len())` bytes and leaves the rest of
/// `dest` untouched. A short `dest` truncates the blob.
pub fn copy_blob(src: &[u8], dest: &mut [u8]) -> usize {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
    n
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
