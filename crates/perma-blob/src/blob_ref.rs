//! Content-addressed blob references
//!
//! Provides [`BlobRef`], a strongly-typed 32-byte BLAKE3 digest used to
//! address every immutable blob (permanodes, claims, payloads).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Textual prefix naming the digest algorithm.
pub const DIGEST_PREFIX: &str = "blake3-";

/// A 32-byte content reference (BLAKE3)
///
/// Two blobs with identical bytes always produce the same reference.
/// The textual form is `blake3-<64 lowercase hex>`; because the hex is
/// fixed-width, byte ordering and string ordering agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobRef([u8; 32]);

impl BlobRef {
    /// Create a reference from raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create reference from a byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BlobRefError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| BlobRefError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Compute the reference of arbitrary content
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars, no prefix)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Check whether `data` hashes to this reference
    #[inline]
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl Display for BlobRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{DIGEST_PREFIX}{}", hex::encode(self.0))
    }
}

impl FromStr for BlobRef {
    type Err = BlobRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digest = s
            .strip_prefix(DIGEST_PREFIX)
            .ok_or_else(|| BlobRefError::UnknownDigest(s.to_string()))?;
        if digest.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(BlobRefError::NonCanonical(s.to_string()));
        }
        let bytes = hex::decode(digest)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8; 32]> for BlobRef {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl serde::Serialize for BlobRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> serde::Deserialize<'de> for BlobRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BlobRefVisitor;

        impl serde::de::Visitor<'_> for BlobRefVisitor {
            type Value = BlobRef;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a blob reference string or 32 digest bytes")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }

            fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                BlobRef::from_slice(value).map_err(serde::de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(BlobRefVisitor)
        } else {
            deserializer.deserialize_bytes(BlobRefVisitor)
        }
    }
}

/// Errors that can occur when parsing blob references
#[derive(Debug, thiserror::Error)]
pub enum BlobRefError {
    /// Invalid digest length
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Missing or unsupported digest prefix
    #[error("unknown digest in blob reference: {0}")]
    UnknownDigest(String),

    /// Uppercase hex is not the canonical spelling
    #[error("non-canonical blob reference: {0}")]
    NonCanonical(String),

    /// Hex decoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
