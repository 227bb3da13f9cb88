//! # Identifiers
//!
//! Every entity kind is keyed by the same 128-bit identifier.
//!
//! IDs are UUIDv7 values: 48 bits of millisecond timestamp followed by
//! counter and random bits. Byte-wise ordering therefore follows creation
//! time, and IDs minted by one process are strictly increasing.
//!
//! ## Encodings
//!
//! - Binary formats (postcard rows, the binary bundle) carry the 16 raw bytes.
//! - Text formats (YAML/JSON bundles, the HTTP API) carry URL-safe base64
//!   without padding (22 characters).
//! - Storage keys are the big-endian `u128`, so key order equals ID order.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Canonical ID size in bytes.
pub const ID_LEN: usize = 16;

/// Errors produced when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Byte input was not exactly [`ID_LEN`] bytes.
    #[error("invalid id length: {0} bytes (expected 16)")]
    InvalidLength(usize),

    /// Text input was not valid base64.
    #[error("invalid id encoding")]
    InvalidEncoding,
}

/// A monotonic, time-sortable 128-bit identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id([u8; ID_LEN]);

impl Id {
    /// The all-zero ID. Never produced by [`Id::new_now`].
    pub const NIL: Self = Self([0; ID_LEN]);

    /// Mint a fresh ID from the current instant plus entropy.
    #[must_use]
    pub fn new_now() -> Self {
        Self(*Uuid::now_v7().as_bytes())
    }

    /// Parse opaque bytes. Fails unless exactly [`ID_LEN`] bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let raw: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// The raw bytes of this ID.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Storage key form (big-endian, order preserving).
    #[must_use]
    pub const fn to_key(self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    /// Inverse of [`Id::to_key`].
    #[must_use]
    pub const fn from_key(key: u128) -> Self {
        Self(key.to_be_bytes())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Milliseconds since the UNIX epoch encoded in the ID.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let mut millis = [0u8; 8];
        millis[2..].copy_from_slice(&self.0[..6]);
        u64::from_be_bytes(millis)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|_| IdError::InvalidEncoding)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 16-byte id or its base64 text form")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Id, E> {
        Id::from_bytes(v).map_err(E::custom)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Id, A::Error> {
        let mut raw = Vec::with_capacity(ID_LEN);
        while let Some(byte) = seq.next_element::<u8>()? {
            raw.push(byte);
        }
        Id::from_bytes(&raw).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(IdVisitor)
        } else {
            deserializer.deserialize_bytes(IdVisitor)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
