//! # Binary Bundle Framing
//!
//! ```text
//! [magic "APWB"][version u8][header_len u32 LE][header][payload]
//! ```
//!
//! Header and payload are postcard. The header carries the bundle format
//! version, the entity counts and a BLAKE3 digest of the payload bytes.
//!
//! ## Validation order
//!
//! 1. Total size against [`MAX_PAYLOAD_SIZE`]
//! 2. Magic bytes and framing version
//! 3. Header length against [`MAX_HEADER_SIZE`], then the header itself
//! 4. Payload digest
//! 5. Payload deserialisation, then the counts it yields
//!
//! Nothing is deserialised from the payload until its digest matches.

use super::{FormatError, owned_counts};
use crate::bundle::Bundle;
use crate::primitives::{
    BINARY_FORMAT_VERSION, BUNDLE_FORMAT_VERSION, MAGIC_BYTES, MAX_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed prefix: magic (4) + version (1) + header length (4).
const PREFIX_LEN: usize = 9;

/// Self-describing header preceding the postcard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryHeader {
    pub format_version: u32,
    pub counts: BTreeMap<String, u64>,
    pub digest: [u8; 32],
}

impl BinaryHeader {
    fn for_payload(bundle: &Bundle, payload: &[u8]) -> Self {
        Self {
            format_version: bundle.format_version,
            counts: owned_counts(bundle),
            digest: *blake3::hash(payload).as_bytes(),
        }
    }

    fn verify_counts(&self, bundle: &Bundle) -> Result<(), FormatError> {
        let actual = owned_counts(bundle);
        for (kind, count) in &actual {
            if self.counts.get(kind).copied().unwrap_or(0) != *count {
                return Err(FormatError::CountMismatch(kind.clone()));
            }
        }
        Ok(())
    }
}

pub(super) fn write(bundle: &Bundle) -> Result<Vec<u8>, FormatError> {
    let payload = postcard::to_allocvec(bundle)?;
    let header = postcard::to_allocvec(&BinaryHeader::for_payload(bundle, &payload))?;

    let mut out = Vec::with_capacity(PREFIX_LEN + header.len() + payload.len());
    out.extend_from_slice(MAGIC_BYTES);
    out.push(BINARY_FORMAT_VERSION);
    out.extend_from_slice(&(header.len() as u32).to_le_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Read only the header of a binary bundle.
pub fn read_header(bytes: &[u8]) -> Result<(BinaryHeader, &[u8]), FormatError> {
    if bytes.len() > MAX_PAYLOAD_SIZE {
        return Err(FormatError::TooLarge {
            size: bytes.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let Some((prefix, rest)) = bytes.split_at_checked(PREFIX_LEN) else {
        return Err(FormatError::Truncated("prefix"));
    };
    if &prefix[0..4] != MAGIC_BYTES {
        return Err(FormatError::InvalidMagic);
    }
    if prefix[4] != BINARY_FORMAT_VERSION {
        return Err(FormatError::UnsupportedFraming(prefix[4]));
    }
    let header_len = u32::from_le_bytes([prefix[5], prefix[6], prefix[7], prefix[8]]) as usize;
    if header_len > MAX_HEADER_SIZE {
        return Err(FormatError::TooLarge {
            size: header_len,
            max: MAX_HEADER_SIZE,
        });
    }
    let Some((header, payload)) = rest.split_at_checked(header_len) else {
        return Err(FormatError::Truncated("header"));
    };
    let header: BinaryHeader = postcard::from_bytes(header)?;
    if header.format_version != BUNDLE_FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: header.format_version,
            expected: BUNDLE_FORMAT_VERSION,
        });
    }
    Ok((header, payload))
}

pub(super) fn read(bytes: &[u8]) -> Result<Bundle, FormatError> {
    let (header, payload) = read_header(bytes)?;
    if *blake3::hash(payload).as_bytes() != header.digest {
        return Err(FormatError::DigestMismatch);
    }
    let bundle: Bundle = postcard::from_bytes(payload)?;
    header.verify_counts(&bundle)?;
    Ok(bundle)
}
