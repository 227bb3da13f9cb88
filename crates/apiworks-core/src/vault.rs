//! # Credential Vault
//!
//! Authenticated encryption of provider secrets (API keys, tokens).
//!
//! Ciphertext layout is `nonce || aead_seal(key, nonce, plaintext)` with no
//! associated data:
//! - `xchacha20_poly1305`: 24-byte nonce
//! - `aes_256_gcm`: 12-byte nonce
//! - `none`: the plaintext itself
//!
//! A fresh random nonce is drawn for every encryption, so sealing the same
//! plaintext twice yields different ciphertexts.
//!
//! ## Default key
//!
//! [`Vault::default`] uses an all-zero key with XChaCha20-Poly1305. That is
//! obfuscation at rest only: anyone with storage access can open it. The
//! format is identical to a real-key vault, so deployments can configure a
//! key without migrating stored rows' layout.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Required key size in bytes.
pub const KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 nonce size.
pub const XCHACHA_NONCE_LEN: usize = 24;

/// AES-256-GCM nonce size.
pub const AES_GCM_NONCE_LEN: usize = 12;

/// Vault failures. Messages never include key material or row identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("vault key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("authentication failed")]
    AuthFailed,

    #[error("unknown encryption type code {0}")]
    UnknownAlgorithm(i32),
}

/// Algorithm tag stored next to every sealed secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptionType {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "xchacha20_poly1305")]
    XChaCha20Poly1305,
    #[serde(rename = "aes_256_gcm")]
    Aes256Gcm,
}

impl EncryptionType {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::XChaCha20Poly1305 => 1,
            Self::Aes256Gcm => 2,
        }
    }

    /// Nonce prefix length of the ciphertext format.
    #[must_use]
    pub const fn nonce_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::XChaCha20Poly1305 => XCHACHA_NONCE_LEN,
            Self::Aes256Gcm => AES_GCM_NONCE_LEN,
        }
    }
}

impl TryFrom<i32> for EncryptionType {
    type Error = VaultError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::XChaCha20Poly1305),
            2 => Ok(Self::Aes256Gcm),
            other => Err(VaultError::UnknownAlgorithm(other)),
        }
    }
}

impl std::str::FromStr for EncryptionType {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "xchacha20_poly1305" => Ok(Self::XChaCha20Poly1305),
            "aes_256_gcm" => Ok(Self::Aes256Gcm),
            _ => Err(VaultError::UnknownAlgorithm(-1)),
        }
    }
}

/// AEAD sealing of secret bytes under a single 32-byte key.
#[derive(Clone)]
pub struct Vault {
    key: [u8; KEY_LEN],
    default_algorithm: EncryptionType,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("default_algorithm", &self.default_algorithm)
            .finish_non_exhaustive()
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self {
            key: [0; KEY_LEN],
            default_algorithm: EncryptionType::XChaCha20Poly1305,
        }
    }
}

impl Vault {
    /// Build a vault from raw key bytes. Any length other than 32 is rejected.
    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| VaultError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            key,
            default_algorithm: EncryptionType::XChaCha20Poly1305,
        })
    }

    /// Set the algorithm used by [`Vault::seal`].
    #[must_use]
    pub fn with_default_algorithm(mut self, algorithm: EncryptionType) -> Self {
        self.default_algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn default_algorithm(&self) -> EncryptionType {
        self.default_algorithm
    }

    /// True when the key is the all-zero default.
    #[must_use]
    pub fn is_default_key(&self) -> bool {
        self.key.iter().all(|b| *b == 0)
    }

    /// Encrypt with the vault's default algorithm, returning the tag used.
    pub fn seal(&self, plaintext: &[u8]) -> Result<(Vec<u8>, EncryptionType), VaultError> {
        let algorithm = self.default_algorithm;
        Ok((self.encrypt(plaintext, algorithm)?, algorithm))
    }

    /// Encrypt `plaintext` under `algorithm`.
    pub fn encrypt(&self, plaintext: &[u8], algorithm: EncryptionType) -> Result<Vec<u8>, VaultError> {
        match algorithm {
            EncryptionType::None => Ok(plaintext.to_vec()),
            EncryptionType::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(&self.key)
                    .map_err(|_| VaultError::InvalidKeyLength(self.key.len()))?;
                let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
                let sealed = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|_| VaultError::AuthFailed)?;
                Ok(join(nonce.as_slice(), &sealed))
            }
            EncryptionType::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&self.key)
                    .map_err(|_| VaultError::InvalidKeyLength(self.key.len()))?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let sealed = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|_| VaultError::AuthFailed)?;
                Ok(join(nonce.as_slice(), &sealed))
            }
        }
    }

    /// Decrypt `ciphertext` produced by [`Vault::encrypt`] with the same algorithm.
    pub fn decrypt(&self, ciphertext: &[u8], algorithm: EncryptionType) -> Result<Vec<u8>, VaultError> {
        let nonce_len = algorithm.nonce_len();
        if ciphertext.len() < nonce_len {
            return Err(VaultError::CiphertextTooShort);
        }
        let (nonce, body) = ciphertext.split_at(nonce_len);

        match algorithm {
            EncryptionType::None => Ok(ciphertext.to_vec()),
            EncryptionType::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(&self.key)
                    .map_err(|_| VaultError::InvalidKeyLength(self.key.len()))?;
                cipher
                    .decrypt(chacha20poly1305::XNonce::from_slice(nonce), body)
                    .map_err(|_| VaultError::AuthFailed)
            }
            EncryptionType::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(&self.key)
                    .map_err(|_| VaultError::InvalidKeyLength(self.key.len()))?;
                cipher
                    .decrypt(aes_gcm::Nonce::from_slice(nonce), body)
                    .map_err(|_| VaultError::AuthFailed)
            }
        }
    }
}

fn join(nonce: &[u8], sealed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nonce.len() + sealed.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(sealed);
    out
}

// =============================================================================
// TESTS
// =============================================================================
