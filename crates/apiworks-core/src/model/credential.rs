//! # Credentials
//!
//! A credential is a named handle for a provider secret. The secret itself
//! lives in a side table selected by the credential's kind, sealed by the
//! vault. Exactly one side row exists for a credential, in the table of its
//! kind.

use super::coded_enum;
use crate::id::Id;
use crate::vault::{EncryptionType, Vault, VaultError};
use serde::{Deserialize, Serialize};

coded_enum! {
    /// AI provider a credential authenticates against.
    pub enum CredentialKind {
        #[default]
        OpenAi = 0 => "openai",
        Gemini = 1 => "gemini",
        Anthropic = 2 => "anthropic",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub kind: CredentialKind,
}

impl Credential {
    #[must_use]
    pub fn new(workspace_id: Id, name: impl Into<String>, kind: CredentialKind) -> Self {
        Self {
            id: Id::new_now(),
            workspace_id,
            name: name.into(),
            kind,
        }
    }
}

/// Side-table row holding a sealed provider secret.
///
/// `secret` is the vault output (nonce prefix included) for the recorded
/// `encryption_type`, or the literal secret when that is `none`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSecret {
    pub credential_id: Id,
    #[serde(with = "super::base64_bytes")]
    pub secret: Vec<u8>,
    pub base_url: Option<String>,
    pub encryption_type: EncryptionType,
}

impl std::fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSecret")
            .field("credential_id", &self.credential_id)
            .field("base_url", &self.base_url)
            .field("encryption_type", &self.encryption_type)
            .finish_non_exhaustive()
    }
}

impl CredentialSecret {
    /// Seal `plaintext` with the vault's default algorithm.
    pub fn seal(
        vault: &Vault,
        credential_id: Id,
        plaintext: &[u8],
        base_url: Option<String>,
    ) -> Result<Self, VaultError> {
        let (secret, encryption_type) = vault.seal(plaintext)?;
        Ok(Self {
            credential_id,
            secret,
            base_url,
            encryption_type,
        })
    }

    /// Recover the cleartext secret.
    pub fn open(&self, vault: &Vault) -> Result<Vec<u8>, VaultError> {
        vault.decrypt(&self.secret, self.encryption_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_secret_opens_with_same_vault() {
        let vault = Vault::default();
        let secret = CredentialSecret::seal(&vault, Id::new_now(), b"sk-abc", None).expect("seal");
        assert_ne!(secret.secret, b"sk-abc");
        assert_eq!(secret.open(&vault).expect("open"), b"sk-abc");
    }

    #[test]
    fn debug_hides_secret_bytes() {
        let secret = CredentialSecret {
            credential_id: Id::NIL,
            secret: b"sk-live".to_vec(),
            base_url: None,
            encryption_type: EncryptionType::None,
        };
        assert!(!format!("{secret:?}").contains("sk-live"));
    }
}
