use super::{Mapped, MapperError, id, key};
use crate::model::{Credential, CredentialKind, CredentialSecret};
use crate::vault::EncryptionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRow {
    pub id: u128,
    pub workspace_id: u128,
    pub name: String,
    pub kind: i32,
}

impl Mapped for Credential {
    type Row = CredentialRow;

    fn to_row(&self) -> CredentialRow {
        CredentialRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            name: self.name.clone(),
            kind: self.kind.code(),
        }
    }

    fn from_row(row: CredentialRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            name: row.name,
            kind: CredentialKind::try_from(row.kind)?,
        })
    }
}

/// Shared row shape of the three provider side tables.
///
/// `secret` is carried verbatim: the mapper never opens it, callers hand it
/// to the vault together with `encryption_type`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialSecretRow {
    pub credential_id: u128,
    pub secret: Vec<u8>,
    pub base_url: Option<String>,
    pub encryption_type: i32,
}

impl std::fmt::Debug for CredentialSecretRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSecretRow")
            .field("credential_id", &self.credential_id)
            .field("encryption_type", &self.encryption_type)
            .finish_non_exhaustive()
    }
}

impl Mapped for CredentialSecret {
    type Row = CredentialSecretRow;

    fn to_row(&self) -> CredentialSecretRow {
        CredentialSecretRow {
            credential_id: key(self.credential_id),
            secret: self.secret.clone(),
            base_url: self.base_url.clone(),
            encryption_type: self.encryption_type.code(),
        }
    }

    fn from_row(row: CredentialSecretRow) -> Result<Self, MapperError> {
        let encryption_type =
            EncryptionType::try_from(row.encryption_type).map_err(|_| MapperError::UnknownCode {
                kind: "EncryptionType",
                code: row.encryption_type,
            })?;
        Ok(Self {
            credential_id: id(row.credential_id),
            secret: row.secret,
            base_url: row.base_url,
            encryption_type,
        })
    }
}
