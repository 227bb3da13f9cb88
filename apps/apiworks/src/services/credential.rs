//! Credential service: credential rows and their sealed provider secrets.
//!
//! Secrets travel in cleartext on the wire and are sealed by the vault
//! before they reach a transaction. Secret writes emit no sync events.

use super::{Access, Event, EventKind, Services, check_id, check_name, not_found};
use crate::error::{ApiError, ApiResult};
use apiworks_core::model::{Credential, CredentialSecret};
use apiworks_core::primitives::MAX_SECRET_LENGTH;
use apiworks_core::storage::tables::Credentials;
use apiworks_core::storage::{reader, writer};
use apiworks_core::{EngineError, Id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUpdate {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInput {
    pub credential_id: Id,
    pub secret: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretInput")
            .field("credential_id", &self.credential_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Cleartext view of a stored secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretOutput {
    pub credential_id: Id,
    pub kind: apiworks_core::model::CredentialKind,
    pub secret: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for SecretOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretOutput")
            .field("credential_id", &self.credential_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Credentials of every workspace `user` belongs to.
    pub fn credentials(&self, user: Id) -> ApiResult<Vec<Credential>> {
        let read = self.store.read()?;
        Ok(reader::credentials_for_user(&read, user)?)
    }

    /// Insert credential metadata into workspaces `user` belongs to.
    ///
    /// # Errors
    /// `permission-denied` for a foreign workspace, `invalid-argument` for a
    /// taken ID. Nothing is written in either case.
    pub fn insert_credentials(&self, user: Id, items: Vec<Credential>) -> ApiResult<Vec<Credential>> {
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for item in &items {
                check_id("id", item.id)?;
                check_name("name", &item.name)?;
                access.require(item.workspace_id)?;
            }
        }

        self.act(|tx| {
            for item in &items {
                writer::insert::<Credentials>(tx, item)?;
            }
            Ok(())
        })?;

        for item in &items {
            self.publish_credential(EventKind::Insert, item.clone());
        }
        tracing::debug!(count = items.len(), "credentials inserted");
        Ok(items)
    }

    pub fn update_credentials(&self, user: Id, updates: Vec<CredentialUpdate>) -> ApiResult<Vec<Credential>> {
        let mut rows = Vec::with_capacity(updates.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for update in updates {
                let mut row = visible_credential(&read, &mut access, update.id)?
                    .ok_or_else(|| not_found("credential", update.id))?;
                if let Some(name) = update.name {
                    check_name("name", &name)?;
                    row.name = name;
                }
                rows.push(row);
            }
        }

        self.act(|tx| {
            for row in &rows {
                writer::update::<Credentials>(tx, row)?;
            }
            Ok(())
        })?;

        for row in &rows {
            self.publish_credential(EventKind::Update, row.clone());
        }
        Ok(rows)
    }

    /// Delete by ID. Missing or invisible IDs succeed without an event.
    pub fn delete_credentials(&self, user: Id, ids: Vec<Id>) -> ApiResult<()> {
        let mut targets = Vec::with_capacity(ids.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for id in ids {
                if let Some(row) = visible_credential(&read, &mut access, id)? {
                    targets.push(row);
                }
            }
        }

        // A concurrent delete may win between the phases; only rows this
        // transaction removed are announced.
        let deleted = self.act(|tx| {
            let mut deleted = Vec::with_capacity(targets.len());
            for row in targets {
                if writer::delete_credential(tx, row.id)? {
                    deleted.push(row);
                }
            }
            Ok(deleted)
        })?;

        for row in deleted {
            self.publish_credential(EventKind::Delete, row);
        }
        Ok(())
    }

    // =========================================================================
    // SECRETS
    // =========================================================================

    /// Seal and store secrets of visible credentials.
    pub fn insert_secrets(&self, user: Id, items: Vec<SecretInput>) -> ApiResult<()> {
        self.write_secrets(user, items, false)
    }

    pub fn update_secrets(&self, user: Id, items: Vec<SecretInput>) -> ApiResult<()> {
        self.write_secrets(user, items, true)
    }

    fn write_secrets(&self, user: Id, items: Vec<SecretInput>, existing: bool) -> ApiResult<()> {
        let mut rows = Vec::with_capacity(items.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for item in items {
                let credential = visible_credential(&read, &mut access, item.credential_id)?
                    .ok_or_else(|| not_found("credential", item.credential_id))?;
                if item.secret.is_empty() || item.secret.len() > MAX_SECRET_LENGTH {
                    return Err(ApiError::invalid(format!(
                        "secret must be 1 to {MAX_SECRET_LENGTH} bytes"
                    )));
                }
                let stored = reader::secret_for(&read, &credential)?.is_some();
                if existing && !stored {
                    return Err(not_found("credential secret", credential.id));
                }
                if !existing && stored {
                    return Err(ApiError::invalid(format!(
                        "credential {} already has a secret",
                        credential.id
                    )));
                }
                let sealed = CredentialSecret::seal(&self.vault, credential.id, item.secret.as_bytes(), item.base_url)
                    .map_err(EngineError::from)?;
                rows.push((credential, sealed));
            }
        }

        self.act(|tx| {
            for (credential, sealed) in &rows {
                writer::put_secret(tx, credential, sealed)?;
            }
            Ok(())
        })
    }

    /// Open the secrets of `ids`. Every ID must name a visible credential
    /// with a stored secret.
    pub fn get_secrets(&self, user: Id, ids: Vec<Id>) -> ApiResult<Vec<SecretOutput>> {
        let read = self.store.read()?;
        let mut access = Access::new(&read, user);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let credential = visible_credential(&read, &mut access, id)?
                .ok_or_else(|| not_found("credential", id))?;
            let sealed = reader::secret_for(&read, &credential)?
                .ok_or_else(|| not_found("credential secret", id))?;
            let plaintext = sealed.open(&self.vault).map_err(EngineError::from)?;
            let secret = String::from_utf8(plaintext).map_err(|_| {
                tracing::error!("stored credential secret is not UTF-8");
                ApiError::Internal
            })?;
            out.push(SecretOutput {
                credential_id: id,
                kind: credential.kind,
                secret,
                base_url: sealed.base_url,
            });
        }
        Ok(out)
    }

    pub(super) fn publish_credential(&self, kind: EventKind, row: Credential) {
        let topic = row.workspace_id;
        let delivered = self.streams.credential.publish(&topic, Event::new(kind, row));
        tracing::trace!(workspace_id = %topic, event = kind.as_str(), delivered, "credential event");
    }
}

/// The credential if it exists in a workspace `access` may see.
fn visible_credential<S: apiworks_core::ReadScope>(
    scope: &S,
    access: &mut Access<'_, S>,
    id: Id,
) -> ApiResult<Option<Credential>> {
    let Some(row) = reader::find::<Credentials>(scope, id)? else {
        return Ok(None);
    };
    Ok(access.is_member(row.workspace_id)?.then_some(row))
}
