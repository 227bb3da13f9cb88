//! # Orchestrators
//!
//! One service per resource (workspace, environment, variable, credential)
//! plus bundle export/import. Every mutation runs in three phases:
//!
//! 1. **Fetch & validate**: resolve each item's workspace, check the
//!    caller's membership, build the rows to write. Nothing is open yet.
//! 2. **Act**: one write transaction for the whole batch; any error aborts it.
//! 3. **Publish**: after commit, one event per item on its workspace topic.
//!
//! A subscriber can therefore never observe a mutation that did not commit.
//!
//! Visibility rules: an entity in a workspace the caller does not belong to
//! is reported exactly like a missing one (`not-found`, or a silent no-op for
//! deletes). Creating into such a workspace is `permission-denied`.

mod bundle;
mod credential;
mod environment;
mod variable;
mod workspace;

pub use bundle::{BundleImport, ExportedBundle};
pub use credential::{CredentialUpdate, SecretInput, SecretOutput};
pub use environment::{EnvironmentInput, EnvironmentUpdate};
pub use variable::{VariableInput, VariableUpdate};
pub use workspace::{WorkspaceInput, WorkspaceUpdate};

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult, AppError};
use crate::streamer::{Streamer, Subscription};
use apiworks_core::model::{Credential, Environment, Variable, Workspace};
use apiworks_core::primitives::{EXPORT_TIMEOUT, MAX_NAME_LENGTH};
use apiworks_core::storage::reader;
use apiworks_core::storage::tables::Workspaces;
use apiworks_core::storage::writer::MovePosition;
use apiworks_core::{Id, LayoutConfig, ReadScope, Store, Vault};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-subscription buffer used when none is configured.
pub const DEFAULT_STREAM_BUFFER: usize = 256;

// =============================================================================
// EVENTS
// =============================================================================

/// Kind of a committed mutation, sent as the SSE `event:` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One committed mutation. Deletes carry the row as it was last stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub item: T,
}

impl<T> Event<T> {
    pub fn new(kind: EventKind, item: T) -> Self {
        Self { kind, item }
    }
}

/// Workspace events are keyed by member user ID; every other resource by
/// workspace ID.
#[derive(Debug)]
struct Streams {
    workspace: Streamer<Id, Event<Workspace>>,
    environment: Streamer<Id, Event<Environment>>,
    variable: Streamer<Id, Event<Variable>>,
    credential: Streamer<Id, Event<Credential>>,
}

impl Streams {
    fn new(buffer: usize) -> Self {
        Self {
            workspace: Streamer::new(buffer),
            environment: Streamer::new(buffer),
            variable: Streamer::new(buffer),
            credential: Streamer::new(buffer),
        }
    }
}

/// Reorder request shared by environments and variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub id: Id,
    pub target_id: Id,
    #[serde(default)]
    pub position: MovePosition,
}

// =============================================================================
// SERVICES
// =============================================================================

/// Shared state behind every RPC and CLI command.
#[derive(Debug)]
pub struct Services {
    store: Store,
    vault: Vault,
    streams: Streams,
    export_timeout: Duration,
    layout: LayoutConfig,
}

impl Services {
    /// Services over an opened store with default stream buffer, export
    /// timeout and layout.
    #[must_use]
    pub fn new(store: Store, vault: Vault) -> Self {
        Self {
            store,
            vault,
            streams: Streams::new(DEFAULT_STREAM_BUFFER),
            export_timeout: EXPORT_TIMEOUT,
            layout: LayoutConfig::default(),
        }
    }

    /// Open the configured store and vault.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let store = Store::open(&config.storage.path)?;
        tracing::info!(path = %config.storage.path.display(), "store opened");
        Ok(Self::new(store, config.vault()?)
            .with_stream_buffer(config.streams.buffer)
            .with_export_timeout(config.export_timeout())
            .with_layout(config.layout))
    }

    /// Replace the event buses; earlier subscriptions stop receiving.
    #[must_use]
    pub fn with_stream_buffer(mut self, buffer: usize) -> Self {
        self.streams = Streams::new(buffer);
        self
    }

    #[must_use]
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run the act phase: commit on `Ok`, abort on any error.
    fn act<R>(&self, f: impl FnOnce(&WriteTransaction) -> ApiResult<R>) -> ApiResult<R> {
        self.store.write_with(f)
    }

    /// Topics a sync call listens on: `workspace_id` alone when given,
    /// otherwise every workspace the user belongs to right now.
    fn sync_topics(&self, user: Id, workspace_id: Option<Id>) -> ApiResult<Vec<Id>> {
        let read = self.store.read()?;
        match workspace_id {
            Some(id) => {
                Access::new(&read, user).require(id)?;
                Ok(vec![id])
            }
            None => Ok(reader::workspaces_for_user(&read, user)?
                .into_iter()
                .map(|ws| ws.id)
                .collect()),
        }
    }

    /// Workspace events of `user`: one topic keyed by the user, so newly
    /// joined workspaces show up without resubscribing.
    pub fn subscribe_workspaces(&self, user: Id) -> Vec<Subscription<Event<Workspace>>> {
        vec![self.streams.workspace.subscribe(user)]
    }

    /// Environment events of one workspace, or of every workspace `user`
    /// belongs to at the time of the call.
    ///
    /// # Errors
    /// `permission-denied` when `workspace_id` names a workspace `user` is
    /// not a member of.
    pub fn subscribe_environments(
        &self,
        user: Id,
        workspace_id: Option<Id>,
    ) -> ApiResult<Vec<Subscription<Event<Environment>>>> {
        let topics = self.sync_topics(user, workspace_id)?;
        Ok(topics.into_iter().map(|t| self.streams.environment.subscribe(t)).collect())
    }

    pub fn subscribe_variables(
        &self,
        user: Id,
        workspace_id: Option<Id>,
    ) -> ApiResult<Vec<Subscription<Event<Variable>>>> {
        let topics = self.sync_topics(user, workspace_id)?;
        Ok(topics.into_iter().map(|t| self.streams.variable.subscribe(t)).collect())
    }

    /// Credential metadata events; secrets never travel on a stream.
    pub fn subscribe_credentials(
        &self,
        user: Id,
        workspace_id: Option<Id>,
    ) -> ApiResult<Vec<Subscription<Event<Credential>>>> {
        let topics = self.sync_topics(user, workspace_id)?;
        Ok(topics.into_iter().map(|t| self.streams.credential.subscribe(t)).collect())
    }
}

// =============================================================================
// ACCESS CHECKS
// =============================================================================

/// Membership lookups for one principal, cached per workspace.
struct Access<'a, S> {
    scope: &'a S,
    user: Id,
    seen: BTreeMap<Id, bool>,
}

impl<'a, S: ReadScope> Access<'a, S> {
    fn new(scope: &'a S, user: Id) -> Self {
        Self {
            scope,
            user,
            seen: BTreeMap::new(),
        }
    }

    fn is_member(&mut self, workspace_id: Id) -> ApiResult<bool> {
        if let Some(&member) = self.seen.get(&workspace_id) {
            return Ok(member);
        }
        let member = reader::is_member(self.scope, workspace_id, self.user)?;
        self.seen.insert(workspace_id, member);
        Ok(member)
    }

    /// Workspace-level check: `not-found` for a missing workspace,
    /// `permission-denied` for one the caller is not in.
    fn require(&mut self, workspace_id: Id) -> ApiResult<()> {
        if self.is_member(workspace_id)? {
            return Ok(());
        }
        if reader::exists::<Workspaces>(self.scope, workspace_id)? {
            return Err(ApiError::PermissionDenied);
        }
        Err(ApiError::NotFound(format!("workspace not found: {workspace_id}")))
    }
}

fn not_found(kind: &str, id: Id) -> ApiError {
    ApiError::NotFound(format!("{kind} not found: {id}"))
}

fn check_id(field: &str, id: Id) -> ApiResult<()> {
    if id == Id::NIL {
        return Err(ApiError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_name(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid(format!("{field} must not be empty")));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(ApiError::invalid(format!(
            "{field} exceeds {MAX_NAME_LENGTH} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape() {
        let ws = apiworks_core::model::Workspace::new("w");
        let json = serde_json::to_value(Event::new(EventKind::Update, ws.clone())).expect("json");
        assert_eq!(json["type"], "update");
        assert_eq!(json["item"]["name"], "w");
    }

    #[test]
    fn names_are_bounded() {
        assert!(check_name("name", "ok").is_ok());
        assert!(check_name("name", "   ").is_err());
        assert!(check_name("name", &"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn nil_ids_are_rejected() {
        assert!(check_id("id", Id::NIL).is_err());
        assert!(check_id("id", Id::new_now()).is_ok());
    }
}
