//! Workspace service.
//!
//! Creating a workspace makes the caller its owner and creates its global
//! environment in the same transaction. Workspace events go to each member's
//! own topic, since a new workspace has no workspace topic anyone follows.

use super::{Access, Event, EventKind, Services, check_id, check_name, not_found};
use crate::error::{ApiError, ApiResult};
use apiworks_core::Id;
use apiworks_core::model::{Environment, Workspace, WorkspaceRole, WorkspaceUser, unix_now};
use apiworks_core::storage::tables::{Environments, WorkspaceUsers, Workspaces};
use apiworks_core::storage::{reader, writer};
use serde::{Deserialize, Serialize};

/// Name given to the environment created with every workspace.
pub const GLOBAL_ENVIRONMENT_NAME: &str = "Global";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInput {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceUpdate {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
    /// Must name an environment of the same workspace.
    #[serde(default)]
    pub active_env: Option<Id>,
}

impl Services {
    /// Workspaces `user` belongs to, in any role.
    pub fn workspaces(&self, user: Id) -> ApiResult<Vec<Workspace>> {
        let read = self.store.read()?;
        Ok(reader::workspaces_for_user(&read, user)?)
    }

    /// Create workspaces owned by `user`.
    ///
    /// Each one gets a global environment and an owner membership in the
    /// same transaction; workspace and environment events follow the commit.
    pub fn insert_workspaces(&self, user: Id, items: Vec<WorkspaceInput>) -> ApiResult<Vec<Workspace>> {
        check_id("user_id", user)?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            check_id("id", item.id)?;
            check_name("name", &item.name)?;
            let global = Environment {
                is_global: true,
                ..Environment::new(item.id, GLOBAL_ENVIRONMENT_NAME)
            };
            let workspace = Workspace {
                id: item.id,
                global_env: Some(global.id),
                ..Workspace::new(item.name)
            };
            let owner = WorkspaceUser {
                id: Id::new_now(),
                workspace_id: item.id,
                user_id: user,
                role: WorkspaceRole::Owner,
            };
            rows.push((workspace, owner, global));
        }

        let created = self.act(|tx| {
            let mut created = Vec::with_capacity(rows.len());
            for (workspace, owner, global) in rows {
                writer::insert::<Workspaces>(tx, &workspace)?;
                writer::insert::<WorkspaceUsers>(tx, &owner)?;
                let global = writer::append_environment(tx, &global)?;
                created.push((workspace, global));
            }
            Ok(created)
        })?;

        let mut out = Vec::with_capacity(created.len());
        for (workspace, global) in created {
            tracing::info!(workspace_id = %workspace.id, user_id = %user, "workspace created");
            self.publish_workspace(&[user], EventKind::Insert, &workspace);
            self.publish_environment(EventKind::Insert, global);
            out.push(workspace);
        }
        Ok(out)
    }

    pub fn update_workspaces(&self, user: Id, updates: Vec<WorkspaceUpdate>) -> ApiResult<Vec<Workspace>> {
        let mut rows = Vec::with_capacity(updates.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for update in updates {
                let mut row = match reader::find::<Workspaces>(&read, update.id)? {
                    Some(row) if access.is_member(row.id)? => row,
                    _ => return Err(not_found("workspace", update.id)),
                };
                if let Some(name) = update.name {
                    check_name("name", &name)?;
                    row.name = name;
                }
                if let Some(env_id) = update.active_env {
                    let env = reader::find::<Environments>(&read, env_id)?
                        .filter(|env| env.workspace_id == row.id)
                        .ok_or_else(|| {
                            ApiError::invalid(format!("active_env {env_id} is not an environment of this workspace"))
                        })?;
                    row.active_env = Some(env.id);
                }
                row.updated = unix_now();
                let members: Vec<Id> = reader::members_of(&read, row.id)?
                    .into_iter()
                    .map(|m| m.user_id)
                    .collect();
                rows.push((row, members));
            }
        }

        self.act(|tx| {
            for (row, _) in &rows {
                writer::update::<Workspaces>(tx, row)?;
            }
            Ok(())
        })?;

        let mut out = Vec::with_capacity(rows.len());
        for (row, members) in rows {
            self.publish_workspace(&members, EventKind::Update, &row);
            out.push(row);
        }
        Ok(out)
    }

    /// Delete workspaces and everything they own. Only an owner may delete;
    /// workspaces the caller cannot see are skipped like missing ones.
    pub fn delete_workspaces(&self, user: Id, ids: Vec<Id>) -> ApiResult<()> {
        let mut targets = Vec::with_capacity(ids.len());
        {
            let read = self.store.read()?;
            for id in ids {
                let Some(row) = reader::find::<Workspaces>(&read, id)? else {
                    continue;
                };
                let Some(membership) = reader::membership(&read, id, user)? else {
                    continue;
                };
                if membership.role != WorkspaceRole::Owner {
                    return Err(ApiError::PermissionDenied);
                }
                let members: Vec<Id> = reader::members_of(&read, id)?
                    .into_iter()
                    .map(|m| m.user_id)
                    .collect();
                targets.push((row, members));
            }
        }

        let deleted = self.act(|tx| {
            let mut deleted = Vec::with_capacity(targets.len());
            for (row, members) in targets {
                if writer::delete_workspace(tx, row.id)? {
                    deleted.push((row, members));
                }
            }
            Ok(deleted)
        })?;

        for (row, members) in deleted {
            tracing::info!(workspace_id = %row.id, "workspace deleted");
            self.publish_workspace(&members, EventKind::Delete, &row);
        }
        Ok(())
    }

    fn publish_workspace(&self, members: &[Id], kind: EventKind, row: &Workspace) {
        for member in members {
            self.streams
                .workspace
                .publish(member, Event::new(kind, row.clone()));
        }
        tracing::trace!(workspace_id = %row.id, event = kind.as_str(), members = members.len(), "workspace event");
    }
}
