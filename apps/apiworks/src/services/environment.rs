//! Environment service.

use super::{Access, Event, EventKind, MoveRequest, Services, check_id, check_name, not_found};
use crate::error::{ApiError, ApiResult};
use apiworks_core::Id;
use apiworks_core::model::{Environment, Variable, unix_now};
use apiworks_core::storage::tables::Environments;
use apiworks_core::storage::{reader, writer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInput {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentUpdate {
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Services {
    /// Environments of every workspace `user` belongs to, each workspace's
    /// list in link order.
    pub fn environments(&self, user: Id) -> ApiResult<Vec<Environment>> {
        let read = self.store.read()?;
        let mut out = Vec::new();
        for ws in reader::workspaces_for_user(&read, user)? {
            out.extend(reader::environments_ordered(&read, ws.id)?);
        }
        Ok(out)
    }

    /// Append each environment to the tail of its workspace's list.
    pub fn insert_environments(&self, user: Id, items: Vec<EnvironmentInput>) -> ApiResult<Vec<Environment>> {
        let mut rows = Vec::with_capacity(items.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for item in items {
                check_id("id", item.id)?;
                check_name("name", &item.name)?;
                access.require(item.workspace_id)?;
                rows.push(Environment {
                    id: item.id,
                    description: item.description,
                    ..Environment::new(item.workspace_id, item.name)
                });
            }
        }

        let inserted = self.act(|tx| {
            rows.iter()
                .map(|row| Ok(writer::append_environment(tx, row)?))
                .collect::<ApiResult<Vec<_>>>()
        })?;

        for row in &inserted {
            self.publish_environment(EventKind::Insert, row.clone());
        }
        Ok(inserted)
    }

    /// Apply partial updates; list links and the owning workspace never change.
    pub fn update_environments(&self, user: Id, updates: Vec<EnvironmentUpdate>) -> ApiResult<Vec<Environment>> {
        let mut rows = Vec::with_capacity(updates.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for update in updates {
                let mut row = visible_environment(&read, &mut access, update.id)?
                    .ok_or_else(|| not_found("environment", update.id))?;
                if let Some(name) = update.name {
                    check_name("name", &name)?;
                    row.name = name;
                }
                if let Some(description) = update.description {
                    row.description = description;
                }
                row.updated = unix_now();
                rows.push(row);
            }
        }

        let written = self.act(|tx| {
            let mut written = Vec::with_capacity(rows.len());
            for row in rows {
                // links may have moved since the read; keep the stored ones
                let stored = reader::get::<Environments>(tx, row.id)?;
                let row = Environment {
                    prev: stored.prev,
                    next: stored.next,
                    display_order: stored.display_order,
                    ..row
                };
                writer::update::<Environments>(tx, &row)?;
                written.push(row);
            }
            Ok(written)
        })?;

        for row in &written {
            self.publish_environment(EventKind::Update, row.clone());
        }
        Ok(written)
    }

    /// Delete environments with their variables. The global environment of a
    /// workspace only goes away with the workspace.
    pub fn delete_environments(&self, user: Id, ids: Vec<Id>) -> ApiResult<()> {
        let mut targets = Vec::with_capacity(ids.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for id in ids {
                let Some(row) = visible_environment(&read, &mut access, id)? else {
                    continue;
                };
                if row.is_global {
                    return Err(ApiError::invalid(format!(
                        "environment {id} is the workspace's global environment"
                    )));
                }
                targets.push(row);
            }
        }

        let deleted = self.act(|tx| {
            let mut deleted: Vec<(Environment, Vec<Variable>)> = Vec::new();
            for row in targets {
                let variables = reader::variables_ordered(tx, row.id)?;
                if writer::delete_environment(tx, row.id)? {
                    deleted.push((row, variables));
                }
            }
            Ok(deleted)
        })?;

        for (row, variables) in deleted {
            for variable in variables {
                self.publish_variable(row.workspace_id, EventKind::Delete, variable);
            }
            self.publish_environment(EventKind::Delete, row);
        }
        Ok(())
    }

    /// Move an environment before or after another in the same workspace.
    ///
    /// Returns the workspace's list in its new order; every row is announced
    /// as updated.
    pub fn move_environment(&self, user: Id, request: MoveRequest) -> ApiResult<Vec<Environment>> {
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            visible_environment(&read, &mut access, request.id)?
                .ok_or_else(|| not_found("environment", request.id))?;
            visible_environment(&read, &mut access, request.target_id)?
                .ok_or_else(|| not_found("environment", request.target_id))?;
        }

        let ordered = self.act(|tx| {
            Ok(writer::move_environment(tx, request.id, request.target_id, request.position)?)
        })?;

        for row in &ordered {
            self.publish_environment(EventKind::Update, row.clone());
        }
        Ok(ordered)
    }

    pub(super) fn publish_environment(&self, kind: EventKind, row: Environment) {
        let topic = row.workspace_id;
        let delivered = self.streams.environment.publish(&topic, Event::new(kind, row));
        tracing::trace!(workspace_id = %topic, event = kind.as_str(), delivered, "environment event");
    }
}

pub(super) fn visible_environment<S: apiworks_core::ReadScope>(
    scope: &S,
    access: &mut Access<'_, S>,
    id: Id,
) -> ApiResult<Option<Environment>> {
    let Some(row) = reader::find::<Environments>(scope, id)? else {
        return Ok(None);
    };
    Ok(access.is_member(row.workspace_id)?.then_some(row))
}
