//! Variable service. Variable events share their environment's workspace
//! topic.

use super::environment::visible_environment;
use super::{Access, Event, EventKind, MoveRequest, Services, check_id, check_name, not_found};
use crate::error::ApiResult;
use apiworks_core::model::Variable;
use apiworks_core::storage::tables::Variables;
use apiworks_core::storage::{reader, writer};
use apiworks_core::{Id, ReadScope};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInput {
    pub id: Id,
    pub env_id: Id,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub id: Id,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Services {
    /// Variables of every environment `user` can see, per environment in
    /// link order.
    pub fn variables(&self, user: Id) -> ApiResult<Vec<Variable>> {
        let read = self.store.read()?;
        let mut out = Vec::new();
        for ws in reader::workspaces_for_user(&read, user)? {
            for env in reader::environments_ordered(&read, ws.id)? {
                out.extend(reader::variables_ordered(&read, env.id)?);
            }
        }
        Ok(out)
    }

    /// Append variables to the tail of their environments' lists.
    pub fn insert_variables(&self, user: Id, items: Vec<VariableInput>) -> ApiResult<Vec<Variable>> {
        let mut rows = Vec::with_capacity(items.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for item in items {
                check_id("id", item.id)?;
                check_name("key", &item.key)?;
                let env = visible_environment(&read, &mut access, item.env_id)?
                    .ok_or_else(|| not_found("environment", item.env_id))?;
                let row = Variable {
                    id: item.id,
                    enabled: item.enabled,
                    description: item.description,
                    ..Variable::new(env.id, item.key, item.value)
                };
                rows.push((env.workspace_id, row));
            }
        }

        let inserted = self.act(|tx| {
            rows.iter()
                .map(|(ws, row)| Ok((*ws, writer::append_variable(tx, row)?)))
                .collect::<ApiResult<Vec<_>>>()
        })?;

        let mut out = Vec::with_capacity(inserted.len());
        for (ws, row) in inserted {
            self.publish_variable(ws, EventKind::Insert, row.clone());
            out.push(row);
        }
        Ok(out)
    }

    pub fn update_variables(&self, user: Id, updates: Vec<VariableUpdate>) -> ApiResult<Vec<Variable>> {
        let mut rows = Vec::with_capacity(updates.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for update in updates {
                let (ws, mut row) = visible_variable(&read, &mut access, update.id)?
                    .ok_or_else(|| not_found("variable", update.id))?;
                if let Some(key) = update.key {
                    check_name("key", &key)?;
                    row.key = key;
                }
                if let Some(value) = update.value {
                    row.value = value;
                }
                if let Some(enabled) = update.enabled {
                    row.enabled = enabled;
                }
                if let Some(description) = update.description {
                    row.description = description;
                }
                rows.push((ws, row));
            }
        }

        let written = self.act(|tx| {
            let mut written = Vec::with_capacity(rows.len());
            for (ws, row) in rows {
                let stored = reader::get::<Variables>(tx, row.id)?;
                let row = Variable {
                    prev: stored.prev,
                    next: stored.next,
                    display_order: stored.display_order,
                    ..row
                };
                writer::update::<Variables>(tx, &row)?;
                written.push((ws, row));
            }
            Ok(written)
        })?;

        let mut out = Vec::with_capacity(written.len());
        for (ws, row) in written {
            self.publish_variable(ws, EventKind::Update, row.clone());
            out.push(row);
        }
        Ok(out)
    }

    /// Delete by ID; the gap left in each list is closed.
    pub fn delete_variables(&self, user: Id, ids: Vec<Id>) -> ApiResult<()> {
        let mut targets = Vec::with_capacity(ids.len());
        {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            for id in ids {
                if let Some(target) = visible_variable(&read, &mut access, id)? {
                    targets.push(target);
                }
            }
        }

        let deleted = self.act(|tx| {
            let mut deleted = Vec::with_capacity(targets.len());
            for (ws, row) in targets {
                if writer::delete_variable(tx, row.id)? {
                    deleted.push((ws, row));
                }
            }
            Ok(deleted)
        })?;

        for (ws, row) in deleted {
            self.publish_variable(ws, EventKind::Delete, row);
        }
        Ok(())
    }

    /// Move a variable before or after another in the same environment.
    pub fn move_variable(&self, user: Id, request: MoveRequest) -> ApiResult<Vec<Variable>> {
        let ws = {
            let read = self.store.read()?;
            let mut access = Access::new(&read, user);
            let (ws, _) = visible_variable(&read, &mut access, request.id)?
                .ok_or_else(|| not_found("variable", request.id))?;
            visible_variable(&read, &mut access, request.target_id)?
                .ok_or_else(|| not_found("variable", request.target_id))?;
            ws
        };

        let ordered = self.act(|tx| {
            Ok(writer::move_variable(tx, request.id, request.target_id, request.position)?)
        })?;

        for row in &ordered {
            self.publish_variable(ws, EventKind::Update, row.clone());
        }
        Ok(ordered)
    }

    pub(super) fn publish_variable(&self, workspace_id: Id, kind: EventKind, row: Variable) {
        let delivered = self.streams.variable.publish(&workspace_id, Event::new(kind, row));
        tracing::trace!(%workspace_id, event = kind.as_str(), delivered, "variable event");
    }
}

/// The variable and its workspace, if `access` may see it.
fn visible_variable<S: ReadScope>(
    scope: &S,
    access: &mut Access<'_, S>,
    id: Id,
) -> ApiResult<Option<(Id, Variable)>> {
    let Some(row) = reader::find::<Variables>(scope, id)? else {
        return Ok(None);
    };
    let env = visible_environment(scope, access, row.env_id)?;
    Ok(env.map(|env| (env.workspace_id, row)))
}
