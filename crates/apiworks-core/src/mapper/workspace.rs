use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{Workspace, WorkspaceRole, WorkspaceUser};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRow {
    pub id: u128,
    pub name: String,
    pub active_env: Option<u128>,
    pub global_env: Option<u128>,
    pub updated: i64,
}

impl Mapped for Workspace {
    type Row = WorkspaceRow;

    fn to_row(&self) -> WorkspaceRow {
        WorkspaceRow {
            id: key(self.id),
            name: self.name.clone(),
            active_env: opt_key(self.active_env),
            global_env: opt_key(self.global_env),
            updated: self.updated,
        }
    }

    fn from_row(row: WorkspaceRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            name: row.name,
            active_env: opt_id(row.active_env),
            global_env: opt_id(row.global_env),
            updated: row.updated,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceUserRow {
    pub id: u128,
    pub workspace_id: u128,
    pub user_id: u128,
    pub role: i32,
}

impl Mapped for WorkspaceUser {
    type Row = WorkspaceUserRow;

    fn to_row(&self) -> WorkspaceUserRow {
        WorkspaceUserRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            user_id: key(self.user_id),
            role: self.role.code(),
        }
    }

    fn from_row(row: WorkspaceUserRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            user_id: id(row.user_id),
            role: WorkspaceRole::try_from(row.role)?,
        })
    }
}
