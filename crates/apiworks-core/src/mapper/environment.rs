use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{Environment, Variable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRow {
    pub id: u128,
    pub workspace_id: u128,
    pub name: String,
    pub description: String,
    pub is_global: bool,
    pub prev: Option<u128>,
    pub next: Option<u128>,
    pub display_order: f64,
    pub updated: i64,
}

impl Mapped for Environment {
    type Row = EnvironmentRow;

    fn to_row(&self) -> EnvironmentRow {
        EnvironmentRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            name: self.name.clone(),
            description: self.description.clone(),
            is_global: self.is_global,
            prev: opt_key(self.prev),
            next: opt_key(self.next),
            display_order: self.display_order,
            updated: self.updated,
        }
    }

    fn from_row(row: EnvironmentRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            name: row.name,
            description: row.description,
            is_global: row.is_global,
            prev: opt_id(row.prev),
            next: opt_id(row.next),
            display_order: row.display_order,
            updated: row.updated,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRow {
    pub id: u128,
    pub env_id: u128,
    pub var_key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub prev: Option<u128>,
    pub next: Option<u128>,
    pub display_order: f64,
}

impl Mapped for Variable {
    type Row = VariableRow;

    fn to_row(&self) -> VariableRow {
        VariableRow {
            id: key(self.id),
            env_id: key(self.env_id),
            var_key: self.key.clone(),
            value: self.value.clone(),
            enabled: self.enabled,
            description: self.description.clone(),
            prev: opt_key(self.prev),
            next: opt_key(self.next),
            display_order: self.display_order,
        }
    }

    fn from_row(row: VariableRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            env_id: id(row.env_id),
            key: row.var_key,
            value: row.value,
            enabled: row.enabled,
            description: row.description,
            prev: opt_id(row.prev),
            next: opt_id(row.next),
            display_order: row.display_order,
        })
    }
}
