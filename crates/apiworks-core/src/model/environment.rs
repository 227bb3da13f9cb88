//! Environments and their variables.
//!
//! Both kinds are ordered through a doubly-linked list (`prev`/`next`) with a
//! `display_order` float used as a tiebreaker when listing.

use crate::id::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub description: String,
    pub is_global: bool,
    pub prev: Option<Id>,
    pub next: Option<Id>,
    pub display_order: f64,
    pub updated: i64,
}

impl Environment {
    /// A detached environment; the writer links it into the workspace list.
    #[must_use]
    pub fn new(workspace_id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            workspace_id,
            name: name.into(),
            description: String::new(),
            is_global: false,
            prev: None,
            next: None,
            display_order: 0.0,
            updated: super::unix_now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: Id,
    pub env_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub prev: Option<Id>,
    pub next: Option<Id>,
    pub display_order: f64,
}

impl Variable {
    #[must_use]
    pub fn new(env_id: Id, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            env_id,
            key: key.into(),
            value: value.into(),
            enabled: true,
            description: String::new(),
            prev: None,
            next: None,
            display_order: 0.0,
        }
    }
}
