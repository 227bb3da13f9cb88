//! Workspace header and membership.

use super::coded_enum;
use crate::id::Id;
use serde::{Deserialize, Serialize};

/// The root of ownership: every other entity belongs to exactly one workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Id,
    pub name: String,
    /// Environment selected in the client; `None` until one is chosen.
    pub active_env: Option<Id>,
    /// The workspace-wide environment created alongside the workspace.
    pub global_env: Option<Id>,
    pub updated: i64,
}

impl Workspace {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            name: name.into(),
            active_env: None,
            global_env: None,
            updated: super::unix_now(),
        }
    }
}

coded_enum! {
    pub enum WorkspaceRole {
        Owner = 0 => "owner",
        #[default]
        Member = 1 => "member",
    }
}

/// Membership of a user principal in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceUser {
    pub id: Id,
    pub workspace_id: Id,
    pub user_id: Id,
    pub role: WorkspaceRole,
}
