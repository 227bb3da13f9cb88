//! Virtual file tree entries.

use super::coded_enum;
use crate::id::Id;
use serde::{Deserialize, Serialize};

coded_enum! {
    /// What a file entry points at. Folders have no content.
    pub enum FileKind {
        #[default]
        Folder = 0 => "folder",
        Http = 1 => "http",
        Flow = 2 => "flow",
        Credential = 3 => "credential",
    }
}

/// A position in the workspace tree linking an opaque content ID to a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: Id,
    pub workspace_id: Id,
    pub parent_id: Option<Id>,
    pub content_id: Option<Id>,
    pub content_type: FileKind,
    pub name: String,
    pub order: f64,
}

impl File {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.content_type == FileKind::Folder
    }
}
