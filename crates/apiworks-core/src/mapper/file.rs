use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{File, FileKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub id: u128,
    pub workspace_id: u128,
    pub parent_id: Option<u128>,
    pub content_id: Option<u128>,
    pub content_type: i32,
    pub name: String,
    pub display_order: f64,
}

impl Mapped for File {
    type Row = FileRow;

    fn to_row(&self) -> FileRow {
        FileRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            parent_id: opt_key(self.parent_id),
            content_id: opt_key(self.content_id),
            content_type: self.content_type.code(),
            name: self.name.clone(),
            display_order: self.order,
        }
    }

    fn from_row(row: FileRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            parent_id: opt_id(row.parent_id),
            content_id: opt_id(row.content_id),
            content_type: FileKind::try_from(row.content_type)?,
            name: row.name,
            order: row.display_order,
        })
    }
}
