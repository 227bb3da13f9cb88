//! # Entity Mappers
//!
//! Bidirectional translation between the model form of each entity kind and
//! its row form: the postcard-encoded struct stored in redb.
//!
//! Row conventions:
//! - IDs are big-endian `u128` keys (see [`Id::to_key`])
//! - enumerations are their `i32` code
//! - nullable columns are `Option`
//!
//! `to_row` is total. `from_row` fails only on an enum code the model does
//! not know, which can only happen with a store written by a newer build.

mod collection;
mod credential;
mod environment;
mod file;
mod flow;
mod http;
mod workspace;

pub use collection::{
    CollectionRow, EndpointRow, ExampleAssertRow, ExampleBodyRawRow, ExampleKeyValueRow,
    ExampleRow, FolderRow, ResponseAssertRow, ResponseHeaderRow, ResponseRow,
};
pub use credential::{CredentialRow, CredentialSecretRow};
pub use environment::{EnvironmentRow, VariableRow};
pub use file::FileRow;
pub use flow::{
    AiMemoryNodeRow, AiNodeRow, AiProviderNodeRow, ConditionNodeRow, EdgeRow, FlowRow,
    FlowVariableRow, ForEachNodeRow, ForNodeRow, JsNodeRow, NodeRow, NoopNodeRow, RequestNodeRow,
};
pub use http::{HttpAssertRow, HttpBodyRawRow, HttpKeyValueRow, HttpRow};
pub use workspace::{WorkspaceRow, WorkspaceUserRow};

use crate::id::Id;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: i32 },

    #[error("unknown {kind} name '{name}'")]
    UnknownName { kind: &'static str, name: String },
}

/// A model type with a storage row form.
pub trait Mapped: Sized {
    type Row: Serialize + DeserializeOwned;

    fn to_row(&self) -> Self::Row;

    fn from_row(row: Self::Row) -> Result<Self, MapperError>;
}

#[inline]
pub(crate) fn key(id: Id) -> u128 {
    id.to_key()
}

#[inline]
pub(crate) fn opt_key(id: Option<Id>) -> Option<u128> {
    id.map(Id::to_key)
}

#[inline]
pub(crate) fn id(key: u128) -> Id {
    Id::from_key(key)
}

#[inline]
pub(crate) fn opt_id(key: Option<u128>) -> Option<Id> {
    key.map(Id::from_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKind};

    #[test]
    fn unknown_enum_code_is_rejected() {
        let node = Node::new(Id::new_now(), "n", NodeKind::Js);
        let mut row = node.to_row();
        row.kind = 99;
        assert_eq!(
            Node::from_row(row),
            Err(MapperError::UnknownCode {
                kind: "NodeKind",
                code: 99
            })
        );
    }

    #[test]
    fn optional_ids_survive_rows() {
        let some = Some(Id::new_now());
        assert_eq!(opt_id(opt_key(some)), some);
        assert_eq!(opt_id(opt_key(None)), None);
    }
}
