//! # Collections
//!
//! Hierarchical HTTP structure: collection → folders → endpoints → examples.
//! Examples are a doubly-linked list per endpoint and each example owns its
//! request parts (headers, queries, asserts, bodies) and recorded responses.
//!
//! Example sub-rows with a key/value shape share [`ExampleKeyValue`]; the
//! storage marker selects the table (header, query, form, urlencoded).

use super::{BodyKind, CompressType, VisualizeMode};
use crate::id::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub updated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Id,
    pub collection_id: Id,
    pub parent_id: Option<Id>,
    pub name: String,
    pub prev: Option<Id>,
    pub next: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Id,
    pub collection_id: Id,
    pub folder_id: Option<Id>,
    pub name: String,
    pub url: String,
    pub method: String,
    pub prev: Option<Id>,
    pub next: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub id: Id,
    /// Owning endpoint.
    pub item_api_id: Id,
    pub collection_id: Id,
    pub name: String,
    pub is_default: bool,
    pub body_type: BodyKind,
    pub prev: Option<Id>,
    pub next: Option<Id>,
}

impl Example {
    #[must_use]
    pub fn new(endpoint: &Endpoint, name: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            item_api_id: endpoint.id,
            collection_id: endpoint.collection_id,
            name: name.into(),
            is_default: false,
            body_type: BodyKind::None,
            prev: None,
            next: None,
        }
    }
}

/// Header, query, form or urlencoded row of an example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleKeyValue {
    pub id: Id,
    pub example_id: Id,
    pub key: String,
    pub value: String,
    pub description: String,
    pub enable: bool,
    pub display_order: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleAssert {
    pub id: Id,
    pub example_id: Id,
    pub expression: String,
    pub enable: bool,
    pub display_order: f64,
}

/// Raw body of an example. Every example has exactly one, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleBodyRaw {
    pub id: Id,
    pub example_id: Id,
    #[serde(with = "super::base64_bytes")]
    pub data: Vec<u8>,
    pub visualize_mode: VisualizeMode,
    pub compress_type: CompressType,
}

impl ExampleBodyRaw {
    #[must_use]
    pub fn empty(example_id: Id) -> Self {
        Self {
            id: Id::new_now(),
            example_id,
            data: Vec::new(),
            visualize_mode: VisualizeMode::Undefined,
            compress_type: CompressType::None,
        }
    }
}

/// A recorded response of an example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: Id,
    pub example_id: Id,
    pub status: i32,
    /// Milliseconds.
    pub duration: i32,
    #[serde(with = "super::base64_bytes")]
    pub body: Vec<u8>,
    /// UNIX seconds at which the response was recorded.
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub id: Id,
    pub response_id: Id,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAssert {
    pub id: Id,
    pub response_id: Id,
    pub assert_id: Option<Id>,
    pub value: String,
    pub success: bool,
}
