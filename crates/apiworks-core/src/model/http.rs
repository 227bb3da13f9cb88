//! # HTTP Requests
//!
//! The flat request model used by the bundle layer. A request is either a
//! base (`is_delta = false`) or a delta overriding a base request: a delta
//! always names its base through `parent_http_id`, and the base is never
//! itself a delta.
//!
//! Sub-rows (headers, search params, form and urlencoded bodies, asserts)
//! share [`HttpKeyValue`]/[`HttpAssert`]; each table is distinguished by the
//! storage marker it is read through, not by a field.

use super::{BodyKind, CompressType};
use crate::id::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Http {
    pub id: Id,
    pub workspace_id: Id,
    /// Folder file this request sits under.
    pub folder_id: Option<Id>,
    pub name: String,
    pub url: String,
    pub method: String,
    pub description: String,
    pub body_kind: BodyKind,
    pub parent_http_id: Option<Id>,
    pub is_delta: bool,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub last_run_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Http {
    #[must_use]
    pub fn new(workspace_id: Id, name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        let now = super::unix_now();
        Self {
            id: Id::new_now(),
            workspace_id,
            folder_id: None,
            name: name.into(),
            url: url.into(),
            method: method.into(),
            description: String::new(),
            body_kind: BodyKind::None,
            parent_http_id: None,
            is_delta: false,
            delta_name: None,
            delta_url: None,
            delta_method: None,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A delta request overriding `base`.
    #[must_use]
    pub fn delta_of(base: &Http) -> Self {
        let mut delta = Self::new(base.workspace_id, "", "", "");
        delta.folder_id = base.folder_id;
        delta.parent_http_id = Some(base.id);
        delta.is_delta = true;
        delta
    }
}

/// Header, search param, form or urlencoded body row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpKeyValue {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub description: String,
    pub enabled: bool,
    /// Source row this one overrides, when it came from a delta request.
    pub parent_id: Option<Id>,
    pub is_delta: bool,
    pub display_order: f64,
}

impl HttpKeyValue {
    #[must_use]
    pub fn new(http_id: Id, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            http_id,
            key: key.into(),
            value: value.into(),
            description: String::new(),
            enabled: true,
            parent_id: None,
            is_delta: false,
            display_order: 0.0,
        }
    }
}

/// Raw request body. For delta rows the `delta_*` fields are authoritative
/// and `raw_data` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpBodyRaw {
    pub id: Id,
    pub http_id: Id,
    #[serde(with = "super::base64_bytes")]
    pub raw_data: Vec<u8>,
    pub content_type: String,
    pub compress_type: CompressType,
    pub parent_body_raw_id: Option<Id>,
    pub is_delta: bool,
    #[serde(with = "super::base64_bytes_opt")]
    pub delta_raw_data: Option<Vec<u8>>,
    pub delta_content_type: Option<String>,
}

impl HttpBodyRaw {
    #[must_use]
    pub fn new(http_id: Id, raw_data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            id: Id::new_now(),
            http_id,
            raw_data,
            content_type: content_type.into(),
            compress_type: CompressType::None,
            parent_body_raw_id: None,
            is_delta: false,
            delta_raw_data: None,
            delta_content_type: None,
        }
    }

    /// Body bytes a request execution would send.
    #[must_use]
    pub fn effective_data(&self) -> &[u8] {
        match (&self.delta_raw_data, self.is_delta) {
            (Some(delta), true) => delta,
            (None, true) => &[],
            _ => &self.raw_data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpAssert {
    pub id: Id,
    pub http_id: Id,
    pub value: String,
    pub description: String,
    pub enabled: bool,
    pub parent_id: Option<Id>,
    pub is_delta: bool,
    pub display_order: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_points_at_base() {
        let base = Http::new(Id::new_now(), "get user", "GET", "https://api.test/users/1");
        let delta = Http::delta_of(&base);
        assert!(delta.is_delta);
        assert_eq!(delta.parent_http_id, Some(base.id));
        assert_eq!(delta.workspace_id, base.workspace_id);
    }

    #[test]
    fn delta_body_reads_delta_bytes() {
        let mut body = HttpBodyRaw::new(Id::new_now(), b"beta".to_vec(), "text/plain");
        assert_eq!(body.effective_data(), b"beta");

        body.is_delta = true;
        body.delta_raw_data = Some(b"delta".to_vec());
        assert_eq!(body.effective_data(), b"delta");
    }
}
