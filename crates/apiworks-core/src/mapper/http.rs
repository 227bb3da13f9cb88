use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{BodyKind, CompressType, Http, HttpAssert, HttpBodyRaw, HttpKeyValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRow {
    pub id: u128,
    pub workspace_id: u128,
    pub folder_id: Option<u128>,
    pub name: String,
    pub url: String,
    pub method: String,
    pub description: String,
    pub body_kind: i32,
    pub parent_http_id: Option<u128>,
    pub is_delta: bool,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub last_run_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Mapped for Http {
    type Row = HttpRow;

    fn to_row(&self) -> HttpRow {
        HttpRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            folder_id: opt_key(self.folder_id),
            name: self.name.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            description: self.description.clone(),
            body_kind: self.body_kind.code(),
            parent_http_id: opt_key(self.parent_http_id),
            is_delta: self.is_delta,
            delta_name: self.delta_name.clone(),
            delta_url: self.delta_url.clone(),
            delta_method: self.delta_method.clone(),
            last_run_at: self.last_run_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_row(row: HttpRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            folder_id: opt_id(row.folder_id),
            name: row.name,
            url: row.url,
            method: row.method,
            description: row.description,
            body_kind: BodyKind::try_from(row.body_kind)?,
            parent_http_id: opt_id(row.parent_http_id),
            is_delta: row.is_delta,
            delta_name: row.delta_name,
            delta_url: row.delta_url,
            delta_method: row.delta_method,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpKeyValueRow {
    pub id: u128,
    pub http_id: u128,
    pub key: String,
    pub value: String,
    pub description: String,
    pub enabled: bool,
    pub parent_id: Option<u128>,
    pub is_delta: bool,
    pub display_order: f64,
}

impl Mapped for HttpKeyValue {
    type Row = HttpKeyValueRow;

    fn to_row(&self) -> HttpKeyValueRow {
        HttpKeyValueRow {
            id: key(self.id),
            http_id: key(self.http_id),
            key: self.key.clone(),
            value: self.value.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            parent_id: opt_key(self.parent_id),
            is_delta: self.is_delta,
            display_order: self.display_order,
        }
    }

    fn from_row(row: HttpKeyValueRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            http_id: id(row.http_id),
            key: row.key,
            value: row.value,
            description: row.description,
            enabled: row.enabled,
            parent_id: opt_id(row.parent_id),
            is_delta: row.is_delta,
            display_order: row.display_order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBodyRawRow {
    pub id: u128,
    pub http_id: u128,
    pub raw_data: Vec<u8>,
    pub content_type: String,
    pub compress_type: i32,
    pub parent_body_raw_id: Option<u128>,
    pub is_delta: bool,
    pub delta_raw_data: Option<Vec<u8>>,
    pub delta_content_type: Option<String>,
}

impl Mapped for HttpBodyRaw {
    type Row = HttpBodyRawRow;

    fn to_row(&self) -> HttpBodyRawRow {
        HttpBodyRawRow {
            id: key(self.id),
            http_id: key(self.http_id),
            raw_data: self.raw_data.clone(),
            content_type: self.content_type.clone(),
            compress_type: self.compress_type.code(),
            parent_body_raw_id: opt_key(self.parent_body_raw_id),
            is_delta: self.is_delta,
            delta_raw_data: self.delta_raw_data.clone(),
            delta_content_type: self.delta_content_type.clone(),
        }
    }

    /// Delta rows read back with an empty `raw_data`: only their `delta_*`
    /// fields are meaningful.
    fn from_row(row: HttpBodyRawRow) -> Result<Self, MapperError> {
        let raw_data = if row.is_delta { Vec::new() } else { row.raw_data };
        Ok(Self {
            id: id(row.id),
            http_id: id(row.http_id),
            raw_data,
            content_type: row.content_type,
            compress_type: CompressType::try_from(row.compress_type)?,
            parent_body_raw_id: opt_id(row.parent_body_raw_id),
            is_delta: row.is_delta,
            delta_raw_data: row.delta_raw_data,
            delta_content_type: row.delta_content_type,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAssertRow {
    pub id: u128,
    pub http_id: u128,
    pub value: String,
    pub description: String,
    pub enabled: bool,
    pub parent_id: Option<u128>,
    pub is_delta: bool,
    pub display_order: f64,
}

impl Mapped for HttpAssert {
    type Row = HttpAssertRow;

    fn to_row(&self) -> HttpAssertRow {
        HttpAssertRow {
            id: key(self.id),
            http_id: key(self.http_id),
            value: self.value.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            parent_id: opt_key(self.parent_id),
            is_delta: self.is_delta,
            display_order: self.display_order,
        }
    }

    fn from_row(row: HttpAssertRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            http_id: id(row.http_id),
            value: row.value,
            description: row.description,
            enabled: row.enabled,
            parent_id: opt_id(row.parent_id),
            is_delta: row.is_delta,
            display_order: row.display_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;

    #[test]
    fn delta_body_drops_base_bytes_on_read() {
        let mut body = HttpBodyRaw::new(Id::new_now(), b"beta".to_vec(), "text/plain");
        body.is_delta = true;
        body.parent_body_raw_id = Some(Id::new_now());
        body.delta_raw_data = Some(b"delta".to_vec());
        body.delta_content_type = Some("application/json".into());

        let back = HttpBodyRaw::from_row(body.to_row()).expect("map");
        assert!(back.raw_data.is_empty());
        assert_eq!(back.delta_raw_data.as_deref(), Some(&b"delta"[..]));
        assert_eq!(back.delta_content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn base_body_keeps_bytes() {
        let body = HttpBodyRaw::new(Id::new_now(), b"beta".to_vec(), "text/plain");
        let back = HttpBodyRaw::from_row(body.to_row()).expect("map");
        assert_eq!(back, body);
    }
}
