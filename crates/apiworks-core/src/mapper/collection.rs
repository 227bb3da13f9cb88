use super::{Mapped, MapperError, id, key, opt_id, opt_key};
use crate::model::{
    BodyKind, Collection, CompressType, Endpoint, Example, ExampleAssert, ExampleBodyRaw,
    ExampleKeyValue, Folder, Response, ResponseAssert, ResponseHeader, VisualizeMode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRow {
    pub id: u128,
    pub workspace_id: u128,
    pub name: String,
    pub updated: i64,
}

impl Mapped for Collection {
    type Row = CollectionRow;

    fn to_row(&self) -> CollectionRow {
        CollectionRow {
            id: key(self.id),
            workspace_id: key(self.workspace_id),
            name: self.name.clone(),
            updated: self.updated,
        }
    }

    fn from_row(row: CollectionRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            workspace_id: id(row.workspace_id),
            name: row.name,
            updated: row.updated,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRow {
    pub id: u128,
    pub collection_id: u128,
    pub parent_id: Option<u128>,
    pub name: String,
    pub prev: Option<u128>,
    pub next: Option<u128>,
}

impl Mapped for Folder {
    type Row = FolderRow;

    fn to_row(&self) -> FolderRow {
        FolderRow {
            id: key(self.id),
            collection_id: key(self.collection_id),
            parent_id: opt_key(self.parent_id),
            name: self.name.clone(),
            prev: opt_key(self.prev),
            next: opt_key(self.next),
        }
    }

    fn from_row(row: FolderRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            collection_id: id(row.collection_id),
            parent_id: opt_id(row.parent_id),
            name: row.name,
            prev: opt_id(row.prev),
            next: opt_id(row.next),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRow {
    pub id: u128,
    pub collection_id: u128,
    pub folder_id: Option<u128>,
    pub name: String,
    pub url: String,
    pub method: String,
    pub prev: Option<u128>,
    pub next: Option<u128>,
}

impl Mapped for Endpoint {
    type Row = EndpointRow;

    fn to_row(&self) -> EndpointRow {
        EndpointRow {
            id: key(self.id),
            collection_id: key(self.collection_id),
            folder_id: opt_key(self.folder_id),
            name: self.name.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            prev: opt_key(self.prev),
            next: opt_key(self.next),
        }
    }

    fn from_row(row: EndpointRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            collection_id: id(row.collection_id),
            folder_id: opt_id(row.folder_id),
            name: row.name,
            url: row.url,
            method: row.method,
            prev: opt_id(row.prev),
            next: opt_id(row.next),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleRow {
    pub id: u128,
    pub item_api_id: u128,
    pub collection_id: u128,
    pub name: String,
    pub is_default: bool,
    pub body_type: i32,
    pub prev: Option<u128>,
    pub next: Option<u128>,
}

impl Mapped for Example {
    type Row = ExampleRow;

    fn to_row(&self) -> ExampleRow {
        ExampleRow {
            id: key(self.id),
            item_api_id: key(self.item_api_id),
            collection_id: key(self.collection_id),
            name: self.name.clone(),
            is_default: self.is_default,
            body_type: self.body_type.code(),
            prev: opt_key(self.prev),
            next: opt_key(self.next),
        }
    }

    fn from_row(row: ExampleRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            item_api_id: id(row.item_api_id),
            collection_id: id(row.collection_id),
            name: row.name,
            is_default: row.is_default,
            body_type: BodyKind::try_from(row.body_type)?,
            prev: opt_id(row.prev),
            next: opt_id(row.next),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleKeyValueRow {
    pub id: u128,
    pub example_id: u128,
    pub key: String,
    pub value: String,
    pub description: String,
    pub enable: bool,
    pub display_order: f64,
}

impl Mapped for ExampleKeyValue {
    type Row = ExampleKeyValueRow;

    fn to_row(&self) -> ExampleKeyValueRow {
        ExampleKeyValueRow {
            id: key(self.id),
            example_id: key(self.example_id),
            key: self.key.clone(),
            value: self.value.clone(),
            description: self.description.clone(),
            enable: self.enable,
            display_order: self.display_order,
        }
    }

    fn from_row(row: ExampleKeyValueRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            example_id: id(row.example_id),
            key: row.key,
            value: row.value,
            description: row.description,
            enable: row.enable,
            display_order: row.display_order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleAssertRow {
    pub id: u128,
    pub example_id: u128,
    pub expression: String,
    pub enable: bool,
    pub display_order: f64,
}

impl Mapped for ExampleAssert {
    type Row = ExampleAssertRow;

    fn to_row(&self) -> ExampleAssertRow {
        ExampleAssertRow {
            id: key(self.id),
            example_id: key(self.example_id),
            expression: self.expression.clone(),
            enable: self.enable,
            display_order: self.display_order,
        }
    }

    fn from_row(row: ExampleAssertRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            example_id: id(row.example_id),
            expression: row.expression,
            enable: row.enable,
            display_order: row.display_order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleBodyRawRow {
    pub id: u128,
    pub example_id: u128,
    pub data: Vec<u8>,
    pub visualize_mode: i32,
    pub compress_type: i32,
}

impl Mapped for ExampleBodyRaw {
    type Row = ExampleBodyRawRow;

    fn to_row(&self) -> ExampleBodyRawRow {
        ExampleBodyRawRow {
            id: key(self.id),
            example_id: key(self.example_id),
            data: self.data.clone(),
            visualize_mode: self.visualize_mode.code(),
            compress_type: self.compress_type.code(),
        }
    }

    fn from_row(row: ExampleBodyRawRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            example_id: id(row.example_id),
            data: row.data,
            visualize_mode: VisualizeMode::try_from(row.visualize_mode)?,
            compress_type: CompressType::try_from(row.compress_type)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: u128,
    pub example_id: u128,
    pub status: i32,
    pub duration: i32,
    pub body: Vec<u8>,
    pub time: i64,
}

impl Mapped for Response {
    type Row = ResponseRow;

    fn to_row(&self) -> ResponseRow {
        ResponseRow {
            id: key(self.id),
            example_id: key(self.example_id),
            status: self.status,
            duration: self.duration,
            body: self.body.clone(),
            time: self.time,
        }
    }

    fn from_row(row: ResponseRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            example_id: id(row.example_id),
            status: row.status,
            duration: row.duration,
            body: row.body,
            time: row.time,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHeaderRow {
    pub id: u128,
    pub response_id: u128,
    pub key: String,
    pub value: String,
}

impl Mapped for ResponseHeader {
    type Row = ResponseHeaderRow;

    fn to_row(&self) -> ResponseHeaderRow {
        ResponseHeaderRow {
            id: key(self.id),
            response_id: key(self.response_id),
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }

    fn from_row(row: ResponseHeaderRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            response_id: id(row.response_id),
            key: row.key,
            value: row.value,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAssertRow {
    pub id: u128,
    pub response_id: u128,
    pub assert_id: Option<u128>,
    pub value: String,
    pub success: bool,
}

impl Mapped for ResponseAssert {
    type Row = ResponseAssertRow;

    fn to_row(&self) -> ResponseAssertRow {
        ResponseAssertRow {
            id: key(self.id),
            response_id: key(self.response_id),
            assert_id: opt_key(self.assert_id),
            value: self.value.clone(),
            success: self.success,
        }
    }

    fn from_row(row: ResponseAssertRow) -> Result<Self, MapperError> {
        Ok(Self {
            id: id(row.id),
            response_id: id(row.response_id),
            assert_id: opt_id(row.assert_id),
            value: row.value,
            success: row.success,
        })
    }
}
