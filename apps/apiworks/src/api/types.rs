//! Request and response bodies of the HTTP API.

use crate::error::ApiError;
use crate::services::ExportedBundle;
use apiworks_core::{ExportFormat, ExportOptions, Id, ImportOptions};
use axum::Json;
use axum::extract::{FromRequest, Request};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON body extractor whose rejection is an `invalid-argument` error.
#[derive(Debug, Clone)]
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| ApiError::invalid(rejection.body_text()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// `{"items": [...]}` request body of insert and update calls.
pub struct ItemsRequest<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// `{"ids": [...]}` request body of delete and lookup calls.
pub struct IdsRequest {
    pub ids: Vec<Id>,
}

/// Empty success body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQuery {
    /// Follow one workspace instead of all of the caller's.
    #[serde(default)]
    pub workspace_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub workspace_id: Id,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub options: ExportOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub format: ExportFormat,
    pub counts: BTreeMap<String, usize>,
    /// Standard base64 of the encoded bundle.
    pub data: String,
}

impl From<ExportedBundle> for ExportResponse {
    fn from(bundle: ExportedBundle) -> Self {
        Self {
            format: bundle.format,
            counts: bundle.counts,
            data: STANDARD.encode(bundle.data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub workspace_id: Id,
    #[serde(default)]
    pub format: ExportFormat,
    /// Standard base64 of the encoded bundle.
    pub data: String,
    #[serde(default)]
    pub options: ImportOptions,
    #[serde(default)]
    pub filter_examples: Option<Vec<Id>>,
    #[serde(default)]
    pub filter_flows: Option<Vec<Id>>,
}

impl ImportRequest {
    /// Decode the base64 payload.
    ///
    /// # Errors
    /// `invalid-argument` when `data` is not standard base64.
    pub fn decode_data(&self) -> Result<Vec<u8>, ApiError> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| ApiError::invalid(format!("data is not base64: {e}")))
    }
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
