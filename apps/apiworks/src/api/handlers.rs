//! # HTTP Handlers
//!
//! Thin adapters from JSON bodies to [`Services`] calls. Store work runs on
//! the blocking pool; sync endpoints turn subscriptions into SSE streams.

use super::AppState;
use super::auth::Principal;
use super::types::{
    Body, Empty, ExportRequest, ExportResponse, HealthResponse, IdsRequest, ImportRequest,
    ItemsRequest, ItemsResponse, SyncQuery,
};
use crate::error::{ApiError, ApiResult};
use crate::services::{
    BundleImport, CredentialUpdate, EnvironmentInput, EnvironmentUpdate, Event, MoveRequest,
    SecretInput, SecretOutput, Services, VariableInput, VariableUpdate, WorkspaceInput,
    WorkspaceUpdate,
};
use crate::streamer::Subscription;
use apiworks_core::ImportResult;
use apiworks_core::model::{Credential, Environment, Variable, Workspace};
use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

/// Run synchronous service work off the async workers.
async fn blocking<R, F>(state: &AppState, f: F) -> ApiResult<R>
where
    R: Send + 'static,
    F: FnOnce(&Services) -> ApiResult<R> + Send + 'static,
{
    let services = Arc::clone(&state.services);
    tokio::task::spawn_blocking(move || f(&services))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "service task failed");
            ApiError::Internal
        })?
}

/// Merge subscriptions into one SSE stream: `event:` is the mutation kind,
/// `data:` the row as JSON.
fn sse_stream<T>(subscriptions: Vec<Subscription<Event<T>>>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>>
where
    T: Serialize + Clone + Send + 'static,
{
    let merged = futures::stream::select_all(
        subscriptions
            .into_iter()
            .map(|subscription| Box::pin(subscription.into_stream())),
    );
    let events = merged.filter_map(|event: Event<T>| async move {
        match SseEvent::default().event(event.kind.as_str()).json_data(&event.item) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!(error = %e, "dropping unserializable sync event");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health check endpoint. Needs no token.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

// =============================================================================
// WORKSPACES
// =============================================================================

/// `POST /api/workspace/collection`: workspaces the caller belongs to.
pub async fn workspace_collection(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<Json<ItemsResponse<Workspace>>> {
    let items = blocking(&state, move |s| s.workspaces(user)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/workspace/insert`: create workspaces owned by the caller.
pub async fn workspace_insert(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<WorkspaceInput>>,
) -> ApiResult<Json<ItemsResponse<Workspace>>> {
    let items = blocking(&state, move |s| s.insert_workspaces(user, request.items)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/workspace/update`: rename workspaces or change their active environment.
pub async fn workspace_update(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<WorkspaceUpdate>>,
) -> ApiResult<Json<ItemsResponse<Workspace>>> {
    let items = blocking(&state, move |s| s.update_workspaces(user, request.items)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/workspace/delete`: delete owned workspaces with everything in them.
pub async fn workspace_delete(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<IdsRequest>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.delete_workspaces(user, request.ids)).await?;
    Ok(Json(Empty {}))
}

/// `GET /api/workspace/sync`: live workspace changes as server-sent events.
pub async fn workspace_sync(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    sse_stream(state.services.subscribe_workspaces(user))
}

// =============================================================================
// ENVIRONMENTS
// =============================================================================

/// `POST /api/environment/collection`: environments of every workspace of the caller, in list order.
pub async fn environment_collection(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<Json<ItemsResponse<Environment>>> {
    let items = blocking(&state, move |s| s.environments(user)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/environment/insert`: append environments to their workspace lists.
pub async fn environment_insert(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<EnvironmentInput>>,
) -> ApiResult<Json<ItemsResponse<Environment>>> {
    let items = blocking(&state, move |s| s.insert_environments(user, request.items)).await?;
    Ok(Json(items.into()))
}

pub async fn environment_update(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<EnvironmentUpdate>>,
) -> ApiResult<Json<ItemsResponse<Environment>>> {
    let items = blocking(&state, move |s| s.update_environments(user, request.items)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/environment/delete`: delete environments and their variables.
///
/// # Errors
/// `invalid-argument` for a workspace's global environment.
pub async fn environment_delete(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<IdsRequest>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.delete_environments(user, request.ids)).await?;
    Ok(Json(Empty {}))
}

/// `POST /api/environment/move`: relink one environment before or after another.
///
/// # Returns
/// The workspace's environments in their new order.
pub async fn environment_move(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<MoveRequest>,
) -> ApiResult<Json<ItemsResponse<Environment>>> {
    let items = blocking(&state, move |s| s.move_environment(user, request)).await?;
    Ok(Json(items.into()))
}

/// `GET /api/environment/sync`: live environment changes.
///
/// # Arguments
/// * `workspace_id` - optional query parameter narrowing the stream to one workspace
///
/// # Errors
/// `permission-denied` when the caller is not a member of that workspace.
pub async fn environment_sync(
    State(state): State<AppState>,
    Principal(user): Principal,
    Query(query): Query<SyncQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let subscriptions = state.services.subscribe_environments(user, query.workspace_id)?;
    Ok(sse_stream(subscriptions))
}

// =============================================================================
// VARIABLES
// =============================================================================

/// `POST /api/variable/collection`: variables of every environment the caller can see.
pub async fn variable_collection(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<Json<ItemsResponse<Variable>>> {
    let items = blocking(&state, move |s| s.variables(user)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/variable/insert`: append variables to their environment lists.
pub async fn variable_insert(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<VariableInput>>,
) -> ApiResult<Json<ItemsResponse<Variable>>> {
    let items = blocking(&state, move |s| s.insert_variables(user, request.items)).await?;
    Ok(Json(items.into()))
}

pub async fn variable_update(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<VariableUpdate>>,
) -> ApiResult<Json<ItemsResponse<Variable>>> {
    let items = blocking(&state, move |s| s.update_variables(user, request.items)).await?;
    Ok(Json(items.into()))
}

pub async fn variable_delete(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<IdsRequest>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.delete_variables(user, request.ids)).await?;
    Ok(Json(Empty {}))
}

/// `POST /api/variable/move`: relink one variable before or after another.
pub async fn variable_move(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<MoveRequest>,
) -> ApiResult<Json<ItemsResponse<Variable>>> {
    let items = blocking(&state, move |s| s.move_variable(user, request)).await?;
    Ok(Json(items.into()))
}

/// `GET /api/variable/sync`: live variable changes, optionally for one workspace.
pub async fn variable_sync(
    State(state): State<AppState>,
    Principal(user): Principal,
    Query(query): Query<SyncQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let subscriptions = state.services.subscribe_variables(user, query.workspace_id)?;
    Ok(sse_stream(subscriptions))
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// `POST /api/credential/collection`: credential metadata, never secrets.
pub async fn credential_collection(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<Json<ItemsResponse<Credential>>> {
    let items = blocking(&state, move |s| s.credentials(user)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/credential/insert`
pub async fn credential_insert(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<Credential>>,
) -> ApiResult<Json<ItemsResponse<Credential>>> {
    let items = blocking(&state, move |s| s.insert_credentials(user, request.items)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/credential/update`: rename credentials.
pub async fn credential_update(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<CredentialUpdate>>,
) -> ApiResult<Json<ItemsResponse<Credential>>> {
    let items = blocking(&state, move |s| s.update_credentials(user, request.items)).await?;
    Ok(Json(items.into()))
}

/// `POST /api/credential/delete`: delete credentials with their sealed secrets.
pub async fn credential_delete(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<IdsRequest>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.delete_credentials(user, request.ids)).await?;
    Ok(Json(Empty {}))
}

/// `GET /api/credential/sync`: live credential metadata changes.
pub async fn credential_sync(
    State(state): State<AppState>,
    Principal(user): Principal,
    Query(query): Query<SyncQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let subscriptions = state.services.subscribe_credentials(user, query.workspace_id)?;
    Ok(sse_stream(subscriptions))
}

/// `POST /api/credential/secret/insert`: seal secrets for existing credentials.
///
/// Secrets publish no sync events.
pub async fn secret_insert(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<SecretInput>>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.insert_secrets(user, request.items)).await?;
    Ok(Json(Empty {}))
}

/// `POST /api/credential/secret/update`: reseal secrets in place.
pub async fn secret_update(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ItemsRequest<SecretInput>>,
) -> ApiResult<Json<Empty>> {
    blocking(&state, move |s| s.update_secrets(user, request.items)).await?;
    Ok(Json(Empty {}))
}

/// `POST /api/credential/secret/get`: open the secrets of the given credentials.
///
/// # Errors
/// `not-found` for a credential without a secret or outside the caller's workspaces.
pub async fn secret_get(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<IdsRequest>,
) -> ApiResult<Json<ItemsResponse<SecretOutput>>> {
    let items = blocking(&state, move |s| s.get_secrets(user, request.ids)).await?;
    Ok(Json(items.into()))
}

// =============================================================================
// BUNDLES
// =============================================================================

/// `POST /api/bundle/export`: export a workspace as an encoded bundle.
///
/// # Returns
/// The bundle as standard base64, with entity counts per kind.
///
/// # Errors
/// `deadline-exceeded` once the export timeout elapses.
pub async fn bundle_export(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ExportRequest>,
) -> ApiResult<Json<ExportResponse>> {
    let exported = state
        .services
        .export_bundle(user, request.workspace_id, request.format, request.options)
        .await?;
    Ok(Json(exported.into()))
}

/// `POST /api/bundle/import`: decode, filter and import a bundle in one transaction.
///
/// # Errors
/// `invalid-argument` for bad base64, an undecodable bundle or both filters at once.
/// Nothing is written when any step fails.
pub async fn bundle_import(
    State(state): State<AppState>,
    Principal(user): Principal,
    Body(request): Body<ImportRequest>,
) -> ApiResult<Json<ImportResult>> {
    let data = request.decode_data()?;
    let import = BundleImport {
        workspace_id: request.workspace_id,
        format: request.format,
        data,
        options: request.options,
        filter_examples: request.filter_examples,
        filter_flows: request.filter_flows,
    };
    let result = state.services.import_bundle(user, import).await?;
    Ok(Json(result))
}
