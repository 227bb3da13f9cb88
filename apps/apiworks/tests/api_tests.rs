//! Integration tests for the apiworks HTTP API.
//!
//! Uses axum-test to drive the router without binding a socket.

#![allow(clippy::unwrap_used, clippy::panic)]

use apiworks::api::{
    AppState, ExportRequest, ExportResponse, HealthResponse, IdsRequest, ImportRequest,
    ItemsRequest, ItemsResponse, TokenTable, create_router,
};
use apiworks::config::{AppConfig, TokenEntry};
use apiworks::error::ErrorBody;
use apiworks::services::{CredentialUpdate, EnvironmentInput, MoveRequest, Services, WorkspaceInput};
use apiworks_core::model::{Credential, CredentialKind, Environment, Workspace};
use apiworks_core::storage::writer::MovePosition;
use apiworks_core::{ExportFormat, ExportOptions, Id, ImportOptions, ImportResult, Store, Vault};
use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::json;

const ALICE_TOKEN: &str = "alice-test-token";
const BOB_TOKEN: &str = "bob-test-token";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn create_test_server() -> TestServer {
    let (alice, bob) = (Id::new_now(), Id::new_now());
    let mut config = AppConfig::default();
    config.limits.rate_per_second = 0;
    config.auth.tokens = vec![
        TokenEntry {
            token: ALICE_TOKEN.to_string(),
            user_id: alice,
        },
        TokenEntry {
            token: BOB_TOKEN.to_string(),
            user_id: bob,
        },
    ];

    let services = Services::new(Store::in_memory().unwrap(), Vault::default());
    let state = AppState::new(services, TokenTable::from_config(&config.auth));
    TestServer::new(create_router(state, &config)).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {token}").parse().unwrap()
}

async fn create_workspace(server: &TestServer, token: &str, name: &str) -> Workspace {
    let response = server
        .post("/api/workspace/insert")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&ItemsRequest {
            items: vec![WorkspaceInput {
                id: Id::new_now(),
                name: name.to_string(),
            }],
        })
        .await;
    response.assert_status_ok();
    response.json::<ItemsResponse<Workspace>>().items.remove(0)
}

async fn insert_credential(server: &TestServer, token: &str, credential: &Credential) -> axum_test::TestResponse {
    server
        .post("/api/credential/insert")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&ItemsRequest {
            items: vec![credential.clone()],
        })
        .await
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_needs_no_token() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// AUTHENTICATION TESTS
// =============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let server = create_test_server();

    let response = server.post("/api/workspace/collection").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "unauthenticated");
}

#[tokio::test]
async fn test_unknown_token_is_unauthenticated() {
    let server = create_test_server();

    let response = server
        .post("/api/workspace/collection")
        .add_header(header::AUTHORIZATION, bearer("not-a-token"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// WORKSPACE AND ENVIRONMENT TESTS
// =============================================================================

#[tokio::test]
async fn test_workspace_insert_then_collection() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Demo").await;
    assert_eq!(ws.name, "Demo");
    assert!(ws.global_env.is_some());

    let response = server
        .post("/api/workspace/collection")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .await;
    response.assert_status_ok();
    let listed: ItemsResponse<Workspace> = response.json();
    assert_eq!(listed.items, vec![ws.clone()]);

    // Bob sees nothing of Alice's.
    let response = server
        .post("/api/workspace/collection")
        .add_header(header::AUTHORIZATION, bearer(BOB_TOKEN))
        .await;
    assert!(response.json::<ItemsResponse<Workspace>>().items.is_empty());
}

#[tokio::test]
async fn test_environment_move_reorders() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Envs").await;

    let inputs: Vec<EnvironmentInput> = ["Staging", "Production"]
        .into_iter()
        .map(|name| EnvironmentInput {
            id: Id::new_now(),
            workspace_id: ws.id,
            name: name.to_string(),
            description: String::new(),
        })
        .collect();
    let (staging, production) = (inputs[0].id, inputs[1].id);
    server
        .post("/api/environment/insert")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&ItemsRequest { items: inputs })
        .await
        .assert_status_ok();

    let response = server
        .post("/api/environment/move")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&MoveRequest {
            id: production,
            target_id: staging,
            position: MovePosition::Before,
        })
        .await;
    response.assert_status_ok();

    let ordered: ItemsResponse<Environment> = response.json();
    let position = |id: Id| ordered.items.iter().position(|e| e.id == id).unwrap();
    assert!(position(production) < position(staging));
}

// =============================================================================
// CREDENTIAL TESTS
// =============================================================================

#[tokio::test]
async fn test_credential_in_foreign_workspace_is_denied() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Alice only").await;

    let response = insert_credential(
        &server,
        BOB_TOKEN,
        &Credential::new(ws.id, "Sneaky", CredentialKind::OpenAi),
    )
    .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<ErrorBody>().code, "permission-denied");
}

#[tokio::test]
async fn test_taken_credential_id_reveals_nothing() {
    let server = create_test_server();
    let alice_ws = create_workspace(&server, ALICE_TOKEN, "Alice").await;
    let bob_ws = create_workspace(&server, BOB_TOKEN, "Bob").await;
    let credential = Credential::new(alice_ws.id, "Key", CredentialKind::OpenAi);
    insert_credential(&server, ALICE_TOKEN, &credential)
        .await
        .assert_status_ok();

    let mut copy = credential.clone();
    copy.workspace_id = bob_ws.id;
    let response = insert_credential(&server, BOB_TOKEN, &copy).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "invalid-argument");
    assert!(!body.message.contains("credential"));
    assert!(!body.message.contains(&credential.id.to_string()));
}

#[tokio::test]
async fn test_update_unknown_credential_is_not_found() {
    let server = create_test_server();

    let response = server
        .post("/api/credential/update")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&ItemsRequest {
            items: vec![CredentialUpdate {
                id: Id::new_now(),
                name: Some("Renamed".to_string()),
            }],
        })
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<ErrorBody>().code, "not-found");
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let server = create_test_server();

    let response = server
        .post("/api/credential/delete")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&json!({ "ids": "not-a-list" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().code, "invalid-argument");
}

#[tokio::test]
async fn test_secret_insert_and_get() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Secrets").await;
    let credential = Credential::new(ws.id, "OpenAI Key", CredentialKind::OpenAi);
    insert_credential(&server, ALICE_TOKEN, &credential)
        .await
        .assert_status_ok();

    server
        .post("/api/credential/secret/insert")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&json!({ "items": [{ "credential_id": credential.id, "secret": "sk-abc" }] }))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/credential/secret/get")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&IdsRequest {
            ids: vec![credential.id],
        })
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["items"][0]["secret"], "sk-abc");
    assert_eq!(body["items"][0]["kind"], "openai");
}

// =============================================================================
// BUNDLE TESTS
// =============================================================================

#[tokio::test]
async fn test_bundle_export_then_import() {
    let server = create_test_server();
    let source = create_workspace(&server, ALICE_TOKEN, "Source").await;
    let target = create_workspace(&server, ALICE_TOKEN, "Target").await;
    insert_credential(
        &server,
        ALICE_TOKEN,
        &Credential::new(source.id, "Key", CredentialKind::Anthropic),
    )
    .await
    .assert_status_ok();

    let response = server
        .post("/api/bundle/export")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&ExportRequest {
            workspace_id: source.id,
            format: ExportFormat::Json,
            options: ExportOptions::everything(),
        })
        .await;
    response.assert_status_ok();
    let exported: ExportResponse = response.json();
    assert_eq!(exported.format, ExportFormat::Json);
    assert_eq!(exported.counts.get("credentials"), Some(&1));

    let response = server
        .post("/api/bundle/import")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&ImportRequest {
            workspace_id: target.id,
            format: exported.format,
            data: exported.data,
            options: ImportOptions {
                workspace_id: target.id,
                ..ImportOptions::default()
            },
            filter_examples: None,
            filter_flows: None,
        })
        .await;
    response.assert_status_ok();
    let result: ImportResult = response.json();
    assert_eq!(result.id_maps.credential.len(), 1);

    let response = server
        .post("/api/credential/collection")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .await;
    let credentials: ItemsResponse<Credential> = response.json();
    assert_eq!(credentials.items.len(), 2);
    assert!(credentials.items.iter().any(|c| c.workspace_id == target.id));
}

#[tokio::test]
async fn test_bundle_import_rejects_bad_base64() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Target").await;

    let response = server
        .post("/api/bundle/import")
        .add_header(header::AUTHORIZATION, bearer(ALICE_TOKEN))
        .json(&json!({ "workspace_id": ws.id, "data": "%%% not base64 %%%" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().code, "invalid-argument");
}

#[tokio::test]
async fn test_bundle_export_of_foreign_workspace_is_denied() {
    let server = create_test_server();
    let ws = create_workspace(&server, ALICE_TOKEN, "Private").await;

    let response = server
        .post("/api/bundle/export")
        .add_header(header::AUTHORIZATION, bearer(BOB_TOKEN))
        .json(&json!({ "workspace_id": ws.id }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}
