//! Integration tests for the Notary API
//!
//! Every test runs the real router against in-memory backends.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use notary_anchor::{
    AnchorMode, AnchorRouter, ChainConfig, Digest32, LedgerClient, MemoryLedger,
    MemoryTimestamper,
};
use notary_api::routes::api_router;
use notary_api::{AppState, NotaryServer, ServerConfig};
use notary_persist::{SqliteBackend, StorageBackend, Todo};

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

fn chain(mode: AnchorMode) -> ChainConfig {
    ChainConfig {
        contract_address: Some(CONTRACT.to_string()),
        chain_name: "devnet".to_string(),
        explorer_url: Some("https://explorer.devnet".to_string()),
        mode,
        confirm_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

async fn state_with(router: AnchorRouter) -> AppState {
    let db = SqliteBackend::new("sqlite::memory:").await.unwrap();
    AppState::new(router, Arc::new(MemoryTimestamper::new()), Arc::new(db))
}

async fn app_with(ledger: Option<Arc<dyn LedgerClient>>, mode: AnchorMode) -> Router {
    api_router(state_with(AnchorRouter::new(&chain(mode), ledger)).await)
}

async fn app() -> Router {
    app_with(Some(Arc::new(MemoryLedger::new())), AnchorMode::Lite).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn get_text(app: &Router, uri: &str) -> (StatusCode, String, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

fn hash_hex(data: &[u8]) -> String {
    Digest32::sha256(data).to_hex()
}

async fn register(app: &Router, username: &str) -> i64 {
    let (status, body) = post(
        app,
        "/users/register",
        json!({"username": username, "password": "pw"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

async fn add_todo(app: &Router, user_id: i64, text: &str) -> i64 {
    let (status, body) = post(app, "/todos/add", json!({"user_id": user_id, "text": text})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

/// Router plus a handle on its database
async fn app_with_db() -> (Router, Arc<SqliteBackend>) {
    let db = Arc::new(SqliteBackend::new("sqlite::memory:").await.unwrap());
    let ledger: Arc<dyn LedgerClient> = Arc::new(MemoryLedger::new());
    let router = AnchorRouter::new(&chain(AnchorMode::Lite), Some(ledger));
    let state = AppState::new(router, Arc::new(MemoryTimestamper::new()), db.clone());
    (api_router(state), db)
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/health/detailed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["database"]["status"], "healthy");
    assert_eq!(body["components"]["ledger"]["status"], "healthy");
    assert_eq!(body["components"]["timestamps"]["backend"], "memory");
}

#[tokio::test]
async fn test_health_reports_unconfigured_ledger() {
    let app = app_with(None, AnchorMode::Lite).await;
    let (_, body) = send(&app, "GET", "/health/detailed", None).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["ledger"]["status"], "not_configured");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/evm/verify"].is_object());
}

#[tokio::test]
async fn test_anchor_then_verify() {
    let app = app().await;
    let hash = hash_hex(b"quarterly report");

    let (status, anchored) =
        post(&app, "/evm/anchor", json!({"hash": hash, "ref": "report-q3"})).await;
    assert_eq!(status, StatusCode::OK, "{anchored}");
    assert_eq!(anchored["contract"], CONTRACT);
    assert_eq!(anchored["chain"], "devnet");
    assert_eq!(anchored["mode"], "lite");
    let tx = anchored["tx"].as_str().unwrap().to_string();
    assert_eq!(anchored["explorer"], format!("https://explorer.devnet/tx/{tx}"));

    let (status, verified) = post(&app, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["found"], true);
    assert_eq!(verified["tx"], tx);
}

#[tokio::test]
async fn test_verify_unknown_hash() {
    let app = app().await;
    let hash = hash_hex(b"never anchored");
    let (status, body) = post(&app, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert!(body.get("tx").is_none());
}

#[tokio::test]
async fn test_reanchored_hash_reports_latest_tx() {
    let app = app().await;
    let hash = hash_hex(b"contract draft");

    let (_, first) = post(&app, "/evm/anchor", json!({"hash": hash, "ref": "v1"})).await;
    let (_, second) = post(&app, "/evm/anchor", json!({"hash": hash, "ref": "v2"})).await;
    assert_ne!(first["tx"], second["tx"]);

    let (_, verified) = post(&app, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(verified["tx"], second["tx"]);
}

#[tokio::test]
async fn test_modes_do_not_see_each_other() {
    let ledger: Arc<dyn LedgerClient> = Arc::new(MemoryLedger::new());
    let lite = app_with(Some(ledger.clone()), AnchorMode::Lite).await;
    let full = app_with(Some(ledger), AnchorMode::Full).await;
    let hash = hash_hex(b"shared ledger");

    let (status, anchored) =
        post(&full, "/evm/anchor", json!({"hash": hash, "ref": "x"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anchored["mode"], "full");

    let (_, seen_by_lite) = post(&lite, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(seen_by_lite["found"], false);

    let (_, seen_by_full) = post(&full, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(seen_by_full["found"], true);
}

#[tokio::test]
async fn test_unconfigured_chain_is_503() {
    let app = app_with(None, AnchorMode::Lite).await;
    let hash = hash_hex(b"anything");

    let (status, body) = post(&app, "/evm/anchor", json!({"hash": hash, "ref": "r"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CHAIN_NOT_CONFIGURED");

    let (status, _) = post(&app, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_read_only_ledger_rejects_anchor_without_submitting() {
    let ledger = Arc::new(MemoryLedger::read_only());
    let app = app_with(Some(ledger.clone()), AnchorMode::Lite).await;

    let hash = hash_hex(b"x");
    let (status, body) = post(&app, "/evm/anchor", json!({"hash": hash, "ref": "r"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CHAIN_NOT_CONFIGURED");
    assert_eq!(ledger.submissions(), 0);

    // Verification needs no signer
    let (status, _) = post(&app, "/evm/verify", json!({"hash": hash})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_hash_is_400() {
    let app = app().await;

    let (status, body) =
        post(&app, "/evm/anchor", json!({"hash": "0xnothex", "ref": "r"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // 31 bytes
    let short = "ab".repeat(31);
    let (status, _) = post(&app, "/evm/verify", json!({"hash": short})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/ots/create", json!({"hash": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ots_create_verify_upgrade() {
    let app = app().await;
    let hash = hash_hex(b"lab notebook page 12");

    let (status, created) = post(&app, "/ots/create", json!({"hash": hash})).await;
    assert_eq!(status, StatusCode::OK);
    let proof = created["proof"].as_str().unwrap().to_string();

    let (status, body) =
        post(&app, "/ots/verify", json!({"hash": hash, "proof": proof})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let (_, body) = post(
        &app,
        "/ots/verify",
        json!({"hash": hash_hex(b"other page"), "proof": proof}),
    )
    .await;
    assert_eq!(body["verified"], false);

    let (status, upgraded) = post(&app, "/ots/upgrade", json!({"proof": proof})).await;
    assert_eq!(status, StatusCode::OK);
    let upgraded = upgraded["proof"].as_str().unwrap().to_string();
    assert_ne!(upgraded, proof);

    let (_, body) =
        post(&app, "/ots/verify", json!({"hash": hash, "proof": upgraded})).await;
    assert_eq!(body["verified"], true);

    // Upgrading a complete proof changes nothing
    let (_, again) = post(&app, "/ots/upgrade", json!({"proof": upgraded})).await;
    assert_eq!(again["proof"], upgraded);
}

#[tokio::test]
async fn test_ots_rejects_bad_base64() {
    let app = app().await;
    let (status, body) = post(
        &app,
        "/ots/verify",
        json!({"hash": hash_hex(b"x"), "proof": "!!not base64!!"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_register_login_and_conflict() {
    let app = app().await;
    let credentials = |username: &str, password: &str| {
        json!({"username": username, "password": password})
    };

    let (status, first) = post(&app, "/users/register", credentials("dana", "s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    let id = first["id"].as_i64().unwrap();

    let (status, body) = post(&app, "/users/register", credentials("dana", "other")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // The first account still works with its own password
    let (status, login) = post(&app, "/users/login", credentials("dana", "s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["id"], id);

    let (status, _) = post(&app, "/users/login", credentials("dana", "other")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post(&app, "/users/register", credentials("", "x")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_todo_lifecycle() {
    let app = app().await;
    let user_id = register(&app, "eli").await;

    let first_id = add_todo(&app, user_id, "buy milk").await;
    let second_id = add_todo(&app, user_id, "call bank").await;

    let (status, list) = send(&app, "GET", &format!("/todos/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let todos = list["todos"].as_array().unwrap();
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0]["id"], first_id);
    assert_eq!(todos[0]["text"], "buy milk");
    assert_eq!(todos[0]["done"], false);
    assert_eq!(todos[0]["status"], "open");
    assert!(todos[0]["created"].is_string());
    assert!(todos[0]["expires_at"].is_null());

    let (status, done) = post(&app, "/todos/done", json!({"id": first_id, "done": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["done"], true);

    let (status, deleted) =
        send(&app, "DELETE", &format!("/todos/item/{second_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);

    let (status, _) = send(&app, "DELETE", &format!("/todos/item/{second_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", &format!("/todos/{user_id}"), None).await;
    let todos = list["todos"].as_array().unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["done"], true);
    assert_eq!(todos[0]["status"], "done");
}

#[tokio::test]
async fn test_todo_deadline_validation() {
    let app = app().await;
    let user_id = register(&app, "hal").await;

    let (status, body) = post(
        &app,
        "/todos/add",
        json!({"user_id": user_id, "text": "later", "expires_in_secs": 3600}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, list) = send(&app, "GET", &format!("/todos/{user_id}"), None).await;
    assert_eq!(list["todos"][0]["status"], "open");
    assert!(list["todos"][0]["expires_at"].is_string());

    let (status, _) = post(
        &app,
        "/todos/add",
        json!({"user_id": user_id, "text": "now", "expires_in_secs": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_expired_todo_is_frozen_and_counted() {
    let (app, db) = app_with_db().await;
    let user_id = register(&app, "ivy").await;
    let past = chrono::Utc::now() - chrono::Duration::minutes(5);
    let late = db.add_todo(user_id, "renew lease", Some(past)).await.unwrap();

    // Listing sweeps overdue todos
    let (_, list) = send(&app, "GET", &format!("/todos/{user_id}"), None).await;
    assert_eq!(list["todos"][0]["status"], "expired");

    let (status, body) = send(&app, "DELETE", &format!("/todos/item/{late}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = post(&app, "/todos/done", json!({"id": late})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stats) = send(&app, "GET", &format!("/todos/stats/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK, "{stats}");
    assert_eq!(stats["total_expired"], 1);
    assert_eq!(stats["shame_points"], 5);
    assert_eq!(stats["rank"], "Mildly Guilty");
}

#[tokio::test]
async fn test_failure_stats_and_csv() {
    let app = app().await;
    let user_id = register(&app, "jo").await;

    let finished = add_todo(&app, user_id, "write tests").await;
    let abandoned = add_todo(&app, user_id, "learn oboe").await;
    post(&app, "/todos/done", json!({"id": finished})).await;
    send(&app, "DELETE", &format!("/todos/item/{abandoned}"), None).await;

    let (status, stats) = send(&app, "GET", &format!("/todos/stats/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["user_id"], user_id);
    assert_eq!(stats["total_deleted_unfinished"], 1);
    assert_eq!(stats["total_expired"], 0);
    assert_eq!(stats["streak_days"], 0);
    assert_eq!(stats["shame_points"], 2);

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let history = stats["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["date"], today);
    assert_eq!(history[0]["deleted"], 1);
    assert_eq!(history[0]["completed"], 1);

    let (status, content_type, csv) = get_text(&app, &format!("/todos/stats/{user_id}/csv")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/csv"));
    assert_eq!(csv, format!("date,expired,deleted,completed\n{today},0,1,1"));

    let (status, _) = send(&app, "GET", "/todos/stats/4242", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get_text(&app, "/todos/stats/4242/csv").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_purge_spares_expired_todos() {
    let (app, db) = app_with_db().await;
    let user_id = register(&app, "kit").await;
    let past = chrono::Utc::now() - chrono::Duration::seconds(1);
    let old = db.add_todo(user_id, "old", Some(past)).await.unwrap();
    add_todo(&app, user_id, "new").await;

    let (status, body) = post(&app, &format!("/todos/purge/{user_id}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], 1);

    let (_, list) = send(&app, "GET", &format!("/todos/{user_id}"), None).await;
    let todos = list["todos"].as_array().unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["id"], old);
    assert_eq!(todos[0]["status"], "expired");
}

#[tokio::test]
async fn test_todo_for_unknown_user_is_404() {
    let app = app().await;
    let (status, body) =
        post(&app, "/todos/add", json!({"user_id": 4242, "text": "ghost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, list) = send(&app, "GET", "/todos/4242", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["todos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_anchor_todo_uses_canonical_digest() {
    let (app, db) = app_with_db().await;
    let user_id = register(&app, "fay").await;
    let todo_id = add_todo(&app, user_id, "ship it").await;

    let (status, anchored) =
        post(&app, &format!("/todos/item/{todo_id}/anchor"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{anchored}");
    assert_eq!(anchored["ref"], format!("todo:{todo_id}"));

    let stored: Todo = db.get_todo(todo_id).await.unwrap().unwrap();
    let expected = Digest32(stored.digest().unwrap()).to_hex();
    assert_eq!(anchored["digest"], expected);

    let (_, verified) = post(&app, "/evm/verify", json!({"hash": expected})).await;
    assert_eq!(verified["found"], true);
    assert_eq!(verified["tx"], anchored["tx"]);

    let (status, _) = post(&app, "/todos/item/999/anchor", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_slow_confirmation_is_504_naming_the_tx() {
    let config = ChainConfig {
        confirm_timeout: Duration::from_millis(100),
        ..chain(AnchorMode::Lite)
    };
    let ledger =
        Arc::new(MemoryLedger::new().with_confirmation_delay(Duration::from_secs(30)));
    let app = api_router(state_with(AnchorRouter::new(&config, Some(ledger.clone()))).await);

    let hash = hash_hex(b"slow");
    let (status, body) = post(&app, "/evm/anchor", json!({"hash": hash, "ref": "r"})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "TIMEOUT");

    // The broadcast went out, so the client learns which tx to watch
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("still pending"), "{message}");
    assert!(message.contains("0x"), "{message}");
    assert_eq!(ledger.pending().await, 1);
}

#[tokio::test]
async fn test_server_router_adds_request_id() {
    let state = state_with(AnchorRouter::new(&chain(AnchorMode::Lite), None)).await;
    let server = NotaryServer::new(ServerConfig::default(), state);

    let response = server
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}
