//! API routes for Notary endpoints

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;

use notary_anchor::{decode_hex, AnchorReceipt, Digest32};
use notary_persist::{DayTally, FailureStats, Todo, TodoStatus};

use crate::error::{ApiError, ApiResult, ErrorBody, ErrorResponse};
use crate::state::AppState;

/// Longest accepted username
const MAX_USERNAME_LEN: usize = 64;
/// Longest accepted todo text
const MAX_TODO_LEN: usize = 4096;
/// Furthest accepted todo deadline, ten years out
const MAX_EXPIRY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Health check response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

/// Component health status
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub ledger: ComponentStatus,
    pub timestamps: ComponentStatus,
}

/// Individual component status
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Basic health check handler (lightweight)
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Basic health check", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        components: None,
    })
}

/// Detailed health check with database and ledger connectivity
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses(
        (status = 200, description = "Detailed health check with component status",
            body = HealthResponse)
    )
)]
pub async fn health_detailed(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db();
    let start = std::time::Instant::now();
    let db_healthy = db.is_healthy().await;
    let db_latency = start.elapsed().as_millis() as u64;

    let start = std::time::Instant::now();
    let ledger = state.anchor().ledger_healthy().await;
    let ledger_latency = start.elapsed().as_millis() as u64;

    let db_status = ComponentStatus {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        backend: Some(db.name().to_string()),
        latency_ms: Some(db_latency),
    };

    // An unconfigured ledger is a deployment choice, not a fault
    let ledger_status = ComponentStatus {
        status: match ledger {
            Some(true) => "healthy",
            Some(false) => "unhealthy",
            None => "not_configured",
        }
        .to_string(),
        backend: Some(state.anchor().chain_name().to_string()),
        latency_ms: ledger.map(|_| ledger_latency),
    };

    let timestamps_status = ComponentStatus {
        status: "healthy".to_string(),
        backend: Some(state.timestamps().name().to_string()),
        latency_ms: None,
    };

    let overall_status = if db_healthy && ledger != Some(false) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        components: Some(ComponentHealth {
            database: db_status,
            ledger: ledger_status,
            timestamps: timestamps_status,
        }),
    })
}

// ---------------------------------------------------------------------------
// OpenTimestamps
// ---------------------------------------------------------------------------

/// Timestamp creation request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OtsCreateRequest {
    /// Digest to timestamp, hex (optional `0x` prefix)
    pub hash: String,
}

/// Timestamp verification request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OtsVerifyRequest {
    /// Digest the proof should cover, hex
    pub hash: String,
    /// Proof, base64
    pub proof: String,
}

/// Timestamp upgrade request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OtsUpgradeRequest {
    /// Proof, base64
    pub proof: String,
}

/// Proof response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OtsProofResponse {
    /// Proof, base64
    pub proof: String,
}

/// Verification response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OtsVerifyResponse {
    pub verified: bool,
}

fn decode_proof(proof: &str) -> ApiResult<Vec<u8>> {
    BASE64
        .decode(proof.trim())
        .map_err(|e| ApiError::BadRequest(format!("proof is not valid base64: {}", e)))
}

/// Create a timestamp proof for a digest
#[utoipa::path(
    post,
    path = "/ots/create",
    request_body = OtsCreateRequest,
    responses(
        (status = 200, description = "Proof created", body = OtsProofResponse),
        (status = 400, description = "Malformed hash", body = ErrorResponse),
        (status = 502, description = "No calendar accepted the digest", body = ErrorResponse)
    )
)]
pub async fn ots_create(
    State(state): State<AppState>,
    Json(req): Json<OtsCreateRequest>,
) -> ApiResult<Json<OtsProofResponse>> {
    let digest = decode_hex(&req.hash)?;
    let proof = state.timestamps().create(&digest).await?;

    tracing::info!(operation = "ots_create", hash = %req.hash, "Timestamp proof created");

    Ok(Json(OtsProofResponse {
        proof: BASE64.encode(proof),
    }))
}

/// Check a timestamp proof against a digest
#[utoipa::path(
    post,
    path = "/ots/verify",
    request_body = OtsVerifyRequest,
    responses(
        (status = 200, description = "Verification result", body = OtsVerifyResponse),
        (status = 400, description = "Malformed hash or proof", body = ErrorResponse)
    )
)]
pub async fn ots_verify(
    State(state): State<AppState>,
    Json(req): Json<OtsVerifyRequest>,
) -> ApiResult<Json<OtsVerifyResponse>> {
    let digest = decode_hex(&req.hash)?;
    let proof = decode_proof(&req.proof)?;
    let verified = state.timestamps().verify(&digest, &proof).await?;

    tracing::debug!(
        operation = "ots_verify",
        hash = %req.hash,
        verified,
        "Timestamp proof checked"
    );

    Ok(Json(OtsVerifyResponse { verified }))
}

/// Upgrade a pending timestamp proof
#[utoipa::path(
    post,
    path = "/ots/upgrade",
    request_body = OtsUpgradeRequest,
    responses(
        (status = 200, description = "Upgraded proof, or the same proof while still pending",
            body = OtsProofResponse),
        (status = 400, description = "Malformed proof", body = ErrorResponse)
    )
)]
pub async fn ots_upgrade(
    State(state): State<AppState>,
    Json(req): Json<OtsUpgradeRequest>,
) -> ApiResult<Json<OtsProofResponse>> {
    let proof = decode_proof(&req.proof)?;
    let upgraded = state.timestamps().upgrade(&proof).await?;

    Ok(Json(OtsProofResponse {
        proof: BASE64.encode(upgraded),
    }))
}

// ---------------------------------------------------------------------------
// EVM anchoring
// ---------------------------------------------------------------------------

/// Anchor request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnchorRequest {
    /// 32-byte hash, hex (optional `0x` prefix)
    pub hash: String,
    /// Free-form reference stored alongside the hash
    #[serde(rename = "ref", default)]
    pub reference: String,
}

/// Anchor response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnchorResponse {
    /// Transaction id
    pub tx: String,
    /// Contract address
    pub contract: String,
    /// Chain display name
    pub chain: String,
    /// Block explorer link, when an explorer is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer: Option<String>,
    /// `lite` or `full`
    pub mode: String,
}

impl From<AnchorReceipt> for AnchorResponse {
    fn from(receipt: AnchorReceipt) -> Self {
        Self {
            tx: receipt.tx_id,
            contract: receipt.contract_address,
            chain: receipt.chain_name,
            explorer: receipt.explorer_url,
            mode: receipt.mode.to_string(),
        }
    }
}

/// Anchor verification request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnchorVerifyRequest {
    /// 32-byte hash, hex
    pub hash: String,
}

/// Anchor verification response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnchorVerifyResponse {
    pub found: bool,
    /// Transaction id of the most recent anchor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
}

/// Anchor a hash on the configured contract
#[utoipa::path(
    post,
    path = "/evm/anchor",
    request_body = AnchorRequest,
    responses(
        (status = 200, description = "Anchor confirmed", body = AnchorResponse),
        (status = 400, description = "Malformed hash", body = ErrorResponse),
        (status = 502, description = "Submission failed", body = ErrorResponse),
        (status = 503, description = "Chain not configured", body = ErrorResponse),
        (status = 504, description = "Confirmation timed out", body = ErrorResponse)
    )
)]
pub async fn evm_anchor(
    State(state): State<AppState>,
    Json(req): Json<AnchorRequest>,
) -> ApiResult<Json<AnchorResponse>> {
    let hash = Digest32::from_hex(&req.hash)?;
    let receipt = state.anchor().anchor(&hash, &req.reference).await?;
    Ok(Json(receipt.into()))
}

/// Look up the most recent anchor of a hash
#[utoipa::path(
    post,
    path = "/evm/verify",
    request_body = AnchorVerifyRequest,
    responses(
        (status = 200, description = "Lookup result", body = AnchorVerifyResponse),
        (status = 400, description = "Malformed hash", body = ErrorResponse),
        (status = 502, description = "Log query failed", body = ErrorResponse),
        (status = 503, description = "Chain not configured", body = ErrorResponse)
    )
)]
pub async fn evm_verify(
    State(state): State<AppState>,
    Json(req): Json<AnchorVerifyRequest>,
) -> ApiResult<Json<AnchorVerifyResponse>> {
    let hash = Digest32::from_hex(&req.hash)?;
    let verification = state.anchor().verify_anchor(&hash).await?;
    Ok(Json(AnchorVerifyResponse {
        found: verification.found,
        tx: verification.tx_id,
    }))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Registration / login request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UserRequest {
    pub username: String,
    pub password: String,
}

/// User id response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i64,
}

fn validate_credentials(req: &UserRequest) -> ApiResult<&str> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }
    Ok(username)
}

/// Register a user
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = UserRequest,
    responses(
        (status = 200, description = "User registered", body = UserResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let username = validate_credentials(&req)?;
    let id = state.db().create_user(username, &req.password).await?;
    tracing::info!(user_id = id, "User registered");
    Ok(Json(UserResponse { id }))
}

/// Check a user's password
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = UserRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let username = validate_credentials(&req)?;
    let id = state.db().authenticate(username, &req.password).await?;
    Ok(Json(UserResponse { id }))
}

// ---------------------------------------------------------------------------
// Todos
// ---------------------------------------------------------------------------

/// Todo creation request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddTodoRequest {
    pub user_id: i64,
    pub text: String,
    /// Seconds until the todo expires; no deadline when absent
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
}

/// New todo id
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoIdResponse {
    pub id: i64,
}

/// Todo as listed
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoItem {
    pub id: i64,
    pub text: String,
    pub done: bool,
    pub status: TodoStatus,
    pub created: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Todo> for TodoItem {
    fn from(todo: Todo) -> Self {
        Self {
            status: todo.status(),
            id: todo.id,
            text: todo.text,
            done: todo.done,
            created: todo.created,
            expires_at: todo.expires_at,
        }
    }
}

/// A user's todos
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoListResponse {
    pub todos: Vec<TodoItem>,
}

/// Completion update
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TodoDoneRequest {
    pub id: i64,
    #[serde(default = "default_done")]
    pub done: bool,
}

fn default_done() -> bool {
    true
}

/// Deletion result
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoDeleteResponse {
    pub deleted: bool,
}

/// Purge result
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoPurgeResponse {
    /// Todos deleted; expired ones are kept
    pub purged: u64,
}

/// One day of the failure ledger
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FailureDay {
    pub date: chrono::NaiveDate,
    #[serde(flatten)]
    pub tally: DayTally,
}

/// A user's failure ledger
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FailureStatsResponse {
    pub user_id: i64,
    pub total_expired: u64,
    pub total_deleted_unfinished: u64,
    /// Consecutive closed days without a completion
    pub streak_days: u64,
    pub shame_points: u64,
    pub rank: String,
    /// Oldest day first
    pub history: Vec<FailureDay>,
}

impl FailureStatsResponse {
    fn new(user_id: i64, stats: FailureStats) -> Self {
        Self {
            user_id,
            total_expired: stats.total_expired,
            total_deleted_unfinished: stats.total_deleted_unfinished,
            streak_days: stats.streak_days,
            shame_points: stats.shame_points,
            rank: stats.rank().to_string(),
            history: stats
                .history
                .into_iter()
                .map(|(date, tally)| FailureDay { date, tally })
                .collect(),
        }
    }
}

/// Todo anchor result
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TodoAnchorResponse {
    pub id: i64,
    /// SHA-256 of the todo's canonical JSON, `0x` hex
    pub digest: String,
    /// Reference written with the anchor
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub anchor: AnchorResponse,
}

/// Add a todo for a user
#[utoipa::path(
    post,
    path = "/todos/add",
    request_body = AddTodoRequest,
    responses(
        (status = 200, description = "Todo created", body = TodoIdResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn add_todo(
    State(state): State<AppState>,
    Json(req): Json<AddTodoRequest>,
) -> ApiResult<Json<TodoIdResponse>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }
    if req.text.len() > MAX_TODO_LEN {
        return Err(ApiError::Validation(format!(
            "text must be at most {} bytes",
            MAX_TODO_LEN
        )));
    }

    let expires_at = match req.expires_in_secs {
        Some(0) => {
            return Err(ApiError::Validation(
                "expires_in_secs must be positive".to_string(),
            ))
        }
        Some(secs) if secs > MAX_EXPIRY_SECS => {
            return Err(ApiError::Validation(format!(
                "expires_in_secs must be at most {}",
                MAX_EXPIRY_SECS
            )))
        }
        Some(secs) => Some(chrono::Utc::now() + chrono::Duration::seconds(secs as i64)),
        None => None,
    };

    let id = state.db().add_todo(req.user_id, &req.text, expires_at).await?;
    tracing::debug!(user_id = req.user_id, todo_id = id, ?expires_at, "Todo added");
    Ok(Json(TodoIdResponse { id }))
}

/// List a user's todos
#[utoipa::path(
    get,
    path = "/todos/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Owner of the todos")
    ),
    responses(
        (status = 200, description = "Todos in creation order", body = TodoListResponse)
    )
)]
pub async fn list_todos(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<TodoListResponse>> {
    state.db().expire_overdue(user_id, chrono::Utc::now()).await?;
    let todos = state.db().list_todos(user_id).await?;
    Ok(Json(TodoListResponse {
        todos: todos.into_iter().map(TodoItem::from).collect(),
    }))
}

/// Mark a todo done or not done
#[utoipa::path(
    post,
    path = "/todos/done",
    request_body = TodoDoneRequest,
    responses(
        (status = 200, description = "Todo updated", body = TodoDoneRequest),
        (status = 404, description = "Unknown todo", body = ErrorResponse),
        (status = 409, description = "Todo has expired", body = ErrorResponse)
    )
)]
pub async fn set_todo_done(
    State(state): State<AppState>,
    Json(req): Json<TodoDoneRequest>,
) -> ApiResult<Json<TodoDoneRequest>> {
    state.db().set_todo_done(req.id, req.done).await?;
    Ok(Json(req))
}

/// Delete a todo
#[utoipa::path(
    delete,
    path = "/todos/item/{id}",
    params(
        ("id" = i64, Path, description = "Todo id")
    ),
    responses(
        (status = 200, description = "Todo deleted", body = TodoDeleteResponse),
        (status = 404, description = "Unknown todo", body = ErrorResponse),
        (status = 409, description = "Todo has expired", body = ErrorResponse)
    )
)]
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TodoDeleteResponse>> {
    if !state.db().delete_todo(id).await? {
        return Err(ApiError::NotFound(format!("todo {}", id)));
    }
    Ok(Json(TodoDeleteResponse { deleted: true }))
}

/// Delete all of a user's todos except expired ones
#[utoipa::path(
    post,
    path = "/todos/purge/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Owner of the todos")
    ),
    responses(
        (status = 200, description = "Todos purged", body = TodoPurgeResponse)
    )
)]
pub async fn purge_todos(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<TodoPurgeResponse>> {
    state.db().expire_overdue(user_id, chrono::Utc::now()).await?;
    let purged = state.db().purge_todos(user_id).await?;
    Ok(Json(TodoPurgeResponse { purged }))
}

/// Expire overdue todos, then read the ledger as of today (UTC)
async fn current_failure_stats(state: &AppState, user_id: i64) -> ApiResult<FailureStats> {
    let now = chrono::Utc::now();
    state.db().expire_overdue(user_id, now).await?;
    Ok(state.db().failure_stats(user_id, now.date_naive()).await?)
}

/// A user's failure ledger
#[utoipa::path(
    get,
    path = "/todos/stats/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Owner of the todos")
    ),
    responses(
        (status = 200, description = "Failure ledger", body = FailureStatsResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn failure_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<FailureStatsResponse>> {
    let stats = current_failure_stats(&state, user_id).await?;
    Ok(Json(FailureStatsResponse::new(user_id, stats)))
}

/// A user's failure history as CSV
#[utoipa::path(
    get,
    path = "/todos/stats/{user_id}/csv",
    params(
        ("user_id" = i64, Path, description = "Owner of the todos")
    ),
    responses(
        (status = 200, description = "date,expired,deleted,completed rows", body = String,
            content_type = "text/csv"),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn failure_csv(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let stats = current_failure_stats(&state, user_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"failure-history.csv\"",
            ),
        ],
        stats.history_csv(),
    ))
}

/// Anchor a todo's canonical digest
#[utoipa::path(
    post,
    path = "/todos/item/{id}/anchor",
    params(
        ("id" = i64, Path, description = "Todo id")
    ),
    responses(
        (status = 200, description = "Todo anchored", body = TodoAnchorResponse),
        (status = 404, description = "Unknown todo", body = ErrorResponse),
        (status = 503, description = "Chain not configured", body = ErrorResponse)
    )
)]
pub async fn anchor_todo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TodoAnchorResponse>> {
    let todo = state
        .db()
        .get_todo(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("todo {}", id)))?;

    let digest = Digest32(
        todo.digest()
            .map_err(|e| ApiError::Internal(format!("canonical form of todo {}: {}", id, e)))?,
    );
    let reference = format!("todo:{}", todo.id);
    let receipt = state.anchor().anchor(&digest, &reference).await?;

    Ok(Json(TodoAnchorResponse {
        id: todo.id,
        digest: digest.to_hex(),
        reference,
        anchor: receipt.into(),
    }))
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "Notary API", description = "Timestamp proofs, chain anchors and todos"),
    paths(
        health,
        health_detailed,
        ots_create,
        ots_verify,
        ots_upgrade,
        evm_anchor,
        evm_verify,
        register_user,
        login_user,
        add_todo,
        list_todos,
        set_todo_done,
        delete_todo,
        purge_todos,
        failure_stats,
        failure_csv,
        anchor_todo,
    ),
    components(
        schemas(
            HealthResponse,
            ComponentHealth,
            ComponentStatus,
            ErrorResponse,
            ErrorBody,
            OtsCreateRequest,
            OtsVerifyRequest,
            OtsUpgradeRequest,
            OtsProofResponse,
            OtsVerifyResponse,
            AnchorRequest,
            AnchorResponse,
            AnchorVerifyRequest,
            AnchorVerifyResponse,
            UserRequest,
            UserResponse,
            AddTodoRequest,
            TodoIdResponse,
            TodoItem,
            TodoListResponse,
            TodoDoneRequest,
            TodoDeleteResponse,
            TodoPurgeResponse,
            TodoStatus,
            DayTally,
            FailureDay,
            FailureStatsResponse,
            TodoAnchorResponse,
        )
    )
)]
pub struct ApiDoc;

/// Build the API router
pub fn api_router(state: AppState) -> Router {
    use utoipa_swagger_ui::SwaggerUi;

    Router::new()
        // Documentation endpoints
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public endpoints
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        // Timestamp proofs
        .route("/ots/create", post(ots_create))
        .route("/ots/verify", post(ots_verify))
        .route("/ots/upgrade", post(ots_upgrade))
        // Chain anchors
        .route("/evm/anchor", post(evm_anchor))
        .route("/evm/verify", post(evm_verify))
        // Users
        .route("/users/register", post(register_user))
        .route("/users/login", post(login_user))
        // Todos
        .route("/todos/add", post(add_todo))
        .route("/todos/done", post(set_todo_done))
        .route("/todos/{user_id}", get(list_todos))
        .route("/todos/item/{id}", delete(delete_todo))
        .route("/todos/item/{id}/anchor", post(anchor_todo))
        .route("/todos/purge/{user_id}", post(purge_todos))
        .route("/todos/stats/{user_id}", get(failure_stats))
        .route("/todos/stats/{user_id}/csv", get(failure_csv))
        // State
        .with_state(state)
}
