//! HTTP surface over the engine actor.
//!
//! Authentication happens upstream: the caller's identity arrives in the
//! `x-caller` header and is trusted as-is.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::mixer::engine::ContractStatus;
use crate::mixer::pool::{Distribution, Pool};
use crate::mixer::{Amount, CallError, EngineHandle, Identity, LedgerError, LedgerEvent, PoolId};

pub const CALLER_HEADER: &str = "x-caller";

// ─────────────────────────────────────────────────────────
// Bodies
// ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountBody {
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePoolBody {
    pub pool_id: PoolId,
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub identity: Identity,
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitResponse {
    pub identity: Identity,
    pub remaining: Amount,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PauseResponse {
    pub paused: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeesResponse {
    pub withdrawn: Amount,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolResponse {
    pub pool_id: PoolId,
    pub pool: Pool,
}

// ─────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Call(CallError),
    MissingCaller,
    BadIdentity(String),
    PoolNotFound(PoolId),
}

impl From<CallError> for ApiError {
    fn from(e: CallError) -> Self {
        ApiError::Call(e)
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotAuthorized => StatusCode::FORBIDDEN,
        LedgerError::InvalidAmount | LedgerError::InvalidPool => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientBalance | LedgerError::InsufficientPoolFunds => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::NotInitialized
        | LedgerError::AlreadyInitialized
        | LedgerError::PoolFull
        | LedgerError::DuplicateParticipant
        | LedgerError::PoolNotReady => StatusCode::CONFLICT,
        LedgerError::DailyLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        LedgerError::TransferFailed(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Call(CallError::Ledger(e)) => (
                ledger_status(e),
                json!({ "error": e.kind(), "code": e.code(), "message": e.to_string() }),
            ),
            ApiError::Call(CallError::EngineUnavailable) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "EngineUnavailable", "message": "ledger engine is not running" }),
            ),
            ApiError::MissingCaller => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "MissingCaller", "message": format!("{CALLER_HEADER} header is required") }),
            ),
            ApiError::BadIdentity(raw) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "BadIdentity", "message": format!("not an address: {raw}") }),
            ),
            ApiError::PoolNotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "PoolNotFound", "message": format!("pool {id} does not exist") }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_identity(raw: &str) -> Result<Identity, ApiError> {
    raw.trim()
        .parse::<Identity>()
        .map_err(|_| ApiError::BadIdentity(raw.to_string()))
}

fn caller(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let raw = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingCaller)?;
    parse_identity(raw)
}

// ─────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────

pub fn router(handle: EngineHandle) -> Router {
    Router::new()
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/pools", post(create_pool))
        .route("/pools/:id", get(pool_details))
        .route("/pools/:id/join", post(join_pool))
        .route("/pools/:id/distribute", post(distribute))
        .route("/admin/initialize", post(initialize))
        .route("/admin/pause", post(toggle_pause))
        .route("/admin/fees/withdraw", post(withdraw_fees))
        .route("/balances/:identity", get(balance))
        .route("/limits/:identity", get(daily_remaining))
        .route("/status", get(status))
        .route("/events/drain", post(drain_events))
        .with_state(handle)
}

pub async fn serve(handle: EngineHandle, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🌐 Ledger API listening on {}", addr);
    axum::serve(listener, router(handle))
        .await
        .context("ledger API server stopped")
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

pub async fn deposit(
    State(h): State<EngineHandle>,
    headers: HeaderMap,
    Json(body): Json<AmountBody>,
) -> ApiResult<BalanceResponse> {
    let identity = caller(&headers)?;
    let balance = h.deposit(identity, body.amount).await?;
    Ok(Json(BalanceResponse { identity, balance }))
}

pub async fn withdraw(
    State(h): State<EngineHandle>,
    headers: HeaderMap,
    Json(body): Json<AmountBody>,
) -> ApiResult<BalanceResponse> {
    let identity = caller(&headers)?;
    let balance = h.withdraw(identity, body.amount).await?;
    Ok(Json(BalanceResponse { identity, balance }))
}

pub async fn create_pool(
    State(h): State<EngineHandle>,
    headers: HeaderMap,
    Json(body): Json<CreatePoolBody>,
) -> ApiResult<PoolResponse> {
    let identity = caller(&headers)?;
    h.create_pool(identity, body.pool_id, body.amount).await?;
    load_pool(&h, body.pool_id).await
}

pub async fn join_pool(
    State(h): State<EngineHandle>,
    Path(pool_id): Path<PoolId>,
    headers: HeaderMap,
    Json(body): Json<AmountBody>,
) -> ApiResult<PoolResponse> {
    let identity = caller(&headers)?;
    h.join_pool(identity, pool_id, body.amount).await?;
    load_pool(&h, pool_id).await
}

pub async fn distribute(
    State(h): State<EngineHandle>,
    Path(pool_id): Path<PoolId>,
    headers: HeaderMap,
) -> ApiResult<Distribution> {
    let identity = caller(&headers)?;
    Ok(Json(h.distribute(identity, pool_id).await?))
}

pub async fn initialize(State(h): State<EngineHandle>, headers: HeaderMap) -> ApiResult<ContractStatus> {
    let identity = caller(&headers)?;
    h.initialize(identity).await?;
    Ok(Json(h.status().await?))
}

pub async fn toggle_pause(State(h): State<EngineHandle>, headers: HeaderMap) -> ApiResult<PauseResponse> {
    let identity = caller(&headers)?;
    let paused = h.toggle_pause(identity).await?;
    warn!("Admin API toggled pause → {}", paused);
    Ok(Json(PauseResponse { paused }))
}

pub async fn withdraw_fees(State(h): State<EngineHandle>, headers: HeaderMap) -> ApiResult<FeesResponse> {
    let identity = caller(&headers)?;
    let withdrawn = h.withdraw_protocol_fees(identity).await?;
    Ok(Json(FeesResponse { withdrawn }))
}

pub async fn balance(State(h): State<EngineHandle>, Path(raw): Path<String>) -> ApiResult<BalanceResponse> {
    let identity = parse_identity(&raw)?;
    let balance = h.balance(identity).await?;
    Ok(Json(BalanceResponse { identity, balance }))
}

pub async fn daily_remaining(State(h): State<EngineHandle>, Path(raw): Path<String>) -> ApiResult<LimitResponse> {
    let identity = parse_identity(&raw)?;
    let remaining = h.daily_limit_remaining(identity).await?;
    Ok(Json(LimitResponse { identity, remaining }))
}

pub async fn status(State(h): State<EngineHandle>) -> ApiResult<ContractStatus> {
    Ok(Json(h.status().await?))
}

/// Hands the journal to the caller and empties it.
pub async fn drain_events(State(h): State<EngineHandle>) -> ApiResult<Vec<LedgerEvent>> {
    Ok(Json(h.take_events().await?))
}

pub async fn pool_details(State(h): State<EngineHandle>, Path(pool_id): Path<PoolId>) -> ApiResult<PoolResponse> {
    load_pool(&h, pool_id).await
}

async fn load_pool(h: &EngineHandle, pool_id: PoolId) -> ApiResult<PoolResponse> {
    let pool = h.pool_details(pool_id).await?.ok_or(ApiError::PoolNotFound(pool_id))?;
    Ok(Json(PoolResponse { pool_id, pool }))
}
