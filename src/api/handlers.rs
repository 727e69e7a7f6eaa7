//! Request Handlers
//!
//! Engine calls touch the ledger store synchronously, so every handler runs
//! them on the blocking pool. Mutating handlers act as the [`Caller`] proven
//! by the bearer key.

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
    security::{Caller, CredentialRegistry},
};
use crate::crash::types::{Address, Bet, Pool, Round};
use crate::engine::CrashEngine;
use crate::errors::{EngineResult, GameError};
use crate::fairness::FairnessAudit;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: Arc<CrashEngine>,
    pub credentials: CredentialRegistry,
    pub version: String,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(engine: Arc<CrashEngine>) -> Self {
        Self {
            engine,
            credentials: CredentialRegistry::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics_enabled: true,
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialRegistry) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Anonymous requests to mutating routes are refused as `Unauthorized`.
fn require_caller(request_id: &RequestId, caller: Option<Extension<Caller>>) -> Result<Address, ApiError> {
    match caller {
        Some(Extension(Caller(address))) => Ok(address),
        None => Err(ApiError::game(request_id.0.clone(), GameError::Unauthorized)),
    }
}

async fn run_blocking<T, F>(request_id: &RequestId, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> EngineResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal_error(request_id.0.clone(), format!("Engine task failed: {}", e)))?
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))
}

fn parse_id(request_id: &RequestId, raw: &str, what: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>().map_err(|_| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("Invalid {} id: '{}'", what, raw),
        )
    })
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// GET /admin
pub async fn admin_handler(State(state): State<Arc<AppState>>) -> Json<AdminResponse> {
    Json(AdminResponse {
        admin: state.engine.admin().clone(),
    })
}

/// GET /pool
pub async fn pool_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Pool>, ApiError> {
    let engine = Arc::clone(&state.engine);
    run_blocking(&request_id, move || engine.get_pool())
        .await
        .map(Json)
}

/// POST /rounds
pub async fn create_round_handler(
    Extension(request_id): Extension<RequestId>,
    caller: Option<Extension<Caller>>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoundRequest>,
) -> Result<(StatusCode, Json<Round>), ApiError> {
    let caller = require_caller(&request_id, caller)?;
    let engine = Arc::clone(&state.engine);
    let round = run_blocking(&request_id, move || {
        engine.create_round(&caller, req.round_id, req.server_seed_hash)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(round)))
}

/// GET /rounds/:id
pub async fn round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Round>, ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let engine = Arc::clone(&state.engine);
    run_blocking(&request_id, move || engine.get_round(round_id))
        .await
        .map(Json)
}

/// GET /rounds/:id/bets
pub async fn round_bets_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<RoundBetsResponse>, ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let engine = Arc::clone(&state.engine);
    let bets = run_blocking(&request_id, move || engine.round_bets(round_id)).await?;
    Ok(Json(RoundBetsResponse { round_id, bets }))
}

/// GET /rounds/:id/audit
pub async fn round_audit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<FairnessAudit>, ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let engine = Arc::clone(&state.engine);
    run_blocking(&request_id, move || engine.audit_round(round_id))
        .await
        .map(Json)
}

/// POST /rounds/:id/start
pub async fn start_round_handler(
    Extension(request_id): Extension<RequestId>,
    caller: Option<Extension<Caller>>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(req): Json<StartRoundRequest>,
) -> Result<Json<RoundTransitionResponse>, ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let caller = require_caller(&request_id, caller)?;
    let engine = Arc::clone(&state.engine);
    let round = run_blocking(&request_id, move || {
        engine.start_round(&caller, round_id, req.server_seed, req.crash_multiplier)?;
        engine.get_round(round_id)
    })
    .await?;
    Ok(Json(RoundTransitionResponse { round }))
}

/// POST /rounds/:id/finalize
pub async fn finalize_round_handler(
    Extension(request_id): Extension<RequestId>,
    caller: Option<Extension<Caller>>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<RoundTransitionResponse>, ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let caller = require_caller(&request_id, caller)?;
    let engine = Arc::clone(&state.engine);
    let round = run_blocking(&request_id, move || {
        engine.finalize_round(&caller, round_id)?;
        engine.get_round(round_id)
    })
    .await?;
    Ok(Json(RoundTransitionResponse { round }))
}

/// POST /rounds/:id/bets
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    caller: Option<Extension<Caller>>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(req): Json<PlaceBetRequest>,
) -> Result<(StatusCode, Json<PlaceBetResponse>), ApiError> {
    let round_id = parse_id(&request_id, &raw_id, "round")?;
    let player = require_caller(&request_id, caller)?;
    let engine = Arc::clone(&state.engine);
    let bet_id = run_blocking(&request_id, move || {
        engine.place_bet(&player, round_id, req.amount, req.client_seed)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(PlaceBetResponse { bet_id, round_id })))
}

/// GET /bets/:id
pub async fn bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Bet>, ApiError> {
    let bet_id = parse_id(&request_id, &raw_id, "bet")?;
    let engine = Arc::clone(&state.engine);
    run_blocking(&request_id, move || engine.get_bet(bet_id))
        .await
        .map(Json)
}

/// POST /bets/:id/cash-out
pub async fn cash_out_handler(
    Extension(request_id): Extension<RequestId>,
    caller: Option<Extension<Caller>>,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Json(req): Json<CashOutRequest>,
) -> Result<Json<CashOutResponse>, ApiError> {
    let bet_id = parse_id(&request_id, &raw_id, "bet")?;
    let player = require_caller(&request_id, caller)?;
    let engine = Arc::clone(&state.engine);
    let multiplier = req.current_multiplier;
    let payout = run_blocking(&request_id, move || {
        engine.cash_out(&player, bet_id, req.current_multiplier)
    })
    .await?;
    Ok(Json(CashOutResponse::new(bet_id, payout, multiplier)))
}

/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    if !state.metrics_enabled {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let text = state.engine.metrics().encode().map_err(|e| {
        ApiError::internal_error(request_id.0.clone(), format!("Failed to encode metrics: {}", e))
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}
