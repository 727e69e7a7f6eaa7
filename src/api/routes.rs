//! Route Definitions

use super::{handlers::*, middleware::request_id_middleware, security::auth_middleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin", get(admin_handler))
        .route("/pool", get(pool_handler))
        // Rounds
        .route("/rounds", post(create_round_handler))
        .route("/rounds/:id", get(round_handler))
        .route(
            "/rounds/:id/bets",
            get(round_bets_handler).post(place_bet_handler),
        )
        .route("/rounds/:id/audit", get(round_audit_handler))
        .route("/rounds/:id/start", post(start_round_handler))
        .route("/rounds/:id/finalize", post(finalize_round_handler))
        // Bets
        .route("/bets/:id", get(bet_handler))
        .route("/bets/:id/cash-out", post(cash_out_handler))
        .route("/metrics", get(metrics_handler))
        // request ids are assigned before authentication so refusals carry one
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
