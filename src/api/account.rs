//! Signed-in user endpoints for API clients
//!
//! Authentication failures answer 401 JSON instead of redirecting.

use axum::{Json, Router, middleware, routing::get};
use serde::Serialize;

use crate::AppState;
use crate::auth::{CurrentUser, Gate, require_auth, require_gate};
use crate::data::{User, UserType};

/// Create account router
///
/// Routes:
/// - GET /api/me - Current user and effective roles
pub fn account_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            Gate::Role(UserType::Recruit),
            require_gate,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Serialize)]
struct MeResponse {
    remote_id: String,
    user: User,
    roles: Vec<UserType>,
}

/// GET /api/me
async fn me(CurrentUser(principal): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        remote_id: principal.remote_id,
        user: principal.user,
        roles: principal.roles,
    })
}
