//! Admin portal endpoints
//!
//! Volunteer management, role grants and calendar provisioning.
//! Every route requires an `Admin` user.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::{CurrentUser, Gate, require_gate, require_login};
use crate::calendar::{AclRole, Calendar};
use crate::data::{User, UserType};
use crate::error::AppError;

/// Create admin router
///
/// Routes:
/// - GET /admin/volunteers - List volunteers
/// - POST /admin/volunteers - Invite a volunteer
/// - GET /admin/users - List all users
/// - POST /admin/users/:remote_id/roles - Grant a role
/// - POST /admin/calendars - Create and share a calendar
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/volunteers", get(list_volunteers).post(invite_volunteer))
        .route("/users", get(list_users))
        .route("/users/:remote_id/roles", post(grant_role))
        .route("/calendars", post(create_calendar))
        .route_layer(middleware::from_fn_with_state(
            Gate::Type(UserType::Admin),
            require_gate,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_login))
}

// =============================================================================
// Volunteers
// =============================================================================

/// GET /admin/volunteers
async fn list_volunteers(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let volunteers = state.directory.list_by_type(UserType::Volunteer).await?;
    Ok(Json(volunteers))
}

#[derive(Debug, Deserialize)]
struct InviteRequest {
    #[serde(default)]
    name: String,
    email: String,
}

/// POST /admin/volunteers
///
/// Registers the volunteer with the identity provider and emails them
/// an invitation.
async fn invite_volunteer(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    tracing::info!(
        admin = %admin.remote_id,
        email = %req.email,
        "Inviting volunteer"
    );
    let user = state
        .invitations
        .invite(&req.name, &req.email)
        .await
        .map_err(|e| e.context("failed to invite volunteer"))?;
    Ok((StatusCode::CREATED, Json(user)))
}

// =============================================================================
// Users and roles
// =============================================================================

/// GET /admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.directory.list().await?))
}

#[derive(Debug, Deserialize)]
struct GrantRoleRequest {
    role: UserType,
}

#[derive(Debug, Serialize)]
struct RolesResponse {
    remote_id: String,
    roles: Vec<UserType>,
}

/// POST /admin/users/:remote_id/roles
async fn grant_role(
    State(state): State<AppState>,
    Path(remote_id): Path<String>,
    Json(req): Json<GrantRoleRequest>,
) -> Result<Json<RolesResponse>, AppError> {
    if state.directory.find_by_remote_id(&remote_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    state.sessions.grant_role(&remote_id, req.role).await?;
    let roles = state.sessions.roles(&remote_id).await?;

    tracing::info!(remote_id = %remote_id, role = %req.role, "Role granted");
    Ok(Json(RolesResponse { remote_id, roles }))
}

// =============================================================================
// Calendars
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateCalendarRequest {
    title: String,
    #[serde(default)]
    share_with: Vec<String>,
    #[serde(default)]
    role: AclRole,
}

#[derive(Debug, Serialize)]
struct CalendarResponse {
    #[serde(flatten)]
    calendar: Calendar,
    shared_with: Vec<String>,
}

/// POST /admin/calendars
///
/// Creates a calendar and grants each listed email access to it. Sharing
/// stops at the first failure; the calendar is kept.
async fn create_calendar(
    State(state): State<AppState>,
    Json(req): Json<CreateCalendarRequest>,
) -> Result<(StatusCode, Json<CalendarResponse>), AppError> {
    let calendar_provider = state
        .calendar
        .as_ref()
        .ok_or_else(|| AppError::Config("calendar provider is not configured".to_string()))?;

    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("calendar title is required".to_string()));
    }

    let calendar = calendar_provider
        .create_calendar(title)
        .await
        .map_err(|e| e.context("failed to create calendar"))?;

    let mut shared_with = Vec::with_capacity(req.share_with.len());
    for email in req.share_with {
        calendar_provider
            .share_calendar(&calendar.id, &email, req.role)
            .await
            .map_err(|e| e.context(&format!("failed to share calendar with {email}")))?;
        shared_with.push(email);
    }

    tracing::info!(
        calendar_id = %calendar.id,
        shared = shared_with.len(),
        "Calendar provisioned"
    );
    Ok((
        StatusCode::CREATED,
        Json(CalendarResponse {
            calendar,
            shared_with,
        }),
    ))
}
