//! Authentication middleware
//!
//! Protects routes that require a signed-in user.

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::pipeline::{Authenticator, Principal};
use crate::AppState;
use crate::error::AppError;
use crate::session::{AUTH_ERROR_KEY, AUTH_REDIRECT_KEY};

/// Middleware for API routes: authentication failures return 401
///
/// Adds the [`Principal`] to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/api/...", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    OriginalUri(uri): OriginalUri,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_request(state, jar, request_path(&uri), request, next, false).await
}

/// Middleware for interactive routes: authentication failures redirect to
/// `/login`, remembering where the user was going
pub async fn require_login(
    State(state): State<AppState>,
    jar: CookieJar,
    OriginalUri(uri): OriginalUri,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate_request(state, jar, request_path(&uri), request, next, true).await
}

fn request_path(uri: &axum::http::Uri) -> String {
    uri.path_and_query()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

async fn authenticate_request(
    state: AppState,
    jar: CookieJar,
    path: String,
    mut request: Request<axum::body::Body>,
    next: Next,
    redirect_on_error: bool,
) -> Result<Response, AppError> {
    // Store failures are never turned into a login redirect
    let mut session = state.sessions.load(&jar).await?;

    let authenticator = Authenticator {
        identity: state.identity.as_ref(),
        directory: &state.directory,
        sessions: &state.sessions,
    };

    match authenticator.authenticate(&session).await {
        Ok(principal) => {
            tracing::debug!(remote_id = %principal.remote_id, "Request authenticated");
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(error) if redirect_on_error && error.is_unauthorized() => {
            session.set(AUTH_REDIRECT_KEY, path);
            session.set(AUTH_ERROR_KEY, error.to_string());
            let jar = match state.sessions.save(jar.clone(), &session).await {
                Ok(jar) => jar,
                Err(save_error) => {
                    tracing::warn!(error = %save_error, "Failed to remember login redirect");
                    jar
                }
            };
            Ok((jar, Redirect::to("/login")).into_response())
        }
        Err(error) => Err(error),
    }
}

/// Extractor for the authenticated principal
///
/// Only valid behind [`require_auth`] or [`require_login`].
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(principal): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", principal.user.display_name())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from(&parts.extensions).map(CurrentUser)
    }
}

/// Principal stored by the auth middleware
///
/// # Errors
/// Returns `AppError::Internal` when no auth middleware ran for this route
pub(crate) fn principal_from(
    extensions: &axum::http::Extensions,
) -> Result<Principal, AppError> {
    extensions.get::<Principal>().cloned().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "no authenticated user on request; is the auth middleware installed?"
        ))
    })
}
