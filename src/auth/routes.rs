//! Sign-in flow
//!
//! The identity provider hosts the Google OAuth dance. We only render the
//! link to it and exchange the token it sends back.

use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::CookieJar;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::session::{AUTH_ERROR_KEY, AUTH_REDIRECT_KEY, SESSION_TOKEN_KEY};

/// Where to go after signing in when no redirect was remembered
pub const DEFAULT_LANDING: &str = "/dash";

/// Create authentication router
///
/// Routes:
/// - GET /login - Login page
/// - GET /oauth - Identity provider callback
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/oauth", get(oauth_callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Login Page
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginQuery {
    redirect: Option<String>,
}

/// GET /login
///
/// Renders the login page. A local `redirect` is remembered for after
/// the OAuth callback; the last authentication error is shown once.
async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let mut changed = false;

    if let Some(redirect) = query.redirect.filter(|path| is_local_path(path)) {
        session.set(AUTH_REDIRECT_KEY, redirect);
        changed = true;
    }
    let auth_error = session.take(AUTH_ERROR_KEY);
    changed |= auth_error.is_some();

    let jar = if changed {
        state.sessions.save(jar, &session).await?
    } else {
        jar
    };

    let notice = auth_error
        .map(|error| format!(r#"<p class="error">{}</p>"#, encode_text(&error)))
        .unwrap_or_default();
    let login_url = state.config.identity.login_url();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login - Scheduler</title></head>
<body>
    <h1>Scheduler</h1>
    {notice}
    <p>Please sign in with Google</p>
    <a href="{href}">Sign in with Google</a>
</body>
</html>
"#,
        href = encode_double_quoted_attribute(&login_url),
    );

    Ok((jar, Html(html)))
}

// =============================================================================
// OAuth callback
// =============================================================================

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    #[serde(default)]
    token: String,
}

/// GET /oauth?token=...
///
/// # Steps
/// 1. Exchange the OAuth token, extending any existing provider session
/// 2. Store the session token
/// 3. Move the session to a fresh id
/// 4. Redirect to the remembered path or the dashboard
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if query.token.trim().is_empty() {
        return Err(AppError::Unauthorized("oauth token not found".to_string()));
    }

    let mut session = state.sessions.load(&jar).await?;
    let current_token = session.get(SESSION_TOKEN_KEY).map(ToOwned::to_owned);

    let session_token = state
        .identity
        .authenticate_oauth(&query.token, current_token.as_deref())
        .await
        .map_err(|e| e.context("failed to authenticate oauth token"))?;
    session.set(SESSION_TOKEN_KEY, session_token);

    let redirect = session
        .take(AUTH_REDIRECT_KEY)
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| DEFAULT_LANDING.to_string());
    session.take(AUTH_ERROR_KEY);

    state.sessions.rotate(&mut session).await?;
    let jar = state.sessions.save(jar, &session).await?;

    tracing::info!(redirect = %redirect, "Signed in");
    Ok((jar, Redirect::to(&redirect)))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Revokes the provider session, drops the server-side session and
/// expires the cookie.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.load(&jar).await?;

    if let Some(token) = session.get(SESSION_TOKEN_KEY) {
        state
            .identity
            .revoke_session(token)
            .await
            .map_err(|e| e.context("failed to revoke identity session"))?;
    }

    let jar = state.sessions.destroy(jar, session).await?;
    Ok((jar, Redirect::to("/")))
}

// =============================================================================
// Helpers
// =============================================================================

/// Same-origin absolute path, not `//host` or `/\host`
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_followed() {
        assert!(is_local_path("/admin/volunteers"));
        assert!(is_local_path("/dash?tab=calendar"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("/\\evil.example"));
        assert!(!is_local_path(""));
    }
}
