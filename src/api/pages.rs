//! HTML pages

use axum::{
    Router, middleware,
    response::{Html, IntoResponse},
    routing::get,
};
use html_escape::encode_text;

use crate::AppState;
use crate::auth::{CurrentUser, Gate, require_gate, require_login};
use crate::data::UserType;

/// Public and dashboard pages
///
/// Routes:
/// - GET / - Landing page
/// - GET /dash - Dashboard (any signed-in tier)
pub fn pages_router(state: AppState) -> Router<AppState> {
    let dashboard = Router::new()
        .route("/dash", get(dashboard))
        .route_layer(middleware::from_fn_with_state(
            Gate::Role(UserType::Recruit),
            require_gate,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_login));

    Router::new().route("/", get(index)).merge(dashboard)
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - Scheduler</title></head>
<body>
{body}
</body>
</html>
"#,
        title = encode_text(title),
    ))
}

/// GET /
async fn index() -> impl IntoResponse {
    page(
        "Welcome",
        r#"<h1>Scheduler</h1>
<p><a href="/login">Sign in</a></p>"#,
    )
}

/// GET /dash
async fn dashboard(CurrentUser(principal): CurrentUser) -> impl IntoResponse {
    let user = &principal.user;
    let admin_links = if user.user_type == UserType::Admin {
        r#"<p><a href="/admin/volunteers">Volunteers</a> | <a href="/admin/users">Users</a></p>"#
    } else {
        ""
    };

    let body = format!(
        r#"<h1>You made it! 🎉</h1>
<p>Signed in as {name} ({kind}, {status})</p>
{admin_links}
<p><a href="/logout">Sign out</a></p>"#,
        name = encode_text(user.display_name()),
        kind = user.user_type,
        status = user.status,
    );
    page("Dashboard", &body)
}
