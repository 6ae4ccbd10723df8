//! Authentication and authorization
//!
//! Handles:
//! - Sign-in through the identity provider (login, OAuth callback, logout)
//! - Session → principal resolution and status promotion
//! - Type and role gates

mod gate;
mod middleware;
mod pipeline;
mod routes;

pub use gate::{Gate, require_gate};
pub use middleware::{CurrentUser, require_auth, require_login};
pub use pipeline::{Authenticator, Principal};
pub use routes::{DEFAULT_LANDING, auth_router};
