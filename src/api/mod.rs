//! API layer
//!
//! HTTP handlers for:
//! - Landing page and dashboard
//! - Current user (JSON)
//! - Admin portal
//! - Metrics (Prometheus)

mod account;
mod admin;
pub mod metrics;
mod pages;

pub use account::account_router;
pub use admin::admin_router;
pub use metrics::metrics_router;
pub use pages::pages_router;
