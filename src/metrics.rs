//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth Metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_auth_attempts_total", "Total number of session authentications"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref STATUS_PROMOTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_status_promotions_total", "Users promoted to active on sign-in"),
        &["from"]
    ).expect("metric can be created");
    pub static ref AUTHZ_DENIED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_authz_denied_total", "Requests rejected by a type or role gate"),
        &["required"]
    ).expect("metric can be created");

    // Invitation / mail Metrics
    pub static ref INVITATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_invitations_total", "Total number of volunteer invitations"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref MAILS_SENT_TOTAL: IntCounter = IntCounter::new(
        "scheduler_mails_sent_total",
        "Total number of emails handed to the mail provider"
    ).expect("metric can be created");

    // Upstream Metrics
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "scheduler_upstream_request_duration_seconds",
            "Identity, mail and calendar provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["provider", "operation", "status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("scheduler_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))
            .expect("AUTH_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STATUS_PROMOTIONS_TOTAL.clone()))
            .expect("STATUS_PROMOTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTHZ_DENIED_TOTAL.clone()))
            .expect("AUTHZ_DENIED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(INVITATIONS_TOTAL.clone()))
            .expect("INVITATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MAILS_SENT_TOTAL.clone()))
            .expect("MAILS_SENT_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
            .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one call to an upstream provider
pub fn observe_upstream(provider: &str, operation: &str, status: &str, elapsed: Duration) {
    UPSTREAM_REQUEST_DURATION_SECONDS
        .with_label_values(&[provider, operation, status])
        .observe(elapsed.as_secs_f64());
}
