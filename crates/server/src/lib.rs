//! Choreboard server library.
//!
//! The HTTP surface, completion reactor and scheduled jobs, exposed as a
//! library so the CLI and integration tests drive the same code as the
//! binary.
//!
//! # Modules
//!
//! - [`db`] - `DocumentStore` seam with `PostgreSQL` and in-memory stores
//! - [`identity`] - Signed member credentials
//! - [`notify`] - Push notification transports
//! - [`services`] - QR exchange, completion reactor, chores, provisioning
//! - [`jobs`] - QR rotation, due-soon reminders and the in-process scheduler
//! - [`routes`] - Axum handlers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::{Router, routing::get};

use state::AppState;

/// Build the application router over `state`.
///
/// Request tracing and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let dev_endpoints = state.config().dev_endpoints;
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::readiness))
        .merge(routes::routes(dev_endpoints))
        .with_state(state)
}
