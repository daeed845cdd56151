//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Liveness
//! GET  /health/ready                            - Store reachable
//!
//! # Auth
//! POST /v1/auth/qr-exchange                     - Trade a QR token for a credential
//!
//! # Chores (bearer credential for {h})
//! GET  /v1/households/{h}/chores                - List by due time
//! POST /v1/households/{h}/chores                - Create
//! POST /v1/households/{h}/chores/{c}/toggle     - Open <-> done
//!
//! # Triggers
//! POST /v1/triggers/chore-written               - Deliver a chore write event
//!
//! # Dev (CHOREBOARD_DEV_ENDPOINTS=true only)
//! POST /v1/dev/households                       - Provision a household
//! POST /v1/dev/seed                             - Seed a member with a known QR token
//! ```

pub mod auth;
pub mod chores;
pub mod dev;
pub mod health;
pub mod triggers;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/qr-exchange", post(auth::qr_exchange))
}

/// Create the chore routes router, nested under a household.
pub fn chore_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(chores::index).post(chores::create))
        .route("/{chore_id}/toggle", post(chores::toggle))
}

/// Create the trigger routes router.
pub fn trigger_routes() -> Router<AppState> {
    Router::new().route("/chore-written", post(triggers::chore_written))
}

/// Create the dev routes router.
pub fn dev_routes() -> Router<AppState> {
    Router::new()
        .route("/households", post(dev::provision))
        .route("/seed", post(dev::seed))
}

/// Create all `/v1` routes. Dev routes are mounted only when enabled.
pub fn routes(dev_endpoints: bool) -> Router<AppState> {
    let router = Router::new()
        .nest("/v1/auth", auth_routes())
        .nest("/v1/households/{household_id}/chores", chore_routes())
        .nest("/v1/triggers", trigger_routes());

    if dev_endpoints {
        router.nest("/v1/dev", dev_routes())
    } else {
        router
    }
}
