//! Integration tests for Choreboard.
//!
//! Tests drive the full router with `tower::ServiceExt::oneshot` over the
//! in-memory store, so no database or push gateway is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p choreboard-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `qr_exchange` - QR sign-in and single-use tokens
//! - `chores` - Chore listing, creation, toggling and household scoping
//! - `triggers` - Externally delivered chore write events
//! - `jobs` - Scheduled jobs against state shared with the router
//! - `surface` - Dev endpoints and health checks

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use choreboard_core::{Household, HouseholdId, Member, MemberId, MemberRole, QrToken};
use choreboard_server::config::{ScheduleConfig, ServerConfig};
use choreboard_server::db::{DocumentStore, MemoryStore};
use choreboard_server::identity::JwtIdentity;
use choreboard_server::notify::RecordingTransport;
use choreboard_server::state::AppState;

/// Signing secret used by every test context.
pub const SIGNING_SECRET: &str = "Zr4Wq9Lx2Tn7Pb5Kc8Vm3Hs6Jd1Gf0Ya";

/// Router plus handles on the collaborators behind it.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<RecordingTransport>,
}

impl TestContext {
    /// Context with dev endpoints enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dev_endpoints(true)
    }

    /// Context with dev endpoints switched on or off.
    #[must_use]
    pub fn with_dev_endpoints(dev_endpoints: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let identity = Arc::new(JwtIdentity::new(
            SecretString::from(SIGNING_SECRET),
            Duration::from_secs(3600),
        ));
        let state = AppState::with_parts(
            config(dev_endpoints),
            store.clone(),
            identity,
            transport.clone(),
        );
        Self {
            state,
            store,
            transport,
        }
    }

    /// A fresh router over this context's state.
    #[must_use]
    pub fn app(&self) -> Router {
        choreboard_server::app(self.state.clone())
    }

    /// Place a household and one member holding `qr`.
    pub fn seed(&self, household_id: &str, member_id: &str, qr: &str) {
        self.store.put_household(Household::with_defaults(
            HouseholdId::parse(household_id).unwrap(),
            Utc::now(),
        ));
        self.store.put_member(member(household_id, member_id, qr));
    }

    /// Send one request and decode the JSON response body (`Null` if empty
    /// or not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Exchange a QR token and return the credential.
    pub async fn sign_in(&self, household_id: &str, member_id: &str, qr: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/v1/auth/qr-exchange",
                None,
                Some(serde_json::json!({
                    "qrId": qr,
                    "householdId": household_id,
                    "memberId": member_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
        body["customToken"].as_str().unwrap().to_owned()
    }

    /// Stored member record.
    pub async fn member(&self, household_id: &str, member_id: &str) -> Member {
        self.state
            .store()
            .get_member(
                &HouseholdId::parse(household_id).unwrap(),
                &MemberId::parse(member_id).unwrap(),
            )
            .await
            .unwrap()
            .unwrap()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A child member with no devices and no points.
#[must_use]
pub fn member(household_id: &str, member_id: &str, qr: &str) -> Member {
    Member::new(
        HouseholdId::parse(household_id).unwrap(),
        MemberId::parse(member_id).unwrap(),
        member_id,
        MemberRole::Child,
        QrToken::parse(qr).unwrap(),
        Utc::now(),
    )
}

fn config(dev_endpoints: bool) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/choreboard_test"),
        host: [127, 0, 0, 1].into(),
        port: 3002,
        signing_secret: SecretString::from(SIGNING_SECRET),
        credential_ttl: Duration::from_secs(3600),
        schedule: ScheduleConfig::default(),
        dev_endpoints,
        push: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}
