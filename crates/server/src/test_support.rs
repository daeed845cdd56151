//! Fixtures shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;

use choreboard_core::{
    Chore, ChoreStatus, Household, HouseholdId, Member, MemberId, MemberRole, NewChore, QrToken,
};

use crate::config::{ScheduleConfig, ServerConfig};
use crate::db::MemoryStore;
use crate::identity::{Credential, CredentialClaims, IdentityError, IdentityExchange, JwtIdentity};
use crate::notify::RecordingTransport;
use crate::state::AppState;

pub const SIGNING_SECRET: &str = "k8Jq2xV7pLm4Nw9Rt3Ys6Zb1Hc5Gd0Fa";

pub fn config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/choreboard_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3002,
        signing_secret: SecretString::from(SIGNING_SECRET),
        credential_ttl: Duration::from_secs(3600),
        schedule: ScheduleConfig::default(),
        dev_endpoints: true,
        push: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

pub fn identity() -> JwtIdentity {
    JwtIdentity::new(SecretString::from(SIGNING_SECRET), Duration::from_secs(3600))
}

/// State over a fresh in-memory store and a recording transport.
pub fn state() -> (AppState, Arc<MemoryStore>, Arc<RecordingTransport>) {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::new());
    let state = AppState::with_parts(
        config(),
        store.clone(),
        Arc::new(identity()),
        transport.clone(),
    );
    (state, store, transport)
}

pub fn hid(s: &str) -> HouseholdId {
    HouseholdId::parse(s).unwrap()
}

pub fn mid(s: &str) -> MemberId {
    MemberId::parse(s).unwrap()
}

pub fn household(id: &str) -> Household {
    Household::with_defaults(hid(id), Utc::now())
}

pub fn member(household_id: &str, id: &str, qr: &str) -> Member {
    Member::new(
        hid(household_id),
        mid(id),
        id,
        MemberRole::Child,
        QrToken::parse(qr).unwrap(),
        Utc::now(),
    )
}

pub fn open_chore(assignees: &[&str], points: u32) -> Chore {
    let mut chore = Chore::from_new(
        NewChore {
            title: "Dishes".to_owned(),
            points: Some(points),
            ..NewChore::default()
        },
        mid("creator"),
        Utc::now(),
    );
    chore.assignees = assignees.iter().map(|a| mid(a)).collect();
    chore
}

pub fn done(chore: &Chore) -> Chore {
    let mut done = chore.clone();
    done.status = ChoreStatus::Done;
    done.completed_at = Some(Utc::now());
    done
}

/// Identity service that is always down.
pub struct FailingIdentity;

#[async_trait]
impl IdentityExchange for FailingIdentity {
    async fn mint(
        &self,
        _subject: &MemberId,
        _household_id: &HouseholdId,
    ) -> Result<Credential, IdentityError> {
        Err(IdentityError::Mint("identity service unavailable".to_owned()))
    }

    fn verify(&self, _token: &str) -> Result<CredentialClaims, IdentityError> {
        Err(IdentityError::Malformed)
    }
}
