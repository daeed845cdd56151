//! Credential issuance for signed-in members.
//!
//! A successful QR exchange mints a bearer credential bound to the member's
//! identity subject, with the household id carried as a claim. The chore
//! surface verifies the same credential on every request.
//!
//! [`JwtIdentity`] issues HS256 JSON Web Tokens with `sub`, `householdId`,
//! `iat` and `exp` claims.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use choreboard_core::{HouseholdId, MemberId};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Errors from minting or verifying credentials.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential could not be produced.
    #[error("failed to mint credential: {0}")]
    Mint(String),

    /// The presented credential is not well-formed.
    #[error("malformed credential")]
    Malformed,

    /// The signature does not match.
    #[error("credential signature mismatch")]
    BadSignature,

    /// The credential is past its expiry.
    #[error("credential expired")]
    Expired,
}

/// Claims carried by a minted credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    /// Identity subject (the member id).
    pub sub: MemberId,
    pub household_id: HouseholdId,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// A minted bearer credential.
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The identity service contract.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    /// Mint a credential for `subject`, embedding `household_id` as a claim.
    async fn mint(
        &self,
        subject: &MemberId,
        household_id: &HouseholdId,
    ) -> Result<Credential, IdentityError>;

    /// Check a presented credential and return its claims.
    fn verify(&self, token: &str) -> Result<CredentialClaims, IdentityError>;
}

/// HS256 JWT credential issuer.
#[derive(Clone)]
pub struct JwtIdentity {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for JwtIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentity")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwtIdentity {
    /// Create an issuer signing with `secret`; credentials live for `ttl`.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Mint a credential as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Mint` if the claims cannot be signed.
    pub fn mint_at(
        &self,
        subject: &MemberId,
        household_id: &HouseholdId,
        now: DateTime<Utc>,
    ) -> Result<Credential, IdentityError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| IdentityError::Mint(e.to_string()))?;
        let expires_at = now + ttl;
        let claims = CredentialClaims {
            sub: subject.clone(),
            household_id: household_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &key)
            .map_err(|e| IdentityError::Mint(e.to_string()))?;

        Ok(Credential { token, expires_at })
    }

    /// Verify a credential as of `now`.
    ///
    /// Only HS256 is accepted. Expiry is checked against `now` with no leeway.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, its signature or
    /// algorithm does not match, or it has expired.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialClaims, IdentityError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let claims = jsonwebtoken::decode::<CredentialClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    IdentityError::BadSignature
                }
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                _ => IdentityError::Malformed,
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(IdentityError::Expired);
        }
        Ok(claims)
    }
}

#[async_trait]
impl IdentityExchange for JwtIdentity {
    #[instrument(skip(self), fields(subject = %subject, household_id = %household_id))]
    async fn mint(
        &self,
        subject: &MemberId,
        household_id: &HouseholdId,
    ) -> Result<Credential, IdentityError> {
        let credential = self.mint_at(subject, household_id, Utc::now())?;
        debug!(expires_at = %credential.expires_at, "Credential minted");
        Ok(credential)
    }

    fn verify(&self, token: &str) -> Result<CredentialClaims, IdentityError> {
        self.verify_at(token, Utc::now())
    }
}
