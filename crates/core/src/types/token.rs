//! QR sign-in token.
//!
//! A `QrToken` is the single-use secret printed in a member's QR code. It is
//! compared against the stored value on exchange and replaced immediately
//! afterwards, so a captured code stops working the moment it is used.

use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`QrToken`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The input string is empty.
    #[error("qr token cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("qr token must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A member's current QR sign-in token.
///
/// `Debug` is redacted; use [`QrToken::expose`] where the raw value is needed
/// (persisting it, rendering a QR code, comparing it).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QrToken(String);

impl QrToken {
    /// Length of freshly generated tokens.
    pub const GENERATED_LENGTH: usize = 16;

    /// Maximum accepted token length.
    pub const MAX_LENGTH: usize = 256;

    const CHARSET: &'static [u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    /// Generate a new token from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let token = (0..Self::GENERATED_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..Self::CHARSET.len());
                Self::CHARSET.get(idx).map_or('0', |b| char::from(*b))
            })
            .collect();
        Self(token)
    }

    /// Parse a token presented by a caller or read from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or longer than [`Self::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        if s.is_empty() {
            return Err(TokenError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(TokenError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compare against a presented token without short-circuiting on the
    /// first differing byte.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let a = self.0.as_bytes();
        let b = presented.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Debug for QrToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QrToken([REDACTED])")
    }
}

impl TryFrom<String> for QrToken {
    type Error = TokenError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<QrToken> for String {
    fn from(token: QrToken) -> Self {
        token.0
    }
}
