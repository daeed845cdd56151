//! Push notification delivery.
//!
//! This module provides:
//! - [`NotificationTransport`], the seam every sender goes through
//! - [`HttpPushTransport`] for a configured push gateway
//! - [`LogTransport`] when no gateway is configured
//! - [`RecordingTransport`], which keeps every message in memory
//!
//! Delivery is best-effort: a call hands one message and a set of device
//! tokens to the transport and does not track per-token outcomes.

mod client;
mod error;

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use client::{DEFAULT_TIMEOUT, HttpPushTransport};
pub use error::TransportError;

/// Title and body shown on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// One message addressed to many devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub notification: Notification,
}

/// The push transport contract.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Hand `message` to the transport for delivery.
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<(), TransportError>;
}

/// Transport that logs messages and drops them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<(), TransportError> {
        info!(
            tokens = message.tokens.len(),
            title = %message.notification.title,
            "Push gateway not configured, dropping notification"
        );
        Ok(())
    }
}

/// Transport that keeps every message it is handed.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<MulticastMessage>>,
    reject: bool,
}

impl RecordingTransport {
    /// A transport that accepts and records every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that records every message and then fails the call.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            sent: Mutex::default(),
            reject: true,
        }
    }

    /// Messages received so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<MulticastMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        if self.reject {
            return Err(TransportError::Api {
                status: 503,
                body: "rejected".to_owned(),
            });
        }
        Ok(())
    }
}
