//! Application state shared across handlers and scheduled jobs.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::DocumentStore;
use crate::identity::{IdentityExchange, JwtIdentity};
use crate::notify::{HttpPushTransport, LogTransport, NotificationTransport};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It is built once at start-up
/// and handed to every request handler and scheduled job.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityExchange>,
    transport: Arc<dyn NotificationTransport>,
}

impl AppState {
    /// Create application state with the production identity issuer and
    /// the transport selected by configuration.
    ///
    /// # Panics
    ///
    /// Panics if the push gateway's HTTP client cannot be created.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        let identity = Arc::new(JwtIdentity::new(
            config.signing_secret.clone(),
            config.credential_ttl,
        ));
        let transport: Arc<dyn NotificationTransport> = match config.push() {
            Some(push) => Arc::new(HttpPushTransport::new(
                push.endpoint.clone(),
                push.api_key.clone(),
            )),
            None => {
                tracing::warn!("PUSH_ENDPOINT not set, due-soon notifications will be dropped");
                Arc::new(LogTransport)
            }
        };
        Self::with_parts(config, store, identity, transport)
    }

    /// Create application state from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityExchange>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                identity,
                transport,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the credential issuer.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityExchange {
        self.inner.identity.as_ref()
    }

    /// Get a reference to the push transport.
    #[must_use]
    pub fn transport(&self) -> &dyn NotificationTransport {
        self.inner.transport.as_ref()
    }
}
