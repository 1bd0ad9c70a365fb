//! Push client facade.
//!
//! [`ApnsClient`] owns the transport, the authorization method, the
//! connection retry policy and the concurrency window, and hands out
//! [`BatchDispatch`] sequences for batches of device tokens.
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(&Config::default_path()?)?;
//! let mut client = ApnsClient::from_config(&config)?;
//!
//! let payload = Payload::new().alert("Build finished").sound("default");
//! let options = DeliveryOptions::with_topic("com.example.app");
//!
//! let mut batch = client.send_notification_batch(tokens, &payload, &options).await?;
//! while let Some(item) = batch.next().await {
//!     let (token, outcome) = item?;
//!     println!("{token}: {outcome}");
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::{AuthConfig, Config};
use crate::connection::ConnectionManager;
use crate::credential::CredentialProvider;
use crate::dispatch::{BatchDispatch, Outcome};
use crate::error::{ConnectionFailed, DispatchError, NotificationError};
use crate::payload::{Notification, Payload};
use crate::reason::Reason;
use crate::request::{self, DeliveryOptions};
use crate::transport::http2::{tls_client_config, H2Transport};
use crate::transport::Transport;
use crate::window::WindowTracker;

/// How requests are authorized.
#[derive(Debug)]
pub enum Authentication {
    /// Provider token in the Authorization header.
    Token(CredentialProvider),
    /// TLS client certificate presented by the transport.
    Certificate(PathBuf),
    /// No authorization (the transport handles it, or tests).
    None,
}

/// Client for one gateway connection.
pub struct ApnsClient<T: Transport> {
    transport: T,
    auth: Authentication,
    connection: ConnectionManager,
    window: WindowTracker,
}

impl<T: Transport> std::fmt::Debug for ApnsClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.auth {
            Authentication::Token(provider) => write!(f, "ApnsClient: {}", provider.key_id()),
            Authentication::Certificate(path) => write!(f, "ApnsClient: {}", path.display()),
            Authentication::None => write!(f, "ApnsClient: unauthenticated"),
        }
    }
}

impl ApnsClient<H2Transport> {
    /// Build a client for the HTTP/2 gateway described by `config`.
    ///
    /// Reads the signing key or client certificate referenced by the config.
    /// Does not connect.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (tls, auth) = match &config.auth {
            Some(AuthConfig::Token {
                team_id,
                key_id,
                key_file,
            }) => {
                let pem = std::fs::read_to_string(key_file).with_context(|| {
                    format!("Failed to read signing key {}", key_file.display())
                })?;
                let provider =
                    CredentialProvider::from_pkcs8_pem(team_id.clone(), key_id.clone(), &pem)
                        .with_context(|| format!("Invalid signing key {}", key_file.display()))?;
                // Sign once up front so a bad key fails here rather than mid-batch.
                provider
                    .get_credential()
                    .context("Failed to sign provider token")?;
                (tls_client_config(None)?, Authentication::Token(provider))
            }
            Some(AuthConfig::Certificate {
                cert_file,
                key_file,
            }) => (
                tls_client_config(Some((cert_file.as_path(), key_file.as_path())))?,
                Authentication::Certificate(cert_file.clone()),
            ),
            None => (tls_client_config(None)?, Authentication::None),
        };

        let transport = H2Transport::new(config.host(), config.port(), tls)
            .with_timeouts(config.connect_timeout(), config.request_timeout());
        Ok(Self::new(transport, auth))
    }
}

impl<T: Transport> ApnsClient<T> {
    /// Create a client over an existing transport.
    pub fn new(transport: T, auth: Authentication) -> Self {
        Self {
            transport,
            auth,
            connection: ConnectionManager::default(),
            window: WindowTracker::new(),
        }
    }

    /// Replace the connection retry policy.
    pub fn with_connection_manager(mut self, connection: ConnectionManager) -> Self {
        self.connection = connection;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The provider token source, when using token authentication.
    pub fn credentials(&self) -> Option<&CredentialProvider> {
        match &self.auth {
            Authentication::Token(provider) => Some(provider),
            _ => None,
        }
    }

    /// The concurrency window as of the last refresh.
    pub fn window(&self) -> &WindowTracker {
        &self.window
    }

    /// Connect to the gateway (no-op when already connected).
    pub async fn connect(&self) -> Result<(), ConnectionFailed> {
        self.connection.connect(&self.transport).await
    }

    /// Send one payload to many tokens concurrently on the shared connection.
    ///
    /// The body and headers are built once for the whole batch, then the
    /// connection is established (skipped for an empty token list) so the
    /// gateway's initial ceiling is known before anything is sent. Outcomes
    /// are produced lazily by the returned sequence, in admission order.
    pub async fn send_notification_batch<I, S>(
        &mut self,
        tokens: I,
        payload: &Payload,
        options: &DeliveryOptions,
    ) -> Result<BatchDispatch<'_, T>, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = match &self.auth {
            Authentication::Token(provider) => Some(provider),
            _ => None,
        };
        let prepared = request::prepare(payload, options, credentials)?;

        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if !tokens.is_empty() {
            self.connection.connect(&self.transport).await?;
        }

        Ok(BatchDispatch::new(&self.transport, &mut self.window, prepared, tokens)
            .with_credentials(credentials))
    }

    /// Send a single notification and wait for its outcome.
    pub async fn send_notification(
        &mut self,
        notification: &Notification,
        options: &DeliveryOptions,
    ) -> Result<(), NotificationError> {
        let mut batch = self
            .send_notification_batch([notification.token.as_str()], &notification.payload, options)
            .await?;

        match batch.next().await {
            Some(Ok((_, Outcome::Success))) => Ok(()),
            Some(Ok((_, Outcome::Failure(reason)))) => {
                Err(NotificationError::Rejected(Reason::parse(&reason)))
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(NotificationError::Dispatch(DispatchError::ConnectionLost {
                token: notification.token.clone(),
                message: "no response".to_string(),
            })),
        }
    }
}
