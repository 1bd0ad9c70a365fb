//! Error taxonomy for push delivery.
//!
//! Plumbing inside the crate uses `anyhow`; the types here are the ones
//! callers need to branch on. Per-token rejections from the gateway are not
//! errors at this level: they travel as [`crate::Outcome::Failure`] and the
//! batch keeps going.

// Rust guideline compliant 2026-02

use crate::reason::Reason;

/// Connection establishment exhausted its retry budget.
#[derive(Debug)]
pub struct ConnectionFailed {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error reported by the final attempt.
    pub last_error: String,
}

impl std::fmt::Display for ConnectionFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to connect to APNs after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for ConnectionFailed {}

/// Provider token could not be produced.
///
/// A bad key cannot be repaired at runtime, so these are never retried.
#[derive(Debug)]
pub enum CredentialError {
    /// The signing key could not be parsed.
    InvalidKey(String),
    /// Signing the claims failed.
    Signing(String),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(msg) => write!(f, "Invalid signing key: {msg}"),
            Self::Signing(msg) => write!(f, "Signing failed: {msg}"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Fatal failure of a batch dispatch.
#[derive(Debug)]
pub enum DispatchError {
    /// The connection could not be established.
    Connection(ConnectionFailed),
    /// The authorization header could not be built.
    Credential(CredentialError),
    /// Payload or header values could not be encoded.
    Serialization(String),
    /// Issuing a request failed on a live connection.
    Request {
        /// Token whose request could not be issued.
        token: String,
        /// Transport error description.
        message: String,
    },
    /// The connection dropped mid-batch.
    ///
    /// Outcomes for every request still in the open-stream queue are lost.
    ConnectionLost {
        /// Token being sent or drained when the loss was noticed.
        token: String,
        /// Transport error description.
        message: String,
    },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(err) => write!(f, "{err}"),
            Self::Credential(err) => write!(f, "Credential error: {err}"),
            Self::Serialization(msg) => write!(f, "Serialization failed: {msg}"),
            Self::Request { token, message } => {
                write!(f, "Failed to issue request for {token}: {message}")
            }
            Self::ConnectionLost { token, message } => {
                write!(f, "Connection lost at {token}: {message}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(err) => Some(err),
            Self::Credential(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConnectionFailed> for DispatchError {
    fn from(err: ConnectionFailed) -> Self {
        Self::Connection(err)
    }
}

impl From<CredentialError> for DispatchError {
    fn from(err: CredentialError) -> Self {
        Self::Credential(err)
    }
}

/// Failure of a single-token send.
#[derive(Debug)]
pub enum NotificationError {
    /// The send could not be carried out.
    Dispatch(DispatchError),
    /// The gateway rejected the notification.
    Rejected(Reason),
}

impl std::fmt::Display for NotificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch(err) => write!(f, "{err}"),
            Self::Rejected(reason) => write!(f, "Notification rejected: {reason}"),
        }
    }
}

impl std::error::Error for NotificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dispatch(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl From<DispatchError> for NotificationError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}
