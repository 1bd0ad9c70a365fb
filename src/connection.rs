//! Connection establishment with a fixed retry budget.
//!
//! Connecting is idempotent: an already-connected transport is left alone.
//! Otherwise every failure is retried immediately, with no distinction
//! between transient and permanent errors, until the budget runs out.

use crate::constants::MAX_CONNECTION_RETRIES;
use crate::error::ConnectionFailed;
use crate::transport::Transport;

/// Owns the retry policy for establishing the transport connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionManager {
    max_attempts: u32,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            max_attempts: MAX_CONNECTION_RETRIES,
        }
    }
}

impl ConnectionManager {
    /// Manager with a custom attempt budget (at least one attempt is made).
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ensure `transport` is connected.
    pub async fn connect<T: Transport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<(), ConnectionFailed> {
        if transport.is_connected() {
            return Ok(());
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match transport.connect().await {
                Ok(()) => {
                    log::info!("[Connection] Connected to APNs");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "[Connection] Failed connecting to APNs (attempt {} of {}): {:#}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    last_error = format!("{e:#}");
                }
            }
        }

        log::error!(
            "[Connection] Giving up after {} attempts: {}",
            self.max_attempts,
            last_error
        );
        Err(ConnectionFailed {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
