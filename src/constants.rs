//! Protocol constants for the APNs gateway.
//!
//! Centralizes the magic numbers the dispatch loop, connection manager and
//! credential cache rely on.
//!
//! # Categories
//!
//! - **Concurrency**: admission ceiling bounds
//! - **Connection**: endpoints, ports and retry budget
//! - **Timeouts**: request and connect deadlines
//! - **Credentials**: provider token lifetime

use std::time::Duration;

// ============================================================================
// Concurrency
// ============================================================================

/// Upper bound on the admission limit, whatever the gateway advertises.
///
/// APNs typically reports 500 or 1000. Anything above this is treated as a
/// misbehaving peer and clamped.
pub const CONCURRENT_STREAMS_SAFETY_MAXIMUM: usize = 1000;

/// Lower bound on the admission limit.
///
/// At least one request must be allowed in flight for the batch to make
/// progress.
pub const CONCURRENT_STREAMS_MINIMUM: usize = 1;

// ============================================================================
// Connection
// ============================================================================

/// Number of establishment attempts before giving up.
pub const MAX_CONNECTION_RETRIES: u32 = 3;

/// Production gateway host.
pub const PRODUCTION_HOST: &str = "api.push.apple.com";

/// Development (sandbox) gateway host.
pub const SANDBOX_HOST: &str = "api.development.push.apple.com";

/// Standard HTTPS port.
pub const DEFAULT_PORT: u16 = 443;

/// Alternative port for networks that block outbound 443.
pub const ALTERNATIVE_PORT: u16 = 2197;

/// Path prefix for per-device requests (`/3/device/{token}`).
pub const DEVICE_PATH_PREFIX: &str = "/3/device/";

/// Authorization header scheme for provider tokens.
pub const BEARER_PREFIX: &str = "bearer ";

// ============================================================================
// Timeouts
// ============================================================================

/// Deadline for a single response once its request has been issued.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Deadline for each TCP connect and TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest `connect` waits for the peer's first SETTINGS frame.
pub const INITIAL_SETTINGS_TIMEOUT: Duration = Duration::from_secs(2);

/// How often the stream limit is re-read while waiting for SETTINGS.
pub const SETTINGS_POLL_INTERVAL: Duration = Duration::from_millis(5);

// ============================================================================
// Credentials
// ============================================================================

/// Age after which a cached provider token is regenerated.
///
/// The gateway rejects tokens older than one hour and throttles refreshes
/// more frequent than every 20 minutes; 50 minutes sits inside both bounds.
pub const PROVIDER_TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 60);

/// Request path for a device token.
pub fn device_path(token: &str) -> String {
    format!("{DEVICE_PATH_PREFIX}{token}")
}
