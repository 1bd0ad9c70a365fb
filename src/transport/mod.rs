//! Transport abstraction for the multiplexed gateway connection.
//!
//! The dispatch loop only needs four things from the connection: establish
//! it, issue a request on a new stream, read that stream's response, and
//! report the peer's concurrency ceiling. [`Transport`] captures exactly
//! that so the loop can be driven by the production HTTP/2 client or by a
//! scripted transport in tests.
//!
//! # Stream handles
//!
//! [`Transport::request`] hands back an owned [`Transport::Stream`] and
//! [`Transport::get_response`] consumes it, so a handle is released on
//! every exit path once its response has been read (or abandoned).

// Rust guideline compliant 2026-02

pub mod http2;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};

pub use self::http2::H2Transport;

/// Status line and body of a gateway response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body (JSON on failure, empty on success).
    pub body: Bytes,
}

/// A multiplexed connection to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Handle for one in-flight request.
    type Stream: Send + 'static;

    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Make one attempt at establishing the connection.
    ///
    /// Retrying is the caller's concern (see [`crate::connection`]).
    async fn connect(&self) -> Result<()>;

    /// Issue a request on a new stream.
    ///
    /// Returns once the request has been written; never waits for the
    /// response.
    async fn request(
        &self,
        method: &Method,
        path: &str,
        body: &Bytes,
        headers: &HeaderMap,
    ) -> Result<Self::Stream>;

    /// Wait for the response on `stream`.
    async fn get_response(&self, stream: Self::Stream) -> Result<RawResponse>;

    /// The peer's currently advertised `MAX_CONCURRENT_STREAMS`.
    ///
    /// Implementations read this under whatever lock guards the connection's
    /// negotiated settings, held only for the read.
    fn remote_max_concurrent_streams(&self) -> usize;
}
