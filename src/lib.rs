//! APNs push delivery over a single multiplexed HTTP/2 connection.
//!
//! The crate sends one notification payload to many device tokens at once,
//! keeping as many requests in flight as the gateway's advertised
//! `MAX_CONCURRENT_STREAMS` setting allows, and re-reading that setting on
//! every iteration because the gateway may revise it mid-batch.
//!
//! # Architecture
//!
//! ```text
//! payload + options ──► request::prepare ──► PreparedRequest (built once)
//!                                                 │
//! tokens ──► BatchDispatch ── admit ──► Transport::request ──► stream handle
//!                 │  ▲                                              │
//!                 │  └── WindowTracker::refresh (every iteration)   │
//!                 └── drain oldest ◄── Transport::get_response ◄────┘
//!                          │
//!                          ▼
//!                   (token, Outcome)
//! ```
//!
//! # Modules
//!
//! - [`client`] - `ApnsClient` facade tying the pieces together
//! - [`dispatch`] - the bounded-concurrency batch loop
//! - [`window`] - concurrency ceiling tracking and clamping
//! - [`connection`] - connection establishment with a retry budget
//! - [`credential`] - ES256 provider token generation and caching
//! - [`request`] - request body and header construction
//! - [`transport`] - transport abstraction and the HTTP/2 implementation
//! - [`config`] - configuration loading

pub mod client;
pub mod config;
pub mod connection;
pub mod constants;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod reason;
pub mod request;
pub mod transport;
pub mod window;

// Re-export commonly used types
pub use client::{ApnsClient, Authentication};
pub use config::{AuthConfig, Config};
pub use credential::{Credential, CredentialProvider};
pub use dispatch::{BatchDispatch, DispatchResult, Outcome};
pub use error::{ConnectionFailed, CredentialError, DispatchError, NotificationError};
pub use payload::{Alert, Notification, Payload, RichAlert};
pub use reason::Reason;
pub use request::{DeliveryOptions, PreparedRequest, Priority};
pub use transport::{RawResponse, Transport};
