//! Batch dispatch: bounded concurrency under a moving ceiling.
//!
//! A [`BatchDispatch`] turns a list of device tokens into a bounded set of
//! in-flight requests on one connection and yields one outcome per token.
//!
//! # Loop
//!
//! While tokens remain unsent or requests remain outstanding:
//!
//! 1. refresh the admission limit from the peer's advertised ceiling;
//! 2. if a token remains and the open-stream queue is shorter than the
//!    limit, issue its request and push it on the queue tail
//!    ([`try_admit`](BatchDispatch::try_admit), never waits for a response);
//! 3. otherwise pop the queue head and wait for its response
//!    ([`await_next_result`](BatchDispatch::await_next_result)).
//!
//! Outcomes come out in admission order. A response that arrives early is
//! buffered by the transport until its turn.
//!
//! # Failure
//!
//! Gateway rejections are per-token [`Outcome::Failure`]s and the batch
//! continues. A transport failure while issuing or draining ends the
//! sequence with a [`DispatchError`]; outcomes for everything still queued
//! are abandoned rather than reported.

use std::collections::{HashMap, VecDeque};
use std::iter::Peekable;

use futures_util::Stream;
use http::Method;
use serde::Deserialize;

use crate::constants::device_path;
use crate::credential::CredentialProvider;
use crate::error::DispatchError;
use crate::reason::Reason;
use crate::request::PreparedRequest;
use crate::transport::{RawResponse, Transport};
use crate::window::WindowTracker;

/// Outcome string for a delivered notification.
pub const SUCCESS: &str = "Success";

/// Per-token delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The gateway accepted the notification.
    Success,
    /// The gateway rejected it; the reason string is taken verbatim.
    Failure(String),
}

impl Outcome {
    /// Whether the notification was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Typed reason for a failure.
    pub fn reason(&self) -> Option<Reason> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(Reason::parse(reason)),
        }
    }

    /// Classify a gateway response.
    ///
    /// Status 200 is success; anything else takes the body's `reason` field,
    /// or `HTTP <status>` when the body has none.
    pub fn from_response(response: &RawResponse) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            reason: String,
        }

        if response.status == 200 {
            return Outcome::Success;
        }
        match serde_json::from_slice::<ErrorBody>(&response.body) {
            Ok(body) => Outcome::Failure(body.reason),
            Err(_) => Outcome::Failure(format!("HTTP {}", response.status)),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "{SUCCESS}"),
            Outcome::Failure(reason) => write!(f, "{reason}"),
        }
    }
}

/// Outcomes keyed by device token.
pub type DispatchResult = HashMap<String, Outcome>;

/// An admitted request awaiting its response.
struct PendingRequest<S> {
    stream: S,
    token: String,
}

/// One-shot dispatch of a prepared request to a list of tokens.
///
/// Consumed exactly once; after the last outcome or a fatal error every
/// further [`next`](Self::next) returns `None`.
pub struct BatchDispatch<'a, T: Transport> {
    transport: &'a T,
    window: &'a mut WindowTracker,
    request: PreparedRequest,
    tokens: Peekable<std::vec::IntoIter<String>>,
    open_streams: VecDeque<PendingRequest<T::Stream>>,
    credentials: Option<&'a CredentialProvider>,
    finished: bool,
}

impl<T: Transport> std::fmt::Debug for BatchDispatch<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatch")
            .field("limit", &self.window.current_limit())
            .field("unsent", &self.tokens.len())
            .field("open_streams", &self.open_streams.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Transport> BatchDispatch<'a, T> {
    /// Prepare a dispatch. Nothing is sent until [`next`](Self::next).
    ///
    /// The transport should already be connected so the initial ceiling is
    /// known before the first admission.
    pub fn new(
        transport: &'a T,
        window: &'a mut WindowTracker,
        request: PreparedRequest,
        tokens: Vec<String>,
    ) -> Self {
        Self {
            transport,
            window,
            request,
            tokens: tokens.into_iter().peekable(),
            open_streams: VecDeque::new(),
            credentials: None,
            finished: false,
        }
    }

    /// Mark `provider`'s token expired when the gateway reports
    /// `ExpiredProviderToken`.
    pub fn with_credentials(mut self, provider: Option<&'a CredentialProvider>) -> Self {
        self.credentials = provider;
        self
    }

    /// Number of admitted requests still awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.open_streams.len()
    }

    /// Admit the next token if the queue is below the current limit.
    ///
    /// Returns `Ok(false)` when nothing was admitted (no tokens left, or the
    /// queue is full).
    pub async fn try_admit(&mut self) -> Result<bool, DispatchError> {
        if self.open_streams.len() >= self.window.current_limit() {
            return Ok(false);
        }
        let Some(token) = self.tokens.next() else {
            return Ok(false);
        };

        log::debug!("[Dispatch] Sending to token {}", token);
        let stream = self
            .transport
            .request(
                &Method::POST,
                &device_path(&token),
                &self.request.body,
                &self.request.headers,
            )
            .await
            .map_err(|e| {
                let message = format!("{e:#}");
                if self.transport.is_connected() {
                    DispatchError::Request {
                        token: token.clone(),
                        message,
                    }
                } else {
                    log::error!(
                        "[Dispatch] Connection lost before sending {} ({} abandoned): {}",
                        token,
                        self.open_streams.len(),
                        message
                    );
                    DispatchError::ConnectionLost {
                        token: token.clone(),
                        message,
                    }
                }
            })?;
        self.open_streams.push_back(PendingRequest { stream, token });

        if self.tokens.peek().is_none() {
            log::info!("[Dispatch] Finished sending all tokens, waiting for pending requests");
        }
        Ok(true)
    }

    /// Wait for the oldest outstanding request's response.
    ///
    /// Returns `None` if nothing is outstanding.
    pub async fn await_next_result(
        &mut self,
    ) -> Option<Result<(String, Outcome), DispatchError>> {
        let PendingRequest { stream, token } = self.open_streams.pop_front()?;

        let response = match self.transport.get_response(stream).await {
            Ok(response) => response,
            Err(e) => {
                log::error!(
                    "[Dispatch] Connection lost waiting for {} ({} requests abandoned): {:#}",
                    token,
                    self.open_streams.len(),
                    e
                );
                return Some(Err(DispatchError::ConnectionLost {
                    token,
                    message: format!("{e:#}"),
                }));
            }
        };

        let outcome = Outcome::from_response(&response);
        log::debug!("[Dispatch] Got response for {}: {}", token, outcome);

        if outcome.reason() == Some(Reason::ExpiredProviderToken) {
            if let Some(provider) = self.credentials {
                provider.mark_expired();
            }
        }
        Some(Ok((token, outcome)))
    }

    /// Drive the loop until the next outcome is available.
    pub async fn next(&mut self) -> Option<Result<(String, Outcome), DispatchError>> {
        if self.finished {
            return None;
        }

        loop {
            if self.tokens.peek().is_none() && self.open_streams.is_empty() {
                self.finished = true;
                return None;
            }

            // The peer may send a new SETTINGS frame at any time.
            self.window.refresh(self.transport);

            match self.try_admit().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }

            let result = self.await_next_result().await;
            if !matches!(result, Some(Ok(_))) {
                self.finished = true;
            }
            return result;
        }
    }

    /// Drain every outcome into a map.
    pub async fn collect(mut self) -> Result<DispatchResult, DispatchError> {
        let mut results = DispatchResult::new();
        while let Some(item) = self.next().await {
            let (token, outcome) = item?;
            results.insert(token, outcome);
        }
        Ok(results)
    }

    /// Adapt into a [`Stream`] of outcomes.
    pub fn into_stream(self) -> impl Stream<Item = Result<(String, Outcome), DispatchError>> + 'a {
        futures_util::stream::unfold(self, |mut dispatch| async move {
            let item = dispatch.next().await?;
            Some((item, dispatch))
        })
    }
}
