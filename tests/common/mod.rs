//! Scripted in-memory transport shared by the integration tests.
//!
//! Responses are produced by a timer task spawned when the request is
//! issued, so arrival order follows the configured delays while the client
//! still drains in admission order. Run tests with
//! `#[tokio::test(start_paused = true)]` so the delays cost no wall time.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use apns_push::{RawResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use tokio::sync::oneshot;

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A request was issued.
    Admit {
        /// Token the request was for.
        token: String,
        /// Requests outstanding just before this one.
        queued_before: usize,
        /// Ceiling advertised when the request was issued.
        ceiling: usize,
    },
    /// The client started waiting on a token's response.
    Drain(String),
    /// A response became available.
    Arrive(String),
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Bytes,
    pub headers: HeaderMap,
}

#[derive(Default)]
struct State {
    connected: bool,
    connect_failures: u32,
    connect_attempts: u32,
    responses: HashMap<String, (u16, String)>,
    delays: HashMap<String, Duration>,
    dropped: Vec<String>,
    drop_after_admits: Option<usize>,
    request_failures: Vec<String>,
    ceiling_schedule: Vec<(usize, usize)>,
    admits: usize,
    in_flight: usize,
    peak_in_flight: usize,
    trace: Vec<Event>,
    requests: Vec<RecordedRequest>,
}

/// Handle for a scripted in-flight request.
#[derive(Debug)]
pub struct ScriptedStream {
    token: String,
    response: oneshot::Receiver<RawResponse>,
}

/// In-memory [`Transport`] with scripted behaviour.
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
    settings: Mutex<usize>,
}

impl ScriptedTransport {
    /// Transport advertising `ceiling` concurrent streams.
    pub fn new(ceiling: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            settings: Mutex::new(ceiling),
        }
    }

    /// Fail the first `n` connect attempts.
    pub fn fail_connects(self, n: u32) -> Self {
        self.state.lock().unwrap().connect_failures = n;
        self
    }

    /// Answer `token` with `status` and `body` (default: 200, empty).
    pub fn respond(self, token: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(token.to_string(), (status, body.to_string()));
        self
    }

    /// Delay `token`'s response by `ms` milliseconds.
    pub fn delay(self, token: &str, ms: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(token.to_string(), Duration::from_millis(ms));
        self
    }

    /// Drop the connection when the client starts draining `token`.
    pub fn drop_before_response(self, token: &str) -> Self {
        self.state.lock().unwrap().dropped.push(token.to_string());
        self
    }

    /// Drop the connection right after the `admits`-th request is issued.
    ///
    /// Responses already in flight are still delivered.
    pub fn drop_after_admits(self, admits: usize) -> Self {
        self.state.lock().unwrap().drop_after_admits = Some(admits);
        self
    }

    /// Fail to issue the request for `token`.
    pub fn fail_request(self, token: &str) -> Self {
        self.state.lock().unwrap().request_failures.push(token.to_string());
        self
    }

    /// Advertise `ceiling` once `admits` requests have been issued.
    pub fn change_ceiling_after(self, admits: usize, ceiling: usize) -> Self {
        self.state.lock().unwrap().ceiling_schedule.push((admits, ceiling));
        self
    }

    /// Mark the transport as already connected.
    pub fn connected(self) -> Self {
        self.state.lock().unwrap().connected = true;
        self
    }

    pub fn trace(&self) -> Vec<Event> {
        self.state.lock().unwrap().trace.clone()
    }

    /// Trace without arrival events.
    pub fn admit_drain_trace(&self) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter_map(|event| match event {
                Event::Admit { token, .. } => Some(format!("admit {token}")),
                Event::Drain(token) => Some(format!("drain {token}")),
                Event::Arrive(_) => None,
            })
            .collect()
    }

    pub fn arrival_order(&self) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter_map(|event| match event {
                Event::Arrive(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().unwrap().peak_in_flight
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Stream = ScriptedStream;

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.connect_attempts <= state.connect_failures {
            bail!("connection refused");
        }
        state.connected = true;
        Ok(())
    }

    async fn request(
        &self,
        method: &Method,
        path: &str,
        body: &Bytes,
        headers: &HeaderMap,
    ) -> Result<ScriptedStream> {
        let token = path
            .strip_prefix("/3/device/")
            .ok_or_else(|| anyhow!("unexpected path {path}"))?
            .to_string();

        let mut state = self.state.lock().unwrap();
        if !state.connected {
            bail!("not connected");
        }
        if state.request_failures.contains(&token) {
            bail!("stream refused");
        }

        let ceiling = *self.settings.lock().unwrap();
        let queued_before = state.in_flight;
        state.trace.push(Event::Admit {
            token: token.clone(),
            queued_before,
            ceiling,
        });
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.to_string(),
            body: body.clone(),
            headers: headers.clone(),
        });
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        state.admits += 1;

        let admits = state.admits;
        let scheduled = state.ceiling_schedule.iter().find(|(at, _)| *at == admits);
        if let Some(&(_, new_ceiling)) = scheduled {
            *self.settings.lock().unwrap() = new_ceiling;
        }
        if state.drop_after_admits == Some(admits) {
            state.connected = false;
        }

        let (status, response_body) = state
            .responses
            .get(&token)
            .cloned()
            .unwrap_or((200, String::new()));
        let delay = state.delays.get(&token).copied().unwrap_or_default();
        drop(state);

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.state);
        let arriving = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.lock().unwrap().trace.push(Event::Arrive(arriving));
            let _ = tx.send(RawResponse {
                status,
                body: Bytes::from(response_body),
            });
        });

        Ok(ScriptedStream { token, response: rx })
    }

    async fn get_response(&self, stream: ScriptedStream) -> Result<RawResponse> {
        {
            let mut state = self.state.lock().unwrap();
            state.trace.push(Event::Drain(stream.token.clone()));
            state.in_flight -= 1;
            if state.dropped.contains(&stream.token) {
                state.connected = false;
                bail!("connection reset while waiting for {}", stream.token);
            }
        }
        stream
            .response
            .await
            .map_err(|_closed| anyhow!("connection closed before response for {}", stream.token))
    }

    fn remote_max_concurrent_streams(&self) -> usize {
        *self.settings.lock().unwrap()
    }
}

/// Clamp an advertised ceiling the way the client does.
pub fn effective_limit(ceiling: usize) -> usize {
    ceiling.clamp(1, 1000)
}

/// Token list `t0..tn`.
pub fn tokens(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{i}")).collect()
}
