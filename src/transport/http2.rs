//! HTTP/2 transport over TLS.
//!
//! One TCP connection, TLS via rustls (ring provider, ALPN `h2`), and the
//! `h2` client on top. The connection driver runs on its own tokio task;
//! responses for streams nobody is waiting on yet are buffered by `h2` until
//! their [`get_response`](super::Transport::get_response) call.
//!
//! The peer's `MAX_CONCURRENT_STREAMS` lives inside the `h2` connection
//! state and is read through [`SendRequest::current_max_send_streams`]
//! while holding the transport's sender lock. Until the peer's first
//! SETTINGS frame is processed that value is a local placeholder, so
//! `connect` holds the stream limit at one and waits (bounded) for the
//! real advertisement before returning.

// Rust guideline compliant 2026-02

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use h2::client::{ResponseFuture, SendRequest};
use http::{HeaderMap, Method, Request};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::{RawResponse, Transport};
use crate::constants::{
    CONCURRENT_STREAMS_MINIMUM, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    INITIAL_SETTINGS_TIMEOUT, SETTINGS_POLL_INTERVAL,
};

/// Handle for one in-flight HTTP/2 request.
#[derive(Debug)]
pub struct H2Stream {
    response: ResponseFuture,
}

/// Build the TLS client configuration.
///
/// Trusts the webpki root set and advertises only `h2` via ALPN. With
/// `client_cert` set to `(cert_pem, key_pem)` paths, the certificate chain
/// is presented for certificate-based authentication.
pub fn tls_client_config(client_cert: Option<(&Path, &Path)>) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("TLS provider rejected default protocol versions")?
        .with_root_certificates(roots);

    let mut config = match client_cert {
        Some((cert_path, key_path)) => {
            let certs = CertificateDer::pem_file_iter(cert_path)
                .with_context(|| format!("Failed to open certificate {}", cert_path.display()))?
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Failed to parse certificate {}", cert_path.display()))?;
            anyhow::ensure!(!certs.is_empty(), "No certificates found in {}", cert_path.display());
            let key = PrivateKeyDer::from_pem_file(key_path)
                .with_context(|| format!("Failed to parse private key {}", key_path.display()))?;
            builder
                .with_client_auth_cert(certs, key)
                .context("Client certificate rejected")?
        }
        None => builder.with_no_client_auth(),
    };

    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// [`Transport`] backed by a single HTTP/2 connection.
pub struct H2Transport {
    host: String,
    port: u16,
    tls: Arc<ClientConfig>,
    connect_timeout: Duration,
    request_timeout: Duration,
    sender: Mutex<Option<SendRequest<Bytes>>>,
    connected: Arc<AtomicBool>,
}

impl std::fmt::Debug for H2Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H2Transport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl H2Transport {
    /// Create an unconnected transport for `host:port`.
    pub fn new(host: impl Into<String>, port: u16, tls: ClientConfig) -> Self {
        Self {
            host: host.into(),
            port,
            tls: Arc::new(tls),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sender: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the connect and per-response timeouts.
    pub fn with_timeouts(mut self, connect_timeout: Duration, request_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }

    /// Close the connection.
    ///
    /// Outstanding streams fail on their next read.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn lock_sender(&self) -> Result<MutexGuard<'_, Option<SendRequest<Bytes>>>> {
        self.sender
            .lock()
            .map_err(|e| anyhow!("HTTP/2 sender lock poisoned: {e}"))
    }

    /// Run the HTTP/2 handshake over an established byte stream and start
    /// the connection driver.
    async fn attach<IO>(&self, io: IO) -> Result<()>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut builder = ::h2::client::Builder::new();
        builder.initial_max_send_streams(CONCURRENT_STREAMS_MINIMUM);
        let (sender, connection) = builder
            .handshake::<_, Bytes>(io)
            .await
            .context("HTTP/2 handshake failed")?;

        let connected = Arc::clone(&self.connected);
        connected.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            match connection.await {
                Ok(()) => log::info!("[H2] Connection closed"),
                Err(e) => log::warn!("[H2] Connection closed with error: {e}"),
            }
            connected.store(false, Ordering::SeqCst);
        });

        self.await_initial_settings(sender.clone()).await?;
        *self.lock_sender()? = Some(sender);
        Ok(())
    }

    /// Wait until the peer's first SETTINGS frame has replaced the
    /// placeholder stream limit.
    ///
    /// A peer that advertises exactly one stream, or whose SETTINGS are slow,
    /// costs at most `INITIAL_SETTINGS_TIMEOUT`; the limit then stays at one
    /// until the advertisement arrives.
    async fn await_initial_settings(&self, sender: SendRequest<Bytes>) -> Result<()> {
        let wait = self.connect_timeout.min(INITIAL_SETTINGS_TIMEOUT);
        let connected = Arc::clone(&self.connected);
        let settled = timeout(wait, async move {
            loop {
                let streams = sender.current_max_send_streams();
                if streams != CONCURRENT_STREAMS_MINIMUM || !connected.load(Ordering::SeqCst) {
                    return streams;
                }
                tokio::time::sleep(SETTINGS_POLL_INTERVAL).await;
            }
        })
        .await;

        if !self.is_connected() {
            anyhow::bail!("Connection closed before the peer's SETTINGS arrived");
        }
        match settled {
            Ok(streams) => log::debug!("[H2] Peer allows {} concurrent streams", streams),
            Err(_elapsed) => log::debug!(
                "[H2] No stream limit from peer within {:?}, starting at {}",
                wait,
                CONCURRENT_STREAMS_MINIMUM
            ),
        }
        Ok(())
    }

    fn authority(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[async_trait]
impl Transport for H2Transport {
    type Stream = H2Stream;

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.host, self.port);
        let tcp = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_elapsed| anyhow!("TCP connect to {addr} timed out"))?
            .with_context(|| format!("TCP connect to {addr} failed"))?;
        tcp.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        let server_name = ServerName::try_from(self.host.clone())
            .with_context(|| format!("Invalid server name: {}", self.host))?;
        let connector = TlsConnector::from(Arc::clone(&self.tls));
        let tls = timeout(self.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_elapsed| anyhow!("TLS handshake with {addr} timed out"))?
            .context("TLS handshake failed")?;

        self.attach(tls).await?;
        log::debug!("[H2] Connected to {addr}");
        Ok(())
    }

    async fn request(
        &self,
        method: &Method,
        path: &str,
        body: &Bytes,
        headers: &HeaderMap,
    ) -> Result<H2Stream> {
        let sender = self
            .lock_sender()?
            .clone()
            .ok_or_else(|| anyhow!("HTTP/2 connection not established"))?;
        let mut sender = sender.ready().await.context("HTTP/2 connection not ready")?;

        let uri = format!("https://{}{}", self.authority(), path);
        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(())
            .context("Failed to build request")?;
        *request.headers_mut() = headers.clone();

        let (response, mut send_stream) = sender
            .send_request(request, body.is_empty())
            .context("Failed to open stream")?;
        if !body.is_empty() {
            send_stream
                .send_data(body.clone(), true)
                .context("Failed to send request body")?;
        }

        Ok(H2Stream { response })
    }

    async fn get_response(&self, stream: H2Stream) -> Result<RawResponse> {
        let read = async {
            let response = stream.response.await.context("Stream failed before response")?;
            let status = response.status().as_u16();

            let mut body = response.into_body();
            let mut bytes = BytesMut::new();
            while let Some(chunk) = body.data().await {
                let chunk = chunk.context("Failed reading response body")?;
                if let Err(e) = body.flow_control().release_capacity(chunk.len()) {
                    log::debug!("[H2] release_capacity failed: {e}");
                }
                bytes.extend_from_slice(&chunk);
            }

            Ok::<_, anyhow::Error>(RawResponse {
                status,
                body: bytes.freeze(),
            })
        };

        timeout(self.request_timeout, read)
            .await
            .map_err(|_elapsed| anyhow!("Timed out waiting for response"))?
    }

    fn remote_max_concurrent_streams(&self) -> usize {
        match self.sender.lock() {
            Ok(sender) => sender
                .as_ref()
                .map_or(0, SendRequest::current_max_send_streams),
            Err(_poisoned) => 0,
        }
    }
}
