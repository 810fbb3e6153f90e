//! Transport for the stratum session: TCP with optional TLS, framed as
//! newline-delimited lines.
//!
//! The [`Transport`] trait abstracts line-level I/O so the session can run
//! over a real socket in production or a channel-backed mock in tests. The
//! real transport is a tagged [`Stream`] variant — one owner, uniform
//! operations — rather than parallel plain/secure socket handles.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, trace, warn};

use crate::stratum::error::{StratumError, StratumResult};
use crate::uri::{ConnectionSpec, SecureLevel};

/// Default CA bundle location when `SSL_CERT_FILE` is not set.
const DEFAULT_CA_BUNDLE: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Coarse liveness guard: probe an idle pool connection after this long.
const KEEPALIVE: Duration = Duration::from_secs(10);

/// Line-level I/O for the stratum protocol.
#[async_trait]
pub trait Transport: Send {
    /// Read one newline-terminated line, trimmed. `None` on EOF.
    async fn read_line(&mut self) -> StratumResult<Option<String>>;

    /// Write one line; the newline is appended here.
    async fn write_line(&mut self, line: &str) -> StratumResult<()>;

    /// Shut the transport down (close_notify for TLS, FIN for TCP).
    async fn close(&mut self) -> StratumResult<()>;
}

/// The underlying byte stream, plain or TLS-wrapped.
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Buffered pool connection.
pub struct Connection {
    inner: BufReader<Stream>,
    /// Partial-line carry-over between reads. Keeping it here (instead of a
    /// fresh buffer per call) means a cancelled read loses nothing.
    line: String,
}

impl Connection {
    pub fn new(stream: Stream) -> Self {
        Self {
            inner: BufReader::new(stream),
            line: String::with_capacity(4096),
        }
    }

    /// Resolve the pool host to connectable addresses.
    pub async fn resolve(spec: &ConnectionSpec) -> StratumResult<Vec<SocketAddr>> {
        debug!(host = %spec.host, port = spec.port, "resolving pool host");
        Ok(tokio::net::lookup_host((spec.host.as_str(), spec.port))
            .await
            .map_err(|source| StratumError::Resolve {
                host: spec.host.clone(),
                port: spec.port,
                source,
            })?
            .collect())
    }

    /// Connect to the first reachable resolved address and arm keepalive.
    pub async fn connect(
        spec: &ConnectionSpec,
        addrs: Vec<SocketAddr>,
    ) -> StratumResult<(TcpStream, SocketAddr)> {
        let mut last_error: Option<std::io::Error> = None;
        let mut connected = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    connected = Some((stream, addr));
                    break;
                }
                Err(err) => last_error = Some(err),
            }
        }
        let (tcp, peer) = connected.ok_or_else(|| StratumError::Connect {
            host: spec.host.clone(),
            port: spec.port,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string()),
        })?;

        let keepalive = TcpKeepalive::new()
            .with_time(KEEPALIVE)
            .with_interval(KEEPALIVE);
        if let Err(err) = SockRef::from(&tcp).set_tcp_keepalive(&keepalive) {
            warn!(%err, "could not enable tcp keepalive");
        }

        Ok((tcp, peer))
    }

    /// Wrap the socket per the configured security level, performing the
    /// TLS handshake when one is called for.
    pub async fn handshake(spec: &ConnectionSpec, tcp: TcpStream) -> StratumResult<Stream> {
        let level = match spec.secure {
            SecureLevel::None => return Ok(Stream::Plain(tcp)),
            level => level,
        };

        debug!(host = %spec.host, ?level, "starting TLS handshake");
        let config = tls_config(level);
        let name = ServerName::try_from(spec.host.clone()).map_err(|err| {
            StratumError::Handshake(format!("invalid server name {}: {err}", spec.host))
        })?;
        let connector = TlsConnector::from(config);
        match connector.connect(name, tcp).await {
            Ok(tls) => Ok(Stream::Tls(Box::new(tls))),
            Err(err) => {
                let message = err.to_string();
                if message.to_lowercase().contains("certificate") {
                    info!("Certificate verification failed. This can have multiple reasons:");
                    info!("* Root certs are either not installed or not found");
                    info!("* Pool uses a self-signed certificate");
                    info!(
                        "Possible fixes: install the ca-certificates package, or point \
                         SSL_CERT_FILE at a valid CA bundle"
                    );
                }
                Err(StratumError::Handshake(message))
            }
        }
    }
}

/// Build the rustls client configuration for the requested level.
///
/// Peer verification is always enabled; an unreadable CA bundle is logged
/// and produces an empty root store, so the handshake that follows fails
/// with a clear verification error instead of silently trusting the peer.
fn tls_config(level: SecureLevel) -> Arc<ClientConfig> {
    let builder = match level {
        SecureLevel::Tls12 => ClientConfig::builder_with_protocol_versions(&[
            &tokio_rustls::rustls::version::TLS12,
        ]),
        _ => ClientConfig::builder(),
    };
    let config = builder
        .with_root_certificates(load_root_certs())
        .with_no_client_auth();
    Arc::new(config)
}

fn load_root_certs() -> RootCertStore {
    let path =
        std::env::var("SSL_CERT_FILE").unwrap_or_else(|_| DEFAULT_CA_BUNDLE.to_string());
    let mut roots = RootCertStore::empty();
    match std::fs::File::open(&path) {
        Ok(file) => {
            let mut reader = std::io::BufReader::new(file);
            for cert in rustls_pemfile::certs(&mut reader).flatten() {
                let _ = roots.add(cert);
            }
        }
        Err(err) => {
            error!(%path, %err, "failed to load ca certificates");
            error!(
                "Either the file '{DEFAULT_CA_BUNDLE}' does not exist or the environment \
                 variable SSL_CERT_FILE is set to an invalid or inaccessible file."
            );
            error!("It is possible that certificate verification will fail.");
        }
    }
    roots
}

#[async_trait]
impl Transport for Connection {
    async fn read_line(&mut self) -> StratumResult<Option<String>> {
        loop {
            if let Some(pos) = self.line.find('\n') {
                let remainder = self.line.split_off(pos + 1);
                let mut line = std::mem::replace(&mut self.line, remainder);
                line.pop();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(rx = %line, "received frame");
                return Ok(Some(line.to_string()));
            }

            let read = self
                .inner
                .read_line(&mut self.line)
                .await
                .map_err(StratumError::Read)?;
            if read == 0 {
                // EOF; any partial trailing line is unusable
                return Ok(None);
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> StratumResult<()> {
        trace!(tx = %line, "sending frame");
        let stream = self.inner.get_mut();
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(StratumError::Write)?;
        stream.write_all(b"\n").await.map_err(StratumError::Write)?;
        stream.flush().await.map_err(StratumError::Write)?;
        Ok(())
    }

    async fn close(&mut self) -> StratumResult<()> {
        self.inner
            .get_mut()
            .shutdown()
            .await
            .map_err(StratumError::Write)
    }
}

/// Channel-backed transport for deterministic testing.
///
/// Works with `tokio::time::pause()` since no real I/O is involved. Create
/// a pair with [`MockTransport::pair()`]; the transport is the session's
/// side, the handle is the test's side.
#[cfg(test)]
pub(crate) struct MockTransport {
    rx: tokio::sync::mpsc::UnboundedReceiver<String>,
    tx: tokio::sync::mpsc::UnboundedSender<String>,
}

/// Test-side handle for a [`MockTransport`].
#[cfg(test)]
pub(crate) struct MockTransportHandle {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
    rx: tokio::sync::mpsc::UnboundedReceiver<String>,
}

#[cfg(test)]
impl MockTransport {
    pub fn pair() -> (Self, MockTransportHandle) {
        let (session_tx, handle_rx) = tokio::sync::mpsc::unbounded_channel();
        let (handle_tx, session_rx) = tokio::sync::mpsc::unbounded_channel();
        (
            MockTransport {
                rx: session_rx,
                tx: session_tx,
            },
            MockTransportHandle {
                tx: handle_tx,
                rx: handle_rx,
            },
        )
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn read_line(&mut self) -> StratumResult<Option<String>> {
        Ok(self.rx.recv().await)
    }

    async fn write_line(&mut self, line: &str) -> StratumResult<()> {
        self.tx
            .send(line.to_string())
            .map_err(|_| StratumError::Disconnected)
    }

    async fn close(&mut self) -> StratumResult<()> {
        Ok(())
    }
}

#[cfg(test)]
impl MockTransportHandle {
    /// Feed a raw line to the session.
    pub fn send_line(&self, line: &str) {
        self.tx.send(line.to_string()).expect("transport dropped");
    }

    /// Receive a line the session wrote.
    pub async fn recv_line(&mut self) -> String {
        self.rx.recv().await.expect("transport dropped")
    }
}
