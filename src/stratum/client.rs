//! The stratum session: connection lifecycle, dialect handshakes, timers,
//! id correlation, and dispatch of pool traffic to the upward channels.
//!
//! One session owns one transport. The async task running [`StratumClient::run`]
//! is the only place that touches the socket; external producers (the mining
//! engine, a hashrate reporter) enqueue [`ClientCommand`]s and the task drains
//! them between reads. Every fatal path releases the transport, emits
//! [`ClientEvent::Disconnected`] exactly once, and returns the error to the
//! caller — the session never reconnects on its own; that policy belongs to
//! the pool manager.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use rand::RngCore;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hash::Hash256;
use crate::stratum::codec::{self, ExtranoncePrefix, RawFrame, Request};
use crate::stratum::connection::{Connection, Transport};
use crate::stratum::error::{StratumError, StratumResult};
use crate::stratum::messages::{ClientCommand, ClientEvent, SessionState, Work};
use crate::uri::{ConnectionSpec, Dialect};

/// How long a submission may wait for its response.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Session configuration, fixed for the lifetime of one connection attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Endpoint, credentials, security level, and dialect.
    pub spec: ConnectionSpec,

    /// Disconnect when no work arrives for this long.
    pub work_timeout: Duration,

    /// Optional email, sent with the ETHPROXY login.
    pub email: String,

    /// Whether `SubmitHashrate` commands are forwarded to the pool.
    pub submit_hashrate: bool,

    /// User agent advertised in the EthereumStratum subscribe.
    pub agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spec: ConnectionSpec::default(),
            work_timeout: Duration::from_secs(150),
            email: String::new(),
            submit_hashrate: false,
            agent: crate::AGENT.to_string(),
        }
    }
}

/// What an in-flight request id is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Subscribe,
    ExtranonceSubscribe,
    Authorize,
    Submit,
    WorkKick,
    Hashrate,
}

/// Correlation record for an in-flight request.
#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: RequestKind,
    sent_at: Instant,
}

/// Timer deadlines driven by the select loop.
struct Deadlines {
    /// Reset on every accepted job.
    work: Instant,
    /// Armed while a submission awaits its response.
    response: Option<Instant>,
}

/// Stratum pool session.
///
/// Construct with the event/command channels and a cancellation token, then
/// drive with [`run`](Self::run). Events arrive in protocol order on the
/// event channel; the session ends at the first fatal error, returning it.
pub struct StratumClient {
    config: SessionConfig,
    event_tx: mpsc::Sender<ClientEvent>,
    command_rx: mpsc::Receiver<ClientCommand>,
    shutdown: CancellationToken,

    state: SessionState,

    /// Ready to accept work. EthereumStratum pools deliver work before
    /// authorization completes, so there the flag flips when the subscribe
    /// frame goes out; `mining.authorize` is still awaited and its refusal
    /// still ends the session.
    authorized: bool,

    /// In-flight requests by id. The id space is fixed per purpose, so this
    /// holds at most one entry per request kind.
    in_flight: HashMap<u64, Pending>,

    current: Option<Work>,
    next_difficulty: f64,
    extranonce: ExtranoncePrefix,

    /// A submission is awaiting its id=4 response.
    response_pending: bool,

    /// Staleness reported with the next submit response. Set from the
    /// submitted solution, upgraded to true when new work lands while the
    /// response is outstanding.
    stale: bool,

    /// ETHPROXY worker name, split from the user at construction.
    worker: String,

    /// Stable per-session id for hashrate reports.
    hashrate_id: String,
}

impl StratumClient {
    pub fn new(
        config: SessionConfig,
        event_tx: mpsc::Sender<ClientEvent>,
        command_rx: mpsc::Receiver<ClientCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        let mut id = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut id);
        let worker =
            codec::split_worker(&config.spec.user, &config.spec.worker_hint).1.to_string();
        Self {
            config,
            event_tx,
            command_rx,
            shutdown,
            state: SessionState::Disconnected,
            authorized: false,
            in_flight: HashMap::new(),
            current: None,
            next_difficulty: 1.0,
            extranonce: ExtranoncePrefix::default(),
            response_pending: false,
            stale: false,
            worker,
            hashrate_id: hex::encode(id),
        }
    }

    fn dialect(&self) -> Dialect {
        self.config.spec.dialect
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }

    /// Connect to the pool and serve the session to completion.
    pub async fn run(mut self) -> StratumResult<()> {
        match self.establish().await {
            Ok((conn, peer)) => self.run_with_transport(conn, peer).await,
            Err(err) => {
                error!(%err, "connection setup failed");
                self.set_state(SessionState::Disconnected);
                self.event_tx.send(ClientEvent::Disconnected).await.ok();
                Err(err)
            }
        }
    }

    /// Resolve, connect, and secure the transport.
    async fn establish(&mut self) -> StratumResult<(Connection, SocketAddr)> {
        self.set_state(SessionState::Resolving);
        let addrs = Connection::resolve(&self.config.spec).await?;

        self.set_state(SessionState::Connecting);
        let (tcp, peer) = Connection::connect(&self.config.spec, addrs).await?;

        self.set_state(SessionState::Handshaking);
        let stream = Connection::handshake(&self.config.spec, tcp).await?;

        Ok((Connection::new(stream), peer))
    }

    /// Serve the session over an established transport.
    ///
    /// Separated from [`run`](Self::run) so tests can substitute a mock
    /// transport.
    pub(crate) async fn run_with_transport<T: Transport>(
        mut self,
        mut conn: T,
        peer: SocketAddr,
    ) -> StratumResult<()> {
        let result = self.serve(&mut conn, peer).await;
        if let Err(err) = &result {
            error!(%err, "session terminated");
        }

        // Release the transport before announcing the disconnect; by the
        // time the pool manager reacts, the socket is gone.
        self.set_state(SessionState::Stopping);
        conn.close().await.ok();
        drop(conn);

        self.set_state(SessionState::Disconnected);
        self.authorized = false;
        self.event_tx.send(ClientEvent::Disconnected).await.ok();
        result
    }

    async fn serve<T: Transport>(&mut self, conn: &mut T, peer: SocketAddr) -> StratumResult<()> {
        self.set_state(SessionState::Subscribing);
        info!(%peer, "connected to stratum server");
        self.event_tx
            .send(ClientEvent::Connected(peer))
            .await
            .map_err(|_| StratumError::Disconnected)?;

        let mut deadlines = Deadlines {
            work: Instant::now() + self.config.work_timeout,
            response: None,
        };

        if self.dialect() == Dialect::EthereumStratum {
            self.authorized = true;
        }
        let subscribe = codec::subscribe(
            self.dialect(),
            &self.config.spec.user,
            &self.config.spec.worker_hint,
            &self.config.email,
            &self.config.agent,
        );
        self.send_request(conn, subscribe, RequestKind::Subscribe).await?;

        loop {
            tokio::select! {
                line = conn.read_line() => {
                    match line? {
                        Some(line) => self.handle_line(conn, &line, &mut deadlines).await?,
                        None => return Err(StratumError::Disconnected),
                    }
                }

                Some(command) = self.command_rx.recv() => {
                    self.handle_command(conn, command, &mut deadlines).await?;
                }

                _ = tokio::time::sleep_until(deadlines.work) => {
                    let secs = self.config.work_timeout.as_secs();
                    return Err(StratumError::WorkTimeout(secs));
                }

                _ = response_deadline(deadlines.response) => {
                    return Err(StratumError::ResponseTimeout(RESPONSE_TIMEOUT.as_secs()));
                }

                _ = self.shutdown.cancelled() => {
                    debug!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// Encode, record in the correlation map, and write one request.
    async fn send_request<T: Transport>(
        &mut self,
        conn: &mut T,
        request: Request,
        kind: RequestKind,
    ) -> StratumResult<()> {
        let line = codec::encode(&request)?;
        self.in_flight.insert(
            request.id,
            Pending {
                kind,
                sent_at: Instant::now(),
            },
        );
        conn.write_line(&line).await
    }

    /// Process one inbound line.
    ///
    /// Per-frame failures (partial frames, bad JSON, unusable payloads) are
    /// logged and swallowed; only transport and protocol-fatal conditions
    /// propagate.
    async fn handle_line<T: Transport>(
        &mut self,
        conn: &mut T,
        line: &str,
        deadlines: &mut Deadlines,
    ) -> StratumResult<()> {
        if !codec::frame_is_complete(line) {
            // Known-buggy eth-proxy servers interleave partial frames;
            // suppress the noise for that dialect only.
            if self.dialect() != Dialect::EthProxy {
                error!("discarding incomplete response");
            }
            return Ok(());
        }

        let frame = match codec::parse_frame(line) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "parse response failed");
                return Ok(());
            }
        };

        if let Some(reason) = frame.error_message() {
            error!(reason, "pool reported error");
        }

        if let Some(id) = frame.id() {
            if let Some(pending) = self.in_flight.remove(&id) {
                return self.handle_response(conn, pending, frame, deadlines).await;
            }
        }
        self.handle_notification(conn, frame, deadlines).await
    }

    async fn handle_response<T: Transport>(
        &mut self,
        conn: &mut T,
        pending: Pending,
        frame: RawFrame,
        deadlines: &mut Deadlines,
    ) -> StratumResult<()> {
        match pending.kind {
            RequestKind::Subscribe => match self.dialect() {
                Dialect::EthereumStratum => {
                    self.next_difficulty = 1.0;
                    if let Some(result) = frame.result.as_array() {
                        let enonce = result.get(1).and_then(Value::as_str).unwrap_or("");
                        self.apply_extranonce(enonce);
                    }
                    self.send_request(
                        conn,
                        codec::extranonce_subscribe(),
                        RequestKind::ExtranonceSubscribe,
                    )
                    .await?;
                    info!("subscribed to stratum server");
                    self.set_state(SessionState::Authorizing);
                    let authorize =
                        codec::authorize(&self.config.spec.user, &self.config.spec.pass);
                    self.send_request(conn, authorize, RequestKind::Authorize).await?;
                }
                Dialect::Stratum => {
                    info!("subscribed to stratum server");
                    self.set_state(SessionState::Authorizing);
                    let authorize =
                        codec::authorize(&self.config.spec.user, &self.config.spec.pass);
                    self.send_request(conn, authorize, RequestKind::Authorize).await?;
                }
                Dialect::EthProxy => {
                    // Login implies authorization; kick the pool for the
                    // first job rather than waiting for its push cadence.
                    self.authorized = true;
                    self.set_state(SessionState::Active);
                    info!(user = %self.config.spec.user, "logged in to eth-proxy server");
                    self.send_request(conn, codec::work_kick(), RequestKind::WorkKick).await?;
                }
            },

            RequestKind::ExtranonceSubscribe => {
                // nothing to do
            }

            RequestKind::Authorize => {
                if !frame.result.as_bool().unwrap_or(false) {
                    return Err(StratumError::Auth(self.config.spec.user.clone()));
                }
                self.authorized = true;
                self.set_state(SessionState::Active);
                info!(user = %self.config.spec.user, "authorized worker");
            }

            RequestKind::Submit => {
                deadlines.response = None;
                self.response_pending = false;
                debug!(rtt = ?pending.sent_at.elapsed(), "submission acknowledged");
                let event = if frame.result.as_bool().unwrap_or(false) {
                    ClientEvent::SolutionAccepted { stale: self.stale }
                } else {
                    ClientEvent::SolutionRejected { stale: self.stale }
                };
                self.event_tx
                    .send(event)
                    .await
                    .map_err(|_| StratumError::Disconnected)?;
            }

            RequestKind::WorkKick => {
                // eth_getWork answers with the job in `result`
                let payload = frame.result;
                self.handle_work(&payload, deadlines).await?;
            }

            RequestKind::Hashrate => {
                // pools ack these inconsistently; nothing to do yet
            }
        }
        Ok(())
    }

    async fn handle_notification<T: Transport>(
        &mut self,
        conn: &mut T,
        frame: RawFrame,
        deadlines: &mut Deadlines,
    ) -> StratumResult<()> {
        // ETHPROXY has no notification methods: every unrecognized frame
        // is a work push carried in `result`.
        if self.dialect() == Dialect::EthProxy {
            let payload = frame.result;
            return self.handle_work(&payload, deadlines).await;
        }

        match frame.method.as_deref().unwrap_or("") {
            "mining.notify" => {
                let payload = frame.params.clone();
                self.handle_work(&payload, deadlines).await?;
            }

            "mining.set_difficulty" if self.dialect() == Dialect::EthereumStratum => {
                if let Some(params) = frame.params.as_array() {
                    let mut difficulty =
                        params.first().and_then(Value::as_f64).unwrap_or(1.0);
                    if difficulty <= 0.0001 {
                        difficulty = 0.0001;
                    }
                    self.next_difficulty = difficulty;
                    info!(difficulty, "difficulty set");
                }
            }

            "mining.set_extranonce" if self.dialect() == Dialect::EthereumStratum => {
                if let Some(params) = frame.params.as_array() {
                    let enonce = params.first().and_then(Value::as_str).unwrap_or("");
                    self.apply_extranonce(enonce);
                }
            }

            "client.get_version" => {
                let reply = codec::version_reply(frame.id().unwrap_or(0), crate::VERSION)?;
                conn.write_line(&reply).await?;
            }

            "" => {}

            other => {
                debug!(method = other, "ignoring unknown notification");
            }
        }
        Ok(())
    }

    /// Apply a notify payload: staleness marking, the dialect's replacement
    /// rule, timer reset, and publication.
    async fn handle_work(
        &mut self,
        payload: &Value,
        deadlines: &mut Deadlines,
    ) -> StratumResult<()> {
        // A job push racing an outstanding submission makes that
        // submission stale, whether or not the job itself is usable.
        if payload.is_array() && self.response_pending {
            self.stale = true;
        }

        let notice = match codec::parse_notify(self.dialect(), payload) {
            Ok(Some(notice)) => notice,
            Ok(None) => return Ok(()),
            Err(err) => {
                warn!(%err, "skipping unusable job");
                return Ok(());
            }
        };

        let work = match self.dialect() {
            Dialect::EthereumStratum => {
                // Replacement is unconditional: the pool controls job
                // identity, not the header.
                //
                // job_len records the length before any truncation; the
                // submit path clamps it back to the stored 64 hex chars.
                let job_len = notice.job.len().min(u8::MAX as usize) as u8;
                let mut job_hex = notice.job;
                job_hex.truncate(64);
                while job_hex.len() < 64 {
                    job_hex.push('0');
                }
                let job = match Hash256::from_hex(&job_hex) {
                    Ok(job) => job,
                    Err(err) => {
                        warn!(%err, "skipping job with unusable id");
                        return Ok(());
                    }
                };
                Work {
                    job,
                    job_len,
                    seed: notice.seed,
                    header: notice.header,
                    boundary: codec::diff_to_boundary(self.next_difficulty),
                    start_nonce: self.extranonce.start_nonce,
                    ex_size_bits: self.extranonce.size_bits,
                }
            }
            Dialect::Stratum | Dialect::EthProxy => {
                if self.current.map(|work| work.header) == Some(notice.header) {
                    return Ok(());
                }
                let job = match Hash256::from_hex(&notice.job) {
                    Ok(job) => job,
                    Err(err) => {
                        warn!(%err, "skipping job with unusable id");
                        return Ok(());
                    }
                };
                Work {
                    job,
                    job_len: 64,
                    seed: notice.seed,
                    header: notice.header,
                    // parse_notify always extracts a boundary for these
                    // dialects
                    boundary: notice.boundary.unwrap_or(Hash256::MAX),
                    start_nonce: 0,
                    ex_size_bits: 0,
                }
            }
        };

        deadlines.work = Instant::now() + self.config.work_timeout;
        self.current = Some(work);
        debug!(
            job = %work.job,
            header = %work.header,
            difficulty = %format_args!("{:.4}", codec::boundary_to_diff(&work.boundary)),
            "new work"
        );
        self.event_tx
            .send(ClientEvent::WorkReceived(work))
            .await
            .map_err(|_| StratumError::Disconnected)
    }

    fn apply_extranonce(&mut self, enonce: &str) {
        match codec::parse_extranonce(enonce) {
            Ok(prefix) => {
                info!(extranonce = enonce, "extranonce set");
                self.extranonce = prefix;
            }
            Err(err) => warn!(%err, "ignoring unusable extranonce"),
        }
    }

    async fn handle_command<T: Transport>(
        &mut self,
        conn: &mut T,
        command: ClientCommand,
        deadlines: &mut Deadlines,
    ) -> StratumResult<()> {
        match command {
            ClientCommand::SubmitSolution(solution) => {
                if !self.authorized {
                    warn!("dropping solution: session not ready for work");
                    return Ok(());
                }
                deadlines.response = None;
                self.stale = solution.stale;
                let request = codec::submit(
                    self.dialect(),
                    &self.config.spec.user,
                    &self.worker,
                    &solution,
                    self.extranonce.hex_len,
                );
                self.send_request(conn, request, RequestKind::Submit).await?;
                self.response_pending = true;
                deadlines.response = Some(Instant::now() + RESPONSE_TIMEOUT);
                debug!(
                    nonce = %format_args!("{:016x}", solution.nonce),
                    stale = solution.stale,
                    "submitted solution"
                );
            }

            ClientCommand::SubmitHashrate(rate) => {
                if !self.config.submit_hashrate {
                    return Ok(());
                }
                let request = codec::submit_hashrate(rate, &self.hashrate_id);
                self.send_request(conn, request, RequestKind::Hashrate).await?;
            }
        }
        Ok(())
    }
}

/// Sleep until the response deadline, or forever when none is armed.
async fn response_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
