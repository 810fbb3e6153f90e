//! Error types for the stratum session.

use thiserror::Error;

/// Stratum protocol and transport errors.
///
/// The fatal kinds (everything except `Parse` and `Protocol`) end the
/// session at `Disconnected`; the pool manager owning the session decides
/// whether to retry or fail over. `Parse` and `Protocol` are per-frame:
/// the session logs them and keeps reading.
#[derive(Error, Debug)]
pub enum StratumError {
    /// Host name resolution failed
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// TCP connect failed for every resolved address
    #[error("could not connect to stratum server {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    /// TLS handshake failed
    #[error("SSL/TLS handshake failed: {0}")]
    Handshake(String),

    /// Transport read failed
    #[error("read failed: {0}")]
    Read(std::io::Error),

    /// Transport write failed
    #[error("write failed: {0}")]
    Write(std::io::Error),

    /// A single frame could not be parsed; the session continues
    #[error("parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// A frame was structurally valid JSON but not a usable message for
    /// the negotiated dialect; the frame is skipped
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The pool refused `mining.authorize`
    #[error("worker not authorized: {0}")]
    Auth(String),

    /// No work arrived within the configured work timeout
    #[error("no new work received in {0} seconds")]
    WorkTimeout(u64),

    /// No response to a submission within the response timeout
    #[error("no response received in {0} seconds")]
    ResponseTimeout(u64),

    /// The pool closed the connection, or a channel peer went away
    #[error("connection lost")]
    Disconnected,
}

/// Convenient Result type for stratum operations.
pub type StratumResult<T> = Result<T, StratumError>;
