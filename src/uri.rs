//! Pool endpoint description and the URI scheme table.
//!
//! The pool manager parses the user's pool URI and hands this module's
//! [`ConnectionSpec`] to the session. The scheme encodes both the transport
//! security and the stratum dialect the pool speaks; everything after the
//! scheme is ordinary authority syntax (`user:pass@host:port`).

/// Transport security for the pool connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecureLevel {
    /// Plain TCP.
    #[default]
    None,
    /// TLS, any protocol version the peer negotiates.
    Tls,
    /// TLS restricted to protocol version 1.2.
    Tls12,
}

/// Stratum dialect spoken by the pool.
///
/// The three dialects share newline-delimited JSON framing but differ in
/// method names, parameter layout, and where job notifications carry their
/// payload. See [`crate::stratum::codec`] for the per-dialect wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Classic `mining.subscribe`/`mining.authorize` with full-width
    /// submissions.
    #[default]
    Stratum,
    /// The eth-proxy flavor: `eth_submitLogin` with a `worker` sidecar
    /// field, jobs delivered in `result`.
    EthProxy,
    /// EthereumStratum/1.0.0 (NiceHash): extranonce-prefixed nonces and
    /// pool-set share difficulty.
    EthereumStratum,
}

/// Connection parameters for one pool endpoint.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// Worker name to use when the user name carries no `.worker` suffix.
    pub worker_hint: String,
    pub secure: SecureLevel,
    pub dialect: Dialect,
}

/// Map a pool URI scheme to its transport security and dialect.
///
/// Returns `None` for unrecognized schemes; the caller decides whether to
/// fall back or refuse the URI.
pub fn scheme_attributes(scheme: &str) -> Option<(SecureLevel, Dialect)> {
    let attrs = match scheme.trim() {
        "stratum+tcp" => (SecureLevel::None, Dialect::Stratum),
        "ethproxy+tcp" => (SecureLevel::None, Dialect::EthProxy),
        "nicehash+tcp" => (SecureLevel::None, Dialect::EthereumStratum),
        "stratum+tls" => (SecureLevel::Tls, Dialect::Stratum),
        "ethproxy+tls" => (SecureLevel::Tls, Dialect::EthProxy),
        "nicehash+tls" => (SecureLevel::Tls, Dialect::EthereumStratum),
        "stratum+tls12" => (SecureLevel::Tls12, Dialect::Stratum),
        "ethproxy+tls12" => (SecureLevel::Tls12, Dialect::EthProxy),
        "nicehash+tls12" => (SecureLevel::Tls12, Dialect::EthereumStratum),
        _ => return None,
    };
    Some(attrs)
}
