//! Ethash stratum pool client.
//!
//! The protocol core of an Ethash miner: a long-lived session that speaks
//! one of three stratum dialects to a pool over TCP or TLS, plus the
//! epoch/seed bookkeeping and light-cache verification the surrounding
//! miner needs to sanity-check its shares.
//!
//! - [`stratum`] — the session, dialect codec, and transport.
//! - [`ethash`] — seed↔epoch resolution and hashimoto-light verification.
//! - [`uri`] — pool URI scheme table and connection parameters.
//!
//! Pool failover, the mining kernels themselves, and CLI surfaces live in
//! the host application; this crate ends at the session's event and
//! command channels.

pub mod ethash;
pub mod hash;
pub mod stratum;
pub mod u256;
pub mod uri;

/// Crate version, reported to pools that ask (`client.get_version`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent advertised during the EthereumStratum subscribe.
pub const AGENT: &str = concat!("ashpool/", env!("CARGO_PKG_VERSION"));
