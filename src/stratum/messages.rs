//! Session vocabulary: work snapshots, solutions, events, and commands.

use std::net::SocketAddr;

use crate::hash::Hash256;

/// One job pushed by the pool, immutable once published.
///
/// The miner searches nonces for `header` in the epoch selected by `seed`;
/// a solution is valid iff its Ethash result is `<= boundary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Work {
    /// Job identifier, right-padded on the wire to 64 hex chars for
    /// EthereumStratum pools.
    pub job: Hash256,

    /// Original hex length of the job id before padding.
    pub job_len: u8,

    /// Seed hash selecting the Ethash epoch.
    pub seed: Hash256,

    /// The proof-of-work input.
    pub header: Hash256,

    /// Share target; solutions must land at or below it.
    pub boundary: Hash256,

    /// Pool-assigned extranonce, placed in the high bits of the nonce
    /// space. Zero when the pool assigns no extranonce.
    pub start_nonce: u64,

    /// Number of high bits of `start_nonce` that are fixed; the miner may
    /// only vary the remaining low bits.
    pub ex_size_bits: u8,
}

/// A solved share, produced by the mining engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    /// The full 64-bit nonce, extranonce prefix included.
    pub nonce: u64,

    /// Mix hash claimed by the miner.
    pub mix_hash: Hash256,

    /// The work this solution was found against.
    pub work: Work,

    /// True when the engine already knows the work was superseded.
    pub stale: bool,
}

/// Events emitted by the session.
///
/// These are the upward callbacks of the protocol core, delivered over a
/// channel so consumers on other tasks see them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// TCP (and TLS, when configured) establishment succeeded.
    Connected(SocketAddr),

    /// The session returned to the disconnected state. Emitted exactly
    /// once per connection attempt, after the transport is released.
    Disconnected,

    /// A `mining.notify` was accepted and became the current work.
    WorkReceived(Work),

    /// The pool accepted a submitted solution.
    SolutionAccepted { stale: bool },

    /// The pool rejected a submitted solution.
    SolutionRejected { stale: bool },
}

/// Commands sent to the session by external producers.
///
/// Both are enqueue-only: the I/O task drains the queue and performs the
/// actual writes, so callers never touch the transport.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Submit a solved share.
    SubmitSolution(Solution),

    /// Report hashrate (hashes per second) via `eth_submitHashrate`.
    SubmitHashrate(u64),
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Resolving,
    Connecting,
    Handshaking,
    Subscribing,
    Authorizing,
    Active,
    Stopping,
}
