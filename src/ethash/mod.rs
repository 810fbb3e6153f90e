//! Ethash epoch bookkeeping and light share verification.
//!
//! Mining work identifies its epoch by seed hash, so the protocol layer and
//! the mining engine both need the seed↔epoch mapping; shares can be checked
//! without a full DAG using only the per-epoch light cache. This module
//! provides both as explicit services the host constructs and shares:
//!
//! - [`EpochResolver`] — memoized seed-hash ↔ epoch-number mapping.
//! - [`Verifier`] — per-epoch light caches and `(result, mix_hash)`
//!   computation for a `(seed, header, nonce)` triple.
//!
//! "keccak" throughout means the pre-standardization Keccak-256/-512 that
//! Ethereum calls sha3, not NIST SHA-3.

mod epochs;
mod light;

use thiserror::Error;

use crate::hash::Hash256;

pub use epochs::EpochResolver;
pub use light::{EthashProof, LightCache, Verifier};

/// Number of blocks sharing one Ethash cache/DAG.
pub const EPOCH_LENGTH: u64 = 30000;

/// How many epochs the resolver will walk forward looking for a seed hash.
///
/// Chains taller than `EPOCH_LENGTH * MAX_EPOCH_SEARCH` blocks must supply
/// epoch numbers directly instead of seed hashes.
pub const MAX_EPOCH_SEARCH: u64 = 2048;

/// Errors from the epoch resolver and light verifier.
#[derive(Error, Debug)]
pub enum EthashError {
    /// The seed hash did not match any epoch within [`MAX_EPOCH_SEARCH`].
    #[error(
        "apparent block number for {seed} is too high; max is {}",
        EPOCH_LENGTH * MAX_EPOCH_SEARCH
    )]
    EpochOutOfRange { seed: Hash256 },

    /// The light cache could not be allocated.
    #[error("light cache allocation failed ({0} bytes)")]
    CacheAllocation(usize),
}
