//! Seed-hash ↔ epoch-number resolution.
//!
//! The seed chain is `seed(0) = 0x00…00`, `seed(n+1) = keccak256(seed(n))`.
//! Both directions are memoized: the forward direction as a growable
//! sequence, the reverse as a map fed only by the capped reverse walk so the
//! [`MAX_EPOCH_SEARCH`] ceiling holds no matter how far forward lookups have
//! gone.

use std::collections::HashMap;

use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use crate::hash::Hash256;

use super::{EthashError, EPOCH_LENGTH, MAX_EPOCH_SEARCH};

/// Memoized bidirectional mapping between seed hashes and epoch numbers.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct EpochResolver {
    maps: Mutex<Maps>,
}

#[derive(Default)]
struct Maps {
    /// `seeds[n]` is the seed hash of epoch `n`.
    seeds: Vec<Hash256>,
    /// Reverse lookup, populated up to [`MAX_EPOCH_SEARCH`] entries.
    epochs: HashMap<Hash256, u64>,
}

pub(super) fn keccak256(input: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    Hash256::from_bytes(hasher.finalize().into())
}

impl EpochResolver {
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
        }
    }

    /// Seed hash of the epoch containing `block_number`.
    pub fn seed_hash_of(&self, block_number: u64) -> Hash256 {
        let epoch = block_number / EPOCH_LENGTH;
        let mut maps = self.maps.lock();
        maps.grow_to(epoch);
        maps.seeds[epoch as usize]
    }

    /// Epoch number identified by `seed`.
    ///
    /// On a memo miss this walks the seed chain forward, populating both
    /// maps, and gives up after [`MAX_EPOCH_SEARCH`] epochs.
    pub fn epoch_of(&self, seed: &Hash256) -> Result<u64, EthashError> {
        let mut maps = self.maps.lock();
        if let Some(&epoch) = maps.epochs.get(seed) {
            return Ok(epoch);
        }
        maps.grow_to(MAX_EPOCH_SEARCH - 1);
        let Maps { seeds, epochs } = &mut *maps;
        for (epoch, s) in seeds.iter().take(MAX_EPOCH_SEARCH as usize).enumerate() {
            epochs.insert(*s, epoch as u64);
        }
        epochs
            .get(seed)
            .copied()
            .ok_or(EthashError::EpochOutOfRange { seed: *seed })
    }

    /// First block number of the epoch identified by `seed`.
    pub fn block_number_of(&self, seed: &Hash256) -> Result<u64, EthashError> {
        Ok(self.epoch_of(seed)? * EPOCH_LENGTH)
    }
}

impl Default for EpochResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Maps {
    /// Extend the memoized seed chain through epoch `epoch`.
    fn grow_to(&mut self, epoch: u64) {
        let epoch = epoch as usize;
        while self.seeds.len() <= epoch {
            let next = match self.seeds.last() {
                Some(last) => keccak256(last.as_bytes()),
                None => Hash256::ZERO,
            };
            self.seeds.push(next);
        }
    }
}
