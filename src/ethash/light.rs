//! Ethash light caches and share verification.
//!
//! A light cache is enough to verify a share (recomputing each referenced
//! dataset item from its 256 cache parents) but not to mine. Caches are
//! ~16 MiB at mainnet epochs and shared behind `Arc`; the hosting process
//! typically only ever holds the current epoch's. Eviction is left to the
//! host.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sha3::{Digest, Keccak256, Keccak512};
use tracing::debug;

use crate::hash::Hash256;

use super::epochs::EpochResolver;
use super::EthashError;

const WORD_BYTES: usize = 4;
const DATASET_BYTES_INIT: u64 = 1 << 30;
const DATASET_BYTES_GROWTH: u64 = 1 << 23;
const CACHE_BYTES_INIT: usize = 1 << 24;
const CACHE_BYTES_GROWTH: usize = 1 << 17;
const CACHE_ROUNDS: usize = 3;
const HASH_BYTES: usize = 64;
const MIX_BYTES: usize = 128;
const ACCESSES: usize = 64;
const DATASET_PARENTS: u32 = 256;
const FNV_PRIME: u32 = 0x0100_0193;

/// Outcome of an Ethash computation for a `(seed, header, nonce)` triple.
///
/// A share is valid when `result <= boundary` and `mix_hash` matches what
/// the miner claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthashProof {
    pub result: Hash256,
    pub mix_hash: Hash256,
}

impl EthashProof {
    /// Sentinel returned by the infallible [`Verifier::evaluate`] path:
    /// an all-ones result compares above every boundary, so callers treat
    /// it as "definitely not a valid share".
    pub const REJECT: Self = Self {
        result: Hash256::MAX,
        mix_hash: Hash256::ZERO,
    };
}

fn fnv(x: u32, y: u32) -> u32 {
    x.wrapping_mul(FNV_PRIME) ^ y
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Cache size in bytes for an epoch: the largest size at or below the
/// linear bound whose 64-byte item count is prime.
fn cache_size(epoch: u64) -> usize {
    let mut sz = CACHE_BYTES_INIT + CACHE_BYTES_GROWTH * epoch as usize - HASH_BYTES;
    while !is_prime((sz / HASH_BYTES) as u64) {
        sz -= 2 * HASH_BYTES;
    }
    sz
}

/// Full dataset size in bytes for an epoch, prime in 128-byte pages.
fn full_size(epoch: u64) -> u64 {
    let mut sz = DATASET_BYTES_INIT + DATASET_BYTES_GROWTH * epoch - MIX_BYTES as u64;
    while !is_prime(sz / MIX_BYTES as u64) {
        sz -= 2 * MIX_BYTES as u64;
    }
    sz
}

fn keccak512(input: &[u8]) -> [u8; HASH_BYTES] {
    let mut hasher = Keccak512::new();
    hasher.update(input);
    hasher.finalize().into()
}

fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

fn read_word(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// The verification structure for one epoch.
pub struct LightCache {
    seed: Hash256,
    epoch: u64,
    full_size: u64,
    cache: Vec<u8>,
}

impl LightCache {
    /// Generate the cache for `epoch` from its seed hash.
    ///
    /// This is the expensive step (a keccak512 chain over the whole cache
    /// plus three rounds of RandMemoHash); allocation failure is reported
    /// rather than aborting since miners run close to memory limits.
    pub fn generate(seed: Hash256, epoch: u64) -> Result<Self, EthashError> {
        let size = cache_size(epoch);
        let n = size / HASH_BYTES;

        let mut cache: Vec<u8> = Vec::new();
        cache
            .try_reserve_exact(size)
            .map_err(|_| EthashError::CacheAllocation(size))?;

        // Sequential keccak512 fill from the seed
        let mut node = keccak512(seed.as_bytes());
        cache.extend_from_slice(&node);
        for _ in 1..n {
            node = keccak512(&node);
            cache.extend_from_slice(&node);
        }

        // RandMemoHash rounds
        for _ in 0..CACHE_ROUNDS {
            for i in 0..n {
                let v = (read_word(&cache, i * HASH_BYTES) as usize) % n;
                let prev = (i + n - 1) % n;
                let mut mixed = [0u8; HASH_BYTES];
                for (b, out) in mixed.iter_mut().enumerate() {
                    *out = cache[prev * HASH_BYTES + b] ^ cache[v * HASH_BYTES + b];
                }
                let node = keccak512(&mixed);
                cache[i * HASH_BYTES..(i + 1) * HASH_BYTES].copy_from_slice(&node);
            }
        }

        Ok(Self {
            seed,
            epoch,
            full_size: full_size(epoch),
            cache,
        })
    }

    /// Seed hash this cache was generated from.
    pub fn seed(&self) -> &Hash256 {
        &self.seed
    }

    /// Epoch this cache belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Cache size in bytes.
    pub fn size(&self) -> usize {
        self.cache.len()
    }

    /// Recompute one 64-byte dataset item from the cache.
    fn dataset_item(&self, index: u64) -> [u32; 16] {
        const R: usize = HASH_BYTES / WORD_BYTES;
        let n = (self.cache.len() / HASH_BYTES) as u64;

        let i = (index % n) as usize;
        let mut node = [0u8; HASH_BYTES];
        node.copy_from_slice(&self.cache[i * HASH_BYTES..(i + 1) * HASH_BYTES]);
        let seeded = read_word(&node, 0) ^ index as u32;
        node[0..4].copy_from_slice(&seeded.to_le_bytes());
        let node = keccak512(&node);

        let mut mix = [0u32; R];
        for (w, word) in mix.iter_mut().enumerate() {
            *word = read_word(&node, w * WORD_BYTES);
        }

        for j in 0..DATASET_PARENTS {
            let parent = (fnv(index as u32 ^ j, mix[j as usize % R]) as u64 % n) as usize;
            for (w, word) in mix.iter_mut().enumerate() {
                *word = fnv(*word, read_word(&self.cache, parent * HASH_BYTES + w * WORD_BYTES));
            }
        }

        let mut bytes = [0u8; HASH_BYTES];
        for (w, word) in mix.iter().enumerate() {
            bytes[w * WORD_BYTES..(w + 1) * WORD_BYTES].copy_from_slice(&word.to_le_bytes());
        }
        let hashed = keccak512(&bytes);

        let mut out = [0u32; R];
        for (w, word) in out.iter_mut().enumerate() {
            *word = read_word(&hashed, w * WORD_BYTES);
        }
        out
    }

    /// Run hashimoto-light for `(header, nonce)` against this cache.
    pub fn compute(&self, header: &Hash256, nonce: u64) -> Result<EthashProof, EthashError> {
        const MIX_WORDS: usize = MIX_BYTES / WORD_BYTES;
        const MIX_HASHES: u64 = (MIX_BYTES / HASH_BYTES) as u64;
        let n = self.full_size / HASH_BYTES as u64;

        let mut sdata = [0u8; 40];
        sdata[..32].copy_from_slice(header.as_bytes());
        sdata[32..].copy_from_slice(&nonce.to_le_bytes());
        let s = keccak512(&sdata);
        let s0 = read_word(&s, 0);

        let mut mix = [0u32; MIX_WORDS];
        for (w, word) in mix.iter_mut().enumerate() {
            *word = read_word(&s, (w % (HASH_BYTES / WORD_BYTES)) * WORD_BYTES);
        }

        for i in 0..ACCESSES as u32 {
            let p = (fnv(i ^ s0, mix[i as usize % MIX_WORDS]) as u64 % (n / MIX_HASHES))
                * MIX_HASHES;
            let mut newdata = [0u32; MIX_WORDS];
            for j in 0..MIX_HASHES {
                let item = self.dataset_item(p + j);
                newdata[(j as usize) * 16..(j as usize + 1) * 16].copy_from_slice(&item);
            }
            for (w, word) in mix.iter_mut().enumerate() {
                *word = fnv(*word, newdata[w]);
            }
        }

        let mut cmix = [0u8; 32];
        for i in 0..8 {
            let word = fnv(
                fnv(fnv(mix[4 * i], mix[4 * i + 1]), mix[4 * i + 2]),
                mix[4 * i + 3],
            );
            cmix[i * WORD_BYTES..(i + 1) * WORD_BYTES].copy_from_slice(&word.to_le_bytes());
        }

        let mut rdata = [0u8; HASH_BYTES + 32];
        rdata[..HASH_BYTES].copy_from_slice(&s);
        rdata[HASH_BYTES..].copy_from_slice(&cmix);

        Ok(EthashProof {
            result: Hash256::from_bytes(keccak256(&rdata)),
            mix_hash: Hash256::from_bytes(cmix),
        })
    }
}

/// Shared table of per-epoch light caches.
///
/// Allocates lazily on first request per seed; handles are reference
/// counted, so a cache outlives the table entry for as long as any caller
/// holds it.
pub struct Verifier {
    resolver: Arc<EpochResolver>,
    lights: Mutex<HashMap<Hash256, Arc<LightCache>>>,
}

impl Verifier {
    pub fn new(resolver: Arc<EpochResolver>) -> Self {
        Self {
            resolver,
            lights: Mutex::new(HashMap::new()),
        }
    }

    /// Light cache for `seed`, generating it on first request.
    pub fn light_for(&self, seed: &Hash256) -> Result<Arc<LightCache>, EthashError> {
        let mut lights = self.lights.lock();
        if let Some(light) = lights.get(seed) {
            return Ok(light.clone());
        }
        let epoch = self.resolver.epoch_of(seed)?;
        debug!(epoch, %seed, "generating light cache");
        let light = Arc::new(LightCache::generate(*seed, epoch)?);
        lights.insert(*seed, light.clone());
        Ok(light)
    }

    /// Compute the proof for a triple; never fails.
    ///
    /// Any internal failure yields [`EthashProof::REJECT`], preserving the
    /// contract the miner hot path relies on: a failed evaluation reads as
    /// a share that misses every boundary.
    pub fn evaluate(&self, seed: &Hash256, header: &Hash256, nonce: u64) -> EthashProof {
        match self
            .light_for(seed)
            .and_then(|light| light.compute(header, nonce))
        {
            Ok(proof) => proof,
            Err(err) => {
                debug!(%err, "share evaluation failed");
                EthashProof::REJECT
            }
        }
    }
}
