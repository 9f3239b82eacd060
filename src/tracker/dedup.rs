//! Near-duplicate suppression for article text.
//!
//! A `MinHash` signature is a fixed 128-permutation sketch of the lowercase
//! whitespace tokens of an article's title+summary (first 64 tokens). The
//! `NearDupIndex` buckets signatures with LSH banding and answers "have we
//! indexed something this similar before" without scanning every signature.
//!
//! The test is one-sided: a `true` from `query` means "probably duplicate";
//! a `false` never proves novelty. Signatures live only as long as their
//! topic and are never persisted.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Number of hash permutations per signature.
pub const NUM_PERMS: usize = 128;
/// Token cap keeps signature cost flat for long summaries.
const MAX_TOKENS: usize = 64;
/// LSH banding layout; `BANDS * ROWS == NUM_PERMS`.
const BANDS: usize = 16;
const ROWS: usize = 8;
/// Estimated-Jaccard threshold above which a candidate counts as duplicate.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Sentinel for "no token seen" — an empty text yields all-sentinel mins.
const EMPTY_MIN: u64 = u64::MAX;

/// Fixed seed for the permutation family. Signatures must be deterministic
/// across runs so tests and replays behave identically.
const PERM_SEED: u64 = 0x9c3a_5f01_74d2_e6b8;

struct PermTable {
    mul: [u64; NUM_PERMS],
    add: [u64; NUM_PERMS],
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

static PERMS: Lazy<PermTable> = Lazy::new(|| {
    let mut state = PERM_SEED;
    let mut mul = [0u64; NUM_PERMS];
    let mut add = [0u64; NUM_PERMS];
    for i in 0..NUM_PERMS {
        // Odd multiplier keeps the map a permutation of the u64 ring.
        mul[i] = splitmix64(&mut state) | 1;
        add[i] = splitmix64(&mut state);
    }
    PermTable { mul, add }
});

fn hash_token(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("sha256 is 32 bytes"))
}

/// Fixed-width probabilistic sketch of a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHash {
    mins: [u64; NUM_PERMS],
}

impl MinHash {
    /// Build the signature of `text`: lowercase, whitespace-tokenize, cap at
    /// the first 64 tokens. Empty or whitespace-only text yields a valid
    /// (empty) signature.
    pub fn of_text(text: &str) -> Self {
        let perms = &*PERMS;
        let mut mins = [EMPTY_MIN; NUM_PERMS];
        let lowered = text.to_lowercase();
        for token in lowered.split_whitespace().take(MAX_TOKENS) {
            let h = hash_token(token);
            for i in 0..NUM_PERMS {
                let permuted = perms.mul[i].wrapping_mul(h).wrapping_add(perms.add[i]);
                if permuted < mins[i] {
                    mins[i] = permuted;
                }
            }
        }
        Self { mins }
    }

    pub fn is_empty(&self) -> bool {
        self.mins.iter().all(|&m| m == EMPTY_MIN)
    }

    /// Fraction of agreeing permutations — an unbiased Jaccard estimate.
    pub fn estimated_jaccard(&self, other: &MinHash) -> f64 {
        let equal = self
            .mins
            .iter()
            .zip(other.mins.iter())
            .filter(|(a, b)| a == b)
            .count();
        equal as f64 / NUM_PERMS as f64
    }

    fn band_key(&self, band: usize) -> u64 {
        // FNV-1a fold over the band's rows; band index salts the key so the
        // same rows in different bands never share buckets.
        let mut h = 0xcbf2_9ce4_8422_2325u64 ^ band as u64;
        for &v in &self.mins[band * ROWS..(band + 1) * ROWS] {
            h = (h ^ v).wrapping_mul(0x0000_0100_0000_01B3);
        }
        h
    }
}

/// Per-topic LSH index over article signatures.
///
/// `insert` is unconditional; the caller decides novelty via `query` first.
/// There is no removal: the index shares its topic's lifetime.
#[derive(Debug)]
pub struct NearDupIndex {
    bands: Vec<HashMap<u64, Vec<u64>>>,
    signatures: HashMap<u64, MinHash>,
    threshold: f64,
}

impl Default for NearDupIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NearDupIndex {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            bands: (0..BANDS).map(|_| HashMap::new()).collect(),
            signatures: HashMap::new(),
            threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// True when the index already holds a signature whose estimated Jaccard
    /// similarity with `sig` reaches the threshold.
    pub fn query(&self, sig: &MinHash) -> bool {
        let mut candidates: HashSet<u64> = HashSet::new();
        for band in 0..BANDS {
            if let Some(bucket) = self.bands[band].get(&sig.band_key(band)) {
                candidates.extend(bucket.iter().copied());
            }
        }
        candidates.into_iter().any(|id| {
            self.signatures
                .get(&id)
                .is_some_and(|other| sig.estimated_jaccard(other) >= self.threshold)
        })
    }

    pub fn insert(&mut self, id: u64, sig: MinHash) {
        for band in 0..BANDS {
            self.bands[band]
                .entry(sig.band_key(band))
                .or_default()
                .push(id);
        }
        self.signatures.insert(id, sig);
    }
}
