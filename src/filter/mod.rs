//! Per-iteration membership sets shared by merge workers.
//!
//! - [`ConcurrentBloomFilter`]: approximate, lock-free. Concurrent inserts are
//!   never lost; false positives are possible, false negatives are not.
//! - [`BucketClaims`]: exact, striped set. Exactly one caller wins
//!   [`BucketClaims::try_claim`] for a given key.

mod bloom;
mod claims;

pub use bloom::ConcurrentBloomFilter;
pub use claims::BucketClaims;

const K_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finalizer.
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(K_MIX);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
