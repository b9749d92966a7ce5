use hashbrown::HashSet;
use parking_lot::Mutex;

use super::mix64;

const DEFAULT_SHARDS: usize = 64;

/// Exact set of claimed bucket keys, striped over several mutexes.
#[derive(Debug)]
pub struct BucketClaims {
    shards: Box<[Mutex<HashSet<u64>>]>,
}

impl BucketClaims {
    /// Claim set with the default stripe count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Claim set with `shards` stripes.
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1))
                .map(|_| Mutex::new(HashSet::new()))
                .collect(),
        }
    }

    fn shard(&self, key: u64) -> &Mutex<HashSet<u64>> {
        &self.shards[(mix64(key) % self.shards.len() as u64) as usize]
    }

    /// Claim `key`; returns `true` only for the first caller.
    pub fn try_claim(&self, key: u64) -> bool {
        self.shard(key).lock().insert(key)
    }

    /// Number of claimed keys.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Whether nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every claim.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }
}
