use std::sync::atomic::{AtomicU32, Ordering};

use crate::store::ClusterId;

/// First cluster id handed out by a fresh counter.
pub const FIRST_CLUSTER_ID: ClusterId = 1;

/// Monotonic source of fresh cluster ids shared by all seed workers.
#[derive(Debug)]
pub struct ClusterIdCounter {
    next: AtomicU32,
}

impl ClusterIdCounter {
    /// Counter starting at [`FIRST_CLUSTER_ID`].
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(FIRST_CLUSTER_ID),
        }
    }

    /// Allocate the next id. Every call returns a distinct value.
    pub fn allocate(&self) -> ClusterId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed) - FIRST_CLUSTER_ID
    }
}
