//! Storage interfaces consumed by the clustering engine.
//!
//! The engine never owns sequences or assignments; it reads sequences through
//! [`SequenceStore`], ranks them through [`AbundanceStore`] and writes cluster
//! membership through [`ClusterStore`]. [`memory`] provides in-memory backends.

pub mod memory;

use std::ops::Range;

use thiserror::Error;

pub use memory::{InMemoryAbundanceStore, InMemoryClusterStore, InMemorySequenceStore};

/// Integer identifier of an aptamer in the sequence store.
pub type AptamerId = u32;

/// Integer identifier of a cluster.
pub type ClusterId = u32;

/// Errors reported by store backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store was finalized with `set_read_only`.
    #[error("store is read-only")]
    ReadOnly,

    /// The id does not fit the backend's id space.
    #[error("aptamer id {id} out of range (capacity {capacity})")]
    IdOutOfRange {
        /// Offending id.
        id: AptamerId,
        /// Number of ids the backend can hold.
        capacity: usize,
    },

    /// Cluster id reserved by the backend.
    #[error("cluster id {0} is reserved")]
    ReservedClusterId(ClusterId),
}

/// Read access to aptamer sequences.
pub trait SequenceStore: Send + Sync {
    /// Raw bytes of an aptamer, primers included.
    fn get(&self, id: AptamerId) -> Option<&[u8]>;

    /// Half-open bounds of the randomized region within [`SequenceStore::get`].
    fn bounds(&self, id: AptamerId) -> Option<Range<usize>>;

    /// Number of stored aptamers.
    fn len(&self) -> usize;

    /// Whether the store holds no aptamers.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All ids in ascending order.
    fn ids(&self) -> Box<dyn Iterator<Item = AptamerId> + '_>;

    /// Randomized region of an aptamer.
    fn region(&self, id: AptamerId) -> Option<&[u8]> {
        let bounds = self.bounds(id)?;
        self.get(id)?.get(bounds)
    }
}

/// Cluster membership, shared by every worker of a pass.
///
/// Implementations must tolerate concurrent calls from several threads
/// without corrupting the mapping.
pub trait ClusterStore: Send + Sync {
    /// Assign `id` to `cluster`.
    fn add_to_cluster(&self, id: AptamerId, cluster: ClusterId) -> Result<(), StoreError>;

    /// Whether `id` has an assignment.
    fn contains(&self, id: AptamerId) -> bool {
        self.cluster_id(id).is_some()
    }

    /// Cluster of `id`, if assigned.
    fn cluster_id(&self, id: AptamerId) -> Option<ClusterId>;

    /// Overwrite the cluster of `id`.
    fn reassign(&self, id: AptamerId, cluster: ClusterId) -> Result<(), StoreError>;

    /// Snapshot of every `(id, cluster)` pair in ascending id order.
    fn assignments(&self) -> Box<dyn Iterator<Item = (AptamerId, ClusterId)> + '_>;

    /// Number of assigned ids.
    fn len(&self) -> usize {
        self.assignments().count()
    }

    /// Whether nothing is assigned.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finalize the store; later writes fail with [`StoreError::ReadOnly`].
    fn set_read_only(&self);
}

/// Per-cycle copy numbers, used only for ranking.
pub trait AbundanceStore: Send + Sync {
    /// Number of selection cycles tracked.
    fn cycle_count(&self) -> usize;

    /// `(id, count)` pairs observed in one cycle.
    fn cycle(&self, cycle: usize) -> Box<dyn Iterator<Item = (AptamerId, u32)> + '_>;
}
