//! Renumbering of cluster ids into a gap-free range.
//!
//! Merges leave holes in the id space (clusters whose members all moved
//! elsewhere). Each used id is lowered by the number of unused ids below it,
//! so the used ids become `FIRST_CLUSTER_ID..FIRST_CLUSTER_ID + K` with their
//! relative order unchanged.

use bitvec::prelude::*;
use tracing::info;

use super::counter::FIRST_CLUSTER_ID;
use crate::store::{ClusterId, ClusterStore};
use crate::ClusterError;

/// Result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compaction {
    /// Distinct cluster ids in use.
    pub clusters: usize,
    /// Largest id before compaction.
    pub max_before: ClusterId,
    /// Assignments rewritten.
    pub rewritten: usize,
}

/// Closes gaps between used cluster ids.
///
/// Must not run concurrently with any other writer of the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdCompactor;

impl IdCompactor {
    /// Create a compactor.
    pub fn new() -> Self {
        Self
    }

    /// Rewrite every assignment of `clusters` onto a contiguous id range.
    pub fn compact(&self, clusters: &dyn ClusterStore) -> Result<Compaction, ClusterError> {
        let assignments: Vec<_> = clusters.assignments().collect();
        let Some(max) = assignments.iter().map(|&(_, cluster)| cluster).max() else {
            return Ok(Compaction {
                clusters: 0,
                max_before: 0,
                rewritten: 0,
            });
        };
        let min = assignments
            .iter()
            .map(|&(_, cluster)| cluster)
            .min()
            .unwrap_or(max);

        let mut used = bitvec![0; max as usize + 1];
        for &(_, cluster) in &assignments {
            used.set(cluster as usize, true);
        }

        // shift[c] = unused ids in [base, c)
        let base = min.min(FIRST_CLUSTER_ID) as usize;
        let mut shift = vec![0 as ClusterId; max as usize + 1];
        let mut gap: ClusterId = 0;
        for cluster in base..=max as usize {
            if used[cluster] {
                shift[cluster] = gap;
            } else {
                gap += 1;
            }
        }

        let mut rewritten = 0;
        for &(id, cluster) in &assignments {
            let delta = shift[cluster as usize];
            if delta != 0 {
                clusters.reassign(id, cluster - delta)?;
                rewritten += 1;
            }
        }

        let compaction = Compaction {
            clusters: used.count_ones(),
            max_before: max,
            rewritten,
        };
        info!(
            clusters = compaction.clusters,
            max_before = max,
            rewritten,
            "compacted cluster ids"
        );
        Ok(compaction)
    }
}
