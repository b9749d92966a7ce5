//! Later clustering iterations.
//!
//! Every ranked aptamer not yet visited in this iteration is hashed under
//! the iteration's projection. Singleton buckets are marked visited with no
//! further work. Otherwise the first worker to claim the bucket anchors it
//! on that aptamer and moves every unvisited bucket-mate within the cutoff
//! into the anchor's existing cluster. This reconciles clusters seeded
//! under different projections.

use std::fmt;

use tracing::{debug, info};

use super::pipeline::{run_pipeline, write_with_retry, PassKind, PassReport, PassStats, PipelineSettings};
use crate::bucket::{BucketPartitioner, Buckets};
use crate::config::ClusterConfig;
use crate::distance::kmer_distance;
use crate::filter::{BucketClaims, ConcurrentBloomFilter};
use crate::lsh::Projection;
use crate::store::{AptamerId, ClusterStore, SequenceStore};
use crate::ClusterError;

/// False-positive rate of the visited marker.
const VISITED_FALSE_POSITIVE_RATE: f64 = 1e-4;

/// Anchor-based merge over one projection at a time.
///
/// The visited marker and bucket claims are owned by the pass and cleared
/// at the start of every [`ConsensusMergePass::run`].
pub struct ConsensusMergePass<'a> {
    sequences: &'a dyn SequenceStore,
    clusters: &'a dyn ClusterStore,
    partitioner: BucketPartitioner<'a>,
    cutoff: f64,
    kmer_size: usize,
    settings: PipelineSettings,
    visited: ConcurrentBloomFilter,
    claims: BucketClaims,
}

impl fmt::Debug for ConsensusMergePass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusMergePass")
            .field("cutoff", &self.cutoff)
            .field("kmer_size", &self.kmer_size)
            .field("settings", &self.settings)
            .field("visited_bits", &self.visited.num_bits())
            .finish()
    }
}

impl<'a> ConsensusMergePass<'a> {
    /// Create the pass for a pool of `expected` ranked aptamers.
    pub fn new(
        sequences: &'a dyn SequenceStore,
        clusters: &'a dyn ClusterStore,
        cutoff: f64,
        config: &ClusterConfig,
        expected: usize,
    ) -> Self {
        Self {
            sequences,
            clusters,
            partitioner: BucketPartitioner::new(sequences, config.randomized_region_size),
            cutoff,
            kmer_size: config.kmer_size,
            settings: PipelineSettings::merge(config),
            visited: ConcurrentBloomFilter::with_rate(expected, VISITED_FALSE_POSITIVE_RATE),
            claims: BucketClaims::new(),
        }
    }

    /// Merge under `projection`; `buckets` must come from partitioning
    /// `ranked` with the same projection.
    pub fn run(
        &mut self,
        projection: &Projection,
        buckets: &Buckets,
        ranked: &[AptamerId],
    ) -> Result<PassReport, ClusterError> {
        self.visited.clear();
        self.claims.clear();

        let this = &*self;
        let stats = PassStats::default();
        run_pipeline(
            &this.settings,
            &stats,
            ranked.len(),
            ranked
                .iter()
                .copied()
                .filter(|&id| !this.visited.contains(u64::from(id))),
            |id| this.process_anchor(projection, buckets, id, &stats),
        )?;

        let report = stats.report(PassKind::ConsensusMerge);
        info!(
            anchors = this.claims.len(),
            comparisons = report.comparisons,
            reassigned = report.assignments,
            skipped = report.skipped,
            "consensus merge finished"
        );
        Ok(report)
    }

    fn process_anchor(
        &self,
        projection: &Projection,
        buckets: &Buckets,
        anchor: AptamerId,
        stats: &PassStats,
    ) -> Result<(), ClusterError> {
        if self.visited.contains(u64::from(anchor)) {
            return Ok(());
        }
        PassStats::add(&stats.sequences, 1);

        let bucket = self
            .partitioner
            .key_of(projection, anchor)?
            .and_then(|key| buckets.get(key).map(|members| (key, members)));
        let (key, members) = match bucket {
            Some((key, members)) if members.len() > 1 => (key, members),
            _ => {
                self.visited.insert(u64::from(anchor));
                return Ok(());
            }
        };

        // Bucket stays unclaimed; a later bucket-mate with a cluster anchors it.
        let Some(cluster) = self.clusters.cluster_id(anchor) else {
            debug!(anchor, "anchor has no cluster");
            self.visited.insert(u64::from(anchor));
            return Ok(());
        };
        if !self.claims.try_claim(key) {
            return Ok(());
        }
        let anchor_region = self.region(anchor)?;

        for &member in members {
            if member == anchor || self.visited.contains(u64::from(member)) {
                continue;
            }
            let region = self.region(member)?;
            PassStats::add(&stats.comparisons, 1);
            if kmer_distance(anchor_region, region, self.kmer_size) > self.cutoff {
                continue;
            }
            if self.clusters.cluster_id(member) != Some(cluster)
                && write_with_retry(stats, member, || self.clusters.reassign(member, cluster))
            {
                PassStats::add(&stats.assignments, 1);
            }
            self.visited.insert(u64::from(member));
        }
        self.visited.insert(u64::from(anchor));
        Ok(())
    }

    fn region(&self, id: AptamerId) -> Result<&'a [u8], ClusterError> {
        self.sequences
            .region(id)
            .ok_or(ClusterError::MissingSequence(id))
    }
}
