//! First clustering iteration.
//!
//! Each bucket is handled by a single worker: the first unassigned member
//! becomes a seed with a fresh cluster id and absorbs every unassigned
//! bucket-mate within the cutoff. Seeding repeats until the bucket is
//! exhausted. Buckets are processed in no particular order.

use std::fmt;

use tracing::info;

use super::pipeline::{run_pipeline, write_with_retry, PassKind, PassReport, PassStats, PipelineSettings};
use super::ClusterIdCounter;
use crate::bucket::Buckets;
use crate::config::ClusterConfig;
use crate::distance::kmer_distance;
use crate::store::{AptamerId, ClusterStore, SequenceStore};
use crate::ClusterError;

/// Seeds clusters bucket by bucket.
pub struct SeedFormationPass<'a> {
    sequences: &'a dyn SequenceStore,
    clusters: &'a dyn ClusterStore,
    counter: &'a ClusterIdCounter,
    cutoff: f64,
    kmer_size: usize,
    settings: PipelineSettings,
}

impl fmt::Debug for SeedFormationPass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedFormationPass")
            .field("cutoff", &self.cutoff)
            .field("kmer_size", &self.kmer_size)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'a> SeedFormationPass<'a> {
    /// Create the pass; fresh ids come from `counter`.
    pub fn new(
        sequences: &'a dyn SequenceStore,
        clusters: &'a dyn ClusterStore,
        counter: &'a ClusterIdCounter,
        cutoff: f64,
        config: &ClusterConfig,
    ) -> Self {
        Self {
            sequences,
            clusters,
            counter,
            cutoff,
            kmer_size: config.kmer_size,
            settings: PipelineSettings::seed(config),
        }
    }

    /// Process every bucket concurrently.
    pub fn run(&self, buckets: &Buckets) -> Result<PassReport, ClusterError> {
        let stats = PassStats::default();
        run_pipeline(
            &self.settings,
            &stats,
            buckets.len(),
            buckets.iter().map(|(_, members)| members),
            |members| self.process_bucket(members, &stats),
        )?;

        let report = stats.report(PassKind::SeedFormation);
        info!(
            buckets = report.items,
            clusters = self.counter.allocated(),
            comparisons = report.comparisons,
            skipped = report.skipped,
            "seed formation finished"
        );
        Ok(report)
    }

    fn process_bucket(&self, members: &[AptamerId], stats: &PassStats) -> Result<(), ClusterError> {
        PassStats::add(&stats.sequences, members.len());

        for (idx, &seed) in members.iter().enumerate() {
            if self.clusters.contains(seed) {
                continue;
            }
            let cluster = self.counter.allocate();
            if !write_with_retry(stats, seed, || self.clusters.add_to_cluster(seed, cluster)) {
                continue;
            }
            PassStats::add(&stats.assignments, 1);

            let seed_region = self.region(seed)?;
            // Members before `idx` are already assigned.
            for &member in &members[idx + 1..] {
                if self.clusters.contains(member) {
                    continue;
                }
                let region = self.region(member)?;
                PassStats::add(&stats.comparisons, 1);
                if kmer_distance(seed_region, region, self.kmer_size) <= self.cutoff
                    && write_with_retry(stats, member, || self.clusters.add_to_cluster(member, cluster))
                {
                    PassStats::add(&stats.assignments, 1);
                }
            }
        }
        Ok(())
    }

    fn region(&self, id: AptamerId) -> Result<&'a [u8], ClusterError> {
        self.sequences
            .region(id)
            .ok_or(ClusterError::MissingSequence(id))
    }
}
