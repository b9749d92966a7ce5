//! Clustering passes and their orchestration.

mod compact;
mod counter;
mod merge;
mod pipeline;
mod seed;

pub use compact::{Compaction, IdCompactor};
pub use counter::{ClusterIdCounter, FIRST_CLUSTER_ID};
pub use merge::ConsensusMergePass;
pub use pipeline::{PassKind, PassReport};
pub use seed::SeedFormationPass;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::abundance::{eligible_ids, rank_by_abundance};
use crate::bucket::BucketPartitioner;
use crate::config::ClusterConfig;
use crate::distance::CutoffEstimator;
use crate::lsh::HashFamily;
use crate::store::{AbundanceStore, AptamerId, ClusterId, ClusterStore, SequenceStore};
use crate::ClusterError;

/// Outcome of a full clustering run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterSummary {
    /// Similarity cutoff used by every pass (0 when nothing was clustered).
    pub cutoff: f64,
    /// Aptamers with the target region length.
    pub eligible: usize,
    /// Clusters after compaction.
    pub clusters: usize,
    /// One report per iteration, in order.
    pub passes: Vec<PassReport>,
}

impl ClusterSummary {
    /// Assignments abandoned across all passes.
    pub fn skipped(&self) -> usize {
        self.passes.iter().map(|pass| pass.skipped).sum()
    }

    /// Distance computations across all passes.
    pub fn comparisons(&self) -> usize {
        self.passes.iter().map(|pass| pass.comparisons).sum()
    }
}

/// Runs ranking, cutoff estimation, every pass and compaction.
#[derive(Debug, Clone)]
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    /// Validate `config` and build the engine.
    pub fn new(config: ClusterConfig) -> Result<Self, ClusterError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster every eligible aptamer of `sequences` into `clusters`.
    ///
    /// Returns once compaction has finished and `clusters` is read-only.
    pub fn run(
        &self,
        sequences: &dyn SequenceStore,
        clusters: &dyn ClusterStore,
        abundance: &dyn AbundanceStore,
    ) -> Result<ClusterSummary, ClusterError> {
        let config = &self.config;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let eligible = eligible_ids(sequences, config.randomized_region_size);
        let ranked = rank_by_abundance(&eligible, abundance);
        info!(
            total = sequences.len(),
            eligible = ranked.len(),
            region_size = config.randomized_region_size,
            "ranked aptamers by abundance"
        );

        let family = HashFamily::draw(
            config.randomized_region_size,
            config.lsh_dimension,
            config.lsh_iterations,
            &mut rng,
        )?;

        let estimator = CutoffEstimator::new(sequences, &ranked, config.kmer_size);
        let Some(cutoff) = estimator.estimate(
            config.kmer_cutoff_samples,
            config.kmer_cutoff_mutations,
            &mut rng,
        )?
        else {
            warn!("no eligible aptamers, nothing to cluster");
            clusters.set_read_only();
            return Ok(ClusterSummary {
                cutoff: 0.0,
                eligible: 0,
                clusters: 0,
                passes: Vec::new(),
            });
        };
        info!(cutoff, mutations = config.kmer_cutoff_mutations, "similarity cutoff");

        let counter = ClusterIdCounter::new();
        let partitioner = BucketPartitioner::new(sequences, config.randomized_region_size);
        let mut merge = ConsensusMergePass::new(sequences, clusters, cutoff, config, ranked.len());
        let mut passes = Vec::with_capacity(family.len());

        for (iteration, projection) in family.iter().enumerate() {
            info!(
                iteration = iteration + 1,
                of = family.len(),
                start = projection.start(),
                step = projection.step(),
                dimension = projection.dimension(),
                "hashing aptamers"
            );
            let buckets = partitioner.partition(projection, &ranked)?;
            let report = if iteration == 0 {
                SeedFormationPass::new(sequences, clusters, &counter, cutoff, config).run(&buckets)?
            } else {
                merge.run(projection, &buckets, &ranked)?
            };
            passes.push(report);
        }

        let compaction = IdCompactor::new().compact(clusters)?;
        clusters.set_read_only();

        let summary = ClusterSummary {
            cutoff,
            eligible: ranked.len(),
            clusters: compaction.clusters,
            passes,
        };
        if summary.skipped() > 0 {
            warn!(skipped = summary.skipped(), "some assignments were skipped");
        }
        info!(clusters = summary.clusters, "clustering finished");
        Ok(summary)
    }
}

/// Members of every cluster, keyed by cluster id, in ascending aptamer id order.
pub fn cluster_members(clusters: &dyn ClusterStore) -> BTreeMap<ClusterId, Vec<AptamerId>> {
    let mut members: BTreeMap<ClusterId, Vec<AptamerId>> = BTreeMap::new();
    for (id, cluster) in clusters.assignments() {
        members.entry(cluster).or_default().push(id);
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        InMemoryAbundanceStore, InMemoryClusterStore, InMemorySequenceStore, StoreError,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Accepts no assignment; remembers finalisation.
    #[derive(Default)]
    struct RejectingStore {
        read_only: AtomicBool,
    }

    impl ClusterStore for RejectingStore {
        fn add_to_cluster(&self, _: AptamerId, _: ClusterId) -> Result<(), StoreError> {
            Err(StoreError::IdOutOfRange { id: 0, capacity: 0 })
        }

        fn cluster_id(&self, _: AptamerId) -> Option<ClusterId> {
            None
        }

        fn reassign(&self, _: AptamerId, _: ClusterId) -> Result<(), StoreError> {
            Err(StoreError::IdOutOfRange { id: 0, capacity: 0 })
        }

        fn assignments(&self) -> Box<dyn Iterator<Item = (AptamerId, ClusterId)> + '_> {
            Box::new(std::iter::empty())
        }

        fn set_read_only(&self) {
            self.read_only.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn invalid_configuration_fails_before_running() {
        let config = ClusterConfig::for_region_size(6);
        assert!(matches!(
            ClusterEngine::new(config),
            Err(ClusterError::Config(_))
        ));
    }

    #[test]
    fn empty_pool_finishes_read_only() {
        let sequences = InMemorySequenceStore::new();
        let clusters = InMemoryClusterStore::with_capacity(0);
        let abundance = InMemoryAbundanceStore::new();
        let engine = ClusterEngine::new(ClusterConfig::default().with_seed(1)).unwrap();

        let summary = engine.run(&sequences, &clusters, &abundance).unwrap();
        assert_eq!(summary.clusters, 0);
        assert!(summary.passes.is_empty());
        assert!(clusters.is_read_only());
    }

    #[test]
    fn skipped_assignments_reach_the_summary() {
        let mut sequences = InMemorySequenceStore::new();
        let abundance = InMemoryAbundanceStore::new();
        for seq in [b"ACGTTGCAAGCT", b"ACGTTGCAAGCA", b"TTGACCATGGCA", b"GGATCCTTAGCA"] {
            sequences.push(seq.to_vec(), 0..12);
        }
        let clusters = RejectingStore::default();
        let config = ClusterConfig::for_region_size(12)
            .with_dimension(4)
            .with_seed(5)
            .with_max_workers(2);

        let summary = ClusterEngine::new(config)
            .unwrap()
            .run(&sequences, &clusters, &abundance)
            .unwrap();

        assert_eq!(summary.passes[0].skipped, 4);
        assert!(summary.passes[1..].iter().all(|pass| pass.skipped == 0));
        assert_eq!(summary.skipped(), 4);
        assert_eq!(summary.clusters, 0);
        assert!(clusters.read_only.load(Ordering::SeqCst));
    }

    #[test]
    fn members_are_grouped_by_cluster() {
        let clusters = InMemoryClusterStore::with_capacity(4);
        clusters.add_to_cluster(0, 2).unwrap();
        clusters.add_to_cluster(1, 1).unwrap();
        clusters.add_to_cluster(3, 2).unwrap();
        let members = cluster_members(&clusters);
        assert_eq!(members[&1], vec![1]);
        assert_eq!(members[&2], vec![0, 3]);
    }
}
