//! # LSH clustering of HT-SELEX aptamer pools
//!
//! Groups millions of short aptamers into clusters of mutually similar
//! sequences without comparing every pair. Each iteration hashes the
//! randomized region of every eligible aptamer under a random
//! [`Projection`]; only aptamers that land in the same bucket are compared
//! with the k-mer frequency distance.
//!
//! ## Pipeline
//!
//! 1. **Ranking**: eligible aptamers are ordered by cumulative abundance.
//! 2. **Cutoff**: a similarity cutoff is estimated from random point mutants.
//! 3. **Seed formation**: the first projection seeds clusters bucket by bucket.
//! 4. **Consensus merge**: every further projection merges clusters across buckets.
//! 5. **Compaction**: cluster ids are renumbered into `1..=K`.
//!
//! ## Usage Example
//!
//! ```no_run
//! use aptacluster::{ClusterConfig, ClusterEngine};
//! use aptacluster::store::{InMemoryAbundanceStore, InMemoryClusterStore, InMemorySequenceStore};
//!
//! let mut sequences = InMemorySequenceStore::new();
//! sequences.push_with_primers(b"GGGACGTTAGCATGCAAGTCCCC".to_vec(), 4, 4);
//! let abundance = InMemoryAbundanceStore::new();
//! let clusters = InMemoryClusterStore::with_capacity(1);
//!
//! let config = ClusterConfig::for_region_size(15).with_dimension(5);
//! let engine = ClusterEngine::new(config)?;
//! let summary = engine.run(&sequences, &clusters, &abundance)?;
//! println!("{} clusters", summary.clusters);
//! # Ok::<(), aptacluster::ClusterError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod abundance; // Abundance ranking
pub mod bucket;    // Bucket partitioning
pub mod config;    // Run configuration
pub mod distance;  // k-mer distance and cutoff
pub mod engine;    // Clustering passes and orchestration
pub mod filter;    // Concurrent membership sets
pub mod lsh;       // Projections and hash families
pub mod store;     // Storage interfaces

// Re-exports for convenience
pub use bucket::{BucketPartitioner, Buckets};
pub use config::{ClusterConfig, ConfigError};
pub use distance::{kmer_distance, CutoffEstimator};
pub use engine::{
    cluster_members, ClusterEngine, ClusterIdCounter, ClusterSummary, ConsensusMergePass,
    IdCompactor, PassReport, SeedFormationPass,
};
pub use lsh::{HashFamily, LshError, Projection};
pub use store::{AptamerId, ClusterId, StoreError};

use thiserror::Error;

/// Errors that abort a clustering run.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Projection family could not be drawn.
    #[error("hash family error: {0}")]
    Lsh(#[from] LshError),

    /// Store failure outside the retried assignment path.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An id handed to the engine is missing from the sequence store.
    #[error("aptamer {0} referenced by a bucket is missing from the sequence store")]
    MissingSequence(AptamerId),

    /// A worker thread panicked; the pass result is incomplete.
    #[error("{pass} worker panicked: {message}")]
    WorkerPanicked {
        /// Pass in which the panic occurred.
        pass: String,
        /// Panic payload, if it was a string.
        message: String,
    },
}
