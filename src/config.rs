//! Run configuration for the clustering engine.
//!
//! All parameters are validated up front by [`ClusterConfig::validate`] so a
//! bad value aborts the run before any pass touches the cluster store.

use std::time::Duration;

use thiserror::Error;

use crate::lsh::{candidate_steps, distinct_projections};

/// Errors raised while validating a [`ClusterConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The randomized region admits no co-prime step for projections.
    #[error("randomized region size {0} admits no co-prime projection step")]
    RegionTooSmall(usize),

    /// LSH dimension must lie in `1..=region_size`.
    #[error("LSH dimension {dimension} must be between 1 and region size {region_size}")]
    InvalidDimension {
        /// Requested dimension.
        dimension: usize,
        /// Configured randomized region size.
        region_size: usize,
    },

    /// More iterations requested than distinct projections exist.
    #[error("{requested} LSH iterations requested but only {available} distinct projections exist")]
    TooManyIterations {
        /// Requested number of iterations.
        requested: usize,
        /// Number of distinct `(start, step)` pairs for the region size.
        available: usize,
    },

    /// k-mer size must lie in `1..region_size`.
    #[error("k-mer size {kmer_size} must be between 1 and {max}")]
    InvalidKmerSize {
        /// Requested k.
        kmer_size: usize,
        /// Largest usable k for the region size.
        max: usize,
    },

    /// Any other parameter outside its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters controlling one clustering run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterConfig {
    /// Only sequences whose randomized region has exactly this length are clustered.
    pub randomized_region_size: usize,

    /// Number of positions sampled by each projection.
    pub lsh_dimension: usize,

    /// Number of projections (first one seeds, the rest merge).
    pub lsh_iterations: usize,

    /// k-mer length used by the distance.
    pub kmer_size: usize,

    /// Point substitutions per mutant when estimating the cutoff.
    pub kmer_cutoff_mutations: usize,

    /// Number of sampled sequences when estimating the cutoff.
    pub kmer_cutoff_samples: usize,

    /// Work queue capacity during seed formation.
    pub seed_queue_capacity: usize,

    /// Work queue capacity during merge passes.
    pub merge_queue_capacity: usize,

    /// Upper bound on concurrently active tasks (producer included).
    pub max_workers: usize,

    /// RNG seed for projections and cutoff sampling; `None` draws from entropy.
    pub seed: Option<u64>,

    /// How often the orchestrator reports pass progress.
    #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
    pub progress_interval: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            randomized_region_size: 40,
            lsh_dimension: 8,
            lsh_iterations: 5,
            kmer_size: 3,
            kmer_cutoff_mutations: 4,
            kmer_cutoff_samples: 100,
            seed_queue_capacity: 500,
            merge_queue_capacity: 1000,
            max_workers: 32,
            seed: None,
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl ClusterConfig {
    /// Default configuration for a given randomized region size.
    pub fn for_region_size(randomized_region_size: usize) -> Self {
        Self {
            randomized_region_size,
            ..Self::default()
        }
    }

    /// Set the LSH dimension.
    pub fn with_dimension(mut self, lsh_dimension: usize) -> Self {
        self.lsh_dimension = lsh_dimension;
        self
    }

    /// Set the number of LSH iterations.
    pub fn with_iterations(mut self, lsh_iterations: usize) -> Self {
        self.lsh_iterations = lsh_iterations;
        self
    }

    /// Set the k-mer size.
    pub fn with_kmer_size(mut self, kmer_size: usize) -> Self {
        self.kmer_size = kmer_size;
        self
    }

    /// Set cutoff estimation parameters.
    pub fn with_cutoff_sampling(mut self, mutations: usize, samples: usize) -> Self {
        self.kmer_cutoff_mutations = mutations;
        self.kmer_cutoff_samples = samples;
        self
    }

    /// Set both work queue capacities.
    pub fn with_queue_capacities(mut self, seed: usize, merge: usize) -> Self {
        self.seed_queue_capacity = seed;
        self.merge_queue_capacity = merge;
        self
    }

    /// Cap the number of concurrently active tasks.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the progress reporting interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Number of concurrently active tasks: `min(available parallelism, max_workers)`.
    pub fn worker_count(&self) -> usize {
        num_cpus::get().min(self.max_workers).max(1)
    }

    /// Check every parameter, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region_size = self.randomized_region_size;
        if region_size < 2 || candidate_steps(region_size).is_empty() {
            return Err(ConfigError::RegionTooSmall(region_size));
        }
        if self.lsh_dimension == 0 || self.lsh_dimension > region_size {
            return Err(ConfigError::InvalidDimension {
                dimension: self.lsh_dimension,
                region_size,
            });
        }
        if self.lsh_iterations == 0 {
            return Err(ConfigError::Invalid(
                "at least one LSH iteration is required".to_string(),
            ));
        }
        let available = distinct_projections(region_size);
        if self.lsh_iterations > available {
            return Err(ConfigError::TooManyIterations {
                requested: self.lsh_iterations,
                available,
            });
        }
        if self.kmer_size == 0 || self.kmer_size >= region_size {
            return Err(ConfigError::InvalidKmerSize {
                kmer_size: self.kmer_size,
                max: region_size - 1,
            });
        }
        if self.kmer_cutoff_mutations == 0 || self.kmer_cutoff_mutations > region_size {
            return Err(ConfigError::Invalid(format!(
                "cutoff mutations {} must be between 1 and {}",
                self.kmer_cutoff_mutations, region_size
            )));
        }
        if self.kmer_cutoff_samples == 0 {
            return Err(ConfigError::Invalid(
                "cutoff samples must be > 0".to_string(),
            ));
        }
        if self.seed_queue_capacity == 0 || self.merge_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue capacities must be > 0".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max workers must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_configuration_is_valid() {
        assert!(ClusterConfig::default().validate().is_ok());
    }

    #[test_case(3 ; "no step in range")]
    #[test_case(4 ; "only even step")]
    #[test_case(6 ; "steps share factors")]
    fn degenerate_region_sizes_are_rejected(region_size: usize) {
        let config = ClusterConfig::for_region_size(region_size)
            .with_dimension(1)
            .with_iterations(1)
            .with_kmer_size(1)
            .with_cutoff_sampling(1, 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::RegionTooSmall(region_size))
        );
    }

    #[test]
    fn dimension_larger_than_region_is_rejected() {
        let config = ClusterConfig::for_region_size(10).with_dimension(11);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimension { dimension: 11, .. })
        ));
    }

    #[test]
    fn kmer_as_long_as_region_is_rejected() {
        let config = ClusterConfig::for_region_size(10)
            .with_dimension(4)
            .with_kmer_size(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKmerSize { kmer_size: 10, max: 9 })
        ));
    }

    #[test]
    fn iterations_beyond_distinct_projections_are_rejected() {
        // L = 5 admits steps {2, 3}: 10 distinct projections.
        let config = ClusterConfig::for_region_size(5)
            .with_dimension(2)
            .with_kmer_size(2)
            .with_cutoff_sampling(1, 1)
            .with_iterations(11);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyIterations {
                requested: 11,
                available: 10
            })
        );
    }

    #[test]
    fn worker_count_respects_cap() {
        let config = ClusterConfig::default().with_max_workers(1);
        assert_eq!(config.worker_count(), 1);
    }
}
