use std::fmt;

use rand::seq::index;
use rand::Rng;
use tracing::debug;

use super::kmer_distance;
use crate::config::ConfigError;
use crate::store::{AptamerId, SequenceStore};
use crate::ClusterError;

/// Mutants generated per sampled sequence.
pub const MUTANTS_PER_SAMPLE: usize = 100;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Monte-Carlo estimate of the distance between a sequence and its point mutants.
///
/// Two aptamers are considered similar when their distance does not exceed
/// the mean distance observed between random eligible aptamers and copies
/// carrying a fixed number of substitutions.
pub struct CutoffEstimator<'a> {
    sequences: &'a dyn SequenceStore,
    eligible: &'a [AptamerId],
    kmer_size: usize,
}

impl fmt::Debug for CutoffEstimator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CutoffEstimator")
            .field("eligible", &self.eligible.len())
            .field("kmer_size", &self.kmer_size)
            .finish()
    }
}

impl<'a> CutoffEstimator<'a> {
    /// Create an estimator sampling from `eligible`.
    pub fn new(sequences: &'a dyn SequenceStore, eligible: &'a [AptamerId], kmer_size: usize) -> Self {
        Self {
            sequences,
            eligible,
            kmer_size,
        }
    }

    /// Mean distance over `samples × MUTANTS_PER_SAMPLE` mutants carrying
    /// exactly `mutations` substitutions each.
    ///
    /// Returns `Ok(None)` when there is nothing to sample from.
    pub fn estimate<R: Rng + ?Sized>(
        &self,
        samples: usize,
        mutations: usize,
        rng: &mut R,
    ) -> Result<Option<f64>, ClusterError> {
        if self.eligible.is_empty() || samples == 0 {
            return Ok(None);
        }

        let mut total = 0.0;
        for _ in 0..samples {
            let id = self.eligible[rng.gen_range(0..self.eligible.len())];
            let region = self
                .sequences
                .region(id)
                .ok_or(ClusterError::MissingSequence(id))?;
            if mutations > region.len() {
                return Err(ConfigError::Invalid(format!(
                    "{} mutations exceed region length {}",
                    mutations,
                    region.len()
                ))
                .into());
            }
            for _ in 0..MUTANTS_PER_SAMPLE {
                let mutant = mutate(region, mutations, rng);
                total += kmer_distance(region, &mutant, self.kmer_size);
            }
        }

        let cutoff = total / (samples * MUTANTS_PER_SAMPLE) as f64;
        debug!(samples, mutations, cutoff, "estimated k-mer cutoff");
        Ok(Some(cutoff))
    }
}

/// Copy of `region` with exactly `mutations` substitutions at distinct positions.
///
/// Every substituted base differs from the original one.
///
/// # Panics
/// Panics if `mutations > region.len()`.
pub fn mutate<R: Rng + ?Sized>(region: &[u8], mutations: usize, rng: &mut R) -> Vec<u8> {
    let mut mutant = region.to_vec();
    for position in index::sample(rng, region.len(), mutations) {
        let original = mutant[position];
        let replacement = loop {
            let base = BASES[rng.gen_range(0..BASES.len())];
            if base != original.to_ascii_uppercase() {
                break base;
            }
        };
        mutant[position] = replacement;
    }
    mutant
}
