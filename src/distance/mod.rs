//! k-mer frequency distance and the Monte-Carlo similarity cutoff.

mod cutoff;
mod kmer;

pub use cutoff::{mutate, CutoffEstimator, MUTANTS_PER_SAMPLE};
pub use kmer::{kmer_distance, MAX_DISTANCE};
