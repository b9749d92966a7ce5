//! Locality-sensitive hashing over the randomized region.
//!
//! A [`Projection`] samples `dimension` positions of the region, spaced by a
//! step co-prime to the region length, and concatenates the bases found
//! there. Sequences that agree on the sampled positions share a bucket.

mod family;
mod projection;

pub use family::HashFamily;
pub use projection::Projection;

use thiserror::Error;

/// Errors raised while drawing projections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LshError {
    /// No integer in `[2, L-2]` is co-prime to the region length.
    #[error("no co-prime step exists for region length {0}")]
    NoCoprimeStep(usize),

    /// Dimension outside `1..=region_size`.
    #[error("dimension {dimension} invalid for region length {region_size}")]
    InvalidDimension {
        /// Requested dimension.
        dimension: usize,
        /// Region length.
        region_size: usize,
    },

    /// Explicit parameters do not describe a valid projection.
    #[error("invalid projection start={start} step={step} for region length {region_size}")]
    InvalidParameters {
        /// Start offset.
        start: usize,
        /// Step value.
        step: usize,
        /// Region length.
        region_size: usize,
    },

    /// Every distinct projection has already been drawn into the family.
    #[error("hash family exhausted after {0} distinct projections")]
    FamilyExhausted(usize),
}

/// Steps in `[2, L-2]` that are co-prime to `region_size`.
pub fn candidate_steps(region_size: usize) -> Vec<usize> {
    if region_size < 4 {
        return Vec::new();
    }
    (2..=region_size - 2)
        .filter(|&step| gcd(step, region_size) == 1)
        .collect()
}

/// Number of distinct `(start, step)` pairs for a region length.
pub fn distinct_projections(region_size: usize) -> usize {
    match region_size {
        0 => 0,
        1 => 1,
        _ => region_size * candidate_steps(region_size).len(),
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
