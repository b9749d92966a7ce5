use std::ops::Range;

use rand::Rng;

use super::{candidate_steps, LshError};

/// One LSH function: a fixed set of sampled offsets inside the randomized region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    region_size: usize,
    dimension: usize,
    start: usize,
    step: usize,
    /// Sorted ascending.
    offsets: Vec<usize>,
}

impl Projection {
    /// Draw a random projection.
    ///
    /// The start offset is uniform in `[0, L)` and the step uniform among the
    /// integers of `[2, L-2]` co-prime to `L`. A region of length 1 uses step 1.
    pub fn draw<R: Rng + ?Sized>(
        region_size: usize,
        dimension: usize,
        rng: &mut R,
    ) -> Result<Self, LshError> {
        check_dimension(region_size, dimension)?;
        let step = if region_size == 1 {
            1
        } else {
            let steps = candidate_steps(region_size);
            if steps.is_empty() {
                return Err(LshError::NoCoprimeStep(region_size));
            }
            steps[rng.gen_range(0..steps.len())]
        };
        let start = rng.gen_range(0..region_size);
        Self::from_parts(region_size, dimension, start, step)
    }

    /// Build a projection from explicit parameters.
    pub fn from_parts(
        region_size: usize,
        dimension: usize,
        start: usize,
        step: usize,
    ) -> Result<Self, LshError> {
        check_dimension(region_size, dimension)?;
        let valid_step = if region_size == 1 {
            step == 1
        } else {
            candidate_steps(region_size).contains(&step)
        };
        if start >= region_size || !valid_step {
            return Err(LshError::InvalidParameters {
                start,
                step,
                region_size,
            });
        }

        let mut offsets = Vec::with_capacity(dimension);
        let mut offset = start;
        offsets.push(offset);
        for _ in 1..dimension {
            offset = (offset + step) % region_size;
            offsets.push(offset);
        }
        offsets.sort_unstable();

        Ok(Self {
            region_size,
            dimension,
            start,
            step,
            offsets,
        })
    }

    /// Number of sampled positions.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// First sampled offset before sorting.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Distance between consecutive samples modulo the region length.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Sampled offsets, ascending.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Identity of the projection within a family.
    pub fn signature(&self) -> (usize, usize, usize) {
        (self.start, self.step, self.dimension)
    }

    /// Bases of the randomized region at the sampled offsets, concatenated.
    ///
    /// Returns `None` when the region does not have the projection's length.
    pub fn fingerprint(&self, sequence: &[u8], bounds: Range<usize>) -> Option<Vec<u8>> {
        let region = sequence.get(bounds)?;
        if region.len() != self.region_size {
            return None;
        }
        Some(self.offsets.iter().map(|&offset| region[offset]).collect())
    }

    /// Integer bucket key derived from the fingerprint.
    pub fn bucket_key(&self, sequence: &[u8], bounds: Range<usize>) -> Option<u64> {
        self.fingerprint(sequence, bounds).map(|fp| hash_fingerprint(&fp))
    }
}

fn hash_fingerprint(fingerprint: &[u8]) -> u64 {
    let digest = blake3::hash(fingerprint);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(word)
}

fn check_dimension(region_size: usize, dimension: usize) -> Result<(), LshError> {
    if dimension == 0 || dimension > region_size {
        return Err(LshError::InvalidDimension {
            dimension,
            region_size,
        });
    }
    Ok(())
}
