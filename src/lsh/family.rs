use rand::Rng;

use super::{distinct_projections, LshError, Projection};

/// Projections drawn together for one clustering run.
///
/// No two members share `(start, step, dimension)`: colliding draws are
/// rejected and redrawn.
#[derive(Debug, Clone, Default)]
pub struct HashFamily {
    projections: Vec<Projection>,
}

impl HashFamily {
    /// Draw `size` pairwise-distinct projections.
    pub fn draw<R: Rng + ?Sized>(
        region_size: usize,
        dimension: usize,
        size: usize,
        rng: &mut R,
    ) -> Result<Self, LshError> {
        let mut family = Self {
            projections: Vec::with_capacity(size),
        };
        for _ in 0..size {
            family.draw_next(region_size, dimension, rng)?;
        }
        Ok(family)
    }

    /// Draw one more projection distinct from every existing member.
    pub fn draw_next<R: Rng + ?Sized>(
        &mut self,
        region_size: usize,
        dimension: usize,
        rng: &mut R,
    ) -> Result<&Projection, LshError> {
        let available = distinct_projections(region_size);
        if self.projections.len() >= available {
            return Err(LshError::FamilyExhausted(available));
        }
        loop {
            let candidate = Projection::draw(region_size, dimension, rng)?;
            if !self.contains(&candidate) {
                self.projections.push(candidate);
                break;
            }
        }
        Ok(&self.projections[self.projections.len() - 1])
    }

    fn contains(&self, candidate: &Projection) -> bool {
        self.projections
            .iter()
            .any(|member| member.signature() == candidate.signature())
    }

    /// Number of projections.
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    /// Whether the family is empty.
    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Projection used by the given iteration.
    pub fn get(&self, iteration: usize) -> Option<&Projection> {
        self.projections.get(iteration)
    }

    /// Iterate projections in draw order.
    pub fn iter(&self) -> std::slice::Iter<'_, Projection> {
        self.projections.iter()
    }
}
