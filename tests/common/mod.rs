//! Synthetic aptamer pools for integration tests.

#![allow(dead_code)]

use aptacluster::store::{AptamerId, InMemoryAbundanceStore, InMemorySequenceStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const PRIMER5: &[u8] = b"GGGAGACAAG";
pub const PRIMER3: &[u8] = b"TTCGACAGGA";

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub fn random_region(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| BASES[rng.gen_range(0..4)]).collect()
}

/// `region` with the base at `position` replaced by a different one.
pub fn substitute(region: &[u8], position: usize, rng: &mut StdRng) -> Vec<u8> {
    let mut out = region.to_vec();
    loop {
        let base = BASES[rng.gen_range(0..4)];
        if base != region[position] {
            out[position] = base;
            return out;
        }
    }
}

pub fn with_primers(region: &[u8]) -> Vec<u8> {
    let mut sequence = Vec::with_capacity(PRIMER5.len() + region.len() + PRIMER3.len());
    sequence.extend_from_slice(PRIMER5);
    sequence.extend_from_slice(region);
    sequence.extend_from_slice(PRIMER3);
    sequence
}

/// Pool under construction; the region is always flanked by the fixed primers.
#[derive(Debug, Default)]
pub struct PoolBuilder {
    pub sequences: InMemorySequenceStore,
    pub abundance: InMemoryAbundanceStore,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, region: &[u8], counts: &[u32]) -> AptamerId {
        let id = self
            .sequences
            .push_with_primers(with_primers(region), PRIMER5.len(), PRIMER3.len())
            .expect("primers fit");
        for (cycle, &count) in counts.iter().enumerate() {
            self.abundance.record(cycle, id, count);
        }
        id
    }
}

/// `families` random parents, each followed by `mutants` one-substitution
/// variants. Parents are the most abundant member of their family.
pub fn family_pool(seed: u64, families: usize, mutants: usize, region_len: usize) -> PoolBuilder {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pool = PoolBuilder::new();
    for _ in 0..families {
        let parent = random_region(&mut rng, region_len);
        pool.add(&parent, &[50, 200]);
        for _ in 0..mutants {
            let position = rng.gen_range(0..region_len);
            let mutant = substitute(&parent, position, &mut rng);
            let count = rng.gen_range(1..20);
            pool.add(&mutant, &[count]);
        }
    }
    pool
}
