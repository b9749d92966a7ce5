//! Ranking of eligible aptamers by cumulative copy number.

use tracing::debug;

use crate::store::{AbundanceStore, AptamerId, SequenceStore};

/// Ids whose randomized region has exactly `region_size` bases, ascending.
pub fn eligible_ids(sequences: &dyn SequenceStore, region_size: usize) -> Vec<AptamerId> {
    sequences
        .ids()
        .filter(|&id| {
            sequences
                .bounds(id)
                .map_or(false, |bounds| bounds.len() == region_size)
        })
        .collect()
}

/// Order `eligible` by descending total count across all cycles.
///
/// Counts are merged against the sorted id array by binary search; ids
/// that never appear in any cycle keep a total of zero. Ties keep
/// ascending id order. Counts for ids outside `eligible` are ignored.
pub fn rank_by_abundance(
    eligible: &[AptamerId],
    abundance: &dyn AbundanceStore,
) -> Vec<AptamerId> {
    let mut sorted = eligible.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut totals = vec![0u64; sorted.len()];
    let mut ignored = 0usize;
    for cycle in 0..abundance.cycle_count() {
        for (id, count) in abundance.cycle(cycle) {
            match sorted.binary_search(&id) {
                Ok(idx) => totals[idx] += u64::from(count),
                Err(_) => ignored += 1,
            }
        }
    }
    if ignored > 0 {
        debug!(ignored, "abundance entries without an eligible aptamer");
    }

    let mut ranked: Vec<(AptamerId, u64)> = sorted.into_iter().zip(totals).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAbundanceStore, InMemorySequenceStore};

    #[test]
    fn eligibility_uses_region_length() {
        let mut store = InMemorySequenceStore::new();
        store.push(b"AACGTAA".to_vec(), 2..5);
        store.push(b"AACGTTAA".to_vec(), 2..6);
        store.push(b"AATTTAA".to_vec(), 2..5);
        assert_eq!(eligible_ids(&store, 3), vec![0, 2]);
    }

    #[test]
    fn ranking_sums_cycles() {
        let mut abundance = InMemoryAbundanceStore::new();
        abundance.add_cycle(vec![(0, 1), (1, 5), (2, 3)]);
        abundance.add_cycle(vec![(0, 10), (2, 3), (9, 100)]);
        let ranked = rank_by_abundance(&[2, 1, 0, 3], &abundance);
        // totals: 0 -> 11, 1 -> 5, 2 -> 6, 3 -> 0
        assert_eq!(ranked, vec![0, 2, 1, 3]);
    }

    #[test]
    fn ties_keep_id_order() {
        let mut abundance = InMemoryAbundanceStore::new();
        abundance.add_cycle(vec![(4, 2), (1, 2)]);
        assert_eq!(rank_by_abundance(&[4, 1], &abundance), vec![1, 4]);
    }
}
