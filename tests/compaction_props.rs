use std::collections::{BTreeMap, BTreeSet};

use aptacluster::store::{ClusterStore, InMemoryClusterStore};
use aptacluster::IdCompactor;
use proptest::prelude::*;

fn store_from(clusters: &[u32]) -> InMemoryClusterStore {
    let store = InMemoryClusterStore::with_capacity(clusters.len());
    for (id, &cluster) in clusters.iter().enumerate() {
        store.add_to_cluster(id as u32, cluster).unwrap();
    }
    store
}

proptest! {
    #[test]
    fn compacted_ids_are_contiguous(clusters in proptest::collection::vec(1u32..500, 0..80)) {
        let store = store_from(&clusters);
        let result = IdCompactor::new().compact(&store).unwrap();

        let used: BTreeSet<u32> = store.assignments().map(|(_, c)| c).collect();
        let expected: BTreeSet<u32> = (1..=result.clusters as u32).collect();
        prop_assert_eq!(used, expected);
        prop_assert_eq!(result.clusters, clusters.iter().collect::<BTreeSet<_>>().len());
    }

    #[test]
    fn compaction_preserves_grouping_and_order(clusters in proptest::collection::vec(1u32..200, 1..60)) {
        let store = store_from(&clusters);
        IdCompactor::new().compact(&store).unwrap();

        let mut mapping = BTreeMap::new();
        for (id, after) in store.assignments() {
            let before = clusters[id as usize];
            let previous = mapping.insert(before, after);
            prop_assert!(previous.map_or(true, |p| p == after), "cluster {} split", before);
        }
        let afters: Vec<u32> = mapping.values().copied().collect();
        prop_assert!(afters.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn compaction_is_idempotent(clusters in proptest::collection::vec(1u32..100, 0..40)) {
        let store = store_from(&clusters);
        IdCompactor::new().compact(&store).unwrap();
        let once: Vec<_> = store.assignments().collect();
        let again = IdCompactor::new().compact(&store).unwrap();
        prop_assert_eq!(again.rewritten, 0);
        prop_assert_eq!(store.assignments().collect::<Vec<_>>(), once);
    }
}
