//! End-to-end clustering runs over synthetic pools.

mod common;

use std::collections::BTreeSet;

use aptacluster::engine::PassKind;
use aptacluster::store::{AptamerId, ClusterStore, InMemoryClusterStore, SequenceStore, StoreError};
use aptacluster::{
    cluster_members, kmer_distance, Buckets, ClusterConfig, ClusterEngine, ClusterIdCounter,
    SeedFormationPass,
};
use common::{family_pool, random_region, substitute, PoolBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_case::test_case;

const REGION: usize = 30;

fn config(seed: u64) -> ClusterConfig {
    ClusterConfig::for_region_size(REGION)
        .with_seed(seed)
        .with_max_workers(4)
}

fn partition(clusters: &InMemoryClusterStore) -> BTreeSet<Vec<AptamerId>> {
    cluster_members(clusters).into_values().collect()
}

#[test]
fn every_eligible_aptamer_ends_in_a_contiguous_cluster() {
    let pool = family_pool(7, 20, 5, REGION);
    let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());

    let engine = ClusterEngine::new(config(42)).unwrap();
    let summary = engine
        .run(&pool.sequences, &clusters, &pool.abundance)
        .unwrap();

    assert_eq!(summary.eligible, 120);
    assert!(pool.sequences.ids().all(|id| clusters.contains(id)));
    assert!(summary.clusters >= 1 && summary.clusters < summary.eligible);

    let ids: BTreeSet<_> = clusters.assignments().map(|(_, cluster)| cluster).collect();
    let expected: BTreeSet<_> = (1..=summary.clusters as u32).collect();
    assert_eq!(ids, expected);

    assert_eq!(summary.passes.len(), 5);
    assert_eq!(summary.passes[0].kind, PassKind::SeedFormation);
    assert!(summary.passes[1..]
        .iter()
        .all(|pass| pass.kind == PassKind::ConsensusMerge));
    assert_eq!(summary.skipped(), 0);
}

#[test]
fn store_is_read_only_after_the_run() {
    let pool = family_pool(3, 4, 2, REGION);
    let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());
    ClusterEngine::new(config(1))
        .unwrap()
        .run(&pool.sequences, &clusters, &pool.abundance)
        .unwrap();

    assert!(clusters.is_read_only());
    assert_eq!(clusters.add_to_cluster(0, 1), Err(StoreError::ReadOnly));
    assert_eq!(clusters.reassign(0, 1), Err(StoreError::ReadOnly));
}

#[test]
fn aptamers_with_another_region_length_stay_unassigned() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut pool = PoolBuilder::new();
    for _ in 0..10 {
        pool.add(&random_region(&mut rng, REGION), &[3]);
    }
    let short = pool.add(&random_region(&mut rng, REGION - 1), &[1000]);
    let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());

    let summary = ClusterEngine::new(config(9))
        .unwrap()
        .run(&pool.sequences, &clusters, &pool.abundance)
        .unwrap();

    assert_eq!(summary.eligible, 10);
    assert_eq!(clusters.cluster_id(short), None);
    assert_eq!(clusters.len(), 10);
}

#[test]
fn pool_without_eligible_aptamers_yields_no_clusters() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut pool = PoolBuilder::new();
    pool.add(&random_region(&mut rng, 20), &[4]);
    let clusters = InMemoryClusterStore::with_capacity(1);

    let summary = ClusterEngine::new(config(2))
        .unwrap()
        .run(&pool.sequences, &clusters, &pool.abundance)
        .unwrap();

    assert_eq!(summary.clusters, 0);
    assert!(clusters.is_empty());
    assert!(clusters.is_read_only());
}

struct MutantRun {
    distance: f64,
    cutoff: f64,
    together: bool,
}

/// Cluster a parent, its one-substitution mutant at `position` and unrelated
/// aptamers, with the cutoff estimated from single substitutions.
fn cluster_point_mutant(position: usize) -> MutantRun {
    let mut rng = StdRng::seed_from_u64(21);
    let mut pool = PoolBuilder::new();
    let parent_region = random_region(&mut rng, REGION);
    let mutant_region = substitute(&parent_region, position, &mut rng);
    let parent = pool.add(&parent_region, &[500]);
    let mutant = pool.add(&mutant_region, &[10]);
    for _ in 0..30 {
        pool.add(&random_region(&mut rng, REGION), &[1]);
    }

    let config = config(13)
        .with_kmer_size(6)
        .with_iterations(8)
        .with_cutoff_sampling(1, 50);
    let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());
    let summary = ClusterEngine::new(config)
        .unwrap()
        .run(&pool.sequences, &clusters, &pool.abundance)
        .unwrap();

    MutantRun {
        distance: kmer_distance(&parent_region, &mutant_region, 6),
        cutoff: summary.cutoff,
        together: clusters.cluster_id(parent) == clusters.cluster_id(mutant),
    }
}

// With k=6 over 30 bases, 24 windows are compared. A substitution at
// position p changes the windows starting in [p-5, p] that lie below 24.
#[test_case(0 ; "first base")]
#[test_case(3 ; "four windows from the start")]
#[test_case(26 ; "three windows from the end")]
#[test_case(29 ; "last base outside every window")]
fn edge_substitution_joins_its_parent(position: usize) {
    let run = cluster_point_mutant(position);
    assert!(
        run.distance <= run.cutoff,
        "distance {} above cutoff {}",
        run.distance,
        run.cutoff
    );
    assert!(run.together);
}

#[test_case(10 ; "interior")]
#[test_case(15 ; "centre")]
fn interior_substitution_exceeds_the_mean_cutoff(position: usize) {
    let run = cluster_point_mutant(position);
    assert!(
        run.distance > run.cutoff,
        "distance {} within cutoff {}",
        run.distance,
        run.cutoff
    );
    assert!(!run.together);
}

#[test]
fn seed_absorbs_both_neighbours_even_when_they_are_far_apart() {
    let mut pool = PoolBuilder::new();
    let a = pool.add(b"TTCTTGCAAGCT", &[1]);
    let b = pool.add(b"ACGTTGCAAGCT", &[1]);
    let c = pool.add(b"ACGTTGCATTTT", &[1]);
    let region = |id| pool.sequences.region(id).unwrap();

    let cutoff = 0.1;
    assert!(kmer_distance(region(b), region(a), 3) <= cutoff);
    assert!(kmer_distance(region(b), region(c), 3) <= cutoff);
    assert!(kmer_distance(region(a), region(c), 3) > cutoff);

    let config = ClusterConfig::for_region_size(12)
        .with_dimension(4)
        .with_kmer_size(3);
    let clusters = InMemoryClusterStore::with_capacity(3);
    let counter = ClusterIdCounter::new();
    SeedFormationPass::new(&pool.sequences, &clusters, &counter, cutoff, &config)
        .run(&Buckets::from_groups(vec![vec![b, a, c]]))
        .unwrap();

    let seed = clusters.cluster_id(b);
    assert!(seed.is_some());
    assert_eq!(clusters.cluster_id(a), seed);
    assert_eq!(clusters.cluster_id(c), seed);
    assert_eq!(counter.allocated(), 1);
}

#[test]
fn single_worker_runs_are_reproducible() {
    let pool = family_pool(11, 10, 4, REGION);
    let run = || {
        let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());
        ClusterEngine::new(config(77).with_max_workers(1))
            .unwrap()
            .run(&pool.sequences, &clusters, &pool.abundance)
            .unwrap();
        partition(&clusters)
    };
    assert_eq!(run(), run());
}

#[test]
fn too_many_iterations_are_rejected() {
    let config = ClusterConfig::for_region_size(10)
        .with_dimension(4)
        .with_iterations(500);
    assert!(ClusterEngine::new(config).is_err());
}
