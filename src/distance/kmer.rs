use hashbrown::HashMap;

/// Distance reported when too few distinct k-mers exist to compare profiles.
pub const MAX_DISTANCE: f64 = 2.0;

/// Squared Euclidean distance between the k-mer frequency profiles of `a` and `b`.
///
/// Both sequences contribute the same `min(len) - k` windows, so each
/// profile is normalized by that window count. Fewer than two distinct
/// k-mers across both sequences yields [`MAX_DISTANCE`].
pub fn kmer_distance(a: &[u8], b: &[u8], k: usize) -> f64 {
    let len = a.len().min(b.len());
    if k == 0 || len <= k {
        return MAX_DISTANCE;
    }
    let windows = len - k;

    let mut counts: HashMap<&[u8], (u32, u32)> = HashMap::with_capacity(windows * 2);
    for start in 0..windows {
        counts.entry(&a[start..start + k]).or_default().0 += 1;
        counts.entry(&b[start..start + k]).or_default().1 += 1;
    }
    if counts.len() < 2 {
        return MAX_DISTANCE;
    }

    // Integer accumulation keeps the result independent of map iteration order.
    let squared: u64 = counts
        .values()
        .map(|&(in_a, in_b)| {
            let diff = u64::from(in_a.abs_diff(in_b));
            diff * diff
        })
        .sum();
    let norm = windows as f64;
    squared as f64 / (norm * norm)
}
