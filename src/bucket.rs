//! Grouping of aptamers by projection fingerprint.

use std::fmt;

use hashbrown::HashMap;
use tracing::debug;

use crate::lsh::Projection;
use crate::store::{AptamerId, SequenceStore};
use crate::ClusterError;

/// Aptamers grouped by bucket key for one iteration.
///
/// Members of a bucket keep the order in which they were partitioned
/// (descending abundance).
#[derive(Debug, Default, Clone)]
pub struct Buckets {
    map: HashMap<u64, Vec<AptamerId>>,
    processed: usize,
    skipped: usize,
}

impl Buckets {
    /// Build buckets from explicit member lists; keys are the list indices.
    pub fn from_groups(groups: Vec<Vec<AptamerId>>) -> Self {
        let processed = groups.iter().map(Vec::len).sum();
        let map = groups
            .into_iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(key, members)| (key as u64, members))
            .collect();
        Self {
            map,
            processed,
            skipped: 0,
        }
    }

    /// Members of the bucket with the given key.
    pub fn get(&self, key: u64) -> Option<&[AptamerId]> {
        self.map.get(&key).map(Vec::as_slice)
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no aptamer was bucketed.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Aptamers placed into a bucket.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Aptamers skipped because of a mismatched region length.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Iterate `(key, members)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[AptamerId])> + '_ {
        self.map.iter().map(|(&key, members)| (key, members.as_slice()))
    }

    /// Size of the largest bucket.
    pub fn largest(&self) -> usize {
        self.map.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// Applies a projection to every ranked aptamer.
pub struct BucketPartitioner<'a> {
    sequences: &'a dyn SequenceStore,
    region_size: usize,
}

impl fmt::Debug for BucketPartitioner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketPartitioner")
            .field("sequences", &self.sequences.len())
            .field("region_size", &self.region_size)
            .finish()
    }
}

impl<'a> BucketPartitioner<'a> {
    /// Create a partitioner for aptamers with the given region length.
    pub fn new(sequences: &'a dyn SequenceStore, region_size: usize) -> Self {
        Self {
            sequences,
            region_size,
        }
    }

    /// Bucket key of one aptamer, or `None` if its region has the wrong length.
    pub fn key_of(
        &self,
        projection: &Projection,
        id: AptamerId,
    ) -> Result<Option<u64>, ClusterError> {
        let sequence = self
            .sequences
            .get(id)
            .ok_or(ClusterError::MissingSequence(id))?;
        let bounds = self
            .sequences
            .bounds(id)
            .ok_or(ClusterError::MissingSequence(id))?;
        if bounds.len() != self.region_size {
            return Ok(None);
        }
        Ok(projection.bucket_key(sequence, bounds))
    }

    /// Partition `ranked` (descending abundance) under `projection`.
    pub fn partition(
        &self,
        projection: &Projection,
        ranked: &[AptamerId],
    ) -> Result<Buckets, ClusterError> {
        let mut buckets = Buckets::default();
        for &id in ranked {
            match self.key_of(projection, id)? {
                Some(key) => {
                    buckets.map.entry(key).or_default().push(id);
                    buckets.processed += 1;
                }
                None => buckets.skipped += 1,
            }
        }
        debug!(
            buckets = buckets.len(),
            processed = buckets.processed,
            skipped = buckets.skipped,
            largest = buckets.largest(),
            "partitioned aptamers"
        );
        Ok(buckets)
    }
}
