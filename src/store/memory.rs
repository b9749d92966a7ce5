//! In-memory store backends.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::{AbundanceStore, AptamerId, ClusterId, ClusterStore, SequenceStore, StoreError};

#[derive(Debug, Clone)]
struct StoredAptamer {
    bytes: Box<[u8]>,
    bounds: Range<usize>,
}

/// Sequences held in a vector; ids are assigned densely from 0.
#[derive(Debug, Default, Clone)]
pub struct InMemorySequenceStore {
    aptamers: Vec<StoredAptamer>,
}

impl InMemorySequenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an aptamer with explicit randomized-region bounds.
    ///
    /// # Panics
    /// Panics if `bounds` does not lie within `sequence`.
    pub fn push(&mut self, sequence: impl Into<Box<[u8]>>, bounds: Range<usize>) -> AptamerId {
        let bytes = sequence.into();
        assert!(
            bounds.start <= bounds.end && bounds.end <= bytes.len(),
            "bounds {:?} outside sequence of length {}",
            bounds,
            bytes.len()
        );
        let id = self.aptamers.len() as AptamerId;
        self.aptamers.push(StoredAptamer { bytes, bounds });
        id
    }

    /// Store an aptamer whose randomized region is flanked by fixed primers.
    ///
    /// Returns `None` when the primers do not fit the sequence.
    pub fn push_with_primers(
        &mut self,
        sequence: impl Into<Box<[u8]>>,
        primer5_len: usize,
        primer3_len: usize,
    ) -> Option<AptamerId> {
        let bytes = sequence.into();
        let end = bytes.len().checked_sub(primer3_len)?;
        if primer5_len > end {
            return None;
        }
        Some(self.push(bytes, primer5_len..end))
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn get(&self, id: AptamerId) -> Option<&[u8]> {
        self.aptamers.get(id as usize).map(|a| &a.bytes[..])
    }

    fn bounds(&self, id: AptamerId) -> Option<Range<usize>> {
        self.aptamers.get(id as usize).map(|a| a.bounds.clone())
    }

    fn len(&self) -> usize {
        self.aptamers.len()
    }

    fn ids(&self) -> Box<dyn Iterator<Item = AptamerId> + '_> {
        Box::new(0..self.aptamers.len() as AptamerId)
    }
}

/// Slot value marking an unassigned aptamer.
const UNASSIGNED: ClusterId = 0;

/// Dense cluster table: one atomic slot per aptamer id.
///
/// Reads and writes are lock-free; concurrent writers to the same slot
/// resolve as last-writer-wins. Cluster id 0 is reserved as the empty marker.
#[derive(Debug)]
pub struct InMemoryClusterStore {
    slots: Vec<AtomicU32>,
    read_only: AtomicBool,
}

impl InMemoryClusterStore {
    /// Create a store able to hold ids `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(UNASSIGNED)).collect(),
            read_only: AtomicBool::new(false),
        }
    }

    /// Whether `set_read_only` has been called.
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    fn write(&self, id: AptamerId, cluster: ClusterId) -> Result<(), StoreError> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        if cluster == UNASSIGNED {
            return Err(StoreError::ReservedClusterId(cluster));
        }
        let slot = self.slots.get(id as usize).ok_or(StoreError::IdOutOfRange {
            id,
            capacity: self.slots.len(),
        })?;
        slot.store(cluster, Ordering::Release);
        Ok(())
    }
}

impl ClusterStore for InMemoryClusterStore {
    fn add_to_cluster(&self, id: AptamerId, cluster: ClusterId) -> Result<(), StoreError> {
        self.write(id, cluster)
    }

    fn cluster_id(&self, id: AptamerId) -> Option<ClusterId> {
        self.slots
            .get(id as usize)
            .map(|slot| slot.load(Ordering::Acquire))
            .filter(|&cluster| cluster != UNASSIGNED)
    }

    fn reassign(&self, id: AptamerId, cluster: ClusterId) -> Result<(), StoreError> {
        self.write(id, cluster)
    }

    fn assignments(&self) -> Box<dyn Iterator<Item = (AptamerId, ClusterId)> + '_> {
        Box::new(self.slots.iter().enumerate().filter_map(|(id, slot)| {
            let cluster = slot.load(Ordering::Acquire);
            (cluster != UNASSIGNED).then_some((id as AptamerId, cluster))
        }))
    }

    fn set_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }
}

/// Per-cycle counts held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAbundanceStore {
    cycles: Vec<Vec<(AptamerId, u32)>>,
}

impl InMemoryAbundanceStore {
    /// Create a store without cycles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cycle and return its index.
    pub fn add_cycle(&mut self, counts: Vec<(AptamerId, u32)>) -> usize {
        self.cycles.push(counts);
        self.cycles.len() - 1
    }

    /// Record `count` copies of `id` in `cycle`, creating cycles as needed.
    pub fn record(&mut self, cycle: usize, id: AptamerId, count: u32) {
        if cycle >= self.cycles.len() {
            self.cycles.resize_with(cycle + 1, Vec::new);
        }
        self.cycles[cycle].push((id, count));
    }
}

impl AbundanceStore for InMemoryAbundanceStore {
    fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    fn cycle(&self, cycle: usize) -> Box<dyn Iterator<Item = (AptamerId, u32)> + '_> {
        match self.cycles.get(cycle) {
            Some(counts) => Box::new(counts.iter().copied()),
            None => Box::new(std::iter::empty()),
        }
    }
}
