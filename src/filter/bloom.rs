use std::sync::atomic::{AtomicU64, Ordering};

use super::mix64;

/// Bloom filter over `u64` items backed by atomic words.
///
/// Every bit is set with `fetch_or`, so inserts racing on the same word
/// cannot overwrite each other.
#[derive(Debug)]
pub struct ConcurrentBloomFilter {
    words: Box<[AtomicU64]>,
    num_bits: u64,
    num_hashes: u32,
}

impl ConcurrentBloomFilter {
    /// Size the filter for `expected_items` at the given false-positive rate.
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let bits = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let hashes = ((bits as f64 / n) * ln2).round().clamp(1.0, 16.0) as u32;
        Self::with_bits(bits, hashes)
    }

    /// Filter with an explicit bit count (rounded up to whole words) and hash count.
    pub fn with_bits(bits: u64, num_hashes: u32) -> Self {
        let words = ((bits.max(1) + 63) / 64) as usize;
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
            num_bits: words as u64 * 64,
            num_hashes: num_hashes.max(1),
        }
    }

    /// Insert `item`; returns `true` if it was possibly present already.
    pub fn insert(&self, item: u64) -> bool {
        let mut present = true;
        for bit in self.bit_indices(item) {
            let (word, mask) = locate(bit);
            let previous = self.words[word].fetch_or(mask, Ordering::AcqRel);
            present &= previous & mask != 0;
        }
        present
    }

    /// Whether `item` may have been inserted.
    pub fn contains(&self, item: u64) -> bool {
        self.bit_indices(item).all(|bit| {
            let (word, mask) = locate(bit);
            self.words[word].load(Ordering::Acquire) & mask != 0
        })
    }

    /// Remove every item. Callers must ensure no concurrent inserts.
    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Release);
        }
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    fn bit_indices(&self, item: u64) -> impl Iterator<Item = u64> {
        let h1 = mix64(item);
        let h2 = mix64(h1) | 1;
        let num_bits = self.num_bits;
        (0..u64::from(self.num_hashes))
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits)
    }
}

#[inline]
fn locate(bit: u64) -> (usize, u64) {
    ((bit / 64) as usize, 1u64 << (bit % 64))
}
