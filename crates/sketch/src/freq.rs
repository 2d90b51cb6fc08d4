//! Frequent-items (heavy hitters) sketch using space-saving counters.
//!
//! The sketch tracks at most `2^lg_max_k` counters. When a new item arrives
//! at a full map, the smallest counter is evicted and its count becomes the
//! newcomer's error allowance, so for every tracked item
//! `count - error <= true frequency <= count`.

use std::collections::HashMap;

use ketchsql_common::error::{Error, Result};

use crate::codec::{self, ByteReader, ByteWriter};

pub const DEFAULT_FREQ_LG_MAX_K: u8 = 10;
pub const MIN_FREQ_LG_MAX_K: u8 = 3;
pub const MAX_FREQ_LG_MAX_K: u8 = 21;

// Same epsilon slope the space-saving literature uses per map slot.
const EPSILON_FACTOR: f64 = 3.5;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    error: u64,
}

/// One row of a frequent-items report.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemRow {
    pub item: String,
    pub estimate: u64,
    pub lower_bound: u64,
    pub upper_bound: u64,
}

#[derive(Debug, Clone)]
pub struct FrequentItemsSketch {
    lg_max_k: u8,
    counters: HashMap<String, Counter>,
    total_weight: u64,
}

impl FrequentItemsSketch {
    pub fn new(lg_max_k: u8) -> Self {
        debug_assert!((MIN_FREQ_LG_MAX_K..=MAX_FREQ_LG_MAX_K).contains(&lg_max_k));
        Self {
            lg_max_k,
            counters: HashMap::new(),
            total_weight: 0,
        }
    }

    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }

    fn capacity(&self) -> usize {
        1 << self.lg_max_k
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn num_tracked(&self) -> usize {
        self.counters.len()
    }

    pub fn update(&mut self, item: &str) {
        self.update_weighted(item, 1);
    }

    pub fn update_weighted(&mut self, item: &str, weight: u64) {
        if weight == 0 {
            return;
        }
        self.total_weight += weight;
        if let Some(counter) = self.counters.get_mut(item) {
            counter.count += weight;
            return;
        }
        if self.counters.len() < self.capacity() {
            self.counters.insert(
                item.to_string(),
                Counter {
                    count: weight,
                    error: 0,
                },
            );
            return;
        }
        if let Some((min_item, min_counter)) = self.min_entry() {
            self.counters.remove(&min_item);
            self.counters.insert(
                item.to_string(),
                Counter {
                    count: min_counter.count + weight,
                    error: min_counter.count,
                },
            );
        }
    }

    fn min_entry(&self) -> Option<(String, Counter)> {
        self.counters
            .iter()
            .min_by(|a, b| a.1.count.cmp(&b.1.count).then_with(|| a.0.cmp(b.0)))
            .map(|(item, counter)| (item.clone(), *counter))
    }

    pub fn estimate(&self, item: &str) -> u64 {
        self.counters.get(item).map(|c| c.count).unwrap_or(0)
    }

    pub fn lower_bound(&self, item: &str) -> u64 {
        self.counters
            .get(item)
            .map(|c| c.count - c.error)
            .unwrap_or(0)
    }

    pub fn upper_bound(&self, item: &str) -> u64 {
        self.estimate(item)
    }

    /// A-priori relative error slope for this capacity.
    pub fn epsilon(&self) -> f64 {
        EPSILON_FACTOR / self.capacity() as f64
    }

    fn maximum_error(&self) -> u64 {
        self.counters.values().map(|c| c.error).max().unwrap_or(0)
    }

    /// Items whose lower bound clears the largest tracked error, sorted by
    /// estimate descending (no false negatives among tracked items).
    pub fn frequent_items(&self) -> Vec<FrequentItemRow> {
        let threshold = self.maximum_error();
        let mut rows: Vec<FrequentItemRow> = self
            .counters
            .iter()
            .filter(|(_, counter)| counter.count - counter.error > threshold)
            .map(|(item, counter)| FrequentItemRow {
                item: item.clone(),
                estimate: counter.count,
                lower_bound: counter.count - counter.error,
                upper_bound: counter.count,
            })
            .collect();
        rows.sort_by(|a, b| b.estimate.cmp(&a.estimate).then_with(|| a.item.cmp(&b.item)));
        rows
    }

    pub fn merge(&mut self, other: &FrequentItemsSketch) {
        self.total_weight += other.total_weight;
        for (item, incoming) in &other.counters {
            match self.counters.get_mut(item) {
                Some(counter) => {
                    counter.count += incoming.count;
                    counter.error += incoming.error;
                }
                None => {
                    self.counters.insert(item.clone(), *incoming);
                }
            }
        }
        while self.counters.len() > self.capacity() {
            if let Some((min_item, _)) = self.min_entry() {
                self.counters.remove(&min_item);
            }
        }
    }

    pub fn to_string_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("### Frequent items sketch summary:\n");
        out.push_str(&format!("   lg max k     : {}\n", self.lg_max_k));
        out.push_str(&format!("   tracked      : {}\n", self.counters.len()));
        out.push_str(&format!("   total weight : {}\n", self.total_weight));
        out.push_str(&format!("   max error    : {}\n", self.maximum_error()));
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_preamble(codec::FAMILY_FREQ_ITEMS, codec::ITEM_TAG_NONE);
        writer.put_u8(self.lg_max_k);
        writer.put_u64(self.total_weight);
        writer.put_u32(self.counters.len() as u32);
        // Sorted by item for a deterministic blob.
        let mut entries: Vec<(&String, &Counter)> = self.counters.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (item, counter) in entries {
            writer.put_u32(item.len() as u32);
            writer.put_bytes(item.as_bytes());
            writer.put_u64(counter.count);
            writer.put_u64(counter.error);
        }
        writer.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (mut reader, _) = ByteReader::for_family(bytes, codec::FAMILY_FREQ_ITEMS)?;
        let lg_max_k = reader.get_u8()?;
        if !(MIN_FREQ_LG_MAX_K..=MAX_FREQ_LG_MAX_K).contains(&lg_max_k) {
            return Err(Error::malformed_sketch(format!(
                "frequent items sketch lg_max_k {} out of range",
                lg_max_k
            )));
        }
        let total_weight = reader.get_u64()?;
        let count = reader.get_u32()? as usize;
        if count > 1 << lg_max_k {
            return Err(Error::malformed_sketch(format!(
                "frequent items sketch tracks {} counters, capacity is {}",
                count,
                1u32 << lg_max_k
            )));
        }
        let mut counters = HashMap::with_capacity(count);
        let mut tracked_weight = 0u64;
        for _ in 0..count {
            let len = reader.get_u32()? as usize;
            let item = std::str::from_utf8(reader.get_bytes(len)?)
                .map_err(|_| Error::malformed_sketch("frequent items key is not UTF-8"))?
                .to_string();
            let item_count = reader.get_u64()?;
            let error = reader.get_u64()?;
            if error > item_count {
                return Err(Error::malformed_sketch(
                    "frequent items counter error exceeds its count",
                ));
            }
            tracked_weight += item_count;
            counters.insert(item, Counter {
                count: item_count,
                error,
            });
        }
        reader.expect_end()?;
        if counters.len() != count {
            return Err(Error::malformed_sketch("frequent items keys not unique"));
        }
        if tracked_weight > total_weight {
            return Err(Error::malformed_sketch(
                "frequent items counters exceed the recorded total weight",
            ));
        }
        Ok(Self {
            lg_max_k,
            counters,
            total_weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_below_capacity() {
        let mut sketch = FrequentItemsSketch::new(6);
        for _ in 0..10 {
            sketch.update("alpha");
        }
        for _ in 0..3 {
            sketch.update("beta");
        }
        assert_eq!(sketch.estimate("alpha"), 10);
        assert_eq!(sketch.lower_bound("alpha"), 10);
        assert_eq!(sketch.estimate("gamma"), 0);
        assert_eq!(sketch.total_weight(), 13);

        let rows = sketch.frequent_items();
        assert_eq!(rows[0].item, "alpha");
        assert_eq!(rows[0].estimate, 10);
    }

    #[test]
    fn test_bounds_hold_under_eviction() {
        let mut sketch = FrequentItemsSketch::new(3);
        // Heavy item plus enough noise to force evictions.
        for i in 0..200 {
            sketch.update("heavy");
            sketch.update(&format!("noise-{}", i));
        }
        let estimate = sketch.estimate("heavy");
        let lower = sketch.lower_bound("heavy");
        assert!(lower <= 200, "lower {}", lower);
        assert!(estimate >= 200, "estimate {}", estimate);
        assert!(sketch.num_tracked() <= 8);
    }

    #[test]
    fn test_weighted_update_equals_repeats() {
        let mut by_one = FrequentItemsSketch::new(6);
        let mut weighted = FrequentItemsSketch::new(6);
        for _ in 0..1000 {
            by_one.update("x");
        }
        weighted.update_weighted("x", 1000);
        assert_eq!(by_one.serialize(), weighted.serialize());
    }

    #[test]
    fn test_merge() {
        let mut left = FrequentItemsSketch::new(8);
        let mut right = FrequentItemsSketch::new(8);
        for _ in 0..50 {
            left.update("shared");
            right.update("shared");
        }
        for _ in 0..20 {
            right.update("only-right");
        }
        left.merge(&right);
        assert_eq!(left.estimate("shared"), 100);
        assert_eq!(left.estimate("only-right"), 20);
        assert_eq!(left.total_weight(), 120);
    }

    #[test]
    fn test_round_trip() {
        let mut sketch = FrequentItemsSketch::new(5);
        for i in 0..500 {
            sketch.update(&format!("item-{}", i % 40));
        }
        let blob = sketch.serialize();
        let restored = FrequentItemsSketch::deserialize(&blob).unwrap();
        assert_eq!(restored.total_weight(), sketch.total_weight());
        assert_eq!(restored.frequent_items(), sketch.frequent_items());
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn test_bad_blob() {
        assert!(FrequentItemsSketch::deserialize(&[0u8; 16]).is_err());
    }
}
