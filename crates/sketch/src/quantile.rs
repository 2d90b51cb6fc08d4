//! Quantiles sketch: a leveled sampler in the KLL style.
//!
//! Items are collected in per-level buffers where an item at level `i`
//! represents `2^i` input items. When a level overflows, it is sorted and
//! every other item is promoted one level up, doubling its weight.
//! Compaction alternates its starting offset deterministically instead of
//! sampling it, so equal input order always produces byte-identical blobs.

use std::cmp::Ordering;

use ketchsql_common::error::{Error, Result};

use crate::codec::{self, ByteReader, ByteWriter};

pub const DEFAULT_QUANTILE_K: u16 = 200;
pub const MIN_QUANTILE_K: u16 = 8;
pub const MAX_QUANTILE_K: u16 = 32768;

const FLAG_EMPTY: u8 = 1;
const FLAG_PARITY: u8 = 2;
const MAX_LEVELS: u8 = 60;

/// An item type a [`QuantilesSketch`] can hold.
pub trait QuantileItem: Copy + PartialOrd + std::fmt::Debug + 'static {
    /// Item-type tag stored in the blob preamble.
    const TAG: u8;

    fn write(self, writer: &mut ByteWriter);
    fn read(reader: &mut ByteReader<'_>) -> Result<Self>;
}

impl QuantileItem for i64 {
    const TAG: u8 = codec::ITEM_TAG_INT64;

    fn write(self, writer: &mut ByteWriter) {
        writer.put_i64(self);
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.get_i64()
    }
}

impl QuantileItem for f64 {
    const TAG: u8 = codec::ITEM_TAG_FLOAT64;

    fn write(self, writer: &mut ByteWriter) {
        writer.put_f64(self);
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.get_f64()
    }
}

fn cmp_items<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[derive(Debug, Clone)]
pub struct QuantilesSketch<T: QuantileItem> {
    k: u16,
    n: u64,
    min_item: Option<T>,
    max_item: Option<T>,
    // levels[i] holds items of weight 1 << i
    levels: Vec<Vec<T>>,
    parity: bool,
}

impl<T: QuantileItem> QuantilesSketch<T> {
    pub fn new(k: u16) -> Self {
        debug_assert!((MIN_QUANTILE_K..=MAX_QUANTILE_K).contains(&k));
        Self {
            k,
            n: 0,
            min_item: None,
            max_item: None,
            levels: vec![Vec::new()],
            parity: false,
        }
    }

    pub fn k(&self) -> u16 {
        self.k
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn num_retained(&self) -> u64 {
        self.levels.iter().map(|level| level.len() as u64).sum()
    }

    /// True once any item has been promoted past the base buffer.
    pub fn is_estimation_mode(&self) -> bool {
        self.levels.len() > 1
    }

    pub fn min_item(&self) -> Option<T> {
        self.min_item
    }

    pub fn max_item(&self) -> Option<T> {
        self.max_item
    }

    fn level_capacity(&self, level: usize) -> usize {
        if level == 0 {
            2 * self.k as usize
        } else {
            self.k as usize
        }
    }

    pub fn update(&mut self, item: T) {
        self.min_item = Some(match self.min_item {
            Some(m) if cmp_items(&m, &item) != Ordering::Greater => m,
            _ => item,
        });
        self.max_item = Some(match self.max_item {
            Some(m) if cmp_items(&m, &item) != Ordering::Less => m,
            _ => item,
        });
        self.n += 1;
        self.levels[0].push(item);
        if self.levels[0].len() >= self.level_capacity(0) {
            self.compress();
        }
    }

    fn compress(&mut self) {
        let mut level = 0;
        while level < self.levels.len() {
            if self.levels[level].len() >= self.level_capacity(level) {
                self.compact_level(level);
            }
            level += 1;
        }
    }

    fn compact_level(&mut self, level: usize) {
        let mut items = std::mem::take(&mut self.levels[level]);
        items.sort_by(cmp_items);

        // An odd item stays behind at its own weight.
        if items.len() % 2 == 1 {
            if let Some(item) = items.pop() {
                self.levels[level].push(item);
            }
        }

        let offset = usize::from(self.parity);
        self.parity = !self.parity;

        if self.levels.len() <= level + 1 {
            self.levels.push(Vec::new());
        }
        let promoted: Vec<T> = items.iter().skip(offset).step_by(2).copied().collect();
        self.levels[level + 1].extend(promoted);
    }

    pub fn merge(&mut self, other: &QuantilesSketch<T>) {
        if other.is_empty() {
            return;
        }
        self.n += other.n;
        for item in [other.min_item, other.max_item].into_iter().flatten() {
            self.min_item = Some(match self.min_item {
                Some(m) if cmp_items(&m, &item) != Ordering::Greater => m,
                _ => item,
            });
            self.max_item = Some(match self.max_item {
                Some(m) if cmp_items(&m, &item) != Ordering::Less => m,
                _ => item,
            });
        }
        while self.levels.len() < other.levels.len() {
            self.levels.push(Vec::new());
        }
        for (level, items) in other.levels.iter().enumerate() {
            self.levels[level].extend_from_slice(items);
        }
        self.compress();
    }

    /// Retained items with their weights, sorted ascending.
    fn sorted_view(&self) -> Vec<(T, u64)> {
        let mut view: Vec<(T, u64)> = Vec::with_capacity(self.num_retained() as usize);
        for (level, items) in self.levels.iter().enumerate() {
            let weight = 1u64 << level;
            view.extend(items.iter().map(|item| (*item, weight)));
        }
        view.sort_by(|a, b| cmp_items(&a.0, &b.0));
        view
    }

    /// Normalized rank of `item` in [0, 1].
    pub fn rank(&self, item: T, inclusive: bool) -> Result<f64> {
        if self.is_empty() {
            return Err(Error::invalid_query("rank of an empty quantiles sketch"));
        }
        let mut below = 0u64;
        for (retained, weight) in self.sorted_view() {
            let counts = match cmp_items(&retained, &item) {
                Ordering::Less => true,
                Ordering::Equal => inclusive,
                Ordering::Greater => false,
            };
            if counts {
                below += weight;
            }
        }
        Ok(below as f64 / self.n as f64)
    }

    /// Item at normalized rank `rank` in [0, 1].
    pub fn quantile(&self, rank: f64, inclusive: bool) -> Result<T> {
        if self.is_empty() {
            return Err(Error::invalid_query(
                "quantile of an empty quantiles sketch",
            ));
        }
        if !(0.0..=1.0).contains(&rank) {
            return Err(Error::invalid_query(format!(
                "normalized rank must be in [0, 1], got {}",
                rank
            )));
        }
        let target = if inclusive {
            (rank * self.n as f64).ceil()
        } else {
            (rank * self.n as f64).floor() + 1.0
        };
        let target = (target as u64).clamp(1, self.n);

        let view = self.sorted_view();
        let mut cumulative = 0u64;
        for (item, weight) in &view {
            cumulative += weight;
            if cumulative >= target {
                return Ok(*item);
            }
        }
        // Weight bookkeeping guarantees the loop returns; max item is the
        // safe answer for rank 1.0 against rounding.
        view.last()
            .map(|(item, _)| *item)
            .ok_or_else(|| Error::internal("quantiles sketch retained no items"))
    }

    /// Cumulative distribution at the given split points; the final entry
    /// is always 1.0.
    pub fn cdf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>> {
        if self.is_empty() {
            return Err(Error::invalid_query("CDF of an empty quantiles sketch"));
        }
        let mut result = Vec::with_capacity(split_points.len() + 1);
        for split in split_points {
            result.push(self.rank(*split, inclusive)?);
        }
        result.push(1.0);
        Ok(result)
    }

    /// Probability mass between consecutive split points.
    pub fn pmf(&self, split_points: &[T], inclusive: bool) -> Result<Vec<f64>> {
        let cdf = self.cdf(split_points, inclusive)?;
        let mut result = Vec::with_capacity(cdf.len());
        let mut prev = 0.0;
        for rank in cdf {
            result.push(rank - prev);
            prev = rank;
        }
        Ok(result)
    }

    /// A-priori normalized rank error for this sketch's `k`.
    pub fn normalized_rank_error(&self, pmf: bool) -> f64 {
        Self::normalized_rank_error_for_k(self.k, pmf)
    }

    pub fn normalized_rank_error_for_k(k: u16, pmf: bool) -> f64 {
        let constant = if pmf { 2.446 } else { 2.296 };
        constant / (k as f64).powf(0.9433)
    }

    pub fn to_string_summary(&self, include_items: bool) -> String {
        let mut out = String::new();
        out.push_str("### Quantiles sketch summary:\n");
        out.push_str(&format!("   k            : {}\n", self.k));
        out.push_str(&format!("   n            : {}\n", self.n));
        out.push_str(&format!("   retained     : {}\n", self.num_retained()));
        out.push_str(&format!("   levels       : {}\n", self.levels.len()));
        out.push_str(&format!(
            "   estimation   : {}\n",
            self.is_estimation_mode()
        ));
        if let (Some(min), Some(max)) = (self.min_item, self.max_item) {
            out.push_str(&format!("   min item     : {:?}\n", min));
            out.push_str(&format!("   max item     : {:?}\n", max));
        }
        if include_items {
            for (level, items) in self.levels.iter().enumerate() {
                out.push_str(&format!("   level {:2}     : {:?}\n", level, items));
            }
        }
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_preamble(codec::FAMILY_QUANTILE, T::TAG);
        writer.put_u16(self.k);
        let mut flags = 0u8;
        if self.is_empty() {
            flags |= FLAG_EMPTY;
        }
        if self.parity {
            flags |= FLAG_PARITY;
        }
        writer.put_u8(flags);
        writer.put_u64(self.n);
        if let (Some(min), Some(max)) = (self.min_item, self.max_item) {
            min.write(&mut writer);
            max.write(&mut writer);
            writer.put_u8(self.levels.len() as u8);
            for level in &self.levels {
                writer.put_u32(level.len() as u32);
                for item in level {
                    item.write(&mut writer);
                }
            }
        }
        writer.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (mut reader, item_tag) = ByteReader::for_family(bytes, codec::FAMILY_QUANTILE)?;
        if item_tag != T::TAG {
            return Err(Error::malformed_sketch(format!(
                "quantiles sketch item-type tag {} does not match the expected tag {}",
                item_tag,
                T::TAG
            )));
        }
        let k = reader.get_u16()?;
        if !(MIN_QUANTILE_K..=MAX_QUANTILE_K).contains(&k) {
            return Err(Error::malformed_sketch(format!(
                "quantiles sketch k {} out of range",
                k
            )));
        }
        let flags = reader.get_u8()?;
        let n = reader.get_u64()?;
        let parity = flags & FLAG_PARITY != 0;
        if flags & FLAG_EMPTY != 0 {
            if n != 0 {
                return Err(Error::malformed_sketch(
                    "empty quantiles sketch with nonzero n",
                ));
            }
            reader.expect_end()?;
            let mut sketch = Self::new(k);
            sketch.parity = parity;
            return Ok(sketch);
        }

        let min_item = T::read(&mut reader)?;
        let max_item = T::read(&mut reader)?;
        let num_levels = reader.get_u8()?;
        if num_levels == 0 || num_levels > MAX_LEVELS {
            return Err(Error::malformed_sketch(format!(
                "quantiles sketch has {} levels",
                num_levels
            )));
        }
        let mut levels = Vec::with_capacity(num_levels as usize);
        let mut weight = 0u64;
        for level_index in 0..num_levels {
            let len = reader.get_u32()? as usize;
            let mut level = Vec::with_capacity(len);
            for _ in 0..len {
                level.push(T::read(&mut reader)?);
            }
            weight += (len as u64) << level_index;
            levels.push(level);
        }
        reader.expect_end()?;
        if weight != n {
            return Err(Error::malformed_sketch(format!(
                "quantiles sketch weight {} does not match n {}",
                weight, n
            )));
        }
        let mut min_seen = min_item;
        let mut max_seen = max_item;
        for item in levels.iter().flatten() {
            if cmp_items(item, &min_seen) == Ordering::Less {
                min_seen = *item;
            }
            if cmp_items(item, &max_seen) == Ordering::Greater {
                max_seen = *item;
            }
        }
        Ok(Self {
            k,
            n,
            min_item: Some(min_seen),
            max_item: Some(max_seen),
            levels,
            parity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_below_capacity() {
        let mut sketch = QuantilesSketch::<i64>::new(128);
        for i in 1..=100 {
            sketch.update(i);
        }
        assert_eq!(sketch.n(), 100);
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.quantile(0.5, true).unwrap(), 50);
        assert_eq!(sketch.min_item(), Some(1));
        assert_eq!(sketch.max_item(), Some(100));
    }

    #[test]
    fn test_median_accuracy_in_estimation_mode() {
        let mut sketch = QuantilesSketch::<i64>::new(128);
        for i in 1..=10_000 {
            sketch.update(i);
        }
        assert!(sketch.is_estimation_mode());
        assert_eq!(sketch.n(), 10_000);
        let median = sketch.quantile(0.5, true).unwrap();
        assert!((median - 5000).unsigned_abs() < 500, "median {}", median);
    }

    #[test]
    fn test_rank_and_quantile_round() {
        let mut sketch = QuantilesSketch::<f64>::new(200);
        for i in 0..1000 {
            sketch.update(i as f64);
        }
        let rank = sketch.rank(250.0, true).unwrap();
        assert!((rank - 0.25).abs() < 0.05, "rank {}", rank);
    }

    #[test]
    fn test_merge_matches_combined_stream() {
        let mut left = QuantilesSketch::<i64>::new(128);
        let mut right = QuantilesSketch::<i64>::new(128);
        for i in 1..=5000 {
            left.update(i);
        }
        for i in 5001..=10_000 {
            right.update(i);
        }
        left.merge(&right);
        assert_eq!(left.n(), 10_000);
        let median = left.quantile(0.5, true).unwrap();
        assert!((median - 5000).unsigned_abs() < 500, "median {}", median);
        assert_eq!(left.min_item(), Some(1));
        assert_eq!(left.max_item(), Some(10_000));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut sketch = QuantilesSketch::<i64>::new(64);
        for i in 1..=2000 {
            sketch.update(i * 3);
        }
        let blob = sketch.serialize();
        let restored = QuantilesSketch::<i64>::deserialize(&blob).unwrap();
        assert_eq!(restored.n(), sketch.n());
        assert_eq!(restored.k(), sketch.k());
        assert_eq!(
            restored.quantile(0.25, true).unwrap(),
            sketch.quantile(0.25, true).unwrap()
        );
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn test_identical_streams_identical_blobs() {
        let mut a = QuantilesSketch::<i64>::new(32);
        let mut b = QuantilesSketch::<i64>::new(32);
        for i in 0..5000 {
            a.update(i % 97);
            b.update(i % 97);
        }
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_empty_round_trip() {
        let sketch = QuantilesSketch::<f64>::new(200);
        let blob = sketch.serialize();
        let restored = QuantilesSketch::<f64>::deserialize(&blob).unwrap();
        assert!(restored.is_empty());
        assert!(restored.quantile(0.5, true).is_err());
    }

    #[test]
    fn test_wrong_item_tag_rejected() {
        let mut sketch = QuantilesSketch::<i64>::new(64);
        sketch.update(1);
        let blob = sketch.serialize();
        assert!(QuantilesSketch::<f64>::deserialize(&blob).is_err());
    }

    #[test]
    fn test_cdf_pmf() {
        let mut sketch = QuantilesSketch::<i64>::new(200);
        for i in 0..1000 {
            sketch.update(i);
        }
        let cdf = sketch.cdf(&[250, 500, 750], true).unwrap();
        assert_eq!(cdf.len(), 4);
        assert_eq!(cdf[3], 1.0);
        let pmf = sketch.pmf(&[250, 500, 750], true).unwrap();
        let total: f64 = pmf.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
