//! Merging t-digest for floating-point quantiles.
//!
//! Incoming values are buffered and periodically merged into a sorted list
//! of centroids. Cluster sizes are bounded by `4 * W * q * (1 - q) / k`, so
//! resolution is highest at the tails. The compression parameter `k` bounds
//! the retained centroid count.

use ketchsql_common::error::{Error, Result};

use crate::codec::{self, ByteReader, ByteWriter};

pub const DEFAULT_TDIGEST_K: u16 = 100;
pub const MIN_TDIGEST_K: u16 = 10;
pub const MAX_TDIGEST_K: u16 = 10000;

const FLAG_EMPTY: u8 = 1;

#[derive(Debug, Clone, Copy)]
struct Centroid {
    mean: f64,
    weight: u64,
}

#[derive(Debug, Clone)]
pub struct TDigest {
    k: u16,
    centroids: Vec<Centroid>,
    buffer: Vec<f64>,
    centroid_weight: u64,
    min: f64,
    max: f64,
}

impl TDigest {
    pub fn new(k: u16) -> Self {
        debug_assert!((MIN_TDIGEST_K..=MAX_TDIGEST_K).contains(&k));
        Self {
            k,
            centroids: Vec::new(),
            buffer: Vec::new(),
            centroid_weight: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn k(&self) -> u16 {
        self.k
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight() == 0
    }

    pub fn total_weight(&self) -> u64 {
        self.centroid_weight + self.buffer.len() as u64
    }

    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.buffer.push(value);
        if self.buffer.len() >= 4 * self.k as usize {
            self.compress();
        }
    }

    pub fn merge(&mut self, other: &TDigest) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.buffer.extend_from_slice(&other.buffer);
        self.centroids.extend_from_slice(&other.centroids);
        self.centroid_weight += other.centroid_weight;
        self.compress();
    }

    fn compress(&mut self) {
        if self.buffer.is_empty() && self.centroids.len() <= 2 * self.k as usize {
            return;
        }
        let mut pending: Vec<Centroid> = std::mem::take(&mut self.centroids);
        pending.extend(self.buffer.drain(..).map(|value| Centroid {
            mean: value,
            weight: 1,
        }));
        pending.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap_or(std::cmp::Ordering::Equal));

        let total: u64 = pending.iter().map(|c| c.weight).sum();
        self.centroid_weight = total;
        if total == 0 {
            return;
        }

        let mut merged: Vec<Centroid> = Vec::with_capacity(2 * self.k as usize);
        let mut seen = 0u64;
        for centroid in pending {
            match merged.last_mut() {
                Some(last) => {
                    let combined = last.weight + centroid.weight;
                    let q = (seen as f64 + combined as f64 / 2.0) / total as f64;
                    let limit = 4.0 * total as f64 * q * (1.0 - q) / self.k as f64;
                    if (combined as f64) <= limit.max(1.0) {
                        let w = combined as f64;
                        last.mean =
                            (last.mean * last.weight as f64 + centroid.mean * centroid.weight as f64)
                                / w;
                        last.weight = combined;
                    } else {
                        seen += last.weight;
                        merged.push(centroid);
                    }
                }
                None => merged.push(centroid),
            }
        }
        self.centroids = merged;
    }

    /// Value at normalized rank `q` in [0, 1].
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if self.is_empty() {
            return Err(Error::invalid_query("quantile of an empty t-digest"));
        }
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::invalid_query(format!(
                "normalized rank must be in [0, 1], got {}",
                q
            )));
        }
        let mut digest = self.clone();
        digest.compress();
        let total = digest.centroid_weight as f64;
        let target = q * total;

        // Interpolate between centroid midpoints, anchored at min and max.
        let mut seen = 0.0;
        let mut prev_center = 0.0;
        let mut prev_mean = digest.min;
        for centroid in &digest.centroids {
            let center = seen + centroid.weight as f64 / 2.0;
            if target <= center {
                let span = center - prev_center;
                let fraction = if span > 0.0 {
                    (target - prev_center) / span
                } else {
                    0.0
                };
                return Ok(prev_mean + fraction * (centroid.mean - prev_mean));
            }
            seen += centroid.weight as f64;
            prev_center = center;
            prev_mean = centroid.mean;
        }
        let span = total - prev_center;
        let fraction = if span > 0.0 {
            (target - prev_center) / span
        } else {
            1.0
        };
        Ok(prev_mean + fraction * (digest.max - prev_mean))
    }

    /// Normalized rank of `value` in [0, 1].
    pub fn rank(&self, value: f64) -> Result<f64> {
        if self.is_empty() {
            return Err(Error::invalid_query("rank of an empty t-digest"));
        }
        let mut digest = self.clone();
        digest.compress();
        if value < digest.min {
            return Ok(0.0);
        }
        if value >= digest.max {
            return Ok(1.0);
        }
        let total = digest.centroid_weight as f64;
        let mut below = 0.0;
        for centroid in &digest.centroids {
            if centroid.mean <= value {
                below += centroid.weight as f64;
            } else {
                // Split the straddling centroid proportionally.
                below += centroid.weight as f64 * 0.5;
                break;
            }
        }
        Ok((below / total).clamp(0.0, 1.0))
    }

    pub fn cdf(&self, split_points: &[f64]) -> Result<Vec<f64>> {
        let mut result = Vec::with_capacity(split_points.len() + 1);
        for split in split_points {
            result.push(self.rank(*split)?);
        }
        result.push(1.0);
        Ok(result)
    }

    pub fn pmf(&self, split_points: &[f64]) -> Result<Vec<f64>> {
        let cdf = self.cdf(split_points)?;
        let mut result = Vec::with_capacity(cdf.len());
        let mut prev = 0.0;
        for rank in cdf {
            result.push(rank - prev);
            prev = rank;
        }
        Ok(result)
    }

    pub fn to_string_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("### t-digest summary:\n");
        out.push_str(&format!("   k            : {}\n", self.k));
        out.push_str(&format!("   total weight : {}\n", self.total_weight()));
        out.push_str(&format!(
            "   centroids    : {}\n",
            self.centroids.len() + self.buffer.len()
        ));
        if !self.is_empty() {
            out.push_str(&format!("   min          : {}\n", self.min));
            out.push_str(&format!("   max          : {}\n", self.max));
        }
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        // The growable buffer never reaches the blob; compact first.
        let mut digest = self.clone();
        digest.compress();

        let mut writer = ByteWriter::with_preamble(codec::FAMILY_TDIGEST, codec::ITEM_TAG_FLOAT64);
        writer.put_u16(digest.k);
        let flags = if digest.is_empty() { FLAG_EMPTY } else { 0 };
        writer.put_u8(flags);
        if !digest.is_empty() {
            writer.put_u64(digest.centroid_weight);
            writer.put_f64(digest.min);
            writer.put_f64(digest.max);
            writer.put_u32(digest.centroids.len() as u32);
            for centroid in &digest.centroids {
                writer.put_f64(centroid.mean);
                writer.put_u64(centroid.weight);
            }
        }
        writer.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (mut reader, _) = ByteReader::for_family(bytes, codec::FAMILY_TDIGEST)?;
        let k = reader.get_u16()?;
        if !(MIN_TDIGEST_K..=MAX_TDIGEST_K).contains(&k) {
            return Err(Error::malformed_sketch(format!(
                "t-digest k {} out of range",
                k
            )));
        }
        let flags = reader.get_u8()?;
        if flags & FLAG_EMPTY != 0 {
            reader.expect_end()?;
            return Ok(Self::new(k));
        }
        let centroid_weight = reader.get_u64()?;
        let min = reader.get_f64()?;
        let max = reader.get_f64()?;
        let count = reader.get_u32()? as usize;
        let mut centroids = Vec::with_capacity(count);
        let mut weight = 0u64;
        for _ in 0..count {
            let mean = reader.get_f64()?;
            let w = reader.get_u64()?;
            weight += w;
            centroids.push(Centroid { mean, weight: w });
        }
        reader.expect_end()?;
        if weight != centroid_weight || weight == 0 {
            return Err(Error::malformed_sketch(format!(
                "t-digest centroid weight {} does not match total {}",
                weight, centroid_weight
            )));
        }
        Ok(Self {
            k,
            centroids,
            buffer: Vec::new(),
            centroid_weight,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantiles_on_uniform_stream() {
        let mut digest = TDigest::new(100);
        for i in 0..10_000 {
            digest.add(i as f64);
        }
        assert_eq!(digest.total_weight(), 10_000);
        let median = digest.quantile(0.5).unwrap();
        assert!((median - 5000.0).abs() < 500.0, "median {}", median);
        assert_eq!(digest.quantile(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_rank_is_monotone() {
        let mut digest = TDigest::new(100);
        for i in 0..1000 {
            digest.add(i as f64);
        }
        let r25 = digest.rank(250.0).unwrap();
        let r75 = digest.rank(750.0).unwrap();
        assert!(r25 < r75);
        assert!((r25 - 0.25).abs() < 0.1, "rank {}", r25);
    }

    #[test]
    fn test_merge() {
        let mut left = TDigest::new(100);
        let mut right = TDigest::new(100);
        for i in 0..5000 {
            left.add(i as f64);
            right.add((5000 + i) as f64);
        }
        left.merge(&right);
        assert_eq!(left.total_weight(), 10_000);
        let median = left.quantile(0.5).unwrap();
        assert!((median - 5000.0).abs() < 500.0, "median {}", median);
    }

    #[test]
    fn test_round_trip() {
        let mut digest = TDigest::new(50);
        for i in 0..2000 {
            digest.add((i % 321) as f64);
        }
        let blob = digest.serialize();
        let restored = TDigest::deserialize(&blob).unwrap();
        assert_eq!(restored.total_weight(), digest.total_weight());
        assert_eq!(
            restored.quantile(0.5).unwrap(),
            digest.quantile(0.5).unwrap()
        );
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn test_empty() {
        let digest = TDigest::new(100);
        assert!(digest.is_empty());
        assert!(digest.quantile(0.5).is_err());
        let restored = TDigest::deserialize(&digest.serialize()).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_centroid_count_is_bounded() {
        let mut digest = TDigest::new(50);
        for i in 0..100_000 {
            digest.add((i * 7 % 100_000) as f64);
        }
        digest.compress();
        assert!(digest.centroids.len() <= 200, "{}", digest.centroids.len());
    }
}
