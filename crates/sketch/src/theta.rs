//! Theta distinct-count sketch in the bottom-k (KMV) style.
//!
//! The sketch retains the smallest 64-bit item hashes below a threshold
//! `theta`. Once more than the nominal `2^lg_k` hashes are retained, the
//! threshold tightens to the largest retained hash and everything at or
//! above it is discarded. Because retained hashes are a uniform sample of
//! the hash space below `theta`, set operations (union, intersection,
//! difference) work directly on the retained sets.

use std::collections::BTreeSet;
use std::hash::Hash;

use ketchsql_common::error::{Error, Result};

use crate::codec::{self, ByteReader, ByteWriter};
use crate::hll::hash_item;

pub const DEFAULT_THETA_LG_K: u8 = 12;
pub const MIN_THETA_LG_K: u8 = 5;
pub const MAX_THETA_LG_K: u8 = 26;

const MAX_THETA: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct ThetaSketch {
    lg_k: u8,
    theta: u64,
    hashes: BTreeSet<u64>,
}

impl ThetaSketch {
    pub fn new(lg_k: u8) -> Self {
        debug_assert!((MIN_THETA_LG_K..=MAX_THETA_LG_K).contains(&lg_k));
        Self {
            lg_k,
            theta: MAX_THETA,
            hashes: BTreeSet::new(),
        }
    }

    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    fn nominal(&self) -> usize {
        1 << self.lg_k
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.theta == MAX_THETA
    }

    pub fn num_retained(&self) -> usize {
        self.hashes.len()
    }

    fn theta_fraction(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    pub fn is_estimation_mode(&self) -> bool {
        self.theta != MAX_THETA
    }

    pub fn update<T: Hash + ?Sized>(&mut self, item: &T) {
        self.update_hash(hash_item(item));
    }

    pub fn update_hash(&mut self, hash: u64) {
        if hash >= self.theta {
            return;
        }
        if !self.hashes.insert(hash) {
            return;
        }
        self.shrink_if_over_nominal();
    }

    fn shrink_if_over_nominal(&mut self) {
        while self.hashes.len() > self.nominal() {
            if let Some(largest) = self.hashes.pop_last() {
                self.theta = largest;
            }
        }
    }

    pub fn estimate(&self) -> f64 {
        self.hashes.len() as f64 / self.theta_fraction()
    }

    pub fn lower_bound(&self, num_std_devs: u8) -> Result<f64> {
        let factor = bound_factor(num_std_devs)?;
        if !self.is_estimation_mode() || self.hashes.is_empty() {
            return Ok(self.hashes.len() as f64);
        }
        let retained = self.hashes.len() as f64;
        Ok(self.estimate() * (1.0 - factor / retained.sqrt()).max(0.0))
    }

    pub fn upper_bound(&self, num_std_devs: u8) -> Result<f64> {
        let factor = bound_factor(num_std_devs)?;
        if !self.is_estimation_mode() || self.hashes.is_empty() {
            return Ok(self.hashes.len() as f64);
        }
        let retained = self.hashes.len() as f64;
        Ok(self.estimate() * (1.0 + factor / retained.sqrt()))
    }

    pub fn to_string_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("### Theta sketch summary:\n");
        out.push_str(&format!("   lg k         : {}\n", self.lg_k));
        out.push_str(&format!("   retained     : {}\n", self.hashes.len()));
        out.push_str(&format!("   theta        : {:.6}\n", self.theta_fraction()));
        out.push_str(&format!(
            "   estimation   : {}\n",
            self.is_estimation_mode()
        ));
        out.push_str(&format!("   estimate     : {:.3}\n", self.estimate()));
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_preamble(codec::FAMILY_THETA, codec::ITEM_TAG_NONE);
        writer.put_u8(self.lg_k);
        writer.put_u64(self.theta);
        writer.put_u32(self.hashes.len() as u32);
        for hash in &self.hashes {
            writer.put_u64(*hash);
        }
        writer.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (mut reader, _) = ByteReader::for_family(bytes, codec::FAMILY_THETA)?;
        let lg_k = reader.get_u8()?;
        if !(MIN_THETA_LG_K..=MAX_THETA_LG_K).contains(&lg_k) {
            return Err(Error::malformed_sketch(format!(
                "theta sketch lg_k {} out of range",
                lg_k
            )));
        }
        let theta = reader.get_u64()?;
        if theta == 0 {
            return Err(Error::malformed_sketch("theta sketch threshold is zero"));
        }
        let count = reader.get_u32()? as usize;
        if count > 1 << lg_k {
            return Err(Error::malformed_sketch(format!(
                "theta sketch retains {} hashes, nominal is {}",
                count,
                1u32 << lg_k
            )));
        }
        let mut hashes = BTreeSet::new();
        for _ in 0..count {
            let hash = reader.get_u64()?;
            if hash >= theta {
                return Err(Error::malformed_sketch(
                    "theta sketch retains a hash at or above its threshold",
                ));
            }
            hashes.insert(hash);
        }
        reader.expect_end()?;
        if hashes.len() != count {
            return Err(Error::malformed_sketch("theta sketch has duplicate hashes"));
        }
        Ok(Self {
            lg_k,
            theta,
            hashes,
        })
    }

    /// Intersection of two sketches.
    pub fn intersect(&self, other: &ThetaSketch) -> ThetaSketch {
        let theta = self.theta.min(other.theta);
        let hashes = self
            .hashes
            .iter()
            .filter(|hash| **hash < theta && other.hashes.contains(*hash))
            .copied()
            .collect();
        ThetaSketch {
            lg_k: self.lg_k.min(other.lg_k),
            theta,
            hashes,
        }
    }

    /// Set difference: retained entries of `self` absent from `other`.
    pub fn a_not_b(&self, other: &ThetaSketch) -> ThetaSketch {
        let theta = self.theta.min(other.theta);
        let hashes = self
            .hashes
            .iter()
            .filter(|hash| **hash < theta && !other.hashes.contains(*hash))
            .copied()
            .collect();
        ThetaSketch {
            lg_k: self.lg_k.min(other.lg_k),
            theta,
            hashes,
        }
    }
}

fn bound_factor(num_std_devs: u8) -> Result<f64> {
    if (1..=3).contains(&num_std_devs) {
        Ok(num_std_devs as f64)
    } else {
        Err(Error::invalid_query(format!(
            "number of standard deviations must be 1, 2 or 3, got {}",
            num_std_devs
        )))
    }
}

/// Associative union operator over [`ThetaSketch`]es.
#[derive(Debug, Clone)]
pub struct ThetaUnion {
    lg_k: u8,
    theta: u64,
    hashes: BTreeSet<u64>,
}

impl ThetaUnion {
    pub fn new(lg_k: u8) -> Self {
        debug_assert!((MIN_THETA_LG_K..=MAX_THETA_LG_K).contains(&lg_k));
        Self {
            lg_k,
            theta: MAX_THETA,
            hashes: BTreeSet::new(),
        }
    }

    pub fn update(&mut self, sketch: &ThetaSketch) {
        if sketch.theta < self.theta {
            self.theta = sketch.theta;
            let theta = self.theta;
            self.hashes.retain(|hash| *hash < theta);
        }
        for hash in &sketch.hashes {
            if *hash < self.theta {
                self.hashes.insert(*hash);
            }
        }
        while self.hashes.len() > 1 << self.lg_k {
            if let Some(largest) = self.hashes.pop_last() {
                self.theta = largest;
            }
        }
    }

    pub fn result(&self) -> ThetaSketch {
        ThetaSketch {
            lg_k: self.lg_k,
            theta: self.theta,
            hashes: self.hashes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_below_nominal() {
        let mut sketch = ThetaSketch::new(12);
        for i in 0..1000u64 {
            sketch.update(&i);
        }
        assert!(!sketch.is_estimation_mode());
        assert_eq!(sketch.estimate(), 1000.0);
        assert_eq!(sketch.lower_bound(2).unwrap(), 1000.0);
    }

    #[test]
    fn test_estimation_mode_accuracy() {
        let mut sketch = ThetaSketch::new(10);
        for i in 0..100_000u64 {
            sketch.update(&format!("key-{}", i));
        }
        assert!(sketch.is_estimation_mode());
        let estimate = sketch.estimate();
        assert!(
            (estimate - 100_000.0).abs() < 10_000.0,
            "estimate {}",
            estimate
        );
    }

    #[test]
    fn test_union_disjoint() {
        let mut left = ThetaSketch::new(12);
        let mut right = ThetaSketch::new(12);
        for i in 0..1000u64 {
            left.update(&format!("a{}", i));
            right.update(&format!("b{}", i));
        }
        let mut union = ThetaUnion::new(12);
        union.update(&left);
        union.update(&right);
        assert_eq!(union.result().estimate(), 2000.0);
    }

    #[test]
    fn test_intersect_and_difference() {
        let mut left = ThetaSketch::new(12);
        let mut right = ThetaSketch::new(12);
        for i in 0..1000u64 {
            left.update(&i);
        }
        for i in 500..1500u64 {
            right.update(&i);
        }
        let both = left.intersect(&right);
        assert_eq!(both.estimate(), 500.0);
        let only_left = left.a_not_b(&right);
        assert_eq!(only_left.estimate(), 500.0);
    }

    #[test]
    fn test_round_trip() {
        let mut sketch = ThetaSketch::new(8);
        for i in 0..10_000u64 {
            sketch.update(&i);
        }
        let blob = sketch.serialize();
        let restored = ThetaSketch::deserialize(&blob).unwrap();
        assert_eq!(restored.estimate(), sketch.estimate());
        assert_eq!(restored.num_retained(), sketch.num_retained());
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn test_corrupted_blob() {
        let mut sketch = ThetaSketch::new(8);
        sketch.update(&1u64);
        let mut blob = sketch.serialize();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        // Either the hash moves above theta or the payload no longer parses.
        let result = ThetaSketch::deserialize(&blob);
        if let Ok(restored) = result {
            assert_eq!(restored.num_retained(), 1);
        }
        blob.truncate(6);
        assert!(ThetaSketch::deserialize(&blob).is_err());
    }
}
