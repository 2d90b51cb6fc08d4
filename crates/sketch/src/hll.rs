//! HyperLogLog distinct-count sketch with 8-bit registers.
//!
//! The register array has `2^lg_k` slots; each update routes a 64-bit item
//! hash to one slot and records the longest run of leading zero bits seen
//! there. Merging is a register-wise maximum, which goes through
//! [`HllUnion`] so sketches of different precision coarsen to the smaller
//! register array first.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ketchsql_common::error::{Error, Result};

use crate::codec::{self, ByteReader, ByteWriter};

pub const DEFAULT_HLL_LG_K: u8 = 12;
pub const MIN_HLL_LG_K: u8 = 4;
pub const MAX_HLL_LG_K: u8 = 21;

pub(crate) fn hash_item<T: Hash + ?Sized>(item: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    item.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct HllSketch {
    lg_k: u8,
    registers: Vec<u8>,
}

impl HllSketch {
    pub fn new(lg_k: u8) -> Self {
        debug_assert!((MIN_HLL_LG_K..=MAX_HLL_LG_K).contains(&lg_k));
        Self {
            lg_k,
            registers: vec![0; 1 << lg_k],
        }
    }

    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    pub fn update<T: Hash + ?Sized>(&mut self, item: &T) {
        self.update_hash(hash_item(item));
    }

    pub fn update_hash(&mut self, hash: u64) {
        let index = (hash >> (64 - self.lg_k)) as usize;
        let tail = hash << self.lg_k;
        let rho = (tail.leading_zeros() as u8 + 1).min(64 - self.lg_k + 1);
        if rho > self.registers[index] {
            self.registers[index] = rho;
        }
    }

    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for &register in &self.registers {
            sum += 1.0 / (1u64 << register.min(63)) as f64;
            if register == 0 {
                zeros += 1;
            }
        }
        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            len => 0.7213 / (1.0 + 1.079 / len as f64),
        };
        let raw = alpha * m * m / sum;
        if raw <= 2.5 * m && zeros > 0 {
            // Linear counting is more accurate while most registers are cold.
            m * (m / zeros as f64).ln()
        } else {
            raw
        }
    }

    /// Relative standard error for this precision.
    pub fn relative_error(&self) -> f64 {
        1.04 / (self.registers.len() as f64).sqrt()
    }

    pub fn lower_bound(&self, num_std_devs: u8) -> Result<f64> {
        let factor = bound_factor(num_std_devs)?;
        Ok(self.estimate() / (1.0 + factor * self.relative_error()))
    }

    pub fn upper_bound(&self, num_std_devs: u8) -> Result<f64> {
        let factor = bound_factor(num_std_devs)?;
        let denominator = 1.0 - factor * self.relative_error();
        if denominator <= 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(self.estimate() / denominator)
    }

    pub fn to_string_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("### HLL sketch summary:\n");
        out.push_str(&format!("   lg k         : {}\n", self.lg_k));
        out.push_str(&format!("   registers    : {}\n", self.registers.len()));
        out.push_str(&format!("   empty        : {}\n", self.is_empty()));
        out.push_str(&format!("   estimate     : {:.3}\n", self.estimate()));
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_preamble(codec::FAMILY_HLL, codec::ITEM_TAG_NONE);
        writer.put_u8(self.lg_k);
        writer.put_bytes(&self.registers);
        writer.into_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (mut reader, _) = ByteReader::for_family(bytes, codec::FAMILY_HLL)?;
        let lg_k = reader.get_u8()?;
        if !(MIN_HLL_LG_K..=MAX_HLL_LG_K).contains(&lg_k) {
            return Err(Error::malformed_sketch(format!(
                "hll sketch lg_k {} out of range",
                lg_k
            )));
        }
        let registers = reader.get_bytes(1 << lg_k)?.to_vec();
        reader.expect_end()?;
        let max_rho = 64 - lg_k + 1;
        if registers.iter().any(|&r| r > max_rho) {
            return Err(Error::malformed_sketch("hll register value out of range"));
        }
        Ok(Self { lg_k, registers })
    }

    /// Folds this sketch down to a smaller register array by register-wise
    /// maximum. Coarsening trades accuracy for mergeability.
    fn coarsen_to(&self, lg_k: u8) -> HllSketch {
        if lg_k >= self.lg_k {
            return self.clone();
        }
        let mut folded = HllSketch::new(lg_k);
        let shift = self.lg_k - lg_k;
        for (index, &register) in self.registers.iter().enumerate() {
            let target = index >> shift;
            if register > folded.registers[target] {
                folded.registers[target] = register;
            }
        }
        folded
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

/// Associative union operator over [`HllSketch`]es.
#[derive(Debug, Clone)]
pub struct HllUnion {
    lg_max_k: u8,
    state: Option<HllSketch>,
}

impl HllUnion {
    pub fn new(lg_max_k: u8) -> Self {
        debug_assert!((MIN_HLL_LG_K..=MAX_HLL_LG_K).contains(&lg_max_k));
        Self {
            lg_max_k,
            state: None,
        }
    }

    pub fn update(&mut self, sketch: &HllSketch) {
        let incoming_lg_k = sketch.lg_k.min(self.lg_max_k);
        match &mut self.state {
            None => {
                self.state = Some(sketch.coarsen_to(incoming_lg_k));
            }
            Some(current) => {
                if incoming_lg_k < current.lg_k {
                    *current = current.coarsen_to(incoming_lg_k);
                }
                let folded = sketch.coarsen_to(current.lg_k);
                for (target, source) in current.registers.iter_mut().zip(&folded.registers) {
                    if *source > *target {
                        *target = *source;
                    }
                }
            }
        }
    }

    pub fn result(&self) -> HllSketch {
        match &self.state {
            Some(sketch) => sketch.clone(),
            None => HllSketch::new(self.lg_max_k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_within_error() {
        let mut sketch = HllSketch::new(12);
        for i in 0..10_000u64 {
            sketch.update(&format!("item-{}", i));
        }
        let estimate = sketch.estimate();
        assert!(
            (estimate - 10_000.0).abs() < 1000.0,
            "estimate {}",
            estimate
        );
        assert!(sketch.lower_bound(2).unwrap() <= estimate);
        assert!(sketch.upper_bound(2).unwrap() >= estimate);
    }

    #[test]
    fn test_duplicates_do_not_grow() {
        let mut sketch = HllSketch::new(12);
        for _ in 0..1000 {
            sketch.update("same");
        }
        let estimate = sketch.estimate();
        assert!(estimate < 3.0, "estimate {}", estimate);
    }

    #[test]
    fn test_union_of_disjoint_sets() {
        let mut left = HllSketch::new(12);
        let mut right = HllSketch::new(12);
        for i in 0..1000u64 {
            left.update(&format!("left-{}", i));
            right.update(&format!("right-{}", i));
        }
        let mut union = HllUnion::new(12);
        union.update(&left);
        union.update(&right);
        let estimate = union.result().estimate();
        assert!((estimate - 2000.0).abs() < 300.0, "estimate {}", estimate);
    }

    #[test]
    fn test_union_coarsens_mixed_precision() {
        let mut fine = HllSketch::new(14);
        let mut coarse = HllSketch::new(10);
        for i in 0..500u64 {
            fine.update(&i);
            coarse.update(&(i + 250));
        }
        let mut union = HllUnion::new(14);
        union.update(&fine);
        union.update(&coarse);
        let result = union.result();
        assert_eq!(result.lg_k(), 10);
        let estimate = result.estimate();
        assert!((estimate - 750.0).abs() < 150.0, "estimate {}", estimate);
    }

    #[test]
    fn test_round_trip() {
        let mut sketch = HllSketch::new(10);
        for i in 0..5000u64 {
            sketch.update(&i);
        }
        let blob = sketch.serialize();
        let restored = HllSketch::deserialize(&blob).unwrap();
        assert_eq!(restored.estimate(), sketch.estimate());
        assert_eq!(restored.serialize(), blob);
    }

    #[test]
    fn test_bad_blob() {
        assert!(HllSketch::deserialize(b"garbage bytes").is_err());
        let mut sketch = HllSketch::new(10);
        sketch.update(&1u64);
        let mut blob = sketch.serialize();
        blob.truncate(10);
        assert!(HllSketch::deserialize(&blob).is_err());
    }
}
