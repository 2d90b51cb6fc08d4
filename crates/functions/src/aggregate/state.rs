//! The per-group aggregation state machine shared by every sketch family.
//!
//! A group state is one of three things: nothing has been ingested yet, a
//! plain sketch being built from raw values, or the family's union
//! accumulator once serialized sketches have been merged in. Promotion from
//! plain sketch to union happens only when a genuine cross-source merge
//! requires it. Families whose merge is an associative in-place operation
//! use the sketch itself as the union type.

use std::any::Any;
use std::fmt;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::Value;

use super::Accumulator;

pub trait SketchFamily: 'static {
    type Config: Copy + fmt::Debug + PartialEq + 'static;
    type Sketch: Clone + 'static;
    type Union: Clone + 'static;

    const NAME: &'static str;

    fn validate(config: Self::Config) -> Result<()>;

    fn create(config: Self::Config) -> Self::Sketch;

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()>;

    /// Applies a run of identical values. Overrides must stay observably
    /// identical to the sequential loop.
    fn update_repeat(sketch: &mut Self::Sketch, value: &Value, count: u64) -> Result<()> {
        for _ in 0..count {
            Self::update(sketch, value)?;
        }
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8>;

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch>;

    fn new_union(config: Self::Config) -> Self::Union;

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch);

    fn union_result(union: &Self::Union) -> Self::Sketch;
}

pub enum SketchState<F: SketchFamily> {
    Empty,
    Sketch(F::Sketch),
    Union(F::Union),
}

impl<F: SketchFamily> Default for SketchState<F> {
    fn default() -> Self {
        SketchState::Empty
    }
}

impl<F: SketchFamily> Clone for SketchState<F> {
    fn clone(&self) -> Self {
        match self {
            SketchState::Empty => SketchState::Empty,
            SketchState::Sketch(sketch) => SketchState::Sketch(sketch.clone()),
            SketchState::Union(union) => SketchState::Union(union.clone()),
        }
    }
}

impl<F: SketchFamily> SketchState<F> {
    pub fn new() -> Self {
        SketchState::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SketchState::Empty)
    }

    /// Create-path ingestion: lazily constructs the sketch, then applies
    /// the raw value.
    pub fn update(&mut self, config: F::Config, value: &Value) -> Result<()> {
        match self {
            SketchState::Empty => {
                let mut sketch = F::create(config);
                F::update(&mut sketch, value)?;
                *self = SketchState::Sketch(sketch);
                Ok(())
            }
            SketchState::Sketch(sketch) => F::update(sketch, value),
            SketchState::Union(union) => {
                // Raw values arriving after a merge still land in the union.
                let mut singleton = F::create(config);
                F::update(&mut singleton, value)?;
                F::union_update(union, &singleton);
                Ok(())
            }
        }
    }

    pub fn update_repeat(&mut self, config: F::Config, value: &Value, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        match self {
            SketchState::Empty => {
                let mut sketch = F::create(config);
                F::update_repeat(&mut sketch, value, count)?;
                *self = SketchState::Sketch(sketch);
                Ok(())
            }
            SketchState::Sketch(sketch) => F::update_repeat(sketch, value, count),
            SketchState::Union(union) => {
                let mut singleton = F::create(config);
                F::update_repeat(&mut singleton, value, count)?;
                F::union_update(union, &singleton);
                Ok(())
            }
        }
    }

    /// Merge-path ingestion: deserializes an incoming blob and unions it
    /// into this group. A malformed or foreign blob fails the operation.
    pub fn merge_blob(&mut self, config: F::Config, bytes: &[u8]) -> Result<()> {
        let incoming = F::deserialize(bytes)?;
        self.absorb(config, &incoming);
        Ok(())
    }

    fn absorb(&mut self, config: F::Config, sketch: &F::Sketch) {
        match std::mem::replace(self, SketchState::Empty) {
            SketchState::Empty => {
                let mut union = F::new_union(config);
                F::union_update(&mut union, sketch);
                *self = SketchState::Union(union);
            }
            SketchState::Sketch(existing) => {
                // First genuine cross-source merge: promote to the union.
                let mut union = F::new_union(config);
                F::union_update(&mut union, &existing);
                F::union_update(&mut union, sketch);
                *self = SketchState::Union(union);
            }
            SketchState::Union(mut union) => {
                F::union_update(&mut union, sketch);
                *self = SketchState::Union(union);
            }
        }
    }

    /// Cross-partition reduction. An empty source is a no-op; an empty
    /// target adopts the source's content.
    pub fn combine(&mut self, source: &SketchState<F>, config: F::Config) {
        match source {
            SketchState::Empty => {}
            _ if self.is_empty() => {
                *self = source.clone();
            }
            SketchState::Sketch(sketch) => self.absorb(config, sketch),
            SketchState::Union(union) => self.absorb(config, &F::union_result(union)),
        }
    }

    /// Serializes the group result, or `None` for a group that saw no
    /// non-null input.
    pub fn finalize(&self) -> Option<Vec<u8>> {
        match self {
            SketchState::Empty => None,
            SketchState::Sketch(sketch) => Some(F::serialize(sketch)),
            SketchState::Union(union) => Some(F::serialize(&F::union_result(union))),
        }
    }

    /// Releases the owned sketch. Idempotent, callable in any state.
    pub fn reset(&mut self) {
        *self = SketchState::Empty;
    }
}

/// Create-path accumulator: builds a sketch from raw column values.
pub struct SketchAccumulator<F: SketchFamily> {
    config: F::Config,
    state: SketchState<F>,
}

impl<F: SketchFamily> SketchAccumulator<F> {
    pub fn new(config: F::Config) -> Self {
        Self {
            config,
            state: SketchState::new(),
        }
    }
}

impl<F: SketchFamily> Accumulator for SketchAccumulator<F> {
    fn accumulate(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.state.update(self.config, value)
    }

    fn accumulate_repeat(&mut self, value: &Value, count: u64) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.state.update_repeat(self.config, value, count)
    }

    fn merge(&mut self, other: &dyn Accumulator) -> Result<()> {
        let other = other.as_any().downcast_ref::<Self>().ok_or_else(|| {
            Error::internal(format!("Invalid accumulator type for {} merge", F::NAME))
        })?;
        self.state.combine(&other.state, self.config);
        Ok(())
    }

    fn finalize(&self) -> Result<Value> {
        Ok(match self.state.finalize() {
            Some(bytes) => Value::bytes(bytes),
            None => Value::null(),
        })
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Merge-path accumulator: unions already-serialized sketches.
pub struct SketchMergeAccumulator<F: SketchFamily> {
    config: F::Config,
    state: SketchState<F>,
}

impl<F: SketchFamily> SketchMergeAccumulator<F> {
    pub fn new(config: F::Config) -> Self {
        Self {
            config,
            state: SketchState::new(),
        }
    }
}

impl<F: SketchFamily> Accumulator for SketchMergeAccumulator<F> {
    fn accumulate(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let bytes = value
            .as_bytes()
            .ok_or_else(|| Error::type_mismatch_value("BYTES", value))?;
        self.state.merge_blob(self.config, bytes)
    }

    fn merge(&mut self, other: &dyn Accumulator) -> Result<()> {
        let other = other.as_any().downcast_ref::<Self>().ok_or_else(|| {
            Error::internal(format!("Invalid accumulator type for {} merge", F::NAME))
        })?;
        self.state.combine(&other.state, self.config);
        Ok(())
    }

    fn finalize(&self) -> Result<Value> {
        Ok(match self.state.finalize() {
            Some(bytes) => Value::bytes(bytes),
            None => Value::null(),
        })
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::super::hll::{HllConfig, HllFamily};
    use super::*;

    fn updated(config: HllConfig, values: &[i64]) -> SketchState<HllFamily> {
        let mut state = SketchState::new();
        for v in values {
            state.update(config, &Value::int64(*v)).unwrap();
        }
        state
    }

    #[test]
    fn test_empty_finalizes_to_none() {
        let state: SketchState<HllFamily> = SketchState::new();
        assert!(state.finalize().is_none());
    }

    #[test]
    fn test_update_creates_lazily() {
        let config = HllConfig { lg_k: 10 };
        let state = updated(config, &[1, 2, 3]);
        assert!(!state.is_empty());
        assert!(state.finalize().is_some());
    }

    #[test]
    fn test_combine_empty_source_is_noop() {
        let config = HllConfig { lg_k: 10 };
        let mut target = updated(config, &[1, 2, 3]);
        let before = target.finalize().unwrap();
        let empty = SketchState::new();
        target.combine(&empty, config);
        assert_eq!(target.finalize().unwrap(), before);
    }

    #[test]
    fn test_combine_empty_target_adopts_source() {
        let config = HllConfig { lg_k: 10 };
        let source = updated(config, &[1, 2, 3]);
        let mut target = SketchState::new();
        target.combine(&source, config);
        assert_eq!(target.finalize(), source.finalize());
    }

    #[test]
    fn test_merge_blob_promotes_to_union() {
        let config = HllConfig { lg_k: 10 };
        let mut state = updated(config, &[1, 2, 3]);
        assert!(matches!(state, SketchState::Sketch(_)));
        let blob = updated(config, &[4, 5]).finalize().unwrap();
        state.merge_blob(config, &blob).unwrap();
        assert!(matches!(state, SketchState::Union(_)));
    }

    #[test]
    fn test_merge_blob_rejects_garbage() {
        let config = HllConfig { lg_k: 10 };
        let mut state: SketchState<HllFamily> = SketchState::new();
        let err = state.merge_blob(config, b"definitely not a sketch");
        assert!(matches!(err, Err(Error::MalformedSketch(_))));
        assert!(state.is_empty());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let config = HllConfig { lg_k: 10 };
        let mut state = updated(config, &[1]);
        state.reset();
        assert!(state.is_empty());
        state.reset();
        assert!(state.is_empty());
    }
}
