use std::any::Any;
use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};
use ketchsql_sketch::codec;
use ketchsql_sketch::quantile::{
    DEFAULT_QUANTILE_K, MAX_QUANTILE_K, MIN_QUANTILE_K, QuantilesSketch,
};

use super::bind::{self, AggregateArg};
use super::common::numeric_value_to_f64;
use super::state::{SketchAccumulator, SketchFamily, SketchState};
use super::{Accumulator, AggregateFunction};
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantilesConfig {
    pub k: u16,
}

impl Default for QuantilesConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_QUANTILE_K,
        }
    }
}

fn validate_config(config: QuantilesConfig) -> Result<()> {
    if (MIN_QUANTILE_K..=MAX_QUANTILE_K).contains(&config.k) {
        Ok(())
    } else {
        Err(Error::invalid_configuration(format!(
            "SKETCH_QUANTILE k must be in [{}, {}], got {}",
            MIN_QUANTILE_K, MAX_QUANTILE_K, config.k
        )))
    }
}

fn resolve_config(name: &str, args: &mut Vec<AggregateArg>) -> Result<QuantilesConfig> {
    let k = bind::take_resolution(name, args, i64::from(DEFAULT_QUANTILE_K))?;
    let k = u16::try_from(k).map_err(|_| {
        Error::invalid_configuration(format!(
            "{} k must be in [{}, {}], got {}",
            name, MIN_QUANTILE_K, MAX_QUANTILE_K, k
        ))
    })?;
    let config = QuantilesConfig { k };
    validate_config(config)?;
    Ok(config)
}

pub struct QuantileInt64Family;

impl SketchFamily for QuantileInt64Family {
    type Config = QuantilesConfig;
    type Sketch = QuantilesSketch<i64>;
    type Union = QuantilesSketch<i64>;

    const NAME: &'static str = "SKETCH_QUANTILE";

    fn validate(config: Self::Config) -> Result<()> {
        validate_config(config)
    }

    fn create(config: Self::Config) -> Self::Sketch {
        QuantilesSketch::new(config.k)
    }

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()> {
        let item = value
            .as_i64()
            .ok_or_else(|| Error::type_mismatch_value("INT64", value))?;
        sketch.update(item);
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8> {
        sketch.serialize()
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch> {
        QuantilesSketch::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        QuantilesSketch::new(config.k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.merge(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.clone()
    }
}

pub struct QuantileFloat64Family;

impl SketchFamily for QuantileFloat64Family {
    type Config = QuantilesConfig;
    type Sketch = QuantilesSketch<f64>;
    type Union = QuantilesSketch<f64>;

    const NAME: &'static str = "SKETCH_QUANTILE";

    fn validate(config: Self::Config) -> Result<()> {
        validate_config(config)
    }

    fn create(config: Self::Config) -> Self::Sketch {
        QuantilesSketch::new(config.k)
    }

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()> {
        let item = numeric_value_to_f64(value)?
            .ok_or_else(|| Error::internal("null input reached a sketch update"))?;
        sketch.update(item);
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8> {
        sketch.serialize()
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch> {
        QuantilesSketch::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        QuantilesSketch::new(config.k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.merge(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.clone()
    }
}

/// `SKETCH_QUANTILE(value)` / `SKETCH_QUANTILE(k, value)`: builds a
/// quantiles sketch from raw values.
#[derive(Debug, Clone)]
pub struct QuantileSketchFunction {
    config: QuantilesConfig,
    embedded: DataType,
}

impl QuantileSketchFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_QUANTILE", args)?;
        let embedded = match bind::data_arg_type("SKETCH_QUANTILE", args)? {
            DataType::Float64 | DataType::Numeric(_) => DataType::Float64,
            DataType::Int64 | DataType::Unknown => DataType::Int64,
            other => return Err(Error::type_mismatch("INT64 or FLOAT64", other)),
        };
        Ok(Self { config, embedded })
    }
}

impl Default for QuantileSketchFunction {
    fn default() -> Self {
        Self {
            config: QuantilesConfig::default(),
            embedded: DataType::Int64,
        }
    }
}

impl AggregateFunction for QuantileSketchFunction {
    fn name(&self) -> &str {
        "SKETCH_QUANTILE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Unknown]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        match self.embedded {
            DataType::Float64 => {
                Box::new(SketchAccumulator::<QuantileFloat64Family>::new(self.config))
            }
            _ => Box::new(SketchAccumulator::<QuantileInt64Family>::new(self.config)),
        }
    }
}

/// `SKETCH_QUANTILE_MERGE(blob)` / `SKETCH_QUANTILE_MERGE(k, blob)`:
/// unions already-serialized quantiles sketches.
#[derive(Debug, Clone, Default)]
pub struct QuantileSketchMergeFunction {
    config: QuantilesConfig,
}

impl QuantileSketchMergeFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_QUANTILE_MERGE", args)?;
        match bind::data_arg_type("SKETCH_QUANTILE_MERGE", args)? {
            DataType::Bytes | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("BYTES", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for QuantileSketchMergeFunction {
    fn name(&self) -> &str {
        "SKETCH_QUANTILE_MERGE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Bytes]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(QuantileMergeAccumulator::new(self.config))
    }
}

#[derive(Clone)]
enum QuantileMergeState {
    Empty,
    Int64(SketchState<QuantileInt64Family>),
    Float64(SketchState<QuantileFloat64Family>),
}

/// The merge path discovers the embedded item type from the first blob's
/// item-type tag; sketches with mixed item types never merge.
pub struct QuantileMergeAccumulator {
    config: QuantilesConfig,
    state: QuantileMergeState,
}

impl QuantileMergeAccumulator {
    pub fn new(config: QuantilesConfig) -> Self {
        Self {
            config,
            state: QuantileMergeState::Empty,
        }
    }
}

impl Accumulator for QuantileMergeAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let bytes = value
            .as_bytes()
            .ok_or_else(|| Error::type_mismatch_value("BYTES", value))?;
        let (family, item_tag) = codec::peek_preamble(bytes)?;
        if family != codec::FAMILY_QUANTILE {
            return Err(Error::malformed_sketch(
                "SKETCH_QUANTILE_MERGE expects a quantiles sketch blob",
            ));
        }
        match (&mut self.state, item_tag) {
            (QuantileMergeState::Int64(state), codec::ITEM_TAG_INT64) => {
                state.merge_blob(self.config, bytes)
            }
            (QuantileMergeState::Float64(state), codec::ITEM_TAG_FLOAT64) => {
                state.merge_blob(self.config, bytes)
            }
            (QuantileMergeState::Empty, codec::ITEM_TAG_INT64) => {
                let mut state = SketchState::new();
                state.merge_blob(self.config, bytes)?;
                self.state = QuantileMergeState::Int64(state);
                Ok(())
            }
            (QuantileMergeState::Empty, codec::ITEM_TAG_FLOAT64) => {
                let mut state = SketchState::new();
                state.merge_blob(self.config, bytes)?;
                self.state = QuantileMergeState::Float64(state);
                Ok(())
            }
            _ => Err(Error::malformed_sketch(
                "quantiles sketches with different item types cannot be merged",
            )),
        }
    }

    fn merge(&mut self, other: &dyn Accumulator) -> Result<()> {
        let other = other.as_any().downcast_ref::<Self>().ok_or_else(|| {
            Error::internal("Invalid accumulator type for SKETCH_QUANTILE_MERGE merge")
        })?;
        match (&mut self.state, &other.state) {
            (_, QuantileMergeState::Empty) => Ok(()),
            (QuantileMergeState::Empty, source) => {
                self.state = source.clone();
                Ok(())
            }
            (QuantileMergeState::Int64(target), QuantileMergeState::Int64(source)) => {
                target.combine(source, self.config);
                Ok(())
            }
            (QuantileMergeState::Float64(target), QuantileMergeState::Float64(source)) => {
                target.combine(source, self.config);
                Ok(())
            }
            _ => Err(Error::malformed_sketch(
                "quantiles sketches with different item types cannot be merged",
            )),
        }
    }

    fn finalize(&self) -> Result<Value> {
        let bytes = match &self.state {
            QuantileMergeState::Empty => None,
            QuantileMergeState::Int64(state) => state.finalize(),
            QuantileMergeState::Float64(state) => state.finalize(),
        };
        Ok(match bytes {
            Some(bytes) => Value::bytes(bytes),
            None => Value::null(),
        })
    }

    fn reset(&mut self) {
        self.state = QuantileMergeState::Empty;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_aggregate(
        "SKETCH_QUANTILE".to_string(),
        Rc::new(QuantileSketchFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_QUANTILE", |args| {
        Ok(Rc::new(QuantileSketchFunction::bind(args)?))
    });
    registry.register_aggregate(
        "SKETCH_QUANTILE_MERGE".to_string(),
        Rc::new(QuantileSketchMergeFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_QUANTILE_MERGE", |args| {
        Ok(Rc::new(QuantileSketchMergeFunction::bind(args)?))
    });
}
