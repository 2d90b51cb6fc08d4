use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};
use ketchsql_sketch::tdigest::{DEFAULT_TDIGEST_K, MAX_TDIGEST_K, MIN_TDIGEST_K, TDigest};

use super::bind::{self, AggregateArg};
use super::common::numeric_value_to_f64;
use super::state::{SketchAccumulator, SketchFamily, SketchMergeAccumulator};
use super::{Accumulator, AggregateFunction};
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TDigestConfig {
    pub k: u16,
}

impl Default for TDigestConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_TDIGEST_K,
        }
    }
}

fn resolve_config(name: &str, args: &mut Vec<AggregateArg>) -> Result<TDigestConfig> {
    let k = bind::take_resolution(name, args, i64::from(DEFAULT_TDIGEST_K))?;
    let k = u16::try_from(k).map_err(|_| {
        Error::invalid_configuration(format!(
            "{} k must be in [{}, {}], got {}",
            name, MIN_TDIGEST_K, MAX_TDIGEST_K, k
        ))
    })?;
    let config = TDigestConfig { k };
    TDigestFamily::validate(config)?;
    Ok(config)
}

pub struct TDigestFamily;

impl SketchFamily for TDigestFamily {
    type Config = TDigestConfig;
    type Sketch = TDigest;
    type Union = TDigest;

    const NAME: &'static str = "SKETCH_TDIGEST";

    fn validate(config: Self::Config) -> Result<()> {
        if (MIN_TDIGEST_K..=MAX_TDIGEST_K).contains(&config.k) {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "SKETCH_TDIGEST k must be in [{}, {}], got {}",
                MIN_TDIGEST_K, MAX_TDIGEST_K, config.k
            )))
        }
    }

    fn create(config: Self::Config) -> Self::Sketch {
        TDigest::new(config.k)
    }

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()> {
        let item = numeric_value_to_f64(value)?
            .ok_or_else(|| Error::internal("null input reached a sketch update"))?;
        sketch.add(item);
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8> {
        sketch.serialize()
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch> {
        TDigest::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        TDigest::new(config.k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.merge(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.clone()
    }
}

/// `SKETCH_TDIGEST(value)` / `SKETCH_TDIGEST(k, value)`.
#[derive(Debug, Clone, Default)]
pub struct TDigestSketchFunction {
    config: TDigestConfig,
}

impl TDigestSketchFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_TDIGEST", args)?;
        match bind::data_arg_type("SKETCH_TDIGEST", args)? {
            DataType::Int64 | DataType::Float64 | DataType::Numeric(_) | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("NUMERIC", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for TDigestSketchFunction {
    fn name(&self) -> &str {
        "SKETCH_TDIGEST"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Unknown]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchAccumulator::<TDigestFamily>::new(self.config))
    }
}

/// `SKETCH_TDIGEST_MERGE(blob)` / `SKETCH_TDIGEST_MERGE(k, blob)`.
#[derive(Debug, Clone, Default)]
pub struct TDigestSketchMergeFunction {
    config: TDigestConfig,
}

impl TDigestSketchMergeFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_TDIGEST_MERGE", args)?;
        match bind::data_arg_type("SKETCH_TDIGEST_MERGE", args)? {
            DataType::Bytes | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("BYTES", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for TDigestSketchMergeFunction {
    fn name(&self) -> &str {
        "SKETCH_TDIGEST_MERGE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Bytes]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchMergeAccumulator::<TDigestFamily>::new(self.config))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_aggregate(
        "SKETCH_TDIGEST".to_string(),
        Rc::new(TDigestSketchFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_TDIGEST", |args| {
        Ok(Rc::new(TDigestSketchFunction::bind(args)?))
    });
    registry.register_aggregate(
        "SKETCH_TDIGEST_MERGE".to_string(),
        Rc::new(TDigestSketchMergeFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_TDIGEST_MERGE", |args| {
        Ok(Rc::new(TDigestSketchMergeFunction::bind(args)?))
    });
}
