use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};
use ketchsql_sketch::theta::{
    DEFAULT_THETA_LG_K, MAX_THETA_LG_K, MIN_THETA_LG_K, ThetaSketch, ThetaUnion,
};

use super::bind::{self, AggregateArg};
use super::common::value_hash;
use super::state::{SketchAccumulator, SketchFamily, SketchMergeAccumulator};
use super::{Accumulator, AggregateFunction};
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThetaConfig {
    pub lg_k: u8,
}

impl Default for ThetaConfig {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_THETA_LG_K,
        }
    }
}

fn resolve_config(name: &str, args: &mut Vec<AggregateArg>) -> Result<ThetaConfig> {
    let lg_k = bind::take_resolution(name, args, i64::from(DEFAULT_THETA_LG_K))?;
    let lg_k = u8::try_from(lg_k).map_err(|_| {
        Error::invalid_configuration(format!(
            "{} lg_k must be in [{}, {}], got {}",
            name, MIN_THETA_LG_K, MAX_THETA_LG_K, lg_k
        ))
    })?;
    let config = ThetaConfig { lg_k };
    ThetaFamily::validate(config)?;
    Ok(config)
}

pub struct ThetaFamily;

impl SketchFamily for ThetaFamily {
    type Config = ThetaConfig;
    type Sketch = ThetaSketch;
    type Union = ThetaUnion;

    const NAME: &'static str = "SKETCH_THETA";

    fn validate(config: Self::Config) -> Result<()> {
        if (MIN_THETA_LG_K..=MAX_THETA_LG_K).contains(&config.lg_k) {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "SKETCH_THETA lg_k must be in [{}, {}], got {}",
                MIN_THETA_LG_K, MAX_THETA_LG_K, config.lg_k
            )))
        }
    }

    fn create(config: Self::Config) -> Self::Sketch {
        ThetaSketch::new(config.lg_k)
    }

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()> {
        sketch.update_hash(value_hash(value));
        Ok(())
    }

    fn update_repeat(sketch: &mut Self::Sketch, value: &Value, _count: u64) -> Result<()> {
        // Distinct counting: a run of identical values is one update.
        sketch.update_hash(value_hash(value));
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8> {
        sketch.serialize()
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch> {
        ThetaSketch::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        ThetaUnion::new(config.lg_k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.update(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.result()
    }
}

/// `SKETCH_THETA(value)` / `SKETCH_THETA(lg_k, value)`.
#[derive(Debug, Clone, Default)]
pub struct ThetaSketchFunction {
    config: ThetaConfig,
}

impl ThetaSketchFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_THETA", args)?;
        bind::data_arg_type("SKETCH_THETA", args)?;
        Ok(Self { config })
    }
}

impl AggregateFunction for ThetaSketchFunction {
    fn name(&self) -> &str {
        "SKETCH_THETA"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Unknown]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchAccumulator::<ThetaFamily>::new(self.config))
    }
}

/// `SKETCH_THETA_MERGE(blob)` / `SKETCH_THETA_MERGE(lg_k, blob)`.
#[derive(Debug, Clone, Default)]
pub struct ThetaSketchMergeFunction {
    config: ThetaConfig,
}

impl ThetaSketchMergeFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_THETA_MERGE", args)?;
        match bind::data_arg_type("SKETCH_THETA_MERGE", args)? {
            DataType::Bytes | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("BYTES", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for ThetaSketchMergeFunction {
    fn name(&self) -> &str {
        "SKETCH_THETA_MERGE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Bytes]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchMergeAccumulator::<ThetaFamily>::new(self.config))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_aggregate(
        "SKETCH_THETA".to_string(),
        Rc::new(ThetaSketchFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_THETA", |args| {
        Ok(Rc::new(ThetaSketchFunction::bind(args)?))
    });
    registry.register_aggregate(
        "SKETCH_THETA_MERGE".to_string(),
        Rc::new(ThetaSketchMergeFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_THETA_MERGE", |args| {
        Ok(Rc::new(ThetaSketchMergeFunction::bind(args)?))
    });
}
