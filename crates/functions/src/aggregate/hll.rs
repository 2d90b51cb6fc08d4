use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};
use ketchsql_sketch::hll::{DEFAULT_HLL_LG_K, HllSketch, HllUnion, MAX_HLL_LG_K, MIN_HLL_LG_K};

use super::bind::{self, AggregateArg};
use super::common::value_hash;
use super::state::{SketchAccumulator, SketchFamily, SketchMergeAccumulator};
use super::{Accumulator, AggregateFunction};
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HllConfig {
    pub lg_k: u8,
}

impl Default for HllConfig {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_HLL_LG_K,
        }
    }
}

fn resolve_config(name: &str, args: &mut Vec<AggregateArg>) -> Result<HllConfig> {
    let lg_k = bind::take_resolution(name, args, i64::from(DEFAULT_HLL_LG_K))?;
    let lg_k = u8::try_from(lg_k).map_err(|_| {
        Error::invalid_configuration(format!(
            "{} lg_k must be in [{}, {}], got {}",
            name, MIN_HLL_LG_K, MAX_HLL_LG_K, lg_k
        ))
    })?;
    let config = HllConfig { lg_k };
    HllFamily::validate(config)?;
    Ok(config)
}

pub struct HllFamily;

impl SketchFamily for HllFamily {
    type Config = HllConfig;
    type Sketch = HllSketch;
    type Union = HllUnion;

    const NAME: &'static str = "SKETCH_HLL";

    fn validate(config: Self::Config) -> Result<()> {
        if (MIN_HLL_LG_K..=MAX_HLL_LG_K).contains(&config.lg_k) {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "SKETCH_HLL lg_k must be in [{}, {}], got {}",
                MIN_HLL_LG_K, MAX_HLL_LG_K, config.lg_k
            )))
        }
    }

    fn create(config: Self::Config) -> Self::Sketch {
        HllSketch::new(config.lg_k)
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
        HllSketch::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        HllUnion::new(config.lg_k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.update(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.result()
    }
}

/// `SKETCH_HLL(value)` / `SKETCH_HLL(lg_k, value)`.
#[derive(Debug, Clone, Default)]
pub struct HllSketchFunction {
    config: HllConfig,
}

impl HllSketchFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_HLL", args)?;
        bind::data_arg_type("SKETCH_HLL", args)?;
        Ok(Self { config })
    }
}

impl AggregateFunction for HllSketchFunction {
    fn name(&self) -> &str {
        "SKETCH_HLL"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Unknown]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchAccumulator::<HllFamily>::new(self.config))
    }
}

/// `SKETCH_HLL_MERGE(blob)` / `SKETCH_HLL_MERGE(lg_k, blob)`.
#[derive(Debug, Clone, Default)]
pub struct HllSketchMergeFunction {
    config: HllConfig,
}

impl HllSketchMergeFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_HLL_MERGE", args)?;
        match bind::data_arg_type("SKETCH_HLL_MERGE", args)? {
            DataType::Bytes | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("BYTES", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for HllSketchMergeFunction {
    fn name(&self) -> &str {
        "SKETCH_HLL_MERGE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Bytes]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchMergeAccumulator::<HllFamily>::new(self.config))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_aggregate(
        "SKETCH_HLL".to_string(),
        Rc::new(HllSketchFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_HLL", |args| {
        Ok(Rc::new(HllSketchFunction::bind(args)?))
    });
    registry.register_aggregate(
        "SKETCH_HLL_MERGE".to_string(),
        Rc::new(HllSketchMergeFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_HLL_MERGE", |args| {
        Ok(Rc::new(HllSketchMergeFunction::bind(args)?))
    });
}
