use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};
use ketchsql_sketch::freq::{
    DEFAULT_FREQ_LG_MAX_K, FrequentItemsSketch, MAX_FREQ_LG_MAX_K, MIN_FREQ_LG_MAX_K,
};

use super::bind::{self, AggregateArg};
use super::common::value_to_string;
use super::state::{SketchAccumulator, SketchFamily, SketchMergeAccumulator};
use super::{Accumulator, AggregateFunction};
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqConfig {
    pub lg_max_k: u8,
}

impl Default for FreqConfig {
    fn default() -> Self {
        Self {
            lg_max_k: DEFAULT_FREQ_LG_MAX_K,
        }
    }
}

fn resolve_config(name: &str, args: &mut Vec<AggregateArg>) -> Result<FreqConfig> {
    let lg_max_k = bind::take_resolution(name, args, i64::from(DEFAULT_FREQ_LG_MAX_K))?;
    let lg_max_k = u8::try_from(lg_max_k).map_err(|_| {
        Error::invalid_configuration(format!(
            "{} lg_max_k must be in [{}, {}], got {}",
            name, MIN_FREQ_LG_MAX_K, MAX_FREQ_LG_MAX_K, lg_max_k
        ))
    })?;
    let config = FreqConfig { lg_max_k };
    FreqFamily::validate(config)?;
    Ok(config)
}

pub struct FreqFamily;

impl SketchFamily for FreqFamily {
    type Config = FreqConfig;
    type Sketch = FrequentItemsSketch;
    type Union = FrequentItemsSketch;

    const NAME: &'static str = "SKETCH_FREQ_ITEMS";

    fn validate(config: Self::Config) -> Result<()> {
        if (MIN_FREQ_LG_MAX_K..=MAX_FREQ_LG_MAX_K).contains(&config.lg_max_k) {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "SKETCH_FREQ_ITEMS lg_max_k must be in [{}, {}], got {}",
                MIN_FREQ_LG_MAX_K, MAX_FREQ_LG_MAX_K, config.lg_max_k
            )))
        }
    }

    fn create(config: Self::Config) -> Self::Sketch {
        FrequentItemsSketch::new(config.lg_max_k)
    }

    fn update(sketch: &mut Self::Sketch, value: &Value) -> Result<()> {
        sketch.update(&value_to_string(value));
        Ok(())
    }

    fn update_repeat(sketch: &mut Self::Sketch, value: &Value, count: u64) -> Result<()> {
        // A weighted update lands on the same counter as `count` repeats.
        sketch.update_weighted(&value_to_string(value), count);
        Ok(())
    }

    fn serialize(sketch: &Self::Sketch) -> Vec<u8> {
        sketch.serialize()
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Sketch> {
        FrequentItemsSketch::deserialize(bytes)
    }

    fn new_union(config: Self::Config) -> Self::Union {
        FrequentItemsSketch::new(config.lg_max_k)
    }

    fn union_update(union: &mut Self::Union, sketch: &Self::Sketch) {
        union.merge(sketch);
    }

    fn union_result(union: &Self::Union) -> Self::Sketch {
        union.clone()
    }
}

/// `SKETCH_FREQ_ITEMS(value)` / `SKETCH_FREQ_ITEMS(lg_max_k, value)`.
#[derive(Debug, Clone, Default)]
pub struct FreqSketchFunction {
    config: FreqConfig,
}

impl FreqSketchFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_FREQ_ITEMS", args)?;
        bind::data_arg_type("SKETCH_FREQ_ITEMS", args)?;
        Ok(Self { config })
    }
}

impl AggregateFunction for FreqSketchFunction {
    fn name(&self) -> &str {
        "SKETCH_FREQ_ITEMS"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Unknown]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchAccumulator::<FreqFamily>::new(self.config))
    }
}

/// `SKETCH_FREQ_ITEMS_MERGE(blob)` / `SKETCH_FREQ_ITEMS_MERGE(lg_max_k, blob)`.
#[derive(Debug, Clone, Default)]
pub struct FreqSketchMergeFunction {
    config: FreqConfig,
}

impl FreqSketchMergeFunction {
    pub fn bind(args: &mut Vec<AggregateArg>) -> Result<Self> {
        let config = resolve_config("SKETCH_FREQ_ITEMS_MERGE", args)?;
        match bind::data_arg_type("SKETCH_FREQ_ITEMS_MERGE", args)? {
            DataType::Bytes | DataType::Unknown => {}
            other => return Err(Error::type_mismatch("BYTES", other)),
        }
        Ok(Self { config })
    }
}

impl AggregateFunction for FreqSketchMergeFunction {
    fn name(&self) -> &str {
        "SKETCH_FREQ_ITEMS_MERGE"
    }

    fn arg_types(&self) -> &[DataType] {
        &[DataType::Bytes]
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Bytes)
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SketchMergeAccumulator::<FreqFamily>::new(self.config))
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_aggregate(
        "SKETCH_FREQ_ITEMS".to_string(),
        Rc::new(FreqSketchFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_FREQ_ITEMS", |args| {
        Ok(Rc::new(FreqSketchFunction::bind(args)?))
    });
    registry.register_aggregate(
        "SKETCH_FREQ_ITEMS_MERGE".to_string(),
        Rc::new(FreqSketchMergeFunction::default()),
    );
    registry.register_aggregate_binder("SKETCH_FREQ_ITEMS_MERGE", |args| {
        Ok(Rc::new(FreqSketchMergeFunction::bind(args)?))
    });
}
