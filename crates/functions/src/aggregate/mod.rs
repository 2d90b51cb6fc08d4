use std::any::Any;

use ketchsql_common::error::Result;
use ketchsql_common::types::{DataType, Value};

pub mod bind;
pub mod common;
pub mod freq;
pub mod hll;
pub mod quantile;
pub mod state;
pub mod tdigest;
pub mod theta;

pub use freq::{FreqSketchFunction, FreqSketchMergeFunction};
pub use hll::{HllSketchFunction, HllSketchMergeFunction};
pub use quantile::{QuantileSketchFunction, QuantileSketchMergeFunction};
pub use state::{SketchAccumulator, SketchFamily, SketchMergeAccumulator, SketchState};
pub use tdigest::{TDigestSketchFunction, TDigestSketchMergeFunction};
pub use theta::{ThetaSketchFunction, ThetaSketchMergeFunction};

pub trait Accumulator {
    fn accumulate(&mut self, value: &Value) -> Result<()>;

    /// Applies a run of identical input values. Must be observably
    /// identical to calling [`Accumulator::accumulate`] `count` times.
    fn accumulate_repeat(&mut self, value: &Value, count: u64) -> Result<()> {
        for _ in 0..count {
            self.accumulate(value)?;
        }
        Ok(())
    }

    fn merge(&mut self, other: &dyn Accumulator) -> Result<()>;

    fn finalize(&self) -> Result<Value>;

    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;
}

pub trait AggregateFunction: std::fmt::Debug {
    fn name(&self) -> &str;

    fn arg_types(&self) -> &[DataType];

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType>;

    fn create_accumulator(&self) -> Box<dyn Accumulator>;
}
