//! KetchSQL - approximate sketch aggregates for columnar SQL engines.
//!
//! KetchSQL packages mergeable summary sketches (quantiles, distinct
//! count, frequent items) behind the aggregate-function surface of a
//! columnar engine:
//!
//! ```text
//! raw values ──SKETCH_*──▶ per-group sketch ──finalize──▶ BYTES blob
//! blobs ──SKETCH_*_MERGE──▶ union accumulator ──finalize──▶ BYTES blob
//! blob ──SKETCH_*_<QUERY>──▶ estimate / rank / bounds / ...
//! ```
//!
//! Group states are combined pairwise during parallel aggregation and a
//! group that saw only NULLs finalizes to NULL.
//!
//! # Example
//!
//! ```rust
//! use ketchsql::{Accumulator, AggregateArg, AggregateFunction, DataType, FunctionRegistry, Value};
//!
//! let registry = FunctionRegistry::new();
//!
//! // SELECT SKETCH_HLL(12, user_id) FROM visits
//! let mut args = vec![
//!     AggregateArg::Constant(Value::int64(12)),
//!     AggregateArg::Column(DataType::Int64),
//! ];
//! let function = registry.bind_aggregate("SKETCH_HLL", &mut args).unwrap();
//! let mut state = function.create_accumulator();
//! for user_id in 0..1000 {
//!     state.accumulate(&Value::int64(user_id)).unwrap();
//! }
//! let blob = state.finalize().unwrap();
//!
//! // SELECT SKETCH_HLL_ESTIMATE(blob)
//! let estimate = registry
//!     .get_scalar("SKETCH_HLL_ESTIMATE")
//!     .unwrap()
//!     .evaluate(&[blob])
//!     .unwrap();
//! assert!((estimate.as_f64().unwrap() - 1000.0).abs() < 100.0);
//! ```

pub use ketchsql_common::error::{Error, Result};
pub use ketchsql_common::types::{DataType, StructField, Value};
pub use ketchsql_functions::{
    Accumulator, AggregateArg, AggregateFunction, FunctionRegistry, ScalarFunction,
    ScalarFunctionImpl, SketchFamilyKind, SketchTypeDescriptor,
};
pub use ketchsql_sketch::{
    FrequentItemRow, FrequentItemsSketch, HllSketch, HllUnion, QuantilesSketch, TDigest,
    ThetaSketch, ThetaUnion,
};
