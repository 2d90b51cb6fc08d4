//! Sketch aggregate and accessor functions for KetchSQL.
//!
//! This crate wires the sketches from `ketchsql-sketch` into the engine's
//! function surface. Aggregates come in pairs per family: the create path
//! (`SKETCH_HLL(value)`) builds a sketch from raw column values, and the
//! merge path (`SKETCH_HLL_MERGE(blob)`) unions already-serialized
//! sketches. Both finalize to an opaque BYTES blob, which the stateless
//! accessor functions (`SKETCH_HLL_ESTIMATE(blob)`, …) deserialize on
//! demand.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![allow(missing_docs)]

pub mod accessor;
pub mod aggregate;
pub mod scalar;

mod registry;

pub use aggregate::bind::AggregateArg;
pub use aggregate::{Accumulator, AggregateFunction};
pub use registry::{FunctionRegistry, SketchFamilyKind, SketchTypeDescriptor};
pub use scalar::{ScalarFunction, ScalarFunctionImpl};
