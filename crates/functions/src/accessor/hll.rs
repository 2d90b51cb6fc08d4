//! Read-only accessors over HLL sketch blobs.

use std::rc::Rc;

use ketchsql_common::error::Result;
use ketchsql_common::types::Value;
use ketchsql_sketch::hll::HllSketch;

use super::{blob_arg, expect_args, std_devs_arg};
use crate::registry::FunctionRegistry;
use crate::scalar::ScalarFunctionImpl;

pub fn is_empty(blob: &[u8]) -> Result<Value> {
    Ok(Value::bool_val(HllSketch::deserialize(blob)?.is_empty()))
}

pub fn lg_k(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(i64::from(HllSketch::deserialize(blob)?.lg_k())))
}

pub fn estimate(blob: &[u8]) -> Result<Value> {
    Ok(Value::float64(HllSketch::deserialize(blob)?.estimate()))
}

pub fn lower_bound(blob: &[u8], num_std_devs: u8) -> Result<Value> {
    Ok(Value::float64(
        HllSketch::deserialize(blob)?.lower_bound(num_std_devs)?,
    ))
}

pub fn upper_bound(blob: &[u8], num_std_devs: u8) -> Result<Value> {
    Ok(Value::float64(
        HllSketch::deserialize(blob)?.upper_bound(num_std_devs)?,
    ))
}

pub fn describe(blob: &[u8]) -> Result<Value> {
    Ok(Value::string(
        HllSketch::deserialize(blob)?.to_string_summary(),
    ))
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_scalar(
        "SKETCH_HLL_IS_EMPTY".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_IS_EMPTY", |args| {
            expect_args("SKETCH_HLL_IS_EMPTY", args, 1)?;
            is_empty(blob_arg("SKETCH_HLL_IS_EMPTY", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_HLL_LG_K".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_LG_K", |args| {
            expect_args("SKETCH_HLL_LG_K", args, 1)?;
            lg_k(blob_arg("SKETCH_HLL_LG_K", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_HLL_ESTIMATE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_ESTIMATE", |args| {
            expect_args("SKETCH_HLL_ESTIMATE", args, 1)?;
            estimate(blob_arg("SKETCH_HLL_ESTIMATE", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_HLL_LOWER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_LOWER_BOUND", |args| {
            expect_args("SKETCH_HLL_LOWER_BOUND", args, 2)?;
            lower_bound(
                blob_arg("SKETCH_HLL_LOWER_BOUND", args, 0)?,
                std_devs_arg("SKETCH_HLL_LOWER_BOUND", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_HLL_UPPER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_UPPER_BOUND", |args| {
            expect_args("SKETCH_HLL_UPPER_BOUND", args, 2)?;
            upper_bound(
                blob_arg("SKETCH_HLL_UPPER_BOUND", args, 0)?,
                std_devs_arg("SKETCH_HLL_UPPER_BOUND", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_HLL_DESCRIBE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_HLL_DESCRIBE", |args| {
            expect_args("SKETCH_HLL_DESCRIBE", args, 1)?;
            describe(blob_arg("SKETCH_HLL_DESCRIBE", args, 0)?)
        })),
    );
}
