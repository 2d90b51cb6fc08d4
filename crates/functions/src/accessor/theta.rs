//! Read-only accessors and set operations over theta sketch blobs.

use std::rc::Rc;

use ketchsql_common::error::Result;
use ketchsql_common::types::Value;
use ketchsql_sketch::theta::ThetaSketch;

use super::{blob_arg, expect_args, std_devs_arg};
use crate::registry::FunctionRegistry;
use crate::scalar::ScalarFunctionImpl;

pub fn is_empty(blob: &[u8]) -> Result<Value> {
    Ok(Value::bool_val(ThetaSketch::deserialize(blob)?.is_empty()))
}

pub fn estimate(blob: &[u8]) -> Result<Value> {
    Ok(Value::float64(ThetaSketch::deserialize(blob)?.estimate()))
}

pub fn lower_bound(blob: &[u8], num_std_devs: u8) -> Result<Value> {
    Ok(Value::float64(
        ThetaSketch::deserialize(blob)?.lower_bound(num_std_devs)?,
    ))
}

pub fn upper_bound(blob: &[u8], num_std_devs: u8) -> Result<Value> {
    Ok(Value::float64(
        ThetaSketch::deserialize(blob)?.upper_bound(num_std_devs)?,
    ))
}

/// Serialized intersection of two theta sketches.
pub fn intersect(left: &[u8], right: &[u8]) -> Result<Value> {
    let left = ThetaSketch::deserialize(left)?;
    let right = ThetaSketch::deserialize(right)?;
    Ok(Value::bytes(left.intersect(&right).serialize()))
}

/// Serialized set difference of two theta sketches.
pub fn a_not_b(left: &[u8], right: &[u8]) -> Result<Value> {
    let left = ThetaSketch::deserialize(left)?;
    let right = ThetaSketch::deserialize(right)?;
    Ok(Value::bytes(left.a_not_b(&right).serialize()))
}

pub fn describe(blob: &[u8]) -> Result<Value> {
    Ok(Value::string(
        ThetaSketch::deserialize(blob)?.to_string_summary(),
    ))
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_scalar(
        "SKETCH_THETA_IS_EMPTY".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_IS_EMPTY", |args| {
            expect_args("SKETCH_THETA_IS_EMPTY", args, 1)?;
            is_empty(blob_arg("SKETCH_THETA_IS_EMPTY", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_ESTIMATE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_ESTIMATE", |args| {
            expect_args("SKETCH_THETA_ESTIMATE", args, 1)?;
            estimate(blob_arg("SKETCH_THETA_ESTIMATE", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_LOWER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_LOWER_BOUND", |args| {
            expect_args("SKETCH_THETA_LOWER_BOUND", args, 2)?;
            lower_bound(
                blob_arg("SKETCH_THETA_LOWER_BOUND", args, 0)?,
                std_devs_arg("SKETCH_THETA_LOWER_BOUND", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_UPPER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_UPPER_BOUND", |args| {
            expect_args("SKETCH_THETA_UPPER_BOUND", args, 2)?;
            upper_bound(
                blob_arg("SKETCH_THETA_UPPER_BOUND", args, 0)?,
                std_devs_arg("SKETCH_THETA_UPPER_BOUND", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_INTERSECT".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_INTERSECT", |args| {
            expect_args("SKETCH_THETA_INTERSECT", args, 2)?;
            intersect(
                blob_arg("SKETCH_THETA_INTERSECT", args, 0)?,
                blob_arg("SKETCH_THETA_INTERSECT", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_A_NOT_B".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_A_NOT_B", |args| {
            expect_args("SKETCH_THETA_A_NOT_B", args, 2)?;
            a_not_b(
                blob_arg("SKETCH_THETA_A_NOT_B", args, 0)?,
                blob_arg("SKETCH_THETA_A_NOT_B", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_THETA_DESCRIBE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_THETA_DESCRIBE", |args| {
            expect_args("SKETCH_THETA_DESCRIBE", args, 1)?;
            describe(blob_arg("SKETCH_THETA_DESCRIBE", args, 0)?)
        })),
    );
}
