//! Read-only accessors over t-digest sketch blobs.

use std::rc::Rc;

use ketchsql_common::error::Result;
use ketchsql_common::types::Value;
use ketchsql_sketch::tdigest::TDigest;

use super::{blob_arg, expect_args, f64_arg, f64_list_arg};
use crate::registry::FunctionRegistry;
use crate::scalar::ScalarFunctionImpl;

pub fn is_empty(blob: &[u8]) -> Result<Value> {
    Ok(Value::bool_val(TDigest::deserialize(blob)?.is_empty()))
}

pub fn k(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(i64::from(TDigest::deserialize(blob)?.k())))
}

pub fn total_weight(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(
        TDigest::deserialize(blob)?.total_weight() as i64
    ))
}

pub fn quantile(blob: &[u8], rank: f64) -> Result<Value> {
    Ok(Value::float64(TDigest::deserialize(blob)?.quantile(rank)?))
}

pub fn rank(blob: &[u8], value: f64) -> Result<Value> {
    Ok(Value::float64(TDigest::deserialize(blob)?.rank(value)?))
}

pub fn cdf(blob: &[u8], split_points: &[f64]) -> Result<Value> {
    let ranks = TDigest::deserialize(blob)?.cdf(split_points)?;
    Ok(Value::array(ranks.into_iter().map(Value::float64).collect()))
}

pub fn pmf(blob: &[u8], split_points: &[f64]) -> Result<Value> {
    let masses = TDigest::deserialize(blob)?.pmf(split_points)?;
    Ok(Value::array(masses.into_iter().map(Value::float64).collect()))
}

pub fn describe(blob: &[u8]) -> Result<Value> {
    Ok(Value::string(TDigest::deserialize(blob)?.to_string_summary()))
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_scalar(
        "SKETCH_TDIGEST_IS_EMPTY".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_IS_EMPTY", |args| {
            expect_args("SKETCH_TDIGEST_IS_EMPTY", args, 1)?;
            is_empty(blob_arg("SKETCH_TDIGEST_IS_EMPTY", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_K".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_K", |args| {
            expect_args("SKETCH_TDIGEST_K", args, 1)?;
            k(blob_arg("SKETCH_TDIGEST_K", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_TOTAL_WEIGHT".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_TDIGEST_TOTAL_WEIGHT",
            |args| {
                expect_args("SKETCH_TDIGEST_TOTAL_WEIGHT", args, 1)?;
                total_weight(blob_arg("SKETCH_TDIGEST_TOTAL_WEIGHT", args, 0)?)
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_QUANTILE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_QUANTILE", |args| {
            expect_args("SKETCH_TDIGEST_QUANTILE", args, 2)?;
            quantile(
                blob_arg("SKETCH_TDIGEST_QUANTILE", args, 0)?,
                f64_arg("SKETCH_TDIGEST_QUANTILE", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_RANK".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_RANK", |args| {
            expect_args("SKETCH_TDIGEST_RANK", args, 2)?;
            rank(
                blob_arg("SKETCH_TDIGEST_RANK", args, 0)?,
                f64_arg("SKETCH_TDIGEST_RANK", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_CDF".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_CDF", |args| {
            expect_args("SKETCH_TDIGEST_CDF", args, 2)?;
            cdf(
                blob_arg("SKETCH_TDIGEST_CDF", args, 0)?,
                &f64_list_arg("SKETCH_TDIGEST_CDF", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_PMF".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_PMF", |args| {
            expect_args("SKETCH_TDIGEST_PMF", args, 2)?;
            pmf(
                blob_arg("SKETCH_TDIGEST_PMF", args, 0)?,
                &f64_list_arg("SKETCH_TDIGEST_PMF", args, 1)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_TDIGEST_DESCRIBE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_TDIGEST_DESCRIBE", |args| {
            expect_args("SKETCH_TDIGEST_DESCRIBE", args, 1)?;
            describe(blob_arg("SKETCH_TDIGEST_DESCRIBE", args, 0)?)
        })),
    );
}
