//! Read-only accessors over quantiles sketch blobs. The embedded item
//! type is recovered from the blob's item-type tag.

use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::Value;
use ketchsql_sketch::codec;
use ketchsql_sketch::quantile::QuantilesSketch;

use super::{blob_arg, bool_arg, expect_args, f64_arg};
use crate::registry::FunctionRegistry;
use crate::scalar::ScalarFunctionImpl;

enum AnySketch {
    Int64(QuantilesSketch<i64>),
    Float64(QuantilesSketch<f64>),
}

fn load(blob: &[u8]) -> Result<AnySketch> {
    let (family, item_tag) = codec::peek_preamble(blob)?;
    if family != codec::FAMILY_QUANTILE {
        return Err(Error::malformed_sketch("expected a quantiles sketch blob"));
    }
    match item_tag {
        codec::ITEM_TAG_INT64 => Ok(AnySketch::Int64(QuantilesSketch::deserialize(blob)?)),
        codec::ITEM_TAG_FLOAT64 => Ok(AnySketch::Float64(QuantilesSketch::deserialize(blob)?)),
        other => Err(Error::malformed_sketch(format!(
            "unknown quantiles sketch item-type tag {}",
            other
        ))),
    }
}

pub fn is_empty(blob: &[u8]) -> Result<Value> {
    Ok(Value::bool_val(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.is_empty(),
        AnySketch::Float64(sketch) => sketch.is_empty(),
    }))
}

pub fn k(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(i64::from(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.k(),
        AnySketch::Float64(sketch) => sketch.k(),
    })))
}

pub fn n(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.n() as i64,
        AnySketch::Float64(sketch) => sketch.n() as i64,
    }))
}

pub fn num_retained(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.num_retained() as i64,
        AnySketch::Float64(sketch) => sketch.num_retained() as i64,
    }))
}

pub fn is_estimation_mode(blob: &[u8]) -> Result<Value> {
    Ok(Value::bool_val(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.is_estimation_mode(),
        AnySketch::Float64(sketch) => sketch.is_estimation_mode(),
    }))
}

pub fn rank(blob: &[u8], item: &Value, inclusive: bool) -> Result<Value> {
    let rank = match load(blob)? {
        AnySketch::Int64(sketch) => {
            let item = item
                .as_i64()
                .ok_or_else(|| Error::type_mismatch_value("INT64", item))?;
            sketch.rank(item, inclusive)?
        }
        AnySketch::Float64(sketch) => {
            let item = item
                .as_f64()
                .ok_or_else(|| Error::type_mismatch_value("FLOAT64", item))?;
            sketch.rank(item, inclusive)?
        }
    };
    Ok(Value::float64(rank))
}

pub fn quantile(blob: &[u8], rank: f64, inclusive: bool) -> Result<Value> {
    Ok(match load(blob)? {
        AnySketch::Int64(sketch) => Value::int64(sketch.quantile(rank, inclusive)?),
        AnySketch::Float64(sketch) => Value::float64(sketch.quantile(rank, inclusive)?),
    })
}

pub fn cdf(blob: &[u8], split_points: &[Value], inclusive: bool) -> Result<Value> {
    let ranks = match load(blob)? {
        AnySketch::Int64(sketch) => {
            let splits = int_splits(split_points)?;
            sketch.cdf(&splits, inclusive)?
        }
        AnySketch::Float64(sketch) => {
            let splits = float_splits(split_points)?;
            sketch.cdf(&splits, inclusive)?
        }
    };
    Ok(Value::array(ranks.into_iter().map(Value::float64).collect()))
}

pub fn pmf(blob: &[u8], split_points: &[Value], inclusive: bool) -> Result<Value> {
    let masses = match load(blob)? {
        AnySketch::Int64(sketch) => {
            let splits = int_splits(split_points)?;
            sketch.pmf(&splits, inclusive)?
        }
        AnySketch::Float64(sketch) => {
            let splits = float_splits(split_points)?;
            sketch.pmf(&splits, inclusive)?
        }
    };
    Ok(Value::array(masses.into_iter().map(Value::float64).collect()))
}

pub fn normalized_rank_error(blob: &[u8], pmf: bool) -> Result<Value> {
    Ok(Value::float64(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.normalized_rank_error(pmf),
        AnySketch::Float64(sketch) => sketch.normalized_rank_error(pmf),
    }))
}

pub fn min_item(blob: &[u8]) -> Result<Value> {
    match load(blob)? {
        AnySketch::Int64(sketch) => sketch
            .min_item()
            .map(Value::int64)
            .ok_or_else(|| Error::invalid_query("min item of an empty quantiles sketch")),
        AnySketch::Float64(sketch) => sketch
            .min_item()
            .map(Value::float64)
            .ok_or_else(|| Error::invalid_query("min item of an empty quantiles sketch")),
    }
}

pub fn max_item(blob: &[u8]) -> Result<Value> {
    match load(blob)? {
        AnySketch::Int64(sketch) => sketch
            .max_item()
            .map(Value::int64)
            .ok_or_else(|| Error::invalid_query("max item of an empty quantiles sketch")),
        AnySketch::Float64(sketch) => sketch
            .max_item()
            .map(Value::float64)
            .ok_or_else(|| Error::invalid_query("max item of an empty quantiles sketch")),
    }
}

pub fn describe(blob: &[u8], include_items: bool) -> Result<Value> {
    Ok(Value::string(match load(blob)? {
        AnySketch::Int64(sketch) => sketch.to_string_summary(include_items),
        AnySketch::Float64(sketch) => sketch.to_string_summary(include_items),
    }))
}

fn int_splits(split_points: &[Value]) -> Result<Vec<i64>> {
    split_points
        .iter()
        .map(|split| {
            split
                .as_i64()
                .ok_or_else(|| Error::type_mismatch_value("INT64", split))
        })
        .collect()
}

fn float_splits(split_points: &[Value]) -> Result<Vec<f64>> {
    split_points
        .iter()
        .map(|split| {
            split
                .as_f64()
                .ok_or_else(|| Error::type_mismatch_value("FLOAT64", split))
        })
        .collect()
}

fn splits_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a [Value]> {
    args[index].as_array().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: ARRAY", name, index + 1),
            args[index].data_type(),
        )
    })
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_scalar(
        "SKETCH_QUANTILE_IS_EMPTY".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_IS_EMPTY", |args| {
            expect_args("SKETCH_QUANTILE_IS_EMPTY", args, 1)?;
            is_empty(blob_arg("SKETCH_QUANTILE_IS_EMPTY", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_K".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_K", |args| {
            expect_args("SKETCH_QUANTILE_K", args, 1)?;
            k(blob_arg("SKETCH_QUANTILE_K", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_N".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_N", |args| {
            expect_args("SKETCH_QUANTILE_N", args, 1)?;
            n(blob_arg("SKETCH_QUANTILE_N", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_NUM_RETAINED".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_QUANTILE_NUM_RETAINED",
            |args| {
                expect_args("SKETCH_QUANTILE_NUM_RETAINED", args, 1)?;
                num_retained(blob_arg("SKETCH_QUANTILE_NUM_RETAINED", args, 0)?)
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_IS_ESTIMATION_MODE".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_QUANTILE_IS_ESTIMATION_MODE",
            |args| {
                expect_args("SKETCH_QUANTILE_IS_ESTIMATION_MODE", args, 1)?;
                is_estimation_mode(blob_arg("SKETCH_QUANTILE_IS_ESTIMATION_MODE", args, 0)?)
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_RANK".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_RANK", |args| {
            expect_args("SKETCH_QUANTILE_RANK", args, 3)?;
            rank(
                blob_arg("SKETCH_QUANTILE_RANK", args, 0)?,
                &args[1],
                bool_arg("SKETCH_QUANTILE_RANK", args, 2)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_QUANTILE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_QUANTILE", |args| {
            expect_args("SKETCH_QUANTILE_QUANTILE", args, 3)?;
            quantile(
                blob_arg("SKETCH_QUANTILE_QUANTILE", args, 0)?,
                f64_arg("SKETCH_QUANTILE_QUANTILE", args, 1)?,
                bool_arg("SKETCH_QUANTILE_QUANTILE", args, 2)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_CDF".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_CDF", |args| {
            expect_args("SKETCH_QUANTILE_CDF", args, 3)?;
            cdf(
                blob_arg("SKETCH_QUANTILE_CDF", args, 0)?,
                splits_arg("SKETCH_QUANTILE_CDF", args, 1)?,
                bool_arg("SKETCH_QUANTILE_CDF", args, 2)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_PMF".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_PMF", |args| {
            expect_args("SKETCH_QUANTILE_PMF", args, 3)?;
            pmf(
                blob_arg("SKETCH_QUANTILE_PMF", args, 0)?,
                splits_arg("SKETCH_QUANTILE_PMF", args, 1)?,
                bool_arg("SKETCH_QUANTILE_PMF", args, 2)?,
            )
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_NORMALIZED_RANK_ERROR".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_QUANTILE_NORMALIZED_RANK_ERROR",
            |args| {
                expect_args("SKETCH_QUANTILE_NORMALIZED_RANK_ERROR", args, 2)?;
                normalized_rank_error(
                    blob_arg("SKETCH_QUANTILE_NORMALIZED_RANK_ERROR", args, 0)?,
                    bool_arg("SKETCH_QUANTILE_NORMALIZED_RANK_ERROR", args, 1)?,
                )
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_MIN_ITEM".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_MIN_ITEM", |args| {
            expect_args("SKETCH_QUANTILE_MIN_ITEM", args, 1)?;
            min_item(blob_arg("SKETCH_QUANTILE_MIN_ITEM", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_MAX_ITEM".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_MAX_ITEM", |args| {
            expect_args("SKETCH_QUANTILE_MAX_ITEM", args, 1)?;
            max_item(blob_arg("SKETCH_QUANTILE_MAX_ITEM", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_QUANTILE_DESCRIBE".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_QUANTILE_DESCRIBE", |args| {
            expect_args("SKETCH_QUANTILE_DESCRIBE", args, 2)?;
            describe(
                blob_arg("SKETCH_QUANTILE_DESCRIBE", args, 0)?,
                bool_arg("SKETCH_QUANTILE_DESCRIBE", args, 1)?,
            )
        })),
    );
}
