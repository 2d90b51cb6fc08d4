//! Read-only accessors over frequent-items sketch blobs.

use std::rc::Rc;

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::Value;
use ketchsql_sketch::freq::FrequentItemsSketch;

use super::{blob_arg, expect_args};
use crate::registry::FunctionRegistry;
use crate::scalar::ScalarFunctionImpl;

fn item_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str> {
    args[index].as_str().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: STRING", name, index + 1),
            args[index].data_type(),
        )
    })
}

pub fn estimate(blob: &[u8], item: &str) -> Result<Value> {
    Ok(Value::int64(
        FrequentItemsSketch::deserialize(blob)?.estimate(item) as i64,
    ))
}

pub fn lower_bound(blob: &[u8], item: &str) -> Result<Value> {
    Ok(Value::int64(
        FrequentItemsSketch::deserialize(blob)?.lower_bound(item) as i64,
    ))
}

pub fn upper_bound(blob: &[u8], item: &str) -> Result<Value> {
    Ok(Value::int64(
        FrequentItemsSketch::deserialize(blob)?.upper_bound(item) as i64,
    ))
}

pub fn epsilon(blob: &[u8]) -> Result<Value> {
    Ok(Value::float64(
        FrequentItemsSketch::deserialize(blob)?.epsilon(),
    ))
}

pub fn total_weight(blob: &[u8]) -> Result<Value> {
    Ok(Value::int64(
        FrequentItemsSketch::deserialize(blob)?.total_weight() as i64,
    ))
}

/// Frequent items as an array of `{value, estimate, lower_bound,
/// upper_bound}` structs, heaviest first.
pub fn frequent_items(blob: &[u8]) -> Result<Value> {
    let rows = FrequentItemsSketch::deserialize(blob)?.frequent_items();
    Ok(Value::array(
        rows.into_iter()
            .map(|row| {
                Value::struct_val(vec![
                    ("value".to_string(), Value::string(row.item)),
                    ("estimate".to_string(), Value::int64(row.estimate as i64)),
                    (
                        "lower_bound".to_string(),
                        Value::int64(row.lower_bound as i64),
                    ),
                    (
                        "upper_bound".to_string(),
                        Value::int64(row.upper_bound as i64),
                    ),
                ])
            })
            .collect(),
    ))
}

pub fn describe(blob: &[u8]) -> Result<Value> {
    Ok(Value::string(
        FrequentItemsSketch::deserialize(blob)?.to_string_summary(),
    ))
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_ESTIMATE".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_ESTIMATE",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_ESTIMATE", args, 2)?;
                estimate(
                    blob_arg("SKETCH_FREQ_ITEMS_ESTIMATE", args, 0)?,
                    item_arg("SKETCH_FREQ_ITEMS_ESTIMATE", args, 1)?,
                )
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_LOWER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_LOWER_BOUND",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_LOWER_BOUND", args, 2)?;
                lower_bound(
                    blob_arg("SKETCH_FREQ_ITEMS_LOWER_BOUND", args, 0)?,
                    item_arg("SKETCH_FREQ_ITEMS_LOWER_BOUND", args, 1)?,
                )
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_UPPER_BOUND".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_UPPER_BOUND",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_UPPER_BOUND", args, 2)?;
                upper_bound(
                    blob_arg("SKETCH_FREQ_ITEMS_UPPER_BOUND", args, 0)?,
                    item_arg("SKETCH_FREQ_ITEMS_UPPER_BOUND", args, 1)?,
                )
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_EPSILON".to_string(),
        Rc::new(ScalarFunctionImpl::new("SKETCH_FREQ_ITEMS_EPSILON", |args| {
            expect_args("SKETCH_FREQ_ITEMS_EPSILON", args, 1)?;
            epsilon(blob_arg("SKETCH_FREQ_ITEMS_EPSILON", args, 0)?)
        })),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_TOTAL_WEIGHT".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_TOTAL_WEIGHT",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_TOTAL_WEIGHT", args, 1)?;
                total_weight(blob_arg("SKETCH_FREQ_ITEMS_TOTAL_WEIGHT", args, 0)?)
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_FREQUENT_ITEMS".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_FREQUENT_ITEMS",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_FREQUENT_ITEMS", args, 1)?;
                frequent_items(blob_arg("SKETCH_FREQ_ITEMS_FREQUENT_ITEMS", args, 0)?)
            },
        )),
    );
    registry.register_scalar(
        "SKETCH_FREQ_ITEMS_DESCRIBE".to_string(),
        Rc::new(ScalarFunctionImpl::new(
            "SKETCH_FREQ_ITEMS_DESCRIBE",
            |args| {
                expect_args("SKETCH_FREQ_ITEMS_DESCRIBE", args, 1)?;
                describe(blob_arg("SKETCH_FREQ_ITEMS_DESCRIBE", args, 0)?)
            },
        )),
    );
}
