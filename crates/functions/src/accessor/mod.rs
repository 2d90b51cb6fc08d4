//! Stateless scalar accessors over serialized sketch blobs.
//!
//! Every function here is a pure function of its arguments: it
//! deserializes the blob independently on each call, never caches, and
//! never mutates its input. A malformed or foreign-family blob is a
//! malformed-sketch error.

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::Value;

pub mod freq;
pub mod hll;
pub mod quantile;
pub mod tdigest;
pub mod theta;

pub(crate) fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(Error::invalid_query(format!(
            "{} takes {} arguments, got {}",
            name,
            count,
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn blob_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a [u8]> {
    args[index]
        .as_bytes()
        .ok_or_else(|| Error::type_mismatch(format!("{} argument {}: BYTES", name, index + 1), args[index].data_type()))
}

pub(crate) fn f64_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args[index].as_f64().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: FLOAT64", name, index + 1),
            args[index].data_type(),
        )
    })
}

pub(crate) fn bool_arg(name: &str, args: &[Value], index: usize) -> Result<bool> {
    args[index].as_bool().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: BOOL", name, index + 1),
            args[index].data_type(),
        )
    })
}

pub(crate) fn std_devs_arg(name: &str, args: &[Value], index: usize) -> Result<u8> {
    let n = args[index].as_i64().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: INT64", name, index + 1),
            args[index].data_type(),
        )
    })?;
    u8::try_from(n).map_err(|_| {
        Error::invalid_query(format!(
            "{}: number of standard deviations must be 1, 2 or 3, got {}",
            name, n
        ))
    })
}

pub(crate) fn f64_list_arg(name: &str, args: &[Value], index: usize) -> Result<Vec<f64>> {
    let items = args[index].as_array().ok_or_else(|| {
        Error::type_mismatch(
            format!("{} argument {}: ARRAY<FLOAT64>", name, index + 1),
            args[index].data_type(),
        )
    })?;
    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                Error::type_mismatch(
                    format!("{} argument {}: ARRAY<FLOAT64>", name, index + 1),
                    item.data_type(),
                )
            })
        })
        .collect()
}
