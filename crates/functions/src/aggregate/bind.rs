//! Bind-time resolution of sketch aggregate call sites.
//!
//! Every sketch aggregate optionally takes a leading resolution parameter
//! (`k`, `lg_k`, `lg_max_k`). The parameter must be a foldable constant; it
//! is resolved exactly once per call site, removed from the argument list,
//! and the remaining data column determines the embedded item type.

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::{DataType, Value};

/// A call-site argument as seen at bind time: either a foldable constant
/// or a column of a known type.
#[derive(Debug, Clone)]
pub enum AggregateArg {
    Constant(Value),
    Column(DataType),
}

impl AggregateArg {
    pub fn is_foldable(&self) -> bool {
        matches!(self, AggregateArg::Constant(_))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            AggregateArg::Constant(value) => value.data_type(),
            AggregateArg::Column(data_type) => data_type.clone(),
        }
    }
}

/// Resolves the leading resolution parameter of a one-column sketch
/// aggregate. Present when the call has two arguments; it must then be a
/// non-null integer constant and is removed so the row-level operation
/// only sees the data column.
pub fn take_resolution(name: &str, args: &mut Vec<AggregateArg>, default: i64) -> Result<i64> {
    match args.len() {
        1 => Ok(default),
        2 => {
            let resolution = match &args[0] {
                AggregateArg::Column(_) => {
                    return Err(Error::invalid_configuration(format!(
                        "{} resolution must be a constant integer",
                        name
                    )));
                }
                AggregateArg::Constant(value) if value.is_null() => {
                    return Err(Error::invalid_configuration(format!(
                        "{} resolution cannot be NULL",
                        name
                    )));
                }
                AggregateArg::Constant(value) => value.as_i64().ok_or_else(|| {
                    Error::invalid_configuration(format!(
                        "{} resolution must be an integer, got {}",
                        name,
                        value.data_type()
                    ))
                })?,
            };
            args.remove(0);
            Ok(resolution)
        }
        n => Err(Error::invalid_query(format!(
            "{} takes one or two arguments, got {}",
            name, n
        ))),
    }
}

/// The type of the single remaining data argument.
pub fn data_arg_type(name: &str, args: &[AggregateArg]) -> Result<DataType> {
    match args {
        [arg] => Ok(arg.data_type()),
        _ => Err(Error::invalid_query(format!(
            "{} takes exactly one data argument, got {}",
            name,
            args.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_resolution_is_extracted() {
        let mut args = vec![
            AggregateArg::Constant(Value::int64(256)),
            AggregateArg::Column(DataType::Int64),
        ];
        let k = take_resolution("SKETCH_QUANTILE", &mut args, 200).unwrap();
        assert_eq!(k, 256);
        assert_eq!(args.len(), 1);
        assert_eq!(data_arg_type("SKETCH_QUANTILE", &args).unwrap(), DataType::Int64);
    }

    #[test]
    fn test_default_resolution() {
        let mut args = vec![AggregateArg::Column(DataType::Float64)];
        let k = take_resolution("SKETCH_TDIGEST", &mut args, 100).unwrap();
        assert_eq!(k, 100);
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_non_constant_resolution_rejected() {
        let leading = AggregateArg::Column(DataType::Int64);
        assert!(!leading.is_foldable());
        let mut args = vec![leading, AggregateArg::Column(DataType::Int64)];
        let err = take_resolution("SKETCH_HLL", &mut args, 12).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_null_resolution_rejected() {
        let mut args = vec![
            AggregateArg::Constant(Value::null()),
            AggregateArg::Column(DataType::Int64),
        ];
        let err = take_resolution("SKETCH_HLL", &mut args, 12).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_non_integer_resolution_rejected() {
        let mut args = vec![
            AggregateArg::Constant(Value::string("twelve")),
            AggregateArg::Column(DataType::Int64),
        ];
        let err = take_resolution("SKETCH_HLL", &mut args, 12).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_bad_arity() {
        let mut args = vec![];
        assert!(take_resolution("SKETCH_HLL", &mut args, 12).is_err());
    }
}
