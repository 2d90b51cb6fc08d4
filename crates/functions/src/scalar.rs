use ketchsql_common::error::Result;
use ketchsql_common::types::Value;

pub trait ScalarFunction {
    fn name(&self) -> &str;

    fn evaluate(&self, args: &[Value]) -> Result<Value>;
}

/// A scalar function backed by a plain function pointer.
pub struct ScalarFunctionImpl {
    name: &'static str,
    func: fn(&[Value]) -> Result<Value>,
}

impl ScalarFunctionImpl {
    pub fn new(name: &'static str, func: fn(&[Value]) -> Result<Value>) -> Self {
        Self { name, func }
    }
}

impl ScalarFunction for ScalarFunctionImpl {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}
