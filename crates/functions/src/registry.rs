use std::collections::HashMap;
use std::rc::Rc;

use debug_print::debug_eprintln;
use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::DataType;

use crate::accessor;
use crate::aggregate::bind::AggregateArg;
use crate::aggregate::{self, AggregateFunction};
use crate::scalar::ScalarFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SketchFamilyKind {
    Quantile,
    TDigest,
    Hll,
    Theta,
    FreqItems,
}

impl SketchFamilyKind {
    fn type_prefix(&self) -> &'static str {
        match self {
            SketchFamilyKind::Quantile => "sketch_quantile",
            SketchFamilyKind::TDigest => "sketch_tdigest",
            SketchFamilyKind::Hll => "sketch_hll",
            SketchFamilyKind::Theta => "sketch_theta",
            SketchFamilyKind::FreqItems => "sketch_freq_items",
        }
    }
}

/// One registered sketch type: the family plus its embedded item type (for
/// families whose blob depends on it). The storage type is always BYTES;
/// the alias name is what a catalog would expose.
#[derive(Debug, Clone)]
pub struct SketchTypeDescriptor {
    pub type_name: String,
    pub family: SketchFamilyKind,
    pub embedded: Option<DataType>,
    pub storage: DataType,
}

type AggregateBinder = fn(&mut Vec<AggregateArg>) -> Result<Rc<dyn AggregateFunction>>;

pub struct FunctionRegistry {
    scalar_functions: HashMap<String, Rc<dyn ScalarFunction>>,
    aggregate_functions: HashMap<String, Rc<dyn AggregateFunction>>,
    aggregate_binders: HashMap<String, AggregateBinder>,
    sketch_types: Vec<SketchTypeDescriptor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            scalar_functions: HashMap::new(),
            aggregate_functions: HashMap::new(),
            aggregate_binders: HashMap::new(),
            sketch_types: Vec::new(),
        };
        registry.register_builtins();
        registry.register_sketch_types();
        registry
    }

    fn register_builtins(&mut self) {
        aggregate::quantile::register(self);
        aggregate::tdigest::register(self);
        aggregate::hll::register(self);
        aggregate::theta::register(self);
        aggregate::freq::register(self);

        accessor::quantile::register(self);
        accessor::tdigest::register(self);
        accessor::hll::register(self);
        accessor::theta::register(self);
        accessor::freq::register(self);
    }

    // Built exactly once; callers hold the registry by reference.
    fn register_sketch_types(&mut self) {
        for embedded in [DataType::Int64, DataType::Float64] {
            self.add_sketch_type(SketchFamilyKind::Quantile, Some(embedded));
        }
        self.add_sketch_type(SketchFamilyKind::TDigest, Some(DataType::Float64));
        self.add_sketch_type(SketchFamilyKind::Hll, None);
        self.add_sketch_type(SketchFamilyKind::Theta, None);
        self.add_sketch_type(SketchFamilyKind::FreqItems, None);
        debug_eprintln!(
            "function registry: {} sketch types, {} aggregates, {} scalars",
            self.sketch_types.len(),
            self.aggregate_functions.len(),
            self.scalar_functions.len()
        );
    }

    fn add_sketch_type(&mut self, family: SketchFamilyKind, embedded: Option<DataType>) {
        let type_name = match &embedded {
            Some(data_type) => format!(
                "{}_{}",
                family.type_prefix(),
                data_type.to_string().to_lowercase()
            ),
            None => family.type_prefix().to_string(),
        };
        self.sketch_types.push(SketchTypeDescriptor {
            type_name,
            family,
            embedded,
            storage: DataType::Bytes,
        });
    }

    pub fn register_scalar(&mut self, name: String, func: Rc<dyn ScalarFunction>) {
        self.scalar_functions.insert(name.to_uppercase(), func);
    }

    pub fn register_aggregate(&mut self, name: String, func: Rc<dyn AggregateFunction>) {
        self.aggregate_functions.insert(name.to_uppercase(), func);
    }

    pub fn register_aggregate_binder(&mut self, name: &str, binder: AggregateBinder) {
        self.aggregate_binders.insert(name.to_uppercase(), binder);
    }

    pub fn get_scalar(&self, name: &str) -> Option<Rc<dyn ScalarFunction>> {
        self.scalar_functions.get(&name.to_uppercase()).cloned()
    }

    pub fn get_aggregate(&self, name: &str) -> Option<Rc<dyn AggregateFunction>> {
        self.aggregate_functions.get(&name.to_uppercase()).cloned()
    }

    pub fn has_scalar(&self, name: &str) -> bool {
        self.scalar_functions.contains_key(&name.to_uppercase())
    }

    pub fn has_aggregate(&self, name: &str) -> bool {
        self.aggregate_functions.contains_key(&name.to_uppercase())
    }

    /// Resolves an aggregate call site: validates and extracts the leading
    /// configuration argument and returns the bound function object.
    pub fn bind_aggregate(
        &self,
        name: &str,
        args: &mut Vec<AggregateArg>,
    ) -> Result<Rc<dyn AggregateFunction>> {
        let binder = self
            .aggregate_binders
            .get(&name.to_uppercase())
            .ok_or_else(|| Error::invalid_query(format!("unknown aggregate function {}", name)))?;
        binder(args)
    }

    pub fn sketch_types(&self) -> &[SketchTypeDescriptor] {
        &self.sketch_types
    }

    pub fn sketch_type(&self, name: &str) -> Option<&SketchTypeDescriptor> {
        let name = name.to_lowercase();
        self.sketch_types
            .iter()
            .find(|descriptor| descriptor.type_name == name)
    }

    pub fn sketch_type_for(
        &self,
        family: SketchFamilyKind,
        embedded: Option<&DataType>,
    ) -> Option<&SketchTypeDescriptor> {
        self.sketch_types
            .iter()
            .find(|descriptor| descriptor.family == family && descriptor.embedded.as_ref() == embedded)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = FunctionRegistry::new();
        for family in ["QUANTILE", "TDIGEST", "HLL", "THETA", "FREQ_ITEMS"] {
            assert!(registry.has_aggregate(&format!("SKETCH_{}", family)));
            assert!(registry.has_aggregate(&format!("SKETCH_{}_MERGE", family)));
        }
        assert!(registry.has_scalar("SKETCH_HLL_ESTIMATE"));
        assert!(registry.has_scalar("sketch_quantile_rank"));
        assert!(!registry.has_scalar("SKETCH_NOPE"));
    }

    #[test]
    fn test_sketch_type_lookup() {
        let registry = FunctionRegistry::new();
        let descriptor = registry.sketch_type("sketch_quantile_int64").unwrap();
        assert_eq!(descriptor.family, SketchFamilyKind::Quantile);
        assert_eq!(descriptor.embedded, Some(DataType::Int64));
        assert_eq!(descriptor.storage, DataType::Bytes);

        let hll = registry
            .sketch_type_for(SketchFamilyKind::Hll, None)
            .unwrap();
        assert_eq!(hll.type_name, "sketch_hll");
        assert_eq!(registry.sketch_types().len(), 6);
    }

    #[test]
    fn test_bind_unknown_aggregate() {
        let registry = FunctionRegistry::new();
        let mut args = Vec::new();
        assert!(registry.bind_aggregate("NOT_A_SKETCH", &mut args).is_err());
    }
}
