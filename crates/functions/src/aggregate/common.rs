use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ketchsql_common::error::{Error, Result};
use ketchsql_common::types::Value;

pub fn numeric_value_to_f64(value: &Value) -> Result<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }

    if let Some(i) = value.as_i64() {
        return Ok(Some(i as f64));
    }

    if let Some(f) = value.as_f64() {
        return Ok(Some(f));
    }

    Err(Error::TypeMismatch {
        expected: "NUMERIC".to_string(),
        actual: value.data_type().to_string(),
    })
}

pub fn value_to_string(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    if let Some(i) = value.as_i64() {
        return i.to_string();
    }
    if let Some(f) = value.as_f64() {
        return f.to_string();
    }
    if let Some(b) = value.as_bool() {
        return b.to_string();
    }

    format!("{:?}", value)
}

/// 64-bit hash of a value for distinct-count sketches. Strings and byte
/// blobs contribute their raw bytes; other variants are tagged by type.
pub fn value_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    HashableValue(value).hash(&mut hasher);
    hasher.finish()
}

pub struct HashableValue<'a>(pub &'a Value);

impl<'a> Hash for HashableValue<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_null() {
            0_u8.hash(state);
            return;
        }

        if let Some(b) = self.0.as_bool() {
            1_u8.hash(state);
            b.hash(state);
            return;
        }

        if let Some(i) = self.0.as_i64() {
            2_u8.hash(state);
            i.hash(state);
            return;
        }

        if let Some(f) = self.0.as_f64() {
            3_u8.hash(state);
            f.to_bits().hash(state);
            return;
        }

        if let Some(s) = self.0.as_str() {
            4_u8.hash(state);
            state.write(s.as_bytes());
            return;
        }

        if let Some(d) = self.0.as_numeric() {
            5_u8.hash(state);
            d.to_string().hash(state);
            return;
        }

        if let Some(bytes) = self.0.as_bytes() {
            6_u8.hash(state);
            state.write(bytes);
            return;
        }

        if let Some(fields) = self.0.as_struct() {
            7_u8.hash(state);
            fields.len().hash(state);
            for (key, value) in fields.iter() {
                key.hash(state);
                HashableValue(value).hash(state);
            }
            return;
        }

        if let Some(items) = self.0.as_array() {
            8_u8.hash(state);
            items.len().hash(state);
            for item in items.iter() {
                HashableValue(item).hash(state);
            }
            return;
        }

        9_u8.hash(state);
        format!("{:?}", self.0).hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(numeric_value_to_f64(&Value::int64(4)).unwrap(), Some(4.0));
        assert_eq!(numeric_value_to_f64(&Value::null()).unwrap(), None);
        assert!(numeric_value_to_f64(&Value::string("x")).is_err());
    }

    #[test]
    fn test_hash_distinguishes_types() {
        assert_ne!(
            value_hash(&Value::int64(1)),
            value_hash(&Value::string("1"))
        );
        assert_eq!(value_hash(&Value::int64(7)), value_hash(&Value::int64(7)));
    }
}
