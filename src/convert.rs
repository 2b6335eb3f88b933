//! Typed decomposition of nested framework objects.
//!
//! Each nested block arrives as an [`ObjectValue`]. Sub-models pull their
//! fields out with the extractors below, one call per attribute, so a
//! malformed object fails with [`ProviderError::Conversion`] naming the exact
//! attribute path instead of half-populating the sub-model.

use std::collections::BTreeMap;

use crate::error::ProviderError;
use crate::value::{Dynamic, ObjectValue, Value};

/// Join an attribute path with a child name.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn mismatch(path: &str, expected: &str, got: &Dynamic) -> ProviderError {
    ProviderError::conversion(
        path,
        format!("expected {}, got {}", expected, got.type_name()),
    )
}

/// Decode a dynamic value with `decode`, passing through null and unknown.
fn decode_value<T>(
    value: Option<&Dynamic>,
    path: &str,
    decode: impl FnOnce(&Dynamic, &str) -> Result<T, ProviderError>,
) -> Result<Value<T>, ProviderError> {
    match value {
        None => Ok(Value::Absent),
        Some(Dynamic::Null) => Ok(Value::Null),
        Some(Dynamic::Unknown) => Ok(Value::Unknown),
        Some(v) => decode(v, path).map(Value::Known),
    }
}

fn decode_string(value: &Dynamic, path: &str) -> Result<String, ProviderError> {
    match value {
        Dynamic::String(s) => Ok(s.clone()),
        other => Err(mismatch(path, "string", other)),
    }
}

fn decode_int(value: &Dynamic, path: &str) -> Result<i64, ProviderError> {
    match value {
        Dynamic::Int(i) => Ok(*i),
        Dynamic::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Ok(*f as i64)
        },
        other => Err(mismatch(path, "int64", other)),
    }
}

fn decode_object(value: &Dynamic, path: &str) -> Result<ObjectValue, ProviderError> {
    match value {
        Dynamic::Map(map) => Ok(map.clone()),
        other => Err(mismatch(path, "object", other)),
    }
}

fn decode_list<T>(
    value: &Dynamic,
    path: &str,
    element: impl Fn(&Dynamic, &str) -> Result<T, ProviderError>,
) -> Result<Vec<T>, ProviderError> {
    let Dynamic::List(items) = value else {
        return Err(mismatch(path, "list", value));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let item_path = format!("{}.{}", path, i);
            if item.is_null() || item.is_unknown() {
                return Err(ProviderError::conversion(
                    item_path,
                    format!("list element is {}", item.type_name()),
                ));
            }
            element(item, &item_path)
        })
        .collect()
}

/// Extract a string attribute.
pub fn string_attr(obj: &ObjectValue, name: &str, base: &str) -> Result<Value<String>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), decode_string)
}

/// Extract a boolean attribute.
pub fn bool_attr(obj: &ObjectValue, name: &str, base: &str) -> Result<Value<bool>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), |v, path| match v {
        Dynamic::Bool(b) => Ok(*b),
        other => Err(mismatch(path, "bool", other)),
    })
}

/// Extract an integer attribute. Whole floats are accepted.
pub fn int_attr(obj: &ObjectValue, name: &str, base: &str) -> Result<Value<i64>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), decode_int)
}

/// Extract a list of strings, preserving order.
pub fn string_list_attr(
    obj: &ObjectValue,
    name: &str,
    base: &str,
) -> Result<Value<Vec<String>>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), |v, path| {
        decode_list(v, path, decode_string)
    })
}

/// Extract a map of strings.
pub fn string_map_attr(
    obj: &ObjectValue,
    name: &str,
    base: &str,
) -> Result<Value<BTreeMap<String, String>>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), |v, path| {
        decode_object(v, path)?
            .iter()
            .map(|(key, val)| {
                Ok::<_, ProviderError>((key.clone(), decode_string(val, &join_path(path, key))?))
            })
            .collect()
    })
}

/// Extract a nested object.
pub fn object_attr(
    obj: &ObjectValue,
    name: &str,
    base: &str,
) -> Result<Value<ObjectValue>, ProviderError> {
    decode_value(obj.get(name), &join_path(base, name), decode_object)
}

/// Decompose a list of nested objects with `decode`, preserving order.
///
/// `path` is the attribute path of the list itself; each element is decoded
/// at `path.<index>`.
pub fn decode_object_list<T>(
    items: &[ObjectValue],
    path: &str,
    decode: impl Fn(&ObjectValue, &str) -> Result<T, ProviderError>,
) -> Result<Vec<T>, ProviderError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode(item, &format!("{}.{}", path, i)))
        .collect()
}

/// Largest integer magnitude an `f64` represents exactly (2^53).
pub const MAX_EXACT_FLOAT_INT: i64 = 1 << 53;

/// Narrow a model integer to the API's float type.
///
/// Values beyond ±2^53 would lose precision and fail with
/// [`ProviderError::OutOfRange`].
pub fn int_to_wire(path: &str, value: i64) -> Result<f64, ProviderError> {
    if !(-MAX_EXACT_FLOAT_INT..=MAX_EXACT_FLOAT_INT).contains(&value) {
        return Err(ProviderError::OutOfRange {
            field: path.to_string(),
            value,
        });
    }
    Ok(value as f64)
}

/// Read an API float back into a model integer.
///
/// Fractional, non-finite or imprecise values fail with
/// [`ProviderError::Conversion`].
pub fn int_from_wire(path: &str, value: f64) -> Result<i64, ProviderError> {
    let limit = MAX_EXACT_FLOAT_INT as f64;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > limit {
        return Err(ProviderError::conversion(
            path,
            format!("{} is not a whole number within ±2^53", value),
        ));
    }
    Ok(value as i64)
}

/// Decompose a nested block field, keeping its state.
pub fn decode_block<T>(
    value: &Value<ObjectValue>,
    path: &str,
    decode: impl FnOnce(&ObjectValue, &str) -> Result<T, ProviderError>,
) -> Result<Value<T>, ProviderError> {
    match value {
        Value::Absent => Ok(Value::Absent),
        Value::Null => Ok(Value::Null),
        Value::Unknown => Ok(Value::Unknown),
        Value::Known(obj) => decode(obj, path).map(Value::Known),
    }
}

/// Decompose a list-of-blocks field, keeping its state.
pub fn decode_block_list<T>(
    value: &Value<Vec<ObjectValue>>,
    path: &str,
    decode: impl Fn(&ObjectValue, &str) -> Result<T, ProviderError>,
) -> Result<Value<Vec<T>>, ProviderError> {
    match value {
        Value::Absent => Ok(Value::Absent),
        Value::Null => Ok(Value::Null),
        Value::Unknown => Ok(Value::Unknown),
        Value::Known(items) => decode_object_list(items, path, decode).map(Value::Known),
    }
}

/// Build an object from `(name, value)` pairs.
pub fn encode_object<const N: usize>(pairs: [(&str, Dynamic); N]) -> ObjectValue {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Recompose a list of sub-models, preserving order.
pub fn encode_object_list<T>(items: &[T], encode: impl Fn(&T) -> ObjectValue) -> Vec<ObjectValue> {
    items.iter().map(encode).collect()
}
