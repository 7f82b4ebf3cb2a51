//! Template functions (global functions available in templates)

use minijinja::value::Rest;
use minijinja::{Error, ErrorKind, Value};

/// Fail with a custom error message
///
/// Usage: {{ fail("global.region must be set") }}
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// Create a dict from key-value pairs
///
/// Usage: {{ dict("region", global.region, "tier", "gold") }}
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if !args.len().is_multiple_of(2) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict requires an even number of arguments (key-value pairs)",
        ));
    }

    let mut map = indexmap::IndexMap::new();
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        map.insert(key.to_string(), pair[1].clone());
    }

    Ok(Value::from_iter(map))
}

/// Usage: {{ list("a", "b") }}
pub fn list(args: Vec<Value>) -> Value {
    Value::from(args)
}

/// Get a key with a fallback
///
/// Usage: {{ get(global, "region", "eu-1") }}
pub fn get(obj: Value, key: String, default: Option<Value>) -> Value {
    match obj.get_attr(&key) {
        Ok(v) if !v.is_undefined() && !v.is_none() => v,
        _ => default.unwrap_or(Value::UNDEFINED),
    }
}

/// Walk a path of map keys and list positions
///
/// Usage: {{ index(values, "hosts", 0) }}
pub fn index(collection: Value, path: Rest<Value>) -> Result<Value, Error> {
    let mut current = collection;
    for key in path.iter() {
        current = current.get_item(key).map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot index {} with {}", current.kind(), key),
            )
        })?;
        if current.is_undefined() {
            return Ok(Value::UNDEFINED);
        }
    }
    Ok(current)
}

/// Return the first value that is defined, non-null and not an empty string
///
/// Usage: {{ coalesce(global.region, "eu-1") }}
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|arg| {
            !arg.is_undefined() && !arg.is_none() && !arg.as_str().is_some_and(str::is_empty)
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Usage: {{ ternary("large", "small", replicas > 3) }}
pub fn ternary(true_val: Value, false_val: Value, condition: Value) -> Value {
    if condition.is_true() {
        true_val
    } else {
        false_val
    }
}

/// Usage: {{ tostring(replicas) }}
pub fn tostring(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_requires_pairs() {
        assert!(dict(vec![Value::from("a")]).is_err());
        let d = dict(vec![Value::from("a"), Value::from(1)]).unwrap();
        assert_eq!(d.get_attr("a").unwrap(), Value::from(1));
    }

    #[test]
    fn test_get_with_default() {
        let obj = Value::from_serialize(serde_json::json!({"region": "eu-1"}));
        assert_eq!(get(obj.clone(), "region".into(), None), Value::from("eu-1"));
        assert_eq!(
            get(obj, "zone".into(), Some(Value::from("a"))),
            Value::from("a")
        );
    }

    #[test]
    fn test_coalesce_skips_empty() {
        let result = coalesce(vec![Value::UNDEFINED, Value::from(""), Value::from("x")]);
        assert_eq!(result, Value::from("x"));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(
            ternary(Value::from("a"), Value::from("b"), Value::from(true)),
            Value::from("a")
        );
        assert_eq!(
            ternary(Value::from("a"), Value::from("b"), Value::from(false)),
            Value::from("b")
        );
    }

    #[test]
    fn test_fail() {
        assert!(fail("boom".to_string()).is_err());
    }
}
