//! Template helper filters
//!
//! Case conversion, regex helpers, trimming, containment checks, base64 and
//! YAML/JSON serialization for the template resolver.

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};
use regex::Regex;

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn compile_regex(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| invalid(format!("invalid regex `{}`: {}", pattern, e)))
}

/// Convert a value to YAML
///
/// Usage: {{ values.ingress | toyaml }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json: serde_json::Value =
        serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;
    let yaml = serde_yaml::to_string(&json).map_err(|e| invalid(e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Convert a value to compact JSON
///
/// Usage: {{ values.ingress | tojson }}
pub fn tojson(value: Value) -> Result<String, Error> {
    let json: serde_json::Value =
        serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;
    serde_json::to_string(&json).map_err(|e| invalid(e.to_string()))
}

/// Usage: {{ password | b64encode }}
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// Usage: {{ encoded | b64decode }}
pub fn b64decode(value: String) -> Result<String, Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|e| invalid(format!("base64 decode error: {}", e)))?;
    String::from_utf8(decoded).map_err(|e| invalid(format!("UTF-8 decode error: {}", e)))
}

fn as_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Usage: {{ name | quote }}
pub fn quote(value: Value) -> String {
    let s = as_text(&value);
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Usage: {{ name | squote }}
pub fn squote(value: Value) -> String {
    format!("'{}'", as_text(&value).replace('\'', "''"))
}

/// Indent every non-empty line, starting with a newline
///
/// Usage: {{ values.labels | toyaml | nindent(4) }}
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Usage: {{ block | indent(2) }}
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail when a value is missing or an empty string
///
/// Usage: {{ global.region | required("global.region is required") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().is_some_and(str::is_empty);
    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

/// Usage: {% if values.hosts | empty %}
pub fn empty(value: Value) -> bool {
    if value.is_undefined() || value.is_none() {
        return true;
    }
    match value.len() {
        Some(len) => len == 0,
        None => value.as_str().is_some_and(str::is_empty),
    }
}

/// Usage: {% if values | haskey("global") %}
pub fn haskey(value: Value, key: String) -> bool {
    value
        .get_attr(&key)
        .map(|v| !v.is_undefined())
        .unwrap_or(false)
}

/// Usage: {{ values.global | keys | join(",") }}
pub fn keys(value: Value) -> Result<Vec<String>, Error> {
    let iter = value
        .try_iter()
        .map_err(|_| invalid("cannot get keys from non-mapping value"))?;
    Ok(iter
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

/// Usage: {{ config | sha256 }}
pub fn sha256sum(value: String) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Truncate to at most `length` characters
///
/// Usage: {{ name | trunc(63) }}
pub fn trunc(value: String, length: usize) -> String {
    value.chars().take(length).collect()
}

/// Usage: {{ version | trimprefix("v") }}
pub fn trimprefix(value: String, prefix: String) -> String {
    match value.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

/// Usage: {{ host | trimsuffix(".") }}
pub fn trimsuffix(value: String, suffix: String) -> String {
    match value.strip_suffix(&suffix) {
        Some(rest) => rest.to_string(),
        None => value,
    }
}

/// Usage: {{ "clusterName" | snakecase }} -> cluster_name
pub fn snakecase(value: String) -> String {
    let mut result = String::with_capacity(value.len() + value.len() / 4);
    let mut prev_upper = false;

    for (i, c) in value.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !prev_upper {
                result.push('_');
            }
            result.extend(c.to_lowercase());
            prev_upper = true;
        } else if c == '-' || c == ' ' {
            result.push('_');
            prev_upper = false;
        } else {
            result.push(c);
            prev_upper = false;
        }
    }

    result
}

/// Usage: {{ "clusterName" | kebabcase }} -> cluster-name
pub fn kebabcase(value: String) -> String {
    snakecase(value).replace('_', "-")
}

/// Usage: {{ "cluster-name" | camelcase }} -> clusterName
pub fn camelcase(value: String) -> String {
    let mut result = String::with_capacity(value.len());
    let mut upper_next = false;

    for c in value.chars() {
        if c == '-' || c == '_' || c == ' ' {
            upper_next = !result.is_empty();
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Replace every regex match
///
/// Usage: {{ host | regex_replace("\\.example\\.com$", "") }}
pub fn regex_replace(value: String, pattern: String, replacement: String) -> Result<String, Error> {
    let re = compile_regex(&pattern)?;
    Ok(re.replace_all(&value, replacement.as_str()).into_owned())
}

/// Split on a regex
///
/// Usage: {{ "a, b;c" | regex_split("[,;]\\s*") }}
pub fn regex_split(value: String, pattern: String) -> Result<Vec<String>, Error> {
    let re = compile_regex(&pattern)?;
    Ok(re.split(&value).map(str::to_string).collect())
}

/// Usage: {% if name | regex_match("^eu-") %}
pub fn regex_match(value: String, pattern: String) -> Result<bool, Error> {
    Ok(compile_regex(&pattern)?.is_match(&value))
}

/// Substring or membership check
///
/// Usage: {% if global.region | contains("eu") %}
pub fn contains(value: Value, needle: Value) -> Result<bool, Error> {
    if let (Some(haystack), Some(needle)) = (value.as_str(), needle.as_str()) {
        return Ok(haystack.contains(needle));
    }
    let mut iter = value
        .try_iter()
        .map_err(|_| invalid("contains requires a string, list or mapping"))?;
    Ok(iter.any(|item| item == needle))
}

/// Usage: {% if image | hasprefix("docker.io/") %}
pub fn hasprefix(value: String, prefix: String) -> bool {
    value.starts_with(&prefix)
}

/// Usage: {% if host | hassuffix(".local") %}
pub fn hassuffix(value: String, suffix: String) -> bool {
    value.ends_with(&suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml_strips_trailing_newline() {
        let value = Value::from_serialize(serde_json::json!({"a": 1}));
        assert_eq!(toyaml(value).unwrap(), "a: 1");
    }

    #[test]
    fn test_b64_round_trip() {
        let encoded = b64encode("svc-eu-1".to_string());
        assert_eq!(encoded, "c3ZjLWV1LTE=");
        assert_eq!(b64decode(encoded).unwrap(), "svc-eu-1");
        assert!(b64decode("!!!".to_string()).is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(Value::from("a\"b")), "\"a\\\"b\"");
        assert_eq!(squote(Value::from("it's")), "'it''s'");
        assert_eq!(quote(Value::from(3)), "\"3\"");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\n\nb".to_string(), 2), "  a\n\n  b");
        assert_eq!(nindent("a".to_string(), 4), "\n    a");
    }

    #[test]
    fn test_required() {
        assert!(required(Value::UNDEFINED, None).is_err());
        assert!(required(Value::from(""), None).is_err());
        assert!(required(Value::from("x"), None).is_ok());
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(snakecase("clusterName".to_string()), "cluster_name");
        assert_eq!(kebabcase("clusterName".to_string()), "cluster-name");
        assert_eq!(camelcase("cluster-name_id".to_string()), "clusterNameId");
    }

    #[test]
    fn test_trim_affixes() {
        assert_eq!(trimprefix("v1.2".to_string(), "v".to_string()), "1.2");
        assert_eq!(trimprefix("1.2".to_string(), "v".to_string()), "1.2");
        assert_eq!(trimsuffix("host.".to_string(), ".".to_string()), "host");
        assert_eq!(trunc("abcdef".to_string(), 3), "abc");
    }

    #[test]
    fn test_regex_helpers() {
        assert_eq!(
            regex_replace("a1b22c".to_string(), "[0-9]+".to_string(), "-".to_string()).unwrap(),
            "a-b-c"
        );
        assert_eq!(
            regex_split("a, b;c".to_string(), "[,;]\\s*".to_string()).unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(regex_match("eu-1".to_string(), "^eu-".to_string()).unwrap());
        assert!(regex_match("x".to_string(), "(".to_string()).is_err());
    }

    #[test]
    fn test_contains() {
        assert!(contains(Value::from("eu-west"), Value::from("west")).unwrap());
        let list = Value::from(vec![Value::from("a"), Value::from("b")]);
        assert!(contains(list.clone(), Value::from("b")).unwrap());
        assert!(!contains(list, Value::from("c")).unwrap());
    }
}
