//! Secret redaction for diffs
//!
//! Secret values never appear in a diff. Each key of `data` and `stringData`
//! is replaced by a mask that only tells whether the value changed.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

pub const MASK: &str = "***";
pub const MASK_BEFORE: &str = "*** (before)";
pub const MASK_AFTER: &str = "*** (after)";

const SECRET_FIELDS: &[&str] = &["data", "stringData"];

/// `apiVersion: v1`, `kind: Secret`
pub fn is_secret(object: &JsonValue) -> bool {
    object.get("apiVersion").and_then(JsonValue::as_str) == Some("v1")
        && object.get("kind").and_then(JsonValue::as_str) == Some("Secret")
}

/// Mask the secret payload of both sides of a comparison
///
/// Equal values become `***` on both sides, differing values become
/// `*** (before)` and `*** (after)`, and a key present on one side only
/// becomes `***`. Inputs are not modified. Masking a masked pair returns it
/// unchanged.
pub fn mask_secret_data(
    before: Option<&JsonValue>,
    after: Option<&JsonValue>,
) -> (Option<JsonValue>, Option<JsonValue>) {
    let mut before = before.cloned();
    let mut after = after.cloned();

    for field in SECRET_FIELDS {
        let keys: BTreeSet<String> = [before.as_ref(), after.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|o| o.get(*field).and_then(JsonValue::as_object))
            .flat_map(|m| m.keys().cloned())
            .collect();

        for key in keys {
            let old = payload_value(before.as_ref(), field, &key);
            let new = payload_value(after.as_ref(), field, &key);

            let (old_mask, new_mask) = match (old, new) {
                (Some(o), Some(n)) if o == n => (MASK, MASK),
                (Some(_), Some(_)) => (MASK_BEFORE, MASK_AFTER),
                _ => (MASK, MASK),
            };

            set_payload_value(before.as_mut(), field, &key, old_mask);
            set_payload_value(after.as_mut(), field, &key, new_mask);
        }
    }

    (before, after)
}

fn payload_value<'a>(object: Option<&'a JsonValue>, field: &str, key: &str) -> Option<&'a JsonValue> {
    object?.get(field)?.get(key)
}

fn set_payload_value(object: Option<&mut JsonValue>, field: &str, key: &str, mask: &str) {
    let entry = object
        .and_then(|o| o.get_mut(field))
        .and_then(JsonValue::as_object_mut)
        .and_then(|m| m.get_mut(key));
    if let Some(entry) = entry {
        *entry = JsonValue::String(mask.to_string());
    }
}
