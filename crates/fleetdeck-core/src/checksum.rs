//! Content checksum of a plugin's option values
//!
//! The checksum changes whenever a literal, a template, an expression or a
//! secret reference changes. It never reads secret contents, so it can be
//! computed without any cluster I/O.

use sha2::{Digest, Sha256};

use crate::option::{OptionValue, ValueSource};

/// Compute the lowercase hex SHA-256 checksum of a list of option values
///
/// Entries are sorted by name first, so the result does not depend on the
/// order of the input list. Each entry contributes its name, its source kind
/// and its content, every field prefixed with its length.
pub fn checksum(values: &[OptionValue]) -> String {
    let mut sorted: Vec<&OptionValue> = values.iter().collect();
    // Stable sort keeps duplicates in declaration order
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for value in sorted {
        update_field(&mut hasher, value.name.as_bytes());
        update_field(&mut hasher, value.source.kind().as_bytes());
        update_field(&mut hasher, &content_bytes(&value.source));
    }
    hex::encode(hasher.finalize())
}

/// Length prefix keeps `("a", "bc")` and `("ab", "c")` apart
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn content_bytes(source: &ValueSource) -> Vec<u8> {
    match source {
        // serde_json::to_vec on a Value cannot fail
        ValueSource::Literal(v) => serde_json::to_vec(v).unwrap_or_default(),
        ValueSource::Template(t) => t.as_bytes().to_vec(),
        ValueSource::Expression(e) => e.as_bytes().to_vec(),
        ValueSource::SecretRef(reference) => reference.to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<OptionValue> {
        vec![
            OptionValue::literal("replicas", json!(3)),
            OptionValue::expression("region", "global.region"),
            OptionValue::secret("auth.password", "creds", "password"),
            OptionValue::template("host", "{{ global.region }}.example.com"),
        ]
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let sum = checksum(&sample());
        assert_eq!(sum.len(), 64);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_order_independent() {
        let mut reversed = sample();
        reversed.reverse();
        assert_eq!(checksum(&sample()), checksum(&reversed));
    }

    #[test]
    fn test_checksum_detects_literal_change() {
        let mut changed = sample();
        changed[0] = OptionValue::literal("replicas", json!(4));
        assert_ne!(checksum(&sample()), checksum(&changed));
    }

    #[test]
    fn test_checksum_detects_expression_change() {
        let mut changed = sample();
        changed[1] = OptionValue::expression("region", "global.zone");
        assert_ne!(checksum(&sample()), checksum(&changed));
    }

    #[test]
    fn test_checksum_detects_secret_reference_change() {
        let mut changed = sample();
        changed[2] = OptionValue::secret("auth.password", "other-creds", "password");
        assert_ne!(checksum(&sample()), checksum(&changed));

        let mut changed_key = sample();
        changed_key[2] = OptionValue::secret("auth.password", "creds", "token");
        assert_ne!(checksum(&sample()), checksum(&changed_key));
    }

    #[test]
    fn test_checksum_detects_source_kind_change() {
        let template = vec![OptionValue::template("host", "global.region")];
        let expression = vec![OptionValue::expression("host", "global.region")];
        assert_ne!(checksum(&template), checksum(&expression));
    }

    #[test]
    fn test_checksum_field_boundaries() {
        let left = vec![OptionValue::template("a", "bc")];
        let right = vec![OptionValue::template("ab", "c")];
        assert_ne!(checksum(&left), checksum(&right));
    }

    #[test]
    fn test_checksum_empty() {
        // SHA-256 of the empty input
        assert_eq!(
            checksum(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
