//! Parameter sanitization.
//!
//! Pure functions only: no locks, no I/O, deterministic. The gate runs
//! [`sanitize_parameter`] over every supplied parameter and accumulates
//! the full violation set so a caller can fix everything in one pass
//! instead of iterating one error at a time.

use palisade_policy::{ParamKind, ParameterSchema, SanitizeSettings};
use regex::Regex;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

/// Validate and normalize a single parameter value against its schema.
///
/// Returns the sanitized value and every violation found. A type
/// mismatch short-circuits the schema checks (length and pattern rules
/// are meaningless against the wrong type) and returns the value
/// unchanged; all other checks accumulate.
#[must_use]
pub fn sanitize_parameter(
    name: &str,
    value: &Value,
    schema: &ParameterSchema,
    settings: &SanitizeSettings,
) -> (Value, Vec<String>) {
    let mut violations = Vec::new();

    match schema.kind {
        ParamKind::String => {
            let Some(raw) = value.as_str() else {
                violations.push(format!("parameter '{name}' must be string"));
                return (value.clone(), violations);
            };
            let sanitized = sanitize_string(name, raw, schema, settings, &mut violations);
            (Value::String(sanitized), violations)
        }
        ParamKind::Integer => {
            let Some(n) = value.as_i64() else {
                violations.push(format!("parameter '{name}' must be integer"));
                return (value.clone(), violations);
            };
            if let Some(min) = schema.min
                && n < min
            {
                violations.push(format!("parameter '{name}' is below minimum {min}"));
            }
            if let Some(max) = schema.max
                && n > max
            {
                violations.push(format!("parameter '{name}' exceeds maximum {max}"));
            }
            (value.clone(), violations)
        }
        ParamKind::Boolean => {
            if !value.is_boolean() {
                violations.push(format!("parameter '{name}' must be boolean"));
            }
            (value.clone(), violations)
        }
        ParamKind::Array => {
            let Some(items) = value.as_array() else {
                violations.push(format!("parameter '{name}' must be array"));
                return (value.clone(), violations);
            };
            if let Some(max_items) = schema.max_items
                && items.len() > max_items
            {
                violations.push(format!(
                    "parameter '{name}' exceeds maximum of {max_items} items"
                ));
            }
            (value.clone(), violations)
        }
    }
}

/// Normalize a string value and run every string-shaped check against it.
///
/// NUL bytes are stripped and the text is NFKC-normalized before any
/// length, pattern, or blacklist rule is applied, so a policy author's
/// rules see the same form an executing tool would.
fn sanitize_string(
    name: &str,
    raw: &str,
    schema: &ParameterSchema,
    settings: &SanitizeSettings,
    violations: &mut Vec<String>,
) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '\0').collect();
    let sanitized: String = stripped.nfkc().collect();

    if let Some(max_length) = schema.max_length
        && sanitized.chars().count() > max_length
    {
        violations.push(format!(
            "parameter '{name}' exceeds maximum length {max_length}"
        ));
    }

    if let Some(pattern) = &schema.pattern {
        // Full-match semantics: the whole value must satisfy the pattern.
        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) => {
                if !re.is_match(&sanitized) {
                    violations.push(format!(
                        "parameter '{name}' does not match required pattern"
                    ));
                }
            }
            Err(_) => {
                // Policy validation rejects bad patterns at load time;
                // fail closed if one slips through anyway.
                violations.push(format!("parameter '{name}' has an invalid pattern"));
            }
        }
    }

    for entry in &schema.blacklist {
        if sanitized.contains(entry.as_str()) {
            violations.push(format!(
                "parameter '{name}' contains blacklisted pattern '{entry}'"
            ));
        }
    }

    let depth = sanitized
        .matches("../")
        .count()
        .saturating_add(sanitized.matches("..\\").count());
    if depth > usize::try_from(settings.max_depth_traversal).unwrap_or(usize::MAX) {
        violations.push(format!(
            "parameter '{name}' exceeds path traversal depth limit {}",
            settings.max_depth_traversal
        ));
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> SanitizeSettings {
        SanitizeSettings::default()
    }

    // -----------------------------------------------------------------------
    // Type checks
    // -----------------------------------------------------------------------

    #[test]
    fn test_type_mismatch_short_circuits() {
        let schema = ParameterSchema::of(ParamKind::String)
            .with_max_length(1)
            .with_blacklist_entry("x");
        let (value, violations) = sanitize_parameter("path", &json!(42), &schema, &settings());
        // Only the type violation; schema checks never ran.
        assert_eq!(violations, vec!["parameter 'path' must be string"]);
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_boolean_mismatch() {
        let schema = ParameterSchema::of(ParamKind::Boolean);
        let (_, violations) = sanitize_parameter("force", &json!("yes"), &schema, &settings());
        assert_eq!(violations, vec!["parameter 'force' must be boolean"]);
    }

    #[test]
    fn test_float_is_not_integer() {
        let schema = ParameterSchema::of(ParamKind::Integer);
        let (_, violations) = sanitize_parameter("count", &json!(1.5), &schema, &settings());
        assert_eq!(violations, vec!["parameter 'count' must be integer"]);
    }

    // -----------------------------------------------------------------------
    // String checks
    // -----------------------------------------------------------------------

    #[test]
    fn test_nul_bytes_stripped() {
        let schema = ParameterSchema::of(ParamKind::String);
        let (value, violations) =
            sanitize_parameter("path", &json!("a\0b\0c"), &schema, &settings());
        assert!(violations.is_empty());
        assert_eq!(value, json!("abc"));
    }

    #[test]
    fn test_nfkc_normalization() {
        let schema = ParameterSchema::of(ParamKind::String);
        // U+FF41 FULLWIDTH LATIN SMALL LETTER A normalizes to 'a'.
        let (value, violations) =
            sanitize_parameter("name", &json!("\u{ff41}bc"), &schema, &settings());
        assert!(violations.is_empty());
        assert_eq!(value, json!("abc"));
    }

    #[test]
    fn test_pattern_checked_after_normalization() {
        let schema = ParameterSchema::of(ParamKind::String).with_pattern("[a-z]+");
        let (_, violations) =
            sanitize_parameter("name", &json!("\u{ff41}bc"), &schema, &settings());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_max_length() {
        let schema = ParameterSchema::of(ParamKind::String).with_max_length(3);
        let (_, violations) = sanitize_parameter("name", &json!("abcd"), &schema, &settings());
        assert_eq!(violations, vec!["parameter 'name' exceeds maximum length 3"]);
    }

    #[test]
    fn test_pattern_is_full_match() {
        let schema = ParameterSchema::of(ParamKind::String).with_pattern("[a-z]+");
        let (_, ok) = sanitize_parameter("name", &json!("abc"), &schema, &settings());
        assert!(ok.is_empty());
        // A partial match is not enough.
        let (_, bad) = sanitize_parameter("name", &json!("abc1"), &schema, &settings());
        assert_eq!(
            bad,
            vec!["parameter 'name' does not match required pattern"]
        );
    }

    #[test]
    fn test_blacklist_one_violation_per_hit() {
        let schema = ParameterSchema::of(ParamKind::String)
            .with_blacklist_entry("rm -rf")
            .with_blacklist_entry("sudo")
            .with_blacklist_entry("curl");
        let (_, violations) =
            sanitize_parameter("cmd", &json!("sudo rm -rf /"), &schema, &settings());
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_violations_accumulate() {
        let schema = ParameterSchema::of(ParamKind::String)
            .with_max_length(4)
            .with_blacklist_entry("etc");
        let (_, violations) =
            sanitize_parameter("path", &json!("/etc/passwd"), &schema, &settings());
        assert_eq!(violations.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Path traversal depth
    // -----------------------------------------------------------------------

    #[test]
    fn test_traversal_within_depth_limit() {
        let schema = ParameterSchema::of(ParamKind::String);
        let (_, violations) =
            sanitize_parameter("path", &json!("../../etc/passwd"), &schema, &settings());
        // Depth 2 is under the default limit of 10.
        assert!(violations.is_empty());
    }

    #[test]
    fn test_traversal_over_depth_limit() {
        let schema = ParameterSchema::of(ParamKind::String);
        let deep = "../".repeat(11);
        let (_, violations) = sanitize_parameter("path", &json!(deep), &schema, &settings());
        assert_eq!(
            violations,
            vec!["parameter 'path' exceeds path traversal depth limit 10"]
        );
    }

    #[test]
    fn test_traversal_counts_backslash_form() {
        let schema = ParameterSchema::of(ParamKind::String);
        let strict = SanitizeSettings {
            max_depth_traversal: 0,
        };
        let (_, violations) =
            sanitize_parameter("path", &json!("..\\secrets"), &schema, &strict);
        assert_eq!(violations.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Integer and array bounds
    // -----------------------------------------------------------------------

    #[test]
    fn test_integer_bounds_inclusive() {
        let schema = ParameterSchema::of(ParamKind::Integer).with_range(1, 10);
        let (_, ok_low) = sanitize_parameter("n", &json!(1), &schema, &settings());
        let (_, ok_high) = sanitize_parameter("n", &json!(10), &schema, &settings());
        assert!(ok_low.is_empty());
        assert!(ok_high.is_empty());

        let (_, low) = sanitize_parameter("n", &json!(0), &schema, &settings());
        assert_eq!(low, vec!["parameter 'n' is below minimum 1"]);
        let (_, high) = sanitize_parameter("n", &json!(11), &schema, &settings());
        assert_eq!(high, vec!["parameter 'n' exceeds maximum 10"]);
    }

    #[test]
    fn test_array_max_items() {
        let schema = ParameterSchema::of(ParamKind::Array).with_max_items(2);
        let (_, ok) = sanitize_parameter("tags", &json!(["a", "b"]), &schema, &settings());
        assert!(ok.is_empty());
        let (_, bad) = sanitize_parameter("tags", &json!(["a", "b", "c"]), &schema, &settings());
        assert_eq!(bad, vec!["parameter 'tags' exceeds maximum of 2 items"]);
    }
}
