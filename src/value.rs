//! Helpers over `sea_query::Value`.
//!
//! - `is_null`: SQL NULL detection across value variants
//! - `key_string`: canonical, unquoted rendering used for link identifiers
//! - `quote_literal`: escaped SQL literal for the few places a value is embedded as text
//! - `from_json`: conversion of configuration values into bindable values

use sea_query::Value;

/// Check whether a value is SQL NULL
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Char(None)
        | Value::Bytes(None)
        | Value::Json(None)
        | Value::Uuid(None) => true,
        _ => false,
    }
}

/// Render a value the way it appears inside a link identifier.
///
/// Strings are emitted raw (no quotes, no escaping) so that `7` and `"7"`
/// produce the same identifier, matching what the database hands back.
/// NULL renders as an empty string.
pub fn key_string(value: &Value) -> String {
    match value {
        v if is_null(v) => String::new(),
        Value::Bool(Some(b)) => b.to_string(),
        Value::TinyInt(Some(i)) => i.to_string(),
        Value::SmallInt(Some(i)) => i.to_string(),
        Value::Int(Some(i)) => i.to_string(),
        Value::BigInt(Some(i)) => i.to_string(),
        Value::TinyUnsigned(Some(u)) => u.to_string(),
        Value::SmallUnsigned(Some(u)) => u.to_string(),
        Value::Unsigned(Some(u)) => u.to_string(),
        Value::BigUnsigned(Some(u)) => u.to_string(),
        Value::Float(Some(f)) => f.to_string(),
        Value::Double(Some(d)) => d.to_string(),
        Value::String(Some(s)) => s.to_string(),
        Value::Char(Some(c)) => c.to_string(),
        Value::Uuid(Some(u)) => u.to_string(),
        Value::Bytes(Some(b)) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
        Value::Json(Some(j)) => j.to_string(),
        other => format!("{:?}", other),
    }
}

/// Convert a value to an escaped SQL literal.
///
/// Strings (and anything rendered through text) have single quotes doubled;
/// numbers and booleans are emitted bare; NULL becomes `NULL`.
///
/// # Example
///
/// ```
/// use sea_query::Value;
/// use throughway::value::quote_literal;
///
/// assert_eq!(quote_literal(&Value::Int(Some(42))), "42");
/// assert_eq!(quote_literal(&Value::String(Some("it's".to_string()))), "'it''s'");
/// assert_eq!(quote_literal(&Value::Int(None)), "NULL");
/// ```
pub fn quote_literal(value: &Value) -> String {
    match value {
        v if is_null(v) => "NULL".to_string(),

        Value::Bool(Some(b)) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }

        Value::TinyInt(_)
        | Value::SmallInt(_)
        | Value::Int(_)
        | Value::BigInt(_)
        | Value::TinyUnsigned(_)
        | Value::SmallUnsigned(_)
        | Value::Unsigned(_)
        | Value::BigUnsigned(_)
        | Value::Float(_)
        | Value::Double(_) => key_string(value),

        // PostgreSQL hex format: '\x...'
        Value::Bytes(Some(b)) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("'\\x{}'", hex)
        }

        other => format!("'{}'", key_string(other).replace('\'', "''")),
    }
}

/// Convert a JSON value (as parsed from configuration) into a bindable value.
///
/// Returns `None` for arrays and objects, which have no scalar equivalent.
pub fn from_json(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => Some(Value::String(None)),
        serde_json::Value::Bool(b) => Some(Value::Bool(Some(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::BigInt(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Some(Value::BigUnsigned(Some(u)))
            } else {
                n.as_f64().map(|f| Value::Double(Some(f)))
            }
        }
        serde_json::Value::String(s) => Some(Value::String(Some(s.clone()))),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null() {
        assert!(is_null(&Value::Int(None)));
        assert!(is_null(&Value::String(None)));
        assert!(!is_null(&Value::Int(Some(0))));
        assert!(!is_null(&Value::String(Some(String::new()))));
    }

    #[test]
    fn test_key_string_is_unquoted() {
        assert_eq!(key_string(&Value::Int(Some(7))), "7");
        assert_eq!(key_string(&Value::BigInt(Some(-3))), "-3");
        assert_eq!(key_string(&Value::String(Some("abc".to_string()))), "abc");
        assert_eq!(key_string(&Value::Bool(Some(true))), "true");
        assert_eq!(key_string(&Value::Int(None)), "");
    }

    #[test]
    fn test_key_string_same_for_int_widths() {
        // Identifiers built from an i32 field and from an i64 row column must compare equal
        assert_eq!(
            key_string(&Value::Int(Some(12))),
            key_string(&Value::BigInt(Some(12)))
        );
    }

    #[test]
    fn test_key_string_uuid() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(key_string(&Value::from(id)), id.to_string());
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        // EDGE CASE: classic injection payload stays inside the literal
        let payload = Value::String(Some("x'; DROP TABLE tags; --".to_string()));
        assert_eq!(quote_literal(&payload), "'x''; DROP TABLE tags; --'");
    }

    #[test]
    fn test_quote_literal_scalars() {
        assert_eq!(quote_literal(&Value::Bool(Some(false))), "FALSE");
        assert_eq!(quote_literal(&Value::Double(Some(1.5))), "1.5");
        assert_eq!(quote_literal(&Value::Char(Some('\''))), "''''");
        assert_eq!(quote_literal(&Value::Bytes(Some(vec![0xde, 0xad]))), "'\\xdead'");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(from_json(&serde_json::json!(true)), Some(Value::Bool(Some(true))));
        assert_eq!(from_json(&serde_json::json!(3)), Some(Value::BigInt(Some(3))));
        assert_eq!(from_json(&serde_json::json!(2.5)), Some(Value::Double(Some(2.5))));
        assert_eq!(
            from_json(&serde_json::json!("draft")),
            Some(Value::String(Some("draft".to_string())))
        );
        assert_eq!(from_json(&serde_json::json!([1, 2])), None);
    }
}
