//! Polymorphic GLPI field parsing
//!
//! The `users_id_tech` search field arrives in four encodings depending on
//! GLPI version and row shape: a number, a decimal string, an array of
//! either, or a JSON-encoded string of any of those. One parser normalises
//! them all; every caller sees `Option<String>`.

use serde_json::Value;

/// Normalise a technician field value to a canonical decimal id.
///
/// Lists yield their first non-zero element; JSON-looking strings are
/// parsed and re-dispatched; zero and anything non-numeric yield `None`.
pub fn technician_id(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => from_number(n),
        Value::Array(items) => items.iter().find_map(technician_id),
        Value::String(s) => from_string(s),
        _ => None,
    }
}

fn from_number(n: &serde_json::Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return (i > 0).then(|| i.to_string());
    }
    // Floats only count when they are integral
    let f = n.as_f64()?;
    (f > 0.0 && f.fract() == 0.0).then(|| (f as i64).to_string())
}

/// Lenient integer parsing for GLPI row values, which flip between numbers
/// and decimal strings across versions.
pub fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn from_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    // JSON-encoded payloads ("[5, 0]", "\"7\"") are unwrapped recursively.
    if let Ok(inner) = serde_json::from_str::<Value>(trimmed)
        && !matches!(inner, Value::String(_))
    {
        return technician_id(&inner);
    }

    let id = trimmed.parse::<i64>().ok()?;
    (id > 0).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_forms() {
        assert_eq!(technician_id(&json!(5)), Some("5".to_string()));
        assert_eq!(technician_id(&json!(5.0)), Some("5".to_string()));
        assert_eq!(technician_id(&json!(0)), None);
        assert_eq!(technician_id(&json!(-3)), None);
        assert_eq!(technician_id(&json!(5.5)), None);
    }

    #[test]
    fn string_forms() {
        assert_eq!(technician_id(&json!("42")), Some("42".to_string()));
        assert_eq!(technician_id(&json!(" 42 ")), Some("42".to_string()));
        assert_eq!(technician_id(&json!("0")), None);
        assert_eq!(technician_id(&json!("")), None);
        assert_eq!(technician_id(&json!("jsilva")), None);
    }

    #[test]
    fn list_forms_pick_first_non_zero() {
        assert_eq!(technician_id(&json!([0, 7, 9])), Some("7".to_string()));
        assert_eq!(technician_id(&json!(["0", "11"])), Some("11".to_string()));
        assert_eq!(technician_id(&json!([])), None);
        assert_eq!(technician_id(&json!([0, 0])), None);
    }

    #[test]
    fn json_encoded_strings_are_unwrapped() {
        assert_eq!(technician_id(&json!("[0, 13]")), Some("13".to_string()));
        assert_eq!(technician_id(&json!("[\"8\"]")), Some("8".to_string()));
    }

    #[test]
    fn null_and_objects_yield_none() {
        assert_eq!(technician_id(&Value::Null), None);
        assert_eq!(technician_id(&json!({"id": 4})), None);
    }

    #[test]
    fn int_value_accepts_numbers_and_strings() {
        assert_eq!(int_value(&json!(5)), Some(5));
        assert_eq!(int_value(&json!("6")), Some(6));
        assert_eq!(int_value(&json!(" 7 ")), Some(7));
        assert_eq!(int_value(&json!("x")), None);
        assert_eq!(int_value(&json!([1])), None);
    }
}
