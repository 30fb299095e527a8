use serde_json::Value;

/// Coerces a loosely-typed JSON scalar into a number.
///
/// Numbers pass through, numeric strings are parsed, booleans map to 1/0 and
/// everything else (null, objects, garbage strings) becomes 0.
pub fn value_as_f64(value: &Value) -> f64 {
    optional_f64(value).unwrap_or(0.0)
}

/// Like [`value_as_f64`] but keeps "absent" distinct from zero.
pub fn optional_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Reads `key` from an object and coerces it, treating a missing key as absent.
pub fn field_f64(object: &Value, key: &str) -> Option<f64> {
    object.get(key).and_then(optional_f64)
}

/// Returns the first key of `keys` present on `object` as a non-empty string.
pub fn first_string_field(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Returns the first key of `keys` present on `object` that coerces to a number.
pub fn first_number_field(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| field_f64(object, key))
}

/// Division that yields 0 instead of infinity or NaN.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Turns a snake_case payload key into a display label: `net_income` -> `Net Income`.
pub fn humanize_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a period label from either a numeric or a string year.
pub fn period_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}
