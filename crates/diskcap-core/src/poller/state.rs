//! Extract the observed state field from a resource payload.

use serde_json::Value;

/// Read the value at JSON `pointer` in `body` as a string.
///
/// Strings are returned as-is, whole numbers without a fraction (`100.0` → `"100"`),
/// other numbers and booleans in their JSON form. Missing fields, nulls, objects,
/// arrays and unparseable bodies yield `None`.
pub fn extract_field(body: &str, pointer: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
