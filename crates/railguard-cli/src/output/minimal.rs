use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for the decision-bearing field first, then fall back to
/// the first field of the object.
pub fn print_minimal(value: &Value) {
    let priority_keys = [
        "allowed",
        "risk_level",
        "level",
        "score",
        "should_request",
        "has_unusual_patterns",
        "new_tier",
        "provider",
    ];

    if let Value::Object(map) = value {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(value));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
