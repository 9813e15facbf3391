use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(_) => {
            print_flat_object(value);
            print_string_list(value, "suggestions", "Suggestions");
            print_pattern_list(value);
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            // Nested collections get their own sections below
            if matches!(val, Value::Array(_)) && (key == "suggestions" || key == "patterns") {
                continue;
            }
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        let table = Table::from(builder);
        println!("{}", table);
    }
}

fn print_string_list(value: &Value, key: &str, heading: &str) {
    if let Some(Value::Array(items)) = value.get(key) {
        if !items.is_empty() {
            println!("\n{}:", heading);
            for item in items {
                if let Value::String(s) = item {
                    println!("  - {}", s);
                }
            }
        }
    }
}

fn print_pattern_list(value: &Value) {
    if let Some(Value::Array(patterns)) = value.get("patterns") {
        if !patterns.is_empty() {
            println!("\nPatterns:");
            print_array_table(patterns);
        }
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        let table = Table::from(builder);
        println!("{}", table);
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
