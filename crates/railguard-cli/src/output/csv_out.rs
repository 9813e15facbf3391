use serde_json::Value;

/// Flatten the output object to a two-column CSV (field,value); arrays of
/// objects become row-per-item CSV with their keys as headers.
pub fn print_csv(value: &Value) {
    let mut writer = csv::Writer::from_writer(std::io::stdout());

    let result = match value {
        Value::Array(arr) => write_rows(&mut writer, arr),
        Value::Object(map) => {
            let mut r = writer.write_record(["field", "value"]);
            if r.is_ok() {
                for (key, val) in map {
                    r = writer.write_record([key.as_str(), &scalar(val)]);
                    if r.is_err() {
                        break;
                    }
                }
            }
            r
        }
        other => writer.write_record([scalar(other)]),
    };

    if let Err(e) = result.and_then(|_| writer.flush().map_err(Into::into)) {
        eprintln!("CSV output error: {}", e);
    }
}

fn write_rows(
    writer: &mut csv::Writer<std::io::Stdout>,
    arr: &[Value],
) -> Result<(), csv::Error> {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            writer.write_record([scalar(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    writer.write_record(&headers)?;
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h).map(scalar).unwrap_or_default())
                .collect();
            writer.write_record(&row)?;
        }
    }
    Ok(())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
