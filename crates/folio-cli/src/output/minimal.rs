use serde_json::Value;

/// Headline field per command, in priority order.
const PRIORITY_KEYS: [&str; 7] = [
    "optimal_weights",
    "predictions",
    "value_at_risk",
    "scenarios",
    "max_sharpe",
    "final_values",
    "annualized_returns",
];

/// Print just the key answer value from the output.
///
/// Looks for the headline field of the command that produced the value,
/// then falls back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        for key in &PRIORITY_KEYS {
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

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) if items.iter().all(Value::is_number) => items
            .iter()
            .map(format_minimal)
            .collect::<Vec<_>>()
            .join(","),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weights_print_as_csv_line() {
        assert_eq!(format_minimal(&json!([0.25, 0.75])), "0.25,0.75");
        assert_eq!(format_minimal(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
