use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Arrays longer than this are summarised instead of printed inline.
const MAX_INLINE: usize = 12;

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_field_table(map);
            }
        }
        Value::Array(arr) => print_record_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => {
            print_field_table(res_map);

            let labels = asset_labels(res_map);
            for (key, val) in res_map {
                match val {
                    Value::Array(rows) if is_record_list(rows) => {
                        println!("\n{}:", key);
                        print_record_table(rows);
                    }
                    Value::Array(rows) if is_matrix(rows) => {
                        println!("\n{}:", key);
                        print_matrix(rows, labels.as_deref());
                    }
                    _ => {}
                }
            }
        }
        _ => print_field_table(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_field_table(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_record_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(headers.clone());
        for map in arr.iter().filter_map(Value::as_object) {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn print_matrix(rows: &[Value], labels: Option<&[String]>) {
    let mut builder = Builder::default();
    if let Some(labels) = labels {
        let mut header = vec![String::new()];
        header.extend(labels.iter().cloned());
        builder.push_record(header);
    }
    for (i, row) in rows.iter().enumerate() {
        let mut record = vec![labels
            .and_then(|l| l.get(i).cloned())
            .unwrap_or_else(|| i.to_string())];
        if let Value::Array(cells) = row {
            record.extend(cells.iter().map(format_value));
        }
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

/// Asset names to label matrix rows and columns with, when the result has them.
fn asset_labels(map: &Map<String, Value>) -> Option<Vec<String>> {
    ["assets", "asset_names"].iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(names)) if !names.is_empty() => names
            .iter()
            .map(|n| n.as_str().map(str::to_string))
            .collect(),
        _ => None,
    })
}

fn is_record_list(arr: &[Value]) -> bool {
    !arr.is_empty() && arr.iter().all(Value::is_object)
}

fn is_matrix(arr: &[Value]) -> bool {
    !arr.is_empty() && arr.iter().all(Value::is_array)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.6}", f),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) if arr.len() > MAX_INLINE => format!("[{} values]", arr.len()),
        Value::Array(arr) if is_record_list(arr) || is_matrix(arr) => "(see below)".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
