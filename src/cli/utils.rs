use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(extra)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(extra);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a list of strings, one per line in text mode
pub fn output_list(
    output_format: &OutputFormat,
    collection_name: &str,
    items: &[String],
    empty_message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: items
            }))?);
        }
        OutputFormat::Text if items.is_empty() => {
            println!("{}", empty_message);
        }
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
    }
    Ok(())
}

/// Render a `key: value` table for text mode, JSON as-is otherwise
pub fn output_record(output_format: &OutputFormat, record: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Text => {
            if let Some(object) = record.as_object() {
                for (key, value) in object {
                    match value {
                        Value::String(s) => println!("{}: {}", key, s),
                        Value::Null => println!("{}: -", key),
                        other => println!("{}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}
