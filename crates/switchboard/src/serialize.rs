//! Structured serialization of result values.
//!
//! Handles JSON, YAML, and CSV rendering of a command's result values for
//! result handlers and the HTTP adapter. The value slice collapses first:
//! empty becomes null, a single value stays itself, several become an array.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(String),
}

/// Collapses a result-value slice into one JSON value.
pub fn results_value(results: &[Value]) -> Value {
    match results {
        [] => Value::Null,
        [single] => single.clone(),
        many => Value::Array(many.to_vec()),
    }
}

/// Serializes result values to pretty JSON.
pub fn to_json(results: &[Value]) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(&results_value(results))?)
}

/// Serializes result values to YAML.
pub fn to_yaml(results: &[Value]) -> Result<String, SerializeError> {
    Ok(serde_yaml::to_string(&results_value(results))?)
}

/// Serializes result values to CSV.
///
/// An array of objects becomes header + rows; a single object becomes
/// key/value pairs; scalars fall back to a one-column `value` table.
pub fn to_csv(results: &[Value]) -> Result<String, SerializeError> {
    flatten_to_csv(&results_value(results))
}

fn flatten_to_csv(value: &Value) -> Result<String, SerializeError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    match value {
        Value::Array(arr) if !arr.is_empty() => {
            if let Some(Value::Object(first)) = arr.first() {
                let headers: Vec<&str> = first.keys().map(String::as_str).collect();
                wtr.write_record(&headers)
                    .map_err(|e| SerializeError::Csv(e.to_string()))?;
                for item in arr {
                    if let Value::Object(obj) = item {
                        let row: Vec<String> = headers
                            .iter()
                            .map(|h| obj.get(*h).map(value_to_string).unwrap_or_default())
                            .collect();
                        wtr.write_record(&row)
                            .map_err(|e| SerializeError::Csv(e.to_string()))?;
                    }
                }
            } else {
                wtr.write_record(["value"])
                    .map_err(|e| SerializeError::Csv(e.to_string()))?;
                for item in arr {
                    wtr.write_record(&[value_to_string(item)])
                        .map_err(|e| SerializeError::Csv(e.to_string()))?;
                }
            }
        }
        Value::Object(obj) => {
            wtr.write_record(["key", "value"])
                .map_err(|e| SerializeError::Csv(e.to_string()))?;
            for (k, v) in obj {
                wtr.write_record([k.as_str(), &value_to_string(v)])
                    .map_err(|e| SerializeError::Csv(e.to_string()))?;
            }
        }
        _ => {
            wtr.write_record(["value"])
                .map_err(|e| SerializeError::Csv(e.to_string()))?;
            wtr.write_record(&[value_to_string(value)])
                .map_err(|e| SerializeError::Csv(e.to_string()))?;
        }
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SerializeError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SerializeError::Csv(e.to_string()))
}

/// Converts a JSON value to a string for CSV output.
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
