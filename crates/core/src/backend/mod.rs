pub mod factory;
pub mod memory;
pub mod query;
pub mod rest;
pub mod traits;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::CoreError;

/// Decode wire rows into their typed row struct.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, CoreError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                CoreError::Deserialization(format!("Unexpected row shape in '{table}': {e}"))
            })
        })
        .collect()
}

/// Decode the single row an insert/update returned.
pub fn decode_one<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<T, CoreError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::NotFound(format!("no row returned from '{table}'")))?;
    serde_json::from_value(row)
        .map_err(|e| CoreError::Deserialization(format!("Unexpected row shape in '{table}': {e}")))
}

/// Decode the row an update of `label` returned. No row means `label` does not
/// exist; a malformed row stays a deserialization error.
pub fn decode_existing<T: DeserializeOwned>(
    table: &str,
    rows: Vec<Value>,
    label: &str,
) -> Result<T, CoreError> {
    decode_one(table, rows).map_err(|e| match e {
        CoreError::NotFound(_) => CoreError::NotFound(label.to_string()),
        other => other,
    })
}

/// Serialize an input payload for the table API.
pub fn to_payload<T: Serialize>(input: &T) -> Result<Value, CoreError> {
    serde_json::to_value(input)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize payload: {e}")))
}
