use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::query::Query;
use super::traits::Backend;
use crate::errors::CoreError;

/// One recorded remote-procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub function: String,
    pub args: Value,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    rpc_responses: HashMap<String, Result<Value, String>>,
    rpc_calls: Vec<RpcCall>,
    objects: HashMap<(String, String), Vec<u8>>,
    failing_uploads: Vec<String>,
}

/// Backend that keeps everything in process.
///
/// Tables behave like the REST table API (same `Query` semantics); inserted
/// rows get an `id` and `created_at` when they lack one. Remote procedures
/// return whatever was scripted with [`MemoryBackend::set_rpc_response`].
/// Useful offline and in tests.
pub struct MemoryBackend {
    base_url: String,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            base_url: "memory://local".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CoreError> {
        self.state
            .lock()
            .map_err(|_| CoreError::Storage("memory backend lock poisoned".into()))
    }

    /// Replace the contents of a table.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<(), CoreError> {
        self.lock()?.tables.insert(table.to_string(), rows);
        Ok(())
    }

    /// Current contents of a table (empty when unknown).
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .map(|s| s.tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Script the result of a remote procedure.
    pub fn set_rpc_response(&self, function: &str, response: Value) -> Result<(), CoreError> {
        self.lock()?
            .rpc_responses
            .insert(function.to_string(), Ok(response));
        Ok(())
    }

    /// Make a remote procedure fail with `message`.
    pub fn set_rpc_error(&self, function: &str, message: &str) -> Result<(), CoreError> {
        self.lock()?
            .rpc_responses
            .insert(function.to_string(), Err(message.to_string()));
        Ok(())
    }

    /// Every remote procedure called so far, oldest first.
    pub fn rpc_calls(&self) -> Vec<RpcCall> {
        self.lock().map(|s| s.rpc_calls.clone()).unwrap_or_default()
    }

    /// Make uploads whose path ends with `suffix` fail.
    pub fn fail_uploads_ending_with(&self, suffix: &str) -> Result<(), CoreError> {
        self.lock()?.failing_uploads.push(suffix.to_string());
        Ok(())
    }

    /// Bytes stored at `bucket/path`, if any.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .ok()?
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stamp(row: Value) -> Result<Value, CoreError> {
    let mut object: Map<String, Value> = match row {
        Value::Object(map) => map,
        other => {
            return Err(CoreError::ValidationError(format!(
                "Rows must be JSON objects, got {other}"
            )))
        }
    };
    if object.get("id").map_or(true, Value::is_null) {
        object.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    if object.get("created_at").map_or(true, Value::is_null) {
        object.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
    Ok(Value::Object(object))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "Memory"
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, CoreError> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, CoreError> {
        let batch = match rows {
            Value::Array(items) => items,
            single => vec![single],
        };
        let stamped = batch.into_iter().map(stamp).collect::<Result<Vec<_>, _>>()?;

        let mut state = self.lock()?;
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stamped.iter().cloned());
        Ok(stamped)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, CoreError> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(CoreError::ValidationError(format!(
                    "Update patch must be a JSON object, got {other}"
                )))
            }
        };

        let mut state = self.lock()?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(target) = row {
                    for (k, v) in &patch {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), CoreError> {
        let mut state = self.lock()?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| !query.matches(r));
        }
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, CoreError> {
        let mut state = self.lock()?;
        state.rpc_calls.push(RpcCall {
            function: function.to_string(),
            args,
        });
        match state.rpc_responses.get(function) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(CoreError::Api {
                endpoint: format!("rpc/{function}"),
                message: message.clone(),
            }),
            None => Ok(Value::Null),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, CoreError> {
        let mut state = self.lock()?;
        if state.failing_uploads.iter().any(|s| path.ends_with(s.as_str())) {
            return Err(CoreError::Api {
                endpoint: format!("storage/{bucket}"),
                message: format!("upload of {path} rejected"),
            });
        }
        state
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(path.to_string())
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<(), CoreError> {
        let mut state = self.lock()?;
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{bucket}/{path}", self.base_url)
    }
}
