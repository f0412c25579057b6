use async_trait::async_trait;
use serde_json::Value;

use super::query::Query;
use crate::errors::CoreError;

/// Everything the application needs from the hosted backend: the table API,
/// named remote procedures, and object storage.
///
/// Services only ever talk to `&dyn Backend`, so the REST client and the
/// in-memory backend are interchangeable.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Backend: Send + Sync {
    /// Human-readable name of this backend (for logs/errors).
    fn name(&self) -> &str;

    /// Read rows from a table.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, CoreError>;

    /// Insert one row (object) or many (array). Returns the stored rows.
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, CoreError>;

    /// Patch every row matching `query`. Returns the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value)
        -> Result<Vec<Value>, CoreError>;

    /// Delete every row matching `query`.
    async fn delete(&self, table: &str, query: &Query) -> Result<(), CoreError>;

    /// Call a named remote procedure.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, CoreError>;

    /// Store an object and return its path inside the bucket.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, CoreError>;

    /// Remove stored objects.
    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<(), CoreError>;

    /// Public URL of a stored object. Pure; does not check existence.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
