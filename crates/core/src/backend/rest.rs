use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::query::Query;
use super::traits::Backend;
use crate::errors::CoreError;
use crate::models::settings::BackendConfig;

/// Client for the hosted table/RPC/storage service.
///
/// - **Tables**: `{url}/rest/v1/{table}` with filter query parameters.
/// - **RPC**: `POST {url}/rest/v1/rpc/{function}` with a JSON body.
/// - **Storage**: `{url}/storage/v1/object/{bucket}/{path}`.
///
/// Every request carries the anon key as `apikey` and bearer token. The admin
/// variant also carries the admin code in the configured header; the backend
/// re-validates it on each privileged call.
pub struct RestBackend {
    client: Client,
    base_url: String,
    name: String,
}

impl RestBackend {
    /// Client with public (anonymous) privileges.
    pub fn public(config: &BackendConfig) -> Result<Self, CoreError> {
        Self::build(config, None, "Backend")
    }

    /// Client that attaches `admin_code` to every request.
    pub fn admin(config: &BackendConfig, admin_code: &str) -> Result<Self, CoreError> {
        Self::build(config, Some(admin_code), "Backend (admin)")
    }

    fn build(
        config: &BackendConfig,
        admin_code: Option<&str>,
        name: &str,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&config.anon_key)
                .map_err(|e| CoreError::Config(format!("Invalid anon key: {e}")))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.anon_key))
                .map_err(|e| CoreError::Config(format!("Invalid anon key: {e}")))?,
        );
        if let Some(code) = admin_code {
            let header = HeaderName::from_bytes(config.admin_header.as_bytes())
                .map_err(|e| CoreError::Config(format!("Invalid admin header name: {e}")))?;
            let mut value = HeaderValue::from_str(code)
                .map_err(|e| CoreError::ValidationError(format!("Admin code is not a valid header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(header, value);
        }

        let builder = Client::builder().default_headers(headers);
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        let client = builder
            .build()
            .map_err(|e| CoreError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            name: name.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Send a request and return the body as JSON (`Null` for an empty body).
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Value, CoreError> {
        log::debug!("{} → {endpoint}", self.name);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            log::error!("{} rejected credentials for {endpoint}: {status}", self.name);
            return Err(CoreError::Unauthorized(format!("{endpoint} ({status})")));
        }
        if !status.is_success() {
            log::error!("{} error for {endpoint}: {status} - {body}", self.name);
            return Err(CoreError::Api {
                endpoint: endpoint.to_string(),
                message: format!("{status}: {}", error_message(&body)),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| CoreError::Api {
            endpoint: endpoint.to_string(),
            message: format!("Failed to parse response: {e}"),
        })
    }

    async fn send_rows(&self, endpoint: &str, request: RequestBuilder) -> Result<Vec<Value>, CoreError> {
        match self.send(endpoint, request).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

/// Pull the human-readable message out of an error body when there is one.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Backend for RestBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, CoreError> {
        let request = self.client.get(self.table_url(table)).query(&query.to_params());
        self.send_rows(table, request).await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, CoreError> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        self.send_rows(table, request).await
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, CoreError> {
        if query.filters.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Refusing to update every row of '{table}' without a filter"
            )));
        }
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&query.filter_params())
            .header("Prefer", "return=representation")
            .json(&patch);
        self.send_rows(table, request).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), CoreError> {
        if query.filters.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Refusing to delete every row of '{table}' without a filter"
            )));
        }
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&query.filter_params());
        self.send(table, request).await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, CoreError> {
        let url = format!("{}/rest/v1/rpc/{function}", self.base_url);
        let request = self.client.post(url).json(&args);
        self.send(&format!("rpc/{function}"), request).await
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, CoreError> {
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.base_url);
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        self.send(&format!("storage/{bucket}"), request).await?;
        Ok(path.to_string())
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<(), CoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = format!("{}/storage/v1/object/{bucket}", self.base_url);
        let request = self
            .client
            .delete(url)
            .json(&serde_json::json!({ "prefixes": paths }));
        self.send(&format!("storage/{bucket}"), request).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }
}
