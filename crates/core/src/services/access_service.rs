use serde_json::json;
use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_existing, decode_one, decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::access::{
    AccessCode, AccessCodeInput, AccessCodeRow, Client, ClientInput, ClientRow, SharedPassword,
    SharedPasswordInput, SharedPasswordRow,
};

pub const CLIENTS: &str = "clients";
pub const SHARED_PASSWORDS: &str = "shared_passwords";
pub const ADMIN_CODES: &str = "admin_codes";

/// Admin codes shorter than this are refused.
pub const MIN_ADMIN_CODE_LEN: usize = 6;

/// Back-office management of who may get in: clients, the shared client
/// password, and admin codes.
pub struct AccessService;

impl AccessService {
    pub fn new() -> Self {
        Self
    }

    // ── Clients ─────────────────────────────────────────────────────

    pub async fn list_clients(&self, backend: &dyn Backend) -> Result<Vec<Client>, CoreError> {
        let query = Query::new().order("created_at", false);
        let rows: Vec<ClientRow> = decode_rows(CLIENTS, backend.select(CLIENTS, &query).await?)?;
        Ok(rows.into_iter().map(Client::from).collect())
    }

    pub async fn create_client(
        &self,
        backend: &dyn Backend,
        input: &ClientInput,
    ) -> Result<Client, CoreError> {
        if input.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(CoreError::ValidationError("client name is required".into()));
        }
        if let Some(email) = input.email.as_deref() {
            if !email.trim().is_empty() && !email.contains('@') {
                return Err(CoreError::ValidationError(format!("invalid email: {email}")));
            }
        }
        let rows = backend.insert(CLIENTS, to_payload(input)?).await?;
        let row: ClientRow = decode_one(CLIENTS, rows)?;
        Ok(row.into())
    }

    pub async fn update_client(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        input: &ClientInput,
    ) -> Result<Client, CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows = backend.update(CLIENTS, &query, to_payload(input)?).await?;
        let row: ClientRow = decode_existing(CLIENTS, rows, &format!("client {id}"))?;
        Ok(row.into())
    }

    pub async fn set_client_active(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        active: bool,
    ) -> Result<Client, CoreError> {
        let input = ClientInput {
            is_active: Some(active),
            ..ClientInput::default()
        };
        self.update_client(backend, id, &input).await
    }

    pub async fn delete_client(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        backend
            .delete(CLIENTS, &Query::new().eq("id", id.to_string()))
            .await
    }

    // ── Shared passwords ────────────────────────────────────────────

    pub async fn list_shared_passwords(
        &self,
        backend: &dyn Backend,
    ) -> Result<Vec<SharedPassword>, CoreError> {
        let query = Query::new().order("created_at", false);
        let rows: Vec<SharedPasswordRow> =
            decode_rows(SHARED_PASSWORDS, backend.select(SHARED_PASSWORDS, &query).await?)?;
        Ok(rows.into_iter().map(SharedPassword::from).collect())
    }

    /// Add a new shared password. It starts inactive; see `activate_shared_password`.
    pub async fn create_shared_password(
        &self,
        backend: &dyn Backend,
        input: &SharedPasswordInput,
    ) -> Result<SharedPassword, CoreError> {
        let password = input.password.as_deref().map(str::trim).unwrap_or_default();
        if password.is_empty() {
            return Err(CoreError::ValidationError("password must not be empty".into()));
        }
        let mut payload = to_payload(&SharedPasswordInput {
            password: Some(password.to_string()),
            ..input.clone()
        })?;
        payload["is_active"] = json!(false);

        let rows = backend.insert(SHARED_PASSWORDS, payload).await?;
        let row: SharedPasswordRow = decode_one(SHARED_PASSWORDS, rows)?;
        Ok(row.into())
    }

    /// Make `id` the one active shared password. The backend deactivates the others.
    pub async fn activate_shared_password(
        &self,
        backend: &dyn Backend,
        id: Uuid,
    ) -> Result<(), CoreError> {
        backend
            .rpc("activate_shared_password", json!({ "password_id": id.to_string() }))
            .await?;
        Ok(())
    }

    pub async fn delete_shared_password(
        &self,
        backend: &dyn Backend,
        id: Uuid,
    ) -> Result<(), CoreError> {
        backend
            .delete(SHARED_PASSWORDS, &Query::new().eq("id", id.to_string()))
            .await
    }

    // ── Admin codes ─────────────────────────────────────────────────

    pub async fn list_admin_codes(
        &self,
        backend: &dyn Backend,
    ) -> Result<Vec<AccessCode>, CoreError> {
        let query = Query::new().order("created_at", false);
        let rows: Vec<AccessCodeRow> =
            decode_rows(ADMIN_CODES, backend.select(ADMIN_CODES, &query).await?)?;
        Ok(rows.into_iter().map(AccessCode::from).collect())
    }

    pub async fn create_admin_code(
        &self,
        backend: &dyn Backend,
        input: &AccessCodeInput,
    ) -> Result<AccessCode, CoreError> {
        let code = input.code.as_deref().map(str::trim).unwrap_or_default();
        if code.chars().count() < MIN_ADMIN_CODE_LEN {
            return Err(CoreError::ValidationError(format!(
                "admin code must be at least {MIN_ADMIN_CODE_LEN} characters"
            )));
        }
        if code.chars().any(char::is_whitespace) {
            return Err(CoreError::ValidationError(
                "admin code must not contain whitespace".into(),
            ));
        }
        let payload = to_payload(&AccessCodeInput {
            code: Some(code.to_string()),
            ..input.clone()
        })?;
        let rows = backend.insert(ADMIN_CODES, payload).await?;
        let row: AccessCodeRow = decode_one(ADMIN_CODES, rows)?;
        Ok(row.into())
    }

    pub async fn set_admin_code_active(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        active: bool,
    ) -> Result<AccessCode, CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows = backend
            .update(ADMIN_CODES, &query, json!({ "is_active": active }))
            .await?;
        let row: AccessCodeRow =
            decode_existing(ADMIN_CODES, rows, &format!("admin code {id}"))?;
        Ok(row.into())
    }

    pub async fn delete_admin_code(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        backend
            .delete(ADMIN_CODES, &Query::new().eq("id", id.to_string()))
            .await
    }
}

impl Default for AccessService {
    fn default() -> Self {
        Self::new()
    }
}
