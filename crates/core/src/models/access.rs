use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Clients ─────────────────────────────────────────────────────────

/// Wire shape of the `clients` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub memo: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A subscriber of the research service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub memo: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            company: row.company,
            email: row.email,
            phone: row.phone,
            memo: row.memo,
            is_active: row.is_active.unwrap_or(true),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

// ── Shared passwords ────────────────────────────────────────────────

/// Wire shape of the `shared_passwords` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedPasswordRow {
    pub id: Uuid,
    pub label: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The general access code handed out to clients. At most one is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPassword {
    pub id: Uuid,
    pub label: String,
    pub password: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<SharedPasswordRow> for SharedPassword {
    fn from(row: SharedPasswordRow) -> Self {
        Self {
            id: row.id,
            label: row.label.unwrap_or_default(),
            password: row.password.unwrap_or_default(),
            is_active: row.is_active.unwrap_or(false),
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedPasswordInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Admin codes ─────────────────────────────────────────────────────

/// Wire shape of the `admin_codes` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessCodeRow {
    pub id: Uuid,
    pub code: Option<String>,
    pub label: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A code that unlocks the back-office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCode {
    pub id: Uuid,
    pub code: String,
    pub label: String,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<AccessCodeRow> for AccessCode {
    fn from(row: AccessCodeRow) -> Self {
        Self {
            id: row.id,
            code: row.code.unwrap_or_default(),
            label: row.label.unwrap_or_default(),
            is_active: row.is_active.unwrap_or(true),
            created_at: row.created_at,
        }
    }
}

impl AccessCode {
    /// Code with everything but the last four characters masked, for listings.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.code.chars().collect();
        let visible = chars.len().min(4);
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessCodeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}
