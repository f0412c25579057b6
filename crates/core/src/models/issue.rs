use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire shape of the `issues` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRow {
    pub id: Uuid,
    pub stock_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub is_published: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A news item or research note, optionally tied to a stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub stock_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    /// Date the issue refers to; falls back to the creation date.
    pub issue_date: Option<NaiveDate>,
    pub is_published: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<IssueRow> for Issue {
    fn from(row: IssueRow) -> Self {
        let issue_date = row
            .issue_date
            .or_else(|| row.created_at.map(|ts| ts.date_naive()));
        Self {
            id: row.id,
            stock_id: row.stock_id,
            title: row.title.unwrap_or_default(),
            content: row.content.unwrap_or_default(),
            source: row.source,
            source_url: row.source_url,
            issue_date,
            is_published: row.is_published.unwrap_or(true),
            created_at: row.created_at,
        }
    }
}

/// Insert/update payload for an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}
