use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_existing, decode_one, decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::issue::{Issue, IssueInput, IssueRow};

pub const ISSUES: &str = "issues";

/// News feed and issue administration.
pub struct IssueService;

impl IssueService {
    pub fn new() -> Self {
        Self
    }

    /// Published issues, newest first.
    pub async fn news_feed(
        &self,
        backend: &dyn Backend,
        limit: usize,
    ) -> Result<Vec<Issue>, CoreError> {
        let query = Query::new()
            .eq("is_published", true)
            .order("issue_date", false)
            .order("created_at", false)
            .limit(limit);
        self.fetch(backend, &query).await
    }

    /// Every issue, drafts included, newest first (back-office list).
    pub async fn list_all(&self, backend: &dyn Backend) -> Result<Vec<Issue>, CoreError> {
        let query = Query::new()
            .order("issue_date", false)
            .order("created_at", false);
        self.fetch(backend, &query).await
    }

    pub async fn issues_for_stock(
        &self,
        backend: &dyn Backend,
        stock_id: Uuid,
        published_only: bool,
    ) -> Result<Vec<Issue>, CoreError> {
        let mut query = Query::new()
            .eq("stock_id", stock_id.to_string())
            .order("issue_date", false)
            .order("created_at", false);
        if published_only {
            query = query.eq("is_published", true);
        }
        self.fetch(backend, &query).await
    }

    pub async fn create_issue(
        &self,
        backend: &dyn Backend,
        input: &IssueInput,
    ) -> Result<Issue, CoreError> {
        if input.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(CoreError::ValidationError("title is required".into()));
        }
        let rows = backend.insert(ISSUES, to_payload(input)?).await?;
        let row: IssueRow = decode_one(ISSUES, rows)?;
        Ok(row.into())
    }

    pub async fn update_issue(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        input: &IssueInput,
    ) -> Result<Issue, CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows = backend.update(ISSUES, &query, to_payload(input)?).await?;
        let row: IssueRow = decode_existing(ISSUES, rows, &format!("issue {id}"))?;
        Ok(row.into())
    }

    pub async fn delete_issue(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        backend
            .delete(ISSUES, &Query::new().eq("id", id.to_string()))
            .await
    }

    async fn fetch(&self, backend: &dyn Backend, query: &Query) -> Result<Vec<Issue>, CoreError> {
        let rows: Vec<IssueRow> = decode_rows(ISSUES, backend.select(ISSUES, query).await?)?;
        Ok(rows.into_iter().map(Issue::from).collect())
    }
}

impl Default for IssueService {
    fn default() -> Self {
        Self::new()
    }
}
