use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_existing, decode_one, decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::issue::{Issue, IssueRow};
use crate::models::stock::{
    BusinessSegment, InvestmentPoint, Stock, StockDetail, StockInput, StockRow,
};

pub const STOCKS: &str = "stocks";
pub const SEGMENTS: &str = "business_segments";
pub const INVESTMENT_POINTS: &str = "investment_points";

/// Issues shown on a stock detail page.
const DETAIL_ISSUE_LIMIT: usize = 20;

/// Stock list, stock detail, and stock administration.
pub struct StockService;

impl StockService {
    pub fn new() -> Self {
        Self
    }

    /// All stocks ordered by name; `active_only` for the client viewer.
    pub async fn list_stocks(
        &self,
        backend: &dyn Backend,
        active_only: bool,
    ) -> Result<Vec<Stock>, CoreError> {
        let mut query = Query::new().order("name", true);
        if active_only {
            query = query.eq("is_active", true);
        }
        let rows: Vec<StockRow> = decode_rows(STOCKS, backend.select(STOCKS, &query).await?)?;
        Ok(rows.into_iter().map(Stock::from).collect())
    }

    /// Stocks with the given ids, in no particular order. Unknown ids are skipped.
    pub async fn stocks_by_ids(
        &self,
        backend: &dyn Backend,
        ids: &[Uuid],
    ) -> Result<Vec<Stock>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().in_list("id", ids.iter().map(|id| id.to_string()));
        let rows: Vec<StockRow> = decode_rows(STOCKS, backend.select(STOCKS, &query).await?)?;
        Ok(rows.into_iter().map(Stock::from).collect())
    }

    pub async fn get_stock(&self, backend: &dyn Backend, id: Uuid) -> Result<Stock, CoreError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        let rows = backend.select(STOCKS, &query).await?;
        let row: StockRow = decode_existing(STOCKS, rows, &format!("stock {id}"))?;
        Ok(row.into())
    }

    /// Stock plus segments, investment points, and its latest published issues.
    pub async fn get_stock_detail(
        &self,
        backend: &dyn Backend,
        id: Uuid,
    ) -> Result<StockDetail, CoreError> {
        let stock = self.get_stock(backend, id).await?;

        let by_stock = Query::new().eq("stock_id", id.to_string()).order("sort_order", true);
        let segments: Vec<BusinessSegment> =
            decode_rows(SEGMENTS, backend.select(SEGMENTS, &by_stock).await?)?;
        let investment_points: Vec<InvestmentPoint> = decode_rows(
            INVESTMENT_POINTS,
            backend.select(INVESTMENT_POINTS, &by_stock).await?,
        )?;

        let issue_query = Query::new()
            .eq("stock_id", id.to_string())
            .eq("is_published", true)
            .order("issue_date", false)
            .order("created_at", false)
            .limit(DETAIL_ISSUE_LIMIT);
        let issue_rows: Vec<IssueRow> = decode_rows(
            super::issue_service::ISSUES,
            backend.select(super::issue_service::ISSUES, &issue_query).await?,
        )?;

        Ok(StockDetail {
            stock,
            segments,
            investment_points,
            issues: issue_rows.into_iter().map(Issue::from).collect(),
        })
    }

    pub async fn create_stock(
        &self,
        backend: &dyn Backend,
        input: &StockInput,
    ) -> Result<Stock, CoreError> {
        Self::validate_new(input)?;
        let rows = backend.insert(STOCKS, to_payload(&normalized(input))?).await?;
        let row: StockRow = decode_one(STOCKS, rows)?;
        Ok(row.into())
    }

    pub async fn update_stock(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        input: &StockInput,
    ) -> Result<Stock, CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows = backend
            .update(STOCKS, &query, update_payload(input)?)
            .await?;
        let row: StockRow = decode_existing(STOCKS, rows, &format!("stock {id}"))?;
        Ok(row.into())
    }

    /// Delete a stock together with its segments and investment points.
    pub async fn delete_stock(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        let by_stock = Query::new().eq("stock_id", id.to_string());
        backend.delete(SEGMENTS, &by_stock).await?;
        backend.delete(INVESTMENT_POINTS, &by_stock).await?;
        backend
            .delete(STOCKS, &Query::new().eq("id", id.to_string()))
            .await
    }

    /// Show or hide a stock in the client viewer.
    pub async fn set_stock_active(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        active: bool,
    ) -> Result<(), CoreError> {
        backend
            .rpc(
                "toggle_stock_active",
                json!({ "stock_id": id.to_string(), "active": active }),
            )
            .await?;
        Ok(())
    }

    /// Upsert many stocks at once, keyed by ticker. Returns the count reported
    /// by the backend (or the number sent when it reports nothing).
    pub async fn bulk_update(
        &self,
        backend: &dyn Backend,
        inputs: &[StockInput],
    ) -> Result<usize, CoreError> {
        if inputs.is_empty() {
            return Ok(0);
        }
        for (i, input) in inputs.iter().enumerate() {
            if input.ticker.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(CoreError::ValidationError(format!(
                    "row {} has no ticker",
                    i + 1
                )));
            }
        }

        let rows: Vec<StockInput> = inputs.iter().map(normalized).collect();
        let response = backend
            .rpc("bulk_update_stocks", json!({ "rows": to_payload(&rows)? }))
            .await?;
        Ok(affected_count(&response).unwrap_or(rows.len()))
    }

    /// Replace every segment of a stock with `segments` (order taken from the slice).
    pub async fn replace_segments(
        &self,
        backend: &dyn Backend,
        stock_id: Uuid,
        segments: &[BusinessSegment],
    ) -> Result<Vec<BusinessSegment>, CoreError> {
        let payload: Vec<Value> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                json!({
                    "stock_id": stock_id.to_string(),
                    "name": s.name,
                    "revenue_share": s.revenue_share,
                    "description": s.description,
                    "sort_order": i as i32,
                })
            })
            .collect();
        self.replace_children(backend, SEGMENTS, stock_id, payload).await
    }

    /// Replace every investment point of a stock.
    pub async fn replace_investment_points(
        &self,
        backend: &dyn Backend,
        stock_id: Uuid,
        points: &[InvestmentPoint],
    ) -> Result<Vec<InvestmentPoint>, CoreError> {
        let payload: Vec<Value> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                json!({
                    "stock_id": stock_id.to_string(),
                    "title": p.title,
                    "content": p.content,
                    "icon": p.icon,
                    "sort_order": i as i32,
                })
            })
            .collect();
        self.replace_children(backend, INVESTMENT_POINTS, stock_id, payload)
            .await
    }

    async fn replace_children<T: serde::de::DeserializeOwned>(
        &self,
        backend: &dyn Backend,
        table: &str,
        stock_id: Uuid,
        payload: Vec<Value>,
    ) -> Result<Vec<T>, CoreError> {
        backend
            .delete(table, &Query::new().eq("stock_id", stock_id.to_string()))
            .await?;
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let rows = backend.insert(table, Value::Array(payload)).await?;
        decode_rows(table, rows)
    }

    fn validate_new(input: &StockInput) -> Result<(), CoreError> {
        if input.ticker.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(CoreError::ValidationError("ticker is required".into()));
        }
        if input.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(CoreError::ValidationError("name is required".into()));
        }
        Ok(())
    }
}

impl Default for StockService {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim text fields, uppercase tickers, and drop blank keywords.
fn normalized(input: &StockInput) -> StockInput {
    let trim = |s: &Option<String>| {
        s.as_ref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let ticker = trim(&input.ticker).map(|t| t.to_uppercase());
    let tickers = input.tickers.as_ref().map(|list| {
        list.iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
    });
    let keywords = input.keywords.as_ref().map(|list| {
        list.iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
    });

    StockInput {
        ticker,
        tickers,
        name: trim(&input.name),
        name_en: trim(&input.name_en),
        sector: trim(&input.sector),
        description: trim(&input.description),
        logo_url: trim(&input.logo_url),
        keywords,
        ..input.clone()
    }
}

/// Optional text columns an update clears when given a blank value.
const CLEARABLE_TEXT: [&str; 4] = ["name_en", "sector", "description", "logo_url"];

/// Update payload: like the insert payload, but a blank clearable field is
/// sent as an explicit `null` instead of being left out.
fn update_payload(input: &StockInput) -> Result<Value, CoreError> {
    let mut payload = to_payload(&normalized(input))?;
    let supplied = [
        &input.name_en,
        &input.sector,
        &input.description,
        &input.logo_url,
    ];
    if let Value::Object(map) = &mut payload {
        for (column, value) in CLEARABLE_TEXT.into_iter().zip(supplied) {
            if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                map.insert(column.to_string(), Value::Null);
            }
        }
    }
    Ok(payload)
}

/// Count in an RPC response: a number, `{ "count": n }`, or an array of rows.
fn affected_count(response: &Value) -> Option<usize> {
    match response {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Object(map) => map.get("count").and_then(Value::as_u64).map(|n| n as usize),
        Value::Array(rows) => Some(rows.len()),
        _ => None,
    }
}
