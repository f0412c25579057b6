use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_existing, decode_one, decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::portfolio::{
    Portfolio, PortfolioEntry, PortfolioInput, PortfolioRow, PortfolioStock, PortfolioView,
};
use crate::models::stock::Stock;
use crate::services::stock_service::StockService;

pub const PORTFOLIOS: &str = "portfolios";
pub const PORTFOLIO_STOCKS: &str = "portfolio_stocks";

/// Portfolios and their stock membership.
pub struct PortfolioService {
    stock_service: StockService,
}

impl PortfolioService {
    pub fn new() -> Self {
        Self {
            stock_service: StockService::new(),
        }
    }

    /// Portfolios with their stocks resolved, ordered by `sort_order` then name.
    ///
    /// Link rows pointing at missing (or, with `active_only`, hidden) stocks
    /// are dropped from the view.
    pub async fn list_portfolios(
        &self,
        backend: &dyn Backend,
        active_only: bool,
    ) -> Result<Vec<PortfolioView>, CoreError> {
        let mut query = Query::new().order("sort_order", true).order("name", true);
        if active_only {
            query = query.eq("is_active", true);
        }
        let rows: Vec<PortfolioRow> =
            decode_rows(PORTFOLIOS, backend.select(PORTFOLIOS, &query).await?)?;
        let portfolios: Vec<Portfolio> = rows.into_iter().map(Portfolio::from).collect();
        if portfolios.is_empty() {
            return Ok(Vec::new());
        }

        let link_query = Query::new()
            .in_list("portfolio_id", portfolios.iter().map(|p| p.id.to_string()))
            .order("sort_order", true);
        let links: Vec<PortfolioStock> =
            decode_rows(PORTFOLIO_STOCKS, backend.select(PORTFOLIO_STOCKS, &link_query).await?)?;

        let mut stock_ids: Vec<Uuid> = links.iter().map(|l| l.stock_id).collect();
        stock_ids.sort();
        stock_ids.dedup();
        let stocks: HashMap<Uuid, Stock> = self
            .stock_service
            .stocks_by_ids(backend, &stock_ids)
            .await?
            .into_iter()
            .filter(|s| !active_only || s.is_active)
            .map(|s| (s.id, s))
            .collect();

        Ok(assemble(portfolios, links, &stocks))
    }

    pub async fn create_portfolio(
        &self,
        backend: &dyn Backend,
        input: &PortfolioInput,
    ) -> Result<Portfolio, CoreError> {
        if input.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(CoreError::ValidationError("portfolio name is required".into()));
        }
        let rows = backend.insert(PORTFOLIOS, to_payload(input)?).await?;
        let row: PortfolioRow = decode_one(PORTFOLIOS, rows)?;
        Ok(row.into())
    }

    pub async fn update_portfolio(
        &self,
        backend: &dyn Backend,
        id: Uuid,
        input: &PortfolioInput,
    ) -> Result<Portfolio, CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows = backend.update(PORTFOLIOS, &query, to_payload(input)?).await?;
        let row: PortfolioRow =
            decode_existing(PORTFOLIOS, rows, &format!("portfolio {id}"))?;
        Ok(row.into())
    }

    /// Delete a portfolio and its link rows.
    pub async fn delete_portfolio(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        backend
            .delete(PORTFOLIO_STOCKS, &Query::new().eq("portfolio_id", id.to_string()))
            .await?;
        backend
            .delete(PORTFOLIOS, &Query::new().eq("id", id.to_string()))
            .await
    }

    /// Replace the membership of a portfolio. `entries` is `(stock_id, weight)`
    /// in display order; a stock listed twice keeps its first position.
    pub async fn set_portfolio_stocks(
        &self,
        backend: &dyn Backend,
        portfolio_id: Uuid,
        entries: &[(Uuid, Option<f64>)],
    ) -> Result<Vec<PortfolioStock>, CoreError> {
        for (stock_id, weight) in entries {
            if let Some(w) = weight {
                if !w.is_finite() || *w < 0.0 {
                    return Err(CoreError::ValidationError(format!(
                        "weight for stock {stock_id} must be a non-negative number"
                    )));
                }
            }
        }

        backend
            .delete(
                PORTFOLIO_STOCKS,
                &Query::new().eq("portfolio_id", portfolio_id.to_string()),
            )
            .await?;

        let mut seen = std::collections::HashSet::new();
        let payload: Vec<Value> = entries
            .iter()
            .filter(|(stock_id, _)| seen.insert(*stock_id))
            .enumerate()
            .map(|(i, (stock_id, weight))| {
                json!({
                    "portfolio_id": portfolio_id.to_string(),
                    "stock_id": stock_id.to_string(),
                    "weight": weight,
                    "sort_order": i as i32,
                })
            })
            .collect();
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        let rows = backend.insert(PORTFOLIO_STOCKS, Value::Array(payload)).await?;
        decode_rows(PORTFOLIO_STOCKS, rows)
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}

/// Group link rows under their portfolio, keeping link order.
fn assemble(
    portfolios: Vec<Portfolio>,
    links: Vec<PortfolioStock>,
    stocks: &HashMap<Uuid, Stock>,
) -> Vec<PortfolioView> {
    let mut by_portfolio: HashMap<Uuid, Vec<PortfolioStock>> = HashMap::new();
    for link in links {
        by_portfolio.entry(link.portfolio_id).or_default().push(link);
    }

    portfolios
        .into_iter()
        .map(|portfolio| {
            let mut links = by_portfolio.remove(&portfolio.id).unwrap_or_default();
            links.sort_by_key(|l| l.sort_order);
            let entries = links
                .into_iter()
                .filter_map(|link| {
                    stocks.get(&link.stock_id).map(|stock| PortfolioEntry {
                        stock: stock.clone(),
                        weight: link.weight,
                    })
                })
                .collect();
            PortfolioView { portfolio, entries }
        })
        .collect()
}
