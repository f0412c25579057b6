use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stock::Stock;

/// Wire shape of the `portfolios` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A curated basket of covered stocks shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<PortfolioRow> for Portfolio {
    fn from(row: PortfolioRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            description: row.description,
            is_active: row.is_active.unwrap_or(true),
            sort_order: row.sort_order.unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

/// Link row of the `portfolio_stocks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub portfolio_id: Uuid,
    pub stock_id: Uuid,
    /// Target weight in percent.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Insert/update payload for a portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

/// A stock as it appears inside a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub stock: Stock,
    pub weight: Option<f64>,
}

/// A portfolio with its stocks resolved, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub portfolio: Portfolio,
    pub entries: Vec<PortfolioEntry>,
}

impl PortfolioView {
    /// Sum of the weights that are set.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.weight).sum()
    }
}
