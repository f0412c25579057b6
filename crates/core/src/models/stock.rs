use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::issue::Issue;

/// A covered stock as returned by the `stocks` table.
///
/// Every column is optional on the wire; defaults are applied when mapping
/// to [`Stock`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockRow {
    pub id: Uuid,
    pub ticker: Option<String>,
    pub tickers: Option<Vec<String>>,
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub return_rate: Option<f64>,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub psr: Option<f64>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub logo_url: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A covered stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: Uuid,
    /// Primary ticker (e.g. "005930").
    pub ticker: String,
    /// All listings of the company; never empty when `ticker` is set.
    pub tickers: Vec<String>,
    /// Korean display name.
    pub name: String,
    pub name_en: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    /// Return since coverage started, in percent.
    pub return_rate: Option<f64>,
    pub per: Option<f64>,
    pub pbr: Option<f64>,
    pub psr: Option<f64>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        let ticker = row.ticker.unwrap_or_default();
        let tickers = match row.tickers {
            Some(list) if !list.is_empty() => list,
            _ if !ticker.is_empty() => vec![ticker.clone()],
            _ => Vec::new(),
        };

        Self {
            id: row.id,
            ticker,
            tickers,
            name: row.name.unwrap_or_default(),
            name_en: row.name_en,
            sector: row.sector,
            market_cap: row.market_cap,
            return_rate: row.return_rate,
            per: row.per,
            pbr: row.pbr,
            psr: row.psr,
            description: row.description,
            keywords: row.keywords.unwrap_or_default(),
            logo_url: row.logo_url,
            is_active: row.is_active.unwrap_or(true),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Stock {
    /// Display label used in lists: "삼성전자 (005930)".
    pub fn label(&self) -> String {
        if self.ticker.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.ticker)
        }
    }
}

/// Insert/update payload for a stock. Unset fields are left untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// A line of business with its share of revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSegment {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub stock_id: Uuid,
    pub name: String,
    /// Share of revenue in percent.
    #[serde(default)]
    pub revenue_share: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// A bullet in the investment thesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPoint {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub stock_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Name of the icon shown next to the point.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Everything the stock detail page shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDetail {
    pub stock: Stock,
    pub segments: Vec<BusinessSegment>,
    pub investment_points: Vec<InvestmentPoint>,
    pub issues: Vec<Issue>,
}
