use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page view, as stored in the `view_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewLog {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub stock_id: Option<Uuid>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    /// Page identifier, e.g. "stock_detail", "news", "resources".
    #[serde(default)]
    pub page: String,
    pub viewed_at: DateTime<Utc>,
}

/// Which view logs a summary covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsFilter {
    /// First day of the range (inclusive, KST).
    pub from: NaiveDate,
    /// Last day of the range (inclusive, KST).
    pub to: NaiveDate,
    pub client_id: Option<Uuid>,
    pub page: Option<String>,
}

impl AnalyticsFilter {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            client_id: None,
            page: None,
        }
    }
}

/// Views counted for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub views: usize,
}

/// Views counted for one stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockViews {
    pub stock_id: Uuid,
    /// Stock name, or the id when the name is unknown.
    pub name: String,
    pub views: usize,
}

/// Aggregated view statistics for the analytics dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,

    /// Total number of views in the range
    pub total_views: usize,

    /// Distinct clients that produced at least one view
    pub unique_clients: usize,

    /// One bucket per day from `from` to `to`, zero-filled
    pub daily: Vec<DailyViews>,

    /// Stocks sorted by views (largest first)
    pub top_stocks: Vec<StockViews>,
}
