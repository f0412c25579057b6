use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::analytics::{AnalyticsFilter, AnalyticsSummary, DailyViews, StockViews, ViewLog};

pub const VIEW_LOGS: &str = "view_logs";

/// Longest range the dashboard will bucket (one year).
const MAX_RANGE_DAYS: i64 = 366;

/// Days are bucketed on the Korean calendar (UTC+9).
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// View-log recording and the analytics dashboard aggregation.
///
/// Aggregation is pure: logs in, summary out. Fetching is a single ranged
/// select; there is no server-side grouping.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    /// Record that a page (optionally a stock page) was viewed.
    pub async fn record_view(
        &self,
        backend: &dyn Backend,
        page: &str,
        stock_id: Option<Uuid>,
        client_id: Option<Uuid>,
    ) -> Result<(), CoreError> {
        let log = ViewLog {
            id: None,
            stock_id,
            client_id,
            page: page.to_string(),
            viewed_at: Utc::now(),
        };
        let mut payload = to_payload(&log)?;
        if let Some(map) = payload.as_object_mut() {
            map.remove("id");
        }
        backend.insert(VIEW_LOGS, payload).await?;
        Ok(())
    }

    /// Raw logs whose timestamp falls on a KST day inside the filter's range.
    pub async fn fetch_view_logs(
        &self,
        backend: &dyn Backend,
        filter: &AnalyticsFilter,
    ) -> Result<Vec<ViewLog>, CoreError> {
        validate_range(filter.from, filter.to)?;
        let (start, end) = utc_bounds(filter.from, filter.to);

        let mut query = Query::new()
            .gte("viewed_at", start.to_rfc3339_opts(SecondsFormat::Secs, true))
            .lt("viewed_at", end.to_rfc3339_opts(SecondsFormat::Secs, true))
            .order("viewed_at", true);
        if let Some(client_id) = filter.client_id {
            query = query.eq("client_id", client_id.to_string());
        }
        if let Some(page) = &filter.page {
            query = query.eq("page", page.clone());
        }

        decode_rows(VIEW_LOGS, backend.select(VIEW_LOGS, &query).await?)
    }

    /// Fetch and summarize in one go.
    pub async fn dashboard(
        &self,
        backend: &dyn Backend,
        filter: &AnalyticsFilter,
        stock_names: &HashMap<Uuid, String>,
    ) -> Result<AnalyticsSummary, CoreError> {
        let logs = self.fetch_view_logs(backend, filter).await?;
        self.summarize(&logs, filter, stock_names)
    }

    /// Bucket `logs` into a summary.
    ///
    /// Logs outside the range, or not matching the filter's client/page, are
    /// ignored. Every day of the range gets a bucket, zero when empty.
    pub fn summarize(
        &self,
        logs: &[ViewLog],
        filter: &AnalyticsFilter,
        stock_names: &HashMap<Uuid, String>,
    ) -> Result<AnalyticsSummary, CoreError> {
        validate_range(filter.from, filter.to)?;

        let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
        let mut per_stock: HashMap<Uuid, usize> = HashMap::new();
        let mut clients: HashSet<Uuid> = HashSet::new();
        let mut total_views = 0;

        for log in logs {
            let day = kst_date(log.viewed_at);
            if day < filter.from || day > filter.to {
                continue;
            }
            if filter.client_id.is_some() && log.client_id != filter.client_id {
                continue;
            }
            if let Some(page) = &filter.page {
                if &log.page != page {
                    continue;
                }
            }

            total_views += 1;
            *per_day.entry(day).or_insert(0) += 1;
            if let Some(stock_id) = log.stock_id {
                *per_stock.entry(stock_id).or_insert(0) += 1;
            }
            if let Some(client_id) = log.client_id {
                clients.insert(client_id);
            }
        }

        let mut daily = Vec::new();
        let mut day = filter.from;
        while day <= filter.to {
            daily.push(DailyViews {
                date: day,
                views: per_day.get(&day).copied().unwrap_or(0),
            });
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        let mut top_stocks: Vec<StockViews> = per_stock
            .into_iter()
            .map(|(stock_id, views)| StockViews {
                stock_id,
                name: stock_names
                    .get(&stock_id)
                    .cloned()
                    .unwrap_or_else(|| stock_id.to_string()),
                views,
            })
            .collect();
        // Largest first; ties alphabetical so the order is stable.
        top_stocks.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.name.cmp(&b.name)));

        Ok(AnalyticsSummary {
            from: filter.from,
            to: filter.to,
            total_views,
            unique_clients: clients.len(),
            daily,
            top_stocks,
        })
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar day of `ts` in Korea.
pub fn kst_date(ts: DateTime<Utc>) -> NaiveDate {
    (ts + Duration::seconds(i64::from(KST_OFFSET_SECS))).date_naive()
}

/// `[start of from, start of day after to)` in UTC.
fn utc_bounds(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = Duration::seconds(i64::from(KST_OFFSET_SECS));
    let start = from.and_time(NaiveTime::MIN).and_utc() - offset;
    let end = to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - offset;
    (start, end)
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), CoreError> {
    if from > to {
        return Err(CoreError::ValidationError(format!(
            "'from' date ({from}) must not be after 'to' date ({to})"
        )));
    }
    let days = (to - from).num_days();
    if days > MAX_RANGE_DAYS {
        return Err(CoreError::ValidationError(format!(
            "Range of {days} days exceeds maximum of {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kst_date_rolls_over_at_15_utc() {
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 14, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        assert_eq!(kst_date(before), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(kst_date(after), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn utc_bounds_cover_whole_kst_days() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let (start, end) = utc_bounds(day, day);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap());
    }
}
