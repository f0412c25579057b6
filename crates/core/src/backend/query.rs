use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;

/// A single column filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row selection for the table API.
///
/// The same query renders to REST parameters (`to_params`) and evaluates
/// against rows held in memory (`matches`, `apply`), so both backends agree
/// on what a filter means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned columns (REST `select=` syntax, e.g. `"id,name"`).
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.into(), value.into()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(column.into(), value.into()));
        self
    }

    pub fn in_list<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as REST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        params.push((
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        ));

        for filter in &self.filters {
            let (column, rendered) = match filter {
                Filter::Eq(c, v) => (c, format!("eq.{}", render(v))),
                Filter::Neq(c, v) => (c, format!("neq.{}", render(v))),
                Filter::Gte(c, v) => (c, format!("gte.{}", render(v))),
                Filter::Lte(c, v) => (c, format!("lte.{}", render(v))),
                Filter::Lt(c, v) => (c, format!("lt.{}", render(v))),
                Filter::In(c, vs) => {
                    let list: Vec<String> = vs.iter().map(render).collect();
                    (c, format!("in.({})", list.join(",")))
                }
            };
            params.push((column.clone(), rendered));
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" })
                })
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Only the filter parameters (for PATCH/DELETE, which take no select/order).
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.to_params()
            .into_iter()
            .filter(|(k, _)| k != "select" && k != "order" && k != "limit")
            .collect()
    }

    /// Does `row` pass every filter?
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(c, v) => field(row, c).is_some_and(|f| loosely_equal(f, v)),
            Filter::Neq(c, v) => !field(row, c).is_some_and(|f| loosely_equal(f, v)),
            Filter::Gte(c, v) => compare_field(row, c, v).is_some_and(|o| o != Ordering::Less),
            Filter::Lte(c, v) => compare_field(row, c, v).is_some_and(|o| o != Ordering::Greater),
            Filter::Lt(c, v) => compare_field(row, c, v) == Some(Ordering::Less),
            Filter::In(c, vs) => {
                field(row, c).is_some_and(|f| vs.iter().any(|v| loosely_equal(f, v)))
            }
        })
    }

    /// Filter, sort and truncate rows the way the table API would.
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.iter().filter(|r| self.matches(r)).cloned().collect();

        if !self.order.is_empty() {
            selected.sort_by(|a, b| {
                for key in &self.order {
                    let ord = compare_values(
                        a.get(&key.column).unwrap_or(&Value::Null),
                        b.get(&key.column).unwrap_or(&Value::Null),
                    );
                    let ord = if key.ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn field<'a>(row: &'a Value, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|v| !v.is_null())
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b || render(a) == render(b),
    }
}

fn compare_field(row: &Value, column: &str, value: &Value) -> Option<Ordering> {
    let f = field(row, column)?;
    match (f, value) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(compare_text(x, y)),
        _ => None,
    }
}

/// Strings that are both RFC 3339 timestamps compare as instants, so
/// fractional seconds and non-UTC offsets order the way the database orders them.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Total order used for sorting: nulls last, numbers, then strings, then the rest.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => compare_text(x, y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => render(a).cmp(&render(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_filters_in_rest_syntax() {
        let q = Query::new()
            .eq("is_active", true)
            .in_list("id", ["a", "b"])
            .order("name", true)
            .order("created_at", false)
            .limit(10);

        let params = q.to_params();
        assert_eq!(params[0], ("select".into(), "*".into()));
        assert!(params.contains(&("is_active".into(), "eq.true".into())));
        assert!(params.contains(&("id".into(), "in.(a,b)".into())));
        assert!(params.contains(&("order".into(), "name.asc,created_at.desc".into())));
        assert!(params.contains(&("limit".into(), "10".into())));
    }

    #[test]
    fn filter_params_drop_select_order_limit() {
        let q = Query::new().eq("id", "x").order("name", true).limit(1);
        assert_eq!(q.filter_params(), vec![("id".to_string(), "eq.x".to_string())]);
    }

    #[test]
    fn apply_sorts_nulls_last_and_limits() {
        let rows = vec![
            json!({"name": "b", "n": 2}),
            json!({"name": null, "n": 3}),
            json!({"name": "a", "n": 1}),
        ];
        let out = Query::new().order("name", true).limit(2).apply(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["name"], "a");
        assert_eq!(out[1]["name"], "b");
    }

    #[test]
    fn range_filters_compare_iso_dates_as_strings() {
        let row = json!({"viewed_at": "2026-03-05T10:00:00Z"});
        assert!(Query::new().gte("viewed_at", "2026-03-05").matches(&row));
        assert!(!Query::new().lt("viewed_at", "2026-03-05").matches(&row));
    }

    #[test]
    fn range_filters_compare_timestamps_as_instants() {
        let fractional = json!({"viewed_at": "2026-03-01T15:00:00.500Z"});
        assert!(Query::new().gte("viewed_at", "2026-03-01T15:00:00Z").matches(&fractional));

        let offset = json!({"viewed_at": "2026-03-02T20:00:00+09:00"});
        assert!(Query::new().gte("viewed_at", "2026-03-01T15:00:00Z").matches(&offset));
        assert!(Query::new().lt("viewed_at", "2026-03-02T15:00:00Z").matches(&offset));
    }

    #[test]
    fn sorting_orders_mixed_offsets_by_instant() {
        let rows = vec![
            json!({"at": "2026-03-02T08:00:00+09:00"}),
            json!({"at": "2026-03-01T22:00:00Z"}),
        ];
        let out = Query::new().order("at", true).apply(&rows);
        assert_eq!(out[0]["at"], "2026-03-02T08:00:00+09:00");
    }
}
