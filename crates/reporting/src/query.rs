//! Time-data queries: what to count, where, and for whom.

use campaign_core::{CampaignError, CampaignResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A value a column must match. Lists match if any member matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Uuid(Uuid),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Compare against a column rendered as text. `None` is SQL NULL and
    /// never matches.
    pub fn matches(&self, column: Option<&str>) -> bool {
        let Some(column) = column else {
            return false;
        };
        match self {
            FilterValue::Integer(n) => column == n.to_string(),
            FilterValue::Uuid(id) => column == id.to_string(),
            FilterValue::Text(text) => column == text,
            FilterValue::List(values) => values.iter().any(|v| v.matches(Some(column))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

/// Column criteria keyed by column name.
pub type ChartFilter = BTreeMap<String, FilterValue>;

/// Restricts rows to those whose owning container was created by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerFilter {
    /// Logical name of the container table joined against.
    pub join_table: String,
    /// Column on the counted table holding the container id.
    pub join_column: String,
    /// `None` matches nothing.
    pub created_by: Option<Uuid>,
}

impl OwnerFilter {
    pub fn allows(&self, creator: Option<Uuid>) -> bool {
        matches!((self.created_by, creator), (Some(user), Some(owner)) if user == owner)
    }
}

/// A query over one table's rows within a date range. Built by
/// [`ChartQuery::prepare_time_data_query`](crate::chart::ChartQuery::prepare_time_data_query)
/// and refined by value, never mutated behind the caller's back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDataQuery {
    pub table: String,
    pub date_column: String,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub filters: ChartFilter,
    pub group_by: Vec<String>,
    pub owner: Option<OwnerFilter>,
}

impl TimeDataQuery {
    /// Collapse rows sharing the same values for `columns` into one.
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_owner(mut self, owner: OwnerFilter) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn contains(&self, date: &DateTime<Utc>) -> bool {
        *date >= self.date_from && *date <= self.date_to
    }
}

/// Row access used by stores to evaluate a [`TimeDataQuery`].
pub trait QueryRow {
    /// Column rendered as text, `None` for NULL. Unknown columns are an error.
    fn column(&self, name: &str) -> CampaignResult<Option<String>>;
}

/// Check a row against the query's column criteria.
pub fn row_matches<R: QueryRow>(row: &R, filters: &ChartFilter) -> CampaignResult<bool> {
    for (column, expected) in filters {
        if !expected.matches(row.column(column)?.as_deref()) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Key identifying a row's group, one entry per `group_by` column.
pub fn group_key<R: QueryRow>(row: &R, group_by: &[String]) -> CampaignResult<Vec<Option<String>>> {
    group_by.iter().map(|column| row.column(column)).collect()
}

/// Anything that can answer a [`TimeDataQuery`] with the date of each
/// matching (grouped) row.
pub trait TimeDataSource: Send + Sync {
    fn load_time_data(&self, query: &TimeDataQuery) -> CampaignResult<Vec<DateTime<Utc>>>;
}

/// Error for a column name a row type does not expose.
pub fn unknown_column(table: &str, column: &str) -> CampaignError {
    CampaignError::Store(format!("unknown column '{column}' on table '{table}'"))
}
