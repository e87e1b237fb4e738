//! Line charts over time, bucketed and zero-filled for the dashboard.

use std::fmt::Write;
use std::str::FromStr;

use campaign_core::{CampaignError, CampaignResult};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{ChartFilter, TimeDataQuery, TimeDataSource};

/// Upper bound on buckets per chart; a minute-unit chart over years is a caller bug.
pub const MAX_BUCKETS: usize = 10_000;

/// Bucket width of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Label format used when the caller does not supply one.
    pub fn default_format(&self) -> &'static str {
        match self {
            TimeUnit::Minute => "%H:%M",
            TimeUnit::Hour => "%b %-d %-I%P",
            TimeUnit::Day => "%b %-d, %y",
            TimeUnit::Week => "Week %V",
            TimeUnit::Month => "%b %Y",
            TimeUnit::Year => "%Y",
        }
    }

    /// Start of the bucket containing `at`. Weeks start on Monday.
    pub fn truncate(&self, at: NaiveDateTime) -> NaiveDateTime {
        let date = at.date();
        match self {
            TimeUnit::Minute => date.and_time(
                NaiveTime::from_hms_opt(at.hour(), at.minute(), 0).unwrap_or(NaiveTime::MIN),
            ),
            TimeUnit::Hour => {
                date.and_time(NaiveTime::from_hms_opt(at.hour(), 0, 0).unwrap_or(NaiveTime::MIN))
            }
            TimeUnit::Day => date.and_time(NaiveTime::MIN),
            TimeUnit::Week => {
                let back = i64::from(date.weekday().num_days_from_monday());
                (date - Duration::days(back)).and_time(NaiveTime::MIN)
            }
            TimeUnit::Month => date
                .with_day(1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
            TimeUnit::Year => date
                .with_ordinal(1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
        }
    }

    /// Start of the bucket after the one starting at `start`.
    pub fn next(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeUnit::Minute => start.checked_add_signed(Duration::minutes(1)),
            TimeUnit::Hour => start.checked_add_signed(Duration::hours(1)),
            TimeUnit::Day => start.checked_add_signed(Duration::days(1)),
            TimeUnit::Week => start.checked_add_signed(Duration::weeks(1)),
            TimeUnit::Month => start.checked_add_months(Months::new(1)),
            TimeUnit::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = CampaignError;

    /// Accepts the short date-format letters (`i`, `H`, `d`, `W`, `m`, `Y`)
    /// as well as the unit names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i" | "minute" => Ok(TimeUnit::Minute),
            "H" | "hour" => Ok(TimeUnit::Hour),
            "d" | "D" | "day" => Ok(TimeUnit::Day),
            "W" | "week" => Ok(TimeUnit::Week),
            "m" | "M" | "month" => Ok(TimeUnit::Month),
            "Y" | "y" | "year" => Ok(TimeUnit::Year),
            other => Err(CampaignError::InvalidArgument(format!(
                "unknown time unit '{other}'"
            ))),
        }
    }
}

/// One named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<u64>,
}

/// Chart-ready output: one label per bucket, one value per bucket per dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartData {
    pub fn dataset(&self, label: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.label == label)
    }
}

/// Rejects strftime patterns chrono cannot render, such as `%Q`.
pub fn validate_date_format(format: &str) -> CampaignResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(CampaignError::InvalidArgument(format!(
            "invalid date format '{format}'"
        )));
    }
    Ok(())
}

fn bucket_starts(
    unit: TimeUnit,
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
) -> CampaignResult<Vec<NaiveDateTime>> {
    if date_from > date_to {
        return Err(CampaignError::InvalidArgument(format!(
            "date range is inverted: {date_from} > {date_to}"
        )));
    }

    let end = date_to.naive_utc();
    let mut cursor = unit.truncate(date_from.naive_utc());
    let mut starts = Vec::new();
    while cursor <= end {
        if starts.len() == MAX_BUCKETS {
            return Err(CampaignError::Chart(format!(
                "range {date_from} .. {date_to} needs more than {MAX_BUCKETS} {unit:?} buckets"
            )));
        }
        starts.push(cursor);
        cursor = match unit.next(cursor) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(starts)
}

/// Builds and runs the time-data queries behind a [`LineChart`].
#[derive(Debug, Clone)]
pub struct ChartQuery {
    unit: TimeUnit,
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
    buckets: Vec<NaiveDateTime>,
}

impl ChartQuery {
    pub fn new(
        unit: TimeUnit,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> CampaignResult<Self> {
        Ok(Self {
            unit,
            date_from,
            date_to,
            buckets: bucket_starts(unit, date_from, date_to)?,
        })
    }

    /// Query counting rows of `table` by `date_column`, restricted to the
    /// chart's range and the given column criteria.
    pub fn prepare_time_data_query(
        &self,
        table: &str,
        date_column: &str,
        filters: &ChartFilter,
    ) -> TimeDataQuery {
        TimeDataQuery {
            table: table.to_string(),
            date_column: date_column.to_string(),
            date_from: self.date_from,
            date_to: self.date_to,
            filters: filters.clone(),
            group_by: Vec::new(),
            owner: None,
        }
    }

    /// Run `query` against `source` and count the returned rows per bucket.
    /// Buckets with no rows are zero.
    pub fn load_and_build_time_data(
        &self,
        source: &dyn TimeDataSource,
        query: &TimeDataQuery,
    ) -> CampaignResult<Vec<u64>> {
        let dates = source.load_time_data(query)?;
        let mut counts = vec![0u64; self.buckets.len()];

        for date in dates.iter().filter(|d| query.contains(d)) {
            let start = self.unit.truncate(date.naive_utc());
            if let Ok(idx) = self.buckets.binary_search(&start) {
                counts[idx] += 1;
            }
        }

        debug!(
            table = %query.table,
            rows = dates.len(),
            buckets = counts.len(),
            "built time data"
        );
        Ok(counts)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// A line chart over a fixed date range. Datasets are appended in order and
/// rendered with one label per bucket.
#[derive(Debug, Clone)]
pub struct LineChart {
    unit: TimeUnit,
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
    date_format: String,
    datasets: Vec<Dataset>,
}

impl LineChart {
    pub fn new(
        unit: TimeUnit,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        date_format: Option<&str>,
    ) -> Self {
        Self {
            unit,
            date_from,
            date_to,
            date_format: date_format
                .filter(|f| !f.is_empty())
                .unwrap_or(unit.default_format())
                .to_string(),
            datasets: Vec::new(),
        }
    }

    /// Fails on an inverted range, too many buckets or an unusable label
    /// format, before any data is loaded.
    pub fn chart_query(&self) -> CampaignResult<ChartQuery> {
        validate_date_format(&self.date_format)?;
        ChartQuery::new(self.unit, self.date_from, self.date_to)
    }

    pub fn set_dataset(&mut self, label: impl Into<String>, data: Vec<u64>) {
        self.datasets.push(Dataset {
            label: label.into(),
            data,
        });
    }

    pub fn render(&self) -> CampaignResult<ChartData> {
        validate_date_format(&self.date_format)?;
        let labels = bucket_starts(self.unit, self.date_from, self.date_to)?
            .into_iter()
            .map(|start| -> CampaignResult<String> {
                let mut label = String::new();
                write!(label, "{}", start.format(&self.date_format)).map_err(|_| {
                    CampaignError::InvalidArgument(format!(
                        "cannot render date format '{}'",
                        self.date_format
                    ))
                })?;
                Ok(label)
            })
            .collect::<CampaignResult<Vec<_>>>()?;

        Ok(ChartData {
            labels,
            datasets: self.datasets.clone(),
        })
    }
}
