//! Reporting helpers: time-bucketed line charts and the queries that feed them.

pub mod chart;
pub mod query;

pub use chart::{ChartData, ChartQuery, Dataset, LineChart, TimeUnit};
pub use query::{ChartFilter, FilterValue, OwnerFilter, QueryRow, TimeDataQuery, TimeDataSource};
