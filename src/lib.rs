//! KPI aggregation and period reporting for a marketing agency's
//! operations bot.
//!
//! Values typed by staff are normalized by [`numeric`], bucketed into weekly
//! or monthly periods by [`period`], and upserted through a [`store::KpiStore`]
//! by the [`aggregator::KpiAggregator`]. Client activity health is classified
//! by [`status`] and rendered by [`report`].

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod numeric;
pub mod period;
pub mod report;
pub mod status;
pub mod store;

pub use aggregator::{KpiAggregator, KpiEntry, KpiReport, UpsertOutcome};
pub use catalog::{MetricCatalog, MetricDefinition};
pub use error::{KpiError, Result};
pub use numeric::{is_positive_number, parse_numeric};
pub use period::{month_bounds, period_bounds, week_bounds, PeriodBounds, Scope};
pub use status::{classify_status, KpiStatus};
pub use store::{KpiStore, MemoryStore};
