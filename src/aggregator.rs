use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::MetricCatalog;
use crate::error::Result;
use crate::models::{DbId, KpiKey, KpiRecord};
use crate::numeric::parse_numeric;
use crate::period::{period_bounds, validate_week_start, PeriodBounds, Scope};
use crate::store::KpiStore;

/// One value as entered by staff, before parsing.
#[derive(Debug, Clone)]
pub struct KpiEntry<'a> {
    pub scope: Scope,
    pub metric_slug: &'a str,
    pub raw_value: &'a str,
    pub reference_date: NaiveDate,
    pub client_id: Option<DbId>,
    pub actor_id: Option<DbId>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: KpiRecord,
    pub period: PeriodBounds,
    pub value: f64,
}

/// Sparse metric values of one period. A missing metric was not measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub scope: Scope,
    pub period: PeriodBounds,
    pub client_id: Option<DbId>,
    pub values: BTreeMap<String, f64>,
}

impl KpiReport {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (label, slug, value) sorted by display label.
    pub fn labelled<'a>(&'a self, catalog: &'a MetricCatalog) -> Vec<(&'a str, &'a str, f64)> {
        let mut entries: Vec<(&str, &str, f64)> = self
            .values
            .iter()
            .map(|(slug, value)| (catalog.label_in(self.scope, slug), slug.as_str(), *value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));
        entries
    }
}

#[derive(Debug)]
pub struct KpiAggregator<S> {
    store: S,
    catalog: MetricCatalog,
    week_start: u8,
}

impl<S: KpiStore> KpiAggregator<S> {
    pub fn new(store: S, catalog: MetricCatalog) -> Self {
        Self {
            store,
            catalog,
            week_start: 0,
        }
    }

    /// Weekday opening weekly periods, 0 = Monday through 6 = Sunday.
    pub fn with_week_start(mut self, week_start: u8) -> Result<Self> {
        self.week_start = validate_week_start(week_start)?;
        Ok(self)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn week_start(&self) -> u8 {
        self.week_start
    }

    pub async fn upsert_value(&self, entry: KpiEntry<'_>) -> Result<UpsertOutcome> {
        let value = parse_numeric(entry.raw_value)?;
        let period = period_bounds(entry.scope, entry.reference_date, self.week_start)?;

        if !self.catalog.contains(entry.scope, entry.metric_slug) {
            tracing::warn!(
                scope = %entry.scope,
                metric = entry.metric_slug,
                "recording metric that is not in the catalog"
            );
        }

        let key = KpiKey {
            scope: entry.scope,
            metric_slug: entry.metric_slug.to_string(),
            period,
            client_id: entry.client_id,
        };
        let recorded_at = Utc::now();

        let record = match self.store.find_record(&key).await? {
            Some(mut existing) => {
                existing.value = value;
                existing.recorded_by = entry.actor_id;
                existing.recorded_at = recorded_at;
                self.store.update_record(existing).await?
            }
            None => {
                self.store
                    .create_record(KpiRecord {
                        id: Uuid::new_v4(),
                        scope: key.scope,
                        metric_slug: key.metric_slug,
                        value,
                        period_start: period.start,
                        period_end: period.end,
                        client_id: key.client_id,
                        recorded_by: entry.actor_id,
                        recorded_at,
                    })
                    .await?
            }
        };

        tracing::info!(
            scope = %record.scope,
            metric = %record.metric_slug,
            client_id = ?record.client_id,
            period = %period,
            value,
            "kpi value recorded"
        );

        Ok(UpsertOutcome {
            record,
            period,
            value,
        })
    }

    pub async fn build_report(
        &self,
        scope: Scope,
        reference_date: NaiveDate,
        client_id: Option<DbId>,
    ) -> Result<KpiReport> {
        let period = period_bounds(scope, reference_date, self.week_start)?;
        let records = self.store.list_records(scope, period, client_id).await?;
        tracing::debug!(%scope, %period, ?client_id, count = records.len(), "fetched kpi records");

        let values = records
            .into_iter()
            .map(|record| (record.metric_slug, record.value))
            .collect();

        Ok(KpiReport {
            scope,
            period,
            client_id,
            values,
        })
    }

    /// Upserts every row of a `scope,metric,value,date,client_id` CSV file.
    pub async fn import_csv(&self, csv_path: &Path, actor_id: Option<DbId>) -> anyhow::Result<usize> {
        #[derive(Deserialize)]
        struct CsvRow {
            scope: Scope,
            metric: String,
            value: String,
            date: NaiveDate,
            client_id: Option<DbId>,
        }

        let mut reader = csv::Reader::from_path(csv_path)
            .with_context(|| format!("failed to open {}", csv_path.display()))?;
        let mut imported = 0usize;

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let line = index + 2;
            let row = result.with_context(|| format!("malformed row on line {line}"))?;
            self.upsert_value(KpiEntry {
                scope: row.scope,
                metric_slug: &row.metric,
                raw_value: &row.value,
                reference_date: row.date,
                client_id: row.client_id,
                actor_id,
            })
            .await
            .with_context(|| format!("failed to import line {line}"))?;
            imported += 1;
        }

        Ok(imported)
    }
}
