use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};

use crate::catalog::MetricCatalog;
use crate::models::DEFAULT_WARN_RATIO;
use crate::period::validate_week_start;
use crate::status::HealthThresholds;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub week_start: u8,
    pub thresholds: HealthThresholds,
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    /// Reads the process environment after loading `.env`, if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let week_start = validate_week_start(parse_or(&lookup, "KPI_WEEK_START", 0u8)?)?;

        let warn_ratio = parse_or(&lookup, "KPI_WARN_RATIO", DEFAULT_WARN_RATIO)?;
        if !(warn_ratio > 0.0 && warn_ratio < 1.0) {
            bail!("KPI_WARN_RATIO must be between 0 and 1, got {warn_ratio}");
        }

        let thresholds = HealthThresholds {
            warn_ratio,
            feedback_warn_score: parse_or(&lookup, "KPI_FEEDBACK_WARN_SCORE", 3.0)?,
            inactivity_warn_days: parse_or(&lookup, "KPI_INACTIVITY_WARN_DAYS", 3)?,
            sales_warn_threshold: parse_or(&lookup, "KPI_SALES_WARN_THRESHOLD", 0.0)?,
        };

        let catalog_path = catalog_path(&lookup);

        Ok(Self {
            database_url,
            week_start,
            thresholds,
            catalog_path,
        })
    }

    pub fn load_catalog(&self) -> anyhow::Result<MetricCatalog> {
        load_catalog_at(self.catalog_path.as_deref())
    }

    /// Loads the metric catalog from `KPI_CATALOG_PATH` alone, for commands
    /// that run without a database.
    pub fn catalog_from_env() -> anyhow::Result<MetricCatalog> {
        dotenvy::dotenv().ok();
        Self::catalog_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn catalog_from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<MetricCatalog> {
        load_catalog_at(catalog_path(&lookup).as_deref())
    }
}

fn catalog_path(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    lookup("KPI_CATALOG_PATH")
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn load_catalog_at(path: Option<&Path>) -> anyhow::Result<MetricCatalog> {
    match path {
        Some(path) => MetricCatalog::from_csv(path)
            .with_context(|| format!("failed to load metric catalog from {}", path.display())),
        None => Ok(MetricCatalog::builtin()),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("{key} has invalid value {raw:?}: {err}")),
        _ => Ok(default),
    }
}
