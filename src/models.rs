use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{KpiError, Result};
use crate::numeric::parse_numeric;
use crate::period::{PeriodBounds, Scope};

/// Row identifier of clients and staff in the bot's store.
pub type DbId = i64;

pub const DEFAULT_WARN_RATIO: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiRecord {
    pub id: Uuid,
    pub scope: Scope,
    pub metric_slug: String,
    pub value: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub client_id: Option<DbId>,
    pub recorded_by: Option<DbId>,
    pub recorded_at: DateTime<Utc>,
}

impl KpiRecord {
    pub fn key(&self) -> KpiKey {
        KpiKey {
            scope: self.scope,
            metric_slug: self.metric_slug.clone(),
            period: PeriodBounds {
                start: self.period_start,
                end: self.period_end,
            },
            client_id: self.client_id,
        }
    }
}

/// Natural key of a [`KpiRecord`]: at most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KpiKey {
    pub scope: Scope,
    pub metric_slug: String,
    pub period: PeriodBounds,
    pub client_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientWeeklyTarget {
    pub client_id: DbId,
    pub target_per_week: u32,
    pub warn_ratio: f64,
    pub feedback_warn_score: Option<f64>,
    pub inactivity_warn_days: Option<i64>,
}

impl ClientWeeklyTarget {
    pub fn new(client_id: DbId, target_per_week: u32) -> Self {
        Self {
            client_id,
            target_per_week,
            warn_ratio: DEFAULT_WARN_RATIO,
            feedback_warn_score: None,
            inactivity_warn_days: None,
        }
    }

    /// Builds a target from text typed by an admin. The target must be a
    /// whole, non-negative number of activities; the warn ratio, when given,
    /// must lie strictly between 0 and 1.
    pub fn parse(client_id: DbId, target_text: &str, warn_ratio_text: Option<&str>) -> Result<Self> {
        let target = parse_numeric(target_text)?;
        if target < 0.0 || target.fract() != 0.0 || target > u32::MAX as f64 {
            return Err(KpiError::InvalidArgument(format!(
                "target must be a whole number of activities, got {target_text:?}"
            )));
        }

        let mut weekly_target = Self::new(client_id, target as u32);
        if let Some(raw) = warn_ratio_text {
            let ratio = parse_numeric(raw)?;
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(KpiError::InvalidArgument(format!(
                    "warn ratio must be between 0 and 1, got {raw:?}"
                )));
            }
            weekly_target.warn_ratio = ratio;
        }

        Ok(weekly_target)
    }
}

/// Per-client aggregates over the rolling weekly window.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub client_id: DbId,
    pub business_name: String,
    pub target: Option<ClientWeeklyTarget>,
    pub activity_count: u32,
    pub sales_total: f64,
    pub feedback_avg: Option<f64>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffMember {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub client_id: DbId,
    pub activity_type: String,
    pub platform: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub goal: Option<String>,
    pub evidence_link: Option<String>,
    pub initial_result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleEntry {
    pub amount: f64,
    pub source: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One client's weekly snapshot plus its assigned staff and latest history.
#[derive(Debug, Clone)]
pub struct ClientDetail {
    pub snapshot: ClientSnapshot,
    pub assigned_staff: Option<StaffMember>,
    pub recent_activities: Vec<ActivityEntry>,
    pub recent_sales: Vec<SaleEntry>,
    pub recent_feedback: Vec<FeedbackEntry>,
}

/// Aggregates for one staff member over the rolling weekly window. Sales
/// and feedback cover the clients assigned to them.
#[derive(Debug, Clone)]
pub struct StaffSnapshot {
    pub staff: StaffMember,
    pub clients: Vec<String>,
    pub activity_count: u32,
    pub sales_total: f64,
    pub feedback_avg: Option<f64>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub recent_activities: Vec<ActivityEntry>,
}
