use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ClientSnapshot, StaffSnapshot, DEFAULT_WARN_RATIO};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    NoTarget,
    OnTrack,
    AtRisk,
    Behind,
}

impl KpiStatus {
    pub fn indicator(self) -> &'static str {
        match self {
            KpiStatus::NoTarget => "⚪",
            KpiStatus::OnTrack => "🟢",
            KpiStatus::AtRisk => "🟡",
            KpiStatus::Behind => "🔴",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KpiStatus::NoTarget => "no_target",
            KpiStatus::OnTrack => "on_track",
            KpiStatus::AtRisk => "at_risk",
            KpiStatus::Behind => "behind",
        }
    }
}

impl fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target of zero means none was set.
pub fn classify_status(actual: u32, target: u32, warn_ratio: f64) -> KpiStatus {
    if target == 0 {
        return KpiStatus::NoTarget;
    }

    let ratio = actual as f64 / target.max(1) as f64;
    if ratio >= 1.0 {
        KpiStatus::OnTrack
    } else if ratio >= warn_ratio {
        KpiStatus::AtRisk
    } else {
        KpiStatus::Behind
    }
}

/// Global warning thresholds; clients may override feedback and inactivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    pub warn_ratio: f64,
    pub feedback_warn_score: f64,
    pub inactivity_warn_days: i64,
    pub sales_warn_threshold: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warn_ratio: DEFAULT_WARN_RATIO,
            feedback_warn_score: 3.0,
            inactivity_warn_days: 3,
            sales_warn_threshold: 0.0,
        }
    }
}

pub fn feedback_below(average: Option<f64>, threshold: f64) -> bool {
    matches!(average, Some(value) if value < threshold)
}

/// Days since the last activity when they exceed `threshold`. `Some(None)`
/// means the client never had an activity.
pub fn inactive_days(
    last_activity_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: i64,
) -> Option<Option<i64>> {
    match last_activity_at {
        None => Some(None),
        Some(last) => {
            let days = (now - last).num_days();
            (days > threshold).then_some(Some(days))
        }
    }
}

pub fn sales_below(total: f64, threshold: f64) -> bool {
    threshold > 0.0 && total < threshold
}

#[derive(Debug, Clone, PartialEq)]
pub enum HealthWarning {
    LowFeedback { average: f64, threshold: f64 },
    Inactive { days: Option<i64>, threshold: i64 },
    LowSales { total: f64, threshold: f64 },
}

impl fmt::Display for HealthWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthWarning::LowFeedback { average, threshold } => {
                write!(f, "feedback {average:.2} below {threshold:.2}")
            }
            HealthWarning::Inactive {
                days: Some(days),
                threshold,
            } => write!(f, "no activity for {days} days (limit {threshold})"),
            HealthWarning::Inactive {
                days: None,
                threshold,
            } => write!(f, "no activity ever recorded (limit {threshold} days)"),
            HealthWarning::LowSales { total, threshold } => {
                write!(f, "weekly sales {total:.0} below {threshold:.0}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientHealth {
    pub status: KpiStatus,
    pub target: u32,
    pub warnings: Vec<HealthWarning>,
}

pub fn assess_client(
    snapshot: &ClientSnapshot,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> ClientHealth {
    let target = snapshot.target.as_ref();
    let target_per_week = target.map_or(0, |t| t.target_per_week);
    let warn_ratio = target.map_or(thresholds.warn_ratio, |t| t.warn_ratio);
    let feedback_threshold = target
        .and_then(|t| t.feedback_warn_score)
        .unwrap_or(thresholds.feedback_warn_score);
    let inactivity_threshold = target
        .and_then(|t| t.inactivity_warn_days)
        .unwrap_or(thresholds.inactivity_warn_days);

    let mut warnings = Vec::new();

    if let Some(average) = snapshot.feedback_avg {
        if feedback_below(Some(average), feedback_threshold) {
            warnings.push(HealthWarning::LowFeedback {
                average,
                threshold: feedback_threshold,
            });
        }
    }

    if let Some(days) = inactive_days(snapshot.last_activity_at, now, inactivity_threshold) {
        warnings.push(HealthWarning::Inactive {
            days,
            threshold: inactivity_threshold,
        });
    }

    if sales_below(snapshot.sales_total, thresholds.sales_warn_threshold) {
        warnings.push(HealthWarning::LowSales {
            total: snapshot.sales_total,
            threshold: thresholds.sales_warn_threshold,
        });
    }

    ClientHealth {
        status: classify_status(snapshot.activity_count, target_per_week, warn_ratio),
        target: target_per_week,
        warnings,
    }
}

/// Feedback and inactivity warnings for one staff member, judged against
/// the global thresholds. Sales are not judged per staff member.
pub fn assess_staff(
    snapshot: &StaffSnapshot,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> Vec<HealthWarning> {
    let mut warnings = Vec::new();

    if let Some(average) = snapshot.feedback_avg {
        if feedback_below(Some(average), thresholds.feedback_warn_score) {
            warnings.push(HealthWarning::LowFeedback {
                average,
                threshold: thresholds.feedback_warn_score,
            });
        }
    }

    if let Some(days) = inactive_days(snapshot.last_activity_at, now, thresholds.inactivity_warn_days) {
        warnings.push(HealthWarning::Inactive {
            days,
            threshold: thresholds.inactivity_warn_days,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientWeeklyTarget, StaffMember};
    use chrono::Duration;

    fn snapshot(activity_count: u32, target: Option<ClientWeeklyTarget>) -> ClientSnapshot {
        ClientSnapshot {
            client_id: 1,
            business_name: "Nour Bakery".to_string(),
            target,
            activity_count,
            sales_total: 0.0,
            feedback_avg: None,
            last_activity_at: Some(Utc::now() - Duration::days(1)),
        }
    }

    #[test]
    fn status_truth_table() {
        assert_eq!(classify_status(10, 0, 0.6), KpiStatus::NoTarget);
        assert_eq!(classify_status(10, 10, 0.6), KpiStatus::OnTrack);
        assert_eq!(classify_status(12, 10, 0.6), KpiStatus::OnTrack);
        assert_eq!(classify_status(7, 10, 0.6), KpiStatus::AtRisk);
        assert_eq!(classify_status(6, 10, 0.6), KpiStatus::AtRisk);
        assert_eq!(classify_status(5, 10, 0.6), KpiStatus::Behind);
        assert_eq!(classify_status(0, 0, 0.6), KpiStatus::NoTarget);
        assert_eq!(classify_status(0, 3, 0.6), KpiStatus::Behind);
    }

    #[test]
    fn warn_ratio_is_caller_supplied() {
        assert_eq!(classify_status(5, 10, 0.5), KpiStatus::AtRisk);
        assert_eq!(classify_status(7, 10, 0.8), KpiStatus::Behind);
    }

    #[test]
    fn indicators_match_status() {
        assert_eq!(KpiStatus::NoTarget.indicator(), "⚪");
        assert_eq!(KpiStatus::OnTrack.indicator(), "🟢");
        assert_eq!(KpiStatus::AtRisk.indicator(), "🟡");
        assert_eq!(KpiStatus::Behind.indicator(), "🔴");
    }

    #[test]
    fn threshold_predicates() {
        assert!(feedback_below(Some(2.5), 3.0));
        assert!(!feedback_below(Some(3.0), 3.0));
        assert!(!feedback_below(None, 3.0));

        let now = Utc::now();
        assert_eq!(inactive_days(None, now, 3), Some(None));
        assert_eq!(inactive_days(Some(now - Duration::days(3)), now, 3), None);
        assert_eq!(inactive_days(Some(now - Duration::days(5)), now, 3), Some(Some(5)));

        assert!(!sales_below(0.0, 0.0));
        assert!(sales_below(100.0, 500.0));
        assert!(!sales_below(500.0, 500.0));
    }

    #[test]
    fn healthy_client_has_no_warnings() {
        let mut target = ClientWeeklyTarget::new(1, 5);
        target.warn_ratio = 0.5;
        let mut client = snapshot(5, Some(target));
        client.feedback_avg = Some(4.6);

        let health = assess_client(&client, &HealthThresholds::default(), Utc::now());
        assert_eq!(health.status, KpiStatus::OnTrack);
        assert_eq!(health.target, 5);
        assert!(health.warnings.is_empty());
    }

    #[test]
    fn client_warn_ratio_drives_status() {
        let mut target = ClientWeeklyTarget::new(1, 10);
        target.warn_ratio = 0.4;
        let health = assess_client(&snapshot(5, Some(target)), &HealthThresholds::default(), Utc::now());
        assert_eq!(health.status, KpiStatus::AtRisk);

        let without_target = assess_client(&snapshot(5, None), &HealthThresholds::default(), Utc::now());
        assert_eq!(without_target.status, KpiStatus::NoTarget);
    }

    #[test]
    fn collects_every_warning() {
        let now = Utc::now();
        let mut client = snapshot(0, None);
        client.feedback_avg = Some(2.0);
        client.last_activity_at = None;
        client.sales_total = 120.0;
        let thresholds = HealthThresholds {
            sales_warn_threshold: 1000.0,
            ..HealthThresholds::default()
        };

        let health = assess_client(&client, &thresholds, now);
        assert_eq!(
            health.warnings,
            vec![
                HealthWarning::LowFeedback {
                    average: 2.0,
                    threshold: 3.0
                },
                HealthWarning::Inactive {
                    days: None,
                    threshold: 3
                },
                HealthWarning::LowSales {
                    total: 120.0,
                    threshold: 1000.0
                },
            ]
        );
    }

    #[test]
    fn client_overrides_replace_global_thresholds() {
        let now = Utc::now();
        let mut target = ClientWeeklyTarget::new(1, 2);
        target.feedback_warn_score = Some(4.5);
        target.inactivity_warn_days = Some(10);
        let mut client = snapshot(2, Some(target));
        client.feedback_avg = Some(4.0);
        client.last_activity_at = Some(now - Duration::days(6));

        let health = assess_client(&client, &HealthThresholds::default(), now);
        assert_eq!(
            health.warnings,
            vec![HealthWarning::LowFeedback {
                average: 4.0,
                threshold: 4.5
            }]
        );
    }

    fn staff_snapshot(feedback_avg: Option<f64>, last_activity_days_ago: Option<i64>) -> StaffSnapshot {
        StaffSnapshot {
            staff: StaffMember {
                id: 7,
                name: "Sara Ahmadi".to_string(),
            },
            clients: vec!["Nour Bakery".to_string()],
            activity_count: 3,
            sales_total: 0.0,
            feedback_avg,
            last_activity_at: last_activity_days_ago.map(|days| Utc::now() - Duration::days(days)),
            recent_activities: Vec::new(),
        }
    }

    #[test]
    fn busy_staff_with_good_feedback_has_no_warnings() {
        let warnings = assess_staff(&staff_snapshot(Some(4.5), Some(1)), &HealthThresholds::default(), Utc::now());
        assert!(warnings.is_empty());
    }

    #[test]
    fn staff_warnings_cover_feedback_and_inactivity() {
        let quiet = staff_snapshot(Some(2.5), Some(9));
        let now = Utc::now();
        let warnings = assess_staff(&quiet, &HealthThresholds::default(), now);
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], HealthWarning::LowFeedback { average, .. } if average == 2.5));
        assert!(matches!(warnings[1], HealthWarning::Inactive { days: Some(9), threshold: 3 }));

        let idle = assess_staff(&staff_snapshot(None, None), &HealthThresholds::default(), now);
        assert_eq!(idle, vec![HealthWarning::Inactive { days: None, threshold: 3 }]);
    }
}
