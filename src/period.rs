use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{KpiError, Result};

/// Aggregation granularity of a KPI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Weekly,
    Monthly,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Weekly => "weekly",
            Scope::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = KpiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Scope::Weekly),
            "monthly" => Ok(Scope::Monthly),
            other => Err(KpiError::InvalidArgument(format!("unknown scope {other:?}"))),
        }
    }
}

/// Inclusive date range of one reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for PeriodBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Rejects week starts outside 0 (Monday) ..= 6 (Sunday).
pub fn validate_week_start(week_start: u8) -> Result<u8> {
    if week_start > 6 {
        return Err(KpiError::InvalidArgument(format!(
            "week start must be 0 (Monday) through 6 (Sunday), got {week_start}"
        )));
    }
    Ok(week_start)
}

/// The seven-day window containing `reference` that opens on `week_start`.
pub fn week_bounds(reference: NaiveDate, week_start: u8) -> Result<PeriodBounds> {
    let week_start = validate_week_start(week_start)?;
    let weekday = reference.weekday().num_days_from_monday() as i64;
    let diff = (weekday - week_start as i64).rem_euclid(7);
    let start = reference - Duration::days(diff);

    Ok(PeriodBounds {
        start,
        end: start + Duration::days(6),
    })
}

/// First through last day of the calendar month containing `reference`.
pub fn month_bounds(reference: NaiveDate) -> PeriodBounds {
    let start = reference - Duration::days(reference.day0() as i64);
    // the last representable month has no successor; it ends on NaiveDate::MAX
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);

    PeriodBounds { start, end }
}

pub fn period_bounds(scope: Scope, reference: NaiveDate, week_start: u8) -> Result<PeriodBounds> {
    match scope {
        Scope::Weekly => week_bounds(reference, week_start),
        Scope::Monthly => Ok(month_bounds(reference)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn monday_start_week_contains_wednesday() {
        let bounds = week_bounds(date(2024, 6, 12), 0).unwrap();
        assert_eq!(bounds.start, date(2024, 6, 10));
        assert_eq!(bounds.end, date(2024, 6, 16));
    }

    #[test]
    fn saturday_start_week_shifts_window() {
        let bounds = week_bounds(date(2024, 6, 12), 5).unwrap();
        assert_eq!(bounds.start, date(2024, 6, 8));
        assert_eq!(bounds.end, date(2024, 6, 14));
    }

    #[test]
    fn reference_on_week_start_opens_the_window() {
        let bounds = week_bounds(date(2024, 6, 10), 0).unwrap();
        assert_eq!(bounds.start, date(2024, 6, 10));

        let sunday = week_bounds(date(2024, 6, 16), 6).unwrap();
        assert_eq!(sunday.start, date(2024, 6, 16));
        assert_eq!(sunday.end, date(2024, 6, 22));
    }

    #[test]
    fn week_is_seven_days_and_contains_reference_for_every_start() {
        let mut day = date(2023, 12, 20);
        for _ in 0..60 {
            for week_start in 0..=6u8 {
                let bounds = week_bounds(day, week_start).unwrap();
                assert_eq!((bounds.end - bounds.start).num_days(), 6);
                assert!(bounds.contains(day));
                assert_eq!(bounds.start.weekday().num_days_from_monday(), week_start as u32);
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn out_of_range_week_start_is_rejected() {
        assert_matches!(week_bounds(date(2024, 6, 12), 7), Err(KpiError::InvalidArgument(_)));
    }

    #[test]
    fn february_respects_leap_years() {
        assert_eq!(
            month_bounds(date(2024, 2, 15)),
            PeriodBounds {
                start: date(2024, 2, 1),
                end: date(2024, 2, 29)
            }
        );
        assert_eq!(
            month_bounds(date(2023, 2, 15)),
            PeriodBounds {
                start: date(2023, 2, 1),
                end: date(2023, 2, 28)
            }
        );
        assert_eq!(month_bounds(date(1900, 2, 3)).end, date(1900, 2, 28));
        assert_eq!(month_bounds(date(2000, 2, 3)).end, date(2000, 2, 29));
    }

    #[test]
    fn month_contains_reference_across_a_year() {
        let mut day = date(2023, 1, 1);
        while day.year() == 2023 {
            let bounds = month_bounds(day);
            assert!(bounds.contains(day));
            assert_eq!(bounds.start.day(), 1);
            assert_ne!(bounds.end.succ_opt().unwrap().month(), day.month());
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn december_ends_on_the_31st() {
        let bounds = month_bounds(date(2024, 12, 9));
        assert_eq!(bounds.end, date(2024, 12, 31));
    }

    #[test]
    fn last_representable_month_ends_at_max_date() {
        let bounds = month_bounds(NaiveDate::MAX);
        assert_eq!(bounds.end, NaiveDate::MAX);
        assert_eq!(bounds.start.day(), 1);
        assert!(bounds.contains(NaiveDate::MAX));
    }

    #[test]
    fn period_bounds_dispatches_by_scope() {
        let weekly = period_bounds(Scope::Weekly, date(2024, 6, 12), 0).unwrap();
        assert_eq!(weekly.start, date(2024, 6, 10));
        let monthly = period_bounds(Scope::Monthly, date(2024, 6, 12), 0).unwrap();
        assert_eq!(monthly.start, date(2024, 6, 1));
        assert_eq!(monthly.end, date(2024, 6, 30));
    }

    #[test]
    fn scope_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Scope>().unwrap(), Scope::Weekly);
        assert_eq!(" monthly ".parse::<Scope>().unwrap(), Scope::Monthly);
        assert_matches!("daily".parse::<Scope>(), Err(KpiError::InvalidArgument(_)));
    }
}
