use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregator::KpiReport;
use crate::catalog::{scope_label, MetricCatalog};
use crate::models::{ActivityEntry, ClientDetail, ClientSnapshot, StaffSnapshot};
use crate::status::{assess_client, assess_staff, ClientHealth, HealthThresholds};

pub const NO_DATA: &str = "No data recorded for this period.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn render_kpi_report(report: &KpiReport, catalog: &MetricCatalog) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {} Marketing KPI Report", scope_label(report.scope));
    match report.client_id {
        Some(client_id) => {
            let _ = writeln!(output, "Client #{client_id}, {}", report.period);
        }
        None => {
            let _ = writeln!(output, "Organization-wide, {}", report.period);
        }
    }
    let _ = writeln!(output);

    if report.is_empty() {
        let _ = writeln!(output, "{NO_DATA}");
        return output;
    }

    for (label, _slug, value) in report.labelled(catalog) {
        let _ = writeln!(output, "- {label}: {value}");
    }

    output
}

pub fn render_weekly_summary(
    snapshots: &[ClientSnapshot],
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Weekly Client Summary");
    write_window(&mut output, now);

    if snapshots.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No clients registered.");
        return output;
    }

    let mut warnings = Vec::new();

    for snapshot in snapshots {
        let health = assess_client(snapshot, thresholds, now);
        write_client_block(&mut output, snapshot, &health);

        for warning in health.warnings {
            warnings.push(format!("{}: {}", snapshot.business_name, warning));
        }
    }

    write_warnings(&mut output, &warnings);
    output
}

/// Weekly figures of one client followed by its assigned staff member and
/// the latest activities, sales and feedback.
pub fn render_client_detail(
    detail: &ClientDetail,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> String {
    let snapshot = &detail.snapshot;
    let health = assess_client(snapshot, thresholds, now);

    let mut output = String::new();
    let _ = writeln!(output, "# Client Report");
    write_window(&mut output, now);
    write_client_block(&mut output, snapshot, &health);

    let staff = detail
        .assigned_staff
        .as_ref()
        .map_or_else(|| "-".to_string(), |staff| format!("{} (#{})", staff.name, staff.id));
    let _ = writeln!(output, "- Assigned staff: {staff}");

    let _ = writeln!(output);
    let _ = writeln!(output, "### Recent activities");
    if detail.recent_activities.is_empty() {
        let _ = writeln!(output, "No activities recorded.");
    }
    for activity in &detail.recent_activities {
        let _ = writeln!(output, "- {}", activity_line(activity));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Recent sales");
    if detail.recent_sales.is_empty() {
        let _ = writeln!(output, "No sales recorded.");
    }
    for sale in &detail.recent_sales {
        let _ = writeln!(
            output,
            "- {} amount {:.0}, source {}, note {}",
            sale.occurred_at.format(TIMESTAMP_FORMAT),
            sale.amount,
            sale.source.as_deref().unwrap_or("-"),
            sale.note.as_deref().unwrap_or("-"),
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Recent feedback");
    if detail.recent_feedback.is_empty() {
        let _ = writeln!(output, "No feedback recorded.");
    }
    for feedback in &detail.recent_feedback {
        let score = feedback.score.clamp(1, 5);
        let _ = writeln!(
            output,
            "- {} {} ({}/5) {}",
            feedback.created_at.format(TIMESTAMP_FORMAT),
            "⭐".repeat(score as usize),
            feedback.score,
            feedback.comment.as_deref().unwrap_or("-"),
        );
    }

    let warnings: Vec<String> = health.warnings.iter().map(ToString::to_string).collect();
    write_warnings(&mut output, &warnings);
    output
}

pub fn render_staff_summary(
    snapshots: &[StaffSnapshot],
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Weekly Staff Summary");
    write_window(&mut output, now);

    if snapshots.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No active staff registered.");
        return output;
    }

    let mut warnings = Vec::new();

    for snapshot in snapshots {
        let clients = if snapshot.clients.is_empty() {
            "-".to_string()
        } else {
            snapshot.clients.join(", ")
        };

        let _ = writeln!(output);
        let _ = writeln!(output, "## {} (#{})", snapshot.staff.name, snapshot.staff.id);
        let _ = writeln!(output, "- Activities (7d): {}", snapshot.activity_count);
        let _ = writeln!(output, "- Client sales (7d): {:.0}", snapshot.sales_total);
        let _ = writeln!(output, "- Clients: {clients}");
        let _ = writeln!(output, "- Client feedback: {}", feedback_text(snapshot.feedback_avg));
        let _ = writeln!(output, "- Last activity: {}", timestamp_text(snapshot.last_activity_at));

        if !snapshot.recent_activities.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Recent activities");
            for activity in &snapshot.recent_activities {
                let _ = writeln!(output, "- {} (#{})", activity_line(activity), activity.client_id);
            }
        }

        for warning in assess_staff(snapshot, thresholds, now) {
            warnings.push(format!("{}: {}", snapshot.staff.name, warning));
        }
    }

    write_warnings(&mut output, &warnings);
    output
}

fn write_window(output: &mut String, now: DateTime<Utc>) {
    let _ = writeln!(output, "Last 7 days ending {}", now.format("%Y-%m-%d %H:%M UTC"));
}

fn write_client_block(output: &mut String, snapshot: &ClientSnapshot, health: &ClientHealth) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {} (#{})", snapshot.business_name, snapshot.client_id);
    let _ = writeln!(
        output,
        "- Status: {} {}",
        health.status.indicator(),
        health.status
    );
    let _ = writeln!(
        output,
        "- Activities (7d): {} / {}",
        snapshot.activity_count, health.target
    );
    let _ = writeln!(output, "- Sales (7d): {:.0}", snapshot.sales_total);
    let _ = writeln!(output, "- Feedback: {}", feedback_text(snapshot.feedback_avg));
    let _ = writeln!(
        output,
        "- Last activity: {}",
        snapshot
            .last_activity_at
            .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d").to_string())
    );
}

fn write_warnings(output: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Warnings");
    for warning in warnings {
        let _ = writeln!(output, "- {warning}");
    }
}

fn feedback_text(average: Option<f64>) -> String {
    average.map_or_else(|| "-".to_string(), |avg| format!("{avg:.2}"))
}

fn timestamp_text(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

fn activity_line(activity: &ActivityEntry) -> String {
    let extra: Vec<String> = [
        ("goal", &activity.goal),
        ("result", &activity.initial_result),
        ("evidence", &activity.evidence_link),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.as_deref().map(|value| format!("{name}: {value}")))
    .collect();

    format!(
        "{} {} on {}: {}",
        activity.occurred_at.format(TIMESTAMP_FORMAT),
        activity.activity_type,
        activity.platform.as_deref().unwrap_or("-"),
        if extra.is_empty() { "-".to_string() } else { extra.join(" | ") }
    )
}

#[derive(Debug, Serialize)]
struct WeeklyCsvRow<'a> {
    client_id: i64,
    business_name: &'a str,
    kpi_target: u32,
    activities_7d: u32,
    sales_7d: String,
    avg_feedback: String,
    last_activity_utc: String,
    status: &'static str,
}

pub fn write_weekly_csv<W: std::io::Write>(
    writer: W,
    snapshots: &[ClientSnapshot],
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for snapshot in snapshots {
        let health = assess_client(snapshot, thresholds, now);
        csv_writer.serialize(WeeklyCsvRow {
            client_id: snapshot.client_id,
            business_name: &snapshot.business_name,
            kpi_target: health.target,
            activities_7d: snapshot.activity_count,
            sales_7d: format!("{:.2}", snapshot.sales_total),
            avg_feedback: snapshot
                .feedback_avg
                .map(|avg| format!("{avg:.2}"))
                .unwrap_or_default(),
            last_activity_utc: snapshot
                .last_activity_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            status: health.status.as_str(),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
