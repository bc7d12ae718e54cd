use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{KpiError, Result};
use crate::models::{
    ActivityEntry, ClientDetail, ClientSnapshot, ClientWeeklyTarget, DbId, FeedbackEntry,
    KpiKey, KpiRecord, SaleEntry, StaffMember, StaffSnapshot,
};
use crate::period::{PeriodBounds, Scope};
use crate::store::KpiStore;

const RECORD_COLUMNS: &str = "id, scope, metric_slug, value, period_start, period_end, \
                              client_id, recorded_by, recorded_at";

const ACTIVITY_COLUMNS: &str = "client_id, activity_type, platform, occurred_at, goal, \
                                evidence_link, initial_result";

/// History entries shown per detail report.
pub const RECENT_LIMIT: i64 = 10;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    tracing::debug!("connected to Postgres");
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}

/// Postgres-backed [`KpiStore`].
#[derive(Debug, Clone)]
pub struct PgKpiStore {
    pool: PgPool,
}

impl PgKpiStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<KpiRecord> {
    let scope: String = row.try_get("scope")?;
    Ok(KpiRecord {
        id: row.try_get("id")?,
        scope: scope.parse()?,
        metric_slug: row.try_get("metric_slug")?,
        value: row.try_get("value")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        client_id: row.try_get("client_id")?,
        recorded_by: row.try_get("recorded_by")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

#[async_trait]
impl KpiStore for PgKpiStore {
    async fn find_record(&self, key: &KpiKey) -> Result<Option<KpiRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM agency_kpi.kpi_records \
             WHERE scope = $1 AND metric_slug = $2 AND period_start = $3 AND period_end = $4 \
             AND client_id IS NOT DISTINCT FROM $5"
        );

        let row = sqlx::query(&query)
            .bind(key.scope.as_str())
            .bind(&key.metric_slug)
            .bind(key.period.start)
            .bind(key.period.end)
            .bind(key.client_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn create_record(&self, record: KpiRecord) -> Result<KpiRecord> {
        // a concurrent insert of the same key overwrites, matching update semantics
        let query = format!(
            r#"
            INSERT INTO agency_kpi.kpi_records
            (id, scope, metric_slug, value, period_start, period_end, client_id, recorded_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (scope, metric_slug, period_start, period_end, (COALESCE(client_id, -1)))
            DO UPDATE SET value = EXCLUDED.value,
                          recorded_by = EXCLUDED.recorded_by,
                          recorded_at = EXCLUDED.recorded_at
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(record.id)
            .bind(record.scope.as_str())
            .bind(&record.metric_slug)
            .bind(record.value)
            .bind(record.period_start)
            .bind(record.period_end)
            .bind(record.client_id)
            .bind(record.recorded_by)
            .bind(record.recorded_at)
            .fetch_one(&self.pool)
            .await?;

        record_from_row(&row)
    }

    async fn update_record(&self, record: KpiRecord) -> Result<KpiRecord> {
        let query = format!(
            "UPDATE agency_kpi.kpi_records \
             SET value = $2, recorded_by = $3, recorded_at = $4 \
             WHERE id = $1 RETURNING {RECORD_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(record.id)
            .bind(record.value)
            .bind(record.recorded_by)
            .bind(record.recorded_at)
            .fetch_one(&self.pool)
            .await?;

        record_from_row(&row)
    }

    async fn list_records(
        &self,
        scope: Scope,
        period: PeriodBounds,
        client_id: Option<DbId>,
    ) -> Result<Vec<KpiRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM agency_kpi.kpi_records \
             WHERE scope = $1 AND period_start = $2 AND period_end = $3 \
             AND client_id IS NOT DISTINCT FROM $4 \
             ORDER BY metric_slug"
        );

        let rows = sqlx::query(&query)
            .bind(scope.as_str())
            .bind(period.start)
            .bind(period.end)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }
}

/// Per-client activity, sales and feedback aggregates between `since` and
/// `until`; feedback average and last activity cover all time.
pub async fn fetch_client_snapshots(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    client_id: Option<DbId>,
) -> Result<Vec<ClientSnapshot>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.business_name,
               t.target_per_week, t.warn_ratio, t.feedback_warn_score, t.inactivity_warn_days,
               (SELECT COUNT(*) FROM agency_kpi.activities a
                 WHERE a.client_id = c.id AND a.occurred_at >= $1 AND a.occurred_at < $2)
                 AS activity_count,
               (SELECT COALESCE(SUM(s.amount), 0)::DOUBLE PRECISION FROM agency_kpi.sales s
                 WHERE s.client_id = c.id AND s.occurred_at >= $1 AND s.occurred_at < $2)
                 AS sales_total,
               (SELECT AVG(f.score)::DOUBLE PRECISION FROM agency_kpi.feedback f
                 WHERE f.client_id = c.id)
                 AS feedback_avg,
               (SELECT MAX(a.occurred_at) FROM agency_kpi.activities a
                 WHERE a.client_id = c.id)
                 AS last_activity_at
        FROM agency_kpi.clients c
        LEFT JOIN agency_kpi.client_targets t ON t.client_id = c.id
        WHERE $3::BIGINT IS NULL OR c.id = $3
        ORDER BY c.id
        "#,
    )
    .bind(since)
    .bind(until)
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let client_id: DbId = row.try_get("id")?;
        let target_per_week: Option<i32> = row.try_get("target_per_week")?;
        let target = match target_per_week {
            Some(target_per_week) => Some(ClientWeeklyTarget {
                client_id,
                target_per_week: target_per_week.max(0) as u32,
                warn_ratio: row.try_get("warn_ratio")?,
                feedback_warn_score: row.try_get("feedback_warn_score")?,
                inactivity_warn_days: row.try_get("inactivity_warn_days")?,
            }),
            None => None,
        };
        let activity_count: i64 = row.try_get("activity_count")?;

        snapshots.push(ClientSnapshot {
            client_id,
            business_name: row.try_get("business_name")?,
            target,
            activity_count: u32::try_from(activity_count).unwrap_or(u32::MAX),
            sales_total: row.try_get("sales_total")?,
            feedback_avg: row.try_get("feedback_avg")?,
            last_activity_at: row.try_get("last_activity_at")?,
        });
    }

    tracing::debug!(count = snapshots.len(), %since, %until, "fetched client snapshots");
    Ok(snapshots)
}

/// Snapshot of one client with its assigned staff member and the latest
/// activities, sales and feedback. `None` when the client does not exist.
pub async fn fetch_client_detail(
    pool: &PgPool,
    client_id: DbId,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Option<ClientDetail>> {
    let Some(snapshot) = fetch_client_snapshots(pool, since, until, Some(client_id))
        .await?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };

    let assigned_staff = sqlx::query(
        r#"
        SELECT st.id, st.name
        FROM agency_kpi.clients c
        JOIN agency_kpi.staff st ON st.id = c.assigned_staff_id
        WHERE c.id = $1
        "#,
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?
    .map(|row| staff_from_row(&row))
    .transpose()?;

    let recent_activities = recent_activities(pool, ActivityOwner::Client, client_id).await?;

    let recent_sales = sqlx::query(
        r#"
        SELECT amount, source, note, occurred_at
        FROM agency_kpi.sales
        WHERE client_id = $1
        ORDER BY occurred_at DESC
        LIMIT $2
        "#,
    )
    .bind(client_id)
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| -> Result<SaleEntry> {
        Ok(SaleEntry {
            amount: row.try_get("amount")?,
            source: row.try_get("source")?,
            note: row.try_get("note")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    })
    .collect::<Result<Vec<_>>>()?;

    let recent_feedback = sqlx::query(
        r#"
        SELECT score, comment, created_at
        FROM agency_kpi.feedback
        WHERE client_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(client_id)
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| -> Result<FeedbackEntry> {
        Ok(FeedbackEntry {
            score: row.try_get("score")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
        })
    })
    .collect::<Result<Vec<_>>>()?;

    Ok(Some(ClientDetail {
        snapshot,
        assigned_staff,
        recent_activities,
        recent_sales,
        recent_feedback,
    }))
}

/// Per-staff activity counts between `since` and `until`, with sales and
/// feedback of the clients assigned to each. Without `staff_id` only active
/// staff are listed.
pub async fn fetch_staff_snapshots(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    staff_id: Option<DbId>,
) -> Result<Vec<StaffSnapshot>> {
    let rows = sqlx::query(
        r#"
        SELECT st.id, st.name,
               ARRAY(SELECT c.business_name FROM agency_kpi.clients c
                      WHERE c.assigned_staff_id = st.id ORDER BY c.id)
                 AS client_names,
               (SELECT COUNT(*) FROM agency_kpi.activities a
                 WHERE a.staff_id = st.id AND a.occurred_at >= $1 AND a.occurred_at < $2)
                 AS activity_count,
               (SELECT COALESCE(SUM(s.amount), 0)::DOUBLE PRECISION FROM agency_kpi.sales s
                 JOIN agency_kpi.clients c ON c.id = s.client_id
                 WHERE c.assigned_staff_id = st.id AND s.occurred_at >= $1 AND s.occurred_at < $2)
                 AS sales_total,
               (SELECT AVG(f.score)::DOUBLE PRECISION FROM agency_kpi.feedback f
                 JOIN agency_kpi.clients c ON c.id = f.client_id
                 WHERE c.assigned_staff_id = st.id)
                 AS feedback_avg,
               (SELECT MAX(a.occurred_at) FROM agency_kpi.activities a
                 WHERE a.staff_id = st.id)
                 AS last_activity_at
        FROM agency_kpi.staff st
        WHERE ($3::BIGINT IS NULL AND st.status = 'ACTIVE') OR st.id = $3
        ORDER BY st.id
        "#,
    )
    .bind(since)
    .bind(until)
    .bind(staff_id)
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let staff = staff_from_row(&row)?;
        let activity_count: i64 = row.try_get("activity_count")?;
        let recent_activities = recent_activities(pool, ActivityOwner::Staff, staff.id).await?;

        snapshots.push(StaffSnapshot {
            clients: row.try_get("client_names")?,
            activity_count: u32::try_from(activity_count).unwrap_or(u32::MAX),
            sales_total: row.try_get("sales_total")?,
            feedback_avg: row.try_get("feedback_avg")?,
            last_activity_at: row.try_get("last_activity_at")?,
            recent_activities,
            staff,
        });
    }

    tracing::debug!(count = snapshots.len(), %since, %until, "fetched staff snapshots");
    Ok(snapshots)
}

#[derive(Debug, Clone, Copy)]
enum ActivityOwner {
    Client,
    Staff,
}

async fn recent_activities(
    pool: &PgPool,
    owner: ActivityOwner,
    id: DbId,
) -> Result<Vec<ActivityEntry>> {
    let column = match owner {
        ActivityOwner::Client => "client_id",
        ActivityOwner::Staff => "staff_id",
    };
    let query = format!(
        "SELECT {ACTIVITY_COLUMNS} FROM agency_kpi.activities \
         WHERE {column} = $1 ORDER BY occurred_at DESC LIMIT $2"
    );

    let rows = sqlx::query(&query)
        .bind(id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| -> Result<ActivityEntry> {
            Ok(ActivityEntry {
                client_id: row.try_get("client_id")?,
                activity_type: row.try_get("activity_type")?,
                platform: row.try_get("platform")?,
                occurred_at: row.try_get("occurred_at")?,
                goal: row.try_get("goal")?,
                evidence_link: row.try_get("evidence_link")?,
                initial_result: row.try_get("initial_result")?,
            })
        })
        .collect()
}

fn staff_from_row(row: &PgRow) -> Result<StaffMember> {
    Ok(StaffMember {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

pub async fn upsert_client_target(pool: &PgPool, target: &ClientWeeklyTarget) -> Result<()> {
    let target_per_week = i32::try_from(target.target_per_week).map_err(|_| {
        KpiError::InvalidArgument(format!("target {} is too large", target.target_per_week))
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO agency_kpi.client_targets
        (client_id, target_per_week, warn_ratio, feedback_warn_score, inactivity_warn_days, updated_at)
        VALUES ($1, $2, $3, $4, $5, now())
        ON CONFLICT (client_id) DO UPDATE
        SET target_per_week = EXCLUDED.target_per_week,
            warn_ratio = EXCLUDED.warn_ratio,
            feedback_warn_score = EXCLUDED.feedback_warn_score,
            inactivity_warn_days = EXCLUDED.inactivity_warn_days,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(target.client_id)
    .bind(target_per_week)
    .bind(target.warn_ratio)
    .bind(target.feedback_warn_score)
    .bind(target.inactivity_warn_days)
    .execute(pool)
    .await?;

    tracing::info!(
        client_id = target.client_id,
        target_per_week,
        rows = result.rows_affected(),
        "weekly target saved"
    );
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let staff = vec![
        (7_i64, "Sara Ahmadi", "ACTIVE"),
        (8, "Reza Karimi", "ACTIVE"),
        (9, "Mina Rostami", "INACTIVE"),
    ];

    for (id, name, status) in &staff {
        sqlx::query(
            r#"
            INSERT INTO agency_kpi.staff (id, name, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                status = EXCLUDED.status
            "#,
        )
        .bind(*id)
        .bind(*name)
        .bind(*status)
        .execute(pool)
        .await?;
    }

    let clients = vec![
        (101_i64, "Nour Bakery", Some(7_i64), Some((5, 0.6))),
        (102, "Arya Dental Clinic", Some(7), Some((10, 0.6))),
        (103, "Parsian Auto Parts", Some(8), Some((4, 0.5))),
        (104, "Golrang Florist", None, None),
    ];

    for (id, name, staff_id, target) in &clients {
        sqlx::query(
            r#"
            INSERT INTO agency_kpi.clients (id, business_name, assigned_staff_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET business_name = EXCLUDED.business_name,
                assigned_staff_id = EXCLUDED.assigned_staff_id
            "#,
        )
        .bind(*id)
        .bind(*name)
        .bind(*staff_id)
        .execute(pool)
        .await?;

        if let Some((target_per_week, warn_ratio)) = target {
            let mut target = ClientWeeklyTarget::new(*id, *target_per_week);
            target.warn_ratio = *warn_ratio;
            upsert_client_target(pool, &target).await?;
        }
    }

    let now = Utc::now();
    let activities = vec![
        ("seed-act-001", 101_i64, 7_i64, "post", "instagram", 1, Some("Promote weekend pastries")),
        ("seed-act-002", 101, 7, "story", "instagram", 2, None),
        ("seed-act-003", 101, 7, "campaign", "instagram", 3, Some("Ramadan sweets campaign")),
        ("seed-act-004", 101, 7, "post", "instagram", 4, None),
        ("seed-act-005", 101, 7, "direct message", "whatsapp", 5, Some("Follow up catering leads")),
        ("seed-act-006", 102, 7, "post", "instagram", 2, None),
        ("seed-act-007", 102, 7, "ad", "divar", 3, Some("Whitening offer listing")),
        ("seed-act-008", 102, 7, "story", "instagram", 4, None),
        ("seed-act-009", 102, 7, "email", "email", 5, None),
        ("seed-act-010", 102, 7, "blog", "website", 6, Some("Implant FAQ article")),
        ("seed-act-011", 102, 7, "post", "instagram", 6, None),
        ("seed-act-012", 103, 8, "ad", "torob", 12, Some("Brake pad price listing")),
    ];

    for (source_key, client_id, staff_id, activity_type, platform, days_ago, goal) in activities {
        sqlx::query(
            r#"
            INSERT INTO agency_kpi.activities
            (id, client_id, staff_id, activity_type, platform, occurred_at, goal, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(staff_id)
        .bind(activity_type)
        .bind(platform)
        .bind(now - Duration::days(days_ago))
        .bind(goal)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let sales = vec![
        ("seed-sale-001", 101_i64, 4_500_000.0_f64, "instagram", 2_i64, Some("Wedding cake order")),
        ("seed-sale-002", 101, 1_200_000.0, "offline", 4, None),
        ("seed-sale-003", 102, 18_000_000.0, "whatsapp", 3, Some("Two implant consultations")),
        ("seed-sale-004", 103, 650_000.0, "torob", 13, None),
    ];

    for (source_key, client_id, amount, source, days_ago, note) in sales {
        sqlx::query(
            r#"
            INSERT INTO agency_kpi.sales (id, client_id, amount, source, note, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(amount)
        .bind(source)
        .bind(note)
        .bind(now - Duration::days(days_ago))
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    let feedback = vec![
        ("seed-fb-001", 101_i64, 5_i32, "Great reels this week"),
        ("seed-fb-002", 102, 4, "Good reach, slow replies"),
        ("seed-fb-003", 103, 2, "No visible results yet"),
    ];

    for (source_key, client_id, score, comment) in feedback {
        sqlx::query(
            r#"
            INSERT INTO agency_kpi.feedback (id, client_id, score, comment, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(score)
        .bind(comment)
        .bind(now - Duration::days(1))
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    tracing::info!(staff = staff.len(), clients = clients.len(), "seed data inserted");
    Ok(())
}
