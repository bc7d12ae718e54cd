use std::path::PathBuf;

use agency_kpi::aggregator::{KpiAggregator, KpiEntry};
use agency_kpi::catalog::scope_label;
use agency_kpi::config::Config;
use agency_kpi::db::{self, PgKpiStore};
use agency_kpi::models::{ClientWeeklyTarget, DbId, DEFAULT_WARN_RATIO};
use agency_kpi::period::Scope;
use agency_kpi::report;
use agency_kpi::status::classify_status;
use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agency-kpi")]
#[command(about = "Marketing KPI recording and reporting for the agency bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo clients, targets, activities, sales and feedback
    Seed,
    /// List the metrics registered for a scope
    Metrics {
        #[arg(long, value_enum, default_value_t = Scope::Weekly)]
        scope: Scope,
    },
    /// Record one metric value for the period containing a date
    Record {
        #[arg(long, value_enum)]
        scope: Scope,
        #[arg(long)]
        metric: String,
        /// Loosely formatted number, e.g. "12,345", "7%" or "۱۲"
        #[arg(long)]
        value: String,
        /// Defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        client: Option<DbId>,
        #[arg(long)]
        actor: Option<DbId>,
    },
    /// Import metric values from a scope,metric,value,date,client_id CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        actor: Option<DbId>,
    },
    /// Show the metric values of one period
    Report {
        #[arg(long, value_enum)]
        scope: Scope,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        client: Option<DbId>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Summarize client activity health over the last 7 days
    Weekly {
        /// Show one client with its assigned staff and recent history
        #[arg(long)]
        client: Option<DbId>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize staff activity and client coverage over the last 7 days
    Staff {
        /// Defaults to every active staff member
        #[arg(long)]
        id: Option<DbId>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export the weekly client summary as CSV
    Export {
        #[arg(long, default_value = "weekly_summary.csv")]
        out: PathBuf,
    },
    /// Set a client's weekly activity target
    SetTarget {
        #[arg(long)]
        client: DbId,
        #[arg(long)]
        target: String,
        #[arg(long)]
        warn_ratio: Option<String>,
        #[arg(long)]
        feedback_warn_score: Option<f64>,
        #[arg(long)]
        inactivity_warn_days: Option<i64>,
    },
    /// Classify an activity count against a target
    Status {
        #[arg(long)]
        actual: u32,
        #[arg(long)]
        target: u32,
        #[arg(long, default_value_t = DEFAULT_WARN_RATIO)]
        warn_ratio: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agency_kpi=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // commands that never touch the database
    match &cli.command {
        Commands::Status {
            actual,
            target,
            warn_ratio,
        } => {
            let status = classify_status(*actual, *target, *warn_ratio);
            println!("{} {} ({actual} / {target})", status.indicator(), status);
            return Ok(());
        }
        Commands::Metrics { scope } => {
            let catalog = Config::catalog_from_env()?;
            println!("{} metrics:", scope_label(*scope));
            for (label, slug) in catalog.metrics_for(*scope) {
                println!("- {slug}: {label}");
            }
            return Ok(());
        }
        _ => {}
    }

    let config = Config::from_env()?;
    let catalog = config.load_catalog()?;
    let pool = db::connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let aggregator = KpiAggregator::new(PgKpiStore::new(pool.clone()), catalog)
        .with_week_start(config.week_start)?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Record {
            scope,
            metric,
            value,
            date,
            client,
            actor,
        } => {
            let outcome = aggregator
                .upsert_value(KpiEntry {
                    scope,
                    metric_slug: &metric,
                    raw_value: &value,
                    reference_date: date.unwrap_or_else(|| Utc::now().date_naive()),
                    client_id: client,
                    actor_id: actor,
                })
                .await?;
            println!(
                "Recorded {} = {} for {}.",
                aggregator.catalog().label_in(scope, &metric),
                outcome.value,
                outcome.period
            );
        }
        Commands::Import { csv, actor } => {
            let imported = aggregator.import_csv(&csv, actor).await?;
            println!("Imported {imported} values from {}.", csv.display());
        }
        Commands::Report {
            scope,
            date,
            client,
            json,
        } => {
            let reference = date.unwrap_or_else(|| Utc::now().date_naive());
            let kpi_report = aggregator.build_report(scope, reference, client).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&kpi_report)?);
            } else {
                print!("{}", report::render_kpi_report(&kpi_report, aggregator.catalog()));
            }
        }
        Commands::Weekly { client, out } => {
            let now = Utc::now();
            let since = now - Duration::days(7);
            let summary = match client {
                Some(client_id) => {
                    let detail = db::fetch_client_detail(&pool, client_id, since, now)
                        .await?
                        .context("client not found")?;
                    report::render_client_detail(&detail, &config.thresholds, now)
                }
                None => {
                    let snapshots = db::fetch_client_snapshots(&pool, since, now, None).await?;
                    report::render_weekly_summary(&snapshots, &config.thresholds, now)
                }
            };
            write_or_print(out, &summary)?;
        }
        Commands::Staff { id, out } => {
            let now = Utc::now();
            let snapshots =
                db::fetch_staff_snapshots(&pool, now - Duration::days(7), now, id).await?;
            if id.is_some() && snapshots.is_empty() {
                bail!("staff member not found");
            }
            let summary = report::render_staff_summary(&snapshots, &config.thresholds, now);
            write_or_print(out, &summary)?;
        }
        Commands::Export { out } => {
            let now = Utc::now();
            let snapshots =
                db::fetch_client_snapshots(&pool, now - Duration::days(7), now, None).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_weekly_csv(file, &snapshots, &config.thresholds, now)?;
            println!("Exported {} clients to {}.", snapshots.len(), out.display());
        }
        Commands::SetTarget {
            client,
            target,
            warn_ratio,
            feedback_warn_score,
            inactivity_warn_days,
        } => {
            let mut weekly_target =
                ClientWeeklyTarget::parse(client, &target, warn_ratio.as_deref())?;
            weekly_target.feedback_warn_score = feedback_warn_score;
            weekly_target.inactivity_warn_days = inactivity_warn_days;

            db::upsert_client_target(&pool, &weekly_target).await?;
            println!(
                "Weekly target for client #{client} set to {} (warn ratio {}).",
                weekly_target.target_per_week, weekly_target.warn_ratio
            );
        }
        Commands::Status { .. } | Commands::Metrics { .. } => {}
    }

    Ok(())
}

fn write_or_print(out: Option<PathBuf>, summary: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(&path, summary)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Summary written to {}.", path.display());
        }
        None => print!("{summary}"),
    }
    Ok(())
}
