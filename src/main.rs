use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use protocol_alerts::config::Config;
use protocol_alerts::dashboard::AlertDashboard;
use protocol_alerts::db::{self, PgAlertGateway};
use protocol_alerts::models::{AlertTier, ProtocolKind, Role};
use protocol_alerts::report::{self, format_brl};
use protocol_alerts::resolution::resolve_alert;
use protocol_alerts::responsibility::is_bottleneck;
use protocol_alerts::time_alerts::TimeAlertFilter;

#[derive(Parser)]
#[command(name = "protocol-alerts")]
#[command(about = "Alert classification and escalation for case protocols", long_about = None)]
struct Cli {
    /// Path to a TOML file overriding the alert thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import protocols from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Classify protocols into alert views
    Alerts {
        #[arg(long, value_enum, default_value_t = View::All)]
        view: View,
        #[arg(long)]
        kind: Option<ProtocolKind>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, value_enum)]
        tier: Option<TierArg>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print the views as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List alerts still waiting for resolution
    Pending,
    /// Resolve a pending alert
    Resolve {
        alert_id: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        note: Option<String>,
        /// Name recorded as the resolver, defaults to $USER
        #[arg(long)]
        by: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Time,
    Risk,
    Financial,
    Owners,
    All,
}

impl View {
    fn shows(self, other: View) -> bool {
        self == View::All || self == other
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Warning,
    Critical,
    CriticalMax,
}

impl From<TierArg> for AlertTier {
    fn from(value: TierArg) -> Self {
        match value {
            TierArg::Warning => AlertTier::Warning,
            TierArg::Critical => AlertTier::Critical,
            TierArg::CriticalMax => AlertTier::CriticalMax,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Manager,
    Analyst,
    Viewer,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::Manager => Role::Manager,
            RoleArg::Analyst => Role::Analyst,
            RoleArg::Viewer => Role::Viewer,
        }
    }
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref()).context("failed to load config")?;
    let thresholds = config.thresholds;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} protocols from {}.", csv.display());
        }
        Commands::Alerts {
            view,
            kind,
            owner,
            tier,
            limit,
            json,
        } => {
            let protocols = db::fetch_protocols(&pool).await?;
            if let Some(owner_id) = owner.as_deref() {
                let employees = db::fetch_employees(&pool).await?;
                if !employees.iter().any(|employee| employee.id == owner_id) {
                    tracing::warn!(owner_id, "owner is not in the employee directory");
                }
            }
            let filter = TimeAlertFilter {
                kind,
                owner_id: owner,
                tier: tier.map(AlertTier::from),
            };
            let dashboard = AlertDashboard::compute(&protocols, &filter, &thresholds, Utc::now());

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            if view.shows(View::Time) {
                println!("Stalled protocols:");
                if dashboard.time_alerts.is_empty() {
                    println!("  none");
                }
                for alert in dashboard.time_alerts.iter().take(limit) {
                    println!(
                        "- {} {} ({} days)",
                        alert.protocol_id, alert.tier, alert.days_stalled
                    );
                }
            }
            if view.shows(View::Risk) {
                println!("Operational risk:");
                if dashboard.risk_alerts.is_empty() {
                    println!("  none");
                }
                for alert in dashboard.risk_alerts.iter().take(limit) {
                    println!(
                        "- {} {} ({}): {}",
                        alert.protocol_id, alert.kind, alert.magnitude, alert.suggested_action
                    );
                }
            }
            if view.shows(View::Financial) {
                println!(
                    "Financial exposure (total stalled value {}):",
                    format_brl(dashboard.total_stalled_value)
                );
                if dashboard.financial_alerts.is_empty() {
                    println!("  none");
                }
                for alert in dashboard.financial_alerts.iter().take(limit) {
                    println!(
                        "- {} estimated {} pending {}{}",
                        alert.protocol_id,
                        format_brl(alert.estimated_value),
                        format_brl(alert.pending_value),
                        if alert.has_recorded_loss { " (loss recorded)" } else { "" }
                    );
                }
            }
            if view.shows(View::Owners) {
                println!("Responsibility:");
                if dashboard.owner_aggregates.is_empty() {
                    println!("  none");
                }
                for aggregate in dashboard.owner_aggregates.iter().take(limit) {
                    println!(
                        "- {} ({}) {} critical, avg {:.1} days{}",
                        aggregate.display_name,
                        aggregate.owner,
                        aggregate.critical_count,
                        aggregate.running_average_stall_days,
                        if is_bottleneck(aggregate, &thresholds) { " BOTTLENECK" } else { "" }
                    );
                }
            }
        }
        Commands::Report { out, limit } => {
            let protocols = db::fetch_protocols(&pool).await?;
            let pending = db::fetch_pending_alerts(&pool).await?;
            let dashboard = AlertDashboard::compute(
                &protocols,
                &TimeAlertFilter::default(),
                &thresholds,
                Utc::now(),
            );
            let report = report::build_report(&dashboard, &protocols, &pending, &thresholds, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Pending => {
            let pending = db::fetch_pending_alerts(&pool).await?;
            if pending.is_empty() {
                println!("No pending alerts.");
                return Ok(());
            }
            for alert in &pending {
                println!(
                    "- {} [{}] {} (since {})",
                    alert.id,
                    alert.protocol_id,
                    alert.title,
                    alert.created_at.date_naive()
                );
            }
        }
        Commands::Resolve {
            alert_id,
            role,
            note,
            by,
        } => {
            let by = by
                .or_else(|| std::env::var("USER").ok())
                .unwrap_or_else(|| "unknown".to_string());
            let gateway = PgAlertGateway::new(pool.clone());
            resolve_alert(&gateway, &alert_id, Role::from(role), &by, note.as_deref()).await?;
            println!("Alert {alert_id} resolved.");
        }
    }

    Ok(())
}
