use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use tracing::info;
use uuid::Uuid;

use pipeline_forecast::{
    config::{self, AppConfig},
    db,
    entities::opportunity,
    forecasting::{calendar, Clock, ForecastReport, Opportunity, Stage, SystemClock},
    repositories::SeaOrmOpportunityStore,
    services::{ForecastRequest, ForecastService},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url.clone() {
        cfg.database_url = url;
    }
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Commands::Report(args) => handle_report(pool, cfg, args, cli.json).await?,
        Commands::Migrate => {
            db::run_migrations(&pool).await?;
            println!("Migrations applied");
        }
        Commands::Seed(args) => handle_seed(&pool, args).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "forecast-cli",
    about = "Sales forecast reports from the command line",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render the report as pretty JSON instead of a summary"
    )]
    json: bool,
    #[arg(long, global = true, help = "Override the configured database URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full forecast report
    Report(ReportArgs),
    /// Apply pending database migrations
    Migrate,
    /// Insert a demo book of opportunities
    Seed(SeedArgs),
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, help = "quarter, semester or year")]
    period: Option<String>,
    #[arg(long, help = "pessimistic, realistic or optimistic")]
    scenario: Option<String>,
    #[arg(long, help = "Only include opportunities owned by this user")]
    owner: Option<Uuid>,
    #[arg(long, help = "Fix the random seed for scenario adjustments")]
    seed: Option<u64>,
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, help = "Assign every seeded opportunity to this owner")]
    owner: Option<Uuid>,
}

async fn handle_report(
    pool: DatabaseConnection,
    cfg: AppConfig,
    args: ReportArgs,
    json: bool,
) -> Result<()> {
    let mut settings = cfg.forecast.clone();
    if args.seed.is_some() {
        settings.random_seed = args.seed;
    }

    let request = ForecastRequest::resolve(
        args.period.as_deref(),
        args.scenario.as_deref(),
        args.owner,
        &settings,
    );
    let store = Arc::new(SeaOrmOpportunityStore::new(Arc::new(pool)));
    let service = ForecastService::new(store, Arc::new(SystemClock), settings);

    let report = service
        .report(request)
        .await
        .context("failed to build forecast report")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &ForecastReport) {
    let forecast = &report.forecasts;
    println!(
        "Forecast {} / {} ({} to {})",
        forecast.period, forecast.scenario, forecast.start_date, forecast.end_date
    );
    println!(
        "{:<10} {:>14} {:>14} {:>14} {:>14} {:>6}",
        "Month", "Committed", "Best case", "Pipeline", "Weighted", "Deals"
    );
    for month in &forecast.months {
        println!(
            "{:<10} {:>14} {:>14} {:>14} {:>14} {:>6}",
            month.label,
            month.committed,
            month.best_case,
            month.pipeline,
            month.weighted,
            month.opportunities_count
        );
    }
    println!(
        "{:<10} {:>14} {:>14} {:>14} {:>14} {:>6}",
        "Total",
        forecast.totals.committed,
        forecast.totals.best_case,
        forecast.totals.pipeline,
        forecast.totals.weighted,
        forecast.totals.opportunities_count
    );

    println!();
    if report.historical_data.is_synthetic() {
        println!("History (synthetic, no won deals in window)");
    } else {
        println!("History");
    }
    for month in report.historical_data.months() {
        println!("  {:<10} {:>3} deals {:>14}", month.label, month.count, month.total);
    }

    println!();
    println!("Pipeline");
    for bucket in &report.pipeline_analysis {
        println!(
            "  {:<14} {:>4} deals {:>14} weighted {:>14}  {:.1} days",
            bucket.label,
            bucket.count,
            bucket.total_value,
            bucket.weighted_value,
            bucket.average_days_in_stage
        );
    }

    println!();
    println!("Conversion");
    for edge in &report.conversion_rates.stages {
        let marker = if edge.estimated { " (estimated)" } else { "" };
        println!("  {:<30} {:>5.1}%{}", edge.label, edge.rate, marker);
    }
    let overall = &report.conversion_rates.overall;
    println!(
        "  {:<30} {:>5.1}%{}",
        "Overall",
        overall.rate,
        if overall.estimated { " (estimated)" } else { "" }
    );
}

async fn handle_seed(pool: &DatabaseConnection, args: SeedArgs) -> Result<()> {
    let now = SystemClock.now();
    let today = now.date_naive();
    let next_month = calendar::add_months(calendar::first_of_month(today), 1);

    let open: [(&str, Decimal, Stage, i64); 6] = [
        ("Warehouse automation rollout", dec!(84000), Stage::Negotiation, 12),
        ("Regional distributor renewal", dec!(36000), Stage::ProposalSent, 20),
        ("Fleet telematics pilot", dec!(12500), Stage::Qualification, 35),
        ("Retail POS upgrade", dec!(22000), Stage::New, 5),
        ("Cold chain monitoring", dec!(58000), Stage::ProposalSent, 44),
        ("Support contract expansion", dec!(9500), Stage::Negotiation, 60),
    ];
    let closed: [(&str, Decimal, Stage, u32); 4] = [
        ("Dock scheduling suite", dec!(41000), Stage::Converted, 1),
        ("Label printer refresh", dec!(7800), Stage::Converted, 2),
        ("Yard management", dec!(63000), Stage::Converted, 4),
        ("Returns portal", dec!(15000), Stage::Lost, 2),
    ];

    let mut seeded = Vec::new();
    for (title, amount, stage, offset_days) in open {
        let touched = now - Duration::days(offset_days);
        seeded.push(
            Opportunity::new(title, amount, stage.default_probability(), stage, touched)
                .closing_on(today + Duration::days(offset_days * 2))
                .touched_at(touched),
        );
    }
    for (title, amount, stage, months_ago) in closed {
        let closed_on = calendar::sub_months(next_month, months_ago);
        let created = now - Duration::days(i64::from(months_ago) * 30 + 20);
        seeded.push(
            Opportunity::new(title, amount, stage.default_probability(), stage, created)
                .closing_on(closed_on)
                .closed_on(closed_on)
                .touched_at(closed_on.and_hms_opt(17, 0, 0).unwrap_or_default().and_utc()),
        );
    }

    let count = seeded.len();
    for record in seeded {
        let record = match args.owner {
            Some(owner) => record.owned_by(owner),
            None => record,
        };
        let model: opportunity::ActiveModel = record.into();
        model.insert(pool).await.context("failed to insert opportunity")?;
    }

    info!(count, "Seeded demo opportunities");
    println!("Seeded {} opportunities", count);
    Ok(())
}
