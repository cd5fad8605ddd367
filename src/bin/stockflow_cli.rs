use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use stockflow_api::{
    auth::{Actor, RolePolicy},
    config,
    db::{self, DbPool},
    services::{
        bootstrap,
        inventory::verify_balance,
        reports::{RegenerateSummariesRequest, ReportService},
    },
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stockflow", about = "StockFlow maintenance commands", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Upsert the default warehouses
    Seed(SeedArgs),
    /// Rebuild daily movement summaries from the ledger
    RegenerateSummaries(RegenerateArgs),
    /// Compare a stored balance with the sum of its movements
    Verify(VerifyArgs),
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, action = ArgAction::SetTrue, help = "Also create demo products")]
    demo: bool,
}

#[derive(Args)]
struct RegenerateArgs {
    #[arg(long, help = "First day to rebuild (YYYY-MM-DD)")]
    from: NaiveDate,
    #[arg(long, help = "Last day to rebuild (YYYY-MM-DD)")]
    to: NaiveDate,
    #[arg(long, help = "Limit to one product")]
    product: Option<Uuid>,
    #[arg(long, help = "Limit to one warehouse")]
    warehouse: Option<Uuid>,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    product: Uuid,
    #[arg(long)]
    warehouse: Uuid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&pool)
                .await
                .context("migrations failed")?;
            println!("Migrations applied");
        }
        Commands::Seed(args) => {
            let report = bootstrap::seed(&pool, args.demo)
                .await
                .context("seeding failed")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Warehouses: {} created, {} updated",
                    report.warehouses_created, report.warehouses_updated
                );
                println!(
                    "Products: {} created, {} updated",
                    report.products_created, report.products_updated
                );
            }
        }
        Commands::RegenerateSummaries(args) => {
            regenerate(pool, args, cli.json).await?;
        }
        Commands::Verify(args) => {
            let verification = verify_balance(&pool, args.product, args.warehouse)
                .await
                .context("verification failed")?;
            if cli.json {
                print_json(&verification)?;
            } else {
                println!(
                    "stored {} / ledger {} over {} movements: {}",
                    verification.stored_quantity,
                    verification.ledger_quantity,
                    verification.movement_count,
                    if verification.consistent {
                        "consistent"
                    } else {
                        "MISMATCH"
                    }
                );
            }
            if !verification.consistent {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

async fn regenerate(pool: DbPool, args: RegenerateArgs, json: bool) -> Result<()> {
    let service = ReportService::new(Arc::new(pool), Arc::new(RolePolicy), None);
    let request = RegenerateSummariesRequest {
        from: args.from,
        to: args.to,
        product_id: args.product,
        warehouse_id: args.warehouse,
    };

    let report = service
        .regenerate_summaries(&Actor::system(), request)
        .await
        .context("regeneration failed")?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Regenerated {} rows for {} keys between {} and {}",
            report.rows, report.keys, report.from, report.to
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
