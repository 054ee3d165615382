//! AgroGest CLI - offline-first farm management from the terminal
//!
//! Every command works against the local database; `sync` and `watch`
//! reconcile it with the remote backend.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_db_path, Context};
use crate::commands::config::run_config;
use crate::commands::dashboard::run_dashboard;
use crate::commands::field::run_field;
use crate::commands::inventory::run_inventory;
use crate::commands::seed::run_seed;
use crate::commands::session::{run_login, run_logout, run_status};
use crate::commands::sync::{run_sync, run_watch};
use crate::commands::task::run_task;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let ctx = Context {
        db_path: resolve_db_path(cli.db_path),
        profile: cli.profile,
        json: cli.json,
    };

    match cli.command {
        Some(Commands::Task { command }) => run_task(command, &ctx).await,
        Some(Commands::Inventory { command }) => run_inventory(command, &ctx).await,
        Some(Commands::Field { command }) => run_field(command, &ctx).await,
        Some(Commands::Login {
            id,
            email,
            name,
            farm,
        }) => run_login(&id, &email, &name, farm, &ctx).await,
        Some(Commands::Logout { keep_data }) => run_logout(keep_data, &ctx).await,
        Some(Commands::Status) => run_status(&ctx).await,
        Some(Commands::Sync) => run_sync(&ctx).await,
        Some(Commands::Watch { interval }) => run_watch(interval, &ctx).await,
        Some(Commands::Dashboard { period }) => run_dashboard(period, &ctx).await,
        Some(Commands::Seed) => run_seed(&ctx).await,
        Some(Commands::Config { command }) => run_config(command, &ctx),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "agrogest=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
