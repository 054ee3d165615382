use std::time::Duration;

use agrogest_core::connectivity::ConnectivityMonitor;
use agrogest_core::sync::{AutoSync, SyncCoordinator, SyncReport};

use crate::commands::common::{format_sync_timestamp, open_stores, require_user, Context};
use crate::commands::session::probe;
use crate::error::CliError;

pub async fn run_sync(ctx: &Context) -> Result<(), CliError> {
    let config = ctx.sync_config()?;
    let remote = ctx.remote(&config)?;
    let online = probe(remote.as_ref()).await;

    let stores = open_stores(&ctx.db_path, online).await?;
    require_user(&stores).await?;

    let coordinator = SyncCoordinator::new(stores, remote);
    let report = coordinator.sync().await?;
    ctx.emit(&report, || format_report_lines(&report))
}

/// Sync on reconnect and on a timer until Ctrl-C.
pub async fn run_watch(interval: Option<u64>, ctx: &Context) -> Result<(), CliError> {
    let mut config = ctx.sync_config()?;
    if let Some(secs) = interval {
        config = config.with_sync_interval(Duration::from_secs(secs))?;
    }
    let remote = ctx.remote(&config)?;
    let online = probe(remote.as_ref()).await;

    let stores = open_stores(&ctx.db_path, online).await?;
    let user = require_user(&stores).await?;
    let coordinator = SyncCoordinator::new(stores, remote.clone());

    let connectivity = ConnectivityMonitor::new(online);
    let _probe = connectivity.spawn_probe(remote, config.probe_interval());
    let _transitions = connectivity.listen(
        || async { println!("Back online") },
        || async { println!("Offline, changes stay queued") },
    );
    let auto = AutoSync::spawn(coordinator.clone(), &connectivity, config.sync_interval());

    println!(
        "Watching as {} (sync every {}s). Press Ctrl-C to stop.",
        user.email,
        config.sync_interval_secs
    );
    if online {
        match coordinator.sync().await {
            Ok(report) => report_lines(&report),
            Err(error) => eprintln!("Initial sync failed: {error}"),
        }
    }

    tokio::signal::ctrl_c().await?;
    auto.stop();

    let status = coordinator.status().await;
    if let Some(report) = status.last_report {
        println!("Last sync: {}", format_sync_timestamp(report.finished_at));
    }
    if let Some(error) = status.last_error {
        println!("Last error: {error} ({} failed attempt(s))", status.error_count);
    }
    Ok(())
}

fn report_lines(report: &SyncReport) {
    for line in format_report_lines(report) {
        println!("{line}");
    }
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    vec![
        format!("Pushed {} change(s)", report.pushed),
        format!(
            "Pulled {} tasks, {} inventory items, {} fields",
            report.pulled_tasks, report.pulled_items, report.pulled_fields
        ),
        format!("Sync completed at {}", format_sync_timestamp(report.finished_at)),
    ]
}
