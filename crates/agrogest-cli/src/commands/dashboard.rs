use agrogest_core::analytics::{
    inventory_alerts, kpi_snapshot, task_stats, InventoryAlerts, KpiSnapshot, Period, TaskStats,
};
use agrogest_core::models::Task;
use agrogest_core::DomainStores;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::commands::common::{format_quantity, format_sync_timestamp, format_task_lines, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub farm: Option<String>,
    pub today: Vec<Task>,
    pub tasks: TaskStats,
    pub alerts: InventoryAlerts,
    pub inventory_value: f64,
    pub kpis: KpiSnapshot,
    pub last_sync_at: Option<i64>,
}

pub async fn run_dashboard(period: Period, ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;
    let dashboard = build_dashboard(&stores, period, Local::now().date_naive()).await;
    ctx.emit(&dashboard, || format_dashboard_lines(&dashboard))
}

pub async fn build_dashboard(stores: &DomainStores, period: Period, today: NaiveDate) -> Dashboard {
    let tasks = stores.tasks.all().await;
    let items = stores.inventory.all().await;
    let inventory_value = stores.inventory.total_value().await;

    Dashboard {
        farm: stores.session.user().await.and_then(|user| user.farm),
        today: stores.tasks.by_date(today).await,
        tasks: task_stats(&tasks),
        alerts: inventory_alerts(&items, today),
        inventory_value,
        kpis: kpi_snapshot(&tasks, inventory_value, period, today),
        last_sync_at: stores.session.last_sync_at().await,
    }
}

fn format_dashboard_lines(dashboard: &Dashboard) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(farm) = &dashboard.farm {
        lines.push(farm.clone());
        lines.push(String::new());
    }

    lines.push("Today".to_string());
    lines.extend(format_task_lines(&dashboard.today));
    lines.push(String::new());

    let stats = &dashboard.tasks;
    lines.push(format!(
        "Tasks: {} total, {} pending, {} in progress, {} completed ({:.0}%)",
        stats.total, stats.pending, stats.in_progress, stats.completed, stats.completion_rate
    ));
    lines.push(format!("Inventory value: {:.2} €", dashboard.inventory_value));

    for item in &dashboard.alerts.low_stock {
        lines.push(format!(
            "Low stock: {} ({} {}, minimum {})",
            item.name,
            format_quantity(item.quantity),
            item.unit,
            format_quantity(item.min_stock)
        ));
    }
    for item in &dashboard.alerts.expiring_soon {
        if let Some(expiry) = item.expiry_date {
            lines.push(format!("Expiring: {} on {expiry}", item.name));
        }
    }

    let kpis = &dashboard.kpis;
    lines.push(String::new());
    lines.push(format!("Last {} days (estimated)", kpis.period_days));
    lines.push(format!("  Treated area: {:.1} ha", kpis.treated_area_ha));
    lines.push(format!("  Water used:   {:.0} L", kpis.water_liters));
    lines.push(format!("  Fertilizer:   {:.0} kg", kpis.fertilizer_kg));
    lines.push(format!("  Daily cost:   {:.2} €", kpis.daily_cost));

    lines.push(String::new());
    lines.push(format!(
        "Last sync: {}",
        dashboard
            .last_sync_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    ));
    lines
}
