use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agrogest_core::config::SyncConfig;
use agrogest_core::models::{Field, InventoryItem, MovementDirection, StockMovement, Task, User};
use agrogest_core::remote::{HttpBackend, RemoteBackend};
use agrogest_core::{DomainStores, LocalStore};
use chrono::Utc;
use serde::Serialize;

use crate::config_profiles::{resolve_sync_config, CliProfilesConfig};
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

/// Global options every command runs with
#[derive(Debug, Clone)]
pub struct Context {
    pub db_path: PathBuf,
    pub profile: Option<String>,
    pub json: bool,
}

impl Context {
    /// Hydrate the domain stores from the local database, offline.
    pub async fn open_stores(&self) -> Result<DomainStores, CliError> {
        open_stores(&self.db_path, false).await
    }

    /// Remote settings from the selected profile, overridden by the environment.
    pub fn sync_config(&self) -> Result<SyncConfig, CliError> {
        let config = CliProfilesConfig::load()?;
        let name = config.resolve_profile_name(self.profile.as_deref());
        resolve_sync_config(config.profile(&name), |key| env::var(key).ok())
    }

    pub fn remote(&self, config: &SyncConfig) -> Result<Arc<dyn RemoteBackend>, CliError> {
        if !config.is_configured() {
            return Err(CliError::SyncNotConfigured);
        }
        Ok(Arc::new(HttpBackend::new(config)?))
    }

    /// Print `value` as pretty JSON when `--json` is set, otherwise the lines.
    pub fn emit<T: Serialize + ?Sized>(
        &self,
        value: &T,
        lines: impl FnOnce() -> Vec<String>,
    ) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines() {
                println!("{line}");
            }
        }
        Ok(())
    }
}

pub async fn open_stores(db_path: &Path, online: bool) -> Result<DomainStores, CliError> {
    let local = LocalStore::open_path(db_path).await?;
    Ok(DomainStores::load(local, online).await?)
}

pub async fn require_user(stores: &DomainStores) -> Result<User, CliError> {
    stores.session.user().await.ok_or(CliError::NotSignedIn)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("AGROGEST_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agrogest")
        .join("agrogest.db")
}

/// Pick the one candidate whose id is `query` or starts with it.
pub fn resolve_by_prefix<T>(
    kind: &'static str,
    query: &str,
    candidates: Vec<(String, T)>,
) -> Result<T, CliError> {
    let query = normalize_identifier(kind, query)?;
    let mut matches: Vec<(String, T)> = candidates
        .into_iter()
        .filter(|(id, _)| id.starts_with(&query))
        .collect();

    if let Some(position) = matches.iter().position(|(id, _)| *id == query) {
        return Ok(matches.swap_remove(position).1);
    }

    match matches.len() {
        0 => Err(CliError::NotFound { kind, query }),
        1 => Ok(matches.remove(0).1),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|(id, _)| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub async fn resolve_task(stores: &DomainStores, query: &str) -> Result<Task, CliError> {
    let tasks = stores.tasks.all().await;
    resolve_by_prefix(
        "task",
        query,
        tasks.into_iter().map(|task| (task.id.as_str(), task)).collect(),
    )
}

pub async fn resolve_item(stores: &DomainStores, query: &str) -> Result<InventoryItem, CliError> {
    let items = stores.inventory.all().await;
    resolve_by_prefix(
        "inventory item",
        query,
        items.into_iter().map(|item| (item.id.as_str(), item)).collect(),
    )
}

pub async fn resolve_field(stores: &DomainStores, query: &str) -> Result<Field, CliError> {
    let fields = stores.fields.all().await;
    resolve_by_prefix(
        "field",
        query,
        fields.into_iter().map(|field| (field.id.as_str(), field)).collect(),
    )
}

pub fn normalize_identifier(kind: &'static str, id: &str) -> Result<String, CliError> {
    required_text(kind, id).map(|id| id.to_ascii_lowercase())
}

/// Join positional words into one trimmed value.
pub fn join_words(kind: &'static str, parts: &[String]) -> Result<String, CliError> {
    required_text(kind, &parts.join(" "))
}

pub fn required_text(kind: &'static str, value: &str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyValue(kind))
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    if tasks.is_empty() {
        return vec!["No tasks.".to_string()];
    }
    tasks
        .iter()
        .map(|task| {
            format!(
                "{:<13}  {} {}  {:<11}  {:<10}  {:<30}  {}",
                short_id(&task.id.as_str()),
                task.scheduled_date,
                task.scheduled_time,
                task.status.as_str(),
                task.task_type.as_str(),
                preview(&task.title, 30),
                task.field
            )
        })
        .collect()
}

pub fn format_item_lines(items: &[InventoryItem]) -> Vec<String> {
    if items.is_empty() {
        return vec!["No inventory items.".to_string()];
    }
    items
        .iter()
        .map(|item| {
            let stock = format!("{} {}", format_quantity(item.quantity), item.unit);
            let flag = if item.is_low_stock() { "  LOW" } else { "" };
            format!(
                "{:<13}  {:<30}  {:<11}  {stock:>12}  {:>10.2} €{flag}",
                short_id(&item.id.as_str()),
                preview(&item.name, 30),
                item.category.as_str(),
                item.stock_value()
            )
        })
        .collect()
}

pub fn format_field_lines(fields: &[Field]) -> Vec<String> {
    if fields.is_empty() {
        return vec!["No fields.".to_string()];
    }
    fields
        .iter()
        .map(|field| {
            let state = if field.active { "" } else { "  (inactive)" };
            format!(
                "{:<13}  {:<30}  {:<13}  {:<8}  {:>7.2} ha{state}",
                short_id(&field.id.as_str()),
                preview(&field.name, 30),
                field.field_type.as_str(),
                field.soil_type.as_str(),
                field.area_ha
            )
        })
        .collect()
}

pub fn format_movement_lines(item: &InventoryItem, movements: &[StockMovement]) -> Vec<String> {
    if movements.is_empty() {
        return vec![format!("No stock movements for {}.", item.name)];
    }
    let now_ms = Utc::now().timestamp_millis();
    movements
        .iter()
        .map(|movement| {
            let sign = match movement.direction {
                MovementDirection::In => '+',
                MovementDirection::Out => '-',
            };
            format!(
                "{:<10}  {sign}{} {}  {}",
                format_relative_time(movement.timestamp, now_ms),
                format_quantity(movement.quantity),
                item.unit,
                movement.reason
            )
        })
        .collect()
}

pub fn format_quantity(quantity: f64) -> String {
    let rendered = format!("{quantity:.3}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
