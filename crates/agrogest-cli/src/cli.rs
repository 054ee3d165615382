use std::path::PathBuf;
use std::str::FromStr;

use agrogest_core::analytics::Period;
use agrogest_core::models::{FieldType, ItemCategory, SoilType, TaskStatus, TaskType};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agrogest")]
#[command(about = "Offline-first farm management: tasks, inventory and fields")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding the remote backend settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule and track field work
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage farm supplies and stock
    #[command(alias = "inv")]
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
    /// Manage plots of land
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Sign in as a user on this device
    Login {
        /// User id on the remote backend
        #[arg(long, value_name = "ID")]
        id: String,
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "NAME")]
        name: String,
        /// Farm name shown on the dashboard
        #[arg(long, value_name = "NAME")]
        farm: Option<String>,
    },
    /// Sign out and drop the local copy of synced data
    Logout {
        /// Keep local tasks, inventory and fields
        #[arg(long)]
        keep_data: bool,
    },
    /// Show session, connectivity and queue state
    Status,
    /// Push pending changes and refresh from the remote backend
    Sync,
    /// Keep syncing on reconnect and on a timer until interrupted
    Watch {
        /// Seconds between periodic syncs (overrides config)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Summary of tasks, stock alerts and estimated KPIs
    Dashboard {
        /// Reporting window
        #[arg(long, default_value = "30d", value_parser = parse_choice::<Period>)]
        period: Period,
    },
    /// Populate an empty database with sample data
    Seed,
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Schedule a new task
    #[command(alias = "new")]
    Add(TaskArgs),
    /// List tasks
    List {
        /// Only tasks scheduled on this date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE", conflicts_with = "today")]
        date: Option<NaiveDate>,
        /// Only tasks scheduled today
        #[arg(long)]
        today: bool,
        #[arg(long, value_parser = parse_choice::<TaskStatus>)]
        status: Option<TaskStatus>,
        #[arg(long = "type", value_parser = parse_choice::<TaskType>)]
        task_type: Option<TaskType>,
        /// Field label, case-insensitive
        #[arg(long)]
        field: Option<String>,
    },
    /// Move a task to another status
    Status {
        /// Task ID or unique ID prefix
        id: String,
        #[arg(value_parser = parse_choice::<TaskStatus>)]
        status: TaskStatus,
    },
    /// Edit a task
    Update {
        /// Task ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type", value_parser = parse_choice::<TaskType>)]
        task_type: Option<TaskType>,
        #[arg(long)]
        field: Option<String>,
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(long, value_name = "HH:MM")]
        time: Option<String>,
    },
    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
}

#[derive(Args)]
pub struct TaskArgs {
    /// Task title
    pub title: Vec<String>,
    #[arg(long = "type", value_parser = parse_choice::<TaskType>)]
    pub task_type: TaskType,
    /// Field the work happens on
    #[arg(long)]
    pub field: String,
    /// Scheduled date (YYYY-MM-DD), today when omitted
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,
    #[arg(long, value_name = "HH:MM", default_value = "08:00")]
    pub time: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Subcommand)]
pub enum InventoryCommands {
    /// Register a new item
    #[command(alias = "new")]
    Add(ItemArgs),
    /// List items
    List {
        #[arg(long, value_parser = parse_choice::<ItemCategory>)]
        category: Option<ItemCategory>,
        /// Only items at or below their minimum stock
        #[arg(long)]
        low: bool,
        /// Only items expiring within this many days
        #[arg(long, value_name = "DAYS")]
        expiring: Option<i64>,
    },
    /// Receive stock
    StockIn(StockArgs),
    /// Consume stock
    StockOut(StockArgs),
    /// Stock movement history of an item
    Movements {
        /// Item ID or unique ID prefix
        id: String,
    },
    /// Delete an item with its movements
    Delete {
        /// Item ID or unique ID prefix
        id: String,
    },
}

#[derive(Args)]
pub struct ItemArgs {
    /// Item name
    pub name: Vec<String>,
    #[arg(long, value_parser = parse_choice::<ItemCategory>)]
    pub category: ItemCategory,
    #[arg(long, default_value_t = 0.0)]
    pub quantity: f64,
    #[arg(long)]
    pub unit: String,
    #[arg(long, default_value_t = 0.0)]
    pub price: f64,
    #[arg(long, default_value_t = 0.0)]
    pub min_stock: f64,
    #[arg(long)]
    pub supplier: Option<String>,
    #[arg(long, value_name = "DATE")]
    pub expiry: Option<NaiveDate>,
}

#[derive(Args)]
pub struct StockArgs {
    /// Item ID or unique ID prefix
    pub id: String,
    pub quantity: f64,
    /// Why the stock changed
    #[arg(long, default_value = "")]
    pub reason: String,
}

#[derive(Subcommand)]
pub enum FieldCommands {
    /// Register a new field
    #[command(alias = "new")]
    Add(FieldArgs),
    /// List fields
    List {
        /// Include inactive fields
        #[arg(long, short)]
        all: bool,
        /// Case-insensitive search over name, type, description and notes
        #[arg(long)]
        search: Option<String>,
    },
    /// Flip a field between active and inactive
    Toggle {
        /// Field ID or unique ID prefix
        id: String,
    },
    /// Delete a field
    Delete {
        /// Field ID or unique ID prefix
        id: String,
        /// Deactivate instead of deleting
        #[arg(long)]
        soft: bool,
    },
}

#[derive(Args)]
pub struct FieldArgs {
    /// Field name
    pub name: Vec<String>,
    #[arg(long = "type", value_parser = parse_choice::<FieldType>)]
    pub field_type: FieldType,
    #[arg(long, value_parser = parse_choice::<SoilType>)]
    pub soil: SoilType,
    /// Area in hectares
    #[arg(long)]
    pub area: f64,
    /// Irrigation capacity in liters
    #[arg(long, default_value_t = 0.0)]
    pub irrigation: f64,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub notes: String,
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Remote backend base URL
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Bearer token sent to the remote backend
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Seconds between periodic syncs in `watch`
        #[arg(long, value_name = "SECS")]
        sync_interval: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show,
}

/// Parse one of the lowercase labels of a core enum.
pub fn parse_choice<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|error| error.to_string())
}
