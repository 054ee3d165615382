use agrogest_core::models::User;
use agrogest_core::remote::RemoteBackend;
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, require_user, required_text, Context};
use crate::error::CliError;

pub async fn run_login(
    id: &str,
    email: &str,
    name: &str,
    farm: Option<String>,
    ctx: &Context,
) -> Result<(), CliError> {
    let mut user = User::new(
        required_text("user id", id)?,
        required_text("email", email)?,
        required_text("name", name)?,
    );
    if let Some(farm) = farm {
        user = user.with_farm(farm);
    }

    let stores = ctx.open_stores().await?;
    stores.session.set_user(Some(user.clone())).await?;
    ctx.emit(&user, || vec![format!("Signed in as {} <{}>", user.name, user.email)])
}

pub async fn run_logout(keep_data: bool, ctx: &Context) -> Result<(), CliError> {
    let stores = ctx.open_stores().await?;
    let user = require_user(&stores).await?;

    stores.session.logout().await?;
    if !keep_data {
        stores.clear().await?;
    }

    println!("Signed out {}", user.email);
    let pending = stores.local.pending_count().await?;
    if pending > 0 {
        println!("{pending} unsynced change(s) stay queued on this device");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusView {
    user: Option<User>,
    remote_url: Option<String>,
    online: bool,
    last_sync_at: Option<i64>,
    pending: Vec<PendingCount>,
    tasks: usize,
    inventory_items: usize,
    fields: usize,
}

#[derive(Debug, Serialize)]
struct PendingCount {
    collection: String,
    operations: usize,
}

pub async fn run_status(ctx: &Context) -> Result<(), CliError> {
    let config = ctx.sync_config()?;
    let online = if config.is_configured() {
        probe(ctx.remote(&config)?.as_ref()).await
    } else {
        false
    };

    let stores = ctx.open_stores().await?;
    let pending = stores
        .local
        .pending_by_collection()
        .await?
        .into_iter()
        .map(|(collection, operations)| PendingCount {
            collection: collection.to_string(),
            operations,
        })
        .collect();

    let view = StatusView {
        user: stores.session.user().await,
        remote_url: config.remote_url.clone(),
        online,
        last_sync_at: stores.session.last_sync_at().await,
        pending,
        tasks: stores.tasks.all().await.len(),
        inventory_items: stores.inventory.all().await.len(),
        fields: stores.fields.all().await.len(),
    };

    ctx.emit(&view, || format_status_lines(&view))
}

/// Whether the backend answers a ping right now
pub async fn probe(remote: &dyn RemoteBackend) -> bool {
    match remote.ping().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!("Remote backend unreachable: {error}");
            false
        }
    }
}

fn format_status_lines(view: &StatusView) -> Vec<String> {
    let user = view.user.as_ref().map_or_else(
        || "not signed in".to_string(),
        |user| match &user.farm {
            Some(farm) => format!("{} <{}> ({farm})", user.name, user.email),
            None => format!("{} <{}>", user.name, user.email),
        },
    );
    let remote = match &view.remote_url {
        Some(url) if view.online => format!("{url} (online)"),
        Some(url) => format!("{url} (offline)"),
        None => "local only".to_string(),
    };
    let last_sync = view
        .last_sync_at
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let pending = if view.pending.is_empty() {
        "none".to_string()
    } else {
        view.pending
            .iter()
            .map(|count| format!("{} {}", count.operations, count.collection))
            .collect::<Vec<_>>()
            .join(", ")
    };

    vec![
        format!("User:      {user}"),
        format!("Remote:    {remote}"),
        format!("Last sync: {last_sync}"),
        format!("Pending:   {pending}"),
        format!(
            "Local:     {} tasks, {} inventory items, {} fields",
            view.tasks, view.inventory_items, view.fields
        ),
    ]
}
