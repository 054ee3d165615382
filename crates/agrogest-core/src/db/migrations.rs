//! Database migrations
//!
//! Every version only creates what is missing, so re-running a migration or
//! upgrading an older file never drops existing collections.

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2).await?;
    }
    if version < 3 {
        apply(conn, 3, &V3).await?;
    }

    debug_assert_eq!(get_version(conn).await?, CURRENT_VERSION);
    Ok(())
}

/// Get the current schema version
pub async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: entity collections, pending-operations queue and session
const V1: [&str; 12] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        scheduled_date TEXT NOT NULL,
        field TEXT NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_date ON tasks(scheduled_date)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_field ON tasks(field)",
    "CREATE TABLE IF NOT EXISTS inventory (
        id TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        quantity REAL NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_inventory_category ON inventory(category)",
    "CREATE INDEX IF NOT EXISTS idx_inventory_quantity ON inventory(quantity)",
    "CREATE TABLE IF NOT EXISTS fields (
        id TEXT PRIMARY KEY,
        active INTEGER NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pending_operations (
        sequence INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        collection TEXT NOT NULL,
        payload TEXT NOT NULL,
        enqueued_at INTEGER NOT NULL
    )",
    // Session (local only)
    "CREATE TABLE IF NOT EXISTS session (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: stock movement audit trail
const V2: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS stock_movements (
        id TEXT PRIMARY KEY,
        item_id TEXT NOT NULL,
        direction TEXT NOT NULL,
        quantity REAL NOT NULL,
        reason TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        owner_id TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_stock_movements_item ON stock_movements(item_id)",
    "CREATE INDEX IF NOT EXISTS idx_fields_active ON fields(active)",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Version 3: owner of each queued operation
const V3: [&str; 3] = [
    "ALTER TABLE pending_operations ADD COLUMN owner_id TEXT NOT NULL DEFAULT ''",
    "CREATE INDEX IF NOT EXISTS idx_pending_operations_owner ON pending_operations(owner_id)",
    "INSERT INTO schema_version (version) VALUES (3)",
];

/// Run one version's statements in a transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated local store to version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
                [name],
            )
            .await
            .unwrap();
        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
        for table in [
            "tasks",
            "inventory",
            "fields",
            "pending_operations",
            "session",
            "stock_movements",
        ] {
            assert!(table_exists(&conn, table).await, "missing {table}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upgrade_keeps_existing_rows() {
        let conn = setup().await;
        apply(&conn, 1, &V1).await.unwrap();
        conn.execute(
            "INSERT INTO tasks (id, status, scheduled_date, field, data) VALUES ('t1', 'pending', '2026-01-01', 'A', '{}')",
            (),
        )
        .await
        .unwrap();

        run(&conn).await.unwrap();

        assert!(table_exists(&conn, "stock_movements").await);
        let mut rows = conn.query("SELECT COUNT(*) FROM tasks", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upgrade_leaves_old_queue_entries_unassigned() {
        let conn = setup().await;
        apply(&conn, 1, &V1).await.unwrap();
        apply(&conn, 2, &V2).await.unwrap();
        conn.execute(
            "INSERT INTO pending_operations (id, kind, collection, payload, enqueued_at)
             VALUES ('op1', 'create', 'tasks', '{\"id\":\"t1\"}', 0)",
            (),
        )
        .await
        .unwrap();

        run(&conn).await.unwrap();

        assert_eq!(get_version(&conn).await.unwrap(), 3);
        let mut rows = conn
            .query("SELECT owner_id FROM pending_operations WHERE id = 'op1'", ())
            .await
            .unwrap();
        let owner: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(owner, "");
    }
}
