//! Entity, queue and stock-movement repository over a libSQL connection

use libsql::{params_from_iter, Connection, Value};

use crate::error::{Error, Result};
use crate::models::{
    Collection, Entity, Index, IndexValue, ItemId, OperationId, OperationKind, PendingOperation,
    StockMovement,
};

/// libSQL repository for the synced collections and the pending-operations queue.
///
/// Methods ending in `_tracked` write the entity change and its queue entry in
/// one transaction: either both land or neither does.
pub struct LibSqlEntityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fetch one entity by id
    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<E>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", E::COLLECTION.table());
        let mut rows = self.conn.query(&sql, [id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(decode(&row.get::<String>(0)?)?)),
            None => Ok(None),
        }
    }

    /// All entities of a collection, in insertion order
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        let sql = format!("SELECT data FROM {} ORDER BY rowid", E::COLLECTION.table());
        self.collect(&sql, Vec::new()).await
    }

    /// Entities whose indexed column equals `value`
    pub async fn list_by_index<E: Entity>(
        &self,
        index: Index,
        value: IndexValue,
    ) -> Result<Vec<E>> {
        if index.collection() != E::COLLECTION {
            return Err(Error::InvalidInput(format!(
                "index {index} does not belong to {}",
                E::COLLECTION
            )));
        }
        let sql = format!(
            "SELECT data FROM {} WHERE {} = ? ORDER BY rowid",
            E::COLLECTION.table(),
            index.column()
        );
        self.collect(&sql, vec![to_value(value)]).await
    }

    /// Insert or replace an entity by id
    pub async fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        let collection = E::COLLECTION;
        let columns = collection.index_columns();
        let placeholders = vec!["?"; columns.len() + 2].join(", ");
        let updates = columns
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .chain(std::iter::once("data = excluded.data".to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (id, {}, data) VALUES ({placeholders}) ON CONFLICT(id) DO UPDATE SET {updates}",
            collection.table(),
            columns.join(", "),
        );

        let mut values = Vec::with_capacity(columns.len() + 2);
        values.push(Value::Text(entity.key()));
        values.extend(entity.index_values().into_iter().map(to_value));
        values.push(Value::Text(serde_json::to_string(entity)?));

        self.conn.execute(&sql, params_from_iter(values)).await?;
        Ok(())
    }

    /// Delete an entity by id; returns whether a row was removed
    pub async fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.table());
        let rows = self.conn.execute(&sql, [id]).await?;
        Ok(rows > 0)
    }

    /// Append an operation owned by `owner_id` to the queue (no transaction of its own)
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        collection: Collection,
        payload: serde_json::Value,
        owner_id: &str,
    ) -> Result<PendingOperation> {
        let id = OperationId::new();
        let enqueued_at = crate::util::now_millis();
        self.conn
            .execute(
                "INSERT INTO pending_operations (id, kind, collection, payload, enqueued_at, owner_id)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params_from_iter([
                    Value::Text(id.as_str()),
                    Value::Text(kind.as_str().to_string()),
                    Value::Text(collection.as_str().to_string()),
                    Value::Text(serde_json::to_string(&payload)?),
                    Value::Integer(enqueued_at),
                    Value::Text(owner_id.to_string()),
                ]),
            )
            .await?;
        let sequence = self.conn.last_insert_rowid();

        tracing::debug!("Queued {kind} on {collection} (#{sequence})");
        Ok(PendingOperation {
            id,
            sequence,
            kind,
            collection,
            payload,
            enqueued_at,
            owner_id: owner_id.to_string(),
        })
    }

    /// Upsert an entity and queue `kind` for it in one transaction
    pub async fn put_tracked<E: Entity>(
        &self,
        entity: &E,
        kind: OperationKind,
    ) -> Result<PendingOperation> {
        self.begin().await?;
        let result = async {
            self.upsert(entity).await?;
            self.enqueue(
                kind,
                E::COLLECTION,
                serde_json::to_value(entity)?,
                entity.owner(),
            )
            .await
        }
        .await;
        self.finish(result).await
    }

    /// Delete an entity and queue the delete in one transaction
    pub async fn delete_tracked(
        &self,
        collection: Collection,
        id: &str,
        owner_id: &str,
    ) -> Result<PendingOperation> {
        self.begin().await?;
        let result = async {
            self.remove(collection, id).await?;
            self.enqueue(
                OperationKind::Delete,
                collection,
                serde_json::json!({ "id": id }),
                owner_id,
            )
            .await
        }
        .await;
        self.finish(result).await
    }

    /// Overwrite a whole collection without queueing anything
    pub async fn replace_collection<E: Entity>(&self, entities: &[E]) -> Result<()> {
        self.begin().await?;
        let result = async {
            let sql = format!("DELETE FROM {}", E::COLLECTION.table());
            self.conn.execute(&sql, ()).await?;
            for entity in entities {
                self.upsert(entity).await?;
            }
            if E::COLLECTION == Collection::Inventory {
                self.conn
                    .execute(
                        "DELETE FROM stock_movements WHERE item_id NOT IN (SELECT id FROM inventory)",
                        (),
                    )
                    .await?;
            }
            Ok(())
        }
        .await;
        self.finish(result).await
    }

    /// The whole queue, oldest first
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        self.query_operations(
            "SELECT sequence, id, kind, collection, payload, enqueued_at, owner_id
             FROM pending_operations
             ORDER BY sequence ASC",
            Vec::new(),
        )
        .await
    }

    /// Operations `owner_id` may push: their own plus unassigned ones, oldest first
    pub async fn pending_operations_for(&self, owner_id: &str) -> Result<Vec<PendingOperation>> {
        self.query_operations(
            "SELECT sequence, id, kind, collection, payload, enqueued_at, owner_id
             FROM pending_operations
             WHERE owner_id = ? OR owner_id = ''
             ORDER BY sequence ASC",
            vec![Value::Text(owner_id.to_string())],
        )
        .await
    }

    async fn query_operations(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<PendingOperation>> {
        let mut rows = self.conn.query(sql, params_from_iter(values)).await?;
        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(PendingOperation {
                sequence: row.get(0)?,
                id: parse_id(&row.get::<String>(1)?)?,
                kind: row.get::<String>(2)?.parse()?,
                collection: row.get::<String>(3)?.parse()?,
                payload: serde_json::from_str(&row.get::<String>(4)?)?,
                enqueued_at: row.get(5)?,
                owner_id: row.get(6)?,
            });
        }
        Ok(operations)
    }

    /// Number of queued operations
    pub async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_operations", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Remove exactly the given queue entries
    pub async fn acknowledge(&self, ids: &[OperationId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.begin().await?;
        let result = async {
            let mut removed = 0;
            for id in ids {
                let rows = self
                    .conn
                    .execute("DELETE FROM pending_operations WHERE id = ?", [id.as_str()])
                    .await?;
                removed += usize::try_from(rows).unwrap_or_default();
            }
            Ok(removed)
        }
        .await;
        self.finish(result).await
    }

    /// Store an item's new quantity, its movement and the queued update together
    pub async fn record_movement<E: Entity>(
        &self,
        item: &E,
        movement: &StockMovement,
    ) -> Result<PendingOperation> {
        self.begin().await?;
        let result = async {
            self.upsert(item).await?;
            self.conn
                .execute(
                    "INSERT INTO stock_movements (id, item_id, direction, quantity, reason, timestamp, owner_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params_from_iter([
                        Value::Text(movement.id.as_str()),
                        Value::Text(movement.item_id.as_str()),
                        Value::Text(movement.direction.as_str().to_string()),
                        Value::Real(movement.quantity),
                        Value::Text(movement.reason.clone()),
                        Value::Integer(movement.timestamp),
                        Value::Text(movement.owner_id.clone()),
                    ]),
                )
                .await?;
            self.enqueue(
                OperationKind::Update,
                E::COLLECTION,
                serde_json::to_value(item)?,
                item.owner(),
            )
            .await
        }
        .await;
        self.finish(result).await
    }

    /// Delete an inventory item with its movements and queue the delete
    pub async fn delete_item_cascade(
        &self,
        id: &ItemId,
        owner_id: &str,
    ) -> Result<PendingOperation> {
        let id = id.as_str();
        self.begin().await?;
        let result = async {
            self.remove(Collection::Inventory, &id).await?;
            self.conn
                .execute("DELETE FROM stock_movements WHERE item_id = ?", [id.as_str()])
                .await?;
            self.enqueue(
                OperationKind::Delete,
                Collection::Inventory,
                serde_json::json!({ "id": id }),
                owner_id,
            )
            .await
        }
        .await;
        self.finish(result).await
    }

    /// Movements of one item, newest first
    pub async fn movements_for_item(&self, id: &ItemId) -> Result<Vec<StockMovement>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, item_id, direction, quantity, reason, timestamp, owner_id
                 FROM stock_movements
                 WHERE item_id = ?
                 ORDER BY timestamp DESC, rowid DESC",
                [id.as_str()],
            )
            .await?;

        let mut movements = Vec::new();
        while let Some(row) = rows.next().await? {
            movements.push(parse_movement(&row)?);
        }
        Ok(movements)
    }

    /// Every recorded movement, oldest first
    pub async fn list_movements(&self) -> Result<Vec<StockMovement>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, item_id, direction, quantity, reason, timestamp, owner_id
                 FROM stock_movements
                 ORDER BY timestamp ASC, rowid ASC",
                (),
            )
            .await?;

        let mut movements = Vec::new();
        while let Some(row) = rows.next().await? {
            movements.push(parse_movement(&row)?);
        }
        Ok(movements)
    }

    async fn collect<E: Entity>(&self, sql: &str, values: Vec<Value>) -> Result<Vec<E>> {
        let mut rows = self.conn.query(sql, params_from_iter(values)).await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            entities.push(decode(&row.get::<String>(0)?)?);
        }
        Ok(entities)
    }

    async fn begin(&self) -> Result<()> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(())
    }

    async fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }
}

fn decode<E: Entity>(data: &str) -> Result<E> {
    Ok(serde_json::from_str(data)?)
}

fn to_value(value: IndexValue) -> Value {
    match value {
        IndexValue::Text(text) => Value::Text(text),
        IndexValue::Number(number) => Value::Real(number),
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Database(format!("invalid id in local store: {raw}")))
}

fn parse_movement(row: &libsql::Row) -> Result<StockMovement> {
    Ok(StockMovement {
        id: parse_id(&row.get::<String>(0)?)?,
        item_id: parse_id(&row.get::<String>(1)?)?,
        direction: row.get::<String>(2)?.parse()?,
        quantity: row.get(3)?,
        reason: row.get(4)?,
        timestamp: row.get(5)?,
        owner_id: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{
        ItemCategory, MovementDirection, NewItem, NewTask, Task, TaskStatus, TaskType,
    };
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn task(title: &str, day: u32, status: TaskStatus) -> Task {
        NewTask {
            title: title.to_string(),
            description: None,
            task_type: TaskType::Harvest,
            field: "Campo C".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 5, day).unwrap(),
            scheduled_time: "06:00".to_string(),
            status,
            owner_id: "user-1".to_string(),
        }
        .into_task()
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let t = task("Colheita", 1, TaskStatus::Pending);
        repo.upsert(&t).await.unwrap();
        repo.upsert(&t).await.unwrap(); // idempotent

        let fetched: Task = repo.get(&t.key()).await.unwrap().unwrap();
        assert_eq!(fetched, t);
        assert_eq!(repo.list::<Task>().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_by_index() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.upsert(&task("a", 1, TaskStatus::Pending)).await.unwrap();
        repo.upsert(&task("b", 1, TaskStatus::Completed)).await.unwrap();
        repo.upsert(&task("c", 2, TaskStatus::Pending)).await.unwrap();

        let pending: Vec<Task> = repo
            .list_by_index(Index::TaskStatus, TaskStatus::Pending.into())
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let first_day: Vec<Task> = repo
            .list_by_index(
                Index::TaskDate,
                NaiveDate::from_ymd_opt(2026, 5, 1).unwrap().into(),
            )
            .await
            .unwrap();
        assert_eq!(first_day.len(), 2);

        let wrong = repo
            .list_by_index::<Task>(Index::InventoryCategory, "seeds".into())
            .await;
        assert!(wrong.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tracked_writes_append_to_queue() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let t = task("Plantio", 3, TaskStatus::Pending);
        repo.put_tracked(&t, OperationKind::Create).await.unwrap();
        repo.delete_tracked(Collection::Tasks, &t.key(), t.owner())
            .await
            .unwrap();

        let queue = repo.pending_operations().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|op| op.owner_id == "user-1"));
        assert_eq!(queue[0].kind, OperationKind::Create);
        assert_eq!(queue[1].kind, OperationKind::Delete);
        assert!(queue[0].sequence < queue[1].sequence);
        assert_eq!(queue[1].entity_id(), Some(t.key().as_str()));
        assert!(repo.get::<Task>(&t.key()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_is_noop() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        assert!(!repo.remove(Collection::Fields, "missing").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_tracked_write_rolls_back_entity() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        db.connection()
            .execute("DROP TABLE pending_operations", ())
            .await
            .unwrap();

        let t = task("Rega", 4, TaskStatus::Pending);
        assert!(repo.put_tracked(&t, OperationKind::Create).await.is_err());
        assert!(repo.get::<Task>(&t.key()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_acknowledge_removes_only_given_entries() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let first = repo
            .put_tracked(&task("a", 1, TaskStatus::Pending), OperationKind::Create)
            .await
            .unwrap();
        repo.put_tracked(&task("b", 1, TaskStatus::Pending), OperationKind::Create)
            .await
            .unwrap();

        assert_eq!(repo.acknowledge(&[first.id]).await.unwrap(), 1);
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_for_owner_skips_other_users() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let mine = repo
            .put_tracked(&task("minha", 1, TaskStatus::Pending), OperationKind::Create)
            .await
            .unwrap();
        let theirs = Task {
            owner_id: "user-2".to_string(),
            ..task("alheia", 1, TaskStatus::Pending)
        };
        repo.put_tracked(&theirs, OperationKind::Create).await.unwrap();
        let unassigned = repo
            .delete_tracked(Collection::Fields, "f1", "")
            .await
            .unwrap();

        let queue = repo.pending_operations_for("user-1").await.unwrap();
        assert_eq!(queue, vec![mine, unassigned]);
        assert_eq!(repo.pending_count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_movements_cascade_with_item() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        let item = NewItem {
            name: "Adubo Composto".to_string(),
            category: ItemCategory::Fertilizer,
            quantity: 12.0,
            unit: "sacos 50kg".to_string(),
            unit_price: 18.5,
            supplier: None,
            expiry_date: None,
            min_stock: 8.0,
            owner_id: "user-1".to_string(),
        }
        .into_item()
        .unwrap();
        repo.put_tracked(&item, OperationKind::Create).await.unwrap();

        let movement = StockMovement::new(item.id, MovementDirection::In, 2.0, "compra", "user-1");
        repo.record_movement(&item, &movement).await.unwrap();
        assert_eq!(repo.list_movements().await.unwrap(), vec![movement]);

        repo.delete_item_cascade(&item.id, "user-1").await.unwrap();
        assert!(repo.list_movements().await.unwrap().is_empty());
        assert_eq!(repo.pending_count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_collection_overwrites_without_queueing() {
        let db = setup().await;
        let repo = LibSqlEntityRepository::new(db.connection());

        repo.upsert(&task("old", 1, TaskStatus::Pending)).await.unwrap();
        let fresh = vec![
            task("new-1", 2, TaskStatus::Pending),
            task("new-2", 3, TaskStatus::Completed),
        ];
        repo.replace_collection(&fresh).await.unwrap();

        let stored = repo.list::<Task>().await.unwrap();
        assert_eq!(stored, fresh);
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }
}
