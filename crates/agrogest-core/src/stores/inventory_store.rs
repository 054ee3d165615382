use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::models::{
    InventoryItem, ItemCategory, ItemId, ItemPatch, MovementDirection, NewItem, StockMovement,
};
use crate::services::LocalStore;
use crate::{Error, Result};

use super::{logged, resolve_owner, Records, SessionStore};

/// Farm supplies with their stock movement history
#[derive(Clone)]
pub struct InventoryStore {
    records: Records<InventoryItem>,
    movements: Arc<RwLock<Vec<StockMovement>>>,
    session: SessionStore,
}

impl InventoryStore {
    pub async fn load(local: LocalStore, session: SessionStore) -> Result<Self> {
        let movements = logged(local.all_movements().await, "load")?;
        Ok(Self {
            records: Records::load(local).await?,
            movements: Arc::new(RwLock::new(movements)),
            session,
        })
    }

    pub async fn add(&self, mut new_item: NewItem) -> Result<InventoryItem> {
        new_item.owner_id = resolve_owner(new_item.owner_id, &self.session).await;
        let item = self.records.insert(new_item.into_item()?).await?;
        tracing::debug!("Created inventory item {} ({})", item.id, item.name);
        Ok(item)
    }

    /// Merge `patch` into the item. Quantity is not guarded here, only in
    /// [`Self::remove_stock`].
    pub async fn update(&self, id: &ItemId, patch: ItemPatch) -> Result<Option<InventoryItem>> {
        self.records
            .modify(&id.as_str(), |item| item.patched(patch))
            .await
    }

    /// Delete the item together with its movements.
    pub async fn remove(&self, id: &ItemId) -> Result<bool> {
        let mut items = self.records.write().await;
        let Some(position) = items.iter().position(|item| item.id == *id) else {
            return Ok(false);
        };

        logged(
            self.records
                .local
                .delete_item_cascade(id, &items[position].owner_id)
                .await,
            "delete",
        )?;
        items.remove(position);
        self.movements
            .write()
            .await
            .retain(|movement| movement.item_id != *id);
        Ok(true)
    }

    pub async fn get(&self, id: &ItemId) -> Option<InventoryItem> {
        self.records.find(&id.as_str()).await
    }

    pub async fn all(&self) -> Vec<InventoryItem> {
        self.records.snapshot().await
    }

    pub async fn by_category(&self, category: ItemCategory) -> Vec<InventoryItem> {
        self.records.filter(|item| item.category == category).await
    }

    /// Receive stock and log the movement
    pub async fn add_stock(
        &self,
        id: &ItemId,
        quantity: f64,
        reason: &str,
    ) -> Result<InventoryItem> {
        self.adjust(id, MovementDirection::In, quantity, reason).await
    }

    /// Consume stock and log the movement.
    ///
    /// Fails with [`Error::InsufficientStock`] when more is requested than is
    /// on hand; nothing is written in that case.
    pub async fn remove_stock(
        &self,
        id: &ItemId,
        quantity: f64,
        reason: &str,
    ) -> Result<InventoryItem> {
        self.adjust(id, MovementDirection::Out, quantity, reason).await
    }

    async fn adjust(
        &self,
        id: &ItemId,
        direction: MovementDirection,
        quantity: f64,
        reason: &str,
    ) -> Result<InventoryItem> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(Error::InvalidInput(
                "stock quantity must be a positive number".into(),
            ));
        }

        let mut items = self.records.write().await;
        let position = items
            .iter()
            .position(|item| item.id == *id)
            .ok_or_else(|| Error::NotFound(format!("inventory item {id}")))?;
        let current = &items[position];

        let mut updated = current.clone();
        updated.quantity = match direction {
            MovementDirection::In => current.quantity + quantity,
            MovementDirection::Out if quantity > current.quantity => {
                return Err(Error::InsufficientStock {
                    item: current.name.clone(),
                    requested: quantity,
                    available: current.quantity,
                });
            }
            MovementDirection::Out => current.quantity - quantity,
        };
        updated.updated_at = crate::util::next_timestamp(current.updated_at);

        let movement = StockMovement::new(
            updated.id,
            direction,
            quantity,
            reason,
            updated.owner_id.clone(),
        );
        logged(
            self.records
                .local
                .append_movement_with_item(&updated, &movement)
                .await,
            "stock movement",
        )?;

        tracing::debug!(
            "Stock {direction} {quantity} {} for {} (now {})",
            updated.unit,
            updated.name,
            updated.quantity
        );
        items[position] = updated.clone();
        self.movements.write().await.push(movement);
        Ok(updated)
    }

    /// Items at or below their minimum stock
    pub async fn low_stock(&self) -> Vec<InventoryItem> {
        self.records.filter(InventoryItem::is_low_stock).await
    }

    /// Sum of quantity times unit price over all items
    pub async fn total_value(&self) -> f64 {
        self.records
            .entries
            .read()
            .await
            .iter()
            .map(InventoryItem::stock_value)
            .sum()
    }

    /// Movements of one item, newest first
    pub async fn movements_for(&self, id: &ItemId) -> Vec<StockMovement> {
        let mut movements: Vec<_> = self
            .movements
            .read()
            .await
            .iter()
            .filter(|movement| movement.item_id == *id)
            .cloned()
            .collect();
        movements.reverse();
        movements
    }

    /// Items that expire within `days` of `today`, already-expired ones excluded
    pub async fn expiring_within(&self, days: i64, today: NaiveDate) -> Vec<InventoryItem> {
        self.records
            .filter(|item| {
                item.days_until_expiry(today)
                    .is_some_and(|left| (0..=days).contains(&left))
            })
            .await
    }

    /// Drop every item and movement locally without queueing deletes.
    pub async fn clear(&self) -> Result<()> {
        self.records.replace_all(Vec::new()).await?;
        self.movements.write().await.clear();
        Ok(())
    }

    /// Overwrite the items with remote data; movements of vanished items go too.
    pub async fn replace_all(&self, items: Vec<InventoryItem>) -> Result<()> {
        self.records.replace_all(items).await?;
        self.prune_movements().await;
        Ok(())
    }

    /// Refresh from the remote, keeping items that have unsynced changes.
    pub async fn apply_remote(&self, items: Vec<InventoryItem>, user: &str) -> Result<usize> {
        let pulled = self.records.apply_remote(items, user).await?;
        self.prune_movements().await;
        Ok(pulled)
    }

    async fn prune_movements(&self) {
        let items = self.records.entries.read().await;
        self.movements
            .write()
            .await
            .retain(|movement| items.iter().any(|item| item.id == movement.item_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> (LocalStore, InventoryStore) {
        let local = LocalStore::open_in_memory().await.unwrap();
        let session = SessionStore::load(local.clone(), false).await.unwrap();
        let store = InventoryStore::load(local.clone(), session).await.unwrap();
        (local, store)
    }

    fn seeds(quantity: f64, min_stock: f64) -> NewItem {
        NewItem {
            name: "Sementes de Milho".to_string(),
            category: ItemCategory::Seeds,
            quantity,
            unit: "kg".to_string(),
            unit_price: 4.5,
            supplier: Some("AgroSul".to_string()),
            expiry_date: None,
            min_stock,
            owner_id: "user-1".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_stock_beyond_quantity_changes_nothing() {
        let (local, store) = setup().await;
        let item = store.add(seeds(5.0, 1.0)).await.unwrap();

        let error = store.remove_stock(&item.id, 6.0, "sementeira").await.unwrap_err();
        assert!(matches!(
            error,
            Error::InsufficientStock {
                requested,
                available,
                ..
            } if requested == 6.0 && available == 5.0
        ));
        assert_eq!(store.get(&item.id).await.unwrap().quantity, 5.0);
        assert!(store.movements_for(&item.id).await.is_empty());
        assert!(local.movements_for_item(&item.id).await.unwrap().is_empty());
        assert_eq!(local.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_then_add_restores_quantity() {
        let (local, store) = setup().await;
        let item = store.add(seeds(10.0, 2.0)).await.unwrap();

        store.remove_stock(&item.id, 3.0, "sementeira").await.unwrap();
        let restored = store.add_stock(&item.id, 3.0, "devolução").await.unwrap();
        assert_eq!(restored.quantity, 10.0);

        let history = store.movements_for(&item.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].direction, MovementDirection::In);
        assert_eq!(history[1].direction, MovementDirection::Out);
        assert_eq!(local.movements_for_item(&item.id).await.unwrap(), history);

        let persisted: InventoryItem = local.get(&item.id.as_str()).await.unwrap().unwrap();
        assert_eq!(persisted.quantity, 10.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_low_stock_boundary_is_inclusive() {
        let (_, store) = setup().await;
        let item = store.add(seeds(10.0, 10.0)).await.unwrap();
        assert_eq!(store.low_stock().await, vec![item.clone()]);

        let topped = store.add_stock(&item.id, 1.0, "compra").await.unwrap();
        assert_eq!(topped.quantity, 11.0);
        assert!(store.low_stock().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_stock_quantities() {
        let (_, store) = setup().await;
        let item = store.add(seeds(1.0, 0.0)).await.unwrap();

        assert!(matches!(
            store.add_stock(&item.id, 0.0, "x").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.remove_stock(&item.id, -1.0, "x").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.add_stock(&ItemId::new(), 1.0, "x").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_cascades_movements() {
        let (local, store) = setup().await;
        let item = store.add(seeds(4.0, 1.0)).await.unwrap();
        store.add_stock(&item.id, 1.0, "compra").await.unwrap();

        assert!(store.remove(&item.id).await.unwrap());
        assert!(!store.remove(&item.id).await.unwrap());
        assert!(store.movements_for(&item.id).await.is_empty());
        assert!(local.all_movements().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_total_value_and_expiry() {
        let (_, store) = setup().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        let mut soon = seeds(2.0, 0.0);
        soon.expiry_date = today.checked_add_days(chrono::Days::new(30));
        let soon = store.add(soon).await.unwrap();

        let mut expired = seeds(2.0, 0.0);
        expired.expiry_date = today.checked_sub_days(chrono::Days::new(1));
        store.add(expired).await.unwrap();

        let mut fuel = seeds(100.0, 0.0);
        fuel.category = ItemCategory::Fuel;
        fuel.unit_price = 1.5;
        store.add(fuel).await.unwrap();

        assert_eq!(store.total_value().await, 2.0 * 4.5 * 2.0 + 150.0);
        assert_eq!(store.expiring_within(30, today).await, vec![soon]);
        assert_eq!(store.by_category(ItemCategory::Fuel).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_movements_survive_reload() {
        let (local, store) = setup().await;
        let item = store.add(seeds(4.0, 1.0)).await.unwrap();
        store.remove_stock(&item.id, 1.5, "plantação").await.unwrap();

        let session = SessionStore::load(local.clone(), false).await.unwrap();
        let reloaded = InventoryStore::load(local, session).await.unwrap();
        assert_eq!(reloaded.get(&item.id).await.unwrap().quantity, 2.5);
        assert_eq!(reloaded.movements_for(&item.id).await.len(), 1);
    }
}
