//! Inventory item and stock movement models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::id::{entity_id, string_enum};
use super::{Collection, Entity, IndexValue};

entity_id!(
    /// A unique identifier for an inventory item
    ItemId
);

entity_id!(
    /// A unique identifier for a stock movement
    MovementId
);

string_enum!(
    /// Inventory category
    ItemCategory {
        Seeds => "seeds",
        Fertilizer => "fertilizer",
        Pesticide => "pesticide",
        Fuel => "fuel",
    }
);

string_enum!(
    /// Whether a movement added or removed stock
    MovementDirection {
        In => "in",
        Out => "out",
    }
);

/// A stocked consumable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub category: ItemCategory,
    /// Quantity on hand, in `unit`
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    /// Threshold at or below which the item counts as low stock
    pub min_stock: f64,
    pub created_at: i64,
    pub updated_at: i64,
    pub owner_id: String,
}

/// Caller-supplied fields for a new item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: ItemCategory,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub min_stock: f64,
    pub owner_id: String,
}

/// Partial update merged into an existing item.
///
/// Direct quantity updates are not guarded against negative values; only
/// stock removal is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<ItemCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub unit_price: Option<f64>,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub min_stock: Option<f64>,
}

/// Append-only audit record of a stock change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub direction: MovementDirection,
    pub quantity: f64,
    pub reason: String,
    /// Unix ms
    pub timestamp: i64,
    pub owner_id: String,
}

impl NewItem {
    /// Validate and stamp the item with a fresh id and timestamps.
    pub fn into_item(self) -> Result<InventoryItem> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("item name cannot be empty".into()));
        }
        for (label, value) in [
            ("quantity", self.quantity),
            ("unit price", self.unit_price),
            ("minimum stock", self.min_stock),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{label} must be a non-negative number"
                )));
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(InventoryItem {
            id: ItemId::new(),
            name,
            category: self.category,
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            unit_price: self.unit_price,
            supplier: crate::util::normalize_text_option(self.supplier),
            expiry_date: self.expiry_date,
            min_stock: self.min_stock,
            created_at: now,
            updated_at: now,
            owner_id: self.owner_id,
        })
    }
}

impl InventoryItem {
    /// Quantity at or below the configured minimum
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    /// Quantity times unit price
    #[must_use]
    pub fn stock_value(&self) -> f64 {
        self.quantity * self.unit_price
    }

    /// Return a copy with the patch applied and `updated_at` bumped.
    pub fn patched(&self, patch: ItemPatch) -> Result<Self> {
        let mut item = self.clone();
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::InvalidInput("item name cannot be empty".into()));
            }
            item.name = name;
        }
        if let Some(category) = patch.category {
            item.category = category;
        }
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = patch.unit {
            item.unit = unit.trim().to_string();
        }
        if let Some(unit_price) = patch.unit_price {
            item.unit_price = unit_price;
        }
        if let Some(supplier) = patch.supplier {
            item.supplier = crate::util::normalize_text_option(Some(supplier));
        }
        if let Some(expiry_date) = patch.expiry_date {
            item.expiry_date = Some(expiry_date);
        }
        if let Some(min_stock) = patch.min_stock {
            item.min_stock = min_stock;
        }
        item.updated_at = crate::util::next_timestamp(self.updated_at);
        Ok(item)
    }

    /// Days until expiry relative to `today`; negative once expired.
    #[must_use]
    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date
            .map(|expiry| expiry.signed_duration_since(today).num_days())
    }
}

impl StockMovement {
    /// Create a movement stamped with the current time
    #[must_use]
    pub fn new(
        item_id: ItemId,
        direction: MovementDirection,
        quantity: f64,
        reason: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            item_id,
            direction,
            quantity,
            reason: reason.into().trim().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            owner_id: owner_id.into(),
        }
    }
}

impl Entity for InventoryItem {
    const COLLECTION: Collection = Collection::Inventory;

    fn key(&self) -> String {
        self.id.as_str()
    }

    fn owner(&self) -> &str {
        &self.owner_id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![
            IndexValue::Text(self.category.as_str().to_string()),
            IndexValue::Number(self.quantity),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(quantity: f64, min_stock: f64) -> InventoryItem {
        NewItem {
            name: "Sementes de Milho".to_string(),
            category: ItemCategory::Seeds,
            quantity,
            unit: "kg".to_string(),
            unit_price: 4.5,
            supplier: Some("Agrosementes Lda".to_string()),
            expiry_date: None,
            min_stock,
            owner_id: "user-1".to_string(),
        }
        .into_item()
        .unwrap()
    }

    #[test]
    fn test_low_stock_boundary_is_inclusive() {
        assert!(seeds(10.0, 10.0).is_low_stock());
        assert!(!seeds(11.0, 10.0).is_low_stock());
    }

    #[test]
    fn test_stock_value() {
        let item = seeds(25.0, 10.0);
        assert!((item.stock_value() - 112.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_into_item_rejects_negative_quantity() {
        let result = NewItem {
            name: "Gasóleo".to_string(),
            category: ItemCategory::Fuel,
            quantity: -1.0,
            unit: "l".to_string(),
            unit_price: 0.85,
            supplier: None,
            expiry_date: None,
            min_stock: 50.0,
            owner_id: String::new(),
        }
        .into_item();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_patch_allows_direct_quantity_below_zero() {
        let item = seeds(5.0, 1.0);
        let patched = item
            .patched(ItemPatch {
                quantity: Some(-3.0),
                ..ItemPatch::default()
            })
            .unwrap();
        assert!((patched.quantity + 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_days_until_expiry() {
        let mut item = seeds(1.0, 1.0);
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(item.days_until_expiry(today), None);
        item.expiry_date = NaiveDate::from_ymd_opt(2026, 1, 31);
        assert_eq!(item.days_until_expiry(today), Some(30));
    }
}
