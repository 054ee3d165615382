//! Data models for AgroGest

mod field;
mod id;
mod inventory;
mod operation;
mod session;
mod task;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) use id::string_enum;

pub use field::{Coordinates, Field, FieldId, FieldPatch, FieldType, NewField, SoilType};
pub use inventory::{
    InventoryItem, ItemCategory, ItemId, ItemPatch, MovementDirection, MovementId, NewItem,
    StockMovement,
};
pub use operation::{OperationId, OperationKind, PendingOperation};
pub use session::{AppSession, PersistedSession, User};
pub use task::{NewTask, Task, TaskId, TaskPatch, TaskStatus, TaskType};

id::string_enum!(
    /// Synchronized entity collections
    Collection {
        Tasks => "tasks",
        Inventory => "inventory",
        Fields => "fields",
    }
);

impl Collection {
    /// Local table holding the collection
    #[must_use]
    pub const fn table(self) -> &'static str {
        self.as_str()
    }

    /// Indexed columns stored next to the JSON document, in the order
    /// returned by [`Entity::index_values`].
    #[must_use]
    pub const fn index_columns(self) -> &'static [&'static str] {
        match self {
            Self::Tasks => &["status", "scheduled_date", "field"],
            Self::Inventory => &["category", "quantity"],
            Self::Fields => &["active"],
        }
    }

    /// Domain field the remote backend orders listings by
    #[must_use]
    pub const fn order_field(self) -> &'static str {
        match self {
            Self::Tasks => "scheduled_date",
            Self::Inventory | Self::Fields => "name",
        }
    }
}

id::string_enum!(
    /// Secondary lookups supported by the local store
    Index {
        TaskStatus => "by-status",
        TaskDate => "by-date",
        TaskField => "by-field",
        InventoryCategory => "by-category",
        InventoryQuantity => "by-quantity",
    }
);

impl Index {
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::TaskStatus | Self::TaskDate | Self::TaskField => Collection::Tasks,
            Self::InventoryCategory | Self::InventoryQuantity => Collection::Inventory,
        }
    }

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::TaskStatus => "status",
            Self::TaskDate => "scheduled_date",
            Self::TaskField => "field",
            Self::InventoryCategory => "category",
            Self::InventoryQuantity => "quantity",
        }
    }
}

/// Value of an indexed column
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Text(String),
    Number(f64),
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<TaskStatus> for IndexValue {
    fn from(value: TaskStatus) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<ItemCategory> for IndexValue {
    fn from(value: ItemCategory) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<chrono::NaiveDate> for IndexValue {
    fn from(value: chrono::NaiveDate) -> Self {
        Self::Text(value.to_string())
    }
}

/// A record the local store can persist in one of the synced collections
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entity lives in
    const COLLECTION: Collection;

    /// Primary key
    fn key(&self) -> String;

    /// Id of the user the record belongs to, empty when unassigned
    fn owner(&self) -> &str;

    /// Values for [`Collection::index_columns`], same order
    fn index_values(&self) -> Vec<IndexValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_columns_cover_every_index() {
        for index in Index::ALL {
            assert!(index
                .collection()
                .index_columns()
                .contains(&index.column()));
        }
    }

    #[test]
    fn test_index_parse() {
        assert_eq!("by-date".parse::<Index>().unwrap(), Index::TaskDate);
        assert!("by-color".parse::<Index>().is_err());
    }
}
