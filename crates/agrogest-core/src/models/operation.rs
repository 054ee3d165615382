//! Pending-operation queue record

use serde::{Deserialize, Serialize};

use super::id::{entity_id, string_enum};
use super::Collection;

entity_id!(
    /// A unique identifier for a queued operation
    OperationId
);

string_enum!(
    /// Kind of local mutation awaiting sync
    OperationKind {
        Create => "create",
        Update => "update",
        Delete => "delete",
    }
);

/// A local mutation not yet acknowledged by the remote backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    /// Local enqueue order, assigned by the store
    pub sequence: i64,
    pub kind: OperationKind,
    pub collection: Collection,
    /// Full entity document, or `{"id": ...}` for deletes
    pub payload: serde_json::Value,
    /// Unix ms
    pub enqueued_at: i64,
    /// User whose change this is, empty when made while signed out
    #[serde(default)]
    pub owner_id: String,
}

impl PendingOperation {
    /// Entity id the operation targets, read from the payload.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_reads_payload() {
        let op = PendingOperation {
            id: OperationId::new(),
            sequence: 1,
            kind: OperationKind::Delete,
            collection: Collection::Tasks,
            payload: serde_json::json!({ "id": "abc" }),
            enqueued_at: 0,
            owner_id: "user-1".to_string(),
        };
        assert_eq!(op.entity_id(), Some("abc"));
    }
}
