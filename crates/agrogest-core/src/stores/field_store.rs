use crate::models::{Field, FieldId, FieldPatch, NewField};
use crate::services::LocalStore;
use crate::Result;

use super::{resolve_owner, Records, SessionStore};

/// Plots of land worked by the farm
#[derive(Clone)]
pub struct FieldStore {
    records: Records<Field>,
    session: SessionStore,
}

impl FieldStore {
    pub async fn load(local: LocalStore, session: SessionStore) -> Result<Self> {
        Ok(Self {
            records: Records::load(local).await?,
            session,
        })
    }

    /// Register a field; new fields start active.
    pub async fn add(&self, mut new_field: NewField) -> Result<Field> {
        new_field.owner_id = resolve_owner(new_field.owner_id, &self.session).await;
        self.records.insert(new_field.into_field()?).await
    }

    pub async fn update(&self, id: &FieldId, patch: FieldPatch) -> Result<Option<Field>> {
        self.records
            .modify(&id.as_str(), |field| field.patched(patch))
            .await
    }

    /// Hard delete
    pub async fn remove(&self, id: &FieldId) -> Result<bool> {
        self.records.remove(&id.as_str()).await
    }

    /// Soft delete
    pub async fn deactivate(&self, id: &FieldId) -> Result<Option<Field>> {
        self.update(id, FieldPatch::active(false)).await
    }

    pub async fn toggle_active(&self, id: &FieldId) -> Result<Option<Field>> {
        self.records
            .modify(&id.as_str(), |field| {
                field.patched(FieldPatch::active(!field.active))
            })
            .await
    }

    pub async fn get(&self, id: &FieldId) -> Option<Field> {
        self.records.find(&id.as_str()).await
    }

    pub async fn all(&self) -> Vec<Field> {
        self.records.snapshot().await
    }

    pub async fn active(&self) -> Vec<Field> {
        self.by_active(true).await
    }

    pub async fn by_active(&self, active: bool) -> Vec<Field> {
        self.records.filter(|field| field.active == active).await
    }

    /// Case-insensitive search; an empty term returns every field.
    pub async fn search(&self, term: &str) -> Vec<Field> {
        self.records.filter(|field| field.matches(term)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.records.replace_all(Vec::new()).await
    }

    pub async fn replace_all(&self, fields: Vec<Field>) -> Result<()> {
        self.records.replace_all(fields).await
    }

    /// Refresh from the remote, keeping fields that have unsynced changes.
    pub async fn apply_remote(&self, fields: Vec<Field>, user: &str) -> Result<usize> {
        self.records.apply_remote(fields, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, FieldType, SoilType};
    use pretty_assertions::assert_eq;

    async fn setup() -> (LocalStore, FieldStore) {
        let local = LocalStore::open_in_memory().await.unwrap();
        let session = SessionStore::load(local.clone(), false).await.unwrap();
        let store = FieldStore::load(local.clone(), session).await.unwrap();
        (local, store)
    }

    fn olive_grove() -> NewField {
        NewField {
            name: "Olival Velho".to_string(),
            description: "Encosta virada a sul".to_string(),
            field_type: FieldType::OliveGrove,
            soil_type: SoilType::Clayey,
            area_ha: 3.2,
            irrigation_capacity: 1_200.0,
            notes: "Poda em fevereiro".to_string(),
            coordinates: Some(Coordinates {
                lat: 38.57,
                lng: -7.91,
            }),
            owner_id: "user-1".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_starts_active() {
        let (_, store) = setup().await;
        let field = store.add(olive_grove()).await.unwrap();
        assert!(field.active);
        assert_eq!(store.active().await, vec![field]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_toggle_and_deactivate() {
        let (local, store) = setup().await;
        let field = store.add(olive_grove()).await.unwrap();

        let off = store.toggle_active(&field.id).await.unwrap().unwrap();
        assert!(!off.active);
        let on = store.toggle_active(&field.id).await.unwrap().unwrap();
        assert!(on.active);
        store.deactivate(&field.id).await.unwrap();

        assert!(store.active().await.is_empty());
        assert_eq!(store.by_active(false).await.len(), 1);
        assert_eq!(local.pending_count().await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_without_coordinates_keeps_them() {
        let (_, store) = setup().await;
        let field = store.add(olive_grove()).await.unwrap();

        let patch = FieldPatch {
            area_ha: Some(3.5),
            ..FieldPatch::default()
        };
        let updated = store.update(&field.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.area_ha, 3.5);
        assert_eq!(updated.coordinates, field.coordinates);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_is_case_insensitive() {
        let (_, store) = setup().await;
        store.add(olive_grove()).await.unwrap();
        let mut greenhouse = olive_grove();
        greenhouse.name = "Estufa 2".to_string();
        greenhouse.field_type = FieldType::Greenhouse;
        greenhouse.notes = String::new();
        greenhouse.description = String::new();
        store.add(greenhouse).await.unwrap();

        assert_eq!(store.search("OLIVAL").await.len(), 1);
        assert_eq!(store.search("fevereiro").await.len(), 1);
        assert_eq!(store.search("greenhouse").await.len(), 1);
        assert_eq!(store.search("  ").await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hard_delete() {
        let (local, store) = setup().await;
        let field = store.add(olive_grove()).await.unwrap();
        assert!(store.remove(&field.id).await.unwrap());
        assert!(store.all().await.is_empty());
        assert!(local.get::<Field>(&field.id.as_str()).await.unwrap().is_none());
    }
}
