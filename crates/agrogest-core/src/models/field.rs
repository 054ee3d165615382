//! Field (parcel) model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::id::{entity_id, string_enum};
use super::{Collection, Entity, IndexValue};

entity_id!(
    /// A unique identifier for a field
    FieldId
);

string_enum!(
    /// Kind of cultivated parcel
    FieldType {
        OpenField => "open_field",
        Greenhouse => "greenhouse",
        Vineyard => "vineyard",
        OliveGrove => "olive_grove",
        Orchard => "orchard",
        Other => "other",
    }
);

string_enum!(
    /// Dominant soil composition
    SoilType {
        Sandy => "sandy",
        Clayey => "clayey",
        Loamy => "loamy",
        Mixed => "mixed",
        Other => "other",
    }
);

/// Geographic position of a field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A managed parcel of land
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub field_type: FieldType,
    pub soil_type: SoilType,
    /// Area in hectares
    pub area_ha: f64,
    pub irrigation_capacity: f64,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft delete flag
    pub active: bool,
    pub owner_id: String,
}

/// Caller-supplied fields for a new field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewField {
    pub name: String,
    pub description: String,
    pub field_type: FieldType,
    pub soil_type: SoilType,
    pub area_ha: f64,
    pub irrigation_capacity: f64,
    pub notes: String,
    pub coordinates: Option<Coordinates>,
    pub owner_id: String,
}

/// Partial update merged into an existing field.
///
/// `coordinates: None` keeps whatever coordinates the field already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub field_type: Option<FieldType>,
    pub soil_type: Option<SoilType>,
    pub area_ha: Option<f64>,
    pub irrigation_capacity: Option<f64>,
    pub notes: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub active: Option<bool>,
}

impl NewField {
    /// Validate and stamp the field as active with a fresh id.
    pub fn into_field(self) -> Result<Field> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("field name cannot be empty".into()));
        }
        if !self.area_ha.is_finite() || self.area_ha < 0.0 {
            return Err(Error::InvalidInput(
                "area must be a non-negative number of hectares".into(),
            ));
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Field {
            id: FieldId::new(),
            name,
            description: self.description.trim().to_string(),
            field_type: self.field_type,
            soil_type: self.soil_type,
            area_ha: self.area_ha,
            irrigation_capacity: self.irrigation_capacity,
            notes: self.notes.trim().to_string(),
            coordinates: self.coordinates,
            created_at: now,
            updated_at: now,
            active: true,
            owner_id: self.owner_id,
        })
    }
}

impl FieldPatch {
    /// Patch that only flips the active flag
    #[must_use]
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Self::default()
        }
    }
}

impl Field {
    /// Return a copy with the patch applied and `updated_at` bumped.
    pub fn patched(&self, patch: FieldPatch) -> Result<Self> {
        let mut field = self.clone();
        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::InvalidInput("field name cannot be empty".into()));
            }
            field.name = name;
        }
        if let Some(description) = patch.description {
            field.description = description.trim().to_string();
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(soil_type) = patch.soil_type {
            field.soil_type = soil_type;
        }
        if let Some(area_ha) = patch.area_ha {
            field.area_ha = area_ha;
        }
        if let Some(capacity) = patch.irrigation_capacity {
            field.irrigation_capacity = capacity;
        }
        if let Some(notes) = patch.notes {
            field.notes = notes.trim().to_string();
        }
        if patch.coordinates.is_some() {
            field.coordinates = patch.coordinates;
        }
        if let Some(active) = patch.active {
            field.active = active;
        }
        field.updated_at = crate::util::next_timestamp(self.updated_at);
        Ok(field)
    }

    /// Case-insensitive match over the searchable text of the field
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [
            self.name.as_str(),
            self.description.as_str(),
            self.notes.as_str(),
            self.field_type.as_str(),
            self.soil_type.as_str(),
        ]
        .iter()
        .any(|text| text.to_lowercase().contains(&term))
    }
}

impl Entity for Field {
    const COLLECTION: Collection = Collection::Fields;

    fn key(&self) -> String {
        self.id.as_str()
    }

    fn owner(&self) -> &str {
        &self.owner_id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![IndexValue::Number(if self.active { 1.0 } else { 0.0 })]
    }
}
