use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, DomainResult, Entity, display_number, typed_id};

typed_id!(MaterialId);

/// Material category; decides the internal-code prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialCategory {
    Supplied,
    Cardboard,
    Part,
    Good,
    Administrative,
    Pallet,
    #[default]
    Undefined,
}

impl MaterialCategory {
    pub fn code_prefix(self) -> &'static str {
        match self {
            MaterialCategory::Supplied => "TED-",
            MaterialCategory::Cardboard => "KAR-",
            MaterialCategory::Part => "PAR-",
            MaterialCategory::Good => "SAT-",
            MaterialCategory::Administrative => "IDA-",
            MaterialCategory::Pallet => "PLT-",
            MaterialCategory::Undefined => "UND-",
        }
    }
}

const INTERNAL_CODE_WIDTH: usize = 14;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub category: MaterialCategory,
    pub description: String,
}

/// Identity and category of a stockable item. Owns no quantity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    id: MaterialId,
    name: String,
    category: MaterialCategory,
    internal_code: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
    deleted: bool,
}

impl Material {
    pub fn register(id: MaterialId, input: NewMaterial, created_at: DateTime<Utc>) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::field("name", "is required"));
        }
        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            category: input.category,
            internal_code: None,
            description: input.description,
            created_at,
            deleted: false,
        })
    }

    /// One-time assignment once the store has handed out a serial.
    ///
    /// A second call keeps the existing code.
    pub fn assign_internal_code(&mut self, year: i32, serial: u64) -> &str {
        let prefix = self.category.code_prefix();
        self.internal_code
            .get_or_insert_with(|| display_number(prefix, year, serial, INTERNAL_CODE_WIDTH))
    }

    pub fn id_typed(&self) -> MaterialId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> MaterialCategory {
        self.category
    }

    pub fn internal_code(&self) -> Option<&str> {
        self.internal_code.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
