use serde::{Deserialize, Serialize};

use stockwise_core::{DomainResult, Entity, ValidationErrors, typed_id};

typed_id!(LocationId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facility {
    #[default]
    Esenyurt,
}

/// What a location is used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    IndustrialShelf,
    ExitTransit,
    InjectionTransit,
    ManufacturingTransit,
    ResinStorage,
    Masterbatch,
    Chemical,
    #[default]
    Unlabeled,
    Temporary,
}

/// Complete physical address of a slot. Unique among live locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationAddress {
    pub facility: Facility,
    pub area: i32,
    pub section: i32,
    pub shelf: i32,
    pub bin: i32,
}

impl LocationAddress {
    /// Display code: area letter, section, shelf (`Z` for ground level), bin.
    ///
    /// `area = 2, section = 1, shelf = 0, bin = 5` gives `B1-Z-P5`.
    pub fn name(&self) -> String {
        InventoryLocation::generate_name(self.area, self.section, self.shelf, self.bin)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub facility: Facility,
    pub area: Option<i32>,
    pub section: Option<i32>,
    pub shelf: Option<i32>,
    pub bin: Option<i32>,
    pub location_type: LocationType,
    pub width_cm: Option<u32>,
    pub height_cm: Option<u32>,
    pub depth_cm: Option<u32>,
}

/// Physical slot stock is kept in.
///
/// The name is a cache of the address tuple, recomputed on every change; it
/// stays empty while the tuple is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLocation {
    id: LocationId,
    name: String,
    facility: Facility,
    area: Option<i32>,
    section: Option<i32>,
    shelf: Option<i32>,
    bin: Option<i32>,
    location_type: LocationType,
    width_cm: Option<u32>,
    height_cm: Option<u32>,
    depth_cm: Option<u32>,
    deleted: bool,
}

impl InventoryLocation {
    pub fn generate_name(area: i32, section: i32, shelf: i32, bin: i32) -> String {
        let area = u8::try_from(area)
            .ok()
            .filter(|a| (1..=26).contains(a))
            .map(|a| char::from(b'A' + a - 1))
            .unwrap_or('X');
        let shelf = if shelf == 0 {
            "Z".to_string()
        } else {
            format!("R{shelf}")
        };
        format!("{area}{section}-{shelf}-P{bin}")
    }

    /// Name for a possibly incomplete tuple; empty unless every part is set.
    pub fn generate_name_opt(
        area: Option<i32>,
        section: Option<i32>,
        shelf: Option<i32>,
        bin: Option<i32>,
    ) -> String {
        match (area, section, shelf, bin) {
            (Some(a), Some(s), Some(sh), Some(b)) => Self::generate_name(a, s, sh, b),
            _ => String::new(),
        }
    }

    pub fn create(id: LocationId, input: NewLocation) -> DomainResult<Self> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("area", input.area),
            ("section", input.section),
            ("shelf", input.shelf),
            ("bin", input.bin),
        ] {
            if value.is_some_and(|v| v < 0) {
                errors.push(field, "must not be negative");
            }
        }
        errors.into_result()?;

        Ok(Self {
            id,
            name: Self::generate_name_opt(input.area, input.section, input.shelf, input.bin),
            facility: input.facility,
            area: input.area,
            section: input.section,
            shelf: input.shelf,
            bin: input.bin,
            location_type: input.location_type,
            width_cm: input.width_cm,
            height_cm: input.height_cm,
            depth_cm: input.depth_cm,
            deleted: false,
        })
    }

    /// The full tuple, when every part is present.
    pub fn address(&self) -> Option<LocationAddress> {
        Some(LocationAddress {
            facility: self.facility,
            area: self.area?,
            section: self.section?,
            shelf: self.shelf?,
            bin: self.bin?,
        })
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn dimensions_cm(&self) -> (Option<u32>, Option<u32>, Option<u32>) {
        (self.width_cm, self.height_cm, self.depth_cm)
    }
}

impl Entity for InventoryLocation {
    type Id = LocationId;

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
