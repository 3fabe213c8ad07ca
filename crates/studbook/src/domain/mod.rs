//! Domain types for pedigree analysis.
//!
//! This module contains the core domain types for the studbook pedigree
//! engine: dog records, parent references, and the partial-update shapes
//! consumed by the mutation coordinator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a dog record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DogId(pub String);

impl DogId {
    /// Create a new dog ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DogId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DogId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Biological sex of a dog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Male (eligible as sire)
    Male,

    /// Female (eligible as dam)
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
        }
    }
}

/// Which parent slot of a dog is being referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentType {
    /// Male parent
    Sire,

    /// Female parent
    Dam,
}

impl ParentType {
    /// The sex a dog must have to occupy this parent slot.
    pub fn expected_sex(self) -> Sex {
        match self {
            Self::Sire => Sex::Male,
            Self::Dam => Sex::Female,
        }
    }

    /// The opposite parent slot.
    pub fn other(self) -> Self {
        match self {
            Self::Sire => Self::Dam,
            Self::Dam => Self::Sire,
        }
    }
}

impl fmt::Display for ParentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sire => write!(f, "sire"),
            Self::Dam => write!(f, "dam"),
        }
    }
}

/// A dog record as held in the ancestor graph and the registry.
///
/// Parent references are lookup keys into the shared graph map, not owned
/// copies: an ancestor reachable through several lineage paths is always a
/// single entry, which is exactly what the inbreeding computation depends
/// on recognizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogNode {
    /// Unique identifier for the dog
    pub id: DogId,

    /// Registered or call name
    pub name: String,

    /// Biological sex
    pub sex: Sex,

    /// Breed designation
    pub breed: String,

    /// Date of birth, when known
    pub date_of_birth: Option<NaiveDate>,

    /// Lookup key of the sire, when recorded
    pub sire_id: Option<DogId>,

    /// Lookup key of the dam, when recorded
    pub dam_id: Option<DogId>,

    /// Whether the dog holds a championship title
    pub champion: bool,

    /// Whether required health tests are on file
    pub health_tested: bool,

    /// Kennel-club registration number, when known
    pub registration_number: Option<String>,

    /// Identifier of the current owner, when known
    pub owner_id: Option<String>,

    /// Display name of the current owner, when known
    pub owner_name: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl DogNode {
    /// The lookup key stored in the given parent slot, if any.
    pub fn parent_ref(&self, parent_type: ParentType) -> Option<&DogId> {
        match parent_type {
            ParentType::Sire => self.sire_id.as_ref(),
            ParentType::Dam => self.dam_id.as_ref(),
        }
    }

    /// Replace the lookup key stored in the given parent slot.
    pub fn set_parent_ref(&mut self, parent_type: ParentType, parent_id: Option<DogId>) {
        match parent_type {
            ParentType::Sire => self.sire_id = parent_id,
            ParentType::Dam => self.dam_id = parent_id,
        }
    }

    /// Whether either parent slot holds a reference.
    pub fn has_parent_refs(&self) -> bool {
        self.sire_id.is_some() || self.dam_id.is_some()
    }
}

/// Data for adding a new (or overwriting an existing) ancestor.
///
/// When `id` is absent, the mutation coordinator generates one.
#[derive(Debug, Clone)]
pub struct NewParent {
    /// Identifier of an existing dog to link, or `None` to create one
    pub id: Option<DogId>,

    /// Registered or call name
    pub name: String,

    /// Biological sex; must match the targeted parent slot
    pub sex: Sex,

    /// Breed designation
    pub breed: String,

    /// Date of birth, when known
    pub date_of_birth: Option<NaiveDate>,

    /// Whether the dog holds a championship title
    pub champion: bool,

    /// Whether required health tests are on file
    pub health_tested: bool,

    /// Kennel-club registration number, when known
    pub registration_number: Option<String>,

    /// Identifier of the current owner, when known
    pub owner_id: Option<String>,

    /// Display name of the current owner, when known
    pub owner_name: Option<String>,
}

/// Partial update for an existing ancestor.
///
/// Only fields present are modified; the parent's own already-known
/// sub-ancestry is never touched by an update (there are deliberately no
/// `sire_id`/`dam_id` fields here). Sex is likewise not editable through
/// this path, since flipping it would invalidate the slot it occupies.
#[derive(Debug, Clone, Default)]
pub struct ParentUpdate {
    /// New name (if updating)
    pub name: Option<String>,

    /// New breed (if updating)
    pub breed: Option<String>,

    /// New date of birth (if updating, `Some(None)` to clear)
    pub date_of_birth: Option<Option<NaiveDate>>,

    /// New championship flag (if updating)
    pub champion: Option<bool>,

    /// New health-tested flag (if updating)
    pub health_tested: Option<bool>,

    /// New registration number (if updating, `Some(None)` to clear)
    pub registration_number: Option<Option<String>>,

    /// New owner identifier (if updating, `Some(None)` to clear)
    pub owner_id: Option<Option<String>>,

    /// New owner display name (if updating, `Some(None)` to clear)
    pub owner_name: Option<Option<String>>,
}

impl ParentUpdate {
    /// Whether the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.breed.is_none()
            && self.date_of_birth.is_none()
            && self.champion.is_none()
            && self.health_tested.is_none()
            && self.registration_number.is_none()
            && self.owner_id.is_none()
            && self.owner_name.is_none()
    }

    /// Apply the supplied fields to `node`, leaving the rest untouched.
    ///
    /// Timestamps are not modified here; callers decide whether the result
    /// actually differs before stamping `updated_at`.
    pub fn apply_to(&self, node: &mut DogNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(breed) = &self.breed {
            node.breed = breed.clone();
        }
        if let Some(dob) = self.date_of_birth {
            node.date_of_birth = dob;
        }
        if let Some(champion) = self.champion {
            node.champion = champion;
        }
        if let Some(health_tested) = self.health_tested {
            node.health_tested = health_tested;
        }
        if let Some(registration) = &self.registration_number {
            node.registration_number = registration.clone();
        }
        if let Some(owner_id) = &self.owner_id {
            node.owner_id = owner_id.clone();
        }
        if let Some(owner_name) = &self.owner_name {
            node.owner_name = owner_name.clone();
        }
    }
}

/// Chart color theme requested by the rendering layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartTheme {
    /// Default light palette
    #[default]
    Classic,

    /// High-contrast dark palette
    Dark,
}

/// Per-node display flags consumed by the rendering layer.
///
/// Purely presentational; none of these affect graph construction, COI,
/// or layout shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Color theme for chart rendering
    pub theme: ChartTheme,

    /// Mark champions with a title badge
    pub show_champions: bool,

    /// Mark dogs with health tests on file
    pub show_health_tests: bool,

    /// Show dates of birth
    pub show_dates: bool,

    /// Show owner names
    pub show_owners: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            theme: ChartTheme::Classic,
            show_champions: true,
            show_health_tests: true,
            show_dates: false,
            show_owners: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog(id: &str, sex: Sex) -> DogNode {
        let now = Utc::now();
        DogNode {
            id: DogId::new(id),
            name: id.to_uppercase(),
            sex,
            breed: "Border Collie".to_string(),
            date_of_birth: None,
            sire_id: None,
            dam_id: None,
            champion: false,
            health_tested: false,
            registration_number: None,
            owner_id: None,
            owner_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn parent_type_expected_sex() {
        assert_eq!(ParentType::Sire.expected_sex(), Sex::Male);
        assert_eq!(ParentType::Dam.expected_sex(), Sex::Female);
        assert_eq!(ParentType::Sire.other(), ParentType::Dam);
    }

    #[test]
    fn parent_refs_round_trip() {
        let mut d = dog("pup", Sex::Male);
        assert!(!d.has_parent_refs());

        d.set_parent_ref(ParentType::Sire, Some(DogId::new("sire-1")));
        assert_eq!(d.parent_ref(ParentType::Sire).unwrap().as_str(), "sire-1");
        assert!(d.parent_ref(ParentType::Dam).is_none());
        assert!(d.has_parent_refs());

        d.set_parent_ref(ParentType::Sire, None);
        assert!(!d.has_parent_refs());
    }

    #[test]
    fn parent_update_is_empty() {
        assert!(ParentUpdate::default().is_empty());

        let update = ParentUpdate {
            champion: Some(true),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn parent_update_applies_only_supplied_fields() {
        let mut d = dog("ch", Sex::Female);
        d.sire_id = Some(DogId::new("sire-1"));

        let update = ParentUpdate {
            name: Some("Champion Rose".to_string()),
            champion: Some(true),
            date_of_birth: Some(None),
            ..Default::default()
        };
        update.apply_to(&mut d);

        assert_eq!(d.name, "Champion Rose");
        assert!(d.champion);
        assert_eq!(d.date_of_birth, None);
        // Untouched fields survive, including sub-ancestry.
        assert_eq!(d.breed, "Border Collie");
        assert_eq!(d.sire_id, Some(DogId::new("sire-1")));
    }

    #[test]
    fn dog_id_display_and_from() {
        let id: DogId = "dog-42".into();
        assert_eq!(id.to_string(), "dog-42");
        assert_eq!(DogId::from("dog-42".to_string()), id);
    }

    #[test]
    fn sex_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Sex::Male).unwrap(), "\"male\"");
        assert_eq!(
            serde_json::from_str::<ParentType>("\"dam\"").unwrap(),
            ParentType::Dam
        );
    }
}
