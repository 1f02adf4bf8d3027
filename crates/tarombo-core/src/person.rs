//! Person — a node in the lineage forest.
//!
//! A person carries their own scalar attributes plus a single optional
//! reference to the union (marriage) record they were born into. The father
//! relation is never stored directly; it is resolved through that union by
//! the [`crate::hierarchy::HierarchyIndex`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recorded gender; the lineage tradition tracks descent through male lines,
/// so the hierarchy only ever treats a union's husband as the father.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
}

/// Whether the person is recorded as living.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
  #[default]
  Living,
  Deceased,
}

/// A canonical person record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:       Uuid,
  pub name:            String,
  pub gender:          Gender,
  pub status:          LifeStatus,
  /// Free-text biography / notes.
  pub notes:           Option<String>,
  /// Alternate or former names.
  pub alt_names:       Vec<String>,
  /// Ordinal among full siblings, ascending. Assigned on creation, swapped
  /// by reorder operations.
  pub birth_order:     i64,
  /// Derived depth from the root ancestor; roots are generation 1.
  pub generation:      i64,
  /// The union this person was born into, if recorded.
  pub parent_union_id: Option<Uuid>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::LineageStore::add_person`].
/// `person_id` and `created_at` are always set by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
  pub name:        String,
  pub gender:      Gender,
  #[serde(default)]
  pub status:      LifeStatus,
  pub notes:       Option<String>,
  #[serde(default)]
  pub alt_names:   Vec<String>,
  /// When set, the person is created as a child of this father (the father's
  /// union is found or created). When absent, the person is a new root.
  pub father_id:   Option<Uuid>,
  /// Explicit sibling position; defaults to the end of the sibling list.
  pub birth_order: Option<i64>,
  /// Caller-supplied generation, honoured only for fatherless persons.
  /// Kept for legacy imports whose roots are not generation 1.
  pub generation:  Option<i64>,
}

impl NewPerson {
  /// Convenience constructor with all optional fields unset.
  pub fn new(name: impl Into<String>, gender: Gender) -> Self {
    Self {
      name: name.into(),
      gender,
      status: LifeStatus::default(),
      notes: None,
      alt_names: Vec::new(),
      father_id: None,
      birth_order: None,
      generation: None,
    }
  }

  /// Builder-style helper: set the father.
  pub fn child_of(mut self, father_id: Uuid) -> Self {
    self.father_id = Some(father_id);
    self
  }
}

/// Scalar-field patch for [`crate::store::LineageStore::update_person`].
/// Absent fields are left unchanged. Structural changes (re-parenting) go
/// through `move_person` instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonUpdate {
  pub name:        Option<String>,
  pub gender:      Option<Gender>,
  pub status:      Option<LifeStatus>,
  pub notes:       Option<String>,
  pub alt_names:   Option<Vec<String>>,
  pub birth_order: Option<i64>,
}

impl PersonUpdate {
  /// True when the patch would change nothing.
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.gender.is_none()
      && self.status.is_none()
      && self.notes.is_none()
      && self.alt_names.is_none()
      && self.birth_order.is_none()
  }

  /// Apply the patch to a person in place.
  pub fn apply(&self, person: &mut Person) {
    if let Some(name) = &self.name {
      person.name = name.clone();
    }
    if let Some(gender) = self.gender {
      person.gender = gender;
    }
    if let Some(status) = self.status {
      person.status = status;
    }
    if let Some(notes) = &self.notes {
      person.notes = Some(notes.clone());
    }
    if let Some(alt_names) = &self.alt_names {
      person.alt_names = alt_names.clone();
    }
    if let Some(birth_order) = self.birth_order {
      person.birth_order = birth_order;
    }
  }
}
