//! Field-level diff between proposed and canonical person records.
//!
//! Comparison runs over a fixed allow-list of tracked fields, projected into
//! [`PersonSnapshot`] on both sides. The result is a closed tagged record
//! ([`ChangeOp`]) rather than an open JSON document, so before/after
//! snapshots stay strongly typed all the way into storage. Diffing only ever
//! produces reviewer-facing summaries; it never mutates canonical data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  fork::mother_name_of,
  hierarchy::HierarchyIndex,
  person::Person,
  request::ProposedPerson,
  union::Union,
};

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// A field a proposal diff is allowed to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
  Name,
  Generation,
  BirthOrder,
  Father,
  Notes,
  MotherName,
}

/// The tracked-field projection of one person record, canonical or proposed.
/// Father references are expressed as canonical person ids on both sides so
/// the two projections compare directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSnapshot {
  pub name:        String,
  pub generation:  i64,
  pub birth_order: i64,
  pub father_id:   Option<Uuid>,
  pub notes:       Option<String>,
  pub mother_name: Option<String>,
}

impl PersonSnapshot {
  /// Project a canonical person, resolving the father through the index and
  /// the mother name through the parent union's wife.
  pub fn of_person(
    person: &Person,
    index: &HierarchyIndex,
    persons: &HashMap<Uuid, Person>,
    unions: &HashMap<Uuid, Union>,
  ) -> Self {
    Self {
      name:        person.name.clone(),
      generation:  person.generation,
      birth_order: person.birth_order,
      father_id:   index.father_of(person.person_id),
      notes:       person.notes.clone(),
      mother_name: mother_name_of(person, persons, unions),
    }
  }

  /// Project a proposed copy. The father is expressed as the *original* id
  /// of the proposed father; a father newly added inside the proposal has
  /// no original and projects as `None`.
  pub fn of_proposed(
    proposed: &ProposedPerson,
    proposed_by_id: &HashMap<Uuid, ProposedPerson>,
  ) -> Self {
    Self {
      name:        proposed.name.clone(),
      generation:  proposed.generation,
      birth_order: proposed.birth_order,
      father_id:   proposed
        .parent_proposed_id
        .and_then(|parent| proposed_by_id.get(&parent))
        .and_then(|parent| parent.original_person_id),
      notes:       proposed.notes.clone(),
      mother_name: proposed.mother_name.clone(),
    }
  }
}

// ─── Change operations ───────────────────────────────────────────────────────

/// The reviewable change derived for one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
  /// The person exists only in the proposal.
  New {
    after: PersonSnapshot,
  },
  /// Tracked fields differ between the canonical record and the copy.
  Edit {
    changed: Vec<TrackedField>,
    before:  PersonSnapshot,
    after:   PersonSnapshot,
  },
  /// The canonical counterpart is gone (or its removal is proposed);
  /// `before` is the last known state.
  Delete {
    before: PersonSnapshot,
  },
}

impl ChangeOp {
  /// Discriminant string stored alongside the JSON payload.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::New { .. } => "new",
      Self::Edit { .. } => "edit",
      Self::Delete { .. } => "delete",
    }
  }
}

/// The tracked fields on which two snapshots differ.
pub fn changed_fields(before: &PersonSnapshot, after: &PersonSnapshot) -> Vec<TrackedField> {
  let mut changed = Vec::new();
  if before.name != after.name {
    changed.push(TrackedField::Name);
  }
  if before.generation != after.generation {
    changed.push(TrackedField::Generation);
  }
  if before.birth_order != after.birth_order {
    changed.push(TrackedField::BirthOrder);
  }
  if before.father_id != after.father_id {
    changed.push(TrackedField::Father);
  }
  if before.notes != after.notes {
    changed.push(TrackedField::Notes);
  }
  if before.mother_name != after.mother_name {
    changed.push(TrackedField::MotherName);
  }
  changed
}

/// Classify one proposed person against its canonical counterpart.
///
/// - no `original_person_id` → [`ChangeOp::New`];
/// - `original_person_id` set but the canonical row gone → a deletion that
///   happened upstream, [`ChangeOp::Delete`] with the copy as the last
///   known state;
/// - both present → [`ChangeOp::Edit`] with the exact changed-field list,
///   or `None` when nothing tracked differs.
pub fn diff_proposed(
  proposed: &ProposedPerson,
  after: &PersonSnapshot,
  original: Option<&PersonSnapshot>,
) -> Option<ChangeOp> {
  if proposed.original_person_id.is_none() {
    return Some(ChangeOp::New { after: after.clone() });
  }
  let Some(before) = original else {
    return Some(ChangeOp::Delete { before: after.clone() });
  };

  let changed = changed_fields(before, after);
  if changed.is_empty() {
    return None;
  }
  Some(ChangeOp::Edit {
    changed,
    before: before.clone(),
    after: after.clone(),
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::person::{Gender, LifeStatus};

  fn snapshot(name: &str) -> PersonSnapshot {
    PersonSnapshot {
      name:        name.to_string(),
      generation:  2,
      birth_order: 1,
      father_id:   None,
      notes:       None,
      mother_name: None,
    }
  }

  fn proposed(original: Option<Uuid>) -> ProposedPerson {
    ProposedPerson {
      proposed_id: Uuid::new_v4(),
      request_id: Uuid::new_v4(),
      original_person_id: original,
      parent_proposed_id: None,
      name: "Tigor".into(),
      gender: Gender::Male,
      status: LifeStatus::Living,
      notes: None,
      alt_names: vec![],
      birth_order: 1,
      generation: 2,
      mother_name: None,
      created_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  #[test]
  fn no_original_id_is_new() {
    let p = proposed(None);
    let op = diff_proposed(&p, &snapshot("Tigor"), None).unwrap();
    assert!(matches!(op, ChangeOp::New { .. }));
  }

  #[test]
  fn missing_canonical_row_is_delete() {
    let p = proposed(Some(Uuid::new_v4()));
    let op = diff_proposed(&p, &snapshot("Tigor"), None).unwrap();
    assert!(matches!(op, ChangeOp::Delete { .. }));
  }

  #[test]
  fn identical_snapshots_are_no_change() {
    let p = proposed(Some(Uuid::new_v4()));
    let before = snapshot("Tigor");
    assert!(diff_proposed(&p, &before.clone(), Some(&before)).is_none());
  }

  #[test]
  fn edit_lists_exactly_the_changed_fields() {
    let p = proposed(Some(Uuid::new_v4()));
    let before = snapshot("Tigor");
    let mut after = before.clone();
    after.name = "Tigor Jr".into();
    after.notes = Some("corrected".into());

    let op = diff_proposed(&p, &after, Some(&before)).unwrap();
    let ChangeOp::Edit { changed, before: b, after: a } = op else {
      panic!("expected edit");
    };
    assert_eq!(changed, vec![TrackedField::Name, TrackedField::Notes]);
    assert_eq!(b.name, "Tigor");
    assert_eq!(a.name, "Tigor Jr");
  }

  #[test]
  fn father_change_is_tracked() {
    let before = snapshot("Tigor");
    let mut after = before.clone();
    after.father_id = Some(Uuid::new_v4());
    assert_eq!(changed_fields(&before, &after), vec![TrackedField::Father]);
  }

  /// A proposed father that was itself newly added has no original id, so
  /// the copy's father projects as `None`.
  #[test]
  fn proposed_snapshot_maps_father_through_original_id() {
    let original_father = Uuid::new_v4();
    let mut father_copy = proposed(Some(original_father));
    father_copy.name = "Ama".into();
    let mut new_father = proposed(None);
    new_father.name = "Baru".into();

    let mut child = proposed(Some(Uuid::new_v4()));
    child.parent_proposed_id = Some(father_copy.proposed_id);

    let by_id: HashMap<Uuid, ProposedPerson> = [
      (father_copy.proposed_id, father_copy.clone()),
      (new_father.proposed_id, new_father.clone()),
    ]
    .into();

    let snap = PersonSnapshot::of_proposed(&child, &by_id);
    assert_eq!(snap.father_id, Some(original_father));

    child.parent_proposed_id = Some(new_father.proposed_id);
    let snap = PersonSnapshot::of_proposed(&child, &by_id);
    assert_eq!(snap.father_id, None);
  }
}
