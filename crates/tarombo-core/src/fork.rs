//! Subtree Forking Engine — copy a descendant subtree into a proposal.
//!
//! Forking runs in two passes. Pass one walks breadth-first from the
//! ancestor and creates an independent copy of every visited person,
//! recording the original→copy id mapping. Pass two rewrites each copy's
//! father link through that mapping, so a copy's father is only ever another
//! copy inside the same fork — the ancestor's copy, whose father was not
//! copied, keeps no father link at all.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  hierarchy::HierarchyIndex,
  person::Person,
  request::ProposedPerson,
  union::Union,
};

/// The spouse name of the union a person was born into, if both the union
/// and the wife record exist.
pub fn mother_name_of(
  person: &Person,
  persons: &HashMap<Uuid, Person>,
  unions: &HashMap<Uuid, Union>,
) -> Option<String> {
  person
    .parent_union_id
    .and_then(|union_id| unions.get(&union_id))
    .and_then(|union| union.wife_id)
    .and_then(|wife| persons.get(&wife))
    .map(|wife| wife.name.clone())
}

/// Plan the full set of proposed copies for `ancestor_id` and all its
/// descendants, in breadth-first order (parents always precede children, so
/// the rows can be inserted in plan order under a self-referencing foreign
/// key).
///
/// The walk carries a visited-set guard: malformed cyclic data aborts with
/// [`Error::CycleDetected`] instead of producing infinite copies.
pub fn fork_plan(
  index: &HierarchyIndex,
  persons: &HashMap<Uuid, Person>,
  unions: &HashMap<Uuid, Union>,
  ancestor_id: Uuid,
  request_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Vec<ProposedPerson>> {
  if !persons.contains_key(&ancestor_id) {
    return Err(Error::PersonNotFound(ancestor_id));
  }

  // Pass one: copy every reachable person.
  let mut visited: HashSet<Uuid> = HashSet::new();
  let mut queue: VecDeque<Uuid> = VecDeque::from([ancestor_id]);
  let mut copies: Vec<ProposedPerson> = Vec::new();
  let mut copy_of: HashMap<Uuid, Uuid> = HashMap::new();

  while let Some(id) = queue.pop_front() {
    if !visited.insert(id) {
      return Err(Error::CycleDetected(id));
    }
    let original = persons.get(&id).ok_or(Error::PersonNotFound(id))?;
    let proposed_id = Uuid::new_v4();
    copy_of.insert(id, proposed_id);
    copies.push(ProposedPerson {
      proposed_id,
      request_id,
      original_person_id: Some(id),
      parent_proposed_id: None, // rewritten in pass two
      name: original.name.clone(),
      gender: original.gender,
      status: original.status,
      notes: original.notes.clone(),
      alt_names: original.alt_names.clone(),
      birth_order: original.birth_order,
      generation: original.generation,
      mother_name: mother_name_of(original, persons, unions),
      created_at: now,
    });
    queue.extend(index.children_of(id).iter().copied());
  }

  // Pass two: map each copy's original father through the copy map. A
  // father outside the forked set (only ever the ancestor's own father)
  // stays unmapped.
  for copy in &mut copies {
    let Some(original) = copy.original_person_id else { continue };
    copy.parent_proposed_id = index
      .father_of(original)
      .and_then(|father| copy_of.get(&father))
      .copied();
  }

  Ok(copies)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::person::{Gender, LifeStatus};

  fn person(id: Uuid, parent_union_id: Option<Uuid>) -> Person {
    Person {
      person_id: id,
      name: format!("p-{id}"),
      gender: Gender::Male,
      status: LifeStatus::Living,
      notes: Some("note".into()),
      alt_names: vec!["alias".into()],
      birth_order: 1,
      generation: 1,
      parent_union_id,
      created_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  fn union(id: Uuid, husband: Option<Uuid>, wife: Option<Uuid>) -> Union {
    Union {
      union_id:   id,
      husband_id: husband,
      wife_id:    wife,
      created_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  /// R → C1 → C2 plus an unrelated root: exactly the reachable three are
  /// copied, links point only at copies, the fork root has no father copy.
  #[test]
  fn forks_reachable_set_with_rewritten_links() {
    let (r, c1, c2, other) =
      (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (u_r, u_c1) = (Uuid::new_v4(), Uuid::new_v4());

    let persons: HashMap<_, _> = [
      (r, person(r, None)),
      (c1, person(c1, Some(u_r))),
      (c2, person(c2, Some(u_c1))),
      (other, person(other, None)),
    ]
    .into();
    let unions: HashMap<_, _> =
      [(u_r, union(u_r, Some(r), None)), (u_c1, union(u_c1, Some(c1), None))]
        .into();
    let index = HierarchyIndex::build(&persons, &unions);

    let request_id = Uuid::new_v4();
    let now = Utc.timestamp_opt(2_000_000, 0).unwrap();
    let copies =
      fork_plan(&index, &persons, &unions, r, request_id, now).unwrap();

    assert_eq!(copies.len(), 3);
    assert!(copies.iter().all(|c| c.request_id == request_id));

    let by_original: HashMap<Uuid, &ProposedPerson> = copies
      .iter()
      .map(|c| (c.original_person_id.unwrap(), c))
      .collect();
    assert!(!by_original.contains_key(&other));

    // The ancestor's copy has no father copy; each child's father link is
    // the copy of its original father.
    assert_eq!(by_original[&r].parent_proposed_id, None);
    assert_eq!(
      by_original[&c1].parent_proposed_id,
      Some(by_original[&r].proposed_id)
    );
    assert_eq!(
      by_original[&c2].parent_proposed_id,
      Some(by_original[&c1].proposed_id)
    );

    // No copy link ever points at a canonical id.
    let copy_ids: HashSet<Uuid> = copies.iter().map(|c| c.proposed_id).collect();
    assert!(
      copies
        .iter()
        .filter_map(|c| c.parent_proposed_id)
        .all(|parent| copy_ids.contains(&parent))
    );
  }

  /// Forking below the top keeps the subtree boundary: the ancestor's own
  /// father exists but is outside the fork, so the copy's link is dropped.
  #[test]
  fn ancestor_father_outside_fork_is_not_linked() {
    let (r, c1, c2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (u_r, u_c1) = (Uuid::new_v4(), Uuid::new_v4());

    let persons: HashMap<_, _> = [
      (r, person(r, None)),
      (c1, person(c1, Some(u_r))),
      (c2, person(c2, Some(u_c1))),
    ]
    .into();
    let unions: HashMap<_, _> =
      [(u_r, union(u_r, Some(r), None)), (u_c1, union(u_c1, Some(c1), None))]
        .into();
    let index = HierarchyIndex::build(&persons, &unions);

    let copies = fork_plan(
      &index,
      &persons,
      &unions,
      c1,
      Uuid::new_v4(),
      Utc.timestamp_opt(2_000_000, 0).unwrap(),
    )
    .unwrap();

    assert_eq!(copies.len(), 2);
    let root_copy = copies
      .iter()
      .find(|c| c.original_person_id == Some(c1))
      .unwrap();
    assert_eq!(root_copy.parent_proposed_id, None);
  }

  #[test]
  fn captures_mother_name_from_union_wife() {
    let (father, mother, child) =
      (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let u = Uuid::new_v4();

    let mut mother_person = person(mother, None);
    mother_person.name = "Sari".into();
    mother_person.gender = Gender::Female;

    let persons: HashMap<_, _> = [
      (father, person(father, None)),
      (mother, mother_person),
      (child, person(child, Some(u))),
    ]
    .into();
    let unions: HashMap<_, _> =
      [(u, union(u, Some(father), Some(mother)))].into();
    let index = HierarchyIndex::build(&persons, &unions);

    let copies = fork_plan(
      &index,
      &persons,
      &unions,
      father,
      Uuid::new_v4(),
      Utc.timestamp_opt(2_000_000, 0).unwrap(),
    )
    .unwrap();

    let child_copy = copies
      .iter()
      .find(|c| c.original_person_id == Some(child))
      .unwrap();
    assert_eq!(child_copy.mother_name.as_deref(), Some("Sari"));
  }

  #[test]
  fn missing_ancestor_is_not_found() {
    let persons = HashMap::new();
    let unions = HashMap::new();
    let index = HierarchyIndex::build(&persons, &unions);
    assert!(matches!(
      fork_plan(
        &index,
        &persons,
        &unions,
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc.timestamp_opt(2_000_000, 0).unwrap(),
      ),
      Err(Error::PersonNotFound(_))
    ));
  }
}
