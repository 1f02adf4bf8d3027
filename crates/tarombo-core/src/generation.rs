//! Generation Calculator — derive and propagate generation numbers.
//!
//! Generation is the depth of a person below their root ancestor, with roots
//! at 1. [`recompute`] re-derives the number for every person breadth-first
//! from the roots; [`propagate`] shifts an already-consistent descendant
//! subtree by a delta after a re-parenting move.
//!
//! Both are pure: they return the set of rows that would change and leave
//! persistence to the store, which lets the same plan back a dry-run report
//! or a batched commit.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, hierarchy::HierarchyIndex, person::Person};

// ─── Plan types ──────────────────────────────────────────────────────────────

/// One pending generation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationChange {
  pub person_id:  Uuid,
  /// The value the stored generation should become.
  pub generation: i64,
}

/// A data problem found during recomputation. Warnings are reported and
/// logged, never silently repaired by guessing which father path is correct;
/// the affected branch keeps its first-assigned value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
  /// Reached via more than one father path — two recorded fathers through
  /// different unions.
  MultipleFatherPaths { person_id: Uuid },
  /// Not reachable from any root (a member of a detached cycle); defaulted
  /// to generation 1.
  Unreachable { person_id: Uuid },
}

impl std::fmt::Display for IntegrityWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MultipleFatherPaths { person_id } => {
        write!(f, "person {person_id} is reachable via more than one father path")
      }
      Self::Unreachable { person_id } => {
        write!(f, "person {person_id} is unreachable from any root")
      }
    }
  }
}

/// The outcome of one recompute pass.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputePlan {
  /// Only persons whose stored generation differs from the computed value.
  pub changes:  Vec<GenerationChange>,
  pub warnings: Vec<IntegrityWarning>,
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Recompute the generation of every person, breadth-first from the roots.
///
/// A person already assigned when reached again is reported as
/// [`IntegrityWarning::MultipleFatherPaths`] and the first assignment wins.
/// Persons never reached (detached cycles) default to 1 and are reported as
/// [`IntegrityWarning::Unreachable`]; the rest of the pass is unaffected.
pub fn recompute(
  index: &HierarchyIndex,
  persons: &HashMap<Uuid, Person>,
) -> RecomputePlan {
  let mut computed: HashMap<Uuid, i64> = HashMap::new();
  let mut warnings: Vec<IntegrityWarning> = Vec::new();

  let mut queue: VecDeque<(Uuid, i64)> =
    index.roots().iter().map(|id| (*id, 1)).collect();

  while let Some((id, generation)) = queue.pop_front() {
    if computed.contains_key(&id) {
      warnings.push(IntegrityWarning::MultipleFatherPaths { person_id: id });
      continue;
    }
    computed.insert(id, generation);
    queue.extend(
      index
        .children_of(id)
        .iter()
        .map(|child| (*child, generation + 1)),
    );
  }

  let mut changes: Vec<GenerationChange> = Vec::new();
  // Deterministic order for reports and batched writes.
  let mut ids: Vec<Uuid> = persons.keys().copied().collect();
  ids.sort();

  for id in ids {
    let stored = persons[&id].generation;
    let target = match computed.get(&id) {
      Some(generation) => *generation,
      None => {
        warnings.push(IntegrityWarning::Unreachable { person_id: id });
        1
      }
    };
    if stored != target {
      changes.push(GenerationChange { person_id: id, generation: target });
    }
  }

  RecomputePlan { changes, warnings }
}

/// Apply `delta` to every descendant of `person_id` (the person's own new
/// generation is written by the move that computed the delta).
///
/// Termination relies on the forest invariant; if the data is cyclic the
/// revisit guard aborts with [`Error::CycleDetected`] so the enclosing
/// transaction rolls back instead of looping forever.
pub fn propagate(
  index: &HierarchyIndex,
  persons: &HashMap<Uuid, Person>,
  person_id: Uuid,
  delta: i64,
) -> Result<Vec<GenerationChange>> {
  if delta == 0 {
    return Ok(Vec::new());
  }

  let mut visited: HashSet<Uuid> = HashSet::from([person_id]);
  let mut queue: VecDeque<Uuid> =
    index.children_of(person_id).iter().copied().collect();
  let mut changes = Vec::new();

  while let Some(id) = queue.pop_front() {
    if !visited.insert(id) {
      return Err(Error::CycleDetected(id));
    }
    let person = persons.get(&id).ok_or(Error::PersonNotFound(id))?;
    changes.push(GenerationChange {
      person_id:  id,
      generation: person.generation + delta,
    });
    queue.extend(index.children_of(id).iter().copied());
  }
  Ok(changes)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
