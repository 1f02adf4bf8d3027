//! Hierarchy Index — the in-memory father/children view of the record set.
//!
//! The stored father relation is indirected through union records
//! (person → parent union → union's husband). This index resolves the two
//! hops once, up front, and is a pure function of the record set: building
//! it never mutates anything, and malformed references (a person pointing at
//! a missing union, a union with a missing husband) degrade to "no father"
//! instead of failing.
//!
//! Every traversal here carries a visited-set revisit guard. The source data
//! format does not structurally prevent cycles, so a guard is mandatory in
//! each BFS, not optional.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, person::Person, union::Union};

// ─── Index ───────────────────────────────────────────────────────────────────

/// Resolved father/children relations for one snapshot of the record set.
#[derive(Debug, Clone)]
pub struct HierarchyIndex {
  father:   HashMap<Uuid, Uuid>,
  children: HashMap<Uuid, Vec<Uuid>>,
  roots:    Vec<Uuid>,
}

impl HierarchyIndex {
  /// Build the index from a full snapshot of persons and unions.
  ///
  /// Children lists (and the root list) are ordered by `birth_order`
  /// ascending, ties broken by person id so the order is stable across
  /// rebuilds.
  pub fn build(persons: &HashMap<Uuid, Person>, unions: &HashMap<Uuid, Union>) -> Self {
    let mut father: HashMap<Uuid, Uuid> = HashMap::new();
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut roots: Vec<Uuid> = Vec::new();

    for person in persons.values() {
      let resolved = person
        .parent_union_id
        .and_then(|union_id| unions.get(&union_id))
        .and_then(|union| union.husband_id)
        .filter(|husband| persons.contains_key(husband))
        // A union naming the person as their own father is trivially cyclic;
        // treat it as dangling.
        .filter(|husband| *husband != person.person_id);

      match resolved {
        Some(father_id) => {
          father.insert(person.person_id, father_id);
          children.entry(father_id).or_default().push(person.person_id);
        }
        None => roots.push(person.person_id),
      }
    }

    let order_key = |id: &Uuid| {
      let birth_order = persons.get(id).map(|p| p.birth_order).unwrap_or(0);
      (birth_order, *id)
    };
    for siblings in children.values_mut() {
      siblings.sort_by_key(order_key);
    }
    roots.sort_by_key(order_key);

    Self { father, children, roots }
  }

  /// The resolved father of a person, if any.
  pub fn father_of(&self, person_id: Uuid) -> Option<Uuid> {
    self.father.get(&person_id).copied()
  }

  /// All persons whose resolved father is `person_id`, in sibling order.
  pub fn children_of(&self, person_id: Uuid) -> &[Uuid] {
    self
      .children
      .get(&person_id)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Persons with no resolvable father, in sibling order.
  pub fn roots(&self) -> &[Uuid] {
    &self.roots
  }

  /// Every descendant of `person_id` (excluding the person), breadth-first.
  ///
  /// A revisited id means the data is cyclic; the walk aborts with
  /// [`Error::CycleDetected`] instead of looping.
  pub fn descendants_of(&self, person_id: Uuid) -> Result<Vec<Uuid>> {
    let mut visited: HashSet<Uuid> = HashSet::from([person_id]);
    let mut queue: VecDeque<Uuid> = self.children_of(person_id).iter().copied().collect();
    let mut out = Vec::new();

    while let Some(id) = queue.pop_front() {
      if !visited.insert(id) {
        return Err(Error::CycleDetected(id));
      }
      out.push(id);
      queue.extend(self.children_of(id).iter().copied());
    }
    Ok(out)
  }

  /// True when `candidate` lies strictly below `of` in the forest.
  pub fn is_descendant(&self, candidate: Uuid, of: Uuid) -> Result<bool> {
    let mut visited: HashSet<Uuid> = HashSet::from([of]);
    let mut queue: VecDeque<Uuid> = self.children_of(of).iter().copied().collect();

    while let Some(id) = queue.pop_front() {
      if id == candidate {
        return Ok(true);
      }
      if !visited.insert(id) {
        return Err(Error::CycleDetected(id));
      }
      queue.extend(self.children_of(id).iter().copied());
    }
    Ok(false)
  }
}

// ─── Tree view ───────────────────────────────────────────────────────────────

/// The nested read model served to tree-browsing callers — never stored,
/// always derived from a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
  pub person:   Person,
  pub children: Vec<TreeNode>,
}

/// Materialise the nested tree below `root`, or every root when `None`.
///
/// Shares the revisit guard discipline of the index walks: a cyclic branch
/// is cut at the revisited person rather than recursing forever.
pub fn build_tree(
  index: &HierarchyIndex,
  persons: &HashMap<Uuid, Person>,
  root: Option<Uuid>,
) -> Result<Vec<TreeNode>> {
  let starts: Vec<Uuid> = match root {
    Some(id) => {
      if !persons.contains_key(&id) {
        return Err(Error::PersonNotFound(id));
      }
      vec![id]
    }
    None => index.roots().to_vec(),
  };

  let mut visited = HashSet::new();
  starts
    .into_iter()
    .map(|id| subtree(index, persons, id, &mut visited))
    .collect()
}

fn subtree(
  index: &HierarchyIndex,
  persons: &HashMap<Uuid, Person>,
  id: Uuid,
  visited: &mut HashSet<Uuid>,
) -> Result<TreeNode> {
  if !visited.insert(id) {
    return Err(Error::CycleDetected(id));
  }
  let person = persons
    .get(&id)
    .cloned()
    .ok_or(Error::PersonNotFound(id))?;
  let children = index
    .children_of(id)
    .iter()
    .map(|child| subtree(index, persons, *child, visited))
    .collect::<Result<Vec<_>>>()?;
  Ok(TreeNode { person, children })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::person::{Gender, LifeStatus};

  fn person(id: Uuid, birth_order: i64, parent_union_id: Option<Uuid>) -> Person {
    Person {
      person_id: id,
      name: format!("p-{id}"),
      gender: Gender::Male,
      status: LifeStatus::Living,
      notes: None,
      alt_names: vec![],
      birth_order,
      generation: 1,
      parent_union_id,
      created_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  fn union(id: Uuid, husband: Option<Uuid>) -> Union {
    Union {
      union_id:   id,
      husband_id: husband,
      wife_id:    None,
      created_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
    }
  }

  /// Root with two children in birth order; the relation resolves through
  /// the union hop.
  #[test]
  fn resolves_father_through_union() {
    let (root, c1, c2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let u = Uuid::new_v4();

    let persons: HashMap<_, _> = [
      (root, person(root, 0, None)),
      (c1, person(c1, 2, Some(u))),
      (c2, person(c2, 1, Some(u))),
    ]
    .into();
    let unions: HashMap<_, _> = [(u, union(u, Some(root)))].into();

    let index = HierarchyIndex::build(&persons, &unions);
    assert_eq!(index.father_of(c1), Some(root));
    assert_eq!(index.father_of(root), None);
    assert_eq!(index.roots(), &[root]);
    // birth_order ascending: c2 (1) before c1 (2)
    assert_eq!(index.children_of(root), &[c2, c1]);
  }

  #[test]
  fn dangling_union_reference_means_root() {
    let p = Uuid::new_v4();
    let persons: HashMap<_, _> = [(p, person(p, 0, Some(Uuid::new_v4())))].into();
    let unions = HashMap::new();

    let index = HierarchyIndex::build(&persons, &unions);
    assert_eq!(index.father_of(p), None);
    assert_eq!(index.roots(), &[p]);
  }

  #[test]
  fn union_without_husband_means_root() {
    let p = Uuid::new_v4();
    let u = Uuid::new_v4();
    let persons: HashMap<_, _> = [(p, person(p, 0, Some(u)))].into();
    let unions: HashMap<_, _> = [(u, union(u, None))].into();

    let index = HierarchyIndex::build(&persons, &unions);
    assert_eq!(index.roots(), &[p]);
  }

  #[test]
  fn descendants_are_breadth_first_and_complete() {
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    let (root, c1, c2, g1) = (ids[0], ids[1], ids[2], ids[3]);
    let (u_root, u_c1) = (Uuid::new_v4(), Uuid::new_v4());

    let persons: HashMap<_, _> = [
      (root, person(root, 0, None)),
      (c1, person(c1, 1, Some(u_root))),
      (c2, person(c2, 2, Some(u_root))),
      (g1, person(g1, 1, Some(u_c1))),
    ]
    .into();
    let unions: HashMap<_, _> =
      [(u_root, union(u_root, Some(root))), (u_c1, union(u_c1, Some(c1)))].into();

    let index = HierarchyIndex::build(&persons, &unions);
    assert_eq!(index.descendants_of(root).unwrap(), vec![c1, c2, g1]);
    assert_eq!(index.descendants_of(c2).unwrap(), Vec::<Uuid>::new());
    assert!(index.is_descendant(g1, root).unwrap());
    assert!(!index.is_descendant(c2, c1).unwrap());
  }

  /// Two persons fathering each other through their unions: neither is a
  /// root, and a descendant walk started inside the cycle must abort.
  #[test]
  fn cyclic_data_aborts_descendant_walk() {
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (u_a, u_b) = (Uuid::new_v4(), Uuid::new_v4());

    let persons: HashMap<_, _> =
      [(a, person(a, 0, Some(u_b))), (b, person(b, 0, Some(u_a)))].into();
    let unions: HashMap<_, _> =
      [(u_a, union(u_a, Some(a))), (u_b, union(u_b, Some(b)))].into();

    let index = HierarchyIndex::build(&persons, &unions);
    assert!(index.roots().is_empty());
    assert!(matches!(
      index.descendants_of(a),
      Err(Error::CycleDetected(_))
    ));
  }

  #[test]
  fn tree_view_nests_children() {
    let (root, c1) = (Uuid::new_v4(), Uuid::new_v4());
    let u = Uuid::new_v4();
    let persons: HashMap<_, _> =
      [(root, person(root, 0, None)), (c1, person(c1, 1, Some(u)))].into();
    let unions: HashMap<_, _> = [(u, union(u, Some(root)))].into();
    let index = HierarchyIndex::build(&persons, &unions);

    let tree = build_tree(&index, &persons, None).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].person.person_id, root);
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].person.person_id, c1);

    let sub = build_tree(&index, &persons, Some(c1)).unwrap();
    assert_eq!(sub.len(), 1);
    assert!(sub[0].children.is_empty());
  }
}
