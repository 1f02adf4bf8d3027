//! [`SqliteStore`] — the SQLite implementation of [`LineageStore`].
//!
//! Structural operations follow one shape: open a transaction, load a full
//! persons+unions snapshot, run the pure tree logic from `tarombo-core` on
//! it, write the results, commit. The dataset is small and slowly changing,
//! so snapshotting inside the transaction is cheap and keeps every
//! invariant check and its writes atomic.

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use tarombo_core::{
  Error, Result,
  diff::{ChangeOp, PersonSnapshot, TrackedField, diff_proposed},
  fork::fork_plan,
  generation,
  hierarchy::HierarchyIndex,
  person::{NewPerson, Person, PersonUpdate},
  request::{
    ChangeRequest, NewProposedPerson, NewRequest, ProposedPerson,
    ProposedUpdate, RequestItem, RequestStatus,
  },
  store::{Direction, LineageStore, RecomputeReport},
  union::Union,
};

use crate::{
  encode::{
    RawItem, RawPerson, RawProposed, RawRequest, RawUnion, encode_dt,
    encode_gender, encode_life_status, encode_request_status,
    encode_string_list, encode_uuid,
  },
  schema::SCHEMA,
};

/// Commit-mode recompute writes at most this many rows per transaction.
const RECOMPUTE_BATCH: usize = 100;

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

// ─── Error plumbing ──────────────────────────────────────────────────────────

/// Smuggle a domain error out of a `tokio_rusqlite` call closure.
fn domain(e: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Recover the domain error on the other side; anything else becomes a
/// generic storage failure.
fn from_call(e: tokio_rusqlite::Error) -> Error {
  match e {
    tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
      Ok(domain_err) => *domain_err,
      Err(other) => Error::Storage(other.to_string()),
    },
    other => Error::Storage(other.to_string()),
  }
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

const PERSON_COLS: &str = "person_id, name, gender, status, notes, alt_names, \
                           birth_order, generation, parent_union_id, created_at";

const PROPOSED_COLS: &str = "proposed_id, request_id, original_person_id, \
                             parent_proposed_id, name, gender, status, notes, \
                             alt_names, birth_order, generation, mother_name, \
                             created_at";

const REQUEST_COLS: &str = "request_id, contributor, ancestor_id, status, \
                            justification, proof_url, reviewer, review_notes, \
                            created_at, updated_at";

fn raw_person(row: &rusqlite::Row) -> rusqlite::Result<RawPerson> {
  Ok(RawPerson {
    person_id:       row.get(0)?,
    name:            row.get(1)?,
    gender:          row.get(2)?,
    status:          row.get(3)?,
    notes:           row.get(4)?,
    alt_names:       row.get(5)?,
    birth_order:     row.get(6)?,
    generation:      row.get(7)?,
    parent_union_id: row.get(8)?,
    created_at:      row.get(9)?,
  })
}

fn raw_union(row: &rusqlite::Row) -> rusqlite::Result<RawUnion> {
  Ok(RawUnion {
    union_id:   row.get(0)?,
    husband_id: row.get(1)?,
    wife_id:    row.get(2)?,
    created_at: row.get(3)?,
  })
}

fn raw_request(row: &rusqlite::Row) -> rusqlite::Result<RawRequest> {
  Ok(RawRequest {
    request_id:    row.get(0)?,
    contributor:   row.get(1)?,
    ancestor_id:   row.get(2)?,
    status:        row.get(3)?,
    justification: row.get(4)?,
    proof_url:     row.get(5)?,
    reviewer:      row.get(6)?,
    review_notes:  row.get(7)?,
    created_at:    row.get(8)?,
    updated_at:    row.get(9)?,
  })
}

fn raw_item(row: &rusqlite::Row) -> rusqlite::Result<RawItem> {
  Ok(RawItem {
    item_id:            row.get(0)?,
    request_id:         row.get(1)?,
    proposed_id:        row.get(2)?,
    original_person_id: row.get(3)?,
    op_json:            row.get(4)?,
    recorded_at:        row.get(5)?,
  })
}

fn raw_proposed(row: &rusqlite::Row) -> rusqlite::Result<RawProposed> {
  Ok(RawProposed {
    proposed_id:        row.get(0)?,
    request_id:         row.get(1)?,
    original_person_id: row.get(2)?,
    parent_proposed_id: row.get(3)?,
    name:               row.get(4)?,
    gender:             row.get(5)?,
    status:             row.get(6)?,
    notes:              row.get(7)?,
    alt_names:          row.get(8)?,
    birth_order:        row.get(9)?,
    generation:         row.get(10)?,
    mother_name:        row.get(11)?,
    created_at:         row.get(12)?,
  })
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The full record set plus its resolved hierarchy, loaded inside the
/// enclosing transaction so checks and writes see the same state.
struct Snapshot {
  persons: HashMap<Uuid, Person>,
  unions:  HashMap<Uuid, Union>,
  index:   HierarchyIndex,
}

fn snapshot(conn: &rusqlite::Connection) -> CallResult<Snapshot> {
  let persons: HashMap<Uuid, Person> = load_persons(conn)?
    .into_iter()
    .map(|p| (p.person_id, p))
    .collect();
  let unions: HashMap<Uuid, Union> = load_unions(conn)?
    .into_iter()
    .map(|u| (u.union_id, u))
    .collect();
  let index = HierarchyIndex::build(&persons, &unions);
  Ok(Snapshot { persons, unions, index })
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

fn load_persons(conn: &rusqlite::Connection) -> CallResult<Vec<Person>> {
  let mut stmt = conn.prepare(&format!("SELECT {PERSON_COLS} FROM persons"))?;
  let raws = stmt
    .query_map([], raw_person)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|r| r.into_person().map_err(domain))
    .collect()
}

fn load_unions(conn: &rusqlite::Connection) -> CallResult<Vec<Union>> {
  let mut stmt =
    conn.prepare("SELECT union_id, husband_id, wife_id, created_at FROM unions")?;
  let raws = stmt
    .query_map([], raw_union)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|r| r.into_union().map_err(domain))
    .collect()
}

fn get_person_row(
  conn: &rusqlite::Connection,
  id: Uuid,
) -> CallResult<Option<Person>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PERSON_COLS} FROM persons WHERE person_id = ?1"),
      params![encode_uuid(id)],
      raw_person,
    )
    .optional()?;
  raw.map(|r| r.into_person().map_err(domain)).transpose()
}

fn load_request(
  conn: &rusqlite::Connection,
  id: Uuid,
) -> CallResult<Option<ChangeRequest>> {
  let raw = conn
    .query_row(
      &format!("SELECT {REQUEST_COLS} FROM requests WHERE request_id = ?1"),
      params![encode_uuid(id)],
      raw_request,
    )
    .optional()?;
  raw.map(|r| r.into_request().map_err(domain)).transpose()
}

fn load_proposed(
  conn: &rusqlite::Connection,
  request_id: Uuid,
) -> CallResult<Vec<ProposedPerson>> {
  // rowid order preserves the breadth-first fork order plus later additions.
  let mut stmt = conn.prepare(&format!(
    "SELECT {PROPOSED_COLS} FROM proposed_persons WHERE request_id = ?1 \
     ORDER BY rowid"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(request_id)], raw_proposed)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|r| r.into_proposed().map_err(domain))
    .collect()
}

fn get_proposed_row(
  conn: &rusqlite::Connection,
  proposed_id: Uuid,
) -> CallResult<Option<ProposedPerson>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {PROPOSED_COLS} FROM proposed_persons WHERE proposed_id = ?1"
      ),
      params![encode_uuid(proposed_id)],
      raw_proposed,
    )
    .optional()?;
  raw.map(|r| r.into_proposed().map_err(domain)).transpose()
}

// ─── Writers ─────────────────────────────────────────────────────────────────

fn insert_person_row(conn: &rusqlite::Connection, p: &Person) -> CallResult<()> {
  conn.execute(
    "INSERT INTO persons (
       person_id, name, gender, status, notes, alt_names,
       birth_order, generation, parent_union_id, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(p.person_id),
      p.name,
      encode_gender(p.gender),
      encode_life_status(p.status),
      p.notes,
      encode_string_list(&p.alt_names).map_err(domain)?,
      p.birth_order,
      p.generation,
      p.parent_union_id.map(encode_uuid),
      encode_dt(p.created_at),
    ],
  )?;
  Ok(())
}

fn set_generation(
  conn: &rusqlite::Connection,
  id: Uuid,
  generation: i64,
) -> CallResult<()> {
  conn.execute(
    "UPDATE persons SET generation = ?1 WHERE person_id = ?2",
    params![generation, encode_uuid(id)],
  )?;
  Ok(())
}

fn set_birth_order(
  conn: &rusqlite::Connection,
  id: Uuid,
  birth_order: i64,
) -> CallResult<()> {
  conn.execute(
    "UPDATE persons SET birth_order = ?1 WHERE person_id = ?2",
    params![birth_order, encode_uuid(id)],
  )?;
  Ok(())
}

/// Reuse a union where `husband` is already the husband, else create one.
fn find_or_create_union(
  conn: &rusqlite::Connection,
  husband: Uuid,
  now: DateTime<Utc>,
) -> CallResult<Uuid> {
  let existing: Option<String> = conn
    .query_row(
      "SELECT union_id FROM unions WHERE husband_id = ?1 \
       ORDER BY created_at, union_id LIMIT 1",
      params![encode_uuid(husband)],
      |row| row.get(0),
    )
    .optional()?;

  if let Some(id_str) = existing {
    return crate::encode::decode_uuid(&id_str).map_err(domain);
  }

  let union_id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO unions (union_id, husband_id, wife_id, created_at) \
     VALUES (?1, ?2, NULL, ?3)",
    params![encode_uuid(union_id), encode_uuid(husband), encode_dt(now)],
  )?;
  Ok(union_id)
}

/// Children count resolved through the union hop, straight from SQL.
fn children_count(conn: &rusqlite::Connection, id: Uuid) -> CallResult<usize> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM persons c \
     JOIN unions u ON c.parent_union_id = u.union_id \
     WHERE u.husband_id = ?1",
    params![encode_uuid(id)],
    |row| row.get(0),
  )?;
  Ok(count as usize)
}

/// Remove a person plus their own (necessarily childless) unions; unions
/// where they are the wife keep the record with the reference cleared.
fn delete_person_rows(conn: &rusqlite::Connection, id: Uuid) -> CallResult<()> {
  let id_str = encode_uuid(id);
  conn.execute(
    "UPDATE unions SET wife_id = NULL WHERE wife_id = ?1",
    params![id_str],
  )?;
  conn.execute("DELETE FROM unions WHERE husband_id = ?1", params![id_str])?;
  conn.execute("DELETE FROM persons WHERE person_id = ?1", params![id_str])?;
  Ok(())
}

fn insert_request_row(
  conn: &rusqlite::Connection,
  r: &ChangeRequest,
) -> CallResult<()> {
  conn.execute(
    "INSERT INTO requests (
       request_id, contributor, ancestor_id, status, justification,
       proof_url, reviewer, review_notes, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(r.request_id),
      r.contributor,
      encode_uuid(r.ancestor_id),
      encode_request_status(r.status),
      r.justification,
      r.proof_url,
      r.reviewer,
      r.review_notes,
      encode_dt(r.created_at),
      encode_dt(r.updated_at),
    ],
  )?;
  Ok(())
}

fn update_request_row(
  conn: &rusqlite::Connection,
  r: &ChangeRequest,
) -> CallResult<()> {
  conn.execute(
    "UPDATE requests SET status = ?1, reviewer = ?2, review_notes = ?3, \
     updated_at = ?4 WHERE request_id = ?5",
    params![
      encode_request_status(r.status),
      r.reviewer,
      r.review_notes,
      encode_dt(r.updated_at),
      encode_uuid(r.request_id),
    ],
  )?;
  Ok(())
}

fn insert_proposed_row(
  conn: &rusqlite::Connection,
  p: &ProposedPerson,
) -> CallResult<()> {
  conn.execute(
    "INSERT INTO proposed_persons (
       proposed_id, request_id, original_person_id, parent_proposed_id,
       name, gender, status, notes, alt_names, birth_order, generation,
       mother_name, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    params![
      encode_uuid(p.proposed_id),
      encode_uuid(p.request_id),
      p.original_person_id.map(encode_uuid),
      p.parent_proposed_id.map(encode_uuid),
      p.name,
      encode_gender(p.gender),
      encode_life_status(p.status),
      p.notes,
      encode_string_list(&p.alt_names).map_err(domain)?,
      p.birth_order,
      p.generation,
      p.mother_name,
      encode_dt(p.created_at),
    ],
  )?;
  Ok(())
}

fn update_proposed_row(
  conn: &rusqlite::Connection,
  p: &ProposedPerson,
) -> CallResult<()> {
  conn.execute(
    "UPDATE proposed_persons SET name = ?1, gender = ?2, status = ?3, \
     notes = ?4, alt_names = ?5, birth_order = ?6, mother_name = ?7 \
     WHERE proposed_id = ?8",
    params![
      p.name,
      encode_gender(p.gender),
      encode_life_status(p.status),
      p.notes,
      encode_string_list(&p.alt_names).map_err(domain)?,
      p.birth_order,
      p.mother_name,
      encode_uuid(p.proposed_id),
    ],
  )?;
  Ok(())
}

fn insert_item_row(
  conn: &rusqlite::Connection,
  item: &RequestItem,
) -> CallResult<()> {
  let op_json = serde_json::to_string(&item.op)
    .map_err(|e| domain(Error::Serialization(e)))?;
  conn.execute(
    "INSERT INTO request_items (
       item_id, request_id, proposed_id, original_person_id,
       op_kind, op_json, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(item.item_id),
      encode_uuid(item.request_id),
      item.proposed_id.map(encode_uuid),
      item.original_person_id.map(encode_uuid),
      item.op.kind(),
      op_json,
      encode_dt(item.recorded_at),
    ],
  )?;
  Ok(())
}

// ─── Structural helpers ──────────────────────────────────────────────────────

/// Next free birth order at the end of a sibling list.
fn next_birth_order(siblings: &[Uuid], persons: &HashMap<Uuid, Person>) -> i64 {
  siblings
    .iter()
    .filter_map(|id| persons.get(id))
    .map(|p| p.birth_order)
    .max()
    .map_or(1, |max| max + 1)
}

/// Re-parent a person and shift their whole descendant subtree, against the
/// connection's current state. Shared by `move_person` and approval
/// reconciliation (which moves persons after creating new ones).
fn apply_move(
  conn: &rusqlite::Connection,
  id: Uuid,
  new_father_id: Option<Uuid>,
  now: DateTime<Utc>,
) -> CallResult<Person> {
  let Snapshot { persons, unions: _, index } = snapshot(conn)?;
  let mut person = persons
    .get(&id)
    .cloned()
    .ok_or_else(|| domain(Error::PersonNotFound(id)))?;

  let (new_union_id, new_generation) = match new_father_id {
    Some(father_id) => {
      if father_id == id {
        return Err(domain(Error::WouldCreateCycle { id, new_father: father_id }));
      }
      let father = persons
        .get(&father_id)
        .ok_or_else(|| domain(Error::PersonNotFound(father_id)))?;
      if index.is_descendant(father_id, id).map_err(domain)? {
        return Err(domain(Error::WouldCreateCycle { id, new_father: father_id }));
      }
      let union_id = find_or_create_union(conn, father_id, now)?;
      (Some(union_id), father.generation + 1)
    }
    None => (None, 1),
  };

  let delta = new_generation - person.generation;
  conn.execute(
    "UPDATE persons SET parent_union_id = ?1, generation = ?2 \
     WHERE person_id = ?3",
    params![new_union_id.map(encode_uuid), new_generation, encode_uuid(id)],
  )?;

  if delta != 0 {
    let changes =
      generation::propagate(&index, &persons, id, delta).map_err(domain)?;
    for change in &changes {
      set_generation(conn, change.person_id, change.generation)?;
    }
  }

  person.parent_union_id = new_union_id;
  person.generation = new_generation;
  Ok(person)
}

// ─── Review items ────────────────────────────────────────────────────────────

/// Compute the reviewable change set of a request: one item per proposed
/// person with a tracked difference, plus a deletion item for every
/// canonical person in the forked subtree whose copy was removed
/// (children-first, so reconciliation can honour the leaf-only rule).
fn compute_items(
  snap: &Snapshot,
  request: &ChangeRequest,
  proposed: &[ProposedPerson],
  now: DateTime<Utc>,
) -> Result<Vec<RequestItem>> {
  let by_id: HashMap<Uuid, ProposedPerson> = proposed
    .iter()
    .map(|p| (p.proposed_id, p.clone()))
    .collect();

  let mut items = Vec::new();
  for p in proposed {
    let after = PersonSnapshot::of_proposed(p, &by_id);
    let before = p
      .original_person_id
      .and_then(|original| snap.persons.get(&original))
      .map(|original| {
        PersonSnapshot::of_person(original, &snap.index, &snap.persons, &snap.unions)
      });
    if let Some(op) = diff_proposed(p, &after, before.as_ref()) {
      items.push(RequestItem {
        item_id:            Uuid::new_v4(),
        request_id:         request.request_id,
        proposed_id:        Some(p.proposed_id),
        original_person_id: p.original_person_id,
        op,
        recorded_at:        now,
      });
    }
  }

  // Canonical persons inside the forked subtree with no surviving copy are
  // proposed deletions. Persons created after the request never had a copy
  // to begin with and are excluded.
  let copied: HashSet<Uuid> =
    proposed.iter().filter_map(|p| p.original_person_id).collect();
  if snap.persons.contains_key(&request.ancestor_id) {
    let mut in_subtree = vec![request.ancestor_id];
    in_subtree.extend(snap.index.descendants_of(request.ancestor_id)?);

    let mut removed: Vec<&Person> = in_subtree
      .iter()
      .filter(|id| !copied.contains(id))
      .filter_map(|id| snap.persons.get(id))
      .filter(|person| person.created_at <= request.created_at)
      .collect();
    removed.sort_by_key(|p| std::cmp::Reverse(p.generation));

    for person in removed {
      let before =
        PersonSnapshot::of_person(person, &snap.index, &snap.persons, &snap.unions);
      items.push(RequestItem {
        item_id:            Uuid::new_v4(),
        request_id:         request.request_id,
        proposed_id:        None,
        original_person_id: Some(person.person_id),
        op:                 ChangeOp::Delete { before },
        recorded_at:        now,
      });
    }
  }

  Ok(items)
}

/// Apply approved items to the canonical records: scalar edits, then new
/// persons (in proposal-row order so fathers precede children), then
/// father moves, then deletions. Deletions never bypass the leaf-only rule;
/// a still-parenting person is skipped with a warning.
fn reconcile(
  conn: &rusqlite::Connection,
  proposed: &[ProposedPerson],
  items: &[RequestItem],
  now: DateTime<Utc>,
) -> CallResult<()> {
  let by_id: HashMap<Uuid, &ProposedPerson> =
    proposed.iter().map(|p| (p.proposed_id, p)).collect();
  let mut canonical_of: HashMap<Uuid, Uuid> = proposed
    .iter()
    .filter_map(|p| p.original_person_id.map(|original| (p.proposed_id, original)))
    .collect();

  // Scalar edits.
  for item in items {
    let ChangeOp::Edit { changed, after, .. } = &item.op else { continue };
    let Some(person_id) = item.original_person_id else { continue };
    let id_str = encode_uuid(person_id);

    if changed.contains(&TrackedField::Name) {
      conn.execute(
        "UPDATE persons SET name = ?1 WHERE person_id = ?2",
        params![after.name, id_str],
      )?;
    }
    if changed.contains(&TrackedField::Notes) {
      conn.execute(
        "UPDATE persons SET notes = ?1 WHERE person_id = ?2",
        params![after.notes, id_str],
      )?;
    }
    if changed.contains(&TrackedField::BirthOrder) {
      set_birth_order(conn, person_id, after.birth_order)?;
    }
    if changed.contains(&TrackedField::MotherName) {
      // The mother name lives on the wife record of the parent union; a
      // rename there is a separate review concern.
      tracing::warn!(
        %person_id,
        "approved mother-name change must be applied to the wife record"
      );
    }
  }

  // New persons, in row order: a new person's father is either a copy of an
  // existing person or a new person inserted earlier in the same proposal.
  for p in proposed {
    if p.original_person_id.is_some() {
      continue;
    }
    let father_canonical = p
      .parent_proposed_id
      .and_then(|parent| canonical_of.get(&parent))
      .copied();
    let Some(father_id) = father_canonical else {
      tracing::warn!(
        proposed_id = %p.proposed_id,
        "skipping new person: proposed father has no canonical counterpart"
      );
      continue;
    };
    let father_generation: Option<i64> = conn
      .query_row(
        "SELECT generation FROM persons WHERE person_id = ?1",
        params![encode_uuid(father_id)],
        |row| row.get(0),
      )
      .optional()?;
    let Some(father_generation) = father_generation else {
      tracing::warn!(
        proposed_id = %p.proposed_id,
        "skipping new person: canonical father was deleted"
      );
      continue;
    };

    let union_id = find_or_create_union(conn, father_id, now)?;
    let person = Person {
      person_id:       Uuid::new_v4(),
      name:            p.name.clone(),
      gender:          p.gender,
      status:          p.status,
      notes:           p.notes.clone(),
      alt_names:       p.alt_names.clone(),
      birth_order:     p.birth_order,
      generation:      father_generation + 1,
      parent_union_id: Some(union_id),
      created_at:      now,
    };
    insert_person_row(conn, &person)?;
    canonical_of.insert(p.proposed_id, person.person_id);
  }

  // Father moves, each against the fresh post-insert state.
  for item in items {
    let ChangeOp::Edit { changed, .. } = &item.op else { continue };
    if !changed.contains(&TrackedField::Father) {
      continue;
    }
    let (Some(person_id), Some(proposed_id)) =
      (item.original_person_id, item.proposed_id)
    else {
      continue;
    };
    let Some(row) = by_id.get(&proposed_id) else { continue };

    let target = match row.parent_proposed_id {
      None => None,
      Some(parent) => match canonical_of.get(&parent) {
        Some(canonical) => Some(*canonical),
        None => {
          tracing::warn!(
            %person_id,
            "skipping move: proposed father has no canonical counterpart"
          );
          continue;
        }
      },
    };
    apply_move(conn, person_id, target, now)?;
  }

  // Deletions (children-first from compute_items).
  for item in items {
    if item.proposed_id.is_some() {
      // Upstream deletion — the canonical row is already gone.
      continue;
    }
    let (ChangeOp::Delete { .. }, Some(person_id)) =
      (&item.op, item.original_person_id)
    else {
      continue;
    };
    let remaining = children_count(conn, person_id)?;
    if remaining > 0 {
      tracing::warn!(
        %person_id,
        children = remaining,
        "skipping approved deletion: person still has children"
      );
      continue;
    }
    delete_person_rows(conn, person_id)?;
  }

  Ok(())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tarombo lineage store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(from_call)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(from_call)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread, translating smuggled domain errors
  /// back out on this side.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> CallResult<T> + Send + 'static,
  {
    self.conn.call(f).await.map_err(from_call)
  }

  /// Shared status-transition path for submit/cancel/reject.
  async fn transition(
    &self,
    id: Uuid,
    to: RequestStatus,
    reviewer: Option<String>,
    notes: Option<String>,
  ) -> Result<ChangeRequest> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut request = load_request(&tx, id)?
          .ok_or_else(|| domain(Error::RequestNotFound(id)))?;
        if !request.status.can_transition_to(to) {
          return Err(domain(Error::InvalidTransition {
            from: request.status,
            to,
          }));
        }
        request.status = to;
        request.updated_at = now;
        if reviewer.is_some() {
          request.reviewer = reviewer;
          request.review_notes = notes;
        }
        update_request_row(&tx, &request)?;
        tx.commit()?;
        Ok(request)
      })
      .await
  }

  /// Load a request and fail unless it is still editable.
  fn open_request(
    conn: &rusqlite::Connection,
    id: Uuid,
  ) -> CallResult<ChangeRequest> {
    let request =
      load_request(conn, id)?.ok_or_else(|| domain(Error::RequestNotFound(id)))?;
    if request.status.is_terminal() {
      return Err(domain(Error::RequestClosed(id)));
    }
    Ok(request)
  }
}

// ─── LineageStore impl ───────────────────────────────────────────────────────

impl LineageStore for SqliteStore {
  // ── Persons ────────────────────────────────────────────────────────────

  async fn list_persons(&self) -> Result<Vec<Person>> {
    self.call(|conn| load_persons(conn)).await
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    self.call(move |conn| get_person_row(conn, id)).await
  }

  async fn add_person(&self, input: NewPerson) -> Result<Person> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let snap = snapshot(&tx)?;

        let (parent_union_id, generation, birth_order) = match input.father_id {
          Some(father_id) => {
            let father = snap
              .persons
              .get(&father_id)
              .ok_or_else(|| domain(Error::PersonNotFound(father_id)))?;
            let union_id = find_or_create_union(&tx, father_id, now)?;
            let birth_order = input.birth_order.unwrap_or_else(|| {
              next_birth_order(snap.index.children_of(father_id), &snap.persons)
            });
            (Some(union_id), father.generation + 1, birth_order)
          }
          None => {
            // Legacy imports may carry a non-1 root generation.
            let generation = input.generation.unwrap_or(1).max(1);
            let birth_order = input.birth_order.unwrap_or_else(|| {
              next_birth_order(snap.index.roots(), &snap.persons)
            });
            (None, generation, birth_order)
          }
        };

        let person = Person {
          person_id: Uuid::new_v4(),
          name: input.name,
          gender: input.gender,
          status: input.status,
          notes: input.notes,
          alt_names: input.alt_names,
          birth_order,
          generation,
          parent_union_id,
          created_at: now,
        };
        insert_person_row(&tx, &person)?;
        tx.commit()?;
        Ok(person)
      })
      .await
  }

  async fn update_person(&self, id: Uuid, patch: PersonUpdate) -> Result<Person> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut person = get_person_row(&tx, id)?
          .ok_or_else(|| domain(Error::PersonNotFound(id)))?;
        patch.apply(&mut person);
        tx.execute(
          "UPDATE persons SET name = ?1, gender = ?2, status = ?3, \
           notes = ?4, alt_names = ?5, birth_order = ?6 WHERE person_id = ?7",
          params![
            person.name,
            encode_gender(person.gender),
            encode_life_status(person.status),
            person.notes,
            encode_string_list(&person.alt_names).map_err(domain)?,
            person.birth_order,
            encode_uuid(id),
          ],
        )?;
        tx.commit()?;
        Ok(person)
      })
      .await
  }

  async fn move_person(
    &self,
    id: Uuid,
    new_father_id: Option<Uuid>,
  ) -> Result<Person> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let person = apply_move(&tx, id, new_father_id, now)?;
        tx.commit()?;
        Ok(person)
      })
      .await
  }

  async fn delete_person(&self, id: Uuid) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let snap = snapshot(&tx)?;
        if !snap.persons.contains_key(&id) {
          return Err(domain(Error::PersonNotFound(id)));
        }
        let count = snap.index.children_of(id).len();
        if count > 0 {
          return Err(domain(Error::HasChildren { id, count }));
        }
        delete_person_rows(&tx, id)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn reorder_sibling(&self, id: Uuid, direction: Direction) -> Result<bool> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let snap = snapshot(&tx)?;
        if !snap.persons.contains_key(&id) {
          return Err(domain(Error::PersonNotFound(id)));
        }

        // Fellow roots count as siblings for ordering purposes.
        let siblings: Vec<Uuid> = match snap.index.father_of(id) {
          Some(father) => snap.index.children_of(father).to_vec(),
          None => snap.index.roots().to_vec(),
        };
        let position = siblings
          .iter()
          .position(|s| *s == id)
          .ok_or_else(|| domain(Error::PersonNotFound(id)))?;

        let neighbour_position = match direction {
          Direction::Up => position.checked_sub(1),
          Direction::Down => {
            (position + 1 < siblings.len()).then_some(position + 1)
          }
        };
        let Some(neighbour_position) = neighbour_position else {
          // Already first/last — success with no-op semantics.
          return Ok(false);
        };

        let neighbour = siblings[neighbour_position];
        let mine = snap.persons[&id].birth_order;
        let theirs = snap.persons[&neighbour].birth_order;

        // Plain swap; with duplicate stored orders (legacy data) nudge past
        // the neighbour instead so the visible order actually changes.
        let (new_mine, new_theirs) = if mine == theirs {
          match direction {
            Direction::Up => (mine - 1, theirs),
            Direction::Down => (mine + 1, theirs),
          }
        } else {
          (theirs, mine)
        };

        set_birth_order(&tx, id, new_mine)?;
        set_birth_order(&tx, neighbour, new_theirs)?;
        tx.commit()?;
        Ok(true)
      })
      .await
  }

  async fn children_of(&self, id: Uuid) -> Result<Vec<Person>> {
    self
      .call(move |conn| {
        if get_person_row(conn, id)?.is_none() {
          return Err(domain(Error::PersonNotFound(id)));
        }
        let mut stmt = conn.prepare(
          "SELECT c.person_id, c.name, c.gender, c.status, c.notes, \
                  c.alt_names, c.birth_order, c.generation, \
                  c.parent_union_id, c.created_at \
           FROM persons c \
           JOIN unions u ON c.parent_union_id = u.union_id \
           WHERE u.husband_id = ?1 \
           ORDER BY c.birth_order, c.person_id",
        )?;
        let raws = stmt
          .query_map(params![encode_uuid(id)], raw_person)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws
          .into_iter()
          .map(|r| r.into_person().map_err(domain))
          .collect()
      })
      .await
  }

  // ── Unions ─────────────────────────────────────────────────────────────

  async fn list_unions(&self) -> Result<Vec<Union>> {
    self.call(|conn| load_unions(conn)).await
  }

  async fn get_union(&self, id: Uuid) -> Result<Option<Union>> {
    self
      .call(move |conn| {
        let raw = conn
          .query_row(
            "SELECT union_id, husband_id, wife_id, created_at \
             FROM unions WHERE union_id = ?1",
            params![encode_uuid(id)],
            raw_union,
          )
          .optional()?;
        raw.map(|r| r.into_union().map_err(domain)).transpose()
      })
      .await
  }

  // ── Generation maintenance ─────────────────────────────────────────────

  async fn recompute_generations(&self, dry_run: bool) -> Result<RecomputeReport> {
    let (examined, plan) = self
      .call(|conn| {
        let snap = snapshot(conn)?;
        let plan = generation::recompute(&snap.index, &snap.persons);
        Ok((snap.persons.len(), plan))
      })
      .await?;

    for warning in &plan.warnings {
      tracing::warn!(warning = %warning, "lineage integrity");
    }

    if !dry_run {
      // Bounded batches: an interrupted pass leaves consistent partial
      // progress and re-running converges on the same state.
      for batch in plan.changes.chunks(RECOMPUTE_BATCH) {
        let batch: Vec<generation::GenerationChange> = batch.to_vec();
        self
          .call(move |conn| {
            let tx = conn.transaction()?;
            for change in &batch {
              set_generation(&tx, change.person_id, change.generation)?;
            }
            tx.commit()?;
            Ok(())
          })
          .await?;
      }
      tracing::info!(
        changed = plan.changes.len(),
        "generation recompute committed"
      );
    }

    Ok(RecomputeReport {
      examined,
      changed: plan.changes.len(),
      dry_run,
      warnings: plan.warnings,
    })
  }

  // ── Change requests ────────────────────────────────────────────────────

  async fn create_request(
    &self,
    input: NewRequest,
  ) -> Result<(ChangeRequest, Vec<ProposedPerson>)> {
    let now = Utc::now();
    let request_id = Uuid::new_v4();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;

        // At most one open request per contributor, checked inside the
        // creating transaction.
        let open: i64 = tx.query_row(
          "SELECT COUNT(*) FROM requests \
           WHERE contributor = ?1 AND status IN ('pending', 'in_review')",
          params![input.contributor],
          |row| row.get(0),
        )?;
        if open > 0 {
          return Err(domain(Error::ActiveRequestExists {
            contributor: input.contributor,
          }));
        }

        let snap = snapshot(&tx)?;
        let copies = fork_plan(
          &snap.index,
          &snap.persons,
          &snap.unions,
          input.ancestor_id,
          request_id,
          now,
        )
        .map_err(domain)?;

        let request = ChangeRequest {
          request_id,
          contributor: input.contributor,
          ancestor_id: input.ancestor_id,
          status: RequestStatus::Pending,
          justification: input.justification,
          proof_url: input.proof_url,
          reviewer: None,
          review_notes: None,
          created_at: now,
          updated_at: now,
        };
        insert_request_row(&tx, &request)?;
        for copy in &copies {
          insert_proposed_row(&tx, copy)?;
        }
        tx.commit()?;
        Ok((request, copies))
      })
      .await
  }

  async fn get_request(&self, id: Uuid) -> Result<Option<ChangeRequest>> {
    self.call(move |conn| load_request(conn, id)).await
  }

  async fn list_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> Result<Vec<ChangeRequest>> {
    self
      .call(move |conn| {
        let raws = if let Some(status) = status {
          let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_COLS} FROM requests WHERE status = ?1 \
             ORDER BY created_at"
          ))?;
          stmt
            .query_map(params![encode_request_status(status)], raw_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {REQUEST_COLS} FROM requests ORDER BY created_at"
          ))?;
          stmt
            .query_map([], raw_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        raws
          .into_iter()
          .map(|r| r.into_request().map_err(domain))
          .collect()
      })
      .await
  }

  async fn submit_request(&self, id: Uuid) -> Result<ChangeRequest> {
    self.transition(id, RequestStatus::InReview, None, None).await
  }

  async fn cancel_request(&self, id: Uuid) -> Result<ChangeRequest> {
    self.transition(id, RequestStatus::Cancelled, None, None).await
  }

  async fn reject_request(
    &self,
    id: Uuid,
    reviewer: String,
    notes: Option<String>,
  ) -> Result<ChangeRequest> {
    self
      .transition(id, RequestStatus::Rejected, Some(reviewer), notes)
      .await
  }

  async fn approve_request(
    &self,
    id: Uuid,
    reviewer: String,
    notes: Option<String>,
  ) -> Result<Vec<RequestItem>> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut request = load_request(&tx, id)?
          .ok_or_else(|| domain(Error::RequestNotFound(id)))?;
        if !request.status.can_transition_to(RequestStatus::Approved) {
          return Err(domain(Error::InvalidTransition {
            from: request.status,
            to:   RequestStatus::Approved,
          }));
        }

        let snap = snapshot(&tx)?;
        let proposed = load_proposed(&tx, id)?;
        let items =
          compute_items(&snap, &request, &proposed, now).map_err(domain)?;

        for item in &items {
          insert_item_row(&tx, item)?;
        }
        reconcile(&tx, &proposed, &items, now)?;

        request.status = RequestStatus::Approved;
        request.reviewer = Some(reviewer);
        request.review_notes = notes;
        request.updated_at = now;
        update_request_row(&tx, &request)?;

        tx.commit()?;
        Ok(items)
      })
      .await
  }

  // ── Proposed persons ───────────────────────────────────────────────────

  async fn list_proposed(&self, request_id: Uuid) -> Result<Vec<ProposedPerson>> {
    self
      .call(move |conn| {
        if load_request(conn, request_id)?.is_none() {
          return Err(domain(Error::RequestNotFound(request_id)));
        }
        load_proposed(conn, request_id)
      })
      .await
  }

  async fn add_proposed_person(
    &self,
    request_id: Uuid,
    input: NewProposedPerson,
  ) -> Result<ProposedPerson> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        SqliteStore::open_request(&tx, request_id)?;

        let parent = get_proposed_row(&tx, input.parent_proposed_id)?
          .filter(|p| p.request_id == request_id)
          .ok_or_else(|| domain(Error::ProposedNotFound(input.parent_proposed_id)))?;

        let birth_order = match input.birth_order {
          Some(order) => order,
          None => {
            let max: Option<i64> = tx.query_row(
              "SELECT MAX(birth_order) FROM proposed_persons \
               WHERE parent_proposed_id = ?1",
              params![encode_uuid(parent.proposed_id)],
              |row| row.get(0),
            )?;
            max.map_or(1, |max| max + 1)
          }
        };

        let proposed = ProposedPerson {
          proposed_id: Uuid::new_v4(),
          request_id,
          original_person_id: None,
          parent_proposed_id: Some(parent.proposed_id),
          name: input.name,
          gender: input.gender,
          status: input.status,
          notes: input.notes,
          alt_names: input.alt_names,
          birth_order,
          generation: parent.generation + 1,
          mother_name: input.mother_name,
          created_at: now,
        };
        insert_proposed_row(&tx, &proposed)?;
        tx.commit()?;
        Ok(proposed)
      })
      .await
  }

  async fn update_proposed_person(
    &self,
    request_id: Uuid,
    proposed_id: Uuid,
    patch: ProposedUpdate,
  ) -> Result<ProposedPerson> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        SqliteStore::open_request(&tx, request_id)?;

        let mut proposed = get_proposed_row(&tx, proposed_id)?
          .filter(|p| p.request_id == request_id)
          .ok_or_else(|| domain(Error::ProposedNotFound(proposed_id)))?;
        patch.apply(&mut proposed);
        update_proposed_row(&tx, &proposed)?;
        tx.commit()?;
        Ok(proposed)
      })
      .await
  }

  async fn delete_proposed_person(
    &self,
    request_id: Uuid,
    proposed_id: Uuid,
  ) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        SqliteStore::open_request(&tx, request_id)?;

        let exists = get_proposed_row(&tx, proposed_id)?
          .filter(|p| p.request_id == request_id)
          .is_some();
        if !exists {
          return Err(domain(Error::ProposedNotFound(proposed_id)));
        }

        // Leaf-within-the-copy: children are counted in the proposed set,
        // not the canonical one.
        let count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM proposed_persons WHERE parent_proposed_id = ?1",
          params![encode_uuid(proposed_id)],
          |row| row.get(0),
        )?;
        if count > 0 {
          return Err(domain(Error::HasChildren {
            id:    proposed_id,
            count: count as usize,
          }));
        }

        tx.execute(
          "DELETE FROM proposed_persons WHERE proposed_id = ?1",
          params![encode_uuid(proposed_id)],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn diff_request(&self, request_id: Uuid) -> Result<Vec<RequestItem>> {
    let now = Utc::now();
    self
      .call(move |conn| {
        let request = load_request(conn, request_id)?
          .ok_or_else(|| domain(Error::RequestNotFound(request_id)))?;
        let snap = snapshot(conn)?;
        let proposed = load_proposed(conn, request_id)?;
        compute_items(&snap, &request, &proposed, now).map_err(domain)
      })
      .await
  }

  async fn list_request_items(&self, request_id: Uuid) -> Result<Vec<RequestItem>> {
    self
      .call(move |conn| {
        if load_request(conn, request_id)?.is_none() {
          return Err(domain(Error::RequestNotFound(request_id)));
        }
        let mut stmt = conn.prepare(
          "SELECT item_id, request_id, proposed_id, original_person_id, \
                  op_json, recorded_at \
           FROM request_items WHERE request_id = ?1 ORDER BY rowid",
        )?;
        let raws = stmt
          .query_map(params![encode_uuid(request_id)], raw_item)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws
          .into_iter()
          .map(|r| r.into_item().map_err(domain))
          .collect()
      })
      .await
  }
}
