//! SQL schema for the Tarombo SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS persons (
    person_id       TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    gender          TEXT NOT NULL,            -- 'male' | 'female'
    status          TEXT NOT NULL,            -- 'living' | 'deceased'
    notes           TEXT,
    alt_names       TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    birth_order     INTEGER NOT NULL DEFAULT 0,
    generation      INTEGER NOT NULL DEFAULT 1,  -- derived; roots are 1
    parent_union_id TEXT REFERENCES unions(union_id),
    created_at      TEXT NOT NULL             -- ISO 8601 UTC; server-assigned
);

-- The marriage hub. Children reference a union, never a father directly,
-- so a father with an unrecorded spouse can still anchor children.
CREATE TABLE IF NOT EXISTS unions (
    union_id   TEXT PRIMARY KEY,
    husband_id TEXT REFERENCES persons(person_id),
    wife_id    TEXT REFERENCES persons(person_id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS requests (
    request_id    TEXT PRIMARY KEY,
    contributor   TEXT NOT NULL,
    -- Weak reference: the ancestor may be deleted while a request is open;
    -- the diff pass classifies the orphaned copies.
    ancestor_id   TEXT NOT NULL,
    status        TEXT NOT NULL,   -- 'pending'|'in_review'|'approved'|'rejected'|'cancelled'
    justification TEXT NOT NULL,
    proof_url     TEXT,
    reviewer      TEXT,
    review_notes  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- Forked copies. Rows are inserted in breadth-first fork order, so the
-- self-referencing father link always points at an earlier row.
CREATE TABLE IF NOT EXISTS proposed_persons (
    proposed_id        TEXT PRIMARY KEY,
    request_id         TEXT NOT NULL REFERENCES requests(request_id),
    -- Weak reference to the copied canonical person; NULL for persons
    -- newly added inside the proposal.
    original_person_id TEXT,
    parent_proposed_id TEXT REFERENCES proposed_persons(proposed_id),
    name               TEXT NOT NULL,
    gender             TEXT NOT NULL,
    status             TEXT NOT NULL,
    notes              TEXT,
    alt_names          TEXT NOT NULL DEFAULT '[]',
    birth_order        INTEGER NOT NULL DEFAULT 0,
    generation         INTEGER NOT NULL DEFAULT 1,
    mother_name        TEXT,
    created_at         TEXT NOT NULL
);

-- Reviewable changes, persisted at approval time.
CREATE TABLE IF NOT EXISTS request_items (
    item_id            TEXT PRIMARY KEY,
    request_id         TEXT NOT NULL REFERENCES requests(request_id),
    proposed_id        TEXT,
    original_person_id TEXT,
    op_kind            TEXT NOT NULL,   -- 'new' | 'edit' | 'delete'
    op_json            TEXT NOT NULL,   -- full tagged ChangeOp payload
    recorded_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS persons_parent_union_idx  ON persons(parent_union_id);
CREATE INDEX IF NOT EXISTS unions_husband_idx        ON unions(husband_id);
CREATE INDEX IF NOT EXISTS unions_wife_idx           ON unions(wife_id);
CREATE INDEX IF NOT EXISTS requests_contributor_idx  ON requests(contributor, status);
CREATE INDEX IF NOT EXISTS proposed_request_idx      ON proposed_persons(request_id);
CREATE INDEX IF NOT EXISTS proposed_parent_idx       ON proposed_persons(parent_proposed_id);
CREATE INDEX IF NOT EXISTS items_request_idx         ON request_items(request_id);

PRAGMA user_version = 1;
";
