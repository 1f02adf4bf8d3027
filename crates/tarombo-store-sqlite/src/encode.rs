//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. String lists and change
//! operations are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use tarombo_core::{
  Error, Result,
  diff::ChangeOp,
  person::{Gender, LifeStatus, Person},
  request::{ChangeRequest, ProposedPerson, RequestItem, RequestStatus},
  union::Union,
};
use uuid::Uuid;

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| Error::Decode(format!("bad uuid {s:?}: {e}")))
}

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_gender(g: Gender) -> &'static str {
  match g {
    Gender::Male => "male",
    Gender::Female => "female",
  }
}

pub fn decode_gender(s: &str) -> Result<Gender> {
  match s {
    "male" => Ok(Gender::Male),
    "female" => Ok(Gender::Female),
    other => Err(Error::Decode(format!("unknown gender: {other:?}"))),
  }
}

pub fn encode_life_status(s: LifeStatus) -> &'static str {
  match s {
    LifeStatus::Living => "living",
    LifeStatus::Deceased => "deceased",
  }
}

pub fn decode_life_status(s: &str) -> Result<LifeStatus> {
  match s {
    "living" => Ok(LifeStatus::Living),
    "deceased" => Ok(LifeStatus::Deceased),
    other => Err(Error::Decode(format!("unknown life status: {other:?}"))),
  }
}

pub fn encode_request_status(s: RequestStatus) -> &'static str {
  match s {
    RequestStatus::Pending => "pending",
    RequestStatus::InReview => "in_review",
    RequestStatus::Approved => "approved",
    RequestStatus::Rejected => "rejected",
    RequestStatus::Cancelled => "cancelled",
  }
}

pub fn decode_request_status(s: &str) -> Result<RequestStatus> {
  match s {
    "pending" => Ok(RequestStatus::Pending),
    "in_review" => Ok(RequestStatus::InReview),
    "approved" => Ok(RequestStatus::Approved),
    "rejected" => Ok(RequestStatus::Rejected),
    "cancelled" => Ok(RequestStatus::Cancelled),
    other => Err(Error::Decode(format!("unknown request status: {other:?}"))),
  }
}

// ─── String lists ────────────────────────────────────────────────────────────

pub fn encode_string_list(list: &[String]) -> Result<String> {
  Ok(serde_json::to_string(list)?)
}

pub fn decode_string_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:       String,
  pub name:            String,
  pub gender:          String,
  pub status:          String,
  pub notes:           Option<String>,
  pub alt_names:       String,
  pub birth_order:     i64,
  pub generation:      i64,
  pub parent_union_id: Option<String>,
  pub created_at:      String,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:       decode_uuid(&self.person_id)?,
      name:            self.name,
      gender:          decode_gender(&self.gender)?,
      status:          decode_life_status(&self.status)?,
      notes:           self.notes,
      alt_names:       decode_string_list(&self.alt_names)?,
      birth_order:     self.birth_order,
      generation:      self.generation,
      parent_union_id: decode_opt_uuid(self.parent_union_id.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `unions` row.
pub struct RawUnion {
  pub union_id:   String,
  pub husband_id: Option<String>,
  pub wife_id:    Option<String>,
  pub created_at: String,
}

impl RawUnion {
  pub fn into_union(self) -> Result<Union> {
    Ok(Union {
      union_id:   decode_uuid(&self.union_id)?,
      husband_id: decode_opt_uuid(self.husband_id.as_deref())?,
      wife_id:    decode_opt_uuid(self.wife_id.as_deref())?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `requests` row.
pub struct RawRequest {
  pub request_id:    String,
  pub contributor:   String,
  pub ancestor_id:   String,
  pub status:        String,
  pub justification: String,
  pub proof_url:     Option<String>,
  pub reviewer:      Option<String>,
  pub review_notes:  Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawRequest {
  pub fn into_request(self) -> Result<ChangeRequest> {
    Ok(ChangeRequest {
      request_id:    decode_uuid(&self.request_id)?,
      contributor:   self.contributor,
      ancestor_id:   decode_uuid(&self.ancestor_id)?,
      status:        decode_request_status(&self.status)?,
      justification: self.justification,
      proof_url:     self.proof_url,
      reviewer:      self.reviewer,
      review_notes:  self.review_notes,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `proposed_persons` row.
pub struct RawProposed {
  pub proposed_id:        String,
  pub request_id:         String,
  pub original_person_id: Option<String>,
  pub parent_proposed_id: Option<String>,
  pub name:               String,
  pub gender:             String,
  pub status:             String,
  pub notes:              Option<String>,
  pub alt_names:          String,
  pub birth_order:        i64,
  pub generation:         i64,
  pub mother_name:        Option<String>,
  pub created_at:         String,
}

impl RawProposed {
  pub fn into_proposed(self) -> Result<ProposedPerson> {
    Ok(ProposedPerson {
      proposed_id:        decode_uuid(&self.proposed_id)?,
      request_id:         decode_uuid(&self.request_id)?,
      original_person_id: decode_opt_uuid(self.original_person_id.as_deref())?,
      parent_proposed_id: decode_opt_uuid(self.parent_proposed_id.as_deref())?,
      name:               self.name,
      gender:             decode_gender(&self.gender)?,
      status:             decode_life_status(&self.status)?,
      notes:              self.notes,
      alt_names:          decode_string_list(&self.alt_names)?,
      birth_order:        self.birth_order,
      generation:         self.generation,
      mother_name:        self.mother_name,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `request_items` row. The `op_kind`
/// column is denormalised for querying; the payload alone round-trips.
pub struct RawItem {
  pub item_id:            String,
  pub request_id:         String,
  pub proposed_id:        Option<String>,
  pub original_person_id: Option<String>,
  pub op_json:            String,
  pub recorded_at:        String,
}

impl RawItem {
  pub fn into_item(self) -> Result<RequestItem> {
    let op: ChangeOp = serde_json::from_str(&self.op_json)?;
    Ok(RequestItem {
      item_id:            decode_uuid(&self.item_id)?,
      request_id:         decode_uuid(&self.request_id)?,
      proposed_id:        decode_opt_uuid(self.proposed_id.as_deref())?,
      original_person_id: decode_opt_uuid(self.original_person_id.as_deref())?,
      op,
      recorded_at:        decode_dt(&self.recorded_at)?,
    })
  }
}
