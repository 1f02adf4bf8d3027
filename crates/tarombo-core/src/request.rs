//! Change requests — contributor proposals backed by a forked subtree.
//!
//! A request references one canonical ancestor. Creating it immediately
//! copies the ancestor's whole descendant subtree into proposed persons (see
//! [`crate::fork`]); the contributor then edits the copies, never the
//! canonical rows. Review outcomes are recorded per person as
//! [`RequestItem`]s carrying typed before/after snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  diff::ChangeOp,
  person::{Gender, LifeStatus},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Review status. `Pending` and `InReview` are the open states; a
/// contributor may hold at most one open request at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
  Pending,
  InReview,
  Approved,
  Rejected,
  Cancelled,
}

impl RequestStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
  }

  /// The allowed state machine:
  /// `Pending → InReview → Approved | Rejected`, and `Cancelled` from either
  /// open state.
  pub fn can_transition_to(self, next: Self) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::InReview)
        | (Self::Pending, Self::Cancelled)
        | (Self::InReview, Self::Approved)
        | (Self::InReview, Self::Rejected)
        | (Self::InReview, Self::Cancelled)
    )
  }
}

/// A contributor-initiated unit of proposed work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
  pub request_id:    Uuid,
  /// Opaque caller identity supplied by the auth collaborator.
  pub contributor:   String,
  /// The canonical person the forked subtree is rooted at.
  pub ancestor_id:   Uuid,
  pub status:        RequestStatus,
  pub justification: String,
  /// External proof reference (document scan, registry entry, ...).
  pub proof_url:     Option<String>,
  pub reviewer:      Option<String>,
  pub review_notes:  Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::LineageStore::create_request`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
  pub contributor:   String,
  pub ancestor_id:   Uuid,
  pub justification: String,
  pub proof_url:     Option<String>,
}

// ─── Proposed persons ────────────────────────────────────────────────────────

/// A forked copy of a person, owned by exactly one request.
///
/// Copies are fully independent records. `parent_proposed_id` only ever
/// references another copy in the same fork — never a canonical id — and is
/// `None` for the fork root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedPerson {
  pub proposed_id:        Uuid,
  pub request_id:         Uuid,
  /// Back-reference to the copied canonical person; `None` for persons
  /// newly added inside the proposal.
  pub original_person_id: Option<Uuid>,
  /// Father link within the fork.
  pub parent_proposed_id: Option<Uuid>,
  pub name:               String,
  pub gender:             Gender,
  pub status:             LifeStatus,
  pub notes:              Option<String>,
  pub alt_names:          Vec<String>,
  pub birth_order:        i64,
  pub generation:         i64,
  /// Spouse name of the parent union, captured at fork time and editable in
  /// the proposal.
  pub mother_name:        Option<String>,
  pub created_at:         DateTime<Utc>,
}

/// Input to [`crate::store::LineageStore::add_proposed_person`] — a person
/// newly added inside a proposal, always under an existing copy.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProposedPerson {
  pub parent_proposed_id: Uuid,
  pub name:               String,
  pub gender:             Gender,
  #[serde(default)]
  pub status:             LifeStatus,
  pub notes:              Option<String>,
  #[serde(default)]
  pub alt_names:          Vec<String>,
  pub birth_order:        Option<i64>,
  pub mother_name:        Option<String>,
}

/// Scalar-field patch for a proposed person. Generation is derived and not
/// editable; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposedUpdate {
  pub name:        Option<String>,
  pub gender:      Option<Gender>,
  pub status:      Option<LifeStatus>,
  pub notes:       Option<String>,
  pub alt_names:   Option<Vec<String>>,
  pub birth_order: Option<i64>,
  pub mother_name: Option<String>,
}

impl ProposedUpdate {
  pub fn apply(&self, proposed: &mut ProposedPerson) {
    if let Some(name) = &self.name {
      proposed.name = name.clone();
    }
    if let Some(gender) = self.gender {
      proposed.gender = gender;
    }
    if let Some(status) = self.status {
      proposed.status = status;
    }
    if let Some(notes) = &self.notes {
      proposed.notes = Some(notes.clone());
    }
    if let Some(alt_names) = &self.alt_names {
      proposed.alt_names = alt_names.clone();
    }
    if let Some(birth_order) = self.birth_order {
      proposed.birth_order = birth_order;
    }
    if let Some(mother_name) = &self.mother_name {
      proposed.mother_name = Some(mother_name.clone());
    }
  }
}

// ─── Review items ────────────────────────────────────────────────────────────

/// One reviewable change, recorded per person when a request is approved and
/// computed on the fly for reviewer display before that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestItem {
  pub item_id:            Uuid,
  pub request_id:         Uuid,
  /// The proposed copy the item was derived from; `None` for a deletion
  /// proposed by removing the copy.
  pub proposed_id:        Option<Uuid>,
  pub original_person_id: Option<Uuid>,
  pub op:                 ChangeOp,
  pub recorded_at:        DateTime<Utc>,
}
