//! Error types for `tarombo-core`.
//!
//! The taxonomy mirrors what callers can act on: not-found and conflict
//! errors are surfaced with the violated invariant spelled out in caller
//! terms; integrity errors abort the enclosing operation; storage failures
//! are generic and safely retryable.

use thiserror::Error;
use uuid::Uuid;

use crate::request::RequestStatus;

#[derive(Debug, Error)]
pub enum Error {
  // ── Not found ────────────────────────────────────────────────────────────
  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("union not found: {0}")]
  UnionNotFound(Uuid),

  #[error("change request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("proposed person not found: {0}")]
  ProposedNotFound(Uuid),

  // ── Conflicts (invariant violations) ─────────────────────────────────────
  #[error("cannot delete {id}: this person has {count} children")]
  HasChildren { id: Uuid, count: usize },

  #[error(
    "cannot move {id} under {new_father}: the new father is the person or \
     one of their descendants"
  )]
  WouldCreateCycle { id: Uuid, new_father: Uuid },

  #[error("contributor {contributor:?} already has an open change request")]
  ActiveRequestExists { contributor: String },

  #[error("request is {from:?}: cannot transition to {to:?}")]
  InvalidTransition { from: RequestStatus, to: RequestStatus },

  #[error("request {0} is closed and can no longer be edited")]
  RequestClosed(Uuid),

  // ── Integrity ────────────────────────────────────────────────────────────
  /// A traversal revisited a person, which only happens with cyclic data.
  /// The enclosing operation aborts and its transaction rolls back.
  #[error("cycle detected in lineage data at person {0}")]
  CycleDetected(Uuid),

  // ── Infrastructure ───────────────────────────────────────────────────────
  /// A stored value could not be decoded back into a domain type.
  #[error("invalid stored value: {0}")]
  Decode(String),

  /// Backend failure (constraint violation, aborted transaction, ...).
  /// The whole logical operation may be retried from a clean state.
  #[error("storage error: {0}")]
  Storage(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True for the not-found family (HTTP 404 at the API boundary).
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::PersonNotFound(_)
        | Self::UnionNotFound(_)
        | Self::RequestNotFound(_)
        | Self::ProposedNotFound(_)
    )
  }

  /// True for structural-invariant violations (HTTP 409 at the API
  /// boundary).
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::HasChildren { .. }
        | Self::WouldCreateCycle { .. }
        | Self::ActiveRequestExists { .. }
        | Self::InvalidTransition { .. }
        | Self::RequestClosed(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
