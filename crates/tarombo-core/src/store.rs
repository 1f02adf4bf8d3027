//! The `LineageStore` trait and supporting operation types.
//!
//! The trait is implemented by storage backends (e.g.
//! `tarombo-store-sqlite`). Higher layers (`tarombo-api`, `tarombo-server`)
//! depend on this abstraction, not on any concrete backend.
//!
//! Every structural mutation (add, move, delete, reorder, fork, approve) is
//! expected to execute inside one atomic transaction against the backend:
//! it either completes or leaves no trace. Methods return
//! [`crate::Error`] directly so callers can map not-found and conflict
//! outcomes to meaningful responses instead of a generic storage failure.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  generation::IntegrityWarning,
  person::{NewPerson, Person, PersonUpdate},
  request::{
    ChangeRequest, NewProposedPerson, NewRequest, ProposedPerson,
    ProposedUpdate, RequestItem, RequestStatus,
  },
  union::Union,
};

// ─── Operation types ─────────────────────────────────────────────────────────

/// Direction for a sibling reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
}

/// Outcome of a [`LineageStore::recompute_generations`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeReport {
  /// Total persons examined.
  pub examined: usize,
  /// Persons whose stored generation differed from the computed value.
  pub changed:  usize,
  /// True when no writes were performed.
  pub dry_run:  bool,
  pub warnings: Vec<IntegrityWarning>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tarombo lineage store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LineageStore: Send + Sync {
  // ── Persons ───────────────────────────────────────────────────────────

  /// All persons, unordered.
  fn list_persons(&self) -> impl Future<Output = Result<Vec<Person>>> + Send + '_;

  /// Retrieve a person by id. Returns `None` if not found.
  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>>> + Send + '_;

  /// Create and persist a new person, as a root or as a child of
  /// `input.father_id` (find-or-create union semantics). The generation is
  /// derived from the father; the birth order defaults to the end of the
  /// sibling list.
  fn add_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  /// Apply a scalar-field patch. Structural changes go through
  /// [`LineageStore::move_person`].
  fn update_person(
    &self,
    id: Uuid,
    patch: PersonUpdate,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  /// Re-parent a person under `new_father_id` (or make them a root).
  ///
  /// Rejects a move under the person themselves or any of their descendants
  /// with [`crate::Error::WouldCreateCycle`]. The person's generation and
  /// that of every descendant are updated in the same transaction.
  fn move_person(
    &self,
    id: Uuid,
    new_father_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  /// Delete a childless person. Fails with [`crate::Error::HasChildren`]
  /// otherwise; never cascades.
  fn delete_person(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send + '_;

  /// Swap birth orders with the adjacent sibling in `direction`. Returns
  /// `false` (and changes nothing) when the person is already first/last.
  fn reorder_sibling(
    &self,
    id: Uuid,
    direction: Direction,
  ) -> impl Future<Output = Result<bool>> + Send + '_;

  /// The person's children in sibling order.
  fn children_of(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Person>>> + Send + '_;

  // ── Unions ────────────────────────────────────────────────────────────

  fn list_unions(&self) -> impl Future<Output = Result<Vec<Union>>> + Send + '_;

  fn get_union(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Union>>> + Send + '_;

  // ── Generation maintenance ────────────────────────────────────────────

  /// Recompute every person's generation from the hierarchy.
  ///
  /// In dry-run mode nothing is written and the report carries what would
  /// change. In commit mode updates are applied in bounded batches, each in
  /// its own transaction; the pass is idempotent, so an interrupted run can
  /// simply be repeated.
  fn recompute_generations(
    &self,
    dry_run: bool,
  ) -> impl Future<Output = Result<RecomputeReport>> + Send + '_;

  // ── Change requests ───────────────────────────────────────────────────

  /// Create a request and immediately fork the ancestor's whole descendant
  /// subtree into proposed persons, all in one transaction. Fails with
  /// [`crate::Error::ActiveRequestExists`] if the contributor already has
  /// an open request.
  fn create_request(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<(ChangeRequest, Vec<ProposedPerson>)>> + Send + '_;

  fn get_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ChangeRequest>>> + Send + '_;

  fn list_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> impl Future<Output = Result<Vec<ChangeRequest>>> + Send + '_;

  /// `Pending → InReview`.
  fn submit_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<ChangeRequest>> + Send + '_;

  /// `Pending | InReview → Cancelled`.
  fn cancel_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<ChangeRequest>> + Send + '_;

  /// `InReview → Rejected`, recording the reviewer and their notes.
  fn reject_request(
    &self,
    id: Uuid,
    reviewer: String,
    notes: Option<String>,
  ) -> impl Future<Output = Result<ChangeRequest>> + Send + '_;

  /// `InReview → Approved`: computes the final change items, persists them,
  /// and reconciles them into canonical records — all in one transaction.
  /// Returns the recorded items.
  fn approve_request(
    &self,
    id: Uuid,
    reviewer: String,
    notes: Option<String>,
  ) -> impl Future<Output = Result<Vec<RequestItem>>> + Send + '_;

  // ── Proposed persons ──────────────────────────────────────────────────

  /// All proposed persons of a request, in insertion (breadth-first fork)
  /// order.
  fn list_proposed(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ProposedPerson>>> + Send + '_;

  /// Add a person inside an open proposal, under an existing copy.
  fn add_proposed_person(
    &self,
    request_id: Uuid,
    input: NewProposedPerson,
  ) -> impl Future<Output = Result<ProposedPerson>> + Send + '_;

  /// Patch a proposed person's scalar fields.
  fn update_proposed_person(
    &self,
    request_id: Uuid,
    proposed_id: Uuid,
    patch: ProposedUpdate,
  ) -> impl Future<Output = Result<ProposedPerson>> + Send + '_;

  /// Delete a proposed person that is a leaf within the proposed set.
  fn delete_proposed_person(
    &self,
    request_id: Uuid,
    proposed_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Compute the current reviewable change set of a request without
  /// persisting anything.
  fn diff_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RequestItem>>> + Send + '_;

  /// The change items recorded when the request was approved; empty for
  /// requests that never reached approval.
  fn list_request_items(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RequestItem>>> + Send + '_;
}
