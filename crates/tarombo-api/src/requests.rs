//! Handlers for `/requests` endpoints — the contributor proposal workflow.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/requests` | Optional `?status=pending\|in_review\|...` |
//! | `POST`   | `/requests` | Creates the request and forks the subtree |
//! | `GET`    | `/requests/:id` | 404 if not found |
//! | `POST`   | `/requests/:id/submit` | Pending → InReview |
//! | `POST`   | `/requests/:id/cancel` | Open → Cancelled |
//! | `POST`   | `/requests/:id/approve` | Body: [`ReviewBody`]; reconciles |
//! | `POST`   | `/requests/:id/reject` | Body: [`ReviewBody`] |
//! | `GET`    | `/requests/:id/persons` | Proposed persons in fork order |
//! | `POST`   | `/requests/:id/persons` | Add a person inside the proposal |
//! | `PATCH`  | `/requests/:id/persons/:pid` | Edit a copy |
//! | `DELETE` | `/requests/:id/persons/:pid` | Leaf-within-the-copy only |
//! | `GET`    | `/requests/:id/diff` | Current reviewable change set |
//! | `GET`    | `/requests/:id/items` | Items recorded at approval |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tarombo_core::{
  request::{
    ChangeRequest, NewProposedPerson, NewRequest, ProposedPerson,
    ProposedUpdate, RequestItem, RequestStatus,
  },
  store::LineageStore,
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List / create ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RequestStatus>,
}

/// `GET /requests[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ChangeRequest>>, ApiError>
where
  S: LineageStore,
{
  let requests = store.list_requests(params.status).await?;
  Ok(Json(requests))
}

/// Response body for `POST /requests`: the request plus its freshly forked
/// subtree.
#[derive(Debug, Serialize)]
pub struct CreatedRequest {
  pub request:  ChangeRequest,
  pub proposed: Vec<ProposedPerson>,
}

/// `POST /requests` — body: [`NewRequest`]. 409 when the contributor
/// already has an open request.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LineageStore,
{
  let (request, proposed) = store.create_request(body).await?;
  Ok((StatusCode::CREATED, Json(CreatedRequest { request, proposed })))
}

/// `GET /requests/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ChangeRequest>, ApiError>
where
  S: LineageStore,
{
  let request = store
    .get_request(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("request {id} not found")))?;
  Ok(Json(request))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

/// `POST /requests/:id/submit`
pub async fn submit<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ChangeRequest>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.submit_request(id).await?))
}

/// `POST /requests/:id/cancel`
pub async fn cancel<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ChangeRequest>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.cancel_request(id).await?))
}

/// JSON body for the reviewer verdict endpoints.
#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub reviewer: String,
  pub notes:    Option<String>,
}

/// `POST /requests/:id/approve` — returns the recorded change items.
pub async fn approve<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<Vec<RequestItem>>, ApiError>
where
  S: LineageStore,
{
  let items = store.approve_request(id, body.reviewer, body.notes).await?;
  Ok(Json(items))
}

/// `POST /requests/:id/reject`
pub async fn reject<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<ChangeRequest>, ApiError>
where
  S: LineageStore,
{
  let request = store.reject_request(id, body.reviewer, body.notes).await?;
  Ok(Json(request))
}

// ─── Proposed persons ─────────────────────────────────────────────────────────

/// `GET /requests/:id/persons`
pub async fn proposed_list<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProposedPerson>>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.list_proposed(id).await?))
}

/// `POST /requests/:id/persons` — body: [`NewProposedPerson`]
pub async fn proposed_create<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewProposedPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LineageStore,
{
  let proposed = store.add_proposed_person(id, body).await?;
  Ok((StatusCode::CREATED, Json(proposed)))
}

/// `PATCH /requests/:id/persons/:pid` — body: [`ProposedUpdate`]
pub async fn proposed_update<S>(
  State(store): State<Arc<S>>,
  Path((id, pid)): Path<(Uuid, Uuid)>,
  Json(body): Json<ProposedUpdate>,
) -> Result<Json<ProposedPerson>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.update_proposed_person(id, pid, body).await?))
}

/// `DELETE /requests/:id/persons/:pid`
pub async fn proposed_delete<S>(
  State(store): State<Arc<S>>,
  Path((id, pid)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: LineageStore,
{
  store.delete_proposed_person(id, pid).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Diff ─────────────────────────────────────────────────────────────────────

/// `GET /requests/:id/diff` — computed on the fly, nothing persisted.
pub async fn diff<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<RequestItem>>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.diff_request(id).await?))
}

/// `GET /requests/:id/items` — the change set recorded at approval time.
pub async fn items<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<RequestItem>>, ApiError>
where
  S: LineageStore,
{
  Ok(Json(store.list_request_items(id).await?))
}
