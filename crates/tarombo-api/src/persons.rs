//! Handlers for `/persons` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/persons` | All persons, unordered |
//! | `POST`   | `/persons` | Body: [`NewPerson`]; 201 + stored person |
//! | `GET`    | `/persons/:id` | 404 if not found |
//! | `PATCH`  | `/persons/:id` | Scalar patch; a `father_id` field triggers a move |
//! | `DELETE` | `/persons/:id` | 409 while the person has children |
//! | `POST`   | `/persons/:id/reorder` | Body: `{"direction":"up"}`; `{"moved":bool}` |
//! | `GET`    | `/persons/:id/children` | Children in sibling order |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tarombo_core::{
  person::{Gender, LifeStatus, NewPerson, Person, PersonUpdate},
  store::{Direction, LineageStore},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /persons`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: LineageStore,
{
  let persons = store.list_persons().await?;
  Ok(Json(persons))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /persons` — body: [`NewPerson`]
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LineageStore,
{
  let person = store.add_person(body).await?;
  Ok((StatusCode::CREATED, Json(person)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /persons/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Person>, ApiError>
where
  S: LineageStore,
{
  let person = store
    .get_person(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  Ok(Json(person))
}

// ─── Update / move ────────────────────────────────────────────────────────────

/// Distinguishes an absent `father_id` (no move) from an explicit
/// `"father_id": null` (move to root).
fn double_option<'de, D>(d: D) -> Result<Option<Option<Uuid>>, D::Error>
where
  D: Deserializer<'de>,
{
  Deserialize::deserialize(d).map(Some)
}

/// JSON body accepted by `PATCH /persons/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:        Option<String>,
  pub gender:      Option<Gender>,
  pub status:      Option<LifeStatus>,
  pub notes:       Option<String>,
  pub alt_names:   Option<Vec<String>>,
  pub birth_order: Option<i64>,
  /// Present → re-parent under this father; explicit `null` → make a root.
  #[serde(default, deserialize_with = "double_option")]
  pub father_id:   Option<Option<Uuid>>,
}

/// `PATCH /persons/:id` — scalar edits, plus an optional structural move.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Person>, ApiError>
where
  S: LineageStore,
{
  let patch = PersonUpdate {
    name:        body.name,
    gender:      body.gender,
    status:      body.status,
    notes:       body.notes,
    alt_names:   body.alt_names,
    birth_order: body.birth_order,
  };

  let mut person = None;
  if !patch.is_empty() {
    person = Some(store.update_person(id, patch).await?);
  }
  if let Some(new_father) = body.father_id {
    person = Some(store.move_person(id, new_father).await?);
  }

  match person {
    Some(person) => Ok(Json(person)),
    // Empty patch: echo the current record.
    None => {
      let person = store
        .get_person(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
      Ok(Json(person))
    }
  }
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /persons/:id`
pub async fn remove<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: LineageStore,
{
  store.delete_person(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Reorder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
  pub direction: Direction,
}

/// `POST /persons/:id/reorder` — body: `{"direction":"up"|"down"}`.
/// A boundary reorder succeeds with `{"moved": false}`.
pub async fn reorder<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReorderBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LineageStore,
{
  let moved = store.reorder_sibling(id, body.direction).await?;
  Ok(Json(json!({ "moved": moved })))
}

// ─── Children ─────────────────────────────────────────────────────────────────

/// `GET /persons/:id/children`
pub async fn children<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: LineageStore,
{
  let children = store.children_of(id).await?;
  Ok(Json(children))
}
