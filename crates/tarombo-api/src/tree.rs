//! Handlers for tree browsing and union (marriage) display.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tree` | Whole forest, nested |
//! | `GET`  | `/tree?root=<id>` | Subtree below one person |
//! | `GET`  | `/unions/:id` | Marriage metadata for display |

use std::{collections::HashMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use tarombo_core::{
  hierarchy::{HierarchyIndex, TreeNode, build_tree},
  store::LineageStore,
  union::Union,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TreeParams {
  pub root: Option<Uuid>,
}

/// `GET /tree[?root=<id>]` — the nested read model for tree browsing.
///
/// Derived from a full snapshot; the dataset is small and slowly changing,
/// so this is a pair of list reads plus an in-memory build.
pub async fn tree<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<TreeParams>,
) -> Result<Json<Vec<TreeNode>>, ApiError>
where
  S: LineageStore,
{
  let persons: HashMap<_, _> = store
    .list_persons()
    .await?
    .into_iter()
    .map(|p| (p.person_id, p))
    .collect();
  let unions: HashMap<_, _> = store
    .list_unions()
    .await?
    .into_iter()
    .map(|u| (u.union_id, u))
    .collect();

  let index = HierarchyIndex::build(&persons, &unions);
  let nodes = build_tree(&index, &persons, params.root)?;
  Ok(Json(nodes))
}

/// `GET /unions/:id`
pub async fn union_detail<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Union>, ApiError>
where
  S: LineageStore,
{
  let union = store
    .get_union(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("union {id} not found")))?;
  Ok(Json(union))
}
