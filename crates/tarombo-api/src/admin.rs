//! Administrative maintenance endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/admin/recompute?dry_run=true` | Generation recompute pass |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use tarombo_core::store::{LineageStore, RecomputeReport};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RecomputeParams {
  /// When true, compute and report only — no writes.
  #[serde(default)]
  pub dry_run: bool,
}

/// `POST /admin/recompute[?dry_run=true]`
pub async fn recompute<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<RecomputeParams>,
) -> Result<Json<RecomputeReport>, ApiError>
where
  S: LineageStore,
{
  let report = store.recompute_generations(params.dry_run).await?;
  Ok(Json(report))
}
