//! JSON REST API for Tarombo.
//!
//! Exposes an axum [`Router`] backed by any
//! [`tarombo_core::store::LineageStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tarombo_api::api_router(store.clone()))
//! ```

pub mod admin;
pub mod error;
pub mod persons;
pub mod requests;
pub mod tree;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tarombo_core::store::LineageStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: LineageStore + 'static,
{
  Router::new()
    // Persons
    .route("/persons", get(persons::list::<S>).post(persons::create::<S>))
    .route(
      "/persons/{id}",
      get(persons::get_one::<S>)
        .patch(persons::update::<S>)
        .delete(persons::remove::<S>),
    )
    .route("/persons/{id}/reorder", post(persons::reorder::<S>))
    .route("/persons/{id}/children", get(persons::children::<S>))
    // Tree browsing + marriage display
    .route("/tree", get(tree::tree::<S>))
    .route("/unions/{id}", get(tree::union_detail::<S>))
    // Change requests
    .route("/requests", get(requests::list::<S>).post(requests::create::<S>))
    .route("/requests/{id}", get(requests::get_one::<S>))
    .route("/requests/{id}/submit", post(requests::submit::<S>))
    .route("/requests/{id}/cancel", post(requests::cancel::<S>))
    .route("/requests/{id}/approve", post(requests::approve::<S>))
    .route("/requests/{id}/reject", post(requests::reject::<S>))
    .route(
      "/requests/{id}/persons",
      get(requests::proposed_list::<S>).post(requests::proposed_create::<S>),
    )
    .route(
      "/requests/{id}/persons/{pid}",
      axum::routing::patch(requests::proposed_update::<S>)
        .delete(requests::proposed_delete::<S>),
    )
    .route("/requests/{id}/diff", get(requests::diff::<S>))
    .route("/requests/{id}/items", get(requests::items::<S>))
    // Maintenance
    .route("/admin/recompute", post(admin::recompute::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tarombo_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn router() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(value) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(value.to_string())
      }
      None => Body::empty(),
    };
    let response = router
      .clone()
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn create_person(router: &Router, name: &str, father: Option<&str>) -> Value {
    let mut body = json!({ "name": name, "gender": "male" });
    if let Some(father) = father {
      body["father_id"] = json!(father);
    }
    let (status, person) = send(router, "POST", "/persons", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    person
  }

  // ── Persons ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_and_list_persons() {
    let app = router().await;
    let root = create_person(&app, "Ompu Raja", None).await;
    assert_eq!(root["generation"], 1);

    let (status, listed) = send(&app, "GET", "/persons", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn get_missing_person_returns_404() {
    let app = router().await;
    let (status, body) = send(
      &app,
      "GET",
      &format!("/persons/{}", uuid::Uuid::new_v4()),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
  }

  #[tokio::test]
  async fn child_creation_derives_generation() {
    let app = router().await;
    let root = create_person(&app, "root", None).await;
    let child =
      create_person(&app, "child", root["person_id"].as_str()).await;
    assert_eq!(child["generation"], 2);

    let (status, children) = send(
      &app,
      "GET",
      &format!("/persons/{}/children", root["person_id"].as_str().unwrap()),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children.as_array().unwrap().len(), 1);
    assert_eq!(children[0]["name"], "child");
  }

  #[tokio::test]
  async fn patch_with_father_id_moves_the_subtree() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    let r2 = create_person(&app, "R2", None).await;
    let c1 = create_person(&app, "C1", r["person_id"].as_str()).await;
    let c2 = create_person(&app, "C2", c1["person_id"].as_str()).await;

    let (status, moved) = send(
      &app,
      "PATCH",
      &format!("/persons/{}", c1["person_id"].as_str().unwrap()),
      Some(json!({ "father_id": r2["person_id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["generation"], 2);

    let (_, c2_after) = send(
      &app,
      "GET",
      &format!("/persons/{}", c2["person_id"].as_str().unwrap()),
      None,
    )
    .await;
    assert_eq!(c2_after["generation"], 3);

    let (_, r_children) = send(
      &app,
      "GET",
      &format!("/persons/{}/children", r["person_id"].as_str().unwrap()),
      None,
    )
    .await;
    assert!(r_children.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn cycle_forming_move_returns_409() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    let c1 = create_person(&app, "C1", r["person_id"].as_str()).await;

    let (status, body) = send(
      &app,
      "PATCH",
      &format!("/persons/{}", r["person_id"].as_str().unwrap()),
      Some(json!({ "father_id": c1["person_id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("descendants"));
  }

  #[tokio::test]
  async fn delete_with_children_returns_409_with_count() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    create_person(&app, "C1", r["person_id"].as_str()).await;

    let (status, body) = send(
      &app,
      "DELETE",
      &format!("/persons/{}", r["person_id"].as_str().unwrap()),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("1 children"));
  }

  #[tokio::test]
  async fn reorder_at_boundary_reports_noop() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    let c1 = create_person(&app, "C1", r["person_id"].as_str()).await;
    create_person(&app, "C2", r["person_id"].as_str()).await;

    let (status, body) = send(
      &app,
      "POST",
      &format!("/persons/{}/reorder", c1["person_id"].as_str().unwrap()),
      Some(json!({ "direction": "up" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moved"], false);
  }

  // ── Tree ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn tree_endpoint_nests_the_forest() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    create_person(&app, "C1", r["person_id"].as_str()).await;

    let (status, tree) = send(&app, "GET", "/tree", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["person"]["name"], "R");
    assert_eq!(tree[0]["children"][0]["person"]["name"], "C1");
  }

  // ── Requests ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn request_lifecycle_over_http() {
    let app = router().await;
    let r = create_person(&app, "R", None).await;
    create_person(&app, "C1", r["person_id"].as_str()).await;

    // Create: forks the subtree.
    let (status, created) = send(
      &app,
      "POST",
      "/requests",
      Some(json!({
        "contributor":   "contrib",
        "ancestor_id":   r["person_id"],
        "justification": "add a missing son",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["proposed"].as_array().unwrap().len(), 2);
    let request_id = created["request"]["request_id"].as_str().unwrap().to_string();
    let root_copy = created["proposed"][0]["proposed_id"].as_str().unwrap().to_string();

    // A second open request for the same contributor is a conflict.
    let (status, _) = send(
      &app,
      "POST",
      "/requests",
      Some(json!({
        "contributor":   "contrib",
        "ancestor_id":   r["person_id"],
        "justification": "again",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Edit the root copy; the diff picks it up.
    let (status, _) = send(
      &app,
      "PATCH",
      &format!("/requests/{request_id}/persons/{root_copy}"),
      Some(json!({ "name": "R corrected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, diff) =
      send(&app, "GET", &format!("/requests/{request_id}/diff"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diff.as_array().unwrap().len(), 1);
    assert_eq!(diff[0]["op"]["op"], "edit");
    assert_eq!(diff[0]["op"]["changed"][0], "name");

    // Submit, approve, and see the canonical record change.
    let (status, _) =
      send(&app, "POST", &format!("/requests/{request_id}/submit"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, items) = send(
      &app,
      "POST",
      &format!("/requests/{request_id}/approve"),
      Some(json!({ "reviewer": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items.as_array().unwrap().len(), 1);

    let (_, after) = send(
      &app,
      "GET",
      &format!("/persons/{}", r["person_id"].as_str().unwrap()),
      None,
    )
    .await;
    assert_eq!(after["name"], "R corrected");
  }

  // ── Admin ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recompute_dry_run_reports_over_http() {
    let app = router().await;
    let (status, root) = send(
      &app,
      "POST",
      "/persons",
      Some(json!({ "name": "stray", "gender": "male", "generation": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["generation"], 9);

    let (status, report) =
      send(&app, "POST", "/admin/recompute?dry_run=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["examined"], 1);
    assert_eq!(report["changed"], 1);
    assert_eq!(report["dry_run"], true);

    let (status, report) = send(&app, "POST", "/admin/recompute", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["changed"], 1);
  }
}
