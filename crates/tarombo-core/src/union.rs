//! Union — the marriage hub linking a father to his children.
//!
//! Children reference a union, not a father, so a father with an unknown or
//! unrecorded spouse can still anchor children, and a future multi-spouse
//! extension needs no schema change. Both party references are optional; a
//! union with no resolvable husband anchors its children as roots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A marriage/parentage hub record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Union {
  pub union_id:   Uuid,
  pub husband_id: Option<Uuid>,
  pub wife_id:    Option<Uuid>,
  pub created_at: DateTime<Utc>,
}
