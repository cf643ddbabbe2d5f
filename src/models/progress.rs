use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per (user, content item), enforced by a unique constraint.
/// Status only moves forward: not_started -> in_progress -> completed.
/// `completed_at` is set on the first transition into completed and is
/// never cleared afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgressRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: Uuid,
    pub status: String,
    pub position_marker: Option<i32>,
    pub attempts: i32,
    pub score: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}
