use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable ledger entry. Total points for a user is the sum of their
/// entries; corrections would be compensating entries, never mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PointsEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub points: i32,
    pub reason: String,
    pub awarded_at: DateTime<Utc>,
}
