use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Denormalized per-user projection over the ledger, badge, progress and
/// quiz tables. Every field is overwritten on refresh; rank is computed at
/// query time and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub total_points: i64,
    pub badges_count: i64,
    pub modules_completed: i64,
    pub quizzes_taken: i64,
    pub quizzes_passed: i64,
    pub avg_quiz_score: f64,
    pub last_updated: DateTime<Utc>,
}
