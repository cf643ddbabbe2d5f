use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub passing_score: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub correct_answer: String,
    pub points: i32,
}

/// One immutable row per submission; multiple attempts are permitted.
/// "Has the user passed quiz Q" means any row with passed = TRUE exists,
/// not just the latest attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizResult {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub answers: JsonValue,
    pub correct_answers: JsonValue,
    pub completed_at: DateTime<Utc>,
}
