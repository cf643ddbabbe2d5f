use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteContentResponse {
    pub message: String,
    pub points_awarded: i32,
    pub badges_awarded: Vec<String>,
    pub module_completed: bool,
    pub already_completed: bool,
    pub leaderboard_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackAccessRequest {
    #[validate(range(min = 0))]
    pub position_marker: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAccessResponse {
    pub status: String,
    pub attempts: i32,
    pub position_marker: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    /// Answers keyed by question id.
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub quiz_id: uuid::Uuid,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub passed: bool,
    pub points_awarded: i32,
    pub badges_awarded: Vec<String>,
    pub quiz_badges_awarded: Vec<String>,
    pub module_completed: bool,
    pub leaderboard_stale: bool,
}
