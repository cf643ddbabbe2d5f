use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::gamification_dto::{SubmitQuizRequest, SubmitQuizResponse};
use crate::middleware::auth::Claims;
use crate::AppState;

/// Grades and records a quiz attempt for the module's active quiz. The
/// result row is appended regardless of outcome; the gamification chain only
/// runs on a pass.
#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<SubmitQuizRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let user_id = claims.user_id()?;

    let result = state
        .quiz_service
        .submit(user_id, module_id, &req.answers)
        .await?;

    let mut response = SubmitQuizResponse {
        quiz_id: result.quiz_id,
        score: result.score,
        max_score: result.max_score,
        percentage: result.percentage,
        passed: result.passed,
        points_awarded: 0,
        badges_awarded: Vec::new(),
        quiz_badges_awarded: Vec::new(),
        module_completed: false,
        leaderboard_stale: false,
    };

    if result.passed {
        let outcome = state
            .gamification_service
            .on_quiz_passed(user_id, result.quiz_id, result.percentage)
            .await?;
        response.points_awarded = outcome.points_awarded;
        response.badges_awarded = outcome.badges_awarded;
        response.quiz_badges_awarded = outcome.quiz_badges_awarded;
        response.module_completed = outcome.module_completed;
        response.leaderboard_stale = outcome.leaderboard_stale;
    }

    Ok(Json(response).into_response())
}
