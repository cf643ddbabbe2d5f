use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::gamification_dto::{
    CompleteContentResponse, TrackAccessRequest, TrackAccessResponse,
};
use crate::middleware::auth::Claims;
use crate::models::module::ModuleContent;
use crate::AppState;

/// Marks a content item completed for the caller and runs the gamification
/// chain. Safe to call repeatedly; repeats report `already_completed` and
/// award nothing.
#[axum::debug_handler]
pub async fn complete_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(content_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let user_id = claims.user_id()?;

    let content = sqlx::query_as::<_, ModuleContent>(
        r#"
        SELECT id, module_id, title, content_type, position
        FROM module_content
        WHERE id = $1
        "#,
    )
    .bind(content_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| crate::error::Error::NotFound(format!("Content {} not found", content_id)))?;

    let outcome = state
        .gamification_service
        .on_content_completed(user_id, content_id, content.module_id)
        .await?;

    let message = if outcome.already_completed {
        "Content already completed"
    } else {
        "Content marked as completed"
    };

    let response = CompleteContentResponse {
        message: message.to_string(),
        points_awarded: outcome.points_awarded,
        badges_awarded: outcome.badges_awarded,
        module_completed: outcome.module_completed,
        already_completed: outcome.already_completed,
        leaderboard_stale: outcome.leaderboard_stale,
    };
    Ok(Json(response).into_response())
}

/// Records a content access: bumps attempts, stores the position marker and
/// moves a fresh record into in_progress.
#[axum::debug_handler]
pub async fn track_access(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(content_id): Path<Uuid>,
    Json(req): Json<TrackAccessRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let user_id = claims.user_id()?;

    let exists: Option<i32> =
        sqlx::query_scalar(r#"SELECT 1 FROM module_content WHERE id = $1"#)
            .bind(content_id)
            .fetch_optional(&state.pool)
            .await?;
    if exists.is_none() {
        return Err(crate::error::Error::NotFound(format!(
            "Content {} not found",
            content_id
        )));
    }

    let record = state
        .progress_service
        .track_access(user_id, content_id, req.position_marker)
        .await?;

    let response = TrackAccessResponse {
        status: record.status,
        attempts: record.attempts,
        position_marker: record.position_marker,
    };
    Ok(Json(response).into_response())
}
