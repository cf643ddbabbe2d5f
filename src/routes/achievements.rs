use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;

use crate::middleware::auth::Claims;
use crate::models::badge::UserBadge;
use crate::models::points::PointsEntry;
use crate::models::user::User;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AchievementsResponse {
    pub user_id: uuid::Uuid,
    pub name: String,
    pub total_points: i64,
    pub badges: Vec<UserBadge>,
    pub recent_points: Vec<PointsEntry>,
}

/// Read-only view of the caller's earned points and badges.
#[axum::debug_handler]
pub async fn get_my_achievements(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> crate::error::Result<Response> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, role, employer_id, is_active, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?;

    let total_points = state.points_service.total_for(user_id).await?;
    let badges = state.badge_service.badges_for(user_id).await?;
    let recent_points = state.points_service.history_for(user_id).await?;

    let response = AchievementsResponse {
        user_id: user.id,
        name: user.name,
        total_points,
        badges,
        recent_points,
    };
    Ok(Json(response).into_response())
}
