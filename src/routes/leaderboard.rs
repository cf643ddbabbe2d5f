use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};

use crate::dto::leaderboard_dto::{LeaderboardQuery, LeaderboardResponse, UserRankResponse};
use crate::middleware::auth::Claims;
use crate::services::leaderboard_service::LeaderboardScope;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

fn resolve_scope(query: &LeaderboardQuery, claims: &Claims) -> crate::error::Result<LeaderboardScope> {
    match query.scope.as_deref() {
        Some("employer") => {
            let employer_id = claims.employer_id.ok_or_else(|| {
                crate::error::Error::BadRequest(
                    "Employer scope requested but the caller has no employer affiliation"
                        .to_string(),
                )
            })?;
            Ok(LeaderboardScope::Employer(employer_id))
        }
        _ => Ok(LeaderboardScope::Global),
    }
}

#[axum::debug_handler]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaderboardQuery>,
) -> crate::error::Result<Response> {
    let scope = resolve_scope(&query, &claims)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let entries = state.leaderboard_service.top_n(scope, limit).await?;
    Ok(Json(LeaderboardResponse { entries }).into_response())
}

/// Staff-only rebuild of one user's leaderboard row, for repairing rows
/// left stale by a failed refresh.
#[axum::debug_handler]
pub async fn rebuild_user_row(
    State(state): State<AppState>,
    axum::extract::Path(user_id): axum::extract::Path<uuid::Uuid>,
) -> crate::error::Result<Response> {
    let row = state.leaderboard_service.refresh(user_id).await?;
    Ok(Json(row).into_response())
}

#[axum::debug_handler]
pub async fn get_my_rank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaderboardQuery>,
) -> crate::error::Result<Response> {
    let user_id = claims.user_id()?;
    let scope = resolve_scope(&query, &claims)?;

    let rank = state.leaderboard_service.rank(user_id, scope).await?;
    let row = state.leaderboard_service.row_for(user_id).await?;

    let response = UserRankResponse { user_id, rank, row };
    Ok(Json(response).into_response())
}
