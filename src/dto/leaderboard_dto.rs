use crate::models::leaderboard::LeaderboardRow;
use crate::services::leaderboard_service::RankedEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
    /// "employer" restricts the ranking to the caller's employer;
    /// anything else (or absence) means global.
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRankResponse {
    pub user_id: uuid::Uuid,
    /// None when the user has no points yet and is therefore unranked.
    pub rank: Option<i64>,
    pub row: Option<LeaderboardRow>,
}
