use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog entry, admin-managed reference data. `points_required` is NULL
/// for rule badges (perfect score, quiz master, category mastery).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub points_required: Option<i64>,
}

/// At most one row per (user, badge); badges are permanent once earned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}
