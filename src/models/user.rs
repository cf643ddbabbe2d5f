use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Owned by the auth collaborator; the gamification core only reads
/// id, role and employer affiliation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub employer_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}
