use crate::error::{Error, Result};
use crate::models::points::PointsEntry;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only points ledger. Entries are never mutated or deleted; a user's
/// total is always recomputed as the sum over their entries, so concurrent
/// awards cannot lose updates.
#[derive(Clone)]
pub struct PointsService {
    pool: PgPool,
}

impl PointsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one immutable ledger entry. Non-positive amounts are a caller
    /// error and are rejected before any write.
    pub async fn award(&self, user_id: Uuid, points: i32, reason: &str) -> Result<PointsEntry> {
        validate_amount(points)?;

        let entry = sqlx::query_as::<_, PointsEntry>(
            r#"
            INSERT INTO user_points (id, user_id, points, reason, awarded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, points, reason, awarded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(points)
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, points, reason, "Points awarded");
        Ok(entry)
    }

    /// Sum of all entries for the user; 0 when none exist. Callers must
    /// re-read rather than cache this, concurrent awards can land between
    /// reads.
    pub async fn total_for(&self, user_id: Uuid) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(points), 0) FROM user_points WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    pub async fn history_for(&self, user_id: Uuid) -> Result<Vec<PointsEntry>> {
        let entries = sqlx::query_as::<_, PointsEntry>(
            r#"
            SELECT id, user_id, points, reason, awarded_at
            FROM user_points
            WHERE user_id = $1
            ORDER BY awarded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

fn validate_amount(points: i32) -> Result<()> {
    if points <= 0 {
        return Err(Error::InvalidAmount(points));
    }
    Ok(())
}
