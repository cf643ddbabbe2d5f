use crate::error::Result;
use crate::models::leaderboard::LeaderboardRow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Query scope for the ranking surface. Refreshes are always global per
/// user; scoping is purely a filter applied at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardScope {
    Global,
    Employer(Uuid),
}

impl LeaderboardScope {
    fn employer_filter(&self) -> Option<Uuid> {
        match self {
            LeaderboardScope::Global => None,
            LeaderboardScope::Employer(id) => Some(*id),
        }
    }
}

/// A leaderboard entry joined with user identity and its computed rank.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RankedEntry {
    pub user_id: Uuid,
    pub name: String,
    pub total_points: i64,
    pub badges_count: i64,
    pub modules_completed: i64,
    pub quizzes_taken: i64,
    pub quizzes_passed: i64,
    pub avg_quiz_score: f64,
    pub rank: i64,
}

/// Sole writer of the leaderboard table. Every refresh recomputes the whole
/// row from the source-of-truth tables and overwrites it in one upsert, so
/// redundant refreshes are harmless and partial-update drift cannot occur.
#[derive(Clone)]
pub struct LeaderboardService {
    pool: PgPool,
}

impl LeaderboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn refresh(&self, user_id: Uuid) -> Result<LeaderboardRow> {
        let total_points: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(points), 0) FROM user_points WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let badges_count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM user_badges WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        // A module counts as completed when every content item has a
        // completed progress row and its active quiz, if one exists, has a
        // passing result. The inner join on module_content deliberately
        // leaves zero-content modules out of this count; only the
        // per-module completion check treats those as vacuously complete.
        let modules_completed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT m.id AS module_id
                FROM modules m
                JOIN module_content mc ON m.id = mc.module_id
                LEFT JOIN user_progress up
                    ON mc.id = up.content_id
                    AND up.user_id = $1
                    AND up.status = 'completed'
                GROUP BY m.id
                HAVING COUNT(mc.id) = SUM(CASE WHEN up.status = 'completed' THEN 1 ELSE 0 END)
            ) AS done
            WHERE NOT EXISTS (
                SELECT 1 FROM quizzes q
                WHERE q.module_id = done.module_id
                  AND q.is_active = TRUE
                  AND NOT EXISTS (
                      SELECT 1 FROM quiz_results qr
                      WHERE qr.user_id = $1 AND qr.quiz_id = q.id AND qr.passed = TRUE
                  )
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let (quizzes_taken, quizzes_passed, avg_quiz_score): (i64, i64, f64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(DISTINCT quiz_id),
                    COUNT(DISTINCT CASE WHEN passed = TRUE THEN quiz_id END),
                    COALESCE(AVG(CASE WHEN passed = TRUE THEN percentage END), 0.0)
                FROM quiz_results
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            INSERT INTO leaderboard
                (user_id, total_points, badges_count, modules_completed,
                 quizzes_taken, quizzes_passed, avg_quiz_score, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                total_points = EXCLUDED.total_points,
                badges_count = EXCLUDED.badges_count,
                modules_completed = EXCLUDED.modules_completed,
                quizzes_taken = EXCLUDED.quizzes_taken,
                quizzes_passed = EXCLUDED.quizzes_passed,
                avg_quiz_score = EXCLUDED.avg_quiz_score,
                last_updated = EXCLUDED.last_updated
            RETURNING user_id, total_points, badges_count, modules_completed,
                      quizzes_taken, quizzes_passed, avg_quiz_score, last_updated
            "#,
        )
        .bind(user_id)
        .bind(total_points)
        .bind(badges_count)
        .bind(modules_completed)
        .bind(quizzes_taken)
        .bind(quizzes_passed)
        .bind(avg_quiz_score)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            total_points,
            badges_count,
            modules_completed,
            "Leaderboard row refreshed"
        );
        Ok(row)
    }

    /// Rank = 1 + number of in-scope rows with strictly more points. Users
    /// with zero points are not ranked; only active participants compete.
    pub async fn rank(&self, user_id: Uuid, scope: LeaderboardScope) -> Result<Option<i64>> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"SELECT total_points FROM leaderboard WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let total = match total {
            Some(t) if t > 0 => t,
            _ => return Ok(None),
        };

        let ahead: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM leaderboard l
            JOIN users u ON u.id = l.user_id
            WHERE l.total_points > $1
              AND ($2::uuid IS NULL OR u.employer_id = $2)
            "#,
        )
        .bind(total)
        .bind(scope.employer_filter())
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(ahead + 1))
    }

    /// Top rows ordered by points, then badge count, then user id for a
    /// stable order under ties. Zero-point rows are excluded.
    pub async fn top_n(&self, scope: LeaderboardScope, n: i64) -> Result<Vec<RankedEntry>> {
        let entries = sqlx::query_as::<_, RankedEntry>(
            r#"
            SELECT
                l.user_id,
                u.name,
                l.total_points,
                l.badges_count,
                l.modules_completed,
                l.quizzes_taken,
                l.quizzes_passed,
                l.avg_quiz_score,
                RANK() OVER (ORDER BY l.total_points DESC) AS rank
            FROM leaderboard l
            JOIN users u ON u.id = l.user_id
            WHERE l.total_points > 0
              AND ($1::uuid IS NULL OR u.employer_id = $1)
            ORDER BY l.total_points DESC, l.badges_count DESC, l.user_id ASC
            LIMIT $2
            "#,
        )
        .bind(scope.employer_filter())
        .bind(n)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn row_for(&self, user_id: Uuid) -> Result<Option<LeaderboardRow>> {
        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT user_id, total_points, badges_count, modules_completed,
                   quizzes_taken, quizzes_passed, avg_quiz_score, last_updated
            FROM leaderboard
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
