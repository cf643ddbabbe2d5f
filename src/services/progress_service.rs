use crate::error::Result;
use crate::models::progress::ProgressRecord;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Derives per-content and per-module completion state from the progress and
/// quiz-result history. Module completion is always recomputed from source
/// rows, never cached.
#[derive(Clone)]
pub struct ProgressService {
    pool: PgPool,
}

/// Outcome of a completion attempt. `newly_completed` is true for exactly
/// one of any number of concurrent or repeated calls for the same
/// (user, content) pair.
#[derive(Debug, Clone)]
pub struct ContentCompletion {
    pub record: ProgressRecord,
    pub newly_completed: bool,
}

impl ProgressService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent completion. A single conditional upsert decides the winner:
    /// the unique (user_id, content_id) constraint serializes concurrent
    /// first completions, and the status guard turns every later call into a
    /// read-only no-op. `completed_at` is set once and never overwritten.
    pub async fn record_content_completion(
        &self,
        user_id: Uuid,
        content_id: Uuid,
    ) -> Result<ContentCompletion> {
        let now = Utc::now();
        let updated = sqlx::query_as::<_, ProgressRecord>(
            r#"
            INSERT INTO user_progress
                (id, user_id, content_id, status, attempts, started_at, completed_at, last_accessed_at)
            VALUES ($1, $2, $3, 'completed', 1, $4, $4, $4)
            ON CONFLICT (user_id, content_id) DO UPDATE
            SET status = 'completed',
                completed_at = COALESCE(user_progress.completed_at, EXCLUDED.completed_at),
                last_accessed_at = EXCLUDED.last_accessed_at
            WHERE user_progress.status <> 'completed'
            RETURNING id, user_id, content_id, status, position_marker, attempts, score,
                      started_at, completed_at, last_accessed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(record) => Ok(ContentCompletion {
                record,
                newly_completed: true,
            }),
            None => {
                // The guard filtered the write: the record was already
                // completed, either before this call or by a concurrent one.
                let record = self.get_record(user_id, content_id).await?;
                Ok(ContentCompletion {
                    record,
                    newly_completed: false,
                })
            }
        }
    }

    /// Touches the progress row on any content access: bumps the attempt
    /// counter, moves the position marker, and promotes not_started to
    /// in_progress without ever demoting a completed record.
    pub async fn track_access(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        position_marker: Option<i32>,
    ) -> Result<ProgressRecord> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, ProgressRecord>(
            r#"
            INSERT INTO user_progress
                (id, user_id, content_id, status, attempts, position_marker, started_at, last_accessed_at)
            VALUES ($1, $2, $3, 'in_progress', 1, $4, $5, $5)
            ON CONFLICT (user_id, content_id) DO UPDATE
            SET attempts = user_progress.attempts + 1,
                position_marker = COALESCE(EXCLUDED.position_marker, user_progress.position_marker),
                last_accessed_at = EXCLUDED.last_accessed_at,
                status = CASE
                    WHEN user_progress.status = 'completed' THEN user_progress.status
                    ELSE 'in_progress'
                END
            RETURNING id, user_id, content_id, status, position_marker, attempts, score,
                      started_at, completed_at, last_accessed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content_id)
        .bind(position_marker)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// Recomputes module completion from source rows: every content item of
    /// the module completed, and the module's active quiz (if any) passed.
    /// A module with zero content items is complete by vacuous truth on the
    /// content side but still gated by its quiz.
    pub async fn is_module_complete(&self, user_id: Uuid, module_id: Uuid) -> Result<bool> {
        let content_total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM module_content WHERE module_id = $1"#,
        )
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;

        let content_completed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT content_id) FROM user_progress
            WHERE user_id = $1 AND status = 'completed'
              AND content_id IN (SELECT id FROM module_content WHERE module_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;

        if content_completed < content_total {
            return Ok(false);
        }

        match self.quiz_for_module(module_id).await? {
            Some(quiz_id) => self.has_passed_quiz(user_id, quiz_id).await,
            None => Ok(true),
        }
    }

    /// A quiz counts as passed when any attempt in the result history passed,
    /// regardless of later failing attempts.
    pub async fn has_passed_quiz(&self, user_id: Uuid, quiz_id: Uuid) -> Result<bool> {
        let exists: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM quiz_results
            WHERE user_id = $1 AND quiz_id = $2 AND passed = TRUE
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.is_some())
    }

    pub async fn quiz_for_module(&self, module_id: Uuid) -> Result<Option<Uuid>> {
        let quiz_id: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM quizzes WHERE module_id = $1 AND is_active = TRUE LIMIT 1"#,
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz_id)
    }

    pub async fn module_for_quiz(&self, quiz_id: Uuid) -> Result<Option<Uuid>> {
        let module_id: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT module_id FROM quizzes WHERE id = $1"#)
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(module_id)
    }

    pub async fn get_record(&self, user_id: Uuid, content_id: Uuid) -> Result<ProgressRecord> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            r#"
            SELECT id, user_id, content_id, status, position_marker, attempts, score,
                   started_at, completed_at, last_accessed_at
            FROM user_progress
            WHERE user_id = $1 AND content_id = $2
            "#,
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }
}
