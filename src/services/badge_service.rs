use crate::config::{GamificationConfig, ThresholdBadge};
use crate::error::Result;
use crate::models::badge::{Badge, UserBadge};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

/// Decides which badges newly qualify and records the award, at most once
/// per (user, badge). The unique constraint on user_badges is the source of
/// truth: two concurrent evaluations may both see the badge as missing, but
/// only the insert that wins the conflict reports it as newly awarded.
#[derive(Clone)]
pub struct BadgeService {
    pool: PgPool,
    config: GamificationConfig,
}

impl BadgeService {
    pub fn new(pool: PgPool, config: GamificationConfig) -> Self {
        Self { pool, config }
    }

    /// Walks the point-threshold badges in ascending order and awards every
    /// eligible badge the user does not hold yet. Returns only the badges
    /// newly inserted by this call.
    pub async fn evaluate_threshold_badges(&self, user_id: Uuid) -> Result<Vec<String>> {
        let total: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(points), 0) FROM user_points WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let mut awarded = Vec::new();
        for badge_id in eligible_thresholds(total, self.config.thresholds()) {
            if self.try_award(user_id, badge_id).await? {
                awarded.push(badge_id.to_string());
            }
        }
        Ok(awarded)
    }

    /// Non-threshold rules, evaluated after a passing quiz submission.
    /// Each rule is independently idempotent through `try_award`.
    pub async fn evaluate_quiz_badges(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        percentage: f64,
    ) -> Result<Vec<String>> {
        let mut awarded = Vec::new();

        if is_perfect_score(percentage) && self.try_award(user_id, "quiz_perfect").await? {
            awarded.push("quiz_perfect".to_string());
        }

        let passed_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT quiz_id) FROM quiz_results
            WHERE user_id = $1 AND passed = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if passed_count >= self.config.quiz_master_count
            && self.try_award(user_id, "quiz_master").await?
        {
            awarded.push("quiz_master".to_string());
        }

        if let Some(badge_id) = self.evaluate_category_mastery(user_id, quiz_id).await? {
            awarded.push(badge_id);
        }

        Ok(awarded)
    }

    /// Category mastery: the user has a passing result for every active quiz
    /// whose module shares the just-passed quiz's category.
    async fn evaluate_category_mastery(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
    ) -> Result<Option<String>> {
        let category: Option<String> = sqlx::query_scalar(
            r#"
            SELECT m.category FROM quizzes q
            JOIN modules m ON q.module_id = m.id
            WHERE q.id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(category) = category else {
            return Ok(None);
        };

        let category_total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT q.id) FROM quizzes q
            JOIN modules m ON q.module_id = m.id
            WHERE m.category = $1 AND q.is_active = TRUE
            "#,
        )
        .bind(&category)
        .fetch_one(&self.pool)
        .await?;

        // Both counts range over the same quiz set. Passes on retired
        // quizzes must not pad the numerator past the active total.
        let category_passed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT qr.quiz_id) FROM quiz_results qr
            JOIN quizzes q ON qr.quiz_id = q.id
            JOIN modules m ON q.module_id = m.id
            WHERE qr.user_id = $1 AND qr.passed = TRUE AND m.category = $2
              AND q.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(&category)
        .fetch_one(&self.pool)
        .await?;

        if category_total > 0 && category_passed >= category_total {
            let badge_id = category_badge_id(&category);
            if self.try_award(user_id, &badge_id).await? {
                return Ok(Some(badge_id));
            }
        }
        Ok(None)
    }

    pub async fn has_badge(&self, user_id: Uuid, badge_id: &str) -> Result<bool> {
        let exists: Option<i32> = sqlx::query_scalar(
            r#"SELECT 1 FROM user_badges WHERE user_id = $1 AND badge_id = $2"#,
        )
        .bind(user_id)
        .bind(badge_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.is_some())
    }

    pub async fn badges_for(&self, user_id: Uuid) -> Result<Vec<UserBadge>> {
        let badges = sqlx::query_as::<_, UserBadge>(
            r#"
            SELECT user_id, badge_id, earned_at FROM user_badges
            WHERE user_id = $1
            ORDER BY earned_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(badges)
    }

    /// Records the award if the user does not already hold the badge.
    /// Returns true only when this call inserted the row; a conflict with a
    /// concurrent or earlier award is the "already earned" no-op, not an
    /// error. A badge id missing from the catalog is logged and skipped so
    /// the remaining rules still run.
    async fn try_award(&self, user_id: Uuid, badge_id: &str) -> Result<bool> {
        let catalog_entry = sqlx::query_as::<_, Badge>(
            r#"SELECT id, name, description, points_required FROM badges WHERE id = $1"#,
        )
        .bind(badge_id)
        .fetch_optional(&self.pool)
        .await?;

        if catalog_entry.is_none() {
            tracing::warn!(badge_id, "Badge missing from catalog, skipping award");
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge_id, earned_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            tracing::info!(user_id = %user_id, badge_id, "Badge awarded");
        }
        Ok(inserted)
    }
}

/// Threshold badges the total qualifies for, in ascending threshold order.
fn eligible_thresholds<'a>(total: i64, thresholds: &'a [ThresholdBadge]) -> Vec<&'a str> {
    thresholds
        .iter()
        .filter(|t| total >= t.points_required)
        .map(|t| t.badge_id.as_str())
        .collect()
}

fn is_perfect_score(percentage: f64) -> bool {
    percentage >= 100.0
}

fn category_badge_id(category: &str) -> String {
    format!("{}_expert", category.to_lowercase().replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Vec<ThresholdBadge> {
        vec![
            ThresholdBadge { badge_id: "bronze".into(), points_required: 500 },
            ThresholdBadge { badge_id: "silver".into(), points_required: 1500 },
            ThresholdBadge { badge_id: "gold".into(), points_required: 3000 },
            ThresholdBadge { badge_id: "platinum".into(), points_required: 5000 },
        ]
    }

    #[test]
    fn no_thresholds_met_below_lowest_tier() {
        assert!(eligible_thresholds(499, &thresholds()).is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert_eq!(eligible_thresholds(500, &thresholds()), vec!["bronze"]);
    }

    #[test]
    fn multiple_tiers_in_one_pass_stay_in_ascending_order() {
        assert_eq!(
            eligible_thresholds(3000, &thresholds()),
            vec!["bronze", "silver", "gold"]
        );
    }

    #[test]
    fn perfect_score_requires_full_percentage() {
        assert!(is_perfect_score(100.0));
        assert!(!is_perfect_score(99.99));
    }

    #[test]
    fn category_badge_id_normalizes_spacing_and_case() {
        assert_eq!(category_badge_id("Food Safety"), "food_safety_expert");
        assert_eq!(category_badge_id("housekeeping"), "housekeeping_expert");
    }
}
