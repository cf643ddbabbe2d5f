use crate::config::GamificationConfig;
use crate::error::Result;
use crate::services::badge_service::BadgeService;
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::points_service::PointsService;
use crate::services::progress_service::ProgressService;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Combined result of one gamification event. `leaderboard_stale` marks a
/// partial success: everything up to the projection committed, but the
/// leaderboard row could not be refreshed and will heal on the next event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GamificationOutcome {
    pub points_awarded: i32,
    pub badges_awarded: Vec<String>,
    pub quiz_badges_awarded: Vec<String>,
    pub module_completed: bool,
    pub already_completed: bool,
    pub leaderboard_stale: bool,
}

/// Entry point for content- and quiz-completion events. Sequences ledger
/// append, badge evaluation, progress recomputation and leaderboard refresh.
/// Stages are individually durable and idempotent; a failed stage is never
/// rolled back onto its predecessors, it is simply the unit of retry.
#[derive(Clone)]
pub struct GamificationService {
    points: PointsService,
    badges: BadgeService,
    progress: ProgressService,
    leaderboard: LeaderboardService,
    config: GamificationConfig,
}

impl GamificationService {
    pub fn new(pool: PgPool, config: GamificationConfig) -> Self {
        Self {
            points: PointsService::new(pool.clone()),
            badges: BadgeService::new(pool.clone(), config.clone()),
            progress: ProgressService::new(pool.clone()),
            leaderboard: LeaderboardService::new(pool),
            config,
        }
    }

    /// Handles "content X completed by user U". Repeated or concurrent calls
    /// for the same pair award points at most once: only the call that wins
    /// the progress upsert proceeds past the first stage.
    pub async fn on_content_completed(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        module_id: Uuid,
    ) -> Result<GamificationOutcome> {
        let completion = self
            .progress
            .record_content_completion(user_id, content_id)
            .await?;

        if !completion.newly_completed {
            return Ok(GamificationOutcome {
                already_completed: true,
                ..Default::default()
            });
        }

        let mut outcome = GamificationOutcome::default();

        self.points
            .award(
                user_id,
                self.config.points_for_completion,
                &format!("Completed content {}", content_id),
            )
            .await?;
        outcome.points_awarded += self.config.points_for_completion;

        outcome.badges_awarded = self.badges.evaluate_threshold_badges(user_id).await?;

        outcome.module_completed = self.progress.is_module_complete(user_id, module_id).await?;
        if outcome.module_completed {
            // Only the request that newly completed the final content item
            // reaches this branch, so the bonus is granted once per module.
            let bonus = self.config.points_for_module();
            self.points
                .award(
                    user_id,
                    bonus,
                    &format!("Completed module {}", module_id),
                )
                .await?;
            outcome.points_awarded += bonus;

            let more = self.badges.evaluate_threshold_badges(user_id).await?;
            outcome.badges_awarded.extend(more);
        }

        outcome.leaderboard_stale = self.refresh_leaderboard_with_retry(user_id).await;
        Ok(outcome)
    }

    /// Handles a passing quiz submission. The quiz result itself was already
    /// appended by the submission handler; this only derives awards from it.
    pub async fn on_quiz_passed(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        percentage: f64,
    ) -> Result<GamificationOutcome> {
        let mut outcome = GamificationOutcome::default();

        self.points
            .award(
                user_id,
                self.config.points_for_quiz,
                &format!("Passed quiz {} with score {:.0}%", quiz_id, percentage),
            )
            .await?;
        outcome.points_awarded += self.config.points_for_quiz;

        outcome.badges_awarded = self.badges.evaluate_threshold_badges(user_id).await?;
        outcome.quiz_badges_awarded = self
            .badges
            .evaluate_quiz_badges(user_id, quiz_id, percentage)
            .await?;

        if let Some(module_id) = self.progress.module_for_quiz(quiz_id).await? {
            outcome.module_completed =
                self.progress.is_module_complete(user_id, module_id).await?;
        }

        outcome.leaderboard_stale = self.refresh_leaderboard_with_retry(user_id).await;
        Ok(outcome)
    }

    /// One retry, then give up and report the row as stale. Points and
    /// badges committed by earlier stages stay valid; the next refresh for
    /// this user recomputes everything from source tables anyway.
    async fn refresh_leaderboard_with_retry(&self, user_id: Uuid) -> bool {
        match self.leaderboard.refresh(user_id).await {
            Ok(_) => false,
            Err(first) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = ?first,
                    "Leaderboard refresh failed, retrying once"
                );
                match self.leaderboard.refresh(user_id).await {
                    Ok(_) => false,
                    Err(second) => {
                        tracing::error!(
                            user_id = %user_id,
                            error = ?second,
                            "Leaderboard refresh failed after retry, row left stale"
                        );
                        true
                    }
                }
            }
        }
    }
}
