pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    badge_service::BadgeService, gamification_service::GamificationService,
    leaderboard_service::LeaderboardService, points_service::PointsService,
    progress_service::ProgressService, quiz_service::QuizService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gamification_service: GamificationService,
    pub points_service: PointsService,
    pub badge_service: BadgeService,
    pub progress_service: ProgressService,
    pub quiz_service: QuizService,
    pub leaderboard_service: LeaderboardService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let gamification = config.gamification.clone();

        let gamification_service = GamificationService::new(pool.clone(), gamification.clone());
        let points_service = PointsService::new(pool.clone());
        let badge_service = BadgeService::new(pool.clone(), gamification);
        let progress_service = ProgressService::new(pool.clone());
        let quiz_service = QuizService::new(pool.clone());
        let leaderboard_service = LeaderboardService::new(pool.clone());

        Self {
            pool,
            gamification_service,
            points_service,
            badge_service,
            progress_service,
            quiz_service,
            leaderboard_service,
        }
    }
}
