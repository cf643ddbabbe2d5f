pub mod badge_service;
pub mod gamification_service;
pub mod leaderboard_service;
pub mod points_service;
pub mod progress_service;
pub mod quiz_service;
