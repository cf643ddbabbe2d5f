pub mod gamification_dto;
pub mod leaderboard_dto;
