pub mod achievements;
pub mod content;
pub mod health;
pub mod leaderboard;
pub mod quiz;
