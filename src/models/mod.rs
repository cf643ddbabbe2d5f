pub mod badge;
pub mod leaderboard;
pub mod module;
pub mod points;
pub mod progress;
pub mod quiz;
pub mod user;
