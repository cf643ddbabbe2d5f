use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub gamification: GamificationConfig,
}

/// Tunables for the gamification engine. Injected into the services at
/// construction so tests can run with alternate point values and thresholds.
#[derive(Debug, Clone)]
pub struct GamificationConfig {
    pub points_for_completion: i32,
    pub points_for_quiz: i32,
    /// Distinct passed quizzes required for the quiz-master badge.
    pub quiz_master_count: i64,
    /// Point-threshold badges, kept sorted ascending so lower tiers are
    /// always evaluated before higher ones in a single pass.
    thresholds: Vec<ThresholdBadge>,
}

#[derive(Debug, Clone)]
pub struct ThresholdBadge {
    pub badge_id: String,
    pub points_required: i64,
}

impl GamificationConfig {
    pub fn new(
        points_for_completion: i32,
        points_for_quiz: i32,
        quiz_master_count: i64,
        mut thresholds: Vec<ThresholdBadge>,
    ) -> Self {
        thresholds.sort_by_key(|t| t.points_required);
        Self {
            points_for_completion,
            points_for_quiz,
            quiz_master_count,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &[ThresholdBadge] {
        &self.thresholds
    }

    /// Completing a module is worth twice the single-content award.
    pub fn points_for_module(&self) -> i32 {
        self.points_for_completion * 2
    }
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self::new(
            100,
            50,
            10,
            vec![
                ThresholdBadge { badge_id: "bronze".into(), points_required: 500 },
                ThresholdBadge { badge_id: "silver".into(), points_required: 1500 },
                ThresholdBadge { badge_id: "gold".into(), points_required: 3000 },
                ThresholdBadge { badge_id: "platinum".into(), points_required: 5000 },
            ],
        )
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = GamificationConfig::default();
        let gamification = GamificationConfig::new(
            get_env_parse_or("POINTS_FOR_COMPLETION", defaults.points_for_completion)?,
            get_env_parse_or("POINTS_FOR_QUIZ", defaults.points_for_quiz)?,
            get_env_parse_or("QUIZ_MASTER_COUNT", defaults.quiz_master_count)?,
            defaults.thresholds,
        );

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            gamification,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
