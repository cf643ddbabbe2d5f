use std::env;

use sqlx::PgPool;
use training_backend::config::GamificationConfig;
use training_backend::services::badge_service::BadgeService;
use training_backend::services::gamification_service::GamificationService;
use training_backend::services::leaderboard_service::{LeaderboardScope, LeaderboardService};
use training_backend::services::points_service::PointsService;
use training_backend::services::progress_service::ProgressService;
use training_backend::services::quiz_service::QuizService;
use uuid::Uuid;

/// Connects to the database configured through DATABASE_URL. Returns None
/// when no database is configured so the suite can run without one.
async fn setup() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    }
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    if env::var("JWT_SECRET").is_err() {
        env::set_var("JWT_SECRET", "test_secret_key");
    }

    // Tests share one process; only the first call initializes the config.
    let _ = training_backend::config::init_config();

    let pool = training_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    Some(pool)
}

async fn seed_user(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (id, name, email, role, is_active)
           VALUES ($1, $2, $3, 'learner', TRUE)"#,
    )
    .bind(id)
    .bind("Test Learner")
    .bind(format!("learner_{}@example.com", id))
    .execute(pool)
    .await
    .expect("seed user");
    id
}

async fn seed_module(pool: &PgPool, category: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO modules (id, title, category) VALUES ($1, $2, $3)"#)
        .bind(id)
        .bind(format!("Module {}", id))
        .bind(category)
        .execute(pool)
        .await
        .expect("seed module");
    id
}

async fn seed_content(pool: &PgPool, module_id: Uuid, position: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO module_content (id, module_id, title, content_type, position)
           VALUES ($1, $2, $3, 'video', $4)"#,
    )
    .bind(id)
    .bind(module_id)
    .bind(format!("Content {}", position))
    .bind(position)
    .execute(pool)
    .await
    .expect("seed content");
    id
}

/// One quiz with a single question worth `points`, passing at 70%.
async fn seed_quiz(pool: &PgPool, module_id: Uuid) -> (Uuid, Uuid) {
    let quiz_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO quizzes (id, module_id, title, passing_score, is_active)
           VALUES ($1, $2, 'Module quiz', 70, TRUE)"#,
    )
    .bind(quiz_id)
    .bind(module_id)
    .execute(pool)
    .await
    .expect("seed quiz");

    let question_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO quiz_questions (id, quiz_id, question_text, correct_answer, points)
           VALUES ($1, $2, 'What is 2 + 2?', '4', 10)"#,
    )
    .bind(question_id)
    .bind(quiz_id)
    .execute(pool)
    .await
    .expect("seed question");

    (quiz_id, question_id)
}

/// A quiz no longer offered; history on it must not count toward mastery.
async fn seed_retired_quiz(pool: &PgPool, module_id: Uuid) -> Uuid {
    let quiz_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO quizzes (id, module_id, title, passing_score, is_active)
           VALUES ($1, $2, 'Retired quiz', 70, FALSE)"#,
    )
    .bind(quiz_id)
    .bind(module_id)
    .execute(pool)
    .await
    .expect("seed retired quiz");
    quiz_id
}

async fn seed_badge(pool: &PgPool, badge_id: &str) {
    sqlx::query(r#"INSERT INTO badges (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING"#)
        .bind(badge_id)
        .execute(pool)
        .await
        .expect("seed badge");
}

async fn record_passing_result(pool: &PgPool, user_id: Uuid, quiz_id: Uuid) {
    sqlx::query(
        r#"INSERT INTO quiz_results
               (id, user_id, quiz_id, score, max_score, percentage, passed,
                answers, correct_answers)
           VALUES ($1, $2, $3, 8, 10, 80.0, TRUE, '{}'::jsonb, '{}'::jsonb)"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(quiz_id)
    .execute(pool)
    .await
    .expect("record passing result");
}

#[tokio::test]
async fn content_completion_is_idempotent() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Housekeeping").await;
    let content_a = seed_content(&pool, module, 1).await;
    let _content_b = seed_content(&pool, module, 2).await;

    let svc = GamificationService::new(pool.clone(), GamificationConfig::default());

    let first = svc
        .on_content_completed(user, content_a, module)
        .await
        .expect("first completion");
    assert!(!first.already_completed);
    assert_eq!(first.points_awarded, 100);
    assert!(!first.module_completed);

    let second = svc
        .on_content_completed(user, content_a, module)
        .await
        .expect("second completion");
    assert!(second.already_completed);
    assert_eq!(second.points_awarded, 0);

    let points = PointsService::new(pool.clone());
    assert_eq!(points.total_for(user).await.expect("total"), 100);

    let progress = ProgressService::new(pool);
    let record = progress.get_record(user, content_a).await.expect("record");
    assert_eq!(record.status, "completed");
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn module_bonus_awarded_when_last_content_completes() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Front Desk").await;
    let content = seed_content(&pool, module, 1).await;

    let svc = GamificationService::new(pool.clone(), GamificationConfig::default());
    let outcome = svc
        .on_content_completed(user, content, module)
        .await
        .expect("completion");

    // Single content item, no quiz: the module completes in the same call
    // and the 2x bonus lands on top of the completion award.
    assert!(outcome.module_completed);
    assert_eq!(outcome.points_awarded, 300);

    let points = PointsService::new(pool);
    assert_eq!(points.total_for(user).await.expect("total"), 300);
}

#[tokio::test]
async fn module_completion_requires_all_content_and_quiz_pass() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Food Safety").await;
    let contents = [
        seed_content(&pool, module, 1).await,
        seed_content(&pool, module, 2).await,
        seed_content(&pool, module, 3).await,
    ];
    let (quiz_id, question_id) = seed_quiz(&pool, module).await;

    let svc = GamificationService::new(pool.clone(), GamificationConfig::default());
    let progress = ProgressService::new(pool.clone());

    for content in contents {
        svc.on_content_completed(user, content, module)
            .await
            .expect("completion");
    }

    // All content done but the quiz gate still holds.
    assert!(!progress
        .is_module_complete(user, module)
        .await
        .expect("module check"));

    let quiz_svc = QuizService::new(pool.clone());
    let mut answers = std::collections::HashMap::new();
    answers.insert(question_id.to_string(), "4".to_string());
    let result = quiz_svc
        .submit(user, module, &answers)
        .await
        .expect("submit");
    assert!(result.passed);
    assert_eq!(result.percentage, 100.0);

    let outcome = svc
        .on_quiz_passed(user, quiz_id, result.percentage)
        .await
        .expect("quiz gamification");
    assert!(outcome.module_completed);
    assert_eq!(outcome.points_awarded, 50);
    assert!(outcome.quiz_badges_awarded.contains(&"quiz_perfect".to_string()));
}

#[tokio::test]
async fn failed_attempt_then_pass_uses_passing_history() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Concierge").await;
    let (quiz_id, question_id) = seed_quiz(&pool, module).await;

    let quiz_svc = QuizService::new(pool.clone());
    let progress = ProgressService::new(pool.clone());

    let mut wrong = std::collections::HashMap::new();
    wrong.insert(question_id.to_string(), "5".to_string());
    let failed = quiz_svc.submit(user, module, &wrong).await.expect("fail");
    assert!(!failed.passed);
    assert!(!progress
        .has_passed_quiz(user, quiz_id)
        .await
        .expect("pass check"));

    let mut right = std::collections::HashMap::new();
    right.insert(question_id.to_string(), "4".to_string());
    let passed = quiz_svc.submit(user, module, &right).await.expect("pass");
    assert!(passed.passed);

    // Any passing attempt in the history counts, the earlier failure does
    // not mask it.
    assert!(progress
        .has_passed_quiz(user, quiz_id)
        .await
        .expect("pass check"));

    let svc = GamificationService::new(pool, GamificationConfig::default());
    let outcome = svc
        .on_quiz_passed(user, quiz_id, passed.percentage)
        .await
        .expect("gamification");
    assert!(outcome.quiz_badges_awarded.contains(&"quiz_perfect".to_string()));
}

#[tokio::test]
async fn module_completion_requires_every_content_item() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Maintenance").await;
    let content_a = seed_content(&pool, module, 1).await;
    let content_b = seed_content(&pool, module, 2).await;
    let (quiz_id, _question_id) = seed_quiz(&pool, module).await;

    let progress = ProgressService::new(pool.clone());
    record_passing_result(&pool, user, quiz_id).await;

    // Quiz passed but one content item still open: the module is not done.
    progress
        .record_content_completion(user, content_a)
        .await
        .expect("first completion");
    assert!(!progress
        .is_module_complete(user, module)
        .await
        .expect("module check"));

    progress
        .record_content_completion(user, content_b)
        .await
        .expect("second completion");
    assert!(progress
        .is_module_complete(user, module)
        .await
        .expect("module check"));
}

#[tokio::test]
async fn category_mastery_ignores_retired_quizzes() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let category = format!("mastery{}", Uuid::new_v4().simple());
    let badge_id = format!("{}_expert", category);
    seed_badge(&pool, &badge_id).await;

    let module_a = seed_module(&pool, &category).await;
    let module_b = seed_module(&pool, &category).await;
    let module_c = seed_module(&pool, &category).await;
    let (quiz_a, _) = seed_quiz(&pool, module_a).await;
    let (quiz_b, _) = seed_quiz(&pool, module_b).await;
    let retired = seed_retired_quiz(&pool, module_c).await;

    let badges = BadgeService::new(pool.clone(), GamificationConfig::default());

    // One active quiz passed plus one retired: the retired pass must not
    // stand in for the unpassed active quiz.
    record_passing_result(&pool, user, quiz_a).await;
    record_passing_result(&pool, user, retired).await;
    let awarded = badges
        .evaluate_quiz_badges(user, quiz_a, 80.0)
        .await
        .expect("evaluate");
    assert!(!awarded.contains(&badge_id));
    assert!(!badges.has_badge(user, &badge_id).await.expect("has_badge"));

    record_passing_result(&pool, user, quiz_b).await;
    let awarded = badges
        .evaluate_quiz_badges(user, quiz_b, 80.0)
        .await
        .expect("evaluate");
    assert!(awarded.contains(&badge_id));
}

#[tokio::test]
async fn threshold_badge_awarded_exactly_once() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;

    let points = PointsService::new(pool.clone());
    let badges = BadgeService::new(pool.clone(), GamificationConfig::default());

    points.award(user, 450, "Warmup").await.expect("award");
    assert!(badges
        .evaluate_threshold_badges(user)
        .await
        .expect("evaluate")
        .is_empty());

    points.award(user, 50, "Crossed the line").await.expect("award");
    let first = badges.evaluate_threshold_badges(user).await.expect("evaluate");
    assert_eq!(first, vec!["bronze".to_string()]);

    let second = badges.evaluate_threshold_badges(user).await.expect("evaluate");
    assert!(second.is_empty());
    assert!(badges.has_badge(user, "bronze").await.expect("has_badge"));
}

#[tokio::test]
async fn concurrent_awards_lose_no_updates() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let points = PointsService::new(pool.clone());
        handles.push(tokio::spawn(async move {
            points.award(user, 10, "Concurrent award").await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("award");
    }

    let points = PointsService::new(pool);
    assert_eq!(points.total_for(user).await.expect("total"), 100);
}

#[tokio::test]
async fn concurrent_completions_pick_one_winner() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;
    let module = seed_module(&pool, "Banquets").await;
    let content = seed_content(&pool, module, 1).await;
    let _other = seed_content(&pool, module, 2).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = GamificationService::new(pool.clone(), GamificationConfig::default());
        handles.push(tokio::spawn(async move {
            svc.on_content_completed(user, content, module).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        let outcome = handle.await.expect("join").expect("completion");
        if !outcome.already_completed {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let points = PointsService::new(pool);
    assert_eq!(points.total_for(user).await.expect("total"), 100);
}

#[tokio::test]
async fn leaderboard_rank_orders_points_then_badges() {
    let Some(pool) = setup().await else { return };
    let leader = seed_user(&pool).await;
    let runner_up = seed_user(&pool).await;
    let idle = seed_user(&pool).await;

    let points = PointsService::new(pool.clone());
    points.award(leader, 90000, "Seed").await.expect("award");
    points.award(runner_up, 30000, "Seed").await.expect("award");

    let leaderboard = LeaderboardService::new(pool.clone());
    leaderboard.refresh(leader).await.expect("refresh");
    leaderboard.refresh(runner_up).await.expect("refresh");
    leaderboard.refresh(idle).await.expect("refresh");

    let leader_rank = leaderboard
        .rank(leader, LeaderboardScope::Global)
        .await
        .expect("rank");
    let runner_rank = leaderboard
        .rank(runner_up, LeaderboardScope::Global)
        .await
        .expect("rank");
    assert_eq!(leader_rank, Some(1));
    assert!(runner_rank.expect("ranked") > 1);

    // Zero points means unranked, not last place.
    assert_eq!(
        leaderboard
            .rank(idle, LeaderboardScope::Global)
            .await
            .expect("rank"),
        None
    );

    let row = leaderboard
        .row_for(leader)
        .await
        .expect("row")
        .expect("exists");
    assert_eq!(row.total_points, 90000);
}

#[tokio::test]
async fn leaderboard_ties_break_on_badge_count() {
    let Some(pool) = setup().await else { return };
    let decorated = seed_user(&pool).await;
    let plain = seed_user(&pool).await;

    let points = PointsService::new(pool.clone());
    points.award(decorated, 800_000, "Seed").await.expect("award");
    points.award(plain, 800_000, "Seed").await.expect("award");

    sqlx::query(
        r#"INSERT INTO user_badges (user_id, badge_id) VALUES ($1, 'bronze'), ($1, 'silver')"#,
    )
    .bind(decorated)
    .execute(&pool)
    .await
    .expect("seed badges");

    let leaderboard = LeaderboardService::new(pool);
    leaderboard.refresh(decorated).await.expect("refresh");
    leaderboard.refresh(plain).await.expect("refresh");

    let entries = leaderboard
        .top_n(LeaderboardScope::Global, 100)
        .await
        .expect("top_n");
    let pos = |id: Uuid| entries.iter().position(|e| e.user_id == id).expect("listed");

    // Equal points: more badges orders first, and both share a rank.
    assert!(pos(decorated) < pos(plain));
    let decorated_entry = &entries[pos(decorated)];
    let plain_entry = &entries[pos(plain)];
    assert_eq!(decorated_entry.total_points, plain_entry.total_points);
    assert_eq!(decorated_entry.rank, plain_entry.rank);
}

#[tokio::test]
async fn leaderboard_refresh_overwrites_stale_fields() {
    let Some(pool) = setup().await else { return };
    let user = seed_user(&pool).await;

    // Pre-seed a drifted row; the refresh must fully overwrite it.
    sqlx::query(
        r#"INSERT INTO leaderboard
               (user_id, total_points, badges_count, modules_completed,
                quizzes_taken, quizzes_passed, avg_quiz_score)
           VALUES ($1, 9999, 42, 7, 5, 5, 88.8)"#,
    )
    .bind(user)
    .execute(&pool)
    .await
    .expect("seed drifted row");

    let points = PointsService::new(pool.clone());
    points.award(user, 150, "Real points").await.expect("award");

    let leaderboard = LeaderboardService::new(pool);
    let row = leaderboard.refresh(user).await.expect("refresh");
    assert_eq!(row.total_points, 150);
    assert_eq!(row.badges_count, 0);
    assert_eq!(row.modules_completed, 0);
    assert_eq!(row.quizzes_taken, 0);
    assert_eq!(row.avg_quiz_score, 0.0);
}
