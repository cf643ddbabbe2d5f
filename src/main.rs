use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use training_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth::{require_bearer_auth, require_trainer_or_admin},
    routes, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let learner_api = Router::new()
        .route(
            "/api/content/:content_id/complete",
            post(routes::content::complete_content),
        )
        .route(
            "/api/content/:content_id/access",
            post(routes::content::track_access),
        )
        .route(
            "/api/modules/:module_id/quiz/submit",
            post(routes::quiz::submit_quiz),
        )
        .route("/api/leaderboard", get(routes::leaderboard::get_leaderboard))
        .route(
            "/api/leaderboard/me",
            get(routes::leaderboard::get_my_rank),
        )
        .route(
            "/api/users/me/achievements",
            get(routes::achievements::get_my_achievements),
        )
        .layer(from_fn(require_bearer_auth));

    let staff_api = Router::new()
        .route(
            "/api/admin/leaderboard/:user_id/rebuild",
            post(routes::leaderboard::rebuild_user_row),
        )
        .layer(from_fn(require_trainer_or_admin));

    let app = base_routes
        .merge(learner_api)
        .merge(staff_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
