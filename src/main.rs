use axum::{extract::State, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use performance_ticketing::{
    config::Config, controllers, services::release::PreemptionReleaser, AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Performance Ticketing API");

    // Подключение к БД и миграции
    let app_state = AppState::new(config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("failed to initialize application state: {e}"))?;
    info!("Database connected");

    // --- Start background tasks ---

    // Фоновая очистка просроченных лиз по фиксированному интервалу
    let releaser = Arc::new(PreemptionReleaser::new(app_state.clone()));
    task::spawn(releaser.run_scheduler());

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Performance Ticketing API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> &'static str {
    if state.db.ping().await {
        "OK"
    } else {
        "DEGRADED"
    }
}
