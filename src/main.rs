use axum::{
    routing::{get, post},
    Router,
};
use assessment_engine::repository::PgResultRepository;
use assessment_engine::services::analysis_service::{AnalysisAdapter, HttpAnalysisAdapter};
use assessment_engine::services::test_provider::HttpTestDefinitionProvider;
use assessment_engine::utils::clock::SystemClock;
use assessment_engine::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let repository = Arc::new(PgResultRepository::new(pool));
    let tests = Arc::new(HttpTestDefinitionProvider::new(
        config.test_provider_url.clone(),
        http_client.clone(),
    ));
    let analysis = config
        .analysis_service_url
        .clone()
        .map(|url| Arc::new(HttpAnalysisAdapter::new(url, http_client)) as Arc<dyn AnalysisAdapter>);
    let app_state = AppState::new(repository, tests, analysis, Arc::new(SystemClock));

    {
        let state = app_state.clone();
        let interval = Duration::from_secs(config.sweep_interval_seconds);
        tokio::spawn(async move {
            loop {
                if let Err(e) = state.session_service.sweep_expired().await {
                    tracing::error!(error = ?e, "expiry sweep error");
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let session_api = Router::new()
        .route("/api/sessions", post(routes::sessions::start_session))
        .route(
            "/api/sessions/:id",
            get(routes::sessions::get_session_status),
        )
        .route(
            "/api/sessions/:id/submit",
            post(routes::sessions::submit_session),
        )
        .route(
            "/api/sessions/:id/abandon",
            post(routes::sessions::abandon_session),
        )
        .layer(axum::middleware::from_fn_with_state(
            assessment_engine::middleware::rate_limit::SessionRateLimiter::new(config.session_rps),
            assessment_engine::middleware::rate_limit::session_rate_limit,
        ));

    let results_api = Router::new()
        .route("/api/results/:id", get(routes::results::get_result))
        .route(
            "/api/results/:id/feedback",
            post(routes::results::post_feedback),
        )
        .route("/api/results", get(routes::results::list_results))
        .route(
            "/api/applications/:id/results",
            get(routes::results::list_results_for_application),
        )
        .route(
            "/api/tests/:id/ranking",
            get(routes::results::list_test_ranking),
        );

    let app = base_routes
        .merge(session_api)
        .merge(results_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
