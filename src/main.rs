use std::sync::Arc;

use stockpile::{
    api::routes::{AppState, router},
    config::AppConfig,
    db::Db,
    logger::init_tracing,
    metrics::counters::Counters,
    reservation::service::ReservationService,
    stock::repository_sqlx::SqlxStockRepository,
};

/// Initializes the DB pool, runs migrations, and builds the service stack.
async fn init_service(cfg: &AppConfig) -> anyhow::Result<Arc<ReservationService>> {
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.migrate().await?;

    let repo = Arc::new(SqlxStockRepository::new(db.pool.clone()));
    let service = Arc::new(ReservationService::new(
        repo,
        cfg.op_deadline_ms,
        Counters::default(),
    ));

    Ok(service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting stockpile...");

    let cfg = AppConfig::from_env();

    let service = init_service(&cfg).await?;

    let app = router(AppState { service });

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = ?e, "failed to install shutdown handler");
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
