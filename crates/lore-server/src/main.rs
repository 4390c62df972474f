//! Lore memory service entry point (§4.11): load configuration, open the
//! database pool, run migrations, assemble shared state, and serve until a
//! shutdown signal arrives.

use std::sync::Arc;

use lore_auth::{CredentialResolver, JwksClient};
use lore_ratelimit::MemoryRateLimiter;
use lore_server::config::Settings;
use lore_server::state::AppStateInner;
use lore_server::{routes, state};
use lore_telemetry::Metrics;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    lore_telemetry::init_tracing(&settings.log_level, &settings.log_format);

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        auth_mode = ?settings.auth_mode,
        "starting lore-server"
    );

    let pool = lore_db::build_pool(&settings.database_url, settings.db_pool_min, settings.db_pool_max).await?;
    lore_db::run_migrations(&pool, &settings.migrations_dir).await?;

    let idp = settings.oidc_issuer.clone().map(|issuer| JwksClient::new(issuer, settings.oidc_audience.clone()));
    let resolver = CredentialResolver::new(
        pool.clone(),
        settings.auth_mode,
        idp,
        settings.oidc_org_claim.clone(),
        settings.oidc_role_claim.clone(),
    );
    let rate_limiter = MemoryRateLimiter::new(settings.rate_limit_max_requests, settings.rate_limit_window_seconds);

    let state: state::AppState = Arc::new(AppStateInner {
        pool,
        resolver,
        rate_limiter,
        metrics: Metrics::new(),
        metrics_enabled: settings.metrics_enabled,
        body_size_limit_bytes: settings.body_size_limit_bytes,
    });

    tokio::spawn(report_pool_gauges(state.clone()));

    let app = routes::build_router(state);
    let listener = TcpListener::bind(settings.addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Periodically samples the pool's configured size and idle-connection
/// count into `lore_db_pool_size`/`lore_db_pool_available` (§4.9). Runs for
/// the lifetime of the process; there's no shutdown handle because it holds
/// no resources beyond the already-shared pool and state.
async fn report_pool_gauges(state: state::AppState) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(15));
    loop {
        ticker.tick().await;
        state.metrics.set_db_pool_size(state.pool.size() as i64);
        state.metrics.set_db_pool_available(state.pool.num_idle() as i64);
    }
}

/// Waits for SIGINT or (on Unix) SIGTERM. `axum::serve`'s graceful shutdown
/// stops accepting new connections and lets in-flight requests finish
/// before this future's caller returns.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
