#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::{net::SocketAddr, sync::Arc};

use secure_scaffold::{
    app::{build_app, AppState},
    config::Config,
    settings::Settings,
    static_files::StaticPath,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load and validate configuration first (fail-fast)
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "secure-scaffold starting up"
    );

    let settings = Settings::load(config.settings.user_file.as_deref())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let static_path = StaticPath::from_env();
    let state = Arc::new(
        AppState::new(&config, &settings, static_path).map_err(|e| anyhow::anyhow!("{e}"))?,
    );

    tracing::info!(
        static_url_path = %state.static_path.url_path(),
        static_dir = %config.app.static_dir.display(),
        readme = %config.app.readme_path.display(),
        nonce_mode = ?state.csp.mode(),
        "resolved application state"
    );

    let app = build_app(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Starting server at http://{}/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
