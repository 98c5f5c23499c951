//! # MediTrust server
//!
//! Medicine marketplace backend.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export SSLCOMMERZ_STORE_ID=...
//! export SSLCOMMERZ_STORE_PASSWORD=...
//! export STORE_BACKEND=mongo
//! export MONGODB_URI=mongodb+srv://...
//!
//! # Run the server
//! meditrust
//! ```

use medi_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json");
    tracing_subscriber::registry()
        .with(json_logs.then(|| fmt::layer().json()))
        .with((!json_logs).then(fmt::layer))
        .with(filter)
        .init();

    print_banner();

    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();
    let store = state.store.clone();

    info!("Environment: {}", state.config.environment);
    info!("Store backend: {}", store.backend_name());

    let app = routes::create_router(state);

    info!("MediTrust server starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Checkout: POST http://{}/order", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

fn print_banner() {
    println!(
        r#"
  MediTrust server
  ━━━━━━━━━━━━━━━━━━━━━━━
  Medicine marketplace backend
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
