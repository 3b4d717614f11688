//! sheetlog-server - REST API server binary.

use std::net::SocketAddr;

use sheetlog_core::config::ImportConfig;
use sheetlog_server::{create_server, AppState};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("sheetlog_server=debug".parse()?);
    if std::env::var("SHEETLOG_LOG_JSON").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Configuration file wins over environment variables
    let config = match std::env::var("SHEETLOG_CONFIG") {
        Ok(path) => ImportConfig::from_file(&path)?,
        Err(_) => ImportConfig::from_env()?,
    };

    let host = std::env::var("SHEETLOG_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("SHEETLOG_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let state = AppState::from_config(config)?;
    let shutdown = state.shutdown.clone();
    let app = create_server(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting sheetlog-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, cancelling running imports");
            shutdown.cancel();
        })
        .await?;

    info!("Server stopped cleanly");
    Ok(())
}
