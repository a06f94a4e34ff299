//! Pong service
//!
//! Answers `GET /ping` with "World" after a fixed unit of work. Only one
//! request is worked on at a time; overlapping requests get 429.

use pong_service::app::build_app;
use pong_service::config::PongConfig;
use std::env;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if env::args().any(|a| a == "--version" || a == "-V") {
        println!("pong-service {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    if env::args().any(|a| a == "--help" || a == "-h") {
        println!("pong-service");
        println!();
        println!("Single-permit receiver for the ping fleet.");
        println!();
        println!("Environment:");
        println!("  PONG_BIND            listen address (default 0.0.0.0:8081)");
        println!("  PONG_WORK_DELAY_MS   simulated work per request (default 1000)");
        println!();
        println!("Flags:");
        println!("  --help, -h       Show this help");
        println!("  --version, -V    Print version");
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .json()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Pong service starting");

    let config = match PongConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return ExitCode::from(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            return ExitCode::from(1);
        }
    };

    info!(
        addr = %config.bind_addr,
        work_delay_ms = config.work_delay.as_millis() as u64,
        "Pong service listening"
    );

    let app = build_app(&config);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await;

    if let Err(e) = served {
        error!(error = %e, "Server error");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
