//! Ping service
//!
//! One member of a caller fleet. Fires once per second at this machine's
//! phase offset, asks the shared file-backed limiter for a token and, when
//! admitted, calls `GET /ping` on the pong service.

use ping_service::client::HttpPongClient;
use ping_service::config::PingConfig;
use ping_service::pinger::Pinger;
use ping_service::rate_limiter::PersistedRateLimiter;
use ping_service::schedule::WindowScheduler;
use std::env;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if env::args().any(|a| a == "--version" || a == "-V") {
        println!("ping-service {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    if env::args().any(|a| a == "--help" || a == "-h") {
        println!("ping-service");
        println!();
        println!("Environment-driven caller for the pong service.");
        println!();
        println!("Environment:");
        println!("  MACHINE_ID        1-based ordinal of this machine (required)");
        println!("  TOTAL_MACHINES    fleet size (required)");
        println!("  RPS_LIMIT         fleet-wide requests per second (default 2)");
        println!("  PONG_BASE_URL     receiver base URL (default http://localhost:8081)");
        println!("  RATE_LIMIT_FILE   shared counter file (default rate-limit.lock)");
        println!("  PING_TIMEOUT_MS   outbound timeout (default 5000)");
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

    info!(version = env!("CARGO_PKG_VERSION"), "Ping service starting");

    let config = match PingConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return ExitCode::from(1);
        }
    };
    let assignment = match config.assignment() {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return ExitCode::from(1);
        }
    };

    info!(
        machine_id = config.machine_id,
        total_machines = config.total_machines,
        rate_limit_file = %config.rate_limit_file.display(),
        "Configuration loaded"
    );

    let client = match HttpPongClient::new(config.ping_url(), config.request_timeout) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return ExitCode::from(1);
        }
    };
    let limiter = PersistedRateLimiter::new(config.rate_limit_file.clone(), config.rps_limit);
    let scheduler = WindowScheduler::new(assignment);

    info!(
        pong_url = %client.url(),
        rps_limit = limiter.rps_limit(),
        start_offset_ms = scheduler.assignment().start_offset_ms(),
        window_size_ms = scheduler.assignment().window_size_ms(),
        "Ping service ready"
    );

    let pinger = Pinger::new(limiter, client);
    let handle = pinger.schedule(&scheduler);

    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");

    handle.shutdown().await;

    let stats = pinger.stats().snapshot();
    info!(
        attempts = stats.attempts,
        sent = stats.sent,
        skipped_locally = stats.skipped_locally,
        limiter_unavailable = stats.limiter_unavailable,
        succeeded = stats.succeeded,
        rejected_by_pong = stats.rejected_by_pong,
        failed = stats.failed,
        "Ping service stopped"
    );
    ExitCode::SUCCESS
}
