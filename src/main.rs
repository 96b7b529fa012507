mod api;
mod config;
mod db;
mod detector;
mod error;
mod loader;
mod metrics;
mod scan;
mod scorer;
mod state;
mod types;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::writer::DbWriter;
use crate::error::Result;
use crate::scan::scheduler::ScanScheduler;
use crate::scan::ScanReport;
use crate::state::ResultStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    info!(
        "Scanner config: data_dir={} interval={}s window={} eval_window={} shark_min_vol=${:.0} shark_ratio_min={:.2}",
        cfg.data_dir,
        cfg.scan_interval_secs,
        cfg.accumulation.window,
        cfg.accumulation.eval_window,
        cfg.shark.min_volume_usd,
        cfg.shark.volume_ratio_min,
    );

    // --- Shared state ---
    let store = ResultStore::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- DB writer ---
    let (report_tx, report_rx) = mpsc::channel::<Arc<ScanReport>>(CHANNEL_CAPACITY);
    let writer = DbWriter::new(pool.clone(), report_rx, Arc::clone(&health));
    tokio::spawn(async move { writer.run().await });

    // --- Scan scheduler (immediately, then every SCAN_INTERVAL_SECS) ---
    let scheduler = ScanScheduler::new(
        &cfg,
        Arc::clone(&store),
        Arc::clone(&health),
        Arc::clone(&latency),
        report_tx,
    );
    tokio::spawn(async move { scheduler.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        pool,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
