//! SBCPILOT: Squad Building Challenge autopilot
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores persisted state, runs the login routine, then keeps draining
//! the challenge queue until shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use sbcpilot::config::{self, StorageBackend};
use sbcpilot::control::{self, ControlHandle};
use sbcpilot::engine::Orchestrator;
use sbcpilot::host::BridgeClient;
use sbcpilot::prices::FutggClient;
use sbcpilot::settings::keys;
use sbcpilot::solver::HttpSolver;
use sbcpilot::state::SharedState;
use sbcpilot::storage::{JsonFileStore, KeyValueStore, SqliteStore};

const BANNER: &str = r#"
 ____  ____   ____ ____ ___ _     ___ _____
/ ___|| __ ) / ___|  _ \_ _| |   / _ \_   _|
\___ \|  _ \| |   | |_) | || |  | | | || |
 ___) | |_) | |___|  __/| || |__| |_| || |
|____/|____/ \____|_|  |___|_____\___/ |_|

  Squad Building Challenge autopilot v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        poll_interval_secs = cfg.agent.poll_interval_secs,
        bridge = %cfg.host.bridge_url,
        "SBCPILOT starting up"
    );

    // -- Restore state ---------------------------------------------------

    let store: Arc<dyn KeyValueStore> = match cfg.storage.backend {
        StorageBackend::Json => Arc::new(JsonFileStore::open(&cfg.storage.path).await?),
        StorageBackend::Sqlite => Arc::new(SqliteStore::connect(&cfg.storage.path).await?),
    };
    let mut state = SharedState::load(store.as_ref(), cfg.prices.retry_backoff_max_ms).await?;
    if let Some(url) = &cfg.solver.url {
        state.settings.set(0, 0, keys::API_URL, serde_json::json!(url));
    }

    // -- Initialise components -------------------------------------------

    let host = Arc::new(BridgeClient::new(&cfg.host.bridge_url, cfg.host_token(), cfg.host.timeout_secs)?);
    let solver = Arc::new(HttpSolver::new(cfg.solver.request_timeout_secs)?);
    let prices = Arc::new(FutggClient::new(&cfg.prices.base_url, cfg.prices.timeout_secs)?);
    let control_handle = ControlHandle::new();

    let mut orchestrator = Orchestrator::new(host, solver, prices, store.clone(), state, control_handle.clone());

    if cfg.control.enabled {
        control::spawn_control_server(control_handle.clone(), cfg.control.port).await?;
    }

    if cfg.agent.run_login_routine {
        if let Err(e) = orchestrator.on_login().await {
            error!(error = %e, "Login routine failed, continuing");
        }
    }

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.agent.poll_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = cfg.agent.poll_interval_secs, "Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if control_handle.queue_len().await == 0 {
                    continue;
                }
                let ran = orchestrator.drain_queue().await;
                info!(ran, "Queue drained");
                if let Err(e) = orchestrator.persist().await {
                    error!(error = %e, "Failed to save state");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    orchestrator.persist().await.context("Failed to save final state")?;
    let status = control_handle.status().await;
    info!(attempts = status.attempts, submitted = status.submitted, "SBCPILOT shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sbcpilot=info"));

    let json_logging = std::env::var("SBCPILOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
