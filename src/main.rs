//!
//! Charging-station control service.
//! Reads configuration from TOML file (~/.config/chargegrid/config.toml).

use std::sync::Arc;

use tracing::{error, info};

use chargegrid::application::bootstrap::initialize_station;
use chargegrid::application::{
    BillingService, PileService, RequestService, Scheduler, SchedulerService,
};
use chargegrid::interfaces::http::AppState;
use chargegrid::shared::shutdown::ShutdownCoordinator;
use chargegrid::{
    create_api_router, default_config_path, AppConfig, HttpSimulatorClient, InMemoryStorage,
    Storage,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("CHARGEGRID_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_logging(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_logging(&cfg);
            error!("Failed to load config: {}. Using defaults.", e);
            cfg
        }
    };

    info!("Starting chargegrid station controller...");

    // ── Prometheus metrics recorder ────────────────────────────
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // ── Storage & bootstrap ────────────────────────────────────
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    initialize_station(&storage, &config).await?;

    // ── Services ───────────────────────────────────────────────
    // The request service is constructed first; the scheduler handle is
    // injected afterwards to break the construction cycle.
    let requests = Arc::new(RequestService::new(storage.clone()).await?);
    let billing = Arc::new(BillingService::new(storage.clone()));
    let piles = Arc::new(PileService::new(storage.clone()));

    let simulator = Arc::new(HttpSimulatorClient::new(
        config.simulator.base_url.clone(),
        config.simulator.timeout_secs,
    ));
    info!("Simulator endpoint: {}", config.simulator.base_url);

    let scheduler = SchedulerService::new(storage.clone(), simulator, billing.clone());
    requests.set_scheduler(scheduler.clone() as Arc<dyn Scheduler>);

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // ── Supervisor loops ───────────────────────────────────────
    scheduler.start(shutdown_signal.clone());
    // pick up anything persisted from a previous run
    scheduler.try_schedule();

    // ── HTTP server ────────────────────────────────────────────
    let state = AppState {
        requests,
        piles,
        billing,
        scheduler,
        storage,
        metrics: prometheus_handle,
    };
    let router = create_api_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    let server_shutdown = shutdown_signal.clone();
    let server_signal = shutdown_signal.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                server_shutdown.wait().await;
                info!("HTTP server received shutdown signal");
            })
            .await
        {
            error!("HTTP server error: {}", e);
        }
        // unblock the coordinator if the server exited on its own
        server_signal.trigger();
    });

    // drain in-flight connections, bounded by the configured timeout
    shutdown
        .shutdown_with_cleanup(|| async {
            if let Err(e) = server_task.await {
                error!("HTTP server task panicked: {}", e);
            }
        })
        .await;

    info!("chargegrid shutdown complete");
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
