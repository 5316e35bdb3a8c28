use anyhow::Result;
use axum::{middleware, routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    capture::{self, Collector},
    config::{Config, TelescopeConfig},
    handlers::{self, TelescopeState},
    live::{EventBus, SessionManager},
    metrics,
    query::QueryService,
    retention::{spawn_retention_task, RetentionConfig},
    signals::setup_signal_handlers,
    storage::{self, StorageBackend},
};

/// A running collector: storage, capture writer, live sessions and event bus
///
/// ```ignore
/// let telescope = Telescope::new(config.telescope, storage::from_config(&config.storage)).await?;
/// let app = telescope.attach(Router::new().route("/users", get(list_users)));
/// ```
pub struct Telescope {
    config: TelescopeConfig,
    storage: Arc<dyn StorageBackend>,
    collector: Collector,
    sessions: SessionManager,
    bus: EventBus,
    owns_panic_hook: bool,
}

impl Telescope {
    /// Connect the backend and start the background tasks
    pub async fn new(
        config: TelescopeConfig,
        storage: Arc<dyn StorageBackend>,
    ) -> crate::error::Result<Self> {
        storage.connect().await?;

        let collector = Collector::spawn(storage.clone(), config.clone());
        let sessions = SessionManager::new(QueryService::new(storage.clone()));
        let bus = EventBus::spawn(&storage, sessions.clone());

        info!(
            backend = storage.name(),
            prefix = %config.normalized_prefix(),
            watched = ?config.watch_set(),
            "Telescope initialized"
        );

        Ok(Self {
            config,
            storage,
            collector,
            sessions,
            bus,
            owns_panic_hook: false,
        })
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn queries(&self) -> QueryService {
        QueryService::new(self.storage.clone())
    }

    /// Dashboard routes (`/config`, `{prefix}/api/...`, `{prefix}/ws`)
    pub fn router(&self) -> Router {
        handlers::router(TelescopeState {
            config: self.config.clone(),
            queries: self.queries(),
            sessions: self.sessions.clone(),
        })
    }

    /// Record requests to every route of `app`
    pub fn capture_requests(&self, app: Router) -> Router {
        app.layer(middleware::from_fn_with_state(
            self.collector.clone(),
            capture::capture_requests,
        ))
    }

    /// Capture the host's requests and mount the dashboard routes next to them
    pub fn attach(&self, app: Router) -> Router {
        self.capture_requests(app).merge(self.router())
    }

    /// Install the panic hook if exceptions are watched
    pub fn install_panic_hook(&mut self) -> bool {
        let exceptions = self.collector.exceptions();
        if exceptions.is_enabled() && capture::install_panic_hook(exceptions) {
            self.owns_panic_hook = true;
        }
        self.owns_panic_hook
    }

    /// Drain the capture queue and stop the event bus
    pub async fn shutdown(self) {
        if self.owns_panic_hook {
            capture::uninstall_panic_hook();
        }
        self.collector.flush().await;
        self.bus.shutdown().await;
        info!("Telescope stopped");
    }
}

/// Start the standalone collector server
///
/// This function:
/// 1. Initializes metrics
/// 2. Connects storage and starts the capture, retention and live tasks
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Serves the dashboard API until a shutdown signal arrives
/// 5. Flushes pending captures
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = metrics::init_metrics().map(Arc::new);

    let storage = storage::from_config(&config.storage);
    let mut telescope = Telescope::new(config.telescope.clone(), storage).await?;
    telescope.install_panic_hook();

    let retention_handle = RetentionConfig::from_hours(config.storage.retention_hours).map(|retention| {
        info!(max_age_secs = retention.max_age.as_secs(), "Retention enabled");
        spawn_retention_task(telescope.storage().clone(), retention)
    });

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(&telescope, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting Telescope collector on {}", addr);
    info!(
        "Dashboard API at {}/api/entries, live channel at {}/ws",
        config.telescope.normalized_prefix(),
        config.telescope.normalized_prefix()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    if let Some(handle) = retention_handle {
        handle.abort();
    }
    signal_handle.await?;
    telescope.shutdown().await;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router for the standalone server
fn create_router(telescope: &Telescope, metrics_handle: Option<Arc<metrics_exporter_prometheus::PrometheusHandle>>) -> Router {
    let mut app = telescope.router();

    if let Some(handle) = metrics_handle {
        app = app.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler::metrics))
                .with_state(handle),
        );
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
