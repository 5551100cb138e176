//! Route sync engine.
//!
//! [`RouteSyncEngine`] owns the active route, runs one task per activation,
//! and publishes a [`Snapshot`] through a `watch` channel plus discrete
//! [`EngineEvent`]s through a `broadcast` channel.
//!
//! # Example
//!
//! ```ignore
//! let engine = RouteSyncEngine::new(client, location, store, EngineConfig::default());
//! let mut snapshots = engine.subscribe();
//! engine.start().await;
//!
//! while snapshots.changed().await.is_ok() {
//!     render(&snapshots.borrow_and_update());
//! }
//! ```

mod activation;
mod retry;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bus_watch_transit::{LocationProvider, RouteId, RouteStore, TransitDataClient};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use state::{EngineEvent, EngineStatus, LastError, Snapshot};

use crate::config::EngineConfig;
use retry::with_backoff;
use state::Shared;

#[derive(Default)]
struct Tasks {
    route_list: Option<JoinHandle<()>>,
    activation: Option<JoinHandle<()>>,
}

/// Owns route selection and keeps the snapshot in sync with the feed.
///
/// Methods that spawn work must be called from within a Tokio runtime.
/// Dropping the engine aborts everything it spawned.
pub struct RouteSyncEngine {
    shared: Arc<Shared>,
    tasks: Mutex<Tasks>,
}

impl RouteSyncEngine {
    pub fn new(
        client: Arc<dyn TransitDataClient>,
        location: Arc<dyn LocationProvider>,
        store: Arc<dyn RouteStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(client, location, store, config)),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every snapshot change. Do not hold a borrow across engine calls.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.subscribe_events()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Load the route list in the background, then activate the saved route
    /// (or the configured default).
    pub async fn start(&self) -> RouteId {
        self.load_route_list();

        let default_route = self.shared.config.default_route;
        let route = match self.shared.store.load_last_route().await {
            Ok(Some(route)) => route,
            Ok(None) => default_route,
            Err(e) => {
                warn!(error = %e, default = %default_route, "Failed to read saved route, using default");
                default_route
            }
        };

        self.activate_route(route);
        route
    }

    /// Fetch the route list once. Independent of route activation.
    pub fn load_route_list(&self) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let client = shared.client.as_ref();
            match with_backoff(&shared.config.retry, move || client.list_routes()).await {
                Ok(routes) => {
                    info!(count = routes.len(), "Route list loaded");
                    shared.apply_route_list(routes);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load route list");
                    shared.record_error(None, &e);
                }
            }
        });

        if let Some(previous) = self.tasks().route_list.replace(handle) {
            previous.abort();
        }
    }

    /// Make `route` the active route, cancelling the previous activation.
    pub fn activate_route(&self, route: RouteId) {
        let mut tasks = self.tasks();
        if let Some(previous) = tasks.activation.take() {
            previous.abort();
        }

        let ticket = self.shared.begin_activation(route);
        tasks.activation = Some(tokio::spawn(activation::run(Arc::clone(&self.shared), ticket)));
    }

    /// Stop refreshing and discard anything still in flight.
    pub fn teardown(&self) {
        let mut tasks = self.tasks();
        if let Some(activation) = tasks.activation.take() {
            activation.abort();
        }
        if let Some(route_list) = tasks.route_list.take() {
            route_list.abort();
        }

        self.shared.end_activation();
        info!("Route sync engine torn down");
    }
}

impl Drop for RouteSyncEngine {
    fn drop(&mut self) {
        let tasks = self.tasks();
        for handle in tasks.activation.iter().chain(tasks.route_list.iter()) {
            handle.abort();
        }
    }
}
