use std::sync::{Arc, Mutex, PoisonError};

use bus_watch_core::config::DEFAULT_BASE_URL;
use bus_watch_core::transit::{MapRegion, RouteId};
use bus_watch_core::{EngineConfig, EngineEvent, RouteSyncEngine, WebWatchClient, WebWatchConfig};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::callbacks::{
    ForeignLocation, ForeignStore, LocationCallback, RouteStoreCallback, TrackerListener,
};
use crate::error::TrackerError;
use crate::logging::setup_logging;
use crate::records::{MapRegionRecord, SnapshotRecord};

/// One tracking session for the app shell.
///
/// Owns its own runtime so the shell can call in from any thread.
#[derive(uniffi::Object)]
pub struct TrackerSession {
    engine: RouteSyncEngine,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    runtime: Runtime,
}

#[uniffi::export]
impl TrackerSession {
    /// `base_url` defaults to the LAVTA WebWatch deployment.
    #[uniffi::constructor]
    pub fn new(
        base_url: Option<String>,
        location: Arc<dyn LocationCallback>,
        store: Arc<dyn RouteStoreCallback>,
    ) -> Result<Arc<Self>, TrackerError> {
        setup_logging();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("bus-watch")
            .enable_all()
            .build()
            .map_err(|e| TrackerError::Runtime {
                reason: e.to_string(),
            })?;

        let config = WebWatchConfig::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()));
        let client = WebWatchClient::new(config).map_err(|e| TrackerError::Http {
            reason: e.to_string(),
        })?;
        info!(base_url = client.base_url(), "Tracker session created");

        let engine = RouteSyncEngine::new(
            Arc::new(client),
            Arc::new(ForeignLocation(location)),
            Arc::new(ForeignStore(store)),
            EngineConfig::default(),
        );

        Ok(Arc::new(Self {
            engine,
            forwarder: Mutex::new(None),
            runtime,
        }))
    }

    /// Forward every snapshot change and event to `listener`, replacing any
    /// previous listener. The current snapshot is delivered immediately.
    pub fn set_listener(&self, listener: Arc<dyn TrackerListener>) {
        let mut snapshots = self.engine.subscribe();
        let mut events = self.engine.events();

        let handle = self.runtime.spawn(async move {
            listener.on_snapshot(SnapshotRecord::from(&*snapshots.borrow_and_update()));

            loop {
                tokio::select! {
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let record = SnapshotRecord::from(&*snapshots.borrow_and_update());
                        listener.on_snapshot(record);
                    }
                    event = events.recv() => match event {
                        Ok(EngineEvent::Recenter { route, target }) => {
                            listener.on_recenter(route.get(), MapRegion::around(target).into());
                        }
                        Ok(EngineEvent::NoVehicles { route }) => listener.on_no_vehicles(route.get()),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Listener fell behind, dropped engine events");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        let previous = self
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Load the route list and activate the saved route. Returns the route
    /// that was activated.
    pub fn start(&self) -> i64 {
        self.runtime.block_on(self.engine.start()).get()
    }

    pub fn select_route(&self, route: i64) {
        let _guard = self.runtime.enter();
        self.engine.activate_route(RouteId::new(route));
    }

    /// Fetch the route list again, e.g. after a failed first attempt.
    pub fn reload_routes(&self) {
        let _guard = self.runtime.enter();
        self.engine.load_route_list();
    }

    pub fn snapshot(&self) -> SnapshotRecord {
        SnapshotRecord::from(&self.engine.snapshot())
    }

    /// Stop refreshing, e.g. when the map leaves the screen.
    pub fn teardown(&self) {
        self.engine.teardown();
    }
}

impl Drop for TrackerSession {
    fn drop(&mut self) {
        if let Some(forwarder) = self
            .forwarder
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            forwarder.abort();
        }
    }
}

/// Region shown before any vehicle is known.
#[uniffi::export]
pub fn default_region() -> MapRegionRecord {
    MapRegion::DEFAULT.into()
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::records::{CoordinateRecord, StatusRecord};

    struct Shell {
        saved: Mutex<Option<i64>>,
    }

    impl LocationCallback for Shell {
        fn request_permission(&self) -> bool {
            false
        }

        fn current_location(&self) -> Result<CoordinateRecord, TrackerError> {
            Err(TrackerError::Location {
                reason: "denied".into(),
            })
        }
    }

    impl RouteStoreCallback for Shell {
        fn load_last_route(&self) -> Result<Option<i64>, TrackerError> {
            Ok(*self.saved.lock().unwrap())
        }

        fn save_route(&self, route: i64) -> Result<(), TrackerError> {
            *self.saved.lock().unwrap() = Some(route);
            Ok(())
        }
    }

    struct Recorder(Mutex<mpsc::Sender<SnapshotRecord>>);

    impl TrackerListener for Recorder {
        fn on_snapshot(&self, snapshot: SnapshotRecord) {
            let _ = self.0.lock().unwrap().send(snapshot);
        }

        fn on_recenter(&self, _route: i64, _region: MapRegionRecord) {}

        fn on_no_vehicles(&self, _route: i64) {}
    }

    fn session(saved: Option<i64>) -> Arc<TrackerSession> {
        let shell = Arc::new(Shell {
            saved: Mutex::new(saved),
        });
        // Nothing listens on the discard port, so every fetch fails fast.
        TrackerSession::new(Some("http://127.0.0.1:9/TMWebWatch".into()), shell.clone(), shell)
            .unwrap()
    }

    #[test]
    fn test_start_uses_saved_route() {
        let session = session(Some(12));
        assert_eq!(session.start(), 12);
        assert_eq!(session.snapshot().active_route, Some(12));

        session.teardown();
        assert_eq!(session.snapshot().status, StatusRecord::Idle);
    }

    #[test]
    fn test_select_route_notifies_listener() {
        let session = session(None);
        let (tx, rx) = mpsc::channel();
        session.set_listener(Arc::new(Recorder(Mutex::new(tx))));

        let initial = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(initial.status, StatusRecord::Idle);

        session.select_route(12);
        let activated = loop {
            let snapshot = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if snapshot.active_route == Some(12) {
                break snapshot;
            }
        };
        assert!(matches!(
            activated.status,
            StatusRecord::Activating { route: 12 } | StatusRecord::Active { route: 12 }
        ));
    }

    #[test]
    fn test_default_region() {
        let region = default_region();
        assert_eq!(region.latitude_delta, MapRegion::DEFAULT_DELTA);
        assert_eq!(region.center.latitude, MapRegion::DEFAULT.center.lat);
    }
}
