//! In-memory collaborators for driving the engine in tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bus_watch_core::transit::{
    Coordinate, FetchCause, FetchError, LocationError, LocationProvider, Operation,
    PermissionStatus, Route, RouteId, RouteStore, Stop, StoreError, Trace, TransitDataClient,
    Vehicle,
};
use bus_watch_core::{EngineConfig, RetryPolicy, RouteSyncEngine, Snapshot};
use tokio::sync::{Notify, watch};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Default)]
struct FeedState {
    routes: Option<Vec<Route>>,
    stops: HashMap<RouteId, Vec<Stop>>,
    stop_failures: HashMap<RouteId, u32>,
    stop_gates: HashMap<RouteId, Arc<Notify>>,
    traces: HashMap<RouteId, Trace>,
    /// Responses served in order; the last one repeats
    vehicles: HashMap<RouteId, Vec<Result<Vec<Vehicle>, FetchError>>>,
    calls: HashMap<(Operation, Option<RouteId>), u32>,
}

/// Scriptable transit feed
#[derive(Default)]
pub struct FakeFeed {
    state: Mutex<FeedState>,
}

fn not_found(operation: Operation) -> FetchError {
    FetchError::new(operation, FetchCause::Status(404))
}

impl FakeFeed {
    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap()
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        self.lock().routes = Some(routes);
        self
    }

    pub fn with_stops(self, route: i64, stops: Vec<Stop>) -> Self {
        self.lock().stops.insert(RouteId::new(route), stops);
        self
    }

    /// Fail the next `times` stops requests for the route.
    pub fn failing_stops(self, route: i64, times: u32) -> Self {
        self.lock().stop_failures.insert(RouteId::new(route), times);
        self
    }

    pub fn with_trace(self, route: i64, trace: Trace) -> Self {
        self.lock().traces.insert(RouteId::new(route), trace);
        self
    }

    pub fn with_vehicles(self, route: i64, responses: Vec<Result<Vec<Vehicle>, FetchError>>) -> Self {
        self.lock().vehicles.insert(RouteId::new(route), responses);
        self
    }

    /// Hold stops responses for the route until the returned gate is notified.
    pub fn gate_stops(&self, route: i64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().stop_gates.insert(RouteId::new(route), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self, operation: Operation, route: Option<i64>) -> u32 {
        let key = (operation, route.map(RouteId::new));
        self.lock().calls.get(&key).copied().unwrap_or(0)
    }

    fn count(&self, operation: Operation, route: Option<RouteId>) {
        *self.lock().calls.entry((operation, route)).or_default() += 1;
    }
}

impl TransitDataClient for FakeFeed {
    fn list_routes<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Route>, FetchError>> {
        Box::pin(async move {
            self.count(Operation::ListRoutes, None);
            self.lock().routes.clone().ok_or_else(|| not_found(Operation::ListRoutes))
        })
    }

    fn get_stops<'a>(&'a self, route: RouteId) -> BoxFuture<'a, Result<Vec<Stop>, FetchError>> {
        Box::pin(async move {
            self.count(Operation::GetStops, Some(route));

            let gate = self.lock().stop_gates.get(&route).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let mut state = self.lock();
            if let Some(remaining) = state.stop_failures.get_mut(&route) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::new(
                        Operation::GetStops,
                        FetchCause::Transport("connection reset".into()),
                    ));
                }
            }
            state.stops.get(&route).cloned().ok_or_else(|| not_found(Operation::GetStops))
        })
    }

    fn get_trace<'a>(&'a self, route: RouteId) -> BoxFuture<'a, Result<Trace, FetchError>> {
        Box::pin(async move {
            self.count(Operation::GetTrace, Some(route));
            self.lock().traces.get(&route).cloned().ok_or_else(|| not_found(Operation::GetTrace))
        })
    }

    fn get_vehicles<'a>(&'a self, route: RouteId) -> BoxFuture<'a, Result<Vec<Vehicle>, FetchError>> {
        Box::pin(async move {
            self.count(Operation::GetVehicles, Some(route));

            let mut state = self.lock();
            let Some(responses) = state.vehicles.get_mut(&route) else {
                return Ok(vec![]);
            };
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses.first().cloned().unwrap_or(Ok(vec![]))
            }
        })
    }
}

/// Fixed device location
pub struct FakeLocation {
    permission: PermissionStatus,
    position: Result<Coordinate, LocationError>,
    permission_delay: Duration,
    queries: AtomicU32,
}

impl FakeLocation {
    pub fn at(position: Coordinate) -> Self {
        Self {
            permission: PermissionStatus::Granted,
            position: Ok(position),
            permission_delay: Duration::ZERO,
            queries: AtomicU32::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            position: Err(LocationError::PermissionDenied),
            permission_delay: Duration::ZERO,
            queries: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            permission: PermissionStatus::Granted,
            position: Err(LocationError::Unavailable("no fix".into())),
            permission_delay: Duration::ZERO,
            queries: AtomicU32::new(0),
        }
    }

    /// Answer the permission request only after `delay`, like a prompt the
    /// rider takes a while to accept.
    pub fn answering_after(mut self, delay: Duration) -> Self {
        self.permission_delay = delay;
        self
    }

    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LocationProvider for FakeLocation {
    fn request_permission<'a>(&'a self) -> BoxFuture<'a, PermissionStatus> {
        Box::pin(async move {
            if !self.permission_delay.is_zero() {
                tokio::time::sleep(self.permission_delay).await;
            }
            self.permission
        })
    }

    fn current_location<'a>(&'a self) -> BoxFuture<'a, Result<Coordinate, LocationError>> {
        Box::pin(async move {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.position.clone()
        })
    }
}

/// Route store backed by memory
#[derive(Default)]
pub struct MemoryStore {
    last: Mutex<Option<RouteId>>,
    saved: Mutex<Vec<RouteId>>,
    broken: bool,
}

impl MemoryStore {
    pub fn with_saved(route: i64) -> Self {
        Self {
            last: Mutex::new(Some(RouteId::new(route))),
            ..Self::default()
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<RouteId> {
        self.saved.lock().unwrap().clone()
    }
}

impl RouteStore for MemoryStore {
    fn load_last_route<'a>(&'a self) -> BoxFuture<'a, Result<Option<RouteId>, StoreError>> {
        Box::pin(async move {
            if self.broken {
                return Err(StoreError("storage unavailable".into()));
            }
            Ok(*self.last.lock().unwrap())
        })
    }

    fn save_route<'a>(&'a self, route: RouteId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.broken {
                return Err(StoreError("storage unavailable".into()));
            }
            *self.last.lock().unwrap() = Some(route);
            self.saved.lock().unwrap().push(route);
            Ok(())
        })
    }
}

pub struct Harness {
    pub engine: RouteSyncEngine,
    pub feed: Arc<FakeFeed>,
    pub location: Arc<FakeLocation>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(feed: FakeFeed, location: FakeLocation, store: MemoryStore) -> Self {
        Self::with_config(feed, location, store, EngineConfig::default())
    }

    pub fn with_config(
        feed: FakeFeed,
        location: FakeLocation,
        store: MemoryStore,
        config: EngineConfig,
    ) -> Self {
        let feed = Arc::new(feed);
        let location = Arc::new(location);
        let store = Arc::new(store);
        let engine = RouteSyncEngine::new(feed.clone(), location.clone(), store.clone(), config);

        Self {
            engine,
            feed,
            location,
            store,
        }
    }

    pub fn without_retries(feed: FakeFeed, location: FakeLocation) -> Self {
        Self::with_config(
            feed,
            location,
            MemoryStore::default(),
            EngineConfig::default().with_retry(RetryPolicy::NEVER),
        )
    }
}

/// Wait (in virtual time) until the snapshot satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<Snapshot>,
    predicate: impl FnMut(&Snapshot) -> bool,
) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(120), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("engine dropped")
        .clone()
}

pub fn route(id: i64, name: &str) -> Route {
    Route {
        id: RouteId::new(id),
        name: name.into(),
    }
}

pub fn stop(name: &str, lat: f64, lon: f64, major: bool) -> Stop {
    Stop {
        location: Coordinate::new(lat, lon),
        name: name.into(),
        time_point: major.then(|| name.into()),
    }
}

pub fn straight_trace(color: &str, points: usize) -> Trace {
    Trace {
        pen_color: color.into(),
        polylines: vec![
            (0..points)
                .map(|i| Coordinate::new(37.70 + i as f64 * 0.001, -121.93))
                .collect(),
        ],
    }
}

pub fn bus(lat: f64, lon: f64, heading: f64) -> Vehicle {
    Vehicle::new(Coordinate::new(lat, lon), heading)
}
