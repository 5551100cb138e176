//! Engine-owned state and the guarded mutations applied by activation tasks.
//!
//! Every result coming back from an activation carries the [`Ticket`] it was
//! issued under. Results are applied while holding the state lock and only
//! when the ticket's epoch is still the current one, so a slow response for a
//! replaced route can never reach the snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bus_watch_transit::{
    Coordinate, FetchError, LocationProvider, Operation, Route, RouteId, RouteStore, Stop, Trace,
    TransitDataClient, Vehicle,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};

use crate::config::EngineConfig;

/// Lifecycle of the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineStatus {
    /// No active route
    #[default]
    Idle,
    /// Stops and trace for the route are still loading
    Activating(RouteId),
    /// Stops and trace settled; vehicles refreshing
    Active(RouteId),
}

/// Most recent failed one-shot fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastError {
    pub operation: Operation,
    pub message: String,
}

impl From<&FetchError> for LastError {
    fn from(e: &FetchError) -> Self {
        Self {
            operation: e.operation,
            message: e.cause.to_string(),
        }
    }
}

/// Aggregate view handed to the presentation layer.
///
/// Fields fill in independently as their fetches complete.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub status: EngineStatus,
    pub route_list: Vec<Route>,
    pub active_route: Option<RouteId>,
    pub stops: Option<Vec<Stop>>,
    pub trace: Option<Trace>,
    pub vehicles: Option<Vec<Vehicle>>,
    pub vehicles_updated_at: Option<DateTime<Utc>>,
    pub recenter_target: Option<Coordinate>,
    /// Whether the vehicle refresh timer is still running
    pub refreshing: bool,
    pub last_error: Option<LastError>,
}

/// Discrete signals for the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Pan the map to the vehicle nearest the rider
    Recenter { route: RouteId, target: Coordinate },
    /// The route reported no running vehicles and refreshing stopped
    NoVehicles { route: RouteId },
}

/// Identifies the activation a request was issued for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub epoch: u64,
    pub route: RouteId,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum VehicleApply {
    /// Issued for an older activation, or superseded by a newer tick
    Stale,
    /// Nothing running on the route
    Empty,
    /// Vehicles replaced; `claim_recenter` is set for exactly one tick per activation
    Updated { claim_recenter: bool },
}

struct ActivationState {
    epoch: u64,
    newest_tick: u64,
    recenter_claimed: bool,
    empty_notified: bool,
}

#[derive(Default)]
struct SyncState {
    epoch: u64,
    current: Option<ActivationState>,
}

impl SyncState {
    fn activation(&mut self, ticket: Ticket) -> Option<&mut ActivationState> {
        self.current.as_mut().filter(|a| a.epoch == ticket.epoch)
    }
}

/// State shared between the engine handle and its activation tasks
pub(crate) struct Shared {
    pub client: Arc<dyn TransitDataClient>,
    pub location: Arc<dyn LocationProvider>,
    pub store: Arc<dyn RouteStore>,
    pub config: EngineConfig,
    state: Mutex<SyncState>,
    snapshot: watch::Sender<Snapshot>,
    events: broadcast::Sender<EngineEvent>,
}

impl Shared {
    pub fn new(
        client: Arc<dyn TransitDataClient>,
        location: Arc<dyn LocationProvider>,
        store: Arc<dyn RouteStore>,
        config: EngineConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            client,
            location,
            store,
            config,
            state: Mutex::new(SyncState::default()),
            snapshot,
            events,
        }
    }

    // The lock is never held across an await, so a poisoned guard only means
    // a panic mid-update; the state itself stays usable.
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Start a new activation, invalidating everything issued before it.
    pub fn begin_activation(&self, route: RouteId) -> Ticket {
        let mut state = self.lock();
        state.epoch += 1;
        let ticket = Ticket {
            epoch: state.epoch,
            route,
        };
        state.current = Some(ActivationState {
            epoch: ticket.epoch,
            newest_tick: 0,
            recenter_claimed: false,
            empty_notified: false,
        });

        self.snapshot.send_modify(|s| {
            s.status = EngineStatus::Activating(route);
            s.active_route = Some(route);
            s.stops = None;
            s.trace = None;
            s.vehicles = None;
            s.vehicles_updated_at = None;
            s.recenter_target = None;
            s.refreshing = true;
            if s.last_error.as_ref().is_some_and(|e| e.operation != Operation::ListRoutes) {
                s.last_error = None;
            }
        });

        ticket
    }

    /// Drop the current activation; late results are discarded.
    pub fn end_activation(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.current = None;

        self.snapshot.send_modify(|s| {
            s.status = EngineStatus::Idle;
            s.active_route = None;
            s.stops = None;
            s.trace = None;
            s.vehicles = None;
            s.vehicles_updated_at = None;
            s.recenter_target = None;
            s.refreshing = false;
        });
    }

    pub fn apply_route_list(&self, routes: Vec<Route>) {
        self.snapshot.send_modify(|s| {
            s.route_list = routes;
            clear_error_for(s, Operation::ListRoutes);
        });
    }

    pub fn apply_stops(&self, ticket: Ticket, stops: Vec<Stop>) -> bool {
        let mut state = self.lock();
        if state.activation(ticket).is_none() {
            return false;
        }

        self.snapshot.send_modify(|s| {
            s.stops = Some(stops);
            clear_error_for(s, Operation::GetStops);
        });
        true
    }

    pub fn apply_trace(&self, ticket: Ticket, trace: Trace) -> bool {
        let mut state = self.lock();
        if state.activation(ticket).is_none() {
            return false;
        }

        self.snapshot.send_modify(|s| {
            s.trace = Some(trace);
            clear_error_for(s, Operation::GetTrace);
        });
        true
    }

    /// Record a failed one-shot fetch. Route-scoped failures need a current ticket.
    pub fn record_error(&self, ticket: Option<Ticket>, error: &FetchError) -> bool {
        let mut state = self.lock();
        let stale = ticket.is_some_and(|t| state.activation(t).is_none());
        if stale {
            return false;
        }

        self.snapshot.send_modify(|s| s.last_error = Some(error.into()));
        true
    }

    /// Stops and trace have settled, successfully or not.
    pub fn mark_active(&self, ticket: Ticket) -> bool {
        let mut state = self.lock();
        if state.activation(ticket).is_none() {
            return false;
        }

        self.snapshot.send_modify(|s| s.status = EngineStatus::Active(ticket.route));
        true
    }

    pub fn apply_vehicles(&self, ticket: Ticket, tick: u64, vehicles: &[Vehicle]) -> VehicleApply {
        let mut state = self.lock();
        let Some(activation) = state.activation(ticket) else {
            return VehicleApply::Stale;
        };
        if tick <= activation.newest_tick {
            return VehicleApply::Stale;
        }
        activation.newest_tick = tick;

        let outcome = if vehicles.is_empty() {
            if !activation.empty_notified {
                activation.empty_notified = true;
                let _ = self.events.send(EngineEvent::NoVehicles {
                    route: ticket.route,
                });
            }
            VehicleApply::Empty
        } else {
            let claim_recenter = !activation.recenter_claimed;
            activation.recenter_claimed = true;
            VehicleApply::Updated { claim_recenter }
        };

        self.snapshot.send_modify(|s| {
            s.vehicles = Some(vehicles.to_vec());
            s.vehicles_updated_at = Some(Utc::now());
        });

        outcome
    }

    pub fn apply_recenter(&self, ticket: Ticket, target: Coordinate) -> bool {
        let mut state = self.lock();
        if state.activation(ticket).is_none() {
            return false;
        }

        self.snapshot.send_modify(|s| s.recenter_target = Some(target));
        let _ = self.events.send(EngineEvent::Recenter {
            route: ticket.route,
            target,
        });
        true
    }

    pub fn stop_refreshing(&self, ticket: Ticket) -> bool {
        let mut state = self.lock();
        if state.activation(ticket).is_none() {
            return false;
        }

        self.snapshot.send_modify(|s| s.refreshing = false);
        true
    }
}

fn clear_error_for(snapshot: &mut Snapshot, operation: Operation) {
    if snapshot.last_error.as_ref().is_some_and(|e| e.operation == operation) {
        snapshot.last_error = None;
    }
}
