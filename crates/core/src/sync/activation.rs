//! The per-activation task.
//!
//! One task runs per route activation. It persists the route, loads stops and
//! trace concurrently, and drives the vehicle refresh timer. Aborting the
//! task cancels all of that as a unit, including in-flight refresh ticks,
//! which live in a `JoinSet` owned by the task. When the route runs out of
//! vehicles the timer stops but ticks already in flight are allowed to finish.

use std::sync::Arc;

use bus_watch_transit::{PermissionStatus, Vehicle, nearest_vehicle};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::retry::with_backoff;
use super::state::{Shared, Ticket, VehicleApply};

#[derive(Debug, PartialEq, Eq)]
enum TickOutcome {
    Failed,
    Stale,
    Updated,
    NoVehicles,
}

pub(crate) async fn run(shared: Arc<Shared>, ticket: Ticket) {
    info!(route = %ticket.route, epoch = ticket.epoch, "Route activated");

    let static_data = async {
        tokio::join!(load_stops(&shared, ticket), load_trace(&shared, ticket));
        shared.mark_active(ticket);
    };

    tokio::join!(
        persist_route(&shared, ticket),
        static_data,
        refresh_vehicles(Arc::clone(&shared), ticket),
    );
}

async fn persist_route(shared: &Shared, ticket: Ticket) {
    if let Err(e) = shared.store.save_route(ticket.route).await {
        warn!(route = %ticket.route, error = %e, "Failed to save selected route");
    }
}

async fn load_stops(shared: &Shared, ticket: Ticket) {
    let client = shared.client.as_ref();

    match with_backoff(&shared.config.retry, move || client.get_stops(ticket.route)).await {
        Ok(stops) => {
            let count = stops.len();
            if shared.apply_stops(ticket, stops) {
                debug!(route = %ticket.route, count, "Stops loaded");
            } else {
                debug!(route = %ticket.route, "Discarding stops for replaced activation");
            }
        }
        Err(e) => {
            warn!(route = %ticket.route, error = %e, "Failed to load stops");
            shared.record_error(Some(ticket), &e);
        }
    }
}

async fn load_trace(shared: &Shared, ticket: Ticket) {
    let client = shared.client.as_ref();

    match with_backoff(&shared.config.retry, move || client.get_trace(ticket.route)).await {
        Ok(trace) => {
            let segments = trace.polylines.len();
            if shared.apply_trace(ticket, trace) {
                debug!(route = %ticket.route, segments, "Route trace loaded");
            } else {
                debug!(route = %ticket.route, "Discarding trace for replaced activation");
            }
        }
        Err(e) => {
            warn!(route = %ticket.route, error = %e, "Failed to load route trace");
            shared.record_error(Some(ticket), &e);
        }
    }
}

/// Tick on the refresh interval until the route reports no vehicles.
///
/// The first tick fires immediately. Ticks are not serialized: each one is
/// spawned and may still be in flight when the next starts.
async fn refresh_vehicles(shared: Arc<Shared>, ticket: Ticket) {
    let mut interval = tokio::time::interval(shared.config.refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight = JoinSet::new();
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick += 1;
                in_flight.spawn(vehicle_tick(Arc::clone(&shared), ticket, tick));
            }
            Some(joined) = in_flight.join_next() => {
                if let Ok(TickOutcome::NoVehicles) = joined {
                    break;
                }
            }
        }
    }

    shared.stop_refreshing(ticket);
    info!(route = %ticket.route, ticks = tick, "No vehicles running, refresh stopped");

    // Only the timer stops. Earlier ticks run to completion so a recenter
    // already claimed by one of them still lands.
    while in_flight.join_next().await.is_some() {}
}

async fn vehicle_tick(shared: Arc<Shared>, ticket: Ticket, tick: u64) -> TickOutcome {
    // Vehicle failures stay quiet: the next tick usually recovers.
    let vehicles = match shared.client.get_vehicles(ticket.route).await {
        Ok(vehicles) => vehicles,
        Err(e) => {
            debug!(route = %ticket.route, tick, error = %e, "Vehicle refresh failed");
            return TickOutcome::Failed;
        }
    };

    match shared.apply_vehicles(ticket, tick, &vehicles) {
        VehicleApply::Stale => {
            debug!(route = %ticket.route, tick, "Discarding stale vehicle positions");
            TickOutcome::Stale
        }
        VehicleApply::Empty => TickOutcome::NoVehicles,
        VehicleApply::Updated { claim_recenter } => {
            debug!(route = %ticket.route, tick, count = vehicles.len(), "Vehicles updated");
            if claim_recenter {
                recenter(&shared, ticket, &vehicles).await;
            }
            TickOutcome::Updated
        }
    }
}

/// Point the map at the vehicle closest to the rider.
///
/// Any location failure skips the recenter for this activation.
async fn recenter(shared: &Shared, ticket: Ticket, vehicles: &[Vehicle]) {
    if shared.location.request_permission().await == PermissionStatus::Denied {
        warn!(route = %ticket.route, "Location permission denied, not recentering");
        return;
    }

    let rider = match shared.location.current_location().await {
        Ok(rider) => rider,
        Err(e) => {
            warn!(route = %ticket.route, error = %e, "Location unavailable, not recentering");
            return;
        }
    };

    let Some((index, nearest)) = nearest_vehicle(rider, vehicles) else {
        return;
    };

    if shared.apply_recenter(ticket, nearest.location) {
        info!(
            route = %ticket.route,
            index,
            lat = nearest.location.lat,
            lon = nearest.location.lon,
            "Recentering on nearest vehicle"
        );
    }
}
