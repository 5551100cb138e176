//! Pluggable networking traits.
//!
//! External crates implement these to provide data fetching, device location
//! and route persistence.

use std::future::Future;
use std::pin::Pin;

use crate::identifiers::RouteId;
use crate::models::types::{Coordinate, LocationError, Result, Route, Stop, StoreError, Trace, Vehicle};

/// Typed access to the upstream transit feed.
///
/// Each call is exactly one request/response exchange. Implementations do no
/// retrying or caching of their own.
pub trait TransitDataClient: Send + Sync {
    fn list_routes<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<Route>>> + Send + 'a>>;

    fn get_stops<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Stop>>> + Send + 'a>>;

    fn get_trace<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = Result<Trace>> + Send + 'a>>;

    /// Live positions; an empty list means nothing is running on the route
    fn get_vehicles<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vehicle>>> + Send + 'a>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Device location services
pub trait LocationProvider: Send + Sync {
    fn request_permission<'a>(&'a self) -> Pin<Box<dyn Future<Output = PermissionStatus> + Send + 'a>>;

    fn current_location<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Coordinate, LocationError>> + Send + 'a>>;
}

/// Key-value persistence for the last selected route
pub trait RouteStore: Send + Sync {
    fn load_last_route<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Option<RouteId>, StoreError>> + Send + 'a>>;

    fn save_route<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), StoreError>> + Send + 'a>>;
}
