//! Foreign-implemented collaborators and their adapters onto the engine traits.
//!
//! Foreign callbacks are synchronous and may block (a location fix can take a
//! while), so every call is moved onto Tokio's blocking pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bus_watch_core::transit::{
    Coordinate, LocationError, LocationProvider, PermissionStatus, RouteId, RouteStore, StoreError,
};
use tracing::warn;

use crate::error::TrackerError;
use crate::records::{CoordinateRecord, MapRegionRecord, SnapshotRecord};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Device location, implemented by the app shell.
#[uniffi::export(with_foreign)]
pub trait LocationCallback: Send + Sync {
    /// Prompt for location permission if needed; `true` once granted.
    fn request_permission(&self) -> bool;

    fn current_location(&self) -> Result<CoordinateRecord, TrackerError>;
}

/// Persistence for the last selected route, implemented by the app shell.
#[uniffi::export(with_foreign)]
pub trait RouteStoreCallback: Send + Sync {
    fn load_last_route(&self) -> Result<Option<i64>, TrackerError>;

    fn save_route(&self, route: i64) -> Result<(), TrackerError>;
}

/// Receives engine output. Called from a background thread.
#[uniffi::export(with_foreign)]
pub trait TrackerListener: Send + Sync {
    fn on_snapshot(&self, snapshot: SnapshotRecord);

    fn on_recenter(&self, route: i64, region: MapRegionRecord);

    fn on_no_vehicles(&self, route: i64);
}

async fn blocking<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| e.to_string())
}

pub(crate) struct ForeignLocation(pub Arc<dyn LocationCallback>);

impl LocationProvider for ForeignLocation {
    fn request_permission<'a>(&'a self) -> BoxFuture<'a, PermissionStatus> {
        let callback = Arc::clone(&self.0);
        Box::pin(async move {
            match blocking(move || callback.request_permission()).await {
                Ok(true) => PermissionStatus::Granted,
                Ok(false) => PermissionStatus::Denied,
                Err(e) => {
                    warn!(error = %e, "Permission callback failed");
                    PermissionStatus::Denied
                }
            }
        })
    }

    fn current_location<'a>(&'a self) -> BoxFuture<'a, Result<Coordinate, LocationError>> {
        let callback = Arc::clone(&self.0);
        Box::pin(async move {
            match blocking(move || callback.current_location()).await {
                Ok(Ok(position)) => Ok(position.into()),
                Ok(Err(e)) => Err(LocationError::Unavailable(e.to_string())),
                Err(e) => Err(LocationError::Unavailable(e)),
            }
        })
    }
}

pub(crate) struct ForeignStore(pub Arc<dyn RouteStoreCallback>);

impl RouteStore for ForeignStore {
    fn load_last_route<'a>(&'a self) -> BoxFuture<'a, Result<Option<RouteId>, StoreError>> {
        let callback = Arc::clone(&self.0);
        Box::pin(async move {
            match blocking(move || callback.load_last_route()).await {
                Ok(Ok(route)) => Ok(route.map(RouteId::new)),
                Ok(Err(e)) => Err(StoreError(e.to_string())),
                Err(e) => Err(StoreError(e)),
            }
        })
    }

    fn save_route<'a>(&'a self, route: RouteId) -> BoxFuture<'a, Result<(), StoreError>> {
        let callback = Arc::clone(&self.0);
        Box::pin(async move {
            match blocking(move || callback.save_route(route.get())).await {
                Ok(result) => result.map_err(|e| StoreError(e.to_string())),
                Err(e) => Err(StoreError(e)),
            }
        })
    }
}
