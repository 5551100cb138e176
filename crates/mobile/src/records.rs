//! Plain records handed across the FFI boundary.

use bus_watch_core::transit::{Coordinate, MapRegion, Route, Stop, Trace, Vehicle};
use bus_watch_core::{EngineStatus, LastError, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct CoordinateRecord {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinate> for CoordinateRecord {
    fn from(c: Coordinate) -> Self {
        Self {
            latitude: c.lat,
            longitude: c.lon,
        }
    }
}

impl From<CoordinateRecord> for Coordinate {
    fn from(c: CoordinateRecord) -> Self {
        Coordinate::new(c.latitude, c.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct MapRegionRecord {
    pub center: CoordinateRecord,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl From<MapRegion> for MapRegionRecord {
    fn from(region: MapRegion) -> Self {
        Self {
            center: region.center.into(),
            latitude_delta: region.latitude_delta,
            longitude_delta: region.longitude_delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct RouteRecord {
    pub id: i64,
    pub name: String,
}

impl From<&Route> for RouteRecord {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id.get(),
            name: route.name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct StopRecord {
    pub coordinate: CoordinateRecord,
    pub name: String,
    pub time_point: Option<String>,
    /// Drawn with a larger marker
    pub is_major: bool,
}

impl From<&Stop> for StopRecord {
    fn from(stop: &Stop) -> Self {
        Self {
            coordinate: stop.location.into(),
            name: stop.name.to_string(),
            time_point: stop.time_point.as_ref().map(|t| t.as_str().to_owned()),
            is_major: stop.is_major(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct VehicleRecord {
    pub coordinate: CoordinateRecord,
    pub heading: f64,
    /// Whether to draw the west-facing bus icon
    pub faces_west: bool,
}

impl From<&Vehicle> for VehicleRecord {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            coordinate: vehicle.location.into(),
            heading: vehicle.heading,
            faces_west: vehicle.faces_west(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct TraceRecord {
    pub pen_color: String,
    pub polylines: Vec<Vec<CoordinateRecord>>,
}

impl From<&Trace> for TraceRecord {
    fn from(trace: &Trace) -> Self {
        Self {
            pen_color: trace.pen_color.to_string(),
            polylines: trace
                .polylines
                .iter()
                .map(|line| line.iter().copied().map(CoordinateRecord::from).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum StatusRecord {
    Idle,
    Activating { route: i64 },
    Active { route: i64 },
}

impl From<EngineStatus> for StatusRecord {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Idle => Self::Idle,
            EngineStatus::Activating(route) => Self::Activating { route: route.get() },
            EngineStatus::Active(route) => Self::Active { route: route.get() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct LastErrorRecord {
    /// Upstream method name, e.g. `getStops`
    pub operation: String,
    pub message: String,
}

impl From<&LastError> for LastErrorRecord {
    fn from(error: &LastError) -> Self {
        Self {
            operation: error.operation.as_str().to_owned(),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct SnapshotRecord {
    pub status: StatusRecord,
    pub route_list: Vec<RouteRecord>,
    pub active_route: Option<i64>,
    pub stops: Option<Vec<StopRecord>>,
    pub trace: Option<TraceRecord>,
    pub vehicles: Option<Vec<VehicleRecord>>,
    /// Unix milliseconds of the last vehicle update
    pub vehicles_updated_at: Option<i64>,
    pub recenter_region: Option<MapRegionRecord>,
    pub refreshing: bool,
    pub last_error: Option<LastErrorRecord>,
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(s: &Snapshot) -> Self {
        Self {
            status: s.status.into(),
            route_list: s.route_list.iter().map(RouteRecord::from).collect(),
            active_route: s.active_route.map(|r| r.get()),
            stops: s.stops.as_ref().map(|stops| stops.iter().map(StopRecord::from).collect()),
            trace: s.trace.as_ref().map(TraceRecord::from),
            vehicles: s
                .vehicles
                .as_ref()
                .map(|vehicles| vehicles.iter().map(VehicleRecord::from).collect()),
            vehicles_updated_at: s.vehicles_updated_at.map(|t| t.timestamp_millis()),
            recenter_region: s.recenter_target.map(|c| MapRegion::around(c).into()),
            refreshing: s.refreshing,
            last_error: s.last_error.as_ref().map(LastErrorRecord::from),
        }
    }
}
