//! Core data types and errors for live transit data.

use std::fmt;
use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;

// ============================================================================
// Geometry
// ============================================================================

/// A latitude/longitude pair in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for Point {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lon, c.lat)
    }
}

impl From<Point> for Coordinate {
    fn from(p: Point) -> Self {
        Self::new(p.y(), p.x())
    }
}

/// A visible map area, expressed as a center plus the span in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapRegion {
    pub center: Coordinate,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Span used both for the initial view and when panning to a vehicle
    pub const DEFAULT_DELTA: f64 = 0.02;

    /// Dublin/Pleasanton service area
    pub const DEFAULT: MapRegion = MapRegion {
        center: Coordinate::new(37.702222, -121.935833),
        latitude_delta: Self::DEFAULT_DELTA,
        longitude_delta: Self::DEFAULT_DELTA,
    };

    pub fn around(center: Coordinate) -> Self {
        Self {
            center,
            ..Self::DEFAULT
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A named transit line
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub name: Arc<str>,
}

/// A stop along a route
///
/// Stops carrying a time point id are scheduled ("major") stops; the rest
/// are minor stops.
#[derive(Clone, Debug, PartialEq)]
pub struct Stop {
    pub location: Coordinate,
    pub name: Arc<str>,
    pub time_point: Option<TimePointId>,
}

impl Stop {
    pub fn is_major(&self) -> bool {
        self.time_point.is_some()
    }
}

/// A live vehicle position report
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vehicle {
    pub location: Coordinate,
    /// Degrees clockwise from north, in `[0, 360)`
    pub heading: f64,
}

impl Vehicle {
    pub fn new(location: Coordinate, heading: f64) -> Self {
        Self {
            location,
            heading: normalize_heading(heading),
        }
    }

    /// Whether the vehicle is travelling through the western half of the compass.
    pub fn faces_west(&self) -> bool {
        self.heading > 180.0
    }
}

/// Wrap a heading into `[0, 360)`. Non-finite headings are passed through.
pub fn normalize_heading(heading: f64) -> f64 {
    if !heading.is_finite() {
        return heading;
    }

    let wrapped = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Geometry of a route: one or more disjoint polylines drawn in `pen_color`
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub pen_color: Arc<str>,
    pub polylines: Vec<Vec<Coordinate>>,
}

// ============================================================================
// Errors
// ============================================================================

/// The upstream operation a fetch belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListRoutes,
    GetStops,
    GetTrace,
    GetVehicles,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListRoutes => "listRoutes",
            Operation::GetStops => "getStops",
            Operation::GetTrace => "getTrace",
            Operation::GetVehicles => "getVehicles",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchCause {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// A failed request/response exchange with the upstream feed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {cause}")]
pub struct FetchError {
    pub operation: Operation,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(operation: Operation, cause: FetchCause) -> Self {
        Self { operation, cause }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Route store error: {0}")]
pub struct StoreError(pub String);

pub type Result<T> = std::result::Result<T, FetchError>;
