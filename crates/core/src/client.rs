//! WebWatch transit feed client.
//!
//! Every WebWatch page method is a POST with a small JSON body, answered by a
//! JSON object whose only field `d` wraps the payload. [`WebWatchClient`]
//! implements [`TransitDataClient`] on top of a reusable `reqwest::Client`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bus_watch_transit::{
    Coordinate, FetchCause, FetchError, Operation, Route, RouteId, Stop, TimePointId, Trace,
    TransitDataClient, Vehicle,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::WebWatchConfig;

const ACCEPT_VALUE: &str = "application/json, text/javascript, */*; q=0.01";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

type FetchResult<T> = Result<T, FetchError>;

/// Page method path relative to the base URL
fn webwatch_path(operation: Operation) -> &'static str {
    match operation {
        Operation::ListRoutes => "Arrivals.aspx/getRoutes",
        Operation::GetStops => "GoogleMap.aspx/getStops",
        Operation::GetTrace => "GoogleMap.aspx/getRouteTrace",
        Operation::GetVehicles => "GoogleMap.aspx/getVehicles",
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    d: T,
}

#[derive(Serialize)]
struct RouteRequest {
    #[serde(rename = "routeID")]
    route_id: i64,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    id: i64,
    name: String,
}

/// Time point ids show up as numbers, strings or null depending on the agency.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimePoint {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawTimePoint {
    /// Zero and blank ids mark a minor stop, same as a missing one.
    fn into_identifier(self) -> Option<TimePointId> {
        match self {
            RawTimePoint::Integer(0) => None,
            RawTimePoint::Integer(n) => Some(TimePointId::new(n.to_string())),
            RawTimePoint::Float(f) if f == 0.0 || f.is_nan() => None,
            RawTimePoint::Float(f) => Some(TimePointId::new(f.to_string())),
            RawTimePoint::Text(s) if s.trim().is_empty() => None,
            RawTimePoint::Text(s) => Some(TimePointId::new(s)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStop {
    lat: f64,
    lon: f64,
    #[serde(rename = "stopName")]
    stop_name: String,
    #[serde(rename = "timePointID", default)]
    time_point_id: Option<RawTimePoint>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawTrace {
    #[serde(rename = "penColor")]
    pen_color: String,
    #[serde(default)]
    polylines: Vec<Vec<RawPoint>>,
}

#[derive(Debug, Deserialize)]
struct RawVehicle {
    lat: f64,
    lon: f64,
    heading: f64,
}

impl From<RawRoute> for Route {
    fn from(raw: RawRoute) -> Self {
        Route {
            id: RouteId::new(raw.id),
            name: raw.name.into(),
        }
    }
}

impl From<RawStop> for Stop {
    fn from(raw: RawStop) -> Self {
        Stop {
            location: Coordinate::new(raw.lat, raw.lon),
            name: raw.stop_name.into(),
            time_point: raw.time_point_id.and_then(RawTimePoint::into_identifier),
        }
    }
}

impl From<RawTrace> for Trace {
    fn from(raw: RawTrace) -> Self {
        Trace {
            pen_color: raw.pen_color.into(),
            polylines: raw
                .polylines
                .into_iter()
                .map(|line| {
                    line.into_iter()
                        .map(|p| Coordinate::new(p.lat, p.lon))
                        .collect()
                })
                .collect(),
        }
    }
}

impl From<RawVehicle> for Vehicle {
    fn from(raw: RawVehicle) -> Self {
        Vehicle::new(Coordinate::new(raw.lat, raw.lon), raw.heading)
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, bytes: &[u8]) -> FetchResult<T> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(|envelope| envelope.d)
        .map_err(|e| FetchError::new(operation, FetchCause::Decode(e.to_string())))
}

// ============================================================================
// Client
// ============================================================================

/// WebWatch client using direct HTTP requests.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct WebWatchClient {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl WebWatchClient {
    pub fn new(config: WebWatchConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, operation: Operation) -> String {
        format!("{}/{}", self.base_url, webwatch_path(operation))
    }

    /// Issue one page method call and unwrap the `d` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: Operation,
        route: Option<RouteId>,
    ) -> FetchResult<T> {
        let transport = |e: reqwest::Error| FetchError::new(operation, FetchCause::Transport(e.to_string()));

        let mut request = self
            .http
            .post(self.url(operation))
            .header(ACCEPT, ACCEPT_VALUE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        // `json` keeps the explicit charset content type set above
        if let Some(route) = route {
            request = request.json(&RouteRequest { route_id: route.get() });
        }

        let response = request.send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(operation, FetchCause::Status(status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(transport)?;

        tracing::trace!(
            %operation,
            route = route.map(RouteId::get),
            bytes = bytes.len(),
            "WebWatch response received"
        );

        decode(operation, &bytes)
    }

    pub async fn list_routes(&self) -> FetchResult<Vec<Route>> {
        let raw: Vec<RawRoute> = self.call(Operation::ListRoutes, None).await?;
        Ok(raw.into_iter().map(Route::from).collect())
    }

    pub async fn get_stops(&self, route: RouteId) -> FetchResult<Vec<Stop>> {
        let raw: Vec<RawStop> = self.call(Operation::GetStops, Some(route)).await?;
        Ok(raw.into_iter().map(Stop::from).collect())
    }

    pub async fn get_trace(&self, route: RouteId) -> FetchResult<Trace> {
        let raw: RawTrace = self.call(Operation::GetTrace, Some(route)).await?;
        Ok(raw.into())
    }

    /// A `null` payload means the same as an empty list.
    pub async fn get_vehicles(&self, route: RouteId) -> FetchResult<Vec<Vehicle>> {
        let raw: Option<Vec<RawVehicle>> = self.call(Operation::GetVehicles, Some(route)).await?;

        let vehicles: Vec<Vehicle> = raw.unwrap_or_default().into_iter().map(Vehicle::from).collect();
        tracing::debug!(%route, count = vehicles.len(), "vehicle positions fetched");

        Ok(vehicles)
    }
}

impl TransitDataClient for WebWatchClient {
    fn list_routes<'a>(&'a self) -> Pin<Box<dyn Future<Output = FetchResult<Vec<Route>>> + Send + 'a>> {
        Box::pin(WebWatchClient::list_routes(self))
    }

    fn get_stops<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Vec<Stop>>> + Send + 'a>> {
        Box::pin(WebWatchClient::get_stops(self, route))
    }

    fn get_trace<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Trace>> + Send + 'a>> {
        Box::pin(WebWatchClient::get_trace(self, route))
    }

    fn get_vehicles<'a>(
        &'a self,
        route: RouteId,
    ) -> Pin<Box<dyn Future<Output = FetchResult<Vec<Vehicle>>> + Send + 'a>> {
        Box::pin(WebWatchClient::get_vehicles(self, route))
    }
}
