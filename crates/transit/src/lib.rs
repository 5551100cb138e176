//! # bus-watch-transit
//!
//! Transit data model and pluggable I/O seams for live bus tracking.
//!
//! ## Features
//!
//! - **Typed entities**: routes, stops, vehicles and route traces
//! - **Spatial queries**: haversine distance and nearest-vehicle selection
//! - **Pluggable networking**: implement your own data client, location source and route store
//!
//! ## Example
//!
//! ```
//! use bus_watch_transit::prelude::*;
//!
//! let rider = Coordinate::new(37.7022, -121.9358);
//! let vehicles = vec![
//!     Vehicle::new(Coordinate::new(37.7100, -121.9000), 90.0),
//!     Vehicle::new(Coordinate::new(37.7025, -121.9360), 270.0),
//! ];
//!
//! let (index, closest) = nearest_vehicle(rider, &vehicles).unwrap();
//! assert_eq!(index, 1);
//! assert!(closest.faces_west());
//! ```

pub mod identifiers;
pub mod models;
pub mod network;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::types::*;
    pub use crate::network::traits::*;
    pub use crate::spatial::{distance, nearest, nearest_vehicle};
}

pub use prelude::*;
