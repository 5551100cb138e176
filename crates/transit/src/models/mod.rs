//! Transit data models and error types.

pub mod types;

// Re-exports for convenience
pub use types::{
    Coordinate, FetchCause, FetchError, LocationError, MapRegion, Operation, Result, Route, Stop,
    StoreError, Trace, Vehicle,
};
