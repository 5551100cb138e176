//! Distance and proximity queries.

pub mod queries;

pub use queries::{distance, haversine_distance, nearest, nearest_vehicle};
