//! Spatial query utilities for distance calculations.
//!
//! Uses Haversine formula for accurate distances on Earth's surface.

use geo::{HaversineDistance, Point};

use crate::models::types::{Coordinate, Vehicle};

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Great-circle distance in meters between two coordinates.
///
/// NaN components produce a NaN distance.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    haversine_distance(a.into(), b.into())
}

/// Find the item closest to `origin`.
///
/// Ties go to the leftmost item. An item at NaN distance only wins when no
/// item has a comparable distance.
pub fn nearest<T>(
    origin: Coordinate,
    items: &[T],
    location: impl Fn(&T) -> Coordinate,
) -> Option<(usize, &T)> {
    let mut best: Option<(usize, f64)> = None;

    for (index, item) in items.iter().enumerate() {
        let d = distance(origin, location(item));
        match best {
            None => best = Some((index, d)),
            Some((_, best_d)) if d < best_d || (best_d.is_nan() && !d.is_nan()) => {
                best = Some((index, d))
            }
            Some(_) => {}
        }
    }

    best.map(|(index, _)| (index, &items[index]))
}

/// The vehicle nearest to the rider, with its index in `vehicles`
pub fn nearest_vehicle(rider: Coordinate, vehicles: &[Vehicle]) -> Option<(usize, &Vehicle)> {
    nearest(rider, vehicles, |v| v.location)
}
