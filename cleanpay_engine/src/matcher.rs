//! Cleaner-to-booking matching.
//!
//! Given a booking and the roster of cleaners offering the required service,
//! produce a ranked candidate list: active, available cleaners whose declared
//! service radius covers the booking location. Ranking is rating first
//! (descending), distance second (ascending).
//!
//! The eligibility snapshot is computed fresh on every assignment attempt and
//! never stored.

use std::cmp::Ordering;

use crate::db_types::{Booking, Cleaner};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A cleaner that passed all eligibility filters, with the computed distance to the booking.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub cleaner: Cleaner,
    pub distance_km: f64,
}

/// Great-circle distance between two coordinate pairs, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Cleaners with zero or out-of-range coordinates are never matched.
fn has_valid_coordinates(cleaner: &Cleaner) -> bool {
    let zeroed = cleaner.latitude == 0.0 && cleaner.longitude == 0.0;
    let in_range = cleaner.latitude.abs() <= 90.0 && cleaner.longitude.abs() <= 180.0;
    !zeroed && in_range && cleaner.radius_km > 0.0
}

/// Filters and ranks the given cleaners for the booking. The first candidate, if any, is the
/// one that should be assigned.
pub fn rank_candidates(booking: &Booking, cleaners: &[Cleaner]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = cleaners
        .iter()
        .filter(|c| c.is_active && c.is_available && has_valid_coordinates(c))
        .map(|c| {
            let distance_km = haversine_km(booking.latitude, booking.longitude, c.latitude, c.longitude);
            Candidate { cleaner: c.clone(), distance_km }
        })
        .filter(|cand| cand.distance_km <= cand.cleaner.radius_km)
        .collect();
    candidates.sort_by(|a, b| {
        b.cleaner
            .rating
            .partial_cmp(&a.cleaner.rating)
            .unwrap_or(Ordering::Equal)
            .then(a.distance_km.partial_cmp(&b.distance_km).unwrap_or(Ordering::Equal))
    });
    candidates
}
