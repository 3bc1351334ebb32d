//! Delivery-fee geolocation maths. Pure functions, no state.
use serde::{Deserialize, Serialize};

use crate::db_types::Cedi;

/// Mean Earth radius in kilometers, as used by the Haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A delivery-fee quote between a vendor and a customer location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub distance_km: f64,
    pub fee: Cedi,
    pub breakdown: String,
}

/// Great-circle distance between two coordinates in kilometers (Haversine), rounded to 2 decimal places.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) +
        a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let d = 2.0 * EARTH_RADIUS_KM * h.sqrt().asin();
    (d * 100.0).round() / 100.0
}

/// The tiered delivery fee for a distance:
/// up to 1 km GHC 5, up to 3 km GHC 7, up to 5 km GHC 10, and beyond that GHC 2 per started kilometer on top.
pub fn delivery_fee(distance_km: f64) -> Cedi {
    if distance_km <= 1.0 {
        Cedi::from_cedis(5)
    } else if distance_km <= 3.0 {
        Cedi::from_cedis(7)
    } else if distance_km <= 5.0 {
        Cedi::from_cedis(10)
    } else {
        let surcharge = ((distance_km - 5.0) * 2.0).ceil() as i64;
        Cedi::from_cedis(10 + surcharge)
    }
}

/// Computes the full quote between vendor and customer locations.
pub fn quote(vendor: Coordinates, customer: Coordinates) -> DeliveryQuote {
    let distance_km = self::distance_km(vendor, customer);
    let fee = delivery_fee(distance_km);
    let breakdown = if distance_km <= 5.0 {
        format!("{distance_km} km: flat {fee}")
    } else {
        format!("{distance_km} km: GHC 10.00 base + GHC 2.00 per started km beyond 5 km")
    };
    DeliveryQuote { distance_km, fee, breakdown }
}
