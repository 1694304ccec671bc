use crate::config::constants::*;
use xxhash_rust::xxh32::xxh32;

/// Great-circle distance in kilometres between two lat/lng points (haversine).
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LAT
}

// Meridians converge toward the poles, so a metre spans more longitude there
pub fn meters_to_lng_degrees(meters: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs().max(MIN_COS_LATITUDE);
    meters / (METERS_PER_DEGREE_LAT * cos_lat)
}

pub fn km_to_lat_degrees(km: f64) -> f64 {
    meters_to_lat_degrees(km * 1000.0)
}

pub fn km_to_lng_degrees(km: f64, latitude: f64) -> f64 {
    meters_to_lng_degrees(km * 1000.0, latitude)
}

/// Deterministic value in [0, 1) derived from a coordinate and a salt.
pub fn coordinate_unit_hash(lat: f64, lng: f64, salt: u32) -> f64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&lat.to_bits().to_le_bytes());
    bytes[8..].copy_from_slice(&lng.to_bits().to_le_bytes());
    let hash = xxh32(&bytes, SYNTHETIC_HASH_SEED ^ salt);
    hash as f64 / (u32::MAX as f64 + 1.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    (m, variance.sqrt())
}

/// Pearson correlation coefficient; zero when either series is constant.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mx;
        let dy = yi - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator <= f64::EPSILON {
        0.0
    } else {
        (cov / denominator).clamp(-1.0, 1.0)
    }
}
