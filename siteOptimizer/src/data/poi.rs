use serde::{Deserialize, Serialize};
use crate::config::const_funcs::haversine_km;
use crate::errors::{SiteError, SiteResult};

/// Internal lat/lng representation. Every input shape is normalised into this once, at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn try_new(lat: f64, lng: f64) -> SiteResult<Self> {
        let coordinate = Self { lat, lng };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(SiteError::InvalidCoordinate(format!("({}, {}) is not a valid lat/lng", lat, lng)))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in kilometres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

pub trait POI {
    fn get_coordinate(&self) -> &Coordinate;
    fn get_id(&self) -> &str;
}

/// `[lng, lat]` array or a further nested geometry object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeometryCoordinates {
    Pair(Vec<f64>),
    Nested { coordinates: Vec<f64> },
}

/// Coordinate shapes accepted at the boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLocation {
    LatLng { lat: f64, lng: f64 },
    LatitudeLongitude { latitude: f64, longitude: f64 },
    Geometry { coordinates: GeometryCoordinates },
}

impl RawLocation {
    pub fn normalize(&self) -> SiteResult<Coordinate> {
        match self {
            RawLocation::LatLng { lat, lng } => Coordinate::try_new(*lat, *lng),
            RawLocation::LatitudeLongitude { latitude, longitude } => {
                Coordinate::try_new(*latitude, *longitude)
            }
            RawLocation::Geometry { coordinates } => {
                let pair = match coordinates {
                    GeometryCoordinates::Pair(values) => values,
                    GeometryCoordinates::Nested { coordinates } => coordinates,
                };
                match pair.as_slice() {
                    // GeoJSON order is [lng, lat]
                    [lng, lat, ..] => Coordinate::try_new(*lat, *lng),
                    _ => Err(SiteError::InvalidCoordinate(format!(
                        "geometry needs at least two values, got {}",
                        pair.len()
                    ))),
                }
            }
        }
    }
}
