use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::data::poi::{Coordinate, POI};
use crate::errors::{SiteError, SiteResult};

/// Geographic box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl MeshBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    /// Box of `side_km` × `side_km` centred on `center`.
    pub fn square_around(center: &Coordinate, side_km: f64) -> Self {
        use crate::config::const_funcs::{km_to_lat_degrees, km_to_lng_degrees};
        let half_lat = km_to_lat_degrees(side_km / 2.0);
        let half_lng = km_to_lng_degrees(side_km / 2.0, center.lat);
        Self {
            north: center.lat + half_lat,
            south: center.lat - half_lat,
            east: center.lng + half_lng,
            west: center.lng - half_lng,
        }
    }

    pub fn validate(&self) -> SiteResult<()> {
        let values = [self.north, self.south, self.east, self.west];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SiteError::InvalidBounds("bounds must be finite numbers".to_string()));
        }
        if self.north > 90.0 || self.south < -90.0 || self.east > 180.0 || self.west < -180.0 {
            return Err(SiteError::InvalidBounds(format!("bounds {:?} exceed the globe", self)));
        }
        if self.north <= self.south {
            return Err(SiteError::InvalidBounds("north must be greater than south".to_string()));
        }
        if self.east <= self.west {
            return Err(SiteError::InvalidBounds("east must be greater than west".to_string()));
        }
        Ok(())
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        point.lat >= self.south && point.lat <= self.north && point.lng >= self.west && point.lng <= self.east
    }

    // Half-open variant so a point on a shared edge belongs to exactly one cell
    pub fn contains_half_open(&self, point: &Coordinate) -> bool {
        point.lat >= self.south && point.lat < self.north && point.lng >= self.west && point.lng < self.east
    }
}

/// One grid cell of the demand mesh.
///
/// `population` and `demand` are fixed at generation time. The capture fields are rebuilt
/// from scratch by the capture engine whenever the store set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandMeshCell {
    pub id: String,
    pub bounds: MeshBounds,
    pub center: Coordinate,
    pub population: u32,
    pub demand: f64,
    #[serde(default)]
    pub captured_by: Vec<String>,
    #[serde(default)]
    pub capture_ratio: BTreeMap<String, f64>,
}

impl DemandMeshCell {
    pub fn new(id: String, bounds: MeshBounds, population: u32, demand: f64) -> Self {
        Self {
            id,
            center: bounds.center(),
            bounds,
            population,
            demand,
            captured_by: Vec::new(),
            capture_ratio: BTreeMap::new(),
        }
    }

    pub fn ratio_for(&self, store_id: &str) -> f64 {
        self.capture_ratio.get(store_id).copied().unwrap_or(0.0)
    }

    pub fn is_captured(&self) -> bool {
        !self.captured_by.is_empty()
    }

    pub fn clear_capture(&mut self) {
        self.captured_by.clear();
        self.capture_ratio.clear();
    }
}

impl POI for DemandMeshCell {
    fn get_coordinate(&self) -> &Coordinate {
        &self.center
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}
