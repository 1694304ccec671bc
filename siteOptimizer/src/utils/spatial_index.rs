use crate::data::poi::{Coordinate, POI};
use crate::config::const_funcs::{km_to_lat_degrees, km_to_lng_degrees};
use std::fmt;

const NODE_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 16;

/// Axis-aligned box in degrees, stored as centre and half extents.
#[derive(Clone, Copy, Debug)]
pub struct Boundary {
    center: Coordinate,
    half_lat: f64,
    half_lng: f64,
}

impl Boundary {
    pub fn new(center: Coordinate, half_lat: f64, half_lng: f64) -> Self {
        Self { center, half_lat, half_lng }
    }

    pub fn contains_point(&self, point: &Coordinate) -> bool {
        point.lat >= self.center.lat - self.half_lat &&
        point.lat <= self.center.lat + self.half_lat &&
        point.lng >= self.center.lng - self.half_lng &&
        point.lng <= self.center.lng + self.half_lng
    }

    pub fn intersects(&self, other: &Boundary) -> bool {
        (self.center.lat - other.center.lat).abs() <= self.half_lat + other.half_lat &&
        (self.center.lng - other.center.lng).abs() <= self.half_lng + other.half_lng
    }
}

#[derive(Clone, Debug)]
pub struct QuadTreeNode {
    boundary: Boundary,
    points: Vec<(usize, Coordinate)>,
    children: Option<Box<[QuadTreeNode; 4]>>,
    depth: usize,
}

impl QuadTreeNode {
    fn new(boundary: Boundary, depth: usize) -> Self {
        Self {
            boundary,
            points: Vec::new(),
            children: None,
            depth,
        }
    }

    fn subdivide(&mut self) {
        let lat = self.boundary.center.lat;
        let lng = self.boundary.center.lng;
        let hl = self.boundary.half_lat / 2.0;
        let hg = self.boundary.half_lng / 2.0;
        let depth = self.depth + 1;

        self.children = Some(Box::new([
            // Northwest
            QuadTreeNode::new(Boundary::new(Coordinate::new(lat + hl, lng - hg), hl, hg), depth),
            // Northeast
            QuadTreeNode::new(Boundary::new(Coordinate::new(lat + hl, lng + hg), hl, hg), depth),
            // Southwest
            QuadTreeNode::new(Boundary::new(Coordinate::new(lat - hl, lng - hg), hl, hg), depth),
            // Southeast
            QuadTreeNode::new(Boundary::new(Coordinate::new(lat - hl, lng + hg), hl, hg), depth),
        ]));

        let points = std::mem::take(&mut self.points);
        for (index, point) in points {
            self.insert(index, point);
        }
    }

    fn insert(&mut self, index: usize, point: Coordinate) -> bool {
        if !self.boundary.contains_point(&point) {
            return false;
        }

        if let Some(children) = &mut self.children {
            return children.iter_mut().any(|child| child.insert(index, point));
        }

        self.points.push((index, point));
        if self.points.len() > NODE_CAPACITY && self.depth < MAX_DEPTH {
            self.subdivide();
        }
        true
    }

    fn query(&self, range: &Boundary, found: &mut Vec<usize>) {
        if !self.boundary.intersects(range) {
            return;
        }
        for (index, point) in &self.points {
            if range.contains_point(point) {
                found.push(*index);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(range, found);
            }
        }
    }
}

/// Quadtree of point positions keyed by their index in the caller's slice.
#[derive(Clone)]
pub struct SpatialIndex {
    root: QuadTreeNode,
    len: usize,
}

impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.len)
            .field("root", &self.root.boundary)
            .finish()
    }
}

impl SpatialIndex {
    /// Indexes the location of each item; query results are positions in `items`.
    pub fn from_pois<P: POI>(items: &[P]) -> Self {
        let points: Vec<Coordinate> = items.iter().map(|item| *item.get_coordinate()).collect();
        Self::from_points(&points)
    }

    /// Builds an index covering every point, in order.
    pub fn from_points(points: &[Coordinate]) -> Self {
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }
        if points.is_empty() {
            min_lat = 0.0;
            max_lat = 0.0;
            min_lng = 0.0;
            max_lng = 0.0;
        }

        // Pad so points on the outer edge stay inside the root
        let half_lat = ((max_lat - min_lat) / 2.0).max(1e-6) * 1.01;
        let half_lng = ((max_lng - min_lng) / 2.0).max(1e-6) * 1.01;
        let center = Coordinate::new((max_lat + min_lat) / 2.0, (max_lng + min_lng) / 2.0);

        let mut root = QuadTreeNode::new(Boundary::new(center, half_lat, half_lng), 0);
        let mut len = 0;
        for (index, point) in points.iter().enumerate() {
            if root.insert(index, *point) {
                len += 1;
            }
        }

        Self { root, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices of points inside a degree box enclosing the circle of `radius_km`,
    /// sorted ascending. Callers still need an exact distance check.
    pub fn candidates_within(&self, center: &Coordinate, radius_km: f64) -> Vec<usize> {
        // Widen the longitude window at the cell's pole-side edge
        let lat_pad = km_to_lat_degrees(radius_km);
        let edge_lat = if center.lat >= 0.0 { center.lat + lat_pad } else { center.lat - lat_pad };
        let lng_pad = km_to_lng_degrees(radius_km, edge_lat.clamp(-89.9, 89.9));
        let range = Boundary::new(*center, lat_pad * 1.01, lng_pad * 1.01);

        let mut found = Vec::new();
        self.root.query(&range, &mut found);
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_every_point_inside_radius() {
        let points: Vec<Coordinate> = (0..100)
            .map(|i| Coordinate::new(35.0 + (i / 10) as f64 * 0.01, 139.0 + (i % 10) as f64 * 0.01))
            .collect();
        let index = SpatialIndex::from_points(&points);
        assert_eq!(index.len(), 100);

        let center = Coordinate::new(35.045, 139.045);
        let found = index.candidates_within(&center, 2.0);
        for (i, p) in points.iter().enumerate() {
            if p.distance_to(&center) <= 2.0 {
                assert!(found.contains(&i), "point {} missing", i);
            }
        }
        assert!(found.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SpatialIndex::from_points(&[]);
        assert!(index.is_empty());
        assert!(index.candidates_within(&Coordinate::new(0.0, 0.0), 5.0).is_empty());
    }
}
