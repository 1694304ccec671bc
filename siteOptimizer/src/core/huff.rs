use crate::config::constants::{CAPTURE_RATIO_TOLERANCE, DISTANCE_FLOOR_KM};
use crate::config::engine_config::HuffParams;
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::store_site::StoreSite;
use crate::utils::logging::{self, OperationCategory};
use crate::utils::spatial_index::SpatialIndex;

/// Huff utility of a store seen from `distance_km` away.
pub fn huff_utility(attractiveness: f64, distance_km: f64, distance_decay: f64) -> f64 {
    attractiveness / distance_km.max(DISTANCE_FLOOR_KM).powf(distance_decay)
}

/// Capture ratios of every cell against one store set.
///
/// Rows follow the cell slice; each row lists `(store index, ratio)` for the stores in range,
/// ascending by store index. Rows are empty for cells no store reaches.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    store_count: usize,
}

impl CaptureMatrix {
    pub fn cell_count(&self) -> usize {
        self.rows.len()
    }

    pub fn store_count(&self) -> usize {
        self.store_count
    }

    pub fn row(&self, cell: usize) -> &[(usize, f64)] {
        &self.rows[cell]
    }

    /// Demand captured by each store, indexed like the store slice.
    pub fn store_demand(&self, cells: &[DemandMeshCell]) -> Vec<f64> {
        let mut totals = vec![0.0; self.store_count];
        for (row, cell) in self.rows.iter().zip(cells) {
            for &(store, ratio) in row {
                totals[store] += cell.demand * ratio;
            }
        }
        totals
    }

    /// Number of cells each store draws demand from.
    pub fn store_cell_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.store_count];
        for row in &self.rows {
            for &(store, _) in row {
                counts[store] += 1;
            }
        }
        counts
    }

    /// Demand captured by stores for which `select` returns true.
    pub fn demand_where<F: Fn(usize) -> bool>(&self, cells: &[DemandMeshCell], select: F) -> f64 {
        self.rows
            .iter()
            .zip(cells)
            .map(|(row, cell)| {
                row.iter()
                    .filter(|(store, _)| select(*store))
                    .map(|(_, ratio)| cell.demand * ratio)
                    .sum::<f64>()
            })
            .sum()
    }

    /// Demand captured by stores whose role counts toward our own network.
    pub fn own_demand(&self, cells: &[DemandMeshCell], stores: &[StoreSite]) -> f64 {
        self.demand_where(cells, |s| stores[s].role.is_own())
    }

    /// Fraction of cells captured by at least one store.
    pub fn coverage(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let captured = self.rows.iter().filter(|row| !row.is_empty()).count();
        captured as f64 / self.rows.len() as f64
    }

    /// Copies of `cells` carrying `captured_by`/`capture_ratio` for this matrix.
    pub fn annotate(&self, cells: &[DemandMeshCell], stores: &[StoreSite]) -> Vec<DemandMeshCell> {
        cells
            .iter()
            .zip(&self.rows)
            .map(|(cell, row)| {
                let mut annotated = cell.clone();
                annotated.clear_capture();
                for &(store, ratio) in row {
                    let id = &stores[store].id;
                    annotated.captured_by.push(id.clone());
                    *annotated.capture_ratio.entry(id.clone()).or_insert(0.0) += ratio;
                }
                annotated
            })
            .collect()
    }
}

fn check_row(row: &[(usize, f64)]) {
    debug_assert!(
        row.iter().all(|(_, r)| (0.0..=1.0 + CAPTURE_RATIO_TOLERANCE).contains(r)),
        "capture ratio outside [0, 1]: {:?}",
        row
    );
    debug_assert!(
        row.is_empty() || (row.iter().map(|(_, r)| r).sum::<f64>() - 1.0).abs() < CAPTURE_RATIO_TOLERANCE * 1e3,
        "capture ratios do not sum to 1: {:?}",
        row
    );
}

/// Allocates each cell's demand across the stores within `max_radius_km` of its centre.
///
/// Pure: the same cells, stores and parameters always give the same matrix. Stores with
/// invalid coordinates never enter the spatial index and so capture nothing.
pub fn compute_capture(cells: &[DemandMeshCell], stores: &[StoreSite], params: &HuffParams) -> CaptureMatrix {
    let _timing = logging::start_timing("compute_capture", OperationCategory::Capture);

    let index = SpatialIndex::from_pois(stores);

    let rows = cells
        .iter()
        .map(|cell| {
            let mut row: Vec<(usize, f64)> = index
                .candidates_within(&cell.center, params.max_radius_km)
                .into_iter()
                .filter_map(|s| {
                    let distance = cell.center.distance_to(&stores[s].coordinate);
                    if distance <= params.max_radius_km {
                        Some((s, huff_utility(stores[s].attractiveness, distance, params.distance_decay)))
                    } else {
                        None
                    }
                })
                .collect();

            let total: f64 = row.iter().map(|(_, u)| u).sum();
            if !(total > 0.0 && total.is_finite()) {
                return Vec::new();
            }
            for entry in row.iter_mut() {
                entry.1 /= total;
            }
            check_row(&row);
            row
        })
        .collect();

    CaptureMatrix { rows, store_count: stores.len() }
}

/// Returns annotated copies of `cells` for the given store set. The input is not modified.
pub fn calculate_demand_capture(
    cells: &[DemandMeshCell],
    stores: &[StoreSite],
    params: &HuffParams,
) -> Vec<DemandMeshCell> {
    compute_capture(cells, stores, params).annotate(cells, stores)
}

/// Per-cell utility sums for a fixed store set, split into own and total.
#[derive(Debug, Clone)]
pub struct UtilityField {
    own: Vec<f64>,
    total: Vec<f64>,
}

/// Evaluates "what if this site were added" questions against a fixed cell set.
///
/// Uses the same distances and utilities as [`compute_capture`], so the demand it reports
/// for a site equals what a full recomputation would attribute to it.
pub struct CaptureEvaluator<'a> {
    cells: &'a [DemandMeshCell],
    params: HuffParams,
    index: SpatialIndex,
}

impl<'a> CaptureEvaluator<'a> {
    pub fn new(cells: &'a [DemandMeshCell], params: &HuffParams) -> Self {
        Self {
            cells,
            params: *params,
            index: SpatialIndex::from_pois(cells),
        }
    }

    pub fn cells(&self) -> &'a [DemandMeshCell] {
        self.cells
    }

    /// `(cell index, utility)` for every cell the site reaches.
    fn reach(&self, site: &StoreSite) -> Vec<(usize, f64)> {
        self.index
            .candidates_within(&site.coordinate, self.params.max_radius_km)
            .into_iter()
            .filter_map(|c| {
                let distance = self.cells[c].center.distance_to(&site.coordinate);
                if distance <= self.params.max_radius_km {
                    Some((c, huff_utility(site.attractiveness, distance, self.params.distance_decay)))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn field<'s, I>(&self, stores: I) -> UtilityField
    where
        I: IntoIterator<Item = &'s StoreSite>,
    {
        let mut field = UtilityField {
            own: vec![0.0; self.cells.len()],
            total: vec![0.0; self.cells.len()],
        };
        for store in stores {
            self.add_to_field(&mut field, store);
        }
        field
    }

    pub fn add_to_field(&self, field: &mut UtilityField, site: &StoreSite) {
        let own = site.role.is_own();
        for (c, u) in self.reach(site) {
            field.total[c] += u;
            if own {
                field.own[c] += u;
            }
        }
    }

    /// Demand captured by own stores in the configuration the field describes.
    pub fn objective(&self, field: &UtilityField) -> f64 {
        self.cells
            .iter()
            .enumerate()
            .filter(|(c, _)| field.total[*c] > 0.0)
            .map(|(c, cell)| cell.demand * field.own[c] / field.total[c])
            .sum()
    }

    /// Demand the site would capture if added to the field's configuration.
    pub fn share_of(&self, field: &UtilityField, site: &StoreSite) -> f64 {
        self.reach(site)
            .into_iter()
            .map(|(c, u)| self.cells[c].demand * u / (field.total[c] + u))
            .sum()
    }

    /// Objective after adding the site, given the field's current objective.
    pub fn objective_with(&self, field: &UtilityField, base_objective: f64, site: &StoreSite) -> f64 {
        let own = site.role.is_own();
        let delta: f64 = self
            .reach(site)
            .into_iter()
            .map(|(c, u)| {
                let demand = self.cells[c].demand;
                let before = if field.total[c] > 0.0 { field.own[c] / field.total[c] } else { 0.0 };
                let own_after = field.own[c] + if own { u } else { 0.0 };
                demand * (own_after / (field.total[c] + u) - before)
            })
            .sum();
        base_objective + delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;
    use crate::models::store_site::SiteRole;

    fn cell_at(id: &str, lat: f64, lng: f64, demand: f64) -> DemandMeshCell {
        let bounds = MeshBounds::new(lat + 0.001, lat - 0.001, lng + 0.001, lng - 0.001);
        DemandMeshCell::new(id.to_string(), bounds, (demand / 0.3) as u32, demand)
    }

    fn params(decay: f64) -> HuffParams {
        HuffParams { max_radius_km: 2.0, distance_decay: decay }
    }

    #[test]
    fn utility_uses_distance_floor() {
        assert_eq!(huff_utility(1.0, 0.0, 2.0), huff_utility(1.0, DISTANCE_FLOOR_KM, 2.0));
        assert!((huff_utility(2.0, 1.0, 1.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn cells_out_of_range_stay_uncaptured() {
        let cells = vec![cell_at("near", 35.0, 139.0, 10.0), cell_at("far", 35.5, 139.0, 10.0)];
        let stores = vec![StoreSite::new("s", Coordinate::new(35.0, 139.001), SiteRole::Store)];
        let annotated = calculate_demand_capture(&cells, &stores, &params(1.5));

        assert_eq!(annotated[0].captured_by, vec!["s".to_string()]);
        assert!((annotated[0].ratio_for("s") - 1.0).abs() < 1e-12);
        assert!(annotated[1].captured_by.is_empty());
        assert!(annotated[1].capture_ratio.is_empty());
        // input untouched
        assert!(cells[0].captured_by.is_empty());
    }

    #[test]
    fn closer_and_stronger_store_wins_more() {
        let cells = vec![cell_at("c", 35.0, 139.0, 100.0)];
        let stores = vec![
            StoreSite::new("near", Coordinate::new(35.0, 139.003), SiteRole::Store),
            StoreSite::new("far", Coordinate::new(35.0, 139.010), SiteRole::Competitor).with_attractiveness(1.0),
        ];
        let matrix = compute_capture(&cells, &stores, &params(2.0));
        let demand = matrix.store_demand(&cells);
        assert!(demand[0] > demand[1]);
        assert!((demand[0] + demand[1] - 100.0).abs() < 1e-9);
        assert!((matrix.own_demand(&cells, &stores) - demand[0]).abs() < 1e-12);
    }

    #[test]
    fn evaluator_agrees_with_full_recomputation() {
        let cells: Vec<DemandMeshCell> = (0..25)
            .map(|i| cell_at(&format!("c{}", i), 35.0 + (i / 5) as f64 * 0.004, 139.0 + (i % 5) as f64 * 0.004, 10.0 + i as f64))
            .collect();
        let existing = vec![
            StoreSite::new("own", Coordinate::new(35.004, 139.004), SiteRole::Store),
            StoreSite::new("rival", Coordinate::new(35.012, 139.012), SiteRole::Competitor),
        ];
        let candidate = StoreSite::new("cand", Coordinate::new(35.008, 139.0), SiteRole::Candidate);
        let p = params(1.5);

        let evaluator = CaptureEvaluator::new(&cells, &p);
        let field = evaluator.field(existing.iter());
        let base = evaluator.objective(&field);
        let share = evaluator.share_of(&field, &candidate);
        let with = evaluator.objective_with(&field, base, &candidate);

        let mut all = existing.clone();
        all.push(candidate);
        let matrix = compute_capture(&cells, &all, &p);
        assert!((matrix.store_demand(&cells)[2] - share).abs() < 1e-6);
        assert!((matrix.own_demand(&cells, &all) - with).abs() < 1e-6);

        let base_matrix = compute_capture(&cells, &existing, &p);
        assert!((base_matrix.own_demand(&cells, &existing) - base).abs() < 1e-6);
    }

    #[test]
    fn coverage_counts_captured_cells() {
        let cells = vec![cell_at("a", 35.0, 139.0, 1.0), cell_at("b", 36.0, 139.0, 1.0)];
        let stores = vec![StoreSite::new("s", Coordinate::new(35.0, 139.0), SiteRole::Store)];
        let matrix = compute_capture(&cells, &stores, &params(1.5));
        assert_eq!(matrix.coverage(), 0.5);
        assert_eq!(matrix.store_cell_counts(), vec![1]);
    }
}
