use serde::Serialize;
use crate::config::engine_config::HuffParams;
use crate::core::huff::{compute_capture, CaptureMatrix};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::store_site::{SiteRole, StoreSite};
use crate::utils::logging::{self, OperationCategory};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorePerformance {
    pub store_id: String,
    pub role: SiteRole,
    pub total_demand: f64,
    pub mesh_count: usize,
    /// Percent of total modeled demand.
    pub market_share: f64,
    /// Captured demand per captured mesh.
    pub demand_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub total_demand: f64,
    pub captured_demand: f64,
    pub coverage: f64,
    pub stores: Vec<StorePerformance>,
}

pub fn store_performance(
    cells: &[DemandMeshCell],
    stores: &[StoreSite],
    matrix: &CaptureMatrix,
) -> Vec<StorePerformance> {
    let total: f64 = cells.iter().map(|c| c.demand).sum();
    let demand = matrix.store_demand(cells);
    let counts = matrix.store_cell_counts();

    stores
        .iter()
        .enumerate()
        .map(|(i, store)| StorePerformance {
            store_id: store.id.clone(),
            role: store.role,
            total_demand: demand[i],
            mesh_count: counts[i],
            market_share: if total > 0.0 { demand[i] / total * 100.0 } else { 0.0 },
            demand_density: if counts[i] > 0 { demand[i] / counts[i] as f64 } else { 0.0 },
        })
        .collect()
}

/// Capture the current store set and summarize it per store.
pub fn market_snapshot(cells: &[DemandMeshCell], stores: &[StoreSite], huff: &HuffParams) -> MarketSnapshot {
    let _timing = logging::start_timing("market_snapshot", OperationCategory::Capture);

    let matrix = compute_capture(cells, stores, huff);
    MarketSnapshot {
        total_demand: cells.iter().map(|c| c.demand).sum(),
        captured_demand: matrix.demand_where(cells, |_| true),
        coverage: matrix.coverage(),
        stores: store_performance(cells, stores, &matrix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;

    fn cells() -> Vec<DemandMeshCell> {
        let step = 0.0025;
        (0..8)
            .map(|i| {
                let lng = 139.0 + i as f64 * step;
                DemandMeshCell::new(format!("mesh_{}", i), MeshBounds::new(35.0 + step, 35.0, lng + step, lng), 100, 30.0)
            })
            .collect()
    }

    #[test]
    fn sole_store_takes_everything_in_range() {
        let stores = vec![StoreSite::new("s", Coordinate::new(35.001, 139.01), SiteRole::Store)];
        let snapshot = market_snapshot(&cells(), &stores, &HuffParams::default());
        let s = &snapshot.stores[0];
        assert_eq!(s.mesh_count, 8);
        assert!((s.total_demand - 240.0).abs() < 1e-9);
        assert!((s.market_share - 100.0).abs() < 1e-9);
        assert!((s.demand_density - 30.0).abs() < 1e-9);
        assert_eq!(snapshot.coverage, 1.0);
    }

    #[test]
    fn out_of_range_store_has_no_density() {
        let stores = vec![StoreSite::new("far", Coordinate::new(36.0, 139.0), SiteRole::Store)];
        let snapshot = market_snapshot(&cells(), &stores, &HuffParams::default());
        assert_eq!(snapshot.stores[0].mesh_count, 0);
        assert_eq!(snapshot.stores[0].demand_density, 0.0);
        assert_eq!(snapshot.captured_demand, 0.0);
        assert_eq!(snapshot.coverage, 0.0);
    }
}
