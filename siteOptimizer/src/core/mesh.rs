use tracing::{debug, info};
use crate::config::const_funcs::{meters_to_lat_degrees, meters_to_lng_degrees};
use crate::config::constants::MIN_CELL_DEMAND;
use crate::config::engine_config::MeshConfig;
use crate::data::population::PopulationProvider;
use crate::errors::{SiteError, SiteResult};
use crate::models::mesh_cell::{DemandMeshCell, MeshBounds};
use crate::utils::logging::{self, OperationCategory};

// Absorbs float drift when the span is an exact multiple of the cell size
const SPAN_EPSILON: f64 = 1e-9;

/// Demand is a fixed share of residents, never below one customer.
pub fn demand_from_population(population: u32, demand_factor: f64) -> f64 {
    (population as f64 * demand_factor).round().max(MIN_CELL_DEMAND)
}

fn steps(span: f64, step: f64) -> usize {
    ((span / step) - SPAN_EPSILON).ceil().max(1.0) as usize
}

/// Builds the row-major demand mesh covering `bounds`, south-west corner first.
///
/// Populations come from `provider` where it has a figure and from the configured synthetic
/// density model otherwise. Cells on the north and east edges keep their full size and may
/// extend past the box.
pub fn generate_demand_grid(
    bounds: &MeshBounds,
    config: &MeshConfig,
    provider: Option<&dyn PopulationProvider>,
) -> SiteResult<Vec<DemandMeshCell>> {
    let _timing = logging::start_timing("generate_demand_grid", OperationCategory::Mesh);

    bounds.validate()?;
    if !(config.cell_size_m.is_finite() && config.cell_size_m > 0.0) {
        return Err(SiteError::InvalidBounds(format!(
            "cell size must be a positive number of metres, got {}",
            config.cell_size_m
        )));
    }

    let d_lat = meters_to_lat_degrees(config.cell_size_m);
    // Longitude step is sized at the northern edge
    let d_lng = meters_to_lng_degrees(config.cell_size_m, bounds.north);

    let rows = steps(bounds.north - bounds.south, d_lat);
    let cols = steps(bounds.east - bounds.west, d_lng);
    debug!("Mesh grid {}x{} (dlat={:.6}, dlng={:.6})", rows, cols, d_lat, d_lng);

    let mut cells = Vec::with_capacity(rows * cols);
    let mut from_provider = 0usize;

    for row in 0..rows {
        let south = bounds.south + row as f64 * d_lat;
        let north = south + d_lat;
        for col in 0..cols {
            let west = bounds.west + col as f64 * d_lng;
            let east = west + d_lng;
            let cell_bounds = MeshBounds::new(north, south, east, west);

            let population = match provider.and_then(|p| p.population_for(&cell_bounds)) {
                Some(population) => {
                    from_provider += 1;
                    population
                }
                None => config.synthetic.population_at(&cell_bounds.center()),
            };

            let id = format!("mesh_{}", cells.len());
            let demand = demand_from_population(population, config.demand_factor);
            cells.push(DemandMeshCell::new(id, cell_bounds, population, demand));
        }
    }

    info!(
        "Generated {} mesh cells ({} from population data, {} synthetic)",
        cells.len(),
        from_provider,
        cells.len() - from_provider
    );
    Ok(cells)
}
