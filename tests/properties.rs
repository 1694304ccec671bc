use rand::rngs::StdRng;
use rand::SeedableRng;

use siteopt::config::engine_config::{HuffParams, LocalSearchConfig, MeshConfig, OptimizationConstraints};
use siteopt::core::candidates::generate_candidate_sites;
use siteopt::core::greedy::greedy_optimization;
use siteopt::core::huff::compute_capture;
use siteopt::core::local_search::local_search_optimization;
use siteopt::core::mesh::generate_demand_grid;
use siteopt::models::mesh_cell::{DemandMeshCell, MeshBounds};
use siteopt::models::store_site::{CandidateSite, SiteRole, StoreSite};
use siteopt::{Coordinate, SiteError};

struct Market {
    bounds: MeshBounds,
    cells: Vec<DemandMeshCell>,
    existing: Vec<StoreSite>,
    candidates: Vec<CandidateSite>,
}

fn market(seed: u64) -> Market {
    let center = Coordinate::new(35.6812, 139.7671);
    let bounds = MeshBounds::square_around(&center, 3.0);
    let cells = generate_demand_grid(&bounds, &MeshConfig::default(), None).unwrap();
    let existing = vec![
        StoreSite::new("own_1", Coordinate::new(center.lat + 0.004, center.lng - 0.006), SiteRole::Store),
        StoreSite::new("rival_1", Coordinate::new(center.lat - 0.005, center.lng + 0.005), SiteRole::Competitor),
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates = generate_candidate_sites(&bounds, 40, &existing, 0.2, &mut rng).unwrap();
    Market { bounds, cells, existing, candidates }
}

fn constraints() -> OptimizationConstraints {
    OptimizationConstraints { min_distance_km: 0.5, ..OptimizationConstraints::default() }
}

fn quick_search() -> LocalSearchConfig {
    LocalSearchConfig { max_iterations: 20, stagnation_limit: 5, restart_sample_size: 15, ..LocalSearchConfig::default() }
}

#[test]
fn capture_is_deterministic() {
    let m = market(3);
    let stores: Vec<StoreSite> = m.existing.iter().cloned().chain(m.candidates.iter().take(5).map(|c| c.site.clone())).collect();
    let first = compute_capture(&m.cells, &stores, &HuffParams::default());
    let second = compute_capture(&m.cells, &stores, &HuffParams::default());
    assert_eq!(first, second);
}

#[test]
fn captured_cells_allocate_all_of_their_demand() {
    let m = market(5);
    let stores: Vec<StoreSite> = m.existing.iter().cloned().chain(m.candidates.iter().take(8).map(|c| c.site.clone())).collect();
    let matrix = compute_capture(&m.cells, &stores, &HuffParams::default());

    for cell in 0..matrix.cell_count() {
        let row = matrix.row(cell);
        if row.is_empty() {
            continue;
        }
        let total: f64 = row.iter().map(|(_, r)| r).sum();
        assert!((total - 1.0).abs() < 1e-9, "cell {} sums to {}", cell, total);
        assert!(row.iter().all(|(_, r)| (0.0..=1.0 + 1e-9).contains(r)));
    }
}

#[test]
fn mesh_generation_is_repeatable() {
    let m = market(1);
    let again = generate_demand_grid(&m.bounds, &MeshConfig::default(), None).unwrap();
    assert_eq!(m.cells, again);
}

#[test]
fn greedy_gains_are_positive_and_spacing_holds() {
    let m = market(7);
    let result = greedy_optimization(&m.candidates, &m.cells, &m.existing, 4, &HuffParams::default(), &constraints()).unwrap();

    assert!(!result.selected.is_empty());
    for record in &result.iterations {
        assert!(record.incremental_demand > 0.0);
    }
    for (i, a) in result.selected.iter().enumerate() {
        assert_eq!(a.site.role, SiteRole::Candidate);
        for existing in &m.existing {
            assert!(a.site.distance_to(existing) >= 0.5);
        }
        for b in &result.selected[i + 1..] {
            assert!(a.site.distance_to(&b.site) >= 0.5);
        }
    }
}

#[test]
fn greedy_stays_within_budget() {
    let m = market(9);
    let constraints = OptimizationConstraints { max_budget: Some(2_500_000.0), ..constraints() };
    let result = greedy_optimization(&m.candidates, &m.cells, &m.existing, 5, &HuffParams::default(), &constraints).unwrap();

    assert!(result.total_cost <= 2_500_000.0);
    assert!(result.store_count() <= 2);
}

#[test]
fn local_search_never_loses_to_greedy() {
    for seed in [2, 4, 8] {
        let m = market(seed);
        let greedy = greedy_optimization(&m.candidates, &m.cells, &m.existing, 3, &HuffParams::default(), &constraints()).unwrap();
        let local = local_search_optimization(
            &m.candidates,
            &m.cells,
            &m.existing,
            3,
            &HuffParams::default(),
            &constraints(),
            &LocalSearchConfig { seed, ..quick_search() },
        )
        .unwrap();

        assert!(
            local.total_demand_captured >= greedy.total_demand_captured - 1e-6,
            "seed {}: local {} < greedy {}",
            seed,
            local.total_demand_captured,
            greedy.total_demand_captured
        );
        for (i, a) in local.selected.iter().enumerate() {
            for b in &local.selected[i + 1..] {
                assert!(a.site.distance_to(&b.site) >= 0.5);
            }
        }
    }
}

#[test]
fn local_search_is_reproducible_for_a_seed() {
    let m = market(6);
    let run = || {
        local_search_optimization(
            &m.candidates,
            &m.cells,
            &m.existing,
            3,
            &HuffParams::default(),
            &constraints(),
            &quick_search(),
        )
        .unwrap()
    };
    let ids = |r: &siteopt::models::optimization_result::OptimizationResult| -> Vec<String> {
        r.selected.iter().map(|s| s.site.id.clone()).collect()
    };
    assert_eq!(ids(&run()), ids(&run()));
}

#[test]
fn zero_timeout_returns_partial_result() {
    let m = market(10);
    let constraints = OptimizationConstraints { timeout_secs: 0, ..constraints() };
    let err = greedy_optimization(&m.candidates, &m.cells, &m.existing, 3, &HuffParams::default(), &constraints).unwrap_err();

    assert!(err.is_timeout());
    let partial = err.partial_result().unwrap();
    assert!(partial.timed_out);
    assert!(partial.selected.len() <= 3);
    assert!(matches!(err, SiteError::Timeout { .. }));
}
