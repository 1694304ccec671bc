use rand::rngs::StdRng;
use rand::SeedableRng;

use siteopt::analysis::capacity::{analyze_capacity, CapacityRecommendation};
use siteopt::analysis::historical::analyze_historical_patterns;
use siteopt::config::engine_config::{CapacityParams, HistoricalParams, HuffParams, MeshConfig, OptimizationConstraints};
use siteopt::core::candidates::generate_candidate_sites;
use siteopt::core::greedy::greedy_optimization;
use siteopt::core::huff::calculate_demand_capture;
use siteopt::core::mesh::generate_demand_grid;
use siteopt::models::historical::HistoricalRecord;
use siteopt::models::mesh_cell::{DemandMeshCell, MeshBounds};
use siteopt::models::optimization_result::Algorithm;
use siteopt::models::store_site::{CandidateSite, SiteRole, StoreSite};
use siteopt::Coordinate;

fn tokyo() -> Coordinate {
    Coordinate::new(35.6812, 139.7671)
}

#[test]
fn sole_central_store_captures_every_cell() {
    let bounds = MeshBounds::square_around(&tokyo(), 1.0);
    let cells = generate_demand_grid(&bounds, &MeshConfig::default(), None).unwrap();
    let store = StoreSite::new("center", bounds.center(), SiteRole::Store);
    let params = HuffParams { max_radius_km: 2.0, distance_decay: 2.0 };

    let captured = calculate_demand_capture(&cells, &[store], &params);
    assert_eq!(captured.len(), cells.len());
    for cell in &captured {
        assert_eq!(cell.captured_by, vec!["center".to_string()]);
        assert_eq!(cell.ratio_for("center"), 1.0);
    }
    // input cells are left untouched
    assert!(cells.iter().all(|c| !c.is_captured()));
}

#[test]
fn equidistant_equal_stores_split_evenly() {
    let center = tokyo();
    let cell = DemandMeshCell::new(
        "mesh_0".to_string(),
        MeshBounds::new(center.lat + 0.001, center.lat - 0.001, center.lng + 0.001, center.lng - 0.001),
        100,
        30.0,
    );
    let c = cell.center;
    let east = StoreSite::new("east", Coordinate::new(c.lat, c.lng + 0.005), SiteRole::Store);
    let west = StoreSite::new("west", Coordinate::new(c.lat, c.lng - 0.005), SiteRole::Store);

    let captured = calculate_demand_capture(&[cell], &[east, west], &HuffParams::default());
    assert!((captured[0].ratio_for("east") - 0.5).abs() < 1e-12);
    assert!((captured[0].ratio_for("west") - 0.5).abs() < 1e-12);
}

#[test]
fn candidates_keep_clear_of_close_existing_stores() {
    let bounds = MeshBounds::square_around(&tokyo(), 6.0);
    let a = StoreSite::new("a", tokyo(), SiteRole::Store);
    let b = StoreSite::new("b", Coordinate::new(tokyo().lat, tokyo().lng + 0.0055), SiteRole::Store);
    let gap = a.distance_to(&b);
    assert!(gap > 0.45 && gap < 0.55);

    let mut rng = StdRng::seed_from_u64(11);
    let found = generate_candidate_sites(&bounds, 30, &[a.clone(), b.clone()], 1.0, &mut rng).unwrap();
    assert!(!found.is_empty());
    for candidate in &found {
        assert!(candidate.coordinate().distance_to(&a.coordinate) >= 1.0);
        assert!(candidate.coordinate().distance_to(&b.coordinate) >= 1.0);
    }
}

#[test]
fn greedy_with_zero_stores_is_empty() {
    let bounds = MeshBounds::square_around(&tokyo(), 1.0);
    let cells = generate_demand_grid(&bounds, &MeshConfig::default(), None).unwrap();
    let candidates = vec![CandidateSite::new("candidate_0", tokyo(), 1)];

    let result = greedy_optimization(
        &candidates,
        &cells,
        &[],
        0,
        &HuffParams::default(),
        &OptimizationConstraints::default(),
    )
    .unwrap();
    assert_eq!(result.algorithm, Algorithm::Greedy);
    assert!(result.selected.is_empty());
    assert_eq!(result.total_cost, 0.0);
    assert!(result.iterations.is_empty());
}

#[test]
fn store_at_target_utilization_is_optimal() {
    let center = tokyo();
    let cell = DemandMeshCell::new(
        "mesh_0".to_string(),
        MeshBounds::new(center.lat + 0.001, center.lat - 0.001, center.lng + 0.001, center.lng - 0.001),
        1493,
        448.0,
    );
    let store = StoreSite::new("s", center, SiteRole::Store);
    let params = CapacityParams { default_staff: 2, ..CapacityParams::default() };

    let result = analyze_capacity(&[store], &[cell], &HuffParams::default(), &params).unwrap();
    let profile = &result.profiles[0];
    assert!((profile.daily_demand - 448.0).abs() < 1e-9);
    assert_eq!(profile.recommendation, CapacityRecommendation::Optimal);
    assert!(profile.profit_improvement.abs() < 1e-6);
    assert!(result.actions.is_empty());
}

#[test]
fn history_without_enough_stars_gives_no_pattern() {
    let bounds = MeshBounds::square_around(&tokyo(), 2.0);
    let cells = generate_demand_grid(&bounds, &MeshConfig::default(), None).unwrap();
    let records = vec![
        HistoricalRecord::new("star", tokyo(), 2_000_000.0, 250_000.0, 3_000.0, 0.3, 30.0),
        HistoricalRecord::new("ok", tokyo(), 700_000.0, 50_000.0, 800.0, 0.05, 5.0),
        HistoricalRecord::new("weak", tokyo(), 100_000.0, 1_000.0, 100.0, 0.0, 0.0),
    ];

    let result = analyze_historical_patterns(&records, &cells, &[], &HistoricalParams::default()).unwrap();
    assert_eq!(result.categories.high.len(), 1);
    assert!(result.pattern.is_empty());
    assert_eq!(result.pattern.confidence, 0.0);
    assert!(result.recommendations.is_empty());
    assert!(result.forecasts.is_empty());
}
