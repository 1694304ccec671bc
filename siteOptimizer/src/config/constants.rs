// Geodesy Constants
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;     // 1 degree latitude ≈ 111.32km
pub const MIN_COS_LATITUDE: f64 = 1e-6;               // Guards the longitude stretch near the poles

// Mesh Constants
pub const DEFAULT_MESH_SIZE_M: f64 = 250.0;           // e-Stat style 250m meshes
pub const DEFAULT_DEMAND_FACTOR: f64 = 0.3;           // Share of residents assumed to be addressable customers
pub const MIN_CELL_DEMAND: f64 = 1.0;

// Synthetic Density Constants
pub const SYNTHETIC_BASE_POPULATION: f64 = 150.0;     // Base population per mesh
pub const SYNTHETIC_DENSITY_CENTER_LAT: f64 = 35.6762;
pub const SYNTHETIC_DENSITY_CENTER_LNG: f64 = 139.6503;
pub const SYNTHETIC_DECAY_KM: f64 = 10.0;
pub const SYNTHETIC_MAX_DENSITY_FACTOR: f64 = 2.0;
pub const SYNTHETIC_MIN_DENSITY_FACTOR: f64 = 0.3;
pub const SYNTHETIC_UNINHABITABLE_PROBABILITY: f64 = 0.02;
pub const SYNTHETIC_MIN_POPULATION: u32 = 5;          // Habitable meshes never drop below this
pub const SYNTHETIC_HASH_SEED: u32 = 0x5173_0e11;

// Huff Model Constants
pub const DEFAULT_MAX_RADIUS_KM: f64 = 2.0;
pub const DEFAULT_DISTANCE_DECAY: f64 = 1.5;
pub const DISTANCE_FLOOR_KM: f64 = 0.1;               // Prevents utility blow-up at zero distance
pub const CAPTURE_RATIO_TOLERANCE: f64 = 1e-9;

// Attractiveness Defaults by Role
pub const STORE_ATTRACTIVENESS: f64 = 1.0;
pub const COMPETITOR_ATTRACTIVENESS: f64 = 0.8;
pub const CANDIDATE_ATTRACTIVENESS: f64 = 1.0;
pub const POI_ATTRACTIVENESS: f64 = 0.5;

// Candidate Generation Constants
pub const DEFAULT_CANDIDATE_COUNT: usize = 100;
pub const MAX_ATTEMPTS_PER_CANDIDATE: u32 = 50;
pub const LOW_ACCURACY_MIN_DISTANCE_KM: f64 = 0.5;
pub const MEDIUM_ACCURACY_MIN_DISTANCE_KM: f64 = 0.2;
pub const HIGH_ACCURACY_MIN_DISTANCE_KM: f64 = 0.1;

// Optimization Constants
pub const DEFAULT_MIN_STORE_DISTANCE_KM: f64 = 0.5;
pub const DEFAULT_STORE_COST: f64 = 1_000_000.0;
pub const MAX_CANDIDATE_POOL: usize = 500;
pub const DEFAULT_GREEDY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOCAL_SEARCH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_STAGNATION_LIMIT: usize = 20;
pub const DEFAULT_RESTART_SAMPLE_SIZE: usize = 50;
pub const EFFICIENCY_INVESTMENT_UNIT: f64 = 100_000.0; // Efficiency is demand per 100K invested
pub const OBJECTIVE_EPSILON: f64 = 1e-9;

// Competitive Analysis Constants
pub const IMPACT_DISTANCE_SCALE_KM: f64 = 2.0;
pub const HIGH_THREAT_IMPACT: f64 = 0.7;
pub const MEDIUM_THREAT_IMPACT: f64 = 0.4;
pub const LOW_THREAT_IMPACT: f64 = 0.2;
pub const DOMINANT_ADVANTAGE: f64 = 0.7;
pub const STRONG_ADVANTAGE: f64 = 0.5;
pub const COMPETITIVE_ADVANTAGE: f64 = 0.3;
pub const NEARBY_COMPETITOR_KM: f64 = 3.0;
pub const DIRECT_COMPETITION_KM: f64 = 1.0;
pub const DISTANT_COMPETITOR_KM: f64 = 5.0;
pub const HIGH_PRESSURE_THRESHOLD: f64 = 1.5;
pub const OVERSATURATED_COMPETITOR_COUNT: usize = 5;
pub const DISTANT_SHARE_THRESHOLD: f64 = 0.7;

// Capacity Constants
pub const DEFAULT_PEAK_HOUR_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_PEAK_HOURS: f64 = 4.0;
pub const DEFAULT_SERVICE_MINUTES: f64 = 3.0;
pub const DEFAULT_OPERATING_HOURS: f64 = 14.0;
pub const DEFAULT_TARGET_UTILIZATION: f64 = 0.80;
pub const DEFAULT_STAFF_COST_PER_HOUR: f64 = 15.0;
pub const DEFAULT_FIXED_COST_PER_DAY: f64 = 500.0;
pub const DEFAULT_REVENUE_PER_CUSTOMER: f64 = 10.0;
pub const DEFAULT_STAFF_PER_STORE: u32 = 3;
pub const CRITICAL_UTILIZATION_PCT: f64 = 95.0;
pub const MONITOR_UTILIZATION_PCT: f64 = 85.0;
pub const UNDERUSED_UTILIZATION_PCT: f64 = 60.0;

// Historical Analysis Constants
pub const BENCHMARK_REVENUE: f64 = 1_000_000.0;
pub const BENCHMARK_PROFIT: f64 = 100_000.0;
pub const SCORE_CAP_MULTIPLE: f64 = 2.0;              // Revenue/profit capped at 2x benchmark
pub const MARKET_SHARE_SCALE: f64 = 10.0;
pub const GROWTH_RATE_FOR_FULL_SCORE: f64 = 20.0;     // 20% growth = perfect score
pub const REVENUE_WEIGHT: f64 = 0.3;
pub const PROFIT_WEIGHT: f64 = 0.4;
pub const MARKET_SHARE_WEIGHT: f64 = 0.2;
pub const GROWTH_WEIGHT: f64 = 0.1;
pub const AVERAGE_PERFORMER_RATIO: f64 = 0.6;
pub const FEATURE_RADIUS_KM: f64 = 2.0;
pub const MAX_PATTERN_FEATURES: usize = 5;
pub const MAX_SITE_RECOMMENDATIONS: usize = 10;
pub const MAX_REASONS: usize = 3;
pub const FULL_CONFIDENCE_SAMPLES: f64 = 10.0;
pub const ECONOMIC_INDEX_SCALE: f64 = 1000.0;
pub const FORECAST_INTERVAL: f64 = 0.2;
pub const DEFAULT_SITE_INVESTMENT: f64 = 1_000_000.0;
pub const FALLBACK_AVG_REVENUE: f64 = 1_000_000.0;
pub const FALLBACK_AVG_PROFIT: f64 = 100_000.0;
pub const FALLBACK_AVG_CUSTOMERS: f64 = 1_000.0;
