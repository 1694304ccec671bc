use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::constants::*;
use crate::data::population::SyntheticDensity;
use crate::errors::{SiteError, SiteResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub cell_size_m: f64,
    pub demand_factor: f64,
    pub synthetic: SyntheticDensity,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            cell_size_m: DEFAULT_MESH_SIZE_M,
            demand_factor: DEFAULT_DEMAND_FACTOR,
            synthetic: SyntheticDensity::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuffParams {
    pub max_radius_km: f64,
    pub distance_decay: f64,
}

impl Default for HuffParams {
    fn default() -> Self {
        Self {
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
            distance_decay: DEFAULT_DISTANCE_DECAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConstraints {
    pub min_distance_km: f64,
    /// No budget limit when absent.
    pub max_budget: Option<f64>,
    /// Cost of a candidate that carries none of its own.
    pub store_cost: f64,
    pub timeout_secs: u64,
    pub max_candidates: usize,
    /// Fail with a constraint violation instead of returning an under-filled selection.
    pub strict: bool,
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            min_distance_km: DEFAULT_MIN_STORE_DISTANCE_KM,
            max_budget: None,
            store_cost: DEFAULT_STORE_COST,
            timeout_secs: DEFAULT_GREEDY_TIMEOUT_SECS,
            max_candidates: MAX_CANDIDATE_POOL,
            strict: false,
        }
    }
}

impl OptimizationConstraints {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSearchConfig {
    pub max_iterations: usize,
    pub stagnation_limit: usize,
    pub restart_sample_size: usize,
    pub timeout_secs: u64,
    pub seed: u64,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stagnation_limit: DEFAULT_STAGNATION_LIMIT,
            restart_sample_size: DEFAULT_RESTART_SAMPLE_SIZE,
            timeout_secs: DEFAULT_LOCAL_SEARCH_TIMEOUT_SECS,
            seed: 42,
        }
    }
}

impl LocalSearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitiveParams {
    pub huff: HuffParams,
    /// Replaces each own store's attractiveness when set.
    pub own_attractiveness: Option<f64>,
    /// Replaces each competitor's attractiveness when set.
    pub competitor_attractiveness: Option<f64>,
    pub impact_distance_scale_km: f64,
}

impl CompetitiveParams {
    /// Overrides must be usable as Huff attractiveness.
    pub fn validate(&self) -> SiteResult<()> {
        for (name, value) in [("own_attractiveness", self.own_attractiveness), ("competitor_attractiveness", self.competitor_attractiveness)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(SiteError::InsufficientData(format!("{} must be positive and finite, got {}", name, v)));
                }
            }
        }
        Ok(())
    }
}

impl Default for CompetitiveParams {
    fn default() -> Self {
        Self {
            huff: HuffParams::default(),
            own_attractiveness: None,
            competitor_attractiveness: None,
            impact_distance_scale_km: IMPACT_DISTANCE_SCALE_KM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityParams {
    pub peak_hour_multiplier: f64,
    pub peak_hours: f64,
    pub service_minutes: f64,
    pub operating_hours: f64,
    pub target_utilization: f64,
    pub staff_cost_per_hour: f64,
    pub fixed_cost_per_day: f64,
    pub revenue_per_customer: f64,
    pub default_staff: u32,
    /// Current staff per store id.
    pub staff_overrides: BTreeMap<String, u32>,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            peak_hour_multiplier: DEFAULT_PEAK_HOUR_MULTIPLIER,
            peak_hours: DEFAULT_PEAK_HOURS,
            service_minutes: DEFAULT_SERVICE_MINUTES,
            operating_hours: DEFAULT_OPERATING_HOURS,
            target_utilization: DEFAULT_TARGET_UTILIZATION,
            staff_cost_per_hour: DEFAULT_STAFF_COST_PER_HOUR,
            fixed_cost_per_day: DEFAULT_FIXED_COST_PER_DAY,
            revenue_per_customer: DEFAULT_REVENUE_PER_CUSTOMER,
            default_staff: DEFAULT_STAFF_PER_STORE,
            staff_overrides: BTreeMap::new(),
        }
    }
}

impl CapacityParams {
    pub fn staff_for(&self, store_id: &str) -> u32 {
        self.staff_overrides.get(store_id).copied().unwrap_or(self.default_staff)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalParams {
    /// Minimum performance score for the high tier.
    pub performance_threshold: f64,
    pub min_sample_size: usize,
    pub importance_threshold: f64,
    /// Minimum share of pattern features a cell must match to be recommended.
    pub confidence_level: f64,
    pub feature_radius_km: f64,
    pub site_investment: f64,
}

impl Default for HistoricalParams {
    fn default() -> Self {
        Self {
            performance_threshold: 0.8,
            min_sample_size: 3,
            importance_threshold: 0.1,
            confidence_level: 0.8,
            feature_radius_km: FEATURE_RADIUS_KM,
            site_investment: DEFAULT_SITE_INVESTMENT,
        }
    }
}

/// Every tunable of the engine. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mesh: MeshConfig,
    pub huff: HuffParams,
    pub constraints: OptimizationConstraints,
    pub local_search: LocalSearchConfig,
    pub competitive: CompetitiveParams,
    pub capacity: CapacityParams,
    pub historical: HistoricalParams,
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> SiteResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> SiteResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.competitive.validate()?;
        Ok(config)
    }
}
