use std::fmt;
use serde::Serialize;
use tracing::{debug, info};
use crate::config::constants::*;
use crate::config::engine_config::{CapacityParams, HuffParams};
use crate::core::huff::compute_capture;
use crate::errors::{SiteError, SiteResult};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::store_site::StoreSite;
use crate::utils::logging::{self, AnalysisType, OperationCategory};

/// Ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CapacityRecommendation {
    Critical,
    Monitor,
    ReduceCapacity,
    Optimal,
}

impl CapacityRecommendation {
    pub fn from_utilization(utilization_pct: f64) -> Self {
        if utilization_pct > CRITICAL_UTILIZATION_PCT {
            CapacityRecommendation::Critical
        } else if utilization_pct > MONITOR_UTILIZATION_PCT {
            CapacityRecommendation::Monitor
        } else if utilization_pct < UNDERUSED_UTILIZATION_PCT {
            CapacityRecommendation::ReduceCapacity
        } else {
            CapacityRecommendation::Optimal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CapacityRecommendation::Critical => "Critical - increase capacity",
            CapacityRecommendation::Monitor => "Monitor",
            CapacityRecommendation::ReduceCapacity => "Consider reducing capacity",
            CapacityRecommendation::Optimal => "Optimal",
        }
    }
}

impl fmt::Display for CapacityRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffingPlan {
    pub peak_staff: u32,
    pub off_peak_staff: u32,
    pub staff_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Financials {
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityProfile {
    pub store_id: String,
    pub store_name: String,
    pub daily_demand: f64,
    /// Customers per hour inside the peak window.
    pub peak_hourly_demand: f64,
    pub off_peak_hourly_demand: f64,
    pub workload_hours: f64,
    pub current_staff: u32,
    pub utilization_pct: f64,
    pub required: StaffingPlan,
    pub current: Financials,
    pub optimized: Financials,
    pub profit_improvement: f64,
    pub recommendation: CapacityRecommendation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkCapacity {
    pub store_count: usize,
    pub average_utilization_pct: f64,
    pub over_capacity: usize,
    pub under_capacity: usize,
    /// Sum of positive profit improvements across the network.
    pub total_profit_opportunity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityAction {
    pub store_id: String,
    pub recommendation: CapacityRecommendation,
    pub profit_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityAnalysisResult {
    pub profiles: Vec<CapacityProfile>,
    pub network: NetworkCapacity,
    /// Most urgent first; ties broken by larger profit improvement.
    pub actions: Vec<CapacityAction>,
}

fn required_staff(hourly_demand: f64, service_hours: f64, target_utilization: f64) -> u32 {
    let staff = (hourly_demand * service_hours / target_utilization).ceil();
    staff.max(1.0) as u32
}

/// Staffing, utilization and financial profile for one store with a known daily demand.
pub fn capacity_profile(
    store: &StoreSite,
    daily_demand: f64,
    current_staff: u32,
    params: &CapacityParams,
) -> SiteResult<CapacityProfile> {
    if params.operating_hours <= 0.0 || params.target_utilization <= 0.0 || current_staff == 0 {
        return Err(SiteError::InsufficientData(format!(
            "capacity parameters for store {} cannot produce a utilization",
            store.id
        )));
    }

    let service_hours = params.service_minutes / 60.0;
    let workload_hours = daily_demand * service_hours;
    let available_hours = current_staff as f64 * params.operating_hours;
    let utilization_pct = workload_hours / available_hours * 100.0;

    let peak_hours = params.peak_hours.clamp(0.0, params.operating_hours);
    let peak_hourly_demand = daily_demand / params.operating_hours * params.peak_hour_multiplier;
    let off_peak_window = params.operating_hours - peak_hours;
    let off_peak_hourly_demand = if off_peak_window > 0.0 {
        ((daily_demand - peak_hourly_demand * peak_hours) / off_peak_window).max(0.0)
    } else {
        0.0
    };

    let required = StaffingPlan {
        peak_staff: required_staff(peak_hourly_demand, service_hours, params.target_utilization),
        off_peak_staff: required_staff(off_peak_hourly_demand, service_hours, params.target_utilization),
        staff_hours: workload_hours / params.target_utilization,
    };

    let revenue = daily_demand * params.revenue_per_customer;
    let current_cost = available_hours * params.staff_cost_per_hour + params.fixed_cost_per_day;
    let optimized_cost = required.staff_hours * params.staff_cost_per_hour + params.fixed_cost_per_day;
    let current = Financials { revenue, cost: current_cost, profit: revenue - current_cost };
    let optimized = Financials { revenue, cost: optimized_cost, profit: revenue - optimized_cost };

    Ok(CapacityProfile {
        store_id: store.id.clone(),
        store_name: store.display_name().to_string(),
        daily_demand,
        peak_hourly_demand,
        off_peak_hourly_demand,
        workload_hours,
        current_staff,
        utilization_pct,
        profit_improvement: optimized.profit - current.profit,
        recommendation: CapacityRecommendation::from_utilization(utilization_pct),
        required,
        current,
        optimized,
    })
}

/// Profiles every own store in `stores` from the demand it captures. Competitors in the set
/// take their share of demand but get no profile.
pub fn analyze_capacity(
    stores: &[StoreSite],
    cells: &[DemandMeshCell],
    huff: &HuffParams,
    params: &CapacityParams,
) -> SiteResult<CapacityAnalysisResult> {
    let _timing = logging::start_timing(
        "analyze_capacity",
        OperationCategory::Analysis { subcategory: AnalysisType::Capacity },
    );

    if cells.is_empty() {
        return Err(SiteError::InsufficientData("demand mesh is empty".to_string()));
    }

    let matrix = compute_capture(cells, stores, huff);
    let demand = matrix.store_demand(cells);

    let mut profiles = Vec::new();
    for (i, store) in stores.iter().enumerate() {
        if !store.role.is_own() {
            continue;
        }
        let profile = capacity_profile(store, demand[i], params.staff_for(&store.id), params)?;
        debug!(
            "Store {}: {:.0} customers/day, {:.1}% utilization, {}",
            profile.store_id, profile.daily_demand, profile.utilization_pct, profile.recommendation
        );
        profiles.push(profile);
    }

    let network = if profiles.is_empty() {
        NetworkCapacity::default()
    } else {
        NetworkCapacity {
            store_count: profiles.len(),
            average_utilization_pct: profiles.iter().map(|p| p.utilization_pct).sum::<f64>() / profiles.len() as f64,
            over_capacity: profiles.iter().filter(|p| p.utilization_pct > MONITOR_UTILIZATION_PCT).count(),
            under_capacity: profiles.iter().filter(|p| p.utilization_pct < UNDERUSED_UTILIZATION_PCT).count(),
            total_profit_opportunity: profiles.iter().map(|p| p.profit_improvement.max(0.0)).sum(),
        }
    };

    let mut actions: Vec<CapacityAction> = profiles
        .iter()
        .filter(|p| p.recommendation != CapacityRecommendation::Optimal)
        .map(|p| CapacityAction {
            store_id: p.store_id.clone(),
            recommendation: p.recommendation,
            profit_improvement: p.profit_improvement,
        })
        .collect();
    actions.sort_by(|a, b| {
        a.recommendation
            .cmp(&b.recommendation)
            .then(b.profit_improvement.total_cmp(&a.profit_improvement))
    });

    info!(
        "Capacity analysis: {} stores, average utilization {:.1}%, {} actions",
        network.store_count,
        network.average_utilization_pct,
        actions.len()
    );
    Ok(CapacityAnalysisResult { profiles, network, actions })
}
