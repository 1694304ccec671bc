use std::fmt;
use serde::{Deserialize, Serialize};
use crate::config::constants::EFFICIENCY_INVESTMENT_UNIT;
use crate::models::store_site::StoreSite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Greedy,
    /// Greedy seed refined by swaps and random restarts ("MIP-style").
    LocalSearch,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Algorithm::Greedy => write!(f, "Greedy"),
            Algorithm::LocalSearch => write!(f, "MIP-Style Local Search"),
        }
    }
}

/// Stage of the search pipeline that produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchPhase {
    GreedySeed,
    SwapImprovement,
    RandomRestart,
    /// One run of a scenario batch finished.
    ScenarioComplete,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SearchPhase::GreedySeed => write!(f, "greedy-seed"),
            SearchPhase::SwapImprovement => write!(f, "swap"),
            SearchPhase::RandomRestart => write!(f, "random-restart"),
            SearchPhase::ScenarioComplete => write!(f, "scenario"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    TargetReached,
    NoCandidates,
    BudgetExhausted,
    NoFeasibleCandidate,
    NoPositiveGain,
    Stagnation,
    MaxIterations,
    Timeout,
}

impl StopReason {
    /// Stops caused by distance or budget limits rather than by the search finishing.
    pub fn is_constraint_stop(&self) -> bool {
        matches!(self, StopReason::BudgetExhausted | StopReason::NoFeasibleCandidate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSite {
    pub order: usize,
    pub site: StoreSite,
    /// Demand attributed to this site when it entered the selection.
    pub incremental_demand: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub phase: SearchPhase,
    pub site_id: String,
    pub incremental_demand: f64,
    pub cumulative_demand: f64,
    pub cumulative_cost: f64,
    pub remaining_candidates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    pub average_demand_per_store: f64,
    pub cost_per_demand_unit: f64,
    /// Demand captured per 100K of investment.
    pub efficiency: f64,
}

impl ResultMetrics {
    pub fn from_totals(total_demand: f64, total_cost: f64, store_count: usize) -> Self {
        Self {
            average_demand_per_store: if store_count > 0 { total_demand / store_count as f64 } else { 0.0 },
            cost_per_demand_unit: if total_demand > 0.0 { total_cost / total_demand } else { 0.0 },
            efficiency: if total_cost > 0.0 {
                total_demand / total_cost * EFFICIENCY_INVESTMENT_UNIT
            } else {
                0.0
            },
        }
    }
}

/// Outcome of one optimization run. Plain value object, never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub algorithm: Algorithm,
    pub selected: Vec<SelectedSite>,
    /// Demand captured by own stores in the final configuration.
    pub total_demand_captured: f64,
    pub total_cost: f64,
    /// Fraction of cells captured by at least one store, in [0, 1].
    pub coverage: f64,
    pub metrics: ResultMetrics,
    pub iterations: Vec<IterationRecord>,
    pub stop_reason: StopReason,
    pub timed_out: bool,
    /// Candidates dropped by the pool cap before the search began.
    pub candidates_truncated: usize,
}

impl OptimizationResult {
    pub fn empty(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            selected: Vec::new(),
            total_demand_captured: 0.0,
            total_cost: 0.0,
            coverage: 0.0,
            metrics: ResultMetrics::default(),
            iterations: Vec::new(),
            stop_reason: StopReason::TargetReached,
            timed_out: false,
            candidates_truncated: 0,
        }
    }

    pub fn store_count(&self) -> usize {
        self.selected.len()
    }

    pub fn selected_sites(&self) -> Vec<StoreSite> {
        self.selected.iter().map(|s| s.site.clone()).collect()
    }
}
