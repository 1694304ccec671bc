use std::sync::mpsc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::config::engine_config::{HuffParams, LocalSearchConfig, OptimizationConstraints};
use crate::core::greedy::greedy_optimization_with;
use crate::core::local_search::local_search_optimization_with;
use crate::core::search_control::{NoYield, SearchProgress, YieldPoint};
use crate::errors::SiteResult;
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::optimization_result::{Algorithm, OptimizationResult, SearchPhase};
use crate::models::store_site::{CandidateSite, StoreSite};

/// One named optimization setup to compare against others on the same inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub algorithm: Algorithm,
    pub num_stores: usize,
    #[serde(default)]
    pub huff: HuffParams,
    #[serde(default)]
    pub constraints: OptimizationConstraints,
    #[serde(default)]
    pub local_search: LocalSearchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub index: usize,
    pub name: String,
    pub algorithm: Algorithm,
    pub num_stores: usize,
    /// Full result, or the partial one carried by a timeout or constraint failure.
    pub result: Option<OptimizationResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioSummary {
    pub total_scenarios: usize,
    pub successful: usize,
    pub average_demand: f64,
    pub average_coverage: f64,
    pub demand_min: f64,
    pub demand_max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioComparison {
    pub outcomes: Vec<ScenarioOutcome>,
    pub best_by_demand: Option<String>,
    pub best_by_coverage: Option<String>,
    pub best_by_efficiency: Option<String>,
    pub summary: ScenarioSummary,
}

fn run_one(
    index: usize,
    scenario: &Scenario,
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    yield_point: &mut dyn YieldPoint,
) -> ScenarioOutcome {
    let outcome: SiteResult<OptimizationResult> = match scenario.algorithm {
        Algorithm::Greedy => greedy_optimization_with(
            candidates,
            cells,
            existing,
            scenario.num_stores,
            &scenario.huff,
            &scenario.constraints,
            yield_point,
        ),
        Algorithm::LocalSearch => local_search_optimization_with(
            candidates,
            cells,
            existing,
            scenario.num_stores,
            &scenario.huff,
            &scenario.constraints,
            &scenario.local_search,
            yield_point,
        ),
    };

    let (result, error) = match outcome {
        Ok(result) => (Some(result), None),
        Err(e) => {
            warn!("Scenario {} failed: {}", scenario.name, e);
            let message = e.to_string();
            (e.into_partial_result(), Some(message))
        }
    };

    ScenarioOutcome {
        index,
        name: scenario.name.clone(),
        algorithm: scenario.algorithm,
        num_stores: scenario.num_stores,
        result,
        error,
    }
}

fn best_by<F: Fn(&OptimizationResult) -> f64>(outcomes: &[ScenarioOutcome], key: F) -> Option<String> {
    let mut best: Option<(&ScenarioOutcome, f64)> = None;
    for outcome in outcomes {
        if let Some(result) = &outcome.result {
            let value = key(result);
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((outcome, value));
            }
        }
    }
    best.map(|(o, _)| o.name.clone())
}

fn scenario_done(yield_point: &mut dyn YieldPoint, outcome: &ScenarioOutcome) {
    yield_point.on_iteration(SearchProgress {
        phase: SearchPhase::ScenarioComplete,
        iteration: outcome.index,
        objective: outcome.result.as_ref().map_or(0.0, |r| r.total_demand_captured),
    });
}

/// Runs every scenario over the same candidates and cells and ranks them.
pub fn run_scenarios(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    scenarios: &[Scenario],
    parallel: bool,
) -> ScenarioComparison {
    run_scenarios_with(candidates, cells, existing, scenarios, parallel, &mut NoYield)
}

/// As [`run_scenarios`], reporting to `yield_point` as the batch advances.
///
/// Runs share the inputs read-only, so they can execute on the rayon pool when `parallel`
/// is set. Sequential runs forward `yield_point` into each optimizer and fire it once more
/// after every scenario; parallel runs only fire it as each scenario finishes, in completion
/// order. Outcome order always follows the scenario list.
pub fn run_scenarios_with(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    scenarios: &[Scenario],
    parallel: bool,
    yield_point: &mut dyn YieldPoint,
) -> ScenarioComparison {
    info!("Running {} scenarios ({})", scenarios.len(), if parallel { "parallel" } else { "sequential" });

    let outcomes: Vec<ScenarioOutcome> = if parallel {
        let (tx, rx) = mpsc::channel();
        let mut finished: Vec<ScenarioOutcome> = std::thread::scope(|scope| {
            scope.spawn(move || {
                scenarios.par_iter().enumerate().for_each_with(tx, |tx, (i, s)| {
                    // Receiver outlives every sender
                    let _ = tx.send(run_one(i + 1, s, candidates, cells, existing, &mut NoYield));
                });
            });
            rx.iter()
                .map(|outcome| {
                    scenario_done(yield_point, &outcome);
                    outcome
                })
                .collect()
        });
        finished.sort_by_key(|o| o.index);
        finished
    } else {
        let mut outcomes = Vec::with_capacity(scenarios.len());
        for (i, s) in scenarios.iter().enumerate() {
            let outcome = run_one(i + 1, s, candidates, cells, existing, yield_point);
            scenario_done(yield_point, &outcome);
            outcomes.push(outcome);
        }
        outcomes
    };

    let results: Vec<&OptimizationResult> = outcomes.iter().filter_map(|o| o.result.as_ref()).collect();
    let summary = if results.is_empty() {
        ScenarioSummary { total_scenarios: outcomes.len(), ..ScenarioSummary::default() }
    } else {
        let n = results.len() as f64;
        let demands: Vec<f64> = results.iter().map(|r| r.total_demand_captured).collect();
        ScenarioSummary {
            total_scenarios: outcomes.len(),
            successful: outcomes.iter().filter(|o| o.error.is_none()).count(),
            average_demand: demands.iter().sum::<f64>() / n,
            average_coverage: results.iter().map(|r| r.coverage).sum::<f64>() / n,
            demand_min: demands.iter().cloned().fold(f64::INFINITY, f64::min),
            demand_max: demands.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    };

    let comparison = ScenarioComparison {
        best_by_demand: best_by(&outcomes, |r| r.total_demand_captured),
        best_by_coverage: best_by(&outcomes, |r| r.coverage),
        best_by_efficiency: best_by(&outcomes, |r| r.metrics.efficiency),
        outcomes,
        summary,
    };

    if let Some(best) = &comparison.best_by_demand {
        info!("Best scenario by demand: {}", best);
    }
    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;

    fn inputs() -> (Vec<CandidateSite>, Vec<DemandMeshCell>) {
        let step = 0.0025;
        let cells = (0..36)
            .map(|i| {
                let lat = 35.0 + (i / 6) as f64 * step;
                let lng = 139.0 + (i % 6) as f64 * step;
                DemandMeshCell::new(format!("mesh_{}", i), MeshBounds::new(lat + step, lat, lng + step, lng), 100, 30.0)
            })
            .collect();
        let candidates = (0..9)
            .map(|i| CandidateSite::new(format!("c{}", i), Coordinate::new(35.0 + (i / 3) as f64 * 0.006, 139.0 + (i % 3) as f64 * 0.006), 1))
            .collect();
        (candidates, cells)
    }

    fn scenario(name: &str, algorithm: Algorithm, num_stores: usize) -> Scenario {
        Scenario {
            name: name.to_string(),
            algorithm,
            num_stores,
            huff: HuffParams::default(),
            constraints: OptimizationConstraints::default(),
            local_search: LocalSearchConfig { max_iterations: 5, stagnation_limit: 2, ..LocalSearchConfig::default() },
        }
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let (candidates, cells) = inputs();
        let scenarios = vec![
            scenario("one", Algorithm::Greedy, 1),
            scenario("two", Algorithm::Greedy, 2),
            scenario("two-ls", Algorithm::LocalSearch, 2),
        ];
        let seq = run_scenarios(&candidates, &cells, &[], &scenarios, false);
        let par = run_scenarios(&candidates, &cells, &[], &scenarios, true);

        assert_eq!(seq.outcomes.len(), 3);
        for (a, b) in seq.outcomes.iter().zip(&par.outcomes) {
            assert_eq!(a.name, b.name);
            assert_eq!(
                a.result.as_ref().map(|r| r.total_demand_captured),
                b.result.as_ref().map(|r| r.total_demand_captured)
            );
        }
        assert_eq!(seq.summary.successful, 3);
        assert!(seq.summary.demand_min <= seq.summary.demand_max);
        assert!(seq.best_by_demand.is_some());
    }

    #[test]
    fn sequential_batch_reports_every_pick_and_scenario() {
        let (candidates, cells) = inputs();
        let scenarios = vec![scenario("one", Algorithm::Greedy, 1), scenario("three", Algorithm::Greedy, 3)];
        let mut seen: Vec<SearchProgress> = Vec::new();
        let comparison = run_scenarios_with(&candidates, &cells, &[], &scenarios, false, &mut |p: SearchProgress| seen.push(p));

        let done: Vec<usize> = seen
            .iter()
            .filter(|p| p.phase == SearchPhase::ScenarioComplete)
            .map(|p| p.iteration)
            .collect();
        assert_eq!(done, vec![1, 2]);

        let picks: usize = comparison.outcomes.iter().map(|o| o.result.as_ref().unwrap().iterations.len()).sum();
        assert_eq!(seen.iter().filter(|p| p.phase == SearchPhase::GreedySeed).count(), picks);
        // Batch callbacks follow the picks of their own scenario
        assert_eq!(seen.last().unwrap().phase, SearchPhase::ScenarioComplete);
        assert_eq!(
            seen.last().unwrap().objective,
            comparison.outcomes[1].result.as_ref().unwrap().total_demand_captured
        );
    }

    #[test]
    fn parallel_batch_reports_each_finished_scenario() {
        let (candidates, cells) = inputs();
        let scenarios = vec![
            scenario("one", Algorithm::Greedy, 1),
            scenario("two", Algorithm::Greedy, 2),
            scenario("two-ls", Algorithm::LocalSearch, 2),
        ];
        let mut done: Vec<usize> = Vec::new();
        let comparison = run_scenarios_with(&candidates, &cells, &[], &scenarios, true, &mut |p: SearchProgress| {
            assert_eq!(p.phase, SearchPhase::ScenarioComplete);
            done.push(p.iteration);
        });

        done.sort();
        assert_eq!(done, vec![1, 2, 3]);
        let order: Vec<usize> = comparison.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn failures_are_recorded_per_scenario() {
        let (candidates, _) = inputs();
        let scenarios = vec![scenario("no-cells", Algorithm::Greedy, 2)];
        let comparison = run_scenarios(&candidates, &[], &[], &scenarios, false);
        assert!(comparison.outcomes[0].result.is_none());
        assert!(comparison.outcomes[0].error.is_some());
        assert_eq!(comparison.best_by_demand, None);
        assert_eq!(comparison.summary.successful, 0);
    }
}
