use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use crate::config::constants::OBJECTIVE_EPSILON;
use crate::config::engine_config::{HuffParams, LocalSearchConfig, OptimizationConstraints};
use crate::core::greedy::{check_inputs, finalize_result, prepare_pool, run_greedy, violates_spacing};
use crate::core::huff::CaptureEvaluator;
use crate::core::search_control::{Deadline, NoYield, SearchProgress, YieldPoint};
use crate::errors::{SiteError, SiteResult};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::optimization_result::*;
use crate::models::store_site::{CandidateSite, StoreSite};
use crate::utils::logging::{self, OperationCategory, OptimizationType};

/// Current best selection, as indices into the candidate pool.
struct Incumbent {
    picks: Vec<usize>,
    objective: f64,
}

struct SwapSearch<'a> {
    evaluator: &'a CaptureEvaluator<'a>,
    pool: &'a [StoreSite],
    existing: &'a [StoreSite],
    constraints: &'a OptimizationConstraints,
}

impl<'a> SwapSearch<'a> {
    fn objective_of(&self, picks: &[usize]) -> f64 {
        let field = self.evaluator.field(self.existing.iter().chain(picks.iter().map(|&i| &self.pool[i])));
        self.evaluator.objective(&field)
    }

    fn cost_of(&self, picks: &[usize]) -> f64 {
        picks.iter().map(|&i| self.pool[i].cost_or(self.constraints.store_cost)).sum()
    }

    /// First improving swap of one selected site for an unselected candidate, evaluated on
    /// the whole configuration. `None` when the neighbourhood has no improvement or the
    /// deadline passed mid-scan.
    fn first_improvement(&self, incumbent: &Incumbent, deadline: &Deadline) -> Option<(usize, usize, f64)> {
        for position in 0..incumbent.picks.len() {
            let others: Vec<usize> = incumbent
                .picks
                .iter()
                .enumerate()
                .filter(|(p, _)| *p != position)
                .map(|(_, &i)| i)
                .collect();
            let other_sites: Vec<&StoreSite> = others.iter().map(|&i| &self.pool[i]).collect();
            let field = self.evaluator.field(self.existing.iter().chain(other_sites.iter().copied()));
            let base = self.evaluator.objective(&field);
            let spent = self.cost_of(&others);

            for (candidate, site) in self.pool.iter().enumerate() {
                if deadline.expired() {
                    return None;
                }
                if incumbent.picks.contains(&candidate) {
                    continue;
                }
                if let Some(budget) = self.constraints.max_budget {
                    if spent + site.cost_or(self.constraints.store_cost) > budget + OBJECTIVE_EPSILON {
                        continue;
                    }
                }
                if violates_spacing(
                    site,
                    self.existing.iter().chain(other_sites.iter().copied()),
                    self.constraints.min_distance_km,
                ) {
                    continue;
                }

                let objective = self.evaluator.objective_with(&field, base, site);
                if objective > incumbent.objective + OBJECTIVE_EPSILON {
                    return Some((position, candidate, objective));
                }
            }
        }
        None
    }
}

/// Greedy seed refined by first-improvement swaps, with seeded random restarts when a
/// swap scan finds nothing. Heuristic: the result is never worse than the seed but is not
/// guaranteed optimal.
#[allow(clippy::too_many_arguments)]
pub fn local_search_optimization(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    num_stores: usize,
    huff: &HuffParams,
    constraints: &OptimizationConstraints,
    config: &LocalSearchConfig,
) -> SiteResult<OptimizationResult> {
    local_search_optimization_with(candidates, cells, existing, num_stores, huff, constraints, config, &mut NoYield)
}

#[allow(clippy::too_many_arguments)]
pub fn local_search_optimization_with(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    num_stores: usize,
    huff: &HuffParams,
    constraints: &OptimizationConstraints,
    config: &LocalSearchConfig,
    yield_point: &mut dyn YieldPoint,
) -> SiteResult<OptimizationResult> {
    if num_stores == 0 {
        return Ok(OptimizationResult::empty(Algorithm::LocalSearch));
    }
    check_inputs(cells, candidates)?;

    let deadline = Deadline::after(config.timeout());
    let pool = prepare_pool(candidates, constraints.max_candidates);
    if pool.sites.is_empty() {
        return Err(SiteError::InsufficientData("no candidate has a usable location".to_string()));
    }
    let evaluator = CaptureEvaluator::new(cells, huff);
    let search = SwapSearch {
        evaluator: &evaluator,
        pool: &pool.sites,
        existing,
        constraints,
    };
    let all: Vec<usize> = (0..pool.sites.len()).collect();

    // Seed
    let seed = {
        let _timing = logging::start_timing(
            "local_search_seed",
            OperationCategory::Optimization { subcategory: OptimizationType::Greedy },
        );
        run_greedy(
            &evaluator,
            &pool.sites,
            &all,
            existing,
            num_stores,
            constraints,
            &deadline.capped(constraints.timeout()),
            SearchPhase::GreedySeed,
            yield_point,
        )
    };
    if seed.timed_out {
        warn!("Greedy seed timed out with {} stores; refining the partial selection", seed.picks.len());
    }
    let seed_stop = seed.stop_reason;
    let mut trace = seed.iterations;
    let seed_picks: Vec<usize> = seed.picks.iter().map(|p| p.pool_index).collect();
    let mut incumbent = Incumbent {
        objective: search.objective_of(&seed_picks),
        picks: seed_picks,
    };
    let seed_objective = incumbent.objective;
    info!("Local search seeded with {} stores, objective {:.1}", incumbent.picks.len(), seed_objective);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stagnation = 0;
    let mut stop_reason = StopReason::MaxIterations;
    let mut timed_out = false;

    for iteration in 1..=config.max_iterations {
        if deadline.expired() {
            timed_out = true;
            stop_reason = StopReason::Timeout;
            break;
        }

        let swap = {
            let _timing = logging::start_timing(
                "swap_scan",
                OperationCategory::Optimization { subcategory: OptimizationType::SwapImprovement },
            );
            search.first_improvement(&incumbent, &deadline)
        };

        if swap.is_none() && deadline.expired() {
            timed_out = true;
            stop_reason = StopReason::Timeout;
            break;
        }

        let mut improved = false;
        if let Some((position, candidate, objective)) = swap {
            debug!(
                "Iteration {}: swap {} -> {} improves objective {:.1} -> {:.1}",
                iteration,
                pool.sites[incumbent.picks[position]].id,
                pool.sites[candidate].id,
                incumbent.objective,
                objective
            );
            let gain = objective - incumbent.objective;
            incumbent.picks[position] = candidate;
            incumbent.objective = objective;
            trace.push(IterationRecord {
                iteration: trace.len() + 1,
                phase: SearchPhase::SwapImprovement,
                site_id: pool.sites[candidate].id.clone(),
                incremental_demand: gain,
                cumulative_demand: objective,
                cumulative_cost: search.cost_of(&incumbent.picks),
                remaining_candidates: pool.sites.len() - incumbent.picks.len(),
            });
            improved = true;
        } else {
            let _timing = logging::start_timing(
                "random_restart",
                OperationCategory::Optimization { subcategory: OptimizationType::RandomRestart },
            );
            let mut sample = all.clone();
            sample.shuffle(&mut rng);
            sample.truncate(config.restart_sample_size.max(1));

            let restart = run_greedy(
                &evaluator,
                &pool.sites,
                &sample,
                existing,
                num_stores,
                constraints,
                &deadline,
                SearchPhase::RandomRestart,
                &mut NoYield,
            );
            if restart.timed_out {
                timed_out = true;
                stop_reason = StopReason::Timeout;
                break;
            }
            let picks: Vec<usize> = restart.picks.iter().map(|p| p.pool_index).collect();
            let objective = search.objective_of(&picks);
            if objective > incumbent.objective + OBJECTIVE_EPSILON {
                info!(
                    "Iteration {}: random restart improves objective {:.1} -> {:.1}",
                    iteration, incumbent.objective, objective
                );
                let offset = trace.len();
                trace.extend(restart.iterations.into_iter().map(|mut r| {
                    r.iteration += offset;
                    r
                }));
                incumbent = Incumbent { picks, objective };
                improved = true;
            }
        }

        yield_point.on_iteration(SearchProgress {
            phase: if improved { SearchPhase::SwapImprovement } else { SearchPhase::RandomRestart },
            iteration,
            objective: incumbent.objective,
        });

        if improved {
            stagnation = 0;
        } else {
            stagnation += 1;
            if stagnation >= config.stagnation_limit {
                stop_reason = StopReason::Stagnation;
                break;
            }
        }
    }

    let selected = incumbent
        .picks
        .iter()
        .map(|&i| (pool.sites[i].clone(), None))
        .collect();
    let mut result = finalize_result(Algorithm::LocalSearch, cells, existing, selected, huff, constraints);
    result.iterations = trace;
    result.stop_reason = stop_reason;
    result.timed_out = timed_out;
    result.candidates_truncated = pool.truncated;

    info!(
        "Local search finished: {} stores, demand {:.1} (seed {:.1}), {:?}",
        result.store_count(),
        result.total_demand_captured,
        seed_objective,
        result.stop_reason
    );

    if timed_out {
        return Err(SiteError::Timeout { partial: Box::new(result) });
    }
    if constraints.strict && result.store_count() < num_stores && seed_stop.is_constraint_stop() {
        return Err(SiteError::ConstraintViolation {
            reason: format!("only {} of {} stores satisfy the constraints", result.store_count(), num_stores),
            partial: Box::new(result),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::greedy::greedy_optimization;
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;

    fn cells() -> Vec<DemandMeshCell> {
        let n = 10;
        let step = 0.0025;
        (0..n * n)
            .map(|i| {
                let lat = 35.0 + (i / n) as f64 * step;
                let lng = 139.0 + (i % n) as f64 * step;
                // Demand concentrated in two corners
                let demand = if (i / n < 3 && i % n < 3) || (i / n > 6 && i % n > 6) { 200.0 } else { 5.0 };
                DemandMeshCell::new(format!("mesh_{}", i), MeshBounds::new(lat + step, lat, lng + step, lng), 0, demand)
            })
            .collect()
    }

    fn candidates() -> Vec<CandidateSite> {
        (0..25)
            .map(|i| CandidateSite::new(format!("c{}", i), Coordinate::new(35.0 + (i / 5) as f64 * 0.006, 139.0 + (i % 5) as f64 * 0.006), 1))
            .collect()
    }

    fn config() -> LocalSearchConfig {
        LocalSearchConfig { max_iterations: 15, stagnation_limit: 3, ..LocalSearchConfig::default() }
    }

    #[test]
    fn never_worse_than_greedy_seed() {
        let huff = HuffParams { max_radius_km: 1.0, distance_decay: 2.0 };
        let constraints = OptimizationConstraints { min_distance_km: 0.5, ..OptimizationConstraints::default() };
        let existing = vec![StoreSite::new("rival", Coordinate::new(35.004, 139.004), crate::models::store_site::SiteRole::Competitor)];

        let greedy = greedy_optimization(&candidates(), &cells(), &existing, 3, &huff, &constraints).unwrap();
        let refined = local_search_optimization(&candidates(), &cells(), &existing, 3, &huff, &constraints, &config()).unwrap();

        assert_eq!(refined.algorithm, Algorithm::LocalSearch);
        assert!(refined.total_demand_captured + 1e-6 >= greedy.total_demand_captured);
        assert_eq!(refined.store_count(), greedy.store_count());
    }

    #[test]
    fn same_seed_is_reproducible() {
        let huff = HuffParams::default();
        let constraints = OptimizationConstraints::default();
        let a = local_search_optimization(&candidates(), &cells(), &[], 2, &huff, &constraints, &config()).unwrap();
        let b = local_search_optimization(&candidates(), &cells(), &[], 2, &huff, &constraints, &config()).unwrap();
        let ids = |r: &OptimizationResult| r.selected.iter().map(|s| s.site.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.total_demand_captured, b.total_demand_captured);
    }

    #[test]
    fn stops_on_stagnation_or_iteration_cap() {
        let result = local_search_optimization(
            &candidates(), &cells(), &[], 2, &HuffParams::default(), &OptimizationConstraints::default(), &config(),
        ).unwrap();
        assert!(matches!(result.stop_reason, StopReason::Stagnation | StopReason::MaxIterations));
        assert!(result.iterations.iter().any(|r| r.phase == SearchPhase::GreedySeed));
    }

    #[test]
    fn selection_keeps_minimum_spacing() {
        let constraints = OptimizationConstraints { min_distance_km: 0.9, ..OptimizationConstraints::default() };
        let result = local_search_optimization(&candidates(), &cells(), &[], 3, &HuffParams::default(), &constraints, &config()).unwrap();
        for (i, a) in result.selected.iter().enumerate() {
            for b in &result.selected[i + 1..] {
                assert!(a.site.distance_to(&b.site) >= 0.9);
            }
        }
    }

    #[test]
    fn zero_stores_is_empty() {
        let result = local_search_optimization(&[], &[], &[], 0, &HuffParams::default(), &OptimizationConstraints::default(), &config()).unwrap();
        assert!(result.selected.is_empty());
    }

    #[test]
    fn expired_deadline_returns_partial_result() {
        let config = LocalSearchConfig { timeout_secs: 0, ..config() };
        let err = local_search_optimization(
            &candidates(), &cells(), &[], 2, &HuffParams::default(), &OptimizationConstraints::default(), &config,
        )
        .unwrap_err();

        assert!(err.is_timeout());
        let partial = err.into_partial_result().unwrap();
        assert!(partial.timed_out);
        assert_eq!(partial.stop_reason, StopReason::Timeout);
        assert_eq!(partial.algorithm, Algorithm::LocalSearch);
    }

    #[test]
    fn yield_point_sees_seed_picks_and_each_iteration() {
        let mut seen: Vec<SearchProgress> = Vec::new();
        let result = local_search_optimization_with(
            &candidates(),
            &cells(),
            &[],
            2,
            &HuffParams::default(),
            &OptimizationConstraints::default(),
            &config(),
            &mut |p: SearchProgress| seen.push(p),
        )
        .unwrap();

        let seed_picks = result.iterations.iter().filter(|r| r.phase == SearchPhase::GreedySeed).count();
        assert_eq!(seed_picks, 2);
        assert!(seen[..seed_picks].iter().all(|p| p.phase == SearchPhase::GreedySeed));

        let rounds: Vec<&SearchProgress> = seen[seed_picks..].iter().collect();
        assert!(!rounds.is_empty() && rounds.len() <= config().max_iterations);
        for (i, p) in rounds.iter().enumerate() {
            assert_eq!(p.iteration, i + 1);
            assert_ne!(p.phase, SearchPhase::GreedySeed);
        }
        if result.stop_reason == StopReason::Stagnation {
            let limit = config().stagnation_limit;
            assert!(rounds[rounds.len() - limit..].iter().all(|p| p.phase == SearchPhase::RandomRestart));
        }
        assert!((rounds.last().unwrap().objective - result.total_demand_captured).abs() < 1e-6);
    }
}
