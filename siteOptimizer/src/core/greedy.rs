use tracing::{debug, info, warn};
use crate::config::constants::OBJECTIVE_EPSILON;
use crate::config::engine_config::{HuffParams, OptimizationConstraints};
use crate::core::huff::{compute_capture, CaptureEvaluator};
use crate::core::search_control::{Deadline, NoYield, SearchProgress, YieldPoint};
use crate::errors::{SiteError, SiteResult};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::optimization_result::*;
use crate::models::store_site::{CandidateSite, SiteRole, StoreSite};
use crate::utils::logging::{self, OperationCategory, OptimizationType};

/// Candidates that survived validation and the pool cap, as selectable own sites.
pub(crate) struct CandidatePool {
    pub sites: Vec<StoreSite>,
    pub truncated: usize,
}

pub(crate) fn prepare_pool(candidates: &[CandidateSite], cap: usize) -> CandidatePool {
    let mut sites = Vec::with_capacity(candidates.len().min(cap));
    let mut skipped = 0;
    for candidate in candidates {
        if !candidate.coordinate().is_valid() {
            warn!("Skipping candidate {} with invalid coordinate {:?}", candidate.id(), candidate.coordinate());
            skipped += 1;
            continue;
        }
        if !(candidate.site.attractiveness.is_finite() && candidate.site.attractiveness > 0.0) {
            warn!("Skipping candidate {} with attractiveness {}", candidate.id(), candidate.site.attractiveness);
            skipped += 1;
            continue;
        }
        let mut site = candidate.site.clone();
        site.role = SiteRole::Candidate;
        sites.push(site);
    }

    let truncated = sites.len().saturating_sub(cap);
    if truncated > 0 {
        warn!(
            "Candidate pool capped at {}: dropping {} of {} candidates",
            cap,
            truncated,
            sites.len()
        );
        sites.truncate(cap);
    }
    if skipped > 0 {
        debug!("{} malformed candidates skipped", skipped);
    }
    CandidatePool { sites, truncated }
}

pub(crate) fn violates_spacing<'s, I>(site: &StoreSite, others: I, min_distance_km: f64) -> bool
where
    I: IntoIterator<Item = &'s StoreSite>,
{
    others
        .into_iter()
        .filter(|o| o.coordinate.is_valid())
        .any(|o| site.distance_to(o) < min_distance_km)
}

fn within_budget(constraints: &OptimizationConstraints, spent: f64, cost: f64) -> bool {
    match constraints.max_budget {
        Some(budget) => spent + cost <= budget + OBJECTIVE_EPSILON,
        None => true,
    }
}

pub(crate) struct Pick {
    pub pool_index: usize,
    pub gain: f64,
}

pub(crate) struct GreedyRun {
    pub picks: Vec<Pick>,
    pub iterations: Vec<IterationRecord>,
    pub stop_reason: StopReason,
    pub timed_out: bool,
    pub total_cost: f64,
}

/// Marginal-gain selection over `eligible` pool entries.
///
/// Each round adds the feasible candidate that would capture the most demand given the
/// existing stores and the picks so far. Ties keep the earliest candidate.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_greedy(
    evaluator: &CaptureEvaluator,
    pool: &[StoreSite],
    eligible: &[usize],
    existing: &[StoreSite],
    num_stores: usize,
    constraints: &OptimizationConstraints,
    deadline: &Deadline,
    phase: SearchPhase,
    yield_point: &mut dyn YieldPoint,
) -> GreedyRun {
    let mut field = evaluator.field(existing.iter());
    let mut remaining: Vec<usize> = eligible.to_vec();
    let mut run = GreedyRun {
        picks: Vec::new(),
        iterations: Vec::new(),
        stop_reason: StopReason::TargetReached,
        timed_out: false,
        total_cost: 0.0,
    };
    let mut cumulative = 0.0;

    'rounds: while run.picks.len() < num_stores {
        if deadline.expired() {
            run.timed_out = true;
            run.stop_reason = StopReason::Timeout;
            break;
        }
        if remaining.is_empty() {
            run.stop_reason = StopReason::NoCandidates;
            break;
        }

        let mut best: Option<(usize, f64)> = None;
        let mut any_affordable = false;
        let mut any_feasible = false;

        for (slot, &index) in remaining.iter().enumerate() {
            if deadline.expired() {
                run.timed_out = true;
                run.stop_reason = StopReason::Timeout;
                break 'rounds;
            }
            let site = &pool[index];
            let cost = site.cost_or(constraints.store_cost);
            if !within_budget(constraints, run.total_cost, cost) {
                continue;
            }
            any_affordable = true;

            let picked = run.picks.iter().map(|p| &pool[p.pool_index]);
            if violates_spacing(site, existing.iter().chain(picked), constraints.min_distance_km) {
                continue;
            }
            any_feasible = true;

            let gain = evaluator.share_of(&field, site);
            if !gain.is_finite() {
                warn!("Skipping candidate {}: non-finite demand estimate", site.id);
                continue;
            }
            if gain > best.map_or(0.0, |(_, g)| g) {
                best = Some((slot, gain));
            }
        }

        let Some((slot, gain)) = best else {
            run.stop_reason = if !any_affordable {
                StopReason::BudgetExhausted
            } else if !any_feasible {
                StopReason::NoFeasibleCandidate
            } else {
                StopReason::NoPositiveGain
            };
            debug!("Greedy stopped after {} picks: {:?}", run.picks.len(), run.stop_reason);
            break;
        };

        let index = remaining.remove(slot);
        let site = &pool[index];
        evaluator.add_to_field(&mut field, site);
        run.total_cost += site.cost_or(constraints.store_cost);
        cumulative += gain;
        run.picks.push(Pick { pool_index: index, gain });

        run.iterations.push(IterationRecord {
            iteration: run.iterations.len() + 1,
            phase,
            site_id: site.id.clone(),
            incremental_demand: gain,
            cumulative_demand: cumulative,
            cumulative_cost: run.total_cost,
            remaining_candidates: remaining.len(),
        });
        debug!(
            "Pick {}: {} at ({:.4}, {:.4}) captures {:.1}",
            run.picks.len(),
            site.id,
            site.coordinate.lat,
            site.coordinate.lng,
            gain
        );
        yield_point.on_iteration(SearchProgress {
            phase,
            iteration: run.picks.len(),
            objective: cumulative,
        });
    }

    run
}

/// Assembles the result for a final selection, recomputing capture over the whole
/// configuration.
pub(crate) fn finalize_result(
    algorithm: Algorithm,
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    selected: Vec<(StoreSite, Option<f64>)>,
    huff: &HuffParams,
    constraints: &OptimizationConstraints,
) -> OptimizationResult {
    let mut stores: Vec<StoreSite> = existing.to_vec();
    stores.extend(selected.iter().map(|(site, _)| site.clone()));

    let matrix = compute_capture(cells, &stores, huff);
    let per_store = matrix.store_demand(cells);
    let new_store_demand = &per_store[existing.len()..];

    let total_cost: f64 = selected.iter().map(|(site, _)| site.cost_or(constraints.store_cost)).sum();
    let selected_demand: f64 = new_store_demand.iter().sum();

    let selected = selected
        .into_iter()
        .zip(new_store_demand)
        .enumerate()
        .map(|(order, ((site, gain), captured))| SelectedSite {
            order: order + 1,
            site,
            incremental_demand: gain.unwrap_or(*captured),
        })
        .collect::<Vec<_>>();

    let mut result = OptimizationResult::empty(algorithm);
    result.metrics = ResultMetrics::from_totals(selected_demand, total_cost, selected.len());
    result.selected = selected;
    result.total_demand_captured = matrix.own_demand(cells, &stores);
    result.total_cost = total_cost;
    result.coverage = matrix.coverage();
    result
}

pub(crate) fn check_inputs(cells: &[DemandMeshCell], candidates: &[CandidateSite]) -> SiteResult<()> {
    if cells.is_empty() {
        return Err(SiteError::InsufficientData("demand mesh is empty".to_string()));
    }
    if candidates.is_empty() {
        return Err(SiteError::InsufficientData("candidate pool is empty".to_string()));
    }
    Ok(())
}

/// Selects up to `num_stores` new sites by greedy marginal demand gain.
pub fn greedy_optimization(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    num_stores: usize,
    huff: &HuffParams,
    constraints: &OptimizationConstraints,
) -> SiteResult<OptimizationResult> {
    greedy_optimization_with(candidates, cells, existing, num_stores, huff, constraints, &mut NoYield)
}

pub fn greedy_optimization_with(
    candidates: &[CandidateSite],
    cells: &[DemandMeshCell],
    existing: &[StoreSite],
    num_stores: usize,
    huff: &HuffParams,
    constraints: &OptimizationConstraints,
    yield_point: &mut dyn YieldPoint,
) -> SiteResult<OptimizationResult> {
    let _timing = logging::start_timing(
        "greedy_optimization",
        OperationCategory::Optimization { subcategory: OptimizationType::Greedy },
    );

    if num_stores == 0 {
        return Ok(OptimizationResult::empty(Algorithm::Greedy));
    }
    check_inputs(cells, candidates)?;

    let deadline = Deadline::after(constraints.timeout());
    let pool = prepare_pool(candidates, constraints.max_candidates);
    if pool.sites.is_empty() {
        return Err(SiteError::InsufficientData("no candidate has a usable location".to_string()));
    }
    info!(
        "Greedy optimization for {} stores from {} candidates over {} cells",
        num_stores,
        pool.sites.len(),
        cells.len()
    );

    let evaluator = CaptureEvaluator::new(cells, huff);
    let eligible: Vec<usize> = (0..pool.sites.len()).collect();
    let run = run_greedy(
        &evaluator,
        &pool.sites,
        &eligible,
        existing,
        num_stores,
        constraints,
        &deadline,
        SearchPhase::GreedySeed,
        yield_point,
    );

    let selected = run
        .picks
        .iter()
        .map(|p| (pool.sites[p.pool_index].clone(), Some(p.gain)))
        .collect();
    let mut result = finalize_result(Algorithm::Greedy, cells, existing, selected, huff, constraints);
    result.iterations = run.iterations;
    result.stop_reason = run.stop_reason;
    result.timed_out = run.timed_out;
    result.candidates_truncated = pool.truncated;

    info!(
        "Greedy selected {} stores, demand {:.1}, cost {:.0} ({:?})",
        result.store_count(),
        result.total_demand_captured,
        result.total_cost,
        result.stop_reason
    );

    if result.timed_out {
        warn!("Greedy optimization timed out after {:.1}s", deadline.elapsed().as_secs_f64());
        return Err(SiteError::Timeout { partial: Box::new(result) });
    }
    if constraints.strict && result.store_count() < num_stores && result.stop_reason.is_constraint_stop() {
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
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;

    fn grid(n: usize) -> Vec<DemandMeshCell> {
        let step = 0.0025;
        (0..n * n)
            .map(|i| {
                let lat = 35.0 + (i / n) as f64 * step;
                let lng = 139.0 + (i % n) as f64 * step;
                let bounds = MeshBounds::new(lat + step, lat, lng + step, lng);
                DemandMeshCell::new(format!("mesh_{}", i), bounds, 100, 30.0)
            })
            .collect()
    }

    fn candidate(id: &str, lat: f64, lng: f64) -> CandidateSite {
        CandidateSite::new(id, Coordinate::new(lat, lng), 1)
    }

    fn loose() -> OptimizationConstraints {
        OptimizationConstraints { min_distance_km: 0.3, ..OptimizationConstraints::default() }
    }

    #[test]
    fn zero_stores_is_empty_success() {
        let result = greedy_optimization(&[], &[], &[], 0, &HuffParams::default(), &loose()).unwrap();
        assert!(result.selected.is_empty());
        assert_eq!(result.total_cost, 0.0);
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn empty_inputs_are_insufficient_data() {
        let cells = grid(4);
        let err = greedy_optimization(&[], &cells, &[], 2, &HuffParams::default(), &loose()).unwrap_err();
        assert!(matches!(err, SiteError::InsufficientData(_)));
        let err = greedy_optimization(&[candidate("a", 35.0, 139.0)], &[], &[], 2, &HuffParams::default(), &loose()).unwrap_err();
        assert!(matches!(err, SiteError::InsufficientData(_)));
    }

    #[test]
    fn central_candidate_is_picked_first() {
        let cells = grid(8);
        let candidates = vec![
            candidate("edge", 35.0, 139.0),
            candidate("centre", 35.01, 139.01),
        ];
        let result = greedy_optimization(&candidates, &cells, &[], 1, &HuffParams::default(), &loose()).unwrap();
        assert_eq!(result.selected[0].site.id, "centre");
        assert_eq!(result.selected[0].site.role, SiteRole::Candidate);
    }

    #[test]
    fn picks_respect_spacing_and_have_positive_gain() {
        let cells = grid(8);
        let candidates: Vec<_> = (0..16)
            .map(|i| candidate(&format!("c{}", i), 35.0 + (i / 4) as f64 * 0.005, 139.0 + (i % 4) as f64 * 0.005))
            .collect();
        let constraints = OptimizationConstraints { min_distance_km: 0.8, ..OptimizationConstraints::default() };
        let result = greedy_optimization(&candidates, &cells, &[], 5, &HuffParams::default(), &constraints).unwrap();
        for (i, a) in result.selected.iter().enumerate() {
            assert!(a.incremental_demand > 0.0);
            for b in &result.selected[i + 1..] {
                assert!(a.site.distance_to(&b.site) >= 0.8);
            }
        }
        assert_eq!(result.iterations.len(), result.selected.len());
    }

    #[test]
    fn budget_limits_selection() {
        let cells = grid(8);
        let candidates: Vec<_> = (0..9)
            .map(|i| candidate(&format!("c{}", i), 35.0 + (i / 3) as f64 * 0.008, 139.0 + (i % 3) as f64 * 0.008))
            .collect();
        let constraints = OptimizationConstraints {
            max_budget: Some(2_500_000.0),
            ..loose()
        };
        let result = greedy_optimization(&candidates, &cells, &[], 5, &HuffParams::default(), &constraints).unwrap();
        assert_eq!(result.store_count(), 2);
        assert!(result.total_cost <= 2_500_000.0);
        assert_eq!(result.stop_reason, StopReason::BudgetExhausted);

        let strict = OptimizationConstraints { strict: true, ..constraints };
        let err = greedy_optimization(&candidates, &cells, &[], 5, &HuffParams::default(), &strict).unwrap_err();
        assert_eq!(err.partial_result().map(|r| r.store_count()), Some(2));
    }

    #[test]
    fn pool_truncation_is_reported() {
        let cells = grid(4);
        let candidates: Vec<_> = (0..12)
            .map(|i| candidate(&format!("c{}", i), 35.0 + i as f64 * 0.0005, 139.0))
            .collect();
        let constraints = OptimizationConstraints { max_candidates: 5, ..loose() };
        let result = greedy_optimization(&candidates, &cells, &[], 1, &HuffParams::default(), &constraints).unwrap();
        assert_eq!(result.candidates_truncated, 7);
    }

    #[test]
    fn malformed_candidate_is_skipped() {
        let cells = grid(4);
        let candidates = vec![candidate("bad", f64::NAN, 139.0), candidate("good", 35.005, 139.005)];
        let result = greedy_optimization(&candidates, &cells, &[], 1, &HuffParams::default(), &loose()).unwrap();
        assert_eq!(result.selected[0].site.id, "good");
    }

    #[test]
    fn expired_deadline_returns_partial_result() {
        let cells = grid(4);
        let candidates = vec![candidate("a", 35.005, 139.005)];
        let constraints = OptimizationConstraints { timeout_secs: 0, ..loose() };
        let err = greedy_optimization(&candidates, &cells, &[], 1, &HuffParams::default(), &constraints).unwrap_err();
        assert!(err.is_timeout());
        let partial = err.into_partial_result().unwrap();
        assert!(partial.timed_out);
        assert!(partial.selected.is_empty());
    }

    #[test]
    fn yield_point_sees_every_pick() {
        let cells = grid(8);
        let candidates: Vec<_> = (0..9)
            .map(|i| candidate(&format!("c{}", i), 35.0 + (i / 3) as f64 * 0.008, 139.0 + (i % 3) as f64 * 0.008))
            .collect();
        let mut seen: Vec<SearchProgress> = Vec::new();
        let result = greedy_optimization_with(
            &candidates,
            &cells,
            &[],
            3,
            &HuffParams::default(),
            &loose(),
            &mut |p: SearchProgress| seen.push(p),
        )
        .unwrap();

        assert_eq!(result.store_count(), 3);
        assert_eq!(seen.len(), result.iterations.len());
        for (progress, record) in seen.iter().zip(&result.iterations) {
            assert_eq!(progress.phase, SearchPhase::GreedySeed);
            assert_eq!(progress.iteration, record.iteration);
            assert_eq!(progress.objective, record.cumulative_demand);
        }
    }
}
