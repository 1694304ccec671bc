use crate::analysis::capacity::CapacityAnalysisResult;
use crate::analysis::competitive::CompetitiveAnalysisResult;
use crate::analysis::historical::PatternAnalysisResult;
use crate::analysis::metrics::MarketSnapshot;
use crate::core::scenarios::ScenarioComparison;
use crate::models::optimization_result::OptimizationResult;

pub fn print_optimization_summary(result: &OptimizationResult) {
    println!("\n{} Optimization Summary", result.algorithm);
    println!("----------------------------------------");
    println!("Stores Selected: {}", result.store_count());
    println!("Demand Captured: {:.1}", result.total_demand_captured);
    println!("Total Cost: ¥{:.0}", result.total_cost);
    println!("Coverage: {:.1}%", result.coverage * 100.0);
    println!("Metrics:");
    println!("  Average Demand per Store: {:.1}", result.metrics.average_demand_per_store);
    println!("  Cost per Demand Unit: ¥{:.2}", result.metrics.cost_per_demand_unit);
    println!("  Efficiency: {:.2} per 100K", result.metrics.efficiency);
    println!("Stopped: {:?}{}", result.stop_reason, if result.timed_out { " (timed out)" } else { "" });
    if result.candidates_truncated > 0 {
        println!("Candidates Dropped by Pool Cap: {}", result.candidates_truncated);
    }
    for selected in &result.selected {
        println!(
            "  {}. {} ({:.5}, {:.5}): +{:.1}",
            selected.order,
            selected.site.id,
            selected.site.coordinate.lat,
            selected.site.coordinate.lng,
            selected.incremental_demand
        );
    }
    println!("----------------------------------------");
}

pub fn print_market_snapshot(snapshot: &MarketSnapshot) {
    println!("\nMarket Snapshot");
    println!("----------------------------------------");
    println!("Total Demand: {:.1}", snapshot.total_demand);
    println!("Captured Demand: {:.1}", snapshot.captured_demand);
    println!("Coverage: {:.1}%", snapshot.coverage * 100.0);
    for store in &snapshot.stores {
        println!(
            "{} [{}]: {:.1} demand, {} meshes, {:.1}% share",
            store.store_id, store.role, store.total_demand, store.mesh_count, store.market_share
        );
    }
}

pub fn print_competitive_summary(result: &CompetitiveAnalysisResult) {
    println!("\nCompetitive Analysis");
    println!("----------------------------------------");
    println!("Total Market Demand: {:.1}", result.total_market_demand);
    println!(
        "Own Stores: {} with {:.1}% share ({:.1} avg/store)",
        result.own.store_count, result.own.market_share, result.own.average_demand_per_store
    );
    println!(
        "Competitors: {} with {:.1}% share ({:.1} avg/store)",
        result.competitors.store_count, result.competitors.market_share, result.competitors.average_demand_per_store
    );
    println!("Own Advantage: {:.1}%", result.own_advantage_pct);
    println!("Overall Position: {:?} (vulnerability {:.2})", result.overall_position, result.overall_vulnerability);
    for store in &result.own_stores {
        println!(
            "  {}: {:?}, pressure {:.2}, {} nearby, {} high threats",
            store.store_name,
            store.market_position,
            store.total_pressure,
            store.nearby_competitor_count,
            store.high_threat_count
        );
        for rec in &store.recommendations {
            println!("    [{:?}] {:?}: {}", rec.priority, rec.kind, rec.action);
        }
    }
}

pub fn print_capacity_summary(result: &CapacityAnalysisResult) {
    println!("\nCapacity Analysis");
    println!("----------------------------------------");
    println!("Average Utilization: {:.1}%", result.network.average_utilization_pct);
    println!("Over Capacity: {}", result.network.over_capacity);
    println!("Under Capacity: {}", result.network.under_capacity);
    println!("Profit Opportunity: ¥{:.0}/day", result.network.total_profit_opportunity);
    for profile in &result.profiles {
        println!(
            "  {}: {:.0}/day, {:.1}% utilized, peak staff {}, {}",
            profile.store_name,
            profile.daily_demand,
            profile.utilization_pct,
            profile.required.peak_staff,
            profile.recommendation
        );
    }
    if !result.actions.is_empty() {
        println!("Actions:");
        for (i, action) in result.actions.iter().enumerate() {
            println!("  {}. {}: {} ({:+.0}/day)", i + 1, action.store_id, action.recommendation, action.profit_improvement);
        }
    }
}

pub fn print_pattern_summary(result: &PatternAnalysisResult) {
    println!("\nHistorical Pattern Analysis");
    println!("----------------------------------------");
    println!(
        "Records: {} ({} high, {} average, {} under)",
        result.metadata.total_records,
        result.categories.high.len(),
        result.categories.average.len(),
        result.categories.under.len()
    );
    if result.pattern.is_empty() {
        println!("No pattern: not enough high performers");
        return;
    }
    println!("Pattern Confidence: {:.2}", result.pattern.confidence);
    println!("Pattern Strength: {:.2}", result.metadata.pattern_strength);
    for (feature, fp) in &result.pattern.features {
        println!(
            "  {}: {:.1} [{:.1}, {:.1}] importance {:.2}",
            feature, fp.optimal, fp.range.min, fp.range.max, fp.importance
        );
    }
    for (site, forecast) in result.recommendations.iter().zip(&result.forecasts) {
        println!(
            "  {} score {:.2}: revenue ¥{:.0}, payback {}",
            site.cell_id,
            site.pattern_score,
            forecast.projected_revenue,
            forecast.payback_years.map_or("n/a".to_string(), |y| format!("{:.1} years", y))
        );
    }
}

pub fn print_scenario_comparison(comparison: &ScenarioComparison) {
    println!("\nScenario Comparison");
    println!("----------------------------------------");
    for outcome in &comparison.outcomes {
        match (&outcome.result, &outcome.error) {
            (Some(result), None) => println!(
                "{}. {} ({}, k={}): {:.1} demand, {:.1}% coverage",
                outcome.index,
                outcome.name,
                outcome.algorithm,
                outcome.num_stores,
                result.total_demand_captured,
                result.coverage * 100.0
            ),
            (_, Some(error)) => println!("{}. {} failed: {}", outcome.index, outcome.name, error),
            (None, None) => println!("{}. {}: no result", outcome.index, outcome.name),
        }
    }
    if let Some(best) = &comparison.best_by_demand {
        println!("Best by Demand: {}", best);
    }
    if let Some(best) = &comparison.best_by_coverage {
        println!("Best by Coverage: {}", best);
    }
    if let Some(best) = &comparison.best_by_efficiency {
        println!("Best by Efficiency: {}", best);
    }
    println!(
        "Average Demand: {:.1} (range {:.1} - {:.1})",
        comparison.summary.average_demand, comparison.summary.demand_min, comparison.summary.demand_max
    );
}
