use std::fs::File;
use std::io::BufWriter;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use siteopt::analysis::capacity::{analyze_capacity, CapacityAnalysisResult};
use siteopt::analysis::competitive::{analyze_competition, CompetitiveAnalysisResult};
use siteopt::analysis::historical::{analyze_historical_patterns, PatternAnalysisResult};
use siteopt::analysis::metrics::market_snapshot;
use siteopt::analysis::reporting;
use siteopt::cli::cli::{AlgorithmChoice, Args};
use siteopt::config::engine_config::EngineConfig;
use siteopt::core::candidates::generate_candidate_sites;
use siteopt::core::greedy::greedy_optimization_with;
use siteopt::core::local_search::local_search_optimization_with;
use siteopt::core::mesh::generate_demand_grid;
use siteopt::core::scenarios::{run_scenarios_with, Scenario, ScenarioComparison};
use siteopt::core::search_control::ProgressYield;
use siteopt::data::population::PopulationProvider;
use siteopt::data::stores_loader::{load_scenario, IngestReport};
use siteopt::models::optimization_result::{Algorithm, OptimizationResult};
use siteopt::models::store_site::{CandidateSite, StoreSite};
use siteopt::utils::csv_export::CsvExporter;
use siteopt::utils::logging::{self, FileIOType, OperationCategory};
use siteopt::SiteResult;

#[derive(Serialize)]
struct RunReport<'a> {
    seed: u64,
    cell_count: usize,
    candidate_count: usize,
    ingest: &'a IngestReport,
    results: Vec<(&'a str, &'a OptimizationResult)>,
    comparison: Option<&'a ScenarioComparison>,
    competitive: Option<&'a CompetitiveAnalysisResult>,
    capacity: Option<&'a CapacityAnalysisResult>,
    historical: Option<&'a PatternAnalysisResult>,
}

fn progress(label: &str) -> ProgressYield {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {prefix} [{elapsed}] {pos} steps {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_prefix(label.to_string());
    ProgressYield::new(bar)
}

// Timeouts and constraint stops still carry the best selection found
fn settle(label: &str, outcome: SiteResult<OptimizationResult>) -> anyhow::Result<OptimizationResult> {
    match outcome {
        Ok(result) => Ok(result),
        Err(e) => {
            let message = e.to_string();
            match e.into_partial_result() {
                Some(partial) => {
                    warn!("{} stopped early ({}), using partial result", label, message);
                    Ok(partial)
                }
                None => Err(anyhow::anyhow!(message)).with_context(|| format!("{} failed", label)),
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.enable_timing())?;

    println!("Site Optimizer: Huff demand capture and store placement");

    let config = match args.config() {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path))?,
        None => EngineConfig::default(),
    };

    let scenario = {
        let _timing = logging::start_timing("load_scenario", OperationCategory::FileIO { subcategory: FileIOType::DataLoad });
        load_scenario(args.scenario()).with_context(|| format!("loading scenario {}", args.scenario()))?
    };
    info!(
        "Loaded {} stores, {} competitors, {} historical records ({} records skipped)",
        scenario.stores.len(),
        scenario.competitors.len(),
        scenario.historical.len(),
        scenario.report.skipped.len()
    );

    let provider = scenario.population.as_ref().map(|p| p as &dyn PopulationProvider);
    let cells = generate_demand_grid(&scenario.bounds, &config.mesh, provider)?;
    let existing = scenario.existing_sites();

    let seed = args.seed().unwrap_or(config.local_search.seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let candidates: Vec<CandidateSite> = if scenario.candidates.is_empty() {
        generate_candidate_sites(
            &scenario.bounds,
            args.candidates(),
            &existing,
            args.accuracy().min_distance_km(),
            &mut rng,
        )?
    } else {
        scenario.candidates.iter().cloned().map(CandidateSite::from_site).collect()
    };
    info!("{} cells, {} candidates, seed {}", cells.len(), candidates.len(), seed);

    let mut local_search = config.local_search.clone();
    local_search.seed = seed;

    let mut results: Vec<(&str, OptimizationResult)> = Vec::new();
    let mut comparison = None;
    match args.algorithm() {
        AlgorithmChoice::Greedy => {
            let mut bar = progress("greedy");
            let outcome = greedy_optimization_with(
                &candidates, &cells, &existing, args.num_stores(), &config.huff, &config.constraints, &mut bar,
            );
            bar.finish("done");
            results.push(("greedy", settle("Greedy", outcome)?));
        }
        AlgorithmChoice::LocalSearch => {
            let mut bar = progress("local-search");
            let outcome = local_search_optimization_with(
                &candidates, &cells, &existing, args.num_stores(), &config.huff, &config.constraints,
                &local_search, &mut bar,
            );
            bar.finish("done");
            results.push(("local_search", settle("Local search", outcome)?));
        }
        AlgorithmChoice::Compare => {
            let scenarios: Vec<Scenario> = [("greedy", Algorithm::Greedy), ("local_search", Algorithm::LocalSearch)]
                .into_iter()
                .map(|(name, algorithm)| Scenario {
                    name: name.to_string(),
                    algorithm,
                    num_stores: args.num_stores(),
                    huff: config.huff,
                    constraints: config.constraints.clone(),
                    local_search: local_search.clone(),
                })
                .collect();
            let mut bar = progress("compare");
            let outcome = run_scenarios_with(&candidates, &cells, &existing, &scenarios, args.parallel(), &mut bar);
            bar.finish("done");
            reporting::print_scenario_comparison(&outcome);
            for o in &outcome.outcomes {
                if let Some(result) = &o.result {
                    let label = if o.algorithm == Algorithm::Greedy { "greedy" } else { "local_search" };
                    results.push((label, result.clone()));
                }
            }
            comparison = Some(outcome);
        }
    }

    for (_, result) in &results {
        reporting::print_optimization_summary(result);
    }

    let best = results
        .iter()
        .map(|(_, r)| r)
        .max_by(|a, b| a.total_demand_captured.total_cmp(&b.total_demand_captured));

    let mut own: Vec<StoreSite> = scenario.stores.clone();
    if let Some(best) = best {
        own.extend(best.selected_sites());
    }
    let mut configuration = own.clone();
    configuration.extend(scenario.competitors.iter().cloned());
    reporting::print_market_snapshot(&market_snapshot(&cells, &configuration, &config.huff));

    let competitive = if own.is_empty() || scenario.competitors.is_empty() {
        None
    } else {
        Some(analyze_competition(&own, &scenario.competitors, &cells, &config.competitive)?)
    };
    if let Some(result) = &competitive {
        reporting::print_competitive_summary(result);
    }

    let capacity = if own.is_empty() {
        None
    } else {
        Some(analyze_capacity(&configuration, &cells, &config.huff, &config.capacity)?)
    };
    if let Some(result) = &capacity {
        reporting::print_capacity_summary(result);
    }

    let historical = if scenario.historical.is_empty() {
        None
    } else {
        Some(analyze_historical_patterns(&scenario.historical, &cells, &scenario.competitors, &config.historical)?)
    };
    if let Some(result) = &historical {
        reporting::print_pattern_summary(result);
    }

    if args.enable_csv_export() {
        let exporter = CsvExporter::new(args.output_dir())?;
        for (label, result) in &results {
            exporter.export_optimization(label, result)?;
        }
        let summary: Vec<(&str, &OptimizationResult)> = results.iter().map(|(l, r)| (*l, r)).collect();
        exporter.export_run_summary(&summary)?;
        if let Some(result) = &capacity {
            exporter.export_capacity(result)?;
        }
        if let Some(result) = &competitive {
            exporter.export_competitive(result)?;
        }
        if let Some(result) = &historical {
            exporter.export_site_recommendations(result)?;
        }
        println!("CSV export completed to: {}", exporter.output_dir().display());
    }

    if let Some(path) = args.json_out() {
        let report = RunReport {
            seed,
            cell_count: cells.len(),
            candidate_count: candidates.len(),
            ingest: &scenario.report,
            results: results.iter().map(|(l, r)| (*l, r)).collect(),
            comparison: comparison.as_ref(),
            competitive: competitive.as_ref(),
            capacity: capacity.as_ref(),
            historical: historical.as_ref(),
        };
        let file = File::create(path).with_context(|| format!("creating {}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        println!("Report written to {}", path);
    }

    if logging::is_timing_enabled() {
        logging::print_timing_report();
    }

    Ok(())
}
