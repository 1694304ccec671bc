use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::analysis::capacity::CapacityAnalysisResult;
use crate::analysis::competitive::CompetitiveAnalysisResult;
use crate::analysis::historical::PatternAnalysisResult;
use crate::errors::SiteResult;
use crate::models::optimization_result::OptimizationResult;
use crate::utils::logging::{self, FileIOType, OperationCategory};

#[derive(Debug, Serialize)]
struct SelectedSiteRow<'a> {
    order: usize,
    site_id: &'a str,
    latitude: f64,
    longitude: f64,
    attractiveness: f64,
    incremental_demand: f64,
}

#[derive(Debug, Serialize)]
struct IterationRow<'a> {
    iteration: usize,
    phase: String,
    site_id: &'a str,
    incremental_demand: f64,
    cumulative_demand: f64,
    cumulative_cost: f64,
    remaining_candidates: usize,
}

#[derive(Debug, Serialize)]
struct CapacityRow<'a> {
    store_id: &'a str,
    daily_demand: f64,
    peak_hourly_demand: f64,
    current_staff: u32,
    utilization_pct: f64,
    peak_staff: u32,
    off_peak_staff: u32,
    current_profit: f64,
    optimized_profit: f64,
    profit_improvement: f64,
    recommendation: &'static str,
}

#[derive(Debug, Serialize)]
struct CompetitiveRow<'a> {
    store_id: &'a str,
    demand_captured: f64,
    market_share_pct: f64,
    competitive_meshes: usize,
    total_pressure: f64,
    nearby_competitors: usize,
    high_threats: usize,
    vulnerability: f64,
    position: String,
}

#[derive(Debug, Serialize)]
struct SiteRecommendationRow<'a> {
    rank: usize,
    cell_id: &'a str,
    latitude: f64,
    longitude: f64,
    pattern_score: f64,
    confidence: f64,
    projected_revenue: f64,
    projected_profit: f64,
    revenue_low: f64,
    revenue_high: f64,
    payback_years: Option<f64>,
    risk_score: f64,
    reasons: String,
}

/// Writes run outputs as CSV files under a timestamped directory.
pub struct CsvExporter {
    output_dir: PathBuf,
    timestamp: String,
}

impl CsvExporter {
    pub fn new(output_dir: impl AsRef<Path>) -> SiteResult<Self> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let full_path = output_dir.as_ref().join(&timestamp);
        std::fs::create_dir_all(&full_path)?;

        Ok(Self { output_dir: full_path, timestamp })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_rows<T: Serialize>(&self, file_name: &str, rows: impl IntoIterator<Item = T>) -> SiteResult<PathBuf> {
        let path = self.output_dir.join(file_name);
        let mut writer = csv::Writer::from_path(&path)?;
        let mut count = 0;
        for row in rows {
            writer.serialize(row)?;
            count += 1;
        }
        writer.flush()?;
        info!("Wrote {} rows to {}", count, path.display());
        Ok(path)
    }

    /// Selected sites and the iteration trace of one run, prefixed by `label`.
    pub fn export_optimization(&self, label: &str, result: &OptimizationResult) -> SiteResult<()> {
        let _timing = logging::start_timing(
            "export_optimization",
            OperationCategory::FileIO { subcategory: FileIOType::ResultsSave },
        );

        self.write_rows(
            &format!("{}_selected_sites.csv", label),
            result.selected.iter().map(|s| SelectedSiteRow {
                order: s.order,
                site_id: &s.site.id,
                latitude: s.site.coordinate.lat,
                longitude: s.site.coordinate.lng,
                attractiveness: s.site.attractiveness,
                incremental_demand: s.incremental_demand,
            }),
        )?;
        self.write_rows(
            &format!("{}_iterations.csv", label),
            result.iterations.iter().map(|r| IterationRow {
                iteration: r.iteration,
                phase: r.phase.to_string(),
                site_id: &r.site_id,
                incremental_demand: r.incremental_demand,
                cumulative_demand: r.cumulative_demand,
                cumulative_cost: r.cumulative_cost,
                remaining_candidates: r.remaining_candidates,
            }),
        )?;
        Ok(())
    }

    pub fn export_capacity(&self, result: &CapacityAnalysisResult) -> SiteResult<()> {
        self.write_rows(
            "capacity_profiles.csv",
            result.profiles.iter().map(|p| CapacityRow {
                store_id: &p.store_id,
                daily_demand: p.daily_demand,
                peak_hourly_demand: p.peak_hourly_demand,
                current_staff: p.current_staff,
                utilization_pct: p.utilization_pct,
                peak_staff: p.required.peak_staff,
                off_peak_staff: p.required.off_peak_staff,
                current_profit: p.current.profit,
                optimized_profit: p.optimized.profit,
                profit_improvement: p.profit_improvement,
                recommendation: p.recommendation.label(),
            }),
        )?;
        Ok(())
    }

    pub fn export_competitive(&self, result: &CompetitiveAnalysisResult) -> SiteResult<()> {
        self.write_rows(
            "competitive_stores.csv",
            result.own_stores.iter().map(|s| CompetitiveRow {
                store_id: &s.store_id,
                demand_captured: s.demand_captured,
                market_share_pct: s.market_share,
                competitive_meshes: s.competitive_meshes,
                total_pressure: s.total_pressure,
                nearby_competitors: s.nearby_competitor_count,
                high_threats: s.high_threat_count,
                vulnerability: s.vulnerability,
                position: format!("{:?}", s.market_position),
            }),
        )?;
        Ok(())
    }

    pub fn export_site_recommendations(&self, result: &PatternAnalysisResult) -> SiteResult<()> {
        self.write_rows(
            "site_recommendations.csv",
            result
                .recommendations
                .iter()
                .zip(&result.forecasts)
                .enumerate()
                .map(|(i, (site, forecast))| SiteRecommendationRow {
                    rank: i + 1,
                    cell_id: &site.cell_id,
                    latitude: site.coordinate.lat,
                    longitude: site.coordinate.lng,
                    pattern_score: site.pattern_score,
                    confidence: site.confidence,
                    projected_revenue: forecast.projected_revenue,
                    projected_profit: forecast.projected_profit,
                    revenue_low: forecast.revenue_interval.low,
                    revenue_high: forecast.revenue_interval.high,
                    payback_years: forecast.payback_years,
                    risk_score: forecast.risk_score,
                    reasons: site.reasons.join("; "),
                }),
        )?;
        Ok(())
    }

    /// One line per run, for quick comparison across algorithms.
    pub fn export_run_summary(&self, results: &[(&str, &OptimizationResult)]) -> SiteResult<()> {
        let path = self.output_dir.join("run_summary.csv");
        let mut file = File::create(&path)?;

        writeln!(file, "Run Summary")?;
        writeln!(file, "Timestamp,{}", self.timestamp)?;
        writeln!(file)?;
        writeln!(file, "Label,Algorithm,Stores,Demand Captured,Total Cost (¥),Coverage (%),Efficiency,Stop Reason,Timed Out")?;
        for (label, result) in results {
            writeln!(
                file,
                "{},{},{},{:.2},{:.0},{:.2},{:.4},{:?},{}",
                label,
                result.algorithm,
                result.store_count(),
                result.total_demand_captured,
                result.total_cost,
                result.coverage * 100.0,
                result.metrics.efficiency,
                result.stop_reason,
                result.timed_out
            )?;
        }
        info!("Wrote run summary to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Coordinate;
    use crate::models::optimization_result::{Algorithm, IterationRecord, SearchPhase, SelectedSite};
    use crate::models::store_site::{SiteRole, StoreSite};

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("siteopt_{}_{}", name, std::process::id()))
    }

    #[test]
    fn optimization_exports_one_row_per_site() {
        let dir = scratch_dir("export");
        let exporter = CsvExporter::new(&dir).unwrap();

        let mut result = OptimizationResult::empty(Algorithm::Greedy);
        result.selected.push(SelectedSite {
            order: 1,
            site: StoreSite::new("candidate_3", Coordinate::new(35.1, 139.2), SiteRole::Candidate),
            incremental_demand: 42.0,
        });
        result.iterations.push(IterationRecord {
            iteration: 1,
            phase: SearchPhase::GreedySeed,
            site_id: "candidate_3".to_string(),
            incremental_demand: 42.0,
            cumulative_demand: 42.0,
            cumulative_cost: 1_000_000.0,
            remaining_candidates: 9,
        });

        exporter.export_optimization("greedy", &result).unwrap();
        exporter.export_run_summary(&[("greedy", &result)]).unwrap();

        let sites = std::fs::read_to_string(exporter.output_dir().join("greedy_selected_sites.csv")).unwrap();
        let lines: Vec<&str> = sites.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("order,site_id,latitude"));
        assert!(lines[1].starts_with("1,candidate_3,35.1,139.2"));

        let trace = std::fs::read_to_string(exporter.output_dir().join("greedy_iterations.csv")).unwrap();
        assert!(trace.contains("greedy-seed"));

        let summary = std::fs::read_to_string(exporter.output_dir().join("run_summary.csv")).unwrap();
        assert!(summary.contains("greedy,Greedy,1,"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
