use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::data::poi::{Coordinate, RawLocation};
use crate::data::population::PointPopulationProvider;
use crate::errors::{SiteError, SiteResult};
use crate::models::historical::HistoricalRecord;
use crate::models::mesh_cell::MeshBounds;
use crate::models::store_site::{SiteRole, StoreSite};
use crate::config::constants::{BENCHMARK_PROFIT, BENCHMARK_REVENUE};

/// Store or competitor as supplied by a caller, in any supported coordinate shape.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub location: RawLocation,
    #[serde(default)]
    pub role: Option<SiteRole>,
    #[serde(default)]
    pub attractiveness: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl StoreRecord {
    pub fn into_site(self, default_role: SiteRole) -> SiteResult<StoreSite> {
        let coordinate = self.location.normalize()?;
        let role = self.role.unwrap_or(default_role);
        let mut site = StoreSite::new(self.id, coordinate, role);
        if let Some(attractiveness) = self.attractiveness {
            if !(attractiveness.is_finite() && attractiveness > 0.0) {
                return Err(SiteError::InsufficientData(format!(
                    "attractiveness must be positive, got {}",
                    attractiveness
                )));
            }
            site = site.with_attractiveness(attractiveness);
        }
        if let Some(cost) = self.cost {
            if !(cost.is_finite() && cost >= 0.0) {
                return Err(SiteError::InsufficientData(format!("cost must be non-negative, got {}", cost)));
            }
            site = site.with_cost(cost);
        }
        if let Some(name) = self.name {
            site = site.with_name(name);
        }
        Ok(site)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalInput {
    pub id: String,
    #[serde(flatten)]
    pub location: RawLocation,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub customer_count: f64,
    #[serde(default)]
    pub market_share: f64,
    #[serde(default)]
    pub growth_rate: f64,
    #[serde(default)]
    pub benchmark_revenue: Option<f64>,
    #[serde(default)]
    pub benchmark_profit: Option<f64>,
}

impl HistoricalInput {
    pub fn into_record(self) -> SiteResult<HistoricalRecord> {
        let coordinate = self.location.normalize()?;
        Ok(HistoricalRecord::with_benchmarks(
            self.id,
            coordinate,
            self.revenue,
            self.profit,
            self.customer_count,
            self.market_share,
            self.growth_rate,
            self.benchmark_revenue.unwrap_or(BENCHMARK_REVENUE),
            self.benchmark_profit.unwrap_or(BENCHMARK_PROFIT),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulationPoint {
    #[serde(flatten)]
    pub location: RawLocation,
    pub population: u32,
}

/// Input bundle read by the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    pub bounds: MeshBounds,
    #[serde(default)]
    pub stores: Vec<StoreRecord>,
    #[serde(default)]
    pub competitors: Vec<StoreRecord>,
    #[serde(default)]
    pub candidates: Vec<StoreRecord>,
    #[serde(default)]
    pub historical: Vec<HistoricalInput>,
    #[serde(default)]
    pub population: Vec<PopulationPoint>,
}

/// Records that did not survive ingestion, with the reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub skipped: Vec<(String, String)>,
}

impl IngestReport {
    fn skip(&mut self, id: &str, error: &SiteError) {
        warn!("Skipping record {}: {}", id, error);
        self.skipped.push((id.to_string(), error.to_string()));
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.accepted += other.accepted;
        self.skipped.extend(other.skipped);
    }
}

/// Normalised contents of a scenario file.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub bounds: MeshBounds,
    pub stores: Vec<StoreSite>,
    pub competitors: Vec<StoreSite>,
    pub candidates: Vec<StoreSite>,
    pub historical: Vec<HistoricalRecord>,
    pub population: Option<PointPopulationProvider>,
    pub report: IngestReport,
}

impl LoadedScenario {
    /// Existing stores of every role, own first.
    pub fn existing_sites(&self) -> Vec<StoreSite> {
        self.stores.iter().chain(self.competitors.iter()).cloned().collect()
    }
}

pub fn load_sites(records: Vec<StoreRecord>, default_role: SiteRole) -> (Vec<StoreSite>, IngestReport) {
    let mut report = IngestReport::default();
    let mut sites = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id.clone();
        match record.into_site(default_role) {
            Ok(site) => {
                report.accepted += 1;
                sites.push(site);
            }
            Err(e) => report.skip(&id, &e),
        }
    }
    (sites, report)
}

pub fn load_historical(records: Vec<HistoricalInput>) -> (Vec<HistoricalRecord>, IngestReport) {
    let mut report = IngestReport::default();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id.clone();
        match record.into_record() {
            Ok(r) => {
                report.accepted += 1;
                out.push(r);
            }
            Err(e) => report.skip(&id, &e),
        }
    }
    (out, report)
}

pub fn load_population(points: Vec<PopulationPoint>) -> (Option<PointPopulationProvider>, IngestReport) {
    let mut report = IngestReport::default();
    let mut samples: Vec<(Coordinate, u32)> = Vec::with_capacity(points.len());
    for (i, point) in points.into_iter().enumerate() {
        match point.location.normalize() {
            Ok(c) => {
                report.accepted += 1;
                samples.push((c, point.population));
            }
            Err(e) => report.skip(&format!("population[{}]", i), &e),
        }
    }
    let provider = if samples.is_empty() { None } else { Some(PointPopulationProvider::new(samples)) };
    (provider, report)
}

pub fn parse_scenario(file: ScenarioFile) -> SiteResult<LoadedScenario> {
    file.bounds.validate()?;

    let (stores, mut report) = load_sites(file.stores, SiteRole::Store);
    let (competitors, r) = load_sites(file.competitors, SiteRole::Competitor);
    report.merge(r);
    let (candidates, r) = load_sites(file.candidates, SiteRole::Candidate);
    report.merge(r);
    let (historical, r) = load_historical(file.historical);
    report.merge(r);
    let (population, r) = load_population(file.population);
    report.merge(r);

    info!(
        "Loaded {} stores, {} competitors, {} candidates, {} historical records ({} skipped)",
        stores.len(),
        competitors.len(),
        candidates.len(),
        historical.len(),
        report.skipped.len()
    );

    Ok(LoadedScenario {
        bounds: file.bounds,
        stores,
        competitors,
        candidates,
        historical,
        population,
        report,
    })
}

pub fn load_scenario<P: AsRef<Path>>(path: P) -> SiteResult<LoadedScenario> {
    let text = fs::read_to_string(path)?;
    let file: ScenarioFile = serde_json::from_str(&text)?;
    parse_scenario(file)
}
