use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::config::constants::*;
use crate::data::poi::{Coordinate, POI};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub id: String,
    pub coordinate: Coordinate,
    pub revenue: f64,
    pub profit: f64,
    pub customer_count: f64,
    /// Share of the local market in [0, 1].
    pub market_share: f64,
    /// Annual growth in percent.
    pub growth_rate: f64,
    pub benchmark_revenue: f64,
    pub benchmark_profit: f64,
    pub performance_score: f64,
}

impl HistoricalRecord {
    pub fn new(
        id: impl Into<String>,
        coordinate: Coordinate,
        revenue: f64,
        profit: f64,
        customer_count: f64,
        market_share: f64,
        growth_rate: f64,
    ) -> Self {
        Self::with_benchmarks(
            id, coordinate, revenue, profit, customer_count, market_share, growth_rate,
            BENCHMARK_REVENUE, BENCHMARK_PROFIT,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_benchmarks(
        id: impl Into<String>,
        coordinate: Coordinate,
        revenue: f64,
        profit: f64,
        customer_count: f64,
        market_share: f64,
        growth_rate: f64,
        benchmark_revenue: f64,
        benchmark_profit: f64,
    ) -> Self {
        let mut record = Self {
            id: id.into(),
            coordinate,
            revenue,
            profit,
            customer_count,
            market_share,
            growth_rate,
            benchmark_revenue,
            benchmark_profit,
            performance_score: 0.0,
        };
        record.performance_score = record.calc_performance_score();
        record
    }

    /// Weighted composite of the four performance metrics, each capped so one outlier
    /// metric cannot dominate.
    pub fn calc_performance_score(&self) -> f64 {
        let revenue_score = ratio_or_zero(self.revenue, self.benchmark_revenue).min(SCORE_CAP_MULTIPLE);
        let profit_score = ratio_or_zero(self.profit, self.benchmark_profit).min(SCORE_CAP_MULTIPLE);
        let market_share_score = (self.market_share * MARKET_SHARE_SCALE).min(1.0);
        let growth_score = (self.growth_rate / GROWTH_RATE_FOR_FULL_SCORE).clamp(0.0, 1.0);

        revenue_score * REVENUE_WEIGHT
            + profit_score * PROFIT_WEIGHT
            + market_share_score * MARKET_SHARE_WEIGHT
            + growth_score * GROWTH_WEIGHT
    }
}

fn ratio_or_zero(value: f64, benchmark: f64) -> f64 {
    if benchmark > 0.0 { value / benchmark } else { 0.0 }
}

impl POI for HistoricalRecord {
    fn get_coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceTier {
    High,
    Average,
    Under,
}

/// Spatial features shared by historical records and candidate cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationFeature {
    PopulationWithin2km,
    DemandWithin2km,
    PopulationDensity,
    MeshCount,
    AccessibilityScore,
    CompetitorDensity,
    EconomicIndex,
}

impl LocationFeature {
    pub const ALL: [LocationFeature; 7] = [
        LocationFeature::PopulationWithin2km,
        LocationFeature::DemandWithin2km,
        LocationFeature::PopulationDensity,
        LocationFeature::MeshCount,
        LocationFeature::AccessibilityScore,
        LocationFeature::CompetitorDensity,
        LocationFeature::EconomicIndex,
    ];
}

impl fmt::Display for LocationFeature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            LocationFeature::PopulationWithin2km => "populationWithin2km",
            LocationFeature::DemandWithin2km => "demandWithin2km",
            LocationFeature::PopulationDensity => "populationDensity",
            LocationFeature::MeshCount => "meshCount",
            LocationFeature::AccessibilityScore => "accessibilityScore",
            LocationFeature::CompetitorDensity => "competitorDensity",
            LocationFeature::EconomicIndex => "economicIndex",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFeatures {
    pub population_within_2km: f64,
    pub demand_within_2km: f64,
    pub population_density: f64,
    pub mesh_count: f64,
    pub accessibility_score: f64,
    pub competitor_density: f64,
    pub economic_index: f64,
}

impl LocationFeatures {
    pub fn get(&self, feature: LocationFeature) -> f64 {
        match feature {
            LocationFeature::PopulationWithin2km => self.population_within_2km,
            LocationFeature::DemandWithin2km => self.demand_within_2km,
            LocationFeature::PopulationDensity => self.population_density,
            LocationFeature::MeshCount => self.mesh_count,
            LocationFeature::AccessibilityScore => self.accessibility_score,
            LocationFeature::CompetitorDensity => self.competitor_density,
            LocationFeature::EconomicIndex => self.economic_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePattern {
    pub optimal: f64,
    pub range: FeatureRange,
    pub importance: f64,
    pub sample_size: usize,
}

/// Siting pattern learned from top-tier performers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub features: BTreeMap<LocationFeature, FeaturePattern>,
    pub confidence: f64,
    pub total_high_performers: usize,
}

impl Pattern {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(revenue: f64, profit: f64, share: f64, growth: f64) -> HistoricalRecord {
        HistoricalRecord::new("r", Coordinate::new(35.0, 139.0), revenue, profit, 100.0, share, growth)
    }

    #[test]
    fn benchmark_store_scores_weighted_sum() {
        // revenue 1.0, profit 1.0, share 0.5, growth 0.5
        let r = record(1_000_000.0, 100_000.0, 0.05, 10.0);
        assert!((r.performance_score - (0.3 + 0.4 + 0.1 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn outlier_metrics_are_capped() {
        let r = record(1e12, 1e12, 5.0, 1000.0);
        assert!((r.performance_score - (0.6 + 0.8 + 0.2 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn negative_growth_contributes_nothing() {
        let r = record(0.0, 0.0, 0.0, -30.0);
        assert_eq!(r.performance_score, 0.0);
    }
}
