use std::collections::BTreeMap;
use std::f64::consts::PI;
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};
use crate::config::constants::*;
use crate::config::const_funcs::{mean, mean_std, pearson_correlation};
use crate::config::engine_config::HistoricalParams;
use crate::data::poi::Coordinate;
use crate::errors::{SiteError, SiteResult};
use crate::models::historical::{
    FeaturePattern, FeatureRange, HistoricalRecord, LocationFeature, LocationFeatures, Pattern, PerformanceTier,
};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::store_site::StoreSite;
use crate::utils::logging::{self, AnalysisType, OperationCategory};
use crate::utils::spatial_index::SpatialIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredRecord {
    pub id: String,
    pub performance_score: f64,
    pub tier: PerformanceTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceCategories {
    pub high: Vec<TieredRecord>,
    pub average: Vec<TieredRecord>,
    pub under: Vec<TieredRecord>,
}

impl PerformanceCategories {
    pub fn total(&self) -> usize {
        self.high.len() + self.average.len() + self.under.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRecommendation {
    pub cell_id: String,
    pub coordinate: Coordinate,
    /// Importance-weighted share of pattern features matched.
    pub pattern_score: f64,
    /// Unweighted share of pattern features matched.
    pub confidence: f64,
    pub features: LocationFeatures,
    pub reasons: Vec<String>,
    pub expected_performance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenueInterval {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialForecast {
    pub cell_id: String,
    pub projected_revenue: f64,
    pub projected_profit: f64,
    pub projected_customers: f64,
    pub revenue_interval: RevenueInterval,
    /// Years to recover the site investment; `None` when no profit is projected.
    pub payback_years: Option<f64>,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub total_records: usize,
    pub confidence_level: f64,
    pub analysis_date: String,
    pub pattern_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAnalysisResult {
    pub categories: PerformanceCategories,
    /// Strongest first.
    pub feature_importance: Vec<(LocationFeature, f64)>,
    pub pattern: Pattern,
    pub recommendations: Vec<SiteRecommendation>,
    pub forecasts: Vec<FinancialForecast>,
    pub metadata: AnalysisMetadata,
}

pub fn categorize_records(records: &[HistoricalRecord], threshold: f64) -> PerformanceCategories {
    let mut categories = PerformanceCategories::default();
    for record in records {
        let score = record.performance_score;
        let tier = if score >= threshold {
            PerformanceTier::High
        } else if score >= threshold * AVERAGE_PERFORMER_RATIO {
            PerformanceTier::Average
        } else {
            PerformanceTier::Under
        };
        let entry = TieredRecord { id: record.id.clone(), performance_score: score, tier };
        match tier {
            PerformanceTier::High => categories.high.push(entry),
            PerformanceTier::Average => categories.average.push(entry),
            PerformanceTier::Under => categories.under.push(entry),
        }
    }
    categories
}

/// Extracts neighbourhood features around arbitrary points from one demand mesh.
pub struct FeatureExtractor<'a> {
    cells: &'a [DemandMeshCell],
    cell_index: SpatialIndex,
    competitors: Vec<Coordinate>,
    competitor_index: SpatialIndex,
    radius_km: f64,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(cells: &'a [DemandMeshCell], competitors: &[StoreSite], radius_km: f64) -> Self {
        let competitors: Vec<Coordinate> = competitors.iter().map(|c| c.coordinate).collect();
        Self {
            cells,
            cell_index: SpatialIndex::from_pois(cells),
            competitor_index: SpatialIndex::from_points(&competitors),
            competitors,
            radius_km,
        }
    }

    pub fn extract(&self, point: &Coordinate) -> LocationFeatures {
        let nearby: Vec<&DemandMeshCell> = self
            .cell_index
            .candidates_within(point, self.radius_km)
            .into_iter()
            .map(|i| &self.cells[i])
            .filter(|cell| point.distance_to(&cell.center) <= self.radius_km)
            .collect();

        let rivals = self
            .competitor_index
            .candidates_within(point, self.radius_km)
            .into_iter()
            .filter(|&i| point.distance_to(&self.competitors[i]) <= self.radius_km)
            .count();
        let area_km2 = PI * self.radius_km * self.radius_km;

        let mesh_count = nearby.len() as f64;
        let population: f64 = nearby.iter().map(|c| c.population as f64).sum();
        let demand: f64 = nearby.iter().map(|c| c.demand).sum();
        let inhabited = nearby.iter().filter(|c| c.population > 0).count() as f64;

        let (density, inhabited_share) = if nearby.is_empty() {
            (0.0, 0.0)
        } else {
            (population / mesh_count, inhabited / mesh_count)
        };

        LocationFeatures {
            population_within_2km: population,
            demand_within_2km: demand,
            population_density: density,
            mesh_count,
            accessibility_score: 0.5 + 0.5 * inhabited_share,
            competitor_density: if area_km2 > 0.0 { rivals as f64 / area_km2 } else { 0.0 },
            economic_index: (density / ECONOMIC_INDEX_SCALE).min(1.0),
        }
    }
}

/// |Pearson r| between each feature and performance score, strongest first.
pub fn feature_importance(features: &[LocationFeatures], scores: &[f64]) -> Vec<(LocationFeature, f64)> {
    let mut importance: Vec<(LocationFeature, f64)> = LocationFeature::ALL
        .iter()
        .map(|&feature| {
            let values: Vec<f64> = features.iter().map(|f| f.get(feature)).collect();
            (feature, pearson_correlation(&values, scores).abs())
        })
        .collect();
    importance.sort_by(|a, b| b.1.total_cmp(&a.1));
    importance
}

pub fn pattern_confidence(high_performers: usize) -> f64 {
    0.2 + 0.8 * (high_performers as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0)
}

fn build_pattern(
    high_features: &[&LocationFeatures],
    importance: &[(LocationFeature, f64)],
    params: &HistoricalParams,
) -> Pattern {
    if high_features.len() < params.min_sample_size || high_features.is_empty() {
        return Pattern::default();
    }

    let mut features = BTreeMap::new();
    for &(feature, weight) in importance
        .iter()
        .filter(|(_, w)| *w >= params.importance_threshold)
        .take(MAX_PATTERN_FEATURES)
    {
        let values: Vec<f64> = high_features.iter().map(|f| f.get(feature)).collect();
        let (optimal, std) = mean_std(&values);
        features.insert(
            feature,
            FeaturePattern {
                optimal,
                range: FeatureRange { min: optimal - std, max: optimal + std },
                importance: weight,
                sample_size: values.len(),
            },
        );
    }

    Pattern {
        features,
        confidence: pattern_confidence(high_features.len()),
        total_high_performers: high_features.len(),
    }
}

/// Returns (importance-weighted score, unweighted match fraction).
pub fn pattern_match(features: &LocationFeatures, pattern: &Pattern) -> (f64, f64) {
    if pattern.is_empty() {
        return (0.0, 0.0);
    }
    let mut matched_weight = 0.0;
    let mut total_weight = 0.0;
    let mut matched = 0usize;
    for (&feature, fp) in &pattern.features {
        total_weight += fp.importance;
        if fp.range.contains(features.get(feature)) {
            matched_weight += fp.importance;
            matched += 1;
        }
    }
    let score = if total_weight > 0.0 { matched_weight / total_weight } else { 0.0 };
    (score, matched as f64 / pattern.features.len() as f64)
}

fn reasons_for(features: &LocationFeatures, pattern: &Pattern) -> Vec<String> {
    pattern
        .features
        .iter()
        .filter(|(feature, fp)| fp.range.contains(features.get(**feature)))
        .take(MAX_REASONS)
        .map(|(&feature, fp)| {
            format!(
                "{}: {:.1} (optimal range: {:.1}-{:.1})",
                feature,
                features.get(feature),
                fp.range.min,
                fp.range.max
            )
        })
        .collect()
}

pub fn pattern_strength(pattern: &Pattern) -> f64 {
    if pattern.is_empty() {
        return 0.0;
    }
    let importances: Vec<f64> = pattern.features.values().map(|f| f.importance).collect();
    (mean(&importances) * pattern.confidence).min(1.0)
}

struct AverageMetrics {
    revenue: f64,
    profit: f64,
    customers: f64,
}

fn high_performer_averages(records: &[&HistoricalRecord]) -> AverageMetrics {
    if records.is_empty() {
        return AverageMetrics {
            revenue: FALLBACK_AVG_REVENUE,
            profit: FALLBACK_AVG_PROFIT,
            customers: FALLBACK_AVG_CUSTOMERS,
        };
    }
    let n = records.len() as f64;
    AverageMetrics {
        revenue: records.iter().map(|r| r.revenue).sum::<f64>() / n,
        profit: records.iter().map(|r| r.profit).sum::<f64>() / n,
        customers: records.iter().map(|r| r.customer_count).sum::<f64>() / n,
    }
}

fn forecast(site: &SiteRecommendation, averages: &AverageMetrics, investment: f64) -> FinancialForecast {
    let multiplier = site.expected_performance;
    let revenue = averages.revenue * multiplier;
    let profit = averages.profit * multiplier;
    let payback_years = if profit > 0.0 {
        Some((investment / profit * 10.0).round() / 10.0)
    } else {
        None
    };
    FinancialForecast {
        cell_id: site.cell_id.clone(),
        projected_revenue: revenue.round(),
        projected_profit: profit.round(),
        projected_customers: (averages.customers * multiplier).round(),
        revenue_interval: RevenueInterval {
            low: (revenue * (1.0 - FORECAST_INTERVAL)).round(),
            high: (revenue * (1.0 + FORECAST_INTERVAL)).round(),
        },
        payback_years,
        risk_score: 1.0 - site.confidence,
    }
}

/// Learns a siting pattern from the top performance tier and ranks mesh cells against it.
///
/// With fewer than `min_sample_size` high performers the pattern is empty, its confidence
/// zero, and no sites are recommended.
pub fn analyze_historical_patterns(
    records: &[HistoricalRecord],
    cells: &[DemandMeshCell],
    competitors: &[StoreSite],
    params: &HistoricalParams,
) -> SiteResult<PatternAnalysisResult> {
    let _timing = logging::start_timing(
        "analyze_historical_patterns",
        OperationCategory::Analysis { subcategory: AnalysisType::Historical },
    );

    if cells.is_empty() {
        return Err(SiteError::InsufficientData("demand mesh is empty".to_string()));
    }
    info!("Analyzing historical patterns from {} stores", records.len());

    let categories = categorize_records(records, params.performance_threshold);
    let extractor = FeatureExtractor::new(cells, competitors, params.feature_radius_km);
    let features: Vec<LocationFeatures> = records.iter().map(|r| extractor.extract(&r.coordinate)).collect();
    let scores: Vec<f64> = records.iter().map(|r| r.performance_score).collect();
    let importance = feature_importance(&features, &scores);

    let high_records: Vec<&HistoricalRecord> = records
        .iter()
        .filter(|r| r.performance_score >= params.performance_threshold)
        .collect();
    let high_features: Vec<&LocationFeatures> = records
        .iter()
        .zip(&features)
        .filter(|(r, _)| r.performance_score >= params.performance_threshold)
        .map(|(_, f)| f)
        .collect();

    let pattern = build_pattern(&high_features, &importance, params);
    if pattern.is_empty() {
        warn!(
            "No siting pattern: {} high performers (minimum {})",
            high_features.len(),
            params.min_sample_size
        );
    }

    let mut recommendations: Vec<SiteRecommendation> = Vec::new();
    if !pattern.is_empty() {
        for cell in cells {
            let cell_features = extractor.extract(&cell.center);
            let (score, confidence) = pattern_match(&cell_features, &pattern);
            if confidence >= params.confidence_level {
                recommendations.push(SiteRecommendation {
                    cell_id: cell.id.clone(),
                    coordinate: cell.center,
                    pattern_score: score,
                    confidence,
                    reasons: reasons_for(&cell_features, &pattern),
                    expected_performance: 0.5 + 0.5 * score,
                    features: cell_features,
                });
            }
        }
        recommendations.sort_by(|a, b| b.pattern_score.total_cmp(&a.pattern_score));
        recommendations.truncate(MAX_SITE_RECOMMENDATIONS);
    }

    let averages = high_performer_averages(&high_records);
    let forecasts = recommendations
        .iter()
        .map(|site| forecast(site, &averages, params.site_investment))
        .collect();

    let metadata = AnalysisMetadata {
        total_records: records.len(),
        confidence_level: params.confidence_level,
        analysis_date: Local::now().to_rfc3339(),
        pattern_strength: pattern_strength(&pattern),
    };
    info!(
        "Pattern from {} high performers over {} features, {} site recommendations",
        pattern.total_high_performers,
        pattern.features.len(),
        recommendations.len()
    );

    Ok(PatternAnalysisResult {
        categories,
        feature_importance: importance,
        pattern,
        recommendations,
        forecasts,
        metadata,
    })
}
