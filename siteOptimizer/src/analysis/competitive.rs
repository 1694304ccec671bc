use serde::Serialize;
use tracing::info;
use crate::config::constants::*;
use crate::config::engine_config::CompetitiveParams;
use crate::core::huff::compute_capture;
use crate::errors::{SiteError, SiteResult};
use crate::models::mesh_cell::DemandMeshCell;
use crate::models::store_site::{SiteRole, StoreSite};
use crate::utils::logging::{self, AnalysisType, OperationCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ThreatLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn from_impact(impact: f64) -> Self {
        if impact > HIGH_THREAT_IMPACT {
            ThreatLevel::High
        } else if impact > MEDIUM_THREAT_IMPACT {
            ThreatLevel::Medium
        } else if impact > LOW_THREAT_IMPACT {
            ThreatLevel::Low
        } else {
            ThreatLevel::Minimal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketPosition {
    Dominant,
    Strong,
    Competitive,
    Challenged,
}

impl MarketPosition {
    pub fn from_advantage(advantage: f64) -> Self {
        if advantage > DOMINANT_ADVANTAGE {
            MarketPosition::Dominant
        } else if advantage > STRONG_ADVANTAGE {
            MarketPosition::Strong
        } else if advantage > COMPETITIVE_ADVANTAGE {
            MarketPosition::Competitive
        } else {
            MarketPosition::Challenged
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecommendationKind {
    HighCompetition,
    DirectCompetition,
    OversaturatedMarket,
    MarketOpportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitiveRecommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorImpact {
    pub competitor_id: String,
    pub competitor_name: String,
    pub distance_km: f64,
    pub proximity_impact: f64,
    pub attractiveness_ratio: f64,
    pub competitive_impact: f64,
    pub threat_level: ThreatLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreCompetitiveProfile {
    pub store_id: String,
    pub store_name: String,
    pub demand_captured: f64,
    /// Percent of total modeled demand.
    pub market_share: f64,
    /// Cells where this store shares demand with at least one other store.
    pub competitive_meshes: usize,
    /// Sorted by impact, strongest first.
    pub impacts: Vec<CompetitorImpact>,
    pub total_pressure: f64,
    pub nearby_competitor_count: usize,
    pub high_threat_count: usize,
    pub average_competitor_distance_km: f64,
    pub vulnerability: f64,
    pub competitive_advantage: f64,
    pub market_position: MarketPosition,
    pub recommendations: Vec<CompetitiveRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorPerformance {
    pub id: String,
    pub name: String,
    pub demand_captured: f64,
    pub market_share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SideSummary {
    pub store_count: usize,
    pub total_demand: f64,
    pub market_share: f64,
    pub average_demand_per_store: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitiveAnalysisResult {
    pub total_market_demand: f64,
    pub own: SideSummary,
    pub competitors: SideSummary,
    pub own_stores: Vec<StoreCompetitiveProfile>,
    pub competitor_stores: Vec<CompetitorPerformance>,
    /// Fraction of cells captured by any store.
    pub market_coverage: f64,
    /// Mean number of stores sharing a cell.
    pub average_competition: f64,
    /// Own average demand per store relative to competitors', in percent.
    pub own_advantage_pct: f64,
    pub overall_vulnerability: f64,
    pub overall_position: MarketPosition,
}

fn impact_of(store: &StoreSite, competitor: &StoreSite, distance_scale_km: f64) -> CompetitorImpact {
    let distance_km = store.distance_to(competitor);
    let proximity_impact = (-distance_km / distance_scale_km).exp();
    let attractiveness_ratio = competitor.attractiveness / store.attractiveness;
    let competitive_impact = proximity_impact * attractiveness_ratio;
    CompetitorImpact {
        competitor_id: competitor.id.clone(),
        competitor_name: competitor.display_name().to_string(),
        distance_km,
        proximity_impact,
        attractiveness_ratio,
        competitive_impact,
        threat_level: ThreatLevel::from_impact(competitive_impact),
    }
}

fn recommendations_for(impacts: &[CompetitorImpact], total_pressure: f64) -> Vec<CompetitiveRecommendation> {
    let mut recommendations = Vec::new();

    if total_pressure > HIGH_PRESSURE_THRESHOLD {
        recommendations.push(CompetitiveRecommendation {
            kind: RecommendationKind::HighCompetition,
            priority: Priority::High,
            action: "Increase marketing spend and differentiate the offer".to_string(),
        });
    }

    if let Some(direct) = impacts
        .iter()
        .find(|i| i.distance_km <= DIRECT_COMPETITION_KM && i.threat_level == ThreatLevel::High)
    {
        recommendations.push(CompetitiveRecommendation {
            kind: RecommendationKind::DirectCompetition,
            priority: Priority::High,
            action: format!("Monitor {} closely: within {} km with high impact", direct.competitor_name, DIRECT_COMPETITION_KM),
        });
    }

    if impacts.len() > OVERSATURATED_COMPETITOR_COUNT {
        recommendations.push(CompetitiveRecommendation {
            kind: RecommendationKind::OversaturatedMarket,
            priority: Priority::Medium,
            action: "Focus on niche positioning and customer loyalty".to_string(),
        });
    }

    if !impacts.is_empty() {
        let distant = impacts.iter().filter(|i| i.distance_km > DISTANT_COMPETITOR_KM).count();
        if distant as f64 / impacts.len() as f64 > DISTANT_SHARE_THRESHOLD {
            recommendations.push(CompetitiveRecommendation {
                kind: RecommendationKind::MarketOpportunity,
                priority: Priority::Low,
                action: "Good location with little direct competition".to_string(),
            });
        }
    }

    recommendations
}

fn share_pct(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

/// Splits modeled demand between our stores and competitors and scores how exposed each of
/// our stores is to nearby competition.
pub fn analyze_competition(
    own: &[StoreSite],
    competitors: &[StoreSite],
    cells: &[DemandMeshCell],
    params: &CompetitiveParams,
) -> SiteResult<CompetitiveAnalysisResult> {
    let _timing = logging::start_timing(
        "analyze_competition",
        OperationCategory::Analysis { subcategory: AnalysisType::Competitive },
    );

    if cells.is_empty() {
        return Err(SiteError::InsufficientData("demand mesh is empty".to_string()));
    }

    let own: Vec<StoreSite> = own
        .iter()
        .map(|s| {
            let mut site = s.clone();
            if site.role != SiteRole::Candidate {
                site.role = SiteRole::Store;
            }
            if let Some(a) = params.own_attractiveness {
                site.attractiveness = a;
            }
            site
        })
        .collect();
    let competitors: Vec<StoreSite> = competitors
        .iter()
        .map(|s| {
            let mut site = s.clone();
            site.role = SiteRole::Competitor;
            if let Some(a) = params.competitor_attractiveness {
                site.attractiveness = a;
            }
            site
        })
        .collect();

    let mut all = own.clone();
    all.extend(competitors.iter().cloned());
    let matrix = compute_capture(cells, &all, &params.huff);
    let per_store = matrix.store_demand(cells);
    let own_n = own.len();

    let total_market_demand: f64 = cells.iter().map(|c| c.demand).sum();
    let own_total: f64 = per_store[..own_n].iter().sum();
    let competitor_total: f64 = per_store[own_n..].iter().sum();

    let mut competitive_meshes = vec![0usize; own_n];
    let mut shared_entries = 0usize;
    for cell in 0..matrix.cell_count() {
        let row = matrix.row(cell);
        shared_entries += row.len();
        if row.len() > 1 {
            for &(store, _) in row {
                if store < own_n {
                    competitive_meshes[store] += 1;
                }
            }
        }
    }

    let own_stores: Vec<StoreCompetitiveProfile> = own
        .iter()
        .enumerate()
        .map(|(i, store)| {
            let mut impacts: Vec<CompetitorImpact> = competitors
                .iter()
                .map(|c| impact_of(store, c, params.impact_distance_scale_km))
                .collect();
            impacts.sort_by(|a, b| b.competitive_impact.total_cmp(&a.competitive_impact));

            let total_pressure: f64 = impacts.iter().map(|i| i.competitive_impact).sum();
            let vulnerability = (total_pressure / own_n as f64).min(1.0);
            let competitive_advantage = 1.0 - vulnerability;
            let average_competitor_distance_km = if impacts.is_empty() {
                0.0
            } else {
                impacts.iter().map(|i| i.distance_km).sum::<f64>() / impacts.len() as f64
            };

            StoreCompetitiveProfile {
                store_id: store.id.clone(),
                store_name: store.display_name().to_string(),
                demand_captured: per_store[i],
                market_share: share_pct(per_store[i], total_market_demand),
                competitive_meshes: competitive_meshes[i],
                nearby_competitor_count: impacts.iter().filter(|i| i.distance_km <= NEARBY_COMPETITOR_KM).count(),
                high_threat_count: impacts.iter().filter(|i| i.threat_level == ThreatLevel::High).count(),
                average_competitor_distance_km,
                recommendations: recommendations_for(&impacts, total_pressure),
                impacts,
                total_pressure,
                vulnerability,
                competitive_advantage,
                market_position: MarketPosition::from_advantage(competitive_advantage),
            }
        })
        .collect();

    let competitor_stores = competitors
        .iter()
        .enumerate()
        .map(|(j, c)| CompetitorPerformance {
            id: c.id.clone(),
            name: c.display_name().to_string(),
            demand_captured: per_store[own_n + j],
            market_share: share_pct(per_store[own_n + j], total_market_demand),
        })
        .collect();

    let side = |count: usize, total: f64| SideSummary {
        store_count: count,
        total_demand: total,
        market_share: share_pct(total, total_market_demand),
        average_demand_per_store: if count > 0 { total / count as f64 } else { 0.0 },
    };
    let own_side = side(own_n, own_total);
    let competitor_side = side(competitors.len(), competitor_total);

    let competitor_avg = if competitor_side.average_demand_per_store > 0.0 {
        competitor_side.average_demand_per_store
    } else {
        1.0
    };
    let overall_vulnerability = if own_stores.is_empty() {
        0.0
    } else {
        own_stores.iter().map(|s| s.vulnerability).sum::<f64>() / own_stores.len() as f64
    };

    let result = CompetitiveAnalysisResult {
        total_market_demand,
        own_advantage_pct: own_side.average_demand_per_store / competitor_avg * 100.0,
        own: own_side,
        competitors: competitor_side,
        own_stores,
        competitor_stores,
        market_coverage: matrix.coverage(),
        average_competition: shared_entries as f64 / cells.len() as f64,
        overall_vulnerability,
        overall_position: MarketPosition::from_advantage(1.0 - overall_vulnerability),
    };

    info!(
        "Competitive analysis: own share {:.1}%, competitor share {:.1}%, position {:?}",
        result.own.market_share, result.competitors.market_share, result.overall_position
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::poi::Coordinate;
    use crate::models::mesh_cell::MeshBounds;

    fn cells() -> Vec<DemandMeshCell> {
        let step = 0.0025;
        (0..16)
            .map(|i| {
                let lat = 35.0 + (i / 4) as f64 * step;
                let lng = 139.0 + (i % 4) as f64 * step;
                DemandMeshCell::new(format!("mesh_{}", i), MeshBounds::new(lat + step, lat, lng + step, lng), 100, 30.0)
            })
            .collect()
    }

    #[test]
    fn thresholds_bucket_impacts() {
        assert_eq!(ThreatLevel::from_impact(0.71), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_impact(0.7), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_impact(0.3), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_impact(0.1), ThreatLevel::Minimal);
        assert_eq!(MarketPosition::from_advantage(0.8), MarketPosition::Dominant);
        assert_eq!(MarketPosition::from_advantage(0.0), MarketPosition::Challenged);
    }

    #[test]
    fn demand_splits_between_sides() {
        let own = vec![StoreSite::new("own", Coordinate::new(35.003, 139.003), SiteRole::Store)];
        let rivals = vec![StoreSite::new("rival", Coordinate::new(35.007, 139.007), SiteRole::Competitor)];
        let result = analyze_competition(&own, &rivals, &cells(), &CompetitiveParams::default()).unwrap();

        assert!((result.own.total_demand + result.competitors.total_demand - result.total_market_demand).abs() < 1e-6);
        assert!((result.own.market_share + result.competitors.market_share - 100.0).abs() < 1e-6);
        assert_eq!(result.own_stores[0].competitive_meshes, 16);
        assert_eq!(result.average_competition, 2.0);
    }

    #[test]
    fn adjacent_strong_rival_is_direct_high_threat() {
        let own = vec![StoreSite::new("own", Coordinate::new(35.0, 139.0), SiteRole::Store)];
        let rivals = vec![
            StoreSite::new("rival", Coordinate::new(35.001, 139.0), SiteRole::Competitor)
                .with_attractiveness(1.5)
                .with_name("Big Rival"),
        ];
        let result = analyze_competition(&own, &rivals, &cells(), &CompetitiveParams::default()).unwrap();
        let profile = &result.own_stores[0];

        assert_eq!(profile.impacts[0].threat_level, ThreatLevel::High);
        assert_eq!(profile.high_threat_count, 1);
        assert_eq!(profile.vulnerability, 1.0);
        assert_eq!(profile.market_position, MarketPosition::Challenged);
        assert!(profile.recommendations.iter().any(|r| r.kind == RecommendationKind::DirectCompetition
            && r.action.contains("Big Rival")));
    }

    #[test]
    fn attractiveness_overrides_apply() {
        let own = vec![StoreSite::new("own", Coordinate::new(35.0, 139.0), SiteRole::Store)];
        let rivals = vec![StoreSite::new("rival", Coordinate::new(35.05, 139.0), SiteRole::Competitor)];
        let params = CompetitiveParams { competitor_attractiveness: Some(2.0), ..CompetitiveParams::default() };
        let result = analyze_competition(&own, &rivals, &cells(), &params).unwrap();
        assert_eq!(result.own_stores[0].impacts[0].attractiveness_ratio, 2.0);
    }

    #[test]
    fn far_competitors_signal_opportunity() {
        let own = vec![StoreSite::new("own", Coordinate::new(35.0, 139.0), SiteRole::Store)];
        let rivals = vec![StoreSite::new("far", Coordinate::new(35.2, 139.0), SiteRole::Competitor)];
        let result = analyze_competition(&own, &rivals, &cells(), &CompetitiveParams::default()).unwrap();
        let kinds: Vec<_> = result.own_stores[0].recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RecommendationKind::MarketOpportunity]);
        assert_eq!(result.competitors.total_demand, 0.0);
    }
}
