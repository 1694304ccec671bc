use std::fmt;
use std::str::FromStr;
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::config::constants::*;
use crate::data::poi::Coordinate;
use crate::errors::SiteResult;
use crate::models::mesh_cell::MeshBounds;
use crate::models::store_site::{CandidateSite, StoreSite};
use crate::utils::logging::{self, OperationCategory, OptimizationType};

/// Sampling density of the candidate generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyPreset {
    Low,
    Medium,
    High,
}

impl AccuracyPreset {
    pub fn min_distance_km(&self) -> f64 {
        match self {
            AccuracyPreset::Low => LOW_ACCURACY_MIN_DISTANCE_KM,
            AccuracyPreset::Medium => MEDIUM_ACCURACY_MIN_DISTANCE_KM,
            AccuracyPreset::High => HIGH_ACCURACY_MIN_DISTANCE_KM,
        }
    }
}

impl FromStr for AccuracyPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(AccuracyPreset::Low),
            "medium" => Ok(AccuracyPreset::Medium),
            "high" => Ok(AccuracyPreset::High),
            _ => Err(format!("Unknown accuracy preset: {}", s)),
        }
    }
}

impl fmt::Display for AccuracyPreset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccuracyPreset::Low => write!(f, "low"),
            AccuracyPreset::Medium => write!(f, "medium"),
            AccuracyPreset::High => write!(f, "high"),
        }
    }
}

fn too_close(point: &Coordinate, others: impl IntoIterator<Item = Coordinate>, min_distance_km: f64) -> bool {
    others.into_iter().any(|other| point.distance_to(&other) < min_distance_km)
}

/// Rejection-samples up to `count` candidate points inside `bounds`.
///
/// A point is rejected when it lies within `min_distance_km` of an existing store or of an
/// already accepted candidate. Each slot gets a bounded number of attempts, so crowded
/// areas yield fewer candidates than requested.
pub fn generate_candidate_sites<R: Rng>(
    bounds: &MeshBounds,
    count: usize,
    existing: &[StoreSite],
    min_distance_km: f64,
    rng: &mut R,
) -> SiteResult<Vec<CandidateSite>> {
    let _timing = logging::start_timing(
        "generate_candidate_sites",
        OperationCategory::Optimization { subcategory: OptimizationType::CandidateGeneration },
    );

    bounds.validate()?;

    let fixed: Vec<Coordinate> = existing
        .iter()
        .filter(|s| {
            let ok = s.coordinate.is_valid();
            if !ok {
                warn!("Ignoring store {} with invalid coordinate in spacing checks", s.id);
            }
            ok
        })
        .map(|s| s.coordinate)
        .collect();

    let mut candidates: Vec<CandidateSite> = Vec::with_capacity(count);
    let mut exhausted_slots = 0;

    for slot in 0..count {
        let mut accepted = false;
        for attempt in 1..=MAX_ATTEMPTS_PER_CANDIDATE {
            let lat = rng.gen_range(bounds.south..bounds.north);
            let lng = rng.gen_range(bounds.west..bounds.east);
            let point = Coordinate::new(lat, lng);

            let blocked = too_close(&point, fixed.iter().copied(), min_distance_km)
                || too_close(&point, candidates.iter().map(|c| *c.coordinate()), min_distance_km);
            if !blocked {
                candidates.push(CandidateSite::new(format!("candidate_{}", slot), point, attempt));
                accepted = true;
                break;
            }
        }
        if !accepted {
            exhausted_slots += 1;
        }
    }

    if exhausted_slots > 0 {
        debug!(
            "Candidate generation found {} of {} sites ({} slots exhausted their attempts)",
            candidates.len(),
            count,
            exhausted_slots
        );
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::models::store_site::SiteRole;

    fn bounds() -> MeshBounds {
        MeshBounds::new(35.70, 35.66, 139.72, 139.68)
    }

    #[test]
    fn presets_map_to_distances() {
        assert_eq!(AccuracyPreset::Low.min_distance_km(), 0.5);
        assert_eq!(AccuracyPreset::Medium.min_distance_km(), 0.2);
        assert_eq!(AccuracyPreset::High.min_distance_km(), 0.1);
        assert_eq!("HIGH".parse::<AccuracyPreset>().unwrap(), AccuracyPreset::High);
    }

    #[test]
    fn same_seed_same_candidates() {
        let a = generate_candidate_sites(&bounds(), 20, &[], 0.2, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate_candidate_sites(&bounds(), 20, &[], 0.2, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn candidates_respect_spacing_and_bounds() {
        let existing = vec![StoreSite::new("s", Coordinate::new(35.68, 139.70), SiteRole::Store)];
        let found = generate_candidate_sites(&bounds(), 40, &existing, 0.5, &mut StdRng::seed_from_u64(1)).unwrap();
        for (i, c) in found.iter().enumerate() {
            assert!(bounds().contains(c.coordinate()));
            assert!(c.coordinate().distance_to(&existing[0].coordinate) >= 0.5);
            for other in &found[i + 1..] {
                assert!(c.coordinate().distance_to(other.coordinate()) >= 0.5);
            }
            assert!(c.attempts >= 1 && c.attempts <= MAX_ATTEMPTS_PER_CANDIDATE);
        }
    }

    #[test]
    fn crowded_area_returns_fewer_than_requested() {
        let tiny = MeshBounds::new(35.6801, 35.6800, 139.7001, 139.7000);
        let found = generate_candidate_sites(&tiny, 10, &[], 1.0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(found.len(), 1);
    }
}
