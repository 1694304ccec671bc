use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::data::poi::{Coordinate, POI};
use crate::config::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteRole {
    Store,
    Competitor,
    Candidate,
    Poi,
}

impl SiteRole {
    pub fn default_attractiveness(&self) -> f64 {
        match self {
            SiteRole::Store => STORE_ATTRACTIVENESS,
            SiteRole::Competitor => COMPETITOR_ATTRACTIVENESS,
            SiteRole::Candidate => CANDIDATE_ATTRACTIVENESS,
            SiteRole::Poi => POI_ATTRACTIVENESS,
        }
    }

    /// Roles whose captured demand counts toward our own objective.
    pub fn is_own(&self) -> bool {
        matches!(self, SiteRole::Store | SiteRole::Candidate)
    }
}

impl FromStr for SiteRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "store" => Ok(SiteRole::Store),
            "competitor" => Ok(SiteRole::Competitor),
            "candidate" => Ok(SiteRole::Candidate),
            "poi" => Ok(SiteRole::Poi),
            _ => Err(format!("Unknown site role: {}", s)),
        }
    }
}

impl fmt::Display for SiteRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SiteRole::Store => write!(f, "store"),
            SiteRole::Competitor => write!(f, "competitor"),
            SiteRole::Candidate => write!(f, "candidate"),
            SiteRole::Poi => write!(f, "poi"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSite {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub coordinate: Coordinate,
    pub role: SiteRole,
    pub attractiveness: f64,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl StoreSite {
    pub fn new(id: impl Into<String>, coordinate: Coordinate, role: SiteRole) -> Self {
        Self {
            id: id.into(),
            name: None,
            coordinate,
            role,
            attractiveness: role.default_attractiveness(),
            cost: None,
        }
    }

    pub fn with_attractiveness(mut self, attractiveness: f64) -> Self {
        self.attractiveness = attractiveness;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn cost_or(&self, default_cost: f64) -> f64 {
        self.cost.unwrap_or(default_cost)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn distance_to(&self, other: &StoreSite) -> f64 {
        self.coordinate.distance_to(&other.coordinate)
    }
}

impl POI for StoreSite {
    fn get_coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

/// A sampled location eligible for selection, valid for a single optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSite {
    pub site: StoreSite,
    /// Sampling attempts spent before this point was accepted.
    pub attempts: u32,
}

impl CandidateSite {
    pub fn new(id: impl Into<String>, coordinate: Coordinate, attempts: u32) -> Self {
        Self {
            site: StoreSite::new(id, coordinate, SiteRole::Candidate),
            attempts,
        }
    }

    pub fn from_site(site: StoreSite) -> Self {
        Self { site, attempts: 0 }
    }

    pub fn id(&self) -> &str {
        &self.site.id
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.site.coordinate
    }
}

impl POI for CandidateSite {
    fn get_coordinate(&self) -> &Coordinate {
        &self.site.coordinate
    }

    fn get_id(&self) -> &str {
        &self.site.id
    }
}
