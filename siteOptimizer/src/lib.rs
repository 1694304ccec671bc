// Main module declarations for the site optimizer

// Core allocation and search modules
pub mod core {
    pub mod mesh;
    pub mod huff;
    pub mod candidates;
    pub mod greedy;
    pub mod local_search;
    pub mod scenarios;
    pub mod search_control;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod const_funcs;
    pub mod engine_config;
}

// Model definitions
pub mod models {
    pub mod mesh_cell;
    pub mod store_site;
    pub mod optimization_result;
    pub mod historical;
}

// Data ingestion and providers
pub mod data {
    pub mod poi;
    pub mod population;
    pub mod stores_loader;
}

// Analysis and metrics
pub mod analysis {
    pub mod metrics;
    pub mod competitive;
    pub mod capacity;
    pub mod historical;
    pub mod reporting;
}

// Utility functions
pub mod utils {
    pub mod spatial_index;
    pub mod logging;
    pub mod csv_export;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

pub mod errors;

// Re-export commonly used items
pub use crate::core::huff::{calculate_demand_capture, compute_capture, CaptureMatrix};
pub use crate::core::mesh::generate_demand_grid;
pub use crate::core::candidates::generate_candidate_sites;
pub use crate::core::greedy::greedy_optimization;
pub use crate::core::local_search::local_search_optimization;
pub use crate::analysis::competitive::analyze_competition;
pub use crate::analysis::capacity::analyze_capacity;
pub use crate::analysis::historical::analyze_historical_patterns;
pub use crate::errors::{SiteError, SiteResult};
pub use crate::data::poi::Coordinate;
