use clap::{Parser, ValueEnum};
use crate::config::constants::DEFAULT_CANDIDATE_COUNT;
use crate::core::candidates::AccuracyPreset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmChoice {
    Greedy,
    LocalSearch,
    /// Run both and compare them as scenarios.
    Compare,
}

#[derive(Parser)]
#[command(author, version, about = "Retail site selection with Huff demand capture", long_about = None)]
pub struct Args {
    #[arg(short, long, help = "Scenario JSON with bounds, stores, competitors and optional history")]
    scenario: String,

    #[arg(short, long, help = "Engine configuration JSON; defaults apply to missing fields")]
    config: Option<String>,

    #[arg(short = 'k', long, default_value_t = 5)]
    num_stores: usize,

    #[arg(short, long, value_enum, default_value_t = AlgorithmChoice::LocalSearch)]
    algorithm: AlgorithmChoice,

    #[arg(short = 'n', long, default_value_t = DEFAULT_CANDIDATE_COUNT)]
    candidates: usize,

    #[arg(long, value_enum, default_value_t = AccuracyPreset::Medium)]
    accuracy: AccuracyPreset,

    #[arg(long, help = "Random seed for candidate sampling and restarts")]
    seed: Option<u64>,

    #[arg(short, long, default_value = "results")]
    output_dir: String,

    #[arg(long, help = "Write the full run report as JSON to this path")]
    json_out: Option<String>,

    #[arg(long, default_value_t = false)]
    no_csv_export: bool,

    #[arg(long, default_value_t = false)]
    enable_timing: bool,

    #[arg(short, long, default_value_t = false)]
    parallel: bool,
}

impl Args {
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn num_stores(&self) -> usize {
        self.num_stores
    }

    pub fn algorithm(&self) -> AlgorithmChoice {
        self.algorithm
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn accuracy(&self) -> AccuracyPreset {
        self.accuracy
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn json_out(&self) -> Option<&str> {
        self.json_out.as_deref()
    }

    pub fn enable_csv_export(&self) -> bool {
        !self.no_csv_export
    }

    pub fn enable_timing(&self) -> bool {
        self.enable_timing
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_kebab_case_algorithm() {
        let args = Args::try_parse_from(["siteopt", "--scenario", "s.json", "--algorithm", "local-search"]).unwrap();
        assert_eq!(args.scenario(), "s.json");
        assert_eq!(args.algorithm(), AlgorithmChoice::LocalSearch);
        assert_eq!(args.num_stores(), 5);
        assert_eq!(args.accuracy(), AccuracyPreset::Medium);
        assert!(args.enable_csv_export());
        assert_eq!(args.seed(), None);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "siteopt", "-s", "s.json", "-k", "3", "-a", "compare", "--accuracy", "high", "--seed", "9",
            "--no-csv-export", "--parallel",
        ])
        .unwrap();
        assert_eq!(args.num_stores(), 3);
        assert_eq!(args.algorithm(), AlgorithmChoice::Compare);
        assert_eq!(args.accuracy(), AccuracyPreset::High);
        assert_eq!(args.seed(), Some(9));
        assert!(!args.enable_csv_export());
        assert!(args.parallel());
    }
}
