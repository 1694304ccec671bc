use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};
use tracing_timing::{Builder, Histogram};
use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use std::cell::RefCell;

// Histogram range: 1ns to 10 minutes, 3 significant digits
const HISTOGRAM_MAX_NS: u64 = 600_000_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum OperationCategory {
    Mesh,
    Capture,
    Optimization {
        subcategory: OptimizationType,
    },
    Analysis {
        subcategory: AnalysisType,
    },
    FileIO {
        subcategory: FileIOType,
    },
    Other,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum OptimizationType {
    CandidateGeneration,
    Greedy,
    SwapImprovement,
    RandomRestart,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum AnalysisType {
    Competitive,
    Capacity,
    Historical,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum FileIOType {
    DataLoad,
    ResultsSave,
}

impl OperationCategory {
    pub fn as_str(&self) -> String {
        match self {
            OperationCategory::Mesh => "Demand Mesh".to_string(),
            OperationCategory::Capture => "Huff Capture".to_string(),
            OperationCategory::Optimization { subcategory } => {
                format!("Optimization - {}", match subcategory {
                    OptimizationType::CandidateGeneration => "Candidate Generation",
                    OptimizationType::Greedy => "Greedy",
                    OptimizationType::SwapImprovement => "Swap Improvement",
                    OptimizationType::RandomRestart => "Random Restart",
                })
            },
            OperationCategory::Analysis { subcategory } => {
                format!("Analysis - {}", match subcategory {
                    AnalysisType::Competitive => "Competitive",
                    AnalysisType::Capacity => "Capacity",
                    AnalysisType::Historical => "Historical",
                })
            },
            OperationCategory::FileIO { subcategory } => {
                format!("File I/O - {}", match subcategory {
                    FileIOType::DataLoad => "Data Load",
                    FileIOType::ResultsSave => "Results Save",
                })
            },
            OperationCategory::Other => "Other Operations".to_string(),
        }
    }
}

thread_local! {
    static TIMING_STACK: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

lazy_static! {
    static ref TIMING_ENABLED: AtomicBool = AtomicBool::new(false);
    static ref FUNCTION_TIMINGS: Arc<RwLock<HashMap<String, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref CATEGORY_TIMINGS: Arc<RwLock<HashMap<OperationCategory, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    // name -> (total, calls, callers)
    static ref CALL_TREE: Arc<RwLock<HashMap<String, (Duration, usize, Vec<String>)>>> = Arc::new(RwLock::new(HashMap::new()));
}

fn new_histogram() -> Option<Histogram<u64>> {
    Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, HISTOGRAM_SIGFIG).ok()
}

/// Records the elapsed time of the enclosing scope when dropped.
pub struct TimingGuard {
    function_name: String,
    category: OperationCategory,
    start: Instant,
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        record_timing_end(&self.function_name, self.start.elapsed(), &self.category);
    }
}

pub fn start_timing(function_name: &str, category: OperationCategory) -> TimingGuard {
    TIMING_STACK.with(|stack| stack.borrow_mut().push(function_name.to_string()));

    TimingGuard {
        function_name: function_name.to_string(),
        category,
        start: Instant::now(),
    }
}

fn record_timing_end(function_name: &str, duration: Duration, category: &OperationCategory) {
    let caller = TIMING_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.pop();
        stack.last().cloned()
    });

    if !is_timing_enabled() {
        return;
    }

    {
        let mut tree = CALL_TREE.write();
        let entry = tree
            .entry(function_name.to_string())
            .or_insert((Duration::ZERO, 0, Vec::new()));
        entry.0 += duration;
        entry.1 += 1;
        if let Some(parent) = caller {
            if !entry.2.contains(&parent) {
                entry.2.push(parent);
            }
        }
    }

    let duration_ns = duration.as_nanos().min(HISTOGRAM_MAX_NS as u128) as u64;

    {
        let mut timings = FUNCTION_TIMINGS.write();
        if !timings.contains_key(function_name) {
            if let Some(histogram) = new_histogram() {
                timings.insert(function_name.to_string(), histogram);
            }
        }
        if let Some(histogram) = timings.get_mut(function_name) {
            let _ = histogram.record(duration_ns);
        }
    }

    {
        let mut category_timings = CATEGORY_TIMINGS.write();
        if !category_timings.contains_key(category) {
            if let Some(histogram) = new_histogram() {
                category_timings.insert(category.clone(), histogram);
            }
        }
        if let Some(histogram) = category_timings.get_mut(category) {
            let _ = histogram.record(duration_ns);
        }
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(enable_timing: bool) -> anyhow::Result<()> {
    TIMING_ENABLED.store(enable_timing, Ordering::SeqCst);

    let env_filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("siteopt=debug".parse()?);

    if enable_timing {
        let timing_layer = Builder::default().layer(|| {
            Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, HISTOGRAM_SIGFIG)
                .expect("constant histogram bounds are valid")
        });

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .with(timing_layer.boxed());

        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty());

        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::SeqCst)
}

pub fn print_timing_report() {
    if !is_timing_enabled() {
        return;
    }

    println!("\nTiming Report");
    println!("=============");

    println!("\nBy operation:");
    let tree = CALL_TREE.read();
    let mut entries: Vec<_> = tree.iter().collect();
    entries.sort_by(|a, b| b.1.0.cmp(&a.1.0));

    for (name, (total, count, callers)) in entries {
        let avg = total.div_f64((*count).max(1) as f64);
        print!(
            "{}: total={:.3}s, count={}, avg={:.2}ms",
            name,
            total.as_secs_f64(),
            count,
            avg.as_secs_f64() * 1000.0,
        );
        if callers.is_empty() {
            println!();
        } else {
            println!("  (from {})", callers.join(", "));
        }
    }

    println!("\nBy category:");
    let category_timings = CATEGORY_TIMINGS.read();
    let mut categories: Vec<_> = category_timings.iter().collect();
    let total_of = |hist: &Histogram<u64>| hist.mean() * hist.len() as f64;
    categories.sort_by(|a, b| total_of(b.1).partial_cmp(&total_of(a.1)).unwrap_or(std::cmp::Ordering::Equal));

    let grand_total: f64 = categories.iter().map(|(_, hist)| total_of(hist)).sum();

    for (category, histogram) in categories {
        let category_total = total_of(histogram);
        let share = if grand_total > 0.0 { category_total / grand_total * 100.0 } else { 0.0 };
        println!(
            "{}: {:.1}%  mean={:.2}ms p95={:.2}ms count={}",
            category.as_str(),
            share,
            histogram.mean() / 1_000_000.0,
            histogram.value_at_quantile(0.95) as f64 / 1_000_000.0,
            histogram.len(),
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_include_subcategory() {
        let category = OperationCategory::Optimization { subcategory: OptimizationType::SwapImprovement };
        assert_eq!(category.as_str(), "Optimization - Swap Improvement");
    }

    #[test]
    fn guard_pops_stack_even_when_timing_disabled() {
        {
            let _outer = start_timing("outer", OperationCategory::Other);
            let _inner = start_timing("inner", OperationCategory::Capture);
        }
        TIMING_STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }
}
