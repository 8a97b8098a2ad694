use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{prelude::*, EnvFilter};
use tracing_timing::{Builder, Histogram};

// Define categories for different types of operations
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum OperationCategory {
    IndexBuild,
    Accessibility {
        subcategory: AccessStep,
    },
    FileIO {
        subcategory: FileIOType,
    },
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum AccessStep {
    Validation,
    SupplyRatio,
    DemandScore,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum FileIOType {
    DataLoad,
    RasterConvert,
    ResultsSave,
}

impl OperationCategory {
    pub fn as_str(&self) -> String {
        match self {
            OperationCategory::IndexBuild => "Index Build".to_string(),
            OperationCategory::Accessibility { subcategory } => {
                format!("Accessibility - {}", match subcategory {
                    AccessStep::Validation => "Validation",
                    AccessStep::SupplyRatio => "Step 1 Supply Ratio",
                    AccessStep::DemandScore => "Step 2 Demand Score",
                })
            },
            OperationCategory::FileIO { subcategory } => {
                format!("File I/O - {}", match subcategory {
                    FileIOType::DataLoad => "Data Load",
                    FileIOType::RasterConvert => "Raster Convert",
                    FileIOType::ResultsSave => "Results Save",
                })
            },
        }
    }
}

// Histogram bounds: 1ns to 1h, 3 significant figures
const HISTOGRAM_LOW_NS: u64 = 1;
const HISTOGRAM_HIGH_NS: u64 = 3_600_000_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

lazy_static! {
    static ref TIMING_ENABLED: AtomicBool = AtomicBool::new(false);
    static ref FUNCTION_TIMINGS: Arc<RwLock<HashMap<String, (Duration, usize)>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref CATEGORY_TIMINGS: Arc<RwLock<HashMap<OperationCategory, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
}

fn new_histogram() -> Option<Histogram<u64>> {
    Histogram::<u64>::new_with_bounds(HISTOGRAM_LOW_NS, HISTOGRAM_HIGH_NS, HISTOGRAM_SIGFIG).ok()
}

/// Records the elapsed time of a scope when dropped.
#[derive(Debug)]
pub struct TimingGuard {
    function_name: String,
    category: OperationCategory,
    start: Instant,
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        record_timing_end(&self.function_name, duration, &self.category);
    }
}

pub fn start_timing(function_name: &str, category: OperationCategory) -> TimingGuard {
    TimingGuard {
        function_name: function_name.to_string(),
        category,
        start: Instant::now(),
    }
}

fn record_timing_end(function_name: &str, duration: Duration, category: &OperationCategory) {
    if !is_timing_enabled() {
        return;
    }

    tracing::debug!(
        operation = function_name,
        category = %category.as_str(),
        elapsed_ms = duration.as_secs_f64() * 1000.0,
        "operation finished"
    );

    {
        let mut timings = FUNCTION_TIMINGS.write();
        let entry = timings
            .entry(function_name.to_string())
            .or_insert((Duration::from_nanos(0), 0));
        entry.0 += duration;
        entry.1 += 1;
    }

    let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
    let mut category_timings = CATEGORY_TIMINGS.write();
    if !category_timings.contains_key(category) {
        match new_histogram() {
            Some(histogram) => {
                category_timings.insert(category.clone(), histogram);
            }
            None => return,
        }
    }
    if let Some(histogram) = category_timings.get_mut(category) {
        let _ = histogram.record(duration_ns.clamp(HISTOGRAM_LOW_NS, HISTOGRAM_HIGH_NS));
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` is honoured; INFO is the floor, and `debug` raises this
/// crate to DEBUG. With `enable_timing` a tracing-timing layer is added and
/// [`TimingGuard`] scopes are collected for [`print_timing_report`].
pub fn init_logging(enable_timing: bool, debug: bool) -> Result<(), SetGlobalDefaultError> {
    TIMING_ENABLED.store(enable_timing, Ordering::SeqCst);

    let mut env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if debug {
        if let Ok(directive) = "g2sfca=debug".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if enable_timing {
        let histogram = || {
            Histogram::<u64>::new_with_bounds(HISTOGRAM_LOW_NS, HISTOGRAM_HIGH_NS, HISTOGRAM_SIGFIG)
                .expect("constant histogram bounds are valid")
        };

        let timing_layer = Builder::default().layer(histogram);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(timing_layer.boxed());

        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false));

        tracing::subscriber::set_global_default(subscriber)
    }
}

pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::SeqCst)
}

pub fn print_timing_report() {
    if !is_timing_enabled() {
        return;
    }

    println!("\nDetailed Performance Report");
    println!("==========================");

    println!("\nOperation Timing:");
    println!("-----------------");
    let functions = FUNCTION_TIMINGS.read();
    let mut entries: Vec<_> = functions.iter().collect();
    entries.sort_by(|a, b| b.1.0.cmp(&a.1.0));

    for (function_name, (total_duration, count)) in entries {
        let avg_duration = total_duration.div_f64(*count as f64);
        println!(
            "{}: total={:.3}s, count={}, avg={:.2}ms",
            function_name,
            total_duration.as_secs_f64(),
            count,
            avg_duration.as_secs_f64() * 1000.0,
        );
    }

    println!("\nPerformance by Category:");
    println!("------------------------");
    let category_timings = CATEGORY_TIMINGS.read();
    let mut category_vec: Vec<_> = category_timings.iter().collect();
    let category_total = |hist: &Histogram<u64>| hist.mean() * (hist.len() as f64);
    category_vec.sort_by(|a, b| category_total(b.1).total_cmp(&category_total(a.1)));

    let total_time: f64 = category_vec.iter().map(|(_, hist)| category_total(*hist)).sum();

    for (category, histogram) in category_vec {
        let total = category_total(histogram);
        let percentage = if total_time > 0.0 { (total / total_time) * 100.0 } else { 0.0 };
        println!(
            "{}: {:.1}% of total time\n  mean={:.2}ms, p95={:.2}ms, count={}, total={:.3}s",
            category.as_str(),
            percentage,
            histogram.mean() / 1_000_000.0,
            histogram.value_at_quantile(0.95) as f64 / 1_000_000.0,
            histogram.len(),
            total / 1_000_000_000.0,
        );
    }

    println!("==========================\n");
}
