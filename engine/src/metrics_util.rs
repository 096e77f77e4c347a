use once_cell::sync::Lazy;
use std::time::Instant;

static METRICS_ENABLED: Lazy<bool> = Lazy::new(|| std::env::var("ANIMATOR_METRICS").is_ok());

/// Initializes the metrics switch.
pub fn init_metrics() {
    let _ = *METRICS_ENABLED;
}

/// Records the duration of `f` as a histogram, if metrics are enabled.
pub fn measure_time<R>(id: &'static str, f: impl FnOnce() -> R) -> R {
    if !*METRICS_ENABLED {
        return f();
    }
    let start = Instant::now();
    let result = f();
    metrics::histogram!(id).record(start.elapsed().as_secs_f64());
    result
}

/// Increments a diagnostic counter, if metrics are enabled.
pub fn count(id: &'static str) {
    if *METRICS_ENABLED {
        metrics::counter!(id).increment(1);
    }
}
