use crate::PricingOptions;
use crate::stats::RoundStats;

/// Hook invoked once per pricing round for logging or monitoring.
pub trait Callback {
    /// Creates a new callback from the pricing options.
    fn new(options: &PricingOptions) -> Self
    where
        Self: Sized;

    /// Called at the end of each round with that round's statistics.
    fn call(&mut self, stats: &RoundStats);

    /// Called for recoverable trouble (e.g. numerical errors inside a
    /// solver). The default writes to stderr.
    fn warn(&mut self, message: &str) {
        eprintln!("pricing warning: {}", message);
    }
}

/// A callback that does nothing. Use when no per-round output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &PricingOptions) -> Self {
        Self {}
    }

    fn call(&mut self, _stats: &RoundStats) {
        // Do nothing
    }
}

/// Prints a one-line statistics table row per round to stdout.
pub struct RoundOutput {}

impl Callback for RoundOutput {
    fn new(_options: &PricingOptions) -> Self {
        Self {}
    }

    fn call(&mut self, stats: &RoundStats) {
        let txt = format!(
            "| {:4} | {} | {:4} | {:4} | {:4} | {:4} | {:>10} | {:?} |",
            stats.round,
            if stats.farkas { "F" } else { "R" },
            stats.nsolves,
            stats.ncolsfound,
            stats.ncolsharvested,
            stats.ncolsapplied,
            stats
                .lowerbound
                .map(|lb| format!("{:.4e}", lb))
                .unwrap_or_else(|| "-".to_string()),
            stats.status,
        );
        println!("{}", txt);
    }
}
