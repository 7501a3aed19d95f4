//! Utility functions and types

pub mod data_loader;
pub mod stats;

pub use data_loader::{array_to_frame, column_values, load_csv, write_csv};
pub use stats::{quantile_sorted, ColumnStatistics};

use std::time::{Duration, Instant};

/// Wall-clock timer used around model fits
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
