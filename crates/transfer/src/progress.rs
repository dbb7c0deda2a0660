//! Byte accounting for a single transfer.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Converts a byte count to mebibytes for display.
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Percentage of `declared` covered by `received`, clamped to `0..=100`.
///
/// Returns 0 when the declared size is unknown (`<= 0`).
pub fn percent_of(received: u64, declared: i64) -> f64 {
    if declared <= 0 {
        return 0.0;
    }
    (received as f64 * 100.0 / declared as f64).min(100.0)
}

/// Progress for one transfer; never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct ProgressMeter {
    declared: i64,
    received: u64,
    percent: f64,
}

impl ProgressMeter {
    pub fn new(declared: i64) -> Self {
        Self {
            declared,
            received: 0,
            percent: 0.0,
        }
    }

    /// Adds `bytes` to the running total and returns the updated percentage.
    pub fn add(&mut self, bytes: usize) -> f64 {
        self.received = self.received.saturating_add(bytes as u64);
        self.percent = self.percent.max(percent_of(self.received, self.declared));
        self.percent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn declared(&self) -> i64 {
        self.declared
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}
