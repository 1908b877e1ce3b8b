//! Process-wide atomic counters for console observability.
//!
//! Counters are bumped silently where things happen. [`Metrics::flush`]
//! emits them as one `info!` event when a session ends.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    poll_cycles: AtomicU64,
    records_decoded: AtomicU64,
    decode_failures: AtomicU64,
    fetch_failures: AtomicU64,
    commands_published: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            poll_cycles: AtomicU64::new(0),
            records_decoded: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            commands_published: AtomicU64::new(0),
        }
    }

    pub fn inc_poll_cycles(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_records_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_published(&self) {
        self.commands_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            poll_cycles = self.poll_cycles(),
            records_decoded = self.records_decoded(),
            decode_failures = self.decode_failures(),
            fetch_failures = self.fetch_failures(),
            commands_published = self.commands_published(),
        );
    }

    pub fn poll_cycles(&self) -> u64 {
        self.poll_cycles.load(Ordering::Relaxed)
    }

    pub fn records_decoded(&self) -> u64 {
        self.records_decoded.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn commands_published(&self) -> u64 {
        self.commands_published.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.poll_cycles.store(0, Ordering::Relaxed);
        self.records_decoded.store(0, Ordering::Relaxed);
        self.decode_failures.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.commands_published.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_independently() {
        let m = Metrics::new();
        m.inc_poll_cycles();
        m.inc_poll_cycles();
        m.inc_records_decoded();
        m.inc_decode_failures();
        m.inc_fetch_failures();
        m.inc_fetch_failures();
        m.inc_fetch_failures();

        assert_eq!(m.poll_cycles(), 2);
        assert_eq!(m.records_decoded(), 1);
        assert_eq!(m.decode_failures(), 1);
        assert_eq!(m.fetch_failures(), 3);
        assert_eq!(m.commands_published(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_poll_cycles();
        m.inc_commands_published();
        m.reset();
        assert_eq!(m.poll_cycles(), 0);
        assert_eq!(m.commands_published(), 0);
    }
}
