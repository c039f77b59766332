use hdrhistogram::Histogram;
use serde::Serialize;

const SIGNIFICANT_FIGURES: u8 = 3;
const MAX_TRACKED_NS: u64 = 10_000_000_000;

/// Per-tick decode latency, in nanoseconds, as written to the replay summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p99_9: u64,
    /// Ticks per second over the whole replay.
    pub throughput_avg: f64,
}

pub struct DecodeLatency {
    histogram: Histogram<u64>,
}

impl DecodeLatency {
    pub fn new() -> anyhow::Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_NS, SIGNIFICANT_FIGURES)?;
        Ok(Self { histogram })
    }

    /// Values outside the tracked range are clamped rather than dropped.
    #[inline]
    pub fn record(&mut self, decode_ns: u64) {
        self.histogram.saturating_record(decode_ns.max(1));
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    pub fn summary(&self, elapsed_secs: f64) -> LatencySummary {
        if self.histogram.is_empty() {
            return LatencySummary::default();
        }
        let throughput_avg = if elapsed_secs > 0.0 {
            self.count() as f64 / elapsed_secs
        } else {
            0.0
        };

        LatencySummary {
            count: self.count(),
            min: self.histogram.min(),
            max: self.histogram.max(),
            p50: self.histogram.value_at_quantile(0.50),
            p95: self.histogram.value_at_quantile(0.95),
            p99: self.histogram.value_at_quantile(0.99),
            p99_9: self.histogram.value_at_quantile(0.999),
            throughput_avg,
        }
    }
}
