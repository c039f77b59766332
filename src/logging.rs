use std::collections::{BTreeMap, VecDeque};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::types::{LogMessage, MetricEvent};

const MAX_LATENCY_SAMPLES: usize = 2_048;

/// Drains decoder and feed metrics until every sender is dropped, emitting a
/// `stats` line every flush interval and a final one on shutdown.
pub fn spawn_metrics_aggregator(
    config: &'static Config,
    rx: Receiver<LogMessage>,
) -> anyhow::Result<thread::JoinHandle<DecodeTotals>> {
    thread::Builder::new()
        .name("metrics-aggregator".to_string())
        .spawn(move || {
            let mut aggregator = MetricsAggregator::new(config.logging.flush_interval, rx);
            aggregator.run();
            aggregator.stats.totals()
        })
        .context("failed to spawn metrics aggregator")
}

/// Counters as seen by the aggregator at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeTotals {
    pub ticks: u64,
    pub malformed: u64,
    pub bytes_discarded: u64,
    pub ts_regressions: u64,
    pub end_of_stream: bool,
    pub malformed_by_kind: BTreeMap<&'static str, u64>,
}

struct MetricsAggregator {
    flush_interval: Duration,
    rx: Receiver<LogMessage>,
    stats: Stats,
    last_flush: Instant,
}

impl MetricsAggregator {
    fn new(flush_interval: Duration, rx: Receiver<LogMessage>) -> Self {
        info!(
            target: "decoder",
            "metrics aggregator ready: flush={}ms",
            flush_interval.as_millis()
        );

        Self {
            flush_interval,
            rx,
            stats: Stats::default(),
            last_flush: Instant::now(),
        }
    }

    fn run(&mut self) {
        loop {
            match self.rx.recv_timeout(Duration::from_millis(10)) {
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.last_flush.elapsed() >= self.flush_interval {
                self.flush_summary();
                self.last_flush = Instant::now();
            }
        }
        self.flush_summary();
    }

    fn handle(&mut self, message: LogMessage) {
        match message {
            LogMessage::Metric(event) => self.stats.apply(event),
            LogMessage::Info(text) => info!(target: "decoder", "{}", text),
            LogMessage::Warn(text) => warn!(target: "decoder", "{}", text),
            LogMessage::Error(err) => error!(target: "decoder", "{}", err),
        }
    }

    fn flush_summary(&mut self) {
        let (p50, p95) = self.stats.decode_latency_percentiles();

        info!(
            target: "decoder",
            "stats ticks={} malformed={} discarded_bytes={} ts_regressions={} eos={} decode_us_p50={:.3} p95={:.3}{}",
            self.stats.ticks,
            self.stats.malformed,
            self.stats.bytes_discarded,
            self.stats.ts_regressions,
            self.stats.end_of_stream,
            p50,
            p95,
            self.stats.format_tail_notes(),
        );
    }
}

#[derive(Default)]
struct Stats {
    ticks: u64,
    malformed: u64,
    bytes_discarded: u64,
    ts_regressions: u64,
    end_of_stream: bool,
    malformed_by_kind: BTreeMap<&'static str, u64>,
    decode_us: VecDeque<f64>,
    last_symbol: Option<u32>,
    last_regression: Option<(u32, u64, u64)>,
}

impl Stats {
    fn apply(&mut self, event: MetricEvent) {
        match event {
            MetricEvent::TickDecoded {
                symbol_id,
                decode_ns,
            } => {
                self.ticks += 1;
                self.last_symbol = Some(symbol_id);
                if self.decode_us.len() == MAX_LATENCY_SAMPLES {
                    self.decode_us.pop_front();
                }
                self.decode_us.push_back(decode_ns as f64 / 1_000.0);
            }
            MetricEvent::Malformed { reason, discarded } => {
                self.malformed += 1;
                self.bytes_discarded += discarded as u64;
                *self.malformed_by_kind.entry(reason.kind()).or_insert(0) += 1;
            }
            MetricEvent::TsRegression {
                symbol_id,
                last_ts_ms,
                observed_ts_ms,
            } => {
                self.ts_regressions += 1;
                self.last_regression = Some((symbol_id, last_ts_ms, observed_ts_ms));
            }
            MetricEvent::EndOfStream => self.end_of_stream = true,
        }
    }

    fn decode_latency_percentiles(&self) -> (f64, f64) {
        (
            percentile(&self.decode_us, 0.50),
            percentile(&self.decode_us, 0.95),
        )
    }

    fn format_tail_notes(&self) -> String {
        let mut notes = Vec::new();
        for (kind, count) in &self.malformed_by_kind {
            notes.push(format!("{kind}={count}"));
        }
        if let Some((symbol_id, last, observed)) = self.last_regression {
            notes.push(format!(
                "last_regression={} prev={} got={}",
                symbol_id, last, observed
            ));
        }
        if let Some(symbol_id) = self.last_symbol {
            notes.push(format!("last_symbol={}", symbol_id));
        }

        if notes.is_empty() {
            String::new()
        } else {
            format!(" {}", notes.join(" "))
        }
    }

    fn totals(&self) -> DecodeTotals {
        DecodeTotals {
            ticks: self.ticks,
            malformed: self.malformed,
            bytes_discarded: self.bytes_discarded,
            ts_regressions: self.ts_regressions,
            end_of_stream: self.end_of_stream,
            malformed_by_kind: self.malformed_by_kind.clone(),
        }
    }
}

fn percentile(samples: &VecDeque<f64>, quantile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut values = samples.iter().copied().collect::<Vec<_>>();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((values.len() as f64 - 1.0) * quantile).round() as usize;
    values[idx]
}
