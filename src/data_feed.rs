use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context};
use crossbeam_channel::Sender;
use serde::Serialize;

use crate::channels::SpscSender;
use crate::config::{Config, DecoderConfig, FeedConfig};
use crate::decoder_sbe::{DecodeResult, DecodeStats, SbeDecoder};
use crate::metrics::{DecodeLatency, LatencySummary};
use crate::time_utils::{monotonic_now_ns, wall_clock_now_ms};
use crate::types::{LogMessage, MetricEvent, RawTick};

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedSummary {
    pub ticks: u64,
    pub malformed: u64,
    pub ts_regressions: u64,
    pub bytes_read: u64,
    pub decode: DecodeStats,
    pub latency_ns: LatencySummary,
    pub halted: Option<String>,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

/// Pulls ticks out of a byte source: owns the buffer the decoder borrows,
/// refills it on `NeedMoreData` and drops consumed prefixes.
pub struct TickFeed<R> {
    reader: R,
    buf: Vec<u8>,
    decoder: SbeDecoder,
    read_chunk: usize,
    last_ts: Option<u64>,
    latency: DecodeLatency,
    started_ns: u64,
    log_tx: Option<Sender<LogMessage>>,
    summary: FeedSummary,
}

impl<R: Read> TickFeed<R> {
    pub fn new(reader: R, decoder: SbeDecoder, config: &FeedConfig) -> anyhow::Result<Self> {
        Ok(Self {
            reader,
            buf: Vec::with_capacity(config.initial_capacity),
            decoder,
            read_chunk: config.read_chunk.max(1),
            last_ts: None,
            latency: DecodeLatency::new().context("decode latency histogram")?,
            started_ns: monotonic_now_ns(),
            log_tx: None,
            summary: FeedSummary {
                started_at_ms: wall_clock_now_ms(),
                ..FeedSummary::default()
            },
        })
    }

    pub fn with_log(mut self, log_tx: Sender<LogMessage>) -> Self {
        self.log_tx = Some(log_tx);
        self
    }

    pub fn decoder(&self) -> &SbeDecoder {
        &self.decoder
    }

    /// Bytes read but not yet consumed or discarded by the decoder.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.decoder.cursor()
    }

    pub fn summary(&self) -> FeedSummary {
        let elapsed_ns = monotonic_now_ns().saturating_sub(self.started_ns);
        FeedSummary {
            decode: self.decoder.stats(),
            latency_ns: self.latency.summary(elapsed_ns as f64 / 1e9),
            halted: self.decoder.halted().map(|reason| reason.to_string()),
            finished_at_ms: wall_clock_now_ms(),
            ..self.summary.clone()
        }
    }

    /// Next decoded tick, `None` at end of stream. Malformed frames are
    /// skipped; a halted decoder is an error.
    pub fn next_tick(&mut self) -> anyhow::Result<Option<RawTick>> {
        loop {
            let started_ns = monotonic_now_ns();
            match self.decoder.decode_next(&self.buf)? {
                DecodeResult::Tick(tick) => {
                    let decode_ns = monotonic_now_ns().saturating_sub(started_ns);
                    self.on_tick(tick, decode_ns);
                    return Ok(Some(tick));
                }
                DecodeResult::NeedMoreData => self.fill()?,
                DecodeResult::EndOfStream => {
                    self.send(MetricEvent::EndOfStream.into());
                    return Ok(None);
                }
                DecodeResult::Malformed(reason) => {
                    if self.decoder.halted().is_some() {
                        tracing::error!(reason = %reason, "decoder halted on malformed frame");
                        return Err(anyhow!("decoder halted: {reason}"));
                    }
                    self.summary.malformed += 1;
                    tracing::warn!(
                        reason = %reason,
                        pending = self.decoder.pending_skip(),
                        "skipped malformed frame"
                    );
                }
            }
        }
    }

    fn fill(&mut self) -> anyhow::Result<()> {
        let consumed = self.decoder.take_consumed();
        self.buf.drain(..consumed);

        let start = self.buf.len();
        self.buf.resize(start + self.read_chunk, 0);
        let read = loop {
            match self.reader.read(&mut self.buf[start..]) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err).context("reading SBE source");
                }
            }
        };
        self.buf.truncate(start + read);
        self.summary.bytes_read += read as u64;

        if read == 0 {
            tracing::debug!(buffered = self.buf.len(), "source exhausted");
            self.decoder.close();
        }
        Ok(())
    }

    fn on_tick(&mut self, tick: RawTick, decode_ns: u64) {
        self.summary.ticks += 1;
        self.latency.record(decode_ns);
        let symbol_id = tick.symbol_id();
        let ts = tick.ts_unix_ms();

        if let Some(last_ts_ms) = self.last_ts.replace(ts) {
            if ts < last_ts_ms {
                self.summary.ts_regressions += 1;
                tracing::warn!(
                    symbol_id,
                    last_ts_ms,
                    observed_ts_ms = ts,
                    "tick timestamp went backwards"
                );
                self.send(
                    MetricEvent::TsRegression {
                        symbol_id,
                        last_ts_ms,
                        observed_ts_ms: ts,
                    }
                    .into(),
                );
            }
        }

        self.send(
            MetricEvent::TickDecoded {
                symbol_id,
                decode_ns,
            }
            .into(),
        );
    }

    fn send(&self, message: LogMessage) {
        if let Some(tx) = &self.log_tx {
            let _ = tx.try_send(message);
        }
    }
}

impl<R: Read> Iterator for TickFeed<R> {
    type Item = anyhow::Result<RawTick>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tick().transpose()
    }
}

/// Replays a captured SBE file on its own thread, handing ticks to `tick_tx`
/// until end of stream, a halt, or the consumer going away.
pub fn spawn_file_reader(
    config: &'static Config,
    decoder_config: DecoderConfig,
    path: PathBuf,
    tick_tx: SpscSender<RawTick>,
    log_tx: Sender<LogMessage>,
) -> anyhow::Result<thread::JoinHandle<anyhow::Result<FeedSummary>>> {
    thread::Builder::new()
        .name("sbe-reader".to_string())
        .spawn(move || {
            let file = File::open(&path).with_context(|| format!("open {path:?}"))?;
            let decoder = SbeDecoder::init(decoder_config)?.with_metrics(log_tx.clone());
            let mut feed = TickFeed::new(file, decoder, &config.feed)?.with_log(log_tx.clone());

            let _ = log_tx.send(LogMessage::Info(
                format!("[REPLAY] reading {}", path.display()).into(),
            ));

            loop {
                match feed.next_tick() {
                    Ok(Some(tick)) => {
                        if tick_tx.send(tick).is_err() {
                            let _ = log_tx.send(LogMessage::Warn(
                                format!(
                                    "[REPLAY] consumer gone after {} ticks; stopping reader",
                                    feed.summary.ticks
                                )
                                .into(),
                            ));
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) if feed.decoder().halted().is_some() => {
                        let _ = log_tx.send(LogMessage::Error(format!("[REPLAY] {err}")));
                        break;
                    }
                    Err(err) => return Err(err.context(format!("replaying {}", path.display()))),
                }
            }

            Ok(feed.summary())
        })
        .context("failed to spawn sbe reader")
}
