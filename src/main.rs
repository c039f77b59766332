use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::bounded;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sbe_tick_decoder::channels::spsc_channel;
use sbe_tick_decoder::config::{Config, MalformedPolicy};
use sbe_tick_decoder::data_feed;
use sbe_tick_decoder::logging;
use sbe_tick_decoder::time_utils::format_unix_ms;

#[derive(Debug, Parser)]
#[command(name = "sbe_tick_decoder", version, about = "Decode SBE tick captures")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a captured SBE file and report what it contained.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
struct ReplayArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = PolicyArg::Skip)]
    policy: PolicyArg,

    /// Largest frame accepted, in bytes.
    #[arg(long)]
    max_message_len: Option<usize>,

    /// Print every decoded tick to stdout.
    #[arg(long)]
    print: bool,

    /// Stop after this many ticks.
    #[arg(long)]
    limit: Option<u64>,

    /// Write the replay summary as JSON.
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Skip,
    Halt,
}

impl From<PolicyArg> for MalformedPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => MalformedPolicy::Skip,
            PolicyArg::Halt => MalformedPolicy::Halt,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay(args) => replay(args),
    }
}

fn replay(args: ReplayArgs) -> anyhow::Result<()> {
    let config = Config::load();
    let decoder_config = config
        .decoder
        .with_policy(args.policy.into())
        .with_max_message_len(
            args.max_message_len
                .unwrap_or(config.decoder.max_message_len),
        );

    let (log_tx, log_rx) = bounded(config.channel.log_capacity);
    let log_handle = logging::spawn_metrics_aggregator(config, log_rx)?;

    let (tick_tx, tick_rx) = spsc_channel(config.channel.tick_capacity);
    let reader_handle = data_feed::spawn_file_reader(
        config,
        decoder_config,
        args.input.clone(),
        tick_tx,
        log_tx,
    )?;

    tracing::info!(
        "[BOOT] replay input={} policy={:?} max_message_len={}",
        args.input.display(),
        decoder_config.malformed_policy,
        decoder_config.max_message_len
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut received = 0u64;
    for tick in tick_rx.iter() {
        received += 1;
        if args.print {
            writeln!(
                out,
                "{} {} {:.8} {}",
                tick.symbol_id(),
                tick.px_e8(),
                tick.price(),
                format_unix_ms(tick.ts_unix_ms())
            )
            .context("writing tick to stdout")?;
        }
        if args.limit.is_some_and(|limit| received >= limit) {
            tracing::info!("tick limit {} reached", received);
            break;
        }
    }
    out.flush().context("flushing stdout")?;
    drop(tick_rx);

    let summary = reader_handle
        .join()
        .map_err(|_| anyhow!("reader thread panicked"))?
        .context("replay failed")?;
    log_handle
        .join()
        .map_err(|_| anyhow!("metrics thread panicked"))?;

    tracing::info!(
        "[DONE] ticks={} malformed={} discarded_bytes={} ts_regressions={} bytes_read={} decode_ns_p50={} p99={} p99_9={} ticks_per_sec={:.0}",
        summary.ticks,
        summary.malformed,
        summary.decode.bytes_discarded,
        summary.ts_regressions,
        summary.bytes_read,
        summary.latency_ns.p50,
        summary.latency_ns.p99,
        summary.latency_ns.p99_9,
        summary.latency_ns.throughput_avg
    );

    if let Some(path) = &args.summary_json {
        let file = File::create(path).with_context(|| format!("create {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .with_context(|| format!("write summary to {path:?}"))?;
    }

    match summary.halted {
        Some(reason) => Err(anyhow!("decoder halted: {reason}")),
        None => Ok(()),
    }
}

fn init_tracing() {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to create env filter");

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
