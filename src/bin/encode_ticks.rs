use anyhow::{anyhow, bail, Context};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use sbe_tick_decoder::encoder::TickEncoder;
use sbe_tick_decoder::sbe::Encoding;
use sbe_tick_decoder::types::RawTick;

/// Reads `symbol_id,px_e8,ts_unix_ms` lines on stdin and writes one SBE frame
/// per line. `--big-endian` switches the declared byte order.
fn main() -> anyhow::Result<()> {
    let mut output = None;
    let mut encoding = Encoding::LittleEndian;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--big-endian" => encoding = Encoding::BigEndian,
            _ if output.is_none() => output = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument {arg:?}"),
        }
    }
    let Some(path) = output else {
        return Err(anyhow!(
            "usage: encode_ticks [--big-endian] <output.bin> < ticks.csv"
        ));
    };

    let encoder = TickEncoder::new(encoding);
    let mut buffer = Vec::new();
    let mut ticks = 0usize;

    for (idx, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tick = parse_line(line).with_context(|| format!("line {}", idx + 1))?;
        encoder
            .encode_tick(&tick, &mut buffer)
            .with_context(|| format!("encoding line {}", idx + 1))?;
        ticks += 1;
    }
    if ticks == 0 {
        return Err(anyhow!("no ticks received on stdin"));
    }

    let mut file = File::create(&path).with_context(|| format!("create {path:?}"))?;
    file.write_all(&buffer)
        .with_context(|| format!("write {path:?}"))?;
    eprintln!(
        "encoded {} ticks ({} bytes) to {}",
        ticks,
        buffer.len(),
        path.display()
    );
    Ok(())
}

fn parse_line(line: &str) -> anyhow::Result<RawTick> {
    let mut fields = line.split(',').map(str::trim);
    let mut next = |name: &str| {
        fields
            .next()
            .filter(|field| !field.is_empty())
            .ok_or_else(|| anyhow!("missing {name}"))
    };
    let symbol_id: u32 = next("symbol_id")?.parse().context("symbol_id")?;
    let px_e8: u64 = next("px_e8")?.parse().context("px_e8")?;
    let ts_unix_ms: u64 = next("ts_unix_ms")?.parse().context("ts_unix_ms")?;
    if fields.next().is_some() {
        bail!("expected 3 fields");
    }
    Ok(RawTick::new(symbol_id, px_e8, ts_unix_ms))
}
