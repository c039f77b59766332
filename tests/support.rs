#![allow(dead_code)]

use std::io::{self, Read};
use std::path::PathBuf;

use sbe_tick_decoder::config::DecoderConfig;
use sbe_tick_decoder::decoder_sbe::{DecodeResult, SbeDecoder};
use sbe_tick_decoder::encoder::TickEncoder;
use sbe_tick_decoder::sbe::WireTick;
use sbe_tick_decoder::types::RawTick;

pub const TS_BASE: u64 = 1_700_000_000_000;

pub fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name);
    std::fs::read(path).expect("fixture should exist")
}

pub fn decoder() -> SbeDecoder {
    SbeDecoder::init(DecoderConfig::default()).expect("default config is valid")
}

pub fn tick(symbol_id: u32, px_e8: u64, offset_ms: u64) -> RawTick {
    RawTick::new(symbol_id, px_e8, TS_BASE + offset_ms)
}

pub fn sample_ticks(n: usize) -> Vec<RawTick> {
    (0..n)
        .map(|i| tick(100 + (i % 3) as u32, 2_650_000_000_000 + i as u64 * 50_000_000, i as u64))
        .collect()
}

pub fn encode(ticks: &[RawTick]) -> Vec<u8> {
    TickEncoder::default()
        .encode_to_vec(ticks)
        .expect("ticks are encodable")
}

pub fn wire(symbol_id: u32, price_exponent: i8, price_mantissa: i64, ts_unix_ms: i64) -> WireTick {
    WireTick {
        symbol_id,
        price_exponent,
        price_mantissa,
        ts_unix_ms,
    }
}

pub fn encode_wire(encoder: &TickEncoder, wire: WireTick) -> Vec<u8> {
    let mut out = Vec::new();
    encoder.encode_wire(&wire, &mut out).expect("wire is encodable");
    out
}

/// Decodes every frame in `buf` on a closed stream, collecting each result
/// until end of stream.
pub fn drain_closed(decoder: &mut SbeDecoder, buf: &[u8]) -> Vec<DecodeResult> {
    decoder.close();
    let mut results = Vec::new();
    loop {
        match decoder.decode_next(buf).expect("buffer covers the cursor") {
            DecodeResult::EndOfStream => return results,
            result => results.push(result),
        }
        assert!(results.len() <= buf.len() + 1, "decoder made no progress");
    }
}

pub fn ticks_of(results: &[DecodeResult]) -> Vec<RawTick> {
    results
        .iter()
        .filter_map(|result| match result {
            DecodeResult::Tick(tick) => Some(*tick),
            _ => None,
        })
        .collect()
}

/// Hands out at most `chunk` bytes per read, like a socket would.
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk,
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
