use std::borrow::Cow;
use std::fmt;

use crate::error::MalformedReason;

pub const RAW_TICK_SIZE: usize = 20;

const PX_SCALE: f64 = 100_000_000.0;

/// One decoded tick in its cross-language layout:
/// `symbol_id:u32 | px_e8:u64 | ts_unix_ms:u64`, 20 bytes, no padding.
///
/// Fields are packed, so read them by value or through the accessors;
/// taking a reference to a field does not compile.
#[repr(C, packed)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawTick {
    pub symbol_id: u32,
    pub px_e8: u64,
    pub ts_unix_ms: u64,
}

impl RawTick {
    pub fn new(symbol_id: u32, px_e8: u64, ts_unix_ms: u64) -> Self {
        Self {
            symbol_id,
            px_e8,
            ts_unix_ms,
        }
    }

    #[inline]
    pub fn symbol_id(&self) -> u32 {
        self.symbol_id
    }

    #[inline]
    pub fn px_e8(&self) -> u64 {
        self.px_e8
    }

    #[inline]
    pub fn ts_unix_ms(&self) -> u64 {
        self.ts_unix_ms
    }

    pub fn price(&self) -> f64 {
        self.px_e8() as f64 / PX_SCALE
    }

    /// Serializes the record in its documented layout, little-endian.
    pub fn to_bytes(&self) -> [u8; RAW_TICK_SIZE] {
        let mut out = [0u8; RAW_TICK_SIZE];
        out[0..4].copy_from_slice(&self.symbol_id().to_le_bytes());
        out[4..12].copy_from_slice(&self.px_e8().to_le_bytes());
        out[12..20].copy_from_slice(&self.ts_unix_ms().to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; RAW_TICK_SIZE]) -> Self {
        let mut symbol_id = [0u8; 4];
        let mut px_e8 = [0u8; 8];
        let mut ts_unix_ms = [0u8; 8];
        symbol_id.copy_from_slice(&bytes[0..4]);
        px_e8.copy_from_slice(&bytes[4..12]);
        ts_unix_ms.copy_from_slice(&bytes[12..20]);
        Self::new(
            u32::from_le_bytes(symbol_id),
            u64::from_le_bytes(px_e8),
            u64::from_le_bytes(ts_unix_ms),
        )
    }
}

impl fmt::Debug for RawTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTick")
            .field("symbol_id", &self.symbol_id())
            .field("px_e8", &self.px_e8())
            .field("ts_unix_ms", &self.ts_unix_ms())
            .finish()
    }
}

pub enum LogMessage {
    Metric(MetricEvent),
    Info(Cow<'static, str>),
    Warn(Cow<'static, str>),
    Error(String),
}

#[derive(Copy, Clone, Debug)]
pub enum MetricEvent {
    TickDecoded {
        symbol_id: u32,
        decode_ns: u64,
    },
    Malformed {
        reason: MalformedReason,
        discarded: usize,
    },
    TsRegression {
        symbol_id: u32,
        last_ts_ms: u64,
        observed_ts_ms: u64,
    },
    EndOfStream,
}

impl From<MetricEvent> for LogMessage {
    fn from(metric: MetricEvent) -> Self {
        LogMessage::Metric(metric)
    }
}
