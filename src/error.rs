use thiserror::Error;

/// Why a frame was rejected. Every variant is recoverable at the stream
/// level under [`crate::config::MalformedPolicy::Skip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("unknown SOFH encoding type {0:#06x}")]
    UnknownEncoding(u16),

    #[error("frame length {declared} below minimum {min}")]
    FrameTooShort { declared: u32, min: usize },

    #[error("frame length {declared} above maximum {max}")]
    FrameTooLong { declared: u32, max: usize },

    #[error("unknown template id {0}")]
    UnknownTemplate(u16),

    #[error("schema id {0} does not match the tick schema")]
    SchemaMismatch(u16),

    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u16),

    #[error("block length {block_length} below minimum {min}")]
    BlockTooShort { block_length: u16, min: u16 },

    #[error("block length {block_length} overruns frame of {message_length} bytes")]
    BlockOverrun {
        block_length: u16,
        message_length: u32,
    },

    #[error("trailing section needs {needed} bytes, frame has {capacity}")]
    SectionOverrun { needed: usize, capacity: usize },

    #[error("null price")]
    NullPrice,

    #[error("negative price mantissa {0}")]
    NegativePrice(i64),

    #[error("price {mantissa}e{exponent} overflows px_e8")]
    PriceOverflow { mantissa: i64, exponent: i8 },

    #[error("price {mantissa}e{exponent} not representable at 1e-8")]
    PriceInexact { mantissa: i64, exponent: i8 },

    #[error("timestamp {0} out of range")]
    TimestampOutOfRange(i64),

    #[error("stream closed with {available} of {declared} bytes")]
    Truncated { available: usize, declared: usize },
}

impl MalformedReason {
    /// Stable label used by the metrics aggregator.
    pub fn kind(&self) -> &'static str {
        match self {
            MalformedReason::UnknownEncoding(_) => "unknown_encoding",
            MalformedReason::FrameTooShort { .. } => "frame_too_short",
            MalformedReason::FrameTooLong { .. } => "frame_too_long",
            MalformedReason::UnknownTemplate(_) => "unknown_template",
            MalformedReason::SchemaMismatch(_) => "schema_mismatch",
            MalformedReason::UnsupportedVersion(_) => "unsupported_version",
            MalformedReason::BlockTooShort { .. } => "block_too_short",
            MalformedReason::BlockOverrun { .. } => "block_overrun",
            MalformedReason::SectionOverrun { .. } => "section_overrun",
            MalformedReason::NullPrice => "null_price",
            MalformedReason::NegativePrice(_) => "negative_price",
            MalformedReason::PriceOverflow { .. } => "price_overflow",
            MalformedReason::PriceInexact { .. } => "price_inexact",
            MalformedReason::TimestampOutOfRange(_) => "timestamp_out_of_range",
            MalformedReason::Truncated { .. } => "truncated",
        }
    }
}

/// Caller or configuration mistakes. These are programmer errors, not
/// properties of the byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid decoder config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("px_e8 {0} does not fit the signed wire mantissa")]
    PriceOutOfRange(u64),

    #[error("ts_unix_ms {0} does not fit the signed wire timestamp")]
    TimestampOutOfRange(u64),

    #[error("block length {block_length} below tick block length {min}")]
    BlockTooShort { block_length: u16, min: u16 },

    #[error("frame of {0} bytes does not fit the framing header")]
    FrameTooLarge(usize),
}
