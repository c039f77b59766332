pub mod channels;
pub mod config;
pub mod data_feed;
pub mod decoder_sbe;
pub mod encoder;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod metrics;
pub mod sbe;
pub mod time_utils;
pub mod types;

pub use decoder_sbe::{DecodeResult, SbeDecoder};
pub use error::{DecoderError, MalformedReason};
pub use types::RawTick;
