use once_cell::sync::Lazy;
use std::time::Duration;

use crate::sbe::{TickSchema, FRAME_HEADER_LEN, TICK_BLOCK_LEN};

pub static CONFIG: Lazy<Config> = Lazy::new(Config::new);

#[derive(Debug)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub feed: FeedConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
}

impl Config {
    fn new() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            feed: FeedConfig {
                read_chunk: READ_CHUNK_BYTES,
                initial_capacity: INITIAL_BUFFER_BYTES,
            },
            channel: ChannelConfig {
                tick_capacity: TICK_CHANNEL_CAPACITY,
                log_capacity: LOG_CHANNEL_CAPACITY,
            },
            logging: LoggingConfig {
                flush_interval: Duration::from_millis(LOG_FLUSH_MS),
            },
        }
    }

    pub fn load() -> &'static Self {
        &CONFIG
    }
}

/// What the decoder does with a frame it rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Discard the frame (or resync on an untrusted length) and continue.
    #[default]
    Skip,
    /// Stop consuming and keep reporting the reason until reset.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub schema: TickSchema,
    pub max_message_len: usize,
    pub malformed_policy: MalformedPolicy,
}

impl DecoderConfig {
    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    pub fn with_schema(mut self, schema: TickSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    pub fn min_message_len(&self) -> usize {
        FRAME_HEADER_LEN + TICK_BLOCK_LEN as usize
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            schema: TickSchema::tick_v1(),
            max_message_len: MAX_MESSAGE_LEN,
            malformed_policy: MalformedPolicy::Skip,
        }
    }
}

#[derive(Debug)]
pub struct FeedConfig {
    pub read_chunk: usize,
    pub initial_capacity: usize,
}

#[derive(Debug)]
pub struct ChannelConfig {
    pub tick_capacity: usize,
    pub log_capacity: usize,
}

#[derive(Debug)]
pub struct LoggingConfig {
    pub flush_interval: Duration,
}

const MAX_MESSAGE_LEN: usize = 64 * 1024;

const READ_CHUNK_BYTES: usize = 16 * 1024;
const INITIAL_BUFFER_BYTES: usize = 64 * 1024;

const TICK_CHANNEL_CAPACITY: usize = 8192;
const LOG_CHANNEL_CAPACITY: usize = 2048;

const LOG_FLUSH_MS: u64 = 1_000;
