use std::mem;

use byteorder::{BigEndian, ByteOrder};
use crossbeam_channel::Sender;
use serde::Serialize;

use crate::config::{DecoderConfig, MalformedPolicy};
use crate::error::{DecoderError, MalformedReason};
use crate::sbe::{
    parse_message_header, parse_sofh, read_tick_block, to_px_e8, to_unix_ms, trailing_len,
    Encoding, FrameHeader, FRAME_HEADER_LEN, SOFH_LEN, TICK_BLOCK_LEN,
};
use crate::types::{LogMessage, MetricEvent, RawTick};

/// Outcome of a single [`SbeDecoder::decode_next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    /// One frame decoded; the cursor moved past it.
    Tick(RawTick),
    /// The next frame has not fully arrived; nothing was consumed.
    NeedMoreData,
    /// No bytes left and the source is closed.
    EndOfStream,
    /// The frame was rejected and handled per the malformed policy.
    Malformed(MalformedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    Complete,
    Incomplete,
    Corrupt,
    Halted,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeReport {
    pub frames: usize,
    pub ticks: usize,
    pub consumed: usize,
    pub status: DecodeStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub ticks: u64,
    pub malformed: u64,
    pub need_more_data: u64,
    pub bytes_consumed: u64,
    pub bytes_discarded: u64,
}

enum Frame {
    Complete { tick: RawTick, header: FrameHeader },
    Incomplete { declared: usize },
    Rejected { reason: MalformedReason, skip: Skip },
}

enum Skip {
    /// The claimed frame length is trustworthy.
    Frame(usize),
    /// Scan forward for the next plausible framing header.
    Resync,
}

/// Decoder state for one stream. The cursor is an offset into the caller's
/// buffer; the decoder never copies or retains the bytes.
pub struct SbeDecoder {
    config: DecoderConfig,
    cursor: usize,
    pending_skip: usize,
    closed: bool,
    halted: Option<MalformedReason>,
    last_header: Option<FrameHeader>,
    stats: DecodeStats,
    metrics_tx: Option<Sender<LogMessage>>,
}

impl SbeDecoder {
    pub fn init(config: DecoderConfig) -> Result<Self, DecoderError> {
        if config.max_message_len < config.min_message_len() {
            return Err(DecoderError::InvalidConfig(format!(
                "max_message_len {} below minimum tick frame {}",
                config.max_message_len,
                config.min_message_len()
            )));
        }
        if config.max_message_len > u32::MAX as usize {
            return Err(DecoderError::InvalidConfig(format!(
                "max_message_len {} exceeds the u32 framing field",
                config.max_message_len
            )));
        }

        Ok(Self {
            config,
            cursor: 0,
            pending_skip: 0,
            closed: false,
            halted: None,
            last_header: None,
            stats: DecodeStats::default(),
            metrics_tx: None,
        })
    }

    /// Reports malformed frames to a metrics collaborator. Sends never block.
    pub fn with_metrics(mut self, tx: Sender<LogMessage>) -> Self {
        self.metrics_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the bytes consumed since the last call and rebases the cursor
    /// to zero. The caller drops that prefix from its buffer before the next
    /// `decode_next`.
    pub fn take_consumed(&mut self) -> usize {
        mem::take(&mut self.cursor)
    }

    pub fn pending_skip(&self) -> usize {
        self.pending_skip
    }

    pub fn last_header(&self) -> Option<FrameHeader> {
        self.last_header
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn halted(&self) -> Option<MalformedReason> {
        self.halted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the source as exhausted; an empty remainder then yields
    /// `EndOfStream`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Restarts the stream. Counters keep accumulating across resets.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.pending_skip = 0;
        self.closed = false;
        self.halted = None;
        self.last_header = None;
    }

    /// Ends the session and zeroes the counters. Safe to call more than once.
    pub fn cleanup(&mut self) {
        self.reset();
        self.stats = DecodeStats::default();
        self.metrics_tx = None;
    }

    pub fn decode_next(&mut self, buf: &[u8]) -> Result<DecodeResult, DecoderError> {
        let Some(mut available) = buf.len().checked_sub(self.cursor) else {
            tracing::error!(
                cursor = self.cursor,
                len = buf.len(),
                "buffer shorter than decoder cursor"
            );
            return Err(DecoderError::InvalidArgument(
                "buffer shorter than decoder cursor",
            ));
        };

        if let Some(reason) = self.halted {
            return Ok(DecodeResult::Malformed(reason));
        }

        if self.pending_skip > 0 {
            let n = self.pending_skip.min(available);
            self.discard(n);
            self.pending_skip -= n;
            available -= n;
            if self.pending_skip > 0 {
                if self.closed {
                    self.pending_skip = 0;
                    return Ok(DecodeResult::EndOfStream);
                }
                return Ok(self.need_more());
            }
        }

        if available == 0 {
            return Ok(if self.closed {
                DecodeResult::EndOfStream
            } else {
                self.need_more()
            });
        }

        let src = &buf[self.cursor..];
        if src.len() < FRAME_HEADER_LEN {
            return Ok(self.incomplete(src.len(), FRAME_HEADER_LEN));
        }

        let result = match self.decode_frame(src) {
            Frame::Complete { tick, header } => {
                let len = header.message_length as usize;
                self.cursor += len;
                self.stats.ticks += 1;
                self.stats.bytes_consumed += len as u64;
                self.last_header = Some(header);
                DecodeResult::Tick(tick)
            }
            Frame::Incomplete { declared } => self.incomplete(src.len(), declared),
            Frame::Rejected { reason, skip } => {
                let discard = match skip {
                    Skip::Frame(len) => len,
                    Skip::Resync => resync_offset(src),
                };
                self.reject(reason, discard, src.len())
            }
        };
        Ok(result)
    }

    /// Decodes every complete frame in `src`, then rebases the cursor. Bytes
    /// past `report.consumed` belong to a frame that has not fully arrived.
    pub fn decode_stream<F>(
        &mut self,
        src: &[u8],
        mut on_tick: F,
    ) -> Result<DecodeReport, DecoderError>
    where
        F: FnMut(&RawTick),
    {
        if self.cursor != 0 {
            return Err(DecoderError::InvalidArgument(
                "decode_stream requires a rebased cursor",
            ));
        }

        let mut frames = 0usize;
        let mut ticks = 0usize;
        let mut status = DecodeStatus::Complete;

        loop {
            match self.decode_next(src)? {
                DecodeResult::Tick(tick) => {
                    frames = frames.saturating_add(1);
                    ticks = ticks.saturating_add(1);
                    on_tick(&tick);
                }
                DecodeResult::Malformed(_) => {
                    if self.halted.is_some() {
                        status = promote(status, DecodeStatus::Halted);
                        break;
                    }
                    frames = frames.saturating_add(1);
                    status = promote(status, DecodeStatus::Corrupt);
                }
                DecodeResult::NeedMoreData => {
                    if self.cursor < src.len() || self.pending_skip > 0 {
                        status = promote(status, DecodeStatus::Incomplete);
                    }
                    break;
                }
                DecodeResult::EndOfStream => break,
            }
        }

        Ok(DecodeReport {
            frames,
            ticks,
            consumed: self.take_consumed(),
            status,
        })
    }

    fn decode_frame(&self, src: &[u8]) -> Frame {
        let (message_length, marker) = parse_sofh(src);
        let Some(encoding) = Encoding::from_marker(marker) else {
            return Frame::Rejected {
                reason: MalformedReason::UnknownEncoding(marker),
                skip: Skip::Resync,
            };
        };

        let declared = message_length as usize;
        if declared < FRAME_HEADER_LEN {
            return Frame::Rejected {
                reason: MalformedReason::FrameTooShort {
                    declared: message_length,
                    min: FRAME_HEADER_LEN,
                },
                skip: Skip::Resync,
            };
        }
        if declared > self.config.max_message_len {
            return Frame::Rejected {
                reason: MalformedReason::FrameTooLong {
                    declared: message_length,
                    max: self.config.max_message_len,
                },
                skip: Skip::Resync,
            };
        }

        let Some(header) = parse_message_header(encoding, &src[SOFH_LEN..]) else {
            return Frame::Incomplete {
                declared: FRAME_HEADER_LEN,
            };
        };
        let rejected = |reason| Frame::Rejected {
            reason,
            skip: Skip::Frame(declared),
        };

        let schema = &self.config.schema;
        if header.template_id != schema.template_id {
            return rejected(MalformedReason::UnknownTemplate(header.template_id));
        }
        if header.schema_id != schema.schema_id {
            return rejected(MalformedReason::SchemaMismatch(header.schema_id));
        }
        if header.version < schema.min_version {
            return rejected(MalformedReason::UnsupportedVersion(header.version));
        }
        if header.block_length < TICK_BLOCK_LEN {
            return rejected(MalformedReason::BlockTooShort {
                block_length: header.block_length,
                min: TICK_BLOCK_LEN,
            });
        }
        let body_start = FRAME_HEADER_LEN + header.block_length as usize;
        if body_start > declared {
            return rejected(MalformedReason::BlockOverrun {
                block_length: header.block_length,
                message_length,
            });
        }

        if declared > src.len() {
            return Frame::Incomplete { declared };
        }

        let frame = &src[..declared];
        if let Err(reason) = trailing_len(encoding, schema.trailing, &frame[body_start..]) {
            return rejected(reason);
        }

        let Some(wire) = read_tick_block(encoding, &frame[FRAME_HEADER_LEN..body_start]) else {
            return rejected(MalformedReason::BlockTooShort {
                block_length: header.block_length,
                min: TICK_BLOCK_LEN,
            });
        };
        let px_e8 = match to_px_e8(wire.price_mantissa, wire.price_exponent) {
            Ok(px) => px,
            Err(reason) => return rejected(reason),
        };
        let ts_unix_ms = match to_unix_ms(wire.ts_unix_ms) {
            Ok(ts) => ts,
            Err(reason) => return rejected(reason),
        };

        Frame::Complete {
            tick: RawTick::new(wire.symbol_id, px_e8, ts_unix_ms),
            header: FrameHeader {
                message_length,
                encoding,
                block_length: header.block_length,
                template_id: header.template_id,
                schema_id: header.schema_id,
                version: header.version,
            },
        }
    }

    fn incomplete(&mut self, available: usize, declared: usize) -> DecodeResult {
        if self.closed {
            return self.reject(
                MalformedReason::Truncated {
                    available,
                    declared,
                },
                available,
                available,
            );
        }
        self.need_more()
    }

    fn need_more(&mut self) -> DecodeResult {
        self.stats.need_more_data += 1;
        DecodeResult::NeedMoreData
    }

    fn reject(
        &mut self,
        reason: MalformedReason,
        claimed: usize,
        available: usize,
    ) -> DecodeResult {
        self.stats.malformed += 1;

        let discarded = match self.config.malformed_policy {
            MalformedPolicy::Halt => {
                self.halted = Some(reason);
                0
            }
            MalformedPolicy::Skip => {
                let now = claimed.min(available);
                self.pending_skip = claimed - now;
                self.discard(now);
                now
            }
        };

        tracing::debug!(
            reason = %reason,
            discarded,
            pending = self.pending_skip,
            "malformed frame"
        );
        self.report(MetricEvent::Malformed { reason, discarded });
        DecodeResult::Malformed(reason)
    }

    fn discard(&mut self, n: usize) {
        self.cursor += n;
        self.stats.bytes_discarded += n as u64;
    }

    fn report(&self, event: MetricEvent) {
        if let Some(tx) = &self.metrics_tx {
            let _ = tx.try_send(event.into());
        }
    }
}

/// Offset of the next position carrying a known SOFH encoding marker, or,
/// failing that, everything except a possible partial framing header.
fn resync_offset(src: &[u8]) -> usize {
    (1..=src.len().saturating_sub(SOFH_LEN))
        .find(|&offset| {
            let marker = BigEndian::read_u16(&src[offset + 4..offset + SOFH_LEN]);
            Encoding::from_marker(marker).is_some()
        })
        .unwrap_or_else(|| src.len().saturating_sub(SOFH_LEN - 1).max(1))
}

fn promote(current: DecodeStatus, next: DecodeStatus) -> DecodeStatus {
    if severity(next) > severity(current) {
        next
    } else {
        current
    }
}

fn severity(status: DecodeStatus) -> u8 {
    match status {
        DecodeStatus::Complete => 0,
        DecodeStatus::Incomplete => 1,
        DecodeStatus::Corrupt => 2,
        DecodeStatus::Halted => 3,
    }
}
