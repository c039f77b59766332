//! Wire layout of the tick schema (schema id 7, version 1, template id 1).
//!
//! ```text
//! SOFH (big-endian)      message_length:u32  encoding_type:u16
//! message header         block_length:u16 template_id:u16 schema_id:u16 version:u16
//! tick block (24+ bytes) symbol_id:u32 price_exponent:i8 reserved[3]
//!                        price_mantissa:i64 ts_unix_ms:i64
//! trailing sections      groups / var data declared by the schema
//! ```
//!
//! Everything after the SOFH is read in the byte order the SOFH declares.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::MalformedReason;

pub const SOFH_LEN: usize = 6;
pub const MESSAGE_HEADER_LEN: usize = 8;
pub const FRAME_HEADER_LEN: usize = SOFH_LEN + MESSAGE_HEADER_LEN;

pub const ENCODING_SBE_LE: u16 = 0xEB50;
pub const ENCODING_SBE_BE: u16 = 0x5BE0;

pub const TICK_TEMPLATE_ID: u16 = 1;
pub const TICK_SCHEMA_ID: u16 = 7;
pub const TICK_SCHEMA_VERSION: u16 = 1;
pub const TICK_BLOCK_LEN: u16 = 24;

pub const GROUP_HEADER_LEN: usize = 4;
pub const VAR_DATA_HEADER_LEN: usize = 4;

const SYMBOL_ID_OFFSET: usize = 0;
const PRICE_EXPONENT_OFFSET: usize = 4;
const PRICE_MANTISSA_OFFSET: usize = 8;
const TS_OFFSET: usize = 16;

const PX_E8_EXPONENT: i32 = -8;
const INT64_NULL: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    LittleEndian,
    BigEndian,
}

impl Encoding {
    pub fn from_marker(marker: u16) -> Option<Self> {
        match marker {
            ENCODING_SBE_LE => Some(Encoding::LittleEndian),
            ENCODING_SBE_BE => Some(Encoding::BigEndian),
            _ => None,
        }
    }

    pub fn marker(self) -> u16 {
        match self {
            Encoding::LittleEndian => ENCODING_SBE_LE,
            Encoding::BigEndian => ENCODING_SBE_BE,
        }
    }
}

/// Sections that follow the root block, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// `groupSizeEncoding`: block_length:u16, num_in_group:u16, entries.
    Group,
    /// `varDataEncoding`: length:u32, bytes.
    VarData,
}

/// The template a decoder instance accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchema {
    pub template_id: u16,
    pub schema_id: u16,
    pub min_version: u16,
    pub trailing: &'static [Section],
}

impl TickSchema {
    pub const fn tick_v1() -> Self {
        Self {
            template_id: TICK_TEMPLATE_ID,
            schema_id: TICK_SCHEMA_ID,
            min_version: TICK_SCHEMA_VERSION,
            trailing: &[],
        }
    }

    pub const fn with_trailing(mut self, trailing: &'static [Section]) -> Self {
        self.trailing = trailing;
        self
    }
}

impl Default for TickSchema {
    fn default() -> Self {
        Self::tick_v1()
    }
}

/// SOFH plus SBE message header, as validated for the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_length: u32,
    pub encoding: Encoding,
    pub block_length: u16,
    pub template_id: u16,
    pub schema_id: u16,
    pub version: u16,
}

#[derive(Clone, Copy)]
pub(crate) struct MessageHeader {
    pub block_length: u16,
    pub template_id: u16,
    pub schema_id: u16,
    pub version: u16,
}

/// Fixed fields of the tick block in wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTick {
    pub symbol_id: u32,
    pub price_exponent: i8,
    pub price_mantissa: i64,
    pub ts_unix_ms: i64,
}

/// Reads the framing header. Callers guarantee `buf.len() >= SOFH_LEN`.
pub(crate) fn parse_sofh(buf: &[u8]) -> (u32, u16) {
    (
        BigEndian::read_u32(&buf[0..4]),
        BigEndian::read_u16(&buf[4..6]),
    )
}

pub(crate) fn parse_message_header(encoding: Encoding, buf: &[u8]) -> Option<MessageHeader> {
    let buf = buf.get(..MESSAGE_HEADER_LEN)?;
    Some(match encoding {
        Encoding::LittleEndian => read_header::<LittleEndian>(buf),
        Encoding::BigEndian => read_header::<BigEndian>(buf),
    })
}

fn read_header<B: ByteOrder>(buf: &[u8]) -> MessageHeader {
    MessageHeader {
        block_length: B::read_u16(&buf[0..2]),
        template_id: B::read_u16(&buf[2..4]),
        schema_id: B::read_u16(&buf[4..6]),
        version: B::read_u16(&buf[6..8]),
    }
}

pub(crate) fn read_tick_block(encoding: Encoding, block: &[u8]) -> Option<WireTick> {
    let block = block.get(..TICK_BLOCK_LEN as usize)?;
    Some(match encoding {
        Encoding::LittleEndian => read_block::<LittleEndian>(block),
        Encoding::BigEndian => read_block::<BigEndian>(block),
    })
}

fn read_block<B: ByteOrder>(block: &[u8]) -> WireTick {
    WireTick {
        symbol_id: B::read_u32(&block[SYMBOL_ID_OFFSET..SYMBOL_ID_OFFSET + 4]),
        price_exponent: block[PRICE_EXPONENT_OFFSET] as i8,
        price_mantissa: B::read_i64(&block[PRICE_MANTISSA_OFFSET..PRICE_MANTISSA_OFFSET + 8]),
        ts_unix_ms: B::read_i64(&block[TS_OFFSET..TS_OFFSET + 8]),
    }
}

pub(crate) fn write_frame_header(
    out: &mut [u8],
    message_length: u32,
    encoding: Encoding,
    header: MessageHeader,
) {
    BigEndian::write_u32(&mut out[0..4], message_length);
    BigEndian::write_u16(&mut out[4..6], encoding.marker());
    match encoding {
        Encoding::LittleEndian => write_header::<LittleEndian>(&mut out[SOFH_LEN..], header),
        Encoding::BigEndian => write_header::<BigEndian>(&mut out[SOFH_LEN..], header),
    }
}

fn write_header<B: ByteOrder>(out: &mut [u8], header: MessageHeader) {
    B::write_u16(&mut out[0..2], header.block_length);
    B::write_u16(&mut out[2..4], header.template_id);
    B::write_u16(&mut out[4..6], header.schema_id);
    B::write_u16(&mut out[6..8], header.version);
}

pub(crate) fn write_tick_block(out: &mut [u8], encoding: Encoding, tick: &WireTick) {
    match encoding {
        Encoding::LittleEndian => write_block::<LittleEndian>(out, tick),
        Encoding::BigEndian => write_block::<BigEndian>(out, tick),
    }
}

fn write_block<B: ByteOrder>(out: &mut [u8], tick: &WireTick) {
    B::write_u32(&mut out[SYMBOL_ID_OFFSET..SYMBOL_ID_OFFSET + 4], tick.symbol_id);
    out[PRICE_EXPONENT_OFFSET] = tick.price_exponent as u8;
    B::write_i64(
        &mut out[PRICE_MANTISSA_OFFSET..PRICE_MANTISSA_OFFSET + 8],
        tick.price_mantissa,
    );
    B::write_i64(&mut out[TS_OFFSET..TS_OFFSET + 8], tick.ts_unix_ms);
}

pub(crate) fn write_group_header(
    out: &mut [u8],
    encoding: Encoding,
    block_length: u16,
    count: u16,
) {
    match encoding {
        Encoding::LittleEndian => {
            LittleEndian::write_u16(&mut out[0..2], block_length);
            LittleEndian::write_u16(&mut out[2..4], count);
        }
        Encoding::BigEndian => {
            BigEndian::write_u16(&mut out[0..2], block_length);
            BigEndian::write_u16(&mut out[2..4], count);
        }
    }
}

pub(crate) fn write_var_data_len(out: &mut [u8], encoding: Encoding, len: u32) {
    match encoding {
        Encoding::LittleEndian => LittleEndian::write_u32(&mut out[0..4], len),
        Encoding::BigEndian => BigEndian::write_u32(&mut out[0..4], len),
    }
}

/// Walks the trailing sections inside `body` and returns the bytes they
/// occupy.
pub(crate) fn trailing_len(
    encoding: Encoding,
    sections: &[Section],
    body: &[u8],
) -> Result<usize, MalformedReason> {
    let mut cursor = 0usize;
    for section in sections {
        let (header_len, payload_len) = match section {
            Section::Group => {
                let header = section_header(body, cursor, GROUP_HEADER_LEN)?;
                let (block_length, count) = match encoding {
                    Encoding::LittleEndian => (
                        LittleEndian::read_u16(&header[0..2]),
                        LittleEndian::read_u16(&header[2..4]),
                    ),
                    Encoding::BigEndian => (
                        BigEndian::read_u16(&header[0..2]),
                        BigEndian::read_u16(&header[2..4]),
                    ),
                };
                (GROUP_HEADER_LEN, block_length as usize * count as usize)
            }
            Section::VarData => {
                let header = section_header(body, cursor, VAR_DATA_HEADER_LEN)?;
                let len = match encoding {
                    Encoding::LittleEndian => LittleEndian::read_u32(header),
                    Encoding::BigEndian => BigEndian::read_u32(header),
                };
                (VAR_DATA_HEADER_LEN, len as usize)
            }
        };
        let needed = cursor
            .checked_add(header_len)
            .and_then(|n| n.checked_add(payload_len))
            .ok_or(MalformedReason::SectionOverrun {
                needed: usize::MAX,
                capacity: body.len(),
            })?;
        if needed > body.len() {
            return Err(MalformedReason::SectionOverrun {
                needed,
                capacity: body.len(),
            });
        }
        cursor = needed;
    }
    Ok(cursor)
}

fn section_header(body: &[u8], cursor: usize, len: usize) -> Result<&[u8], MalformedReason> {
    body.get(cursor..cursor + len)
        .ok_or(MalformedReason::SectionOverrun {
            needed: cursor + len,
            capacity: body.len(),
        })
}

/// Rescales a decimal wire price to 1e-8 units without losing precision.
pub fn to_px_e8(mantissa: i64, exponent: i8) -> Result<u64, MalformedReason> {
    if mantissa == INT64_NULL {
        return Err(MalformedReason::NullPrice);
    }
    if mantissa < 0 {
        return Err(MalformedReason::NegativePrice(mantissa));
    }
    if mantissa == 0 {
        return Ok(0);
    }
    let value = mantissa as u64;
    let shift = exponent as i32 - PX_E8_EXPONENT;
    if shift >= 0 {
        10u64
            .checked_pow(shift as u32)
            .and_then(|scale| value.checked_mul(scale))
            .ok_or(MalformedReason::PriceOverflow { mantissa, exponent })
    } else {
        match 10u64.checked_pow(shift.unsigned_abs()) {
            Some(divisor) if value % divisor == 0 => Ok(value / divisor),
            _ => Err(MalformedReason::PriceInexact { mantissa, exponent }),
        }
    }
}

pub fn to_unix_ms(ts: i64) -> Result<u64, MalformedReason> {
    u64::try_from(ts).map_err(|_| MalformedReason::TimestampOutOfRange(ts))
}
