//! Reference encoder for the tick schema. Used to build replay files and to
//! check the decoder against known frames.

use crate::error::EncodeError;
use crate::sbe::{
    write_frame_header, write_group_header, write_tick_block, write_var_data_len, Encoding,
    MessageHeader, WireTick, FRAME_HEADER_LEN, GROUP_HEADER_LEN, TICK_BLOCK_LEN,
    TICK_SCHEMA_ID, TICK_SCHEMA_VERSION, TICK_TEMPLATE_ID, VAR_DATA_HEADER_LEN,
};
use crate::types::RawTick;

const PX_E8_EXPONENT: i8 = -8;

/// A section appended after the root block, matching
/// [`crate::sbe::Section`] order in the decoder's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailingSection {
    /// Group with `count` zero-filled entries of `block_length` bytes.
    Group { block_length: u16, count: u16 },
    VarData(Vec<u8>),
}

impl TrailingSection {
    fn encoded_len(&self) -> usize {
        match self {
            TrailingSection::Group {
                block_length,
                count,
            } => GROUP_HEADER_LEN + *block_length as usize * *count as usize,
            TrailingSection::VarData(bytes) => VAR_DATA_HEADER_LEN + bytes.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickEncoder {
    encoding: Encoding,
    template_id: u16,
    schema_id: u16,
    version: u16,
    block_length: u16,
    trailing: Vec<TrailingSection>,
}

impl Default for TickEncoder {
    fn default() -> Self {
        Self::new(Encoding::LittleEndian)
    }
}

impl TickEncoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            template_id: TICK_TEMPLATE_ID,
            schema_id: TICK_SCHEMA_ID,
            version: TICK_SCHEMA_VERSION,
            block_length: TICK_BLOCK_LEN,
            trailing: Vec::new(),
        }
    }

    pub fn template_id(mut self, template_id: u16) -> Self {
        self.template_id = template_id;
        self
    }

    pub fn schema_id(mut self, schema_id: u16) -> Self {
        self.schema_id = schema_id;
        self
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Root block length on the wire. Bytes past the tick fields are zeroed,
    /// as a later schema version appending fields would send them.
    pub fn block_length(mut self, block_length: u16) -> Result<Self, EncodeError> {
        if block_length < TICK_BLOCK_LEN {
            return Err(EncodeError::BlockTooShort {
                block_length,
                min: TICK_BLOCK_LEN,
            });
        }
        self.block_length = block_length;
        Ok(self)
    }

    pub fn trailing(mut self, trailing: Vec<TrailingSection>) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_LEN
            + self.block_length as usize
            + self
                .trailing
                .iter()
                .map(TrailingSection::encoded_len)
                .sum::<usize>()
    }

    /// Appends one frame carrying `tick` at exponent -8.
    pub fn encode_tick(&self, tick: &RawTick, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let price_mantissa =
            i64::try_from(tick.px_e8()).map_err(|_| EncodeError::PriceOutOfRange(tick.px_e8()))?;
        let ts_unix_ms = i64::try_from(tick.ts_unix_ms())
            .map_err(|_| EncodeError::TimestampOutOfRange(tick.ts_unix_ms()))?;
        self.encode_wire(
            &WireTick {
                symbol_id: tick.symbol_id(),
                price_exponent: PX_E8_EXPONENT,
                price_mantissa,
                ts_unix_ms,
            },
            out,
        )
    }

    /// Appends one frame with the given wire fields, unvalidated. Lets tests
    /// produce prices and timestamps the decoder must reject.
    pub fn encode_wire(&self, wire: &WireTick, out: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let frame_len = self.frame_len();
        let message_length =
            u32::try_from(frame_len).map_err(|_| EncodeError::FrameTooLarge(frame_len))?;

        let start = out.len();
        out.resize(start + frame_len, 0);
        let frame = &mut out[start..];

        write_frame_header(
            frame,
            message_length,
            self.encoding,
            MessageHeader {
                block_length: self.block_length,
                template_id: self.template_id,
                schema_id: self.schema_id,
                version: self.version,
            },
        );
        write_tick_block(&mut frame[FRAME_HEADER_LEN..], self.encoding, wire);

        let mut offset = FRAME_HEADER_LEN + self.block_length as usize;
        for section in &self.trailing {
            match section {
                TrailingSection::Group {
                    block_length,
                    count,
                } => {
                    write_group_header(&mut frame[offset..], self.encoding, *block_length, *count);
                }
                TrailingSection::VarData(bytes) => {
                    write_var_data_len(&mut frame[offset..], self.encoding, bytes.len() as u32);
                    let data = offset + VAR_DATA_HEADER_LEN;
                    frame[data..data + bytes.len()].copy_from_slice(bytes);
                }
            }
            offset += section.encoded_len();
        }

        Ok(frame_len)
    }

    pub fn encode_to_vec(&self, ticks: &[RawTick]) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(self.frame_len() * ticks.len());
        for tick in ticks {
            self.encode_tick(tick, &mut out)?;
        }
        Ok(out)
    }
}
