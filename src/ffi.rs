//! C ABI over [`SbeDecoder`]. See `include/sbe_tick_decoder.h`.
//!
//! Each `sbe_decode_next` call receives the caller's unconsumed bytes and
//! reports through `consumed` how many of them to drop before the next call.

use std::ptr;
use std::slice;

use crate::config::{DecoderConfig, MalformedPolicy};
use crate::decoder_sbe::{DecodeResult, DecodeStats, SbeDecoder};
use crate::types::RawTick;

pub const SBE_STATUS_TICK: i32 = 1;
pub const SBE_STATUS_END_OF_STREAM: i32 = 0;
pub const SBE_STATUS_NEED_MORE_DATA: i32 = -1;
pub const SBE_STATUS_MALFORMED: i32 = -2;
pub const SBE_STATUS_INVALID_ARGUMENT: i32 = -3;

pub const SBE_POLICY_SKIP: i32 = 0;
pub const SBE_POLICY_HALT: i32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SbeDecoderStats {
    pub ticks: u64,
    pub malformed: u64,
    pub need_more_data: u64,
    pub bytes_consumed: u64,
    pub bytes_discarded: u64,
}

impl From<DecodeStats> for SbeDecoderStats {
    fn from(stats: DecodeStats) -> Self {
        Self {
            ticks: stats.ticks,
            malformed: stats.malformed,
            need_more_data: stats.need_more_data,
            bytes_consumed: stats.bytes_consumed,
            bytes_discarded: stats.bytes_discarded,
        }
    }
}

/// Allocates a decoder with the default tick schema and skip policy.
///
/// # Safety
/// `out` must be null or valid for a pointer write.
#[no_mangle]
pub unsafe extern "C" fn sbe_decoder_init(out: *mut *mut SbeDecoder) -> i32 {
    sbe_decoder_init_with(SBE_POLICY_SKIP, 0, out)
}

/// Allocates a decoder with an explicit malformed-frame policy and frame
/// length limit. A `max_message_len` of 0 keeps the default limit.
///
/// # Safety
/// `out` must be null or valid for a pointer write.
#[no_mangle]
pub unsafe extern "C" fn sbe_decoder_init_with(
    policy: i32,
    max_message_len: usize,
    out: *mut *mut SbeDecoder,
) -> i32 {
    if out.is_null() {
        tracing::error!("sbe_decoder_init: null out pointer");
        return SBE_STATUS_INVALID_ARGUMENT;
    }
    let policy = match policy {
        SBE_POLICY_SKIP => MalformedPolicy::Skip,
        SBE_POLICY_HALT => MalformedPolicy::Halt,
        other => {
            tracing::error!("sbe_decoder_init: unknown policy {other}");
            *out = ptr::null_mut();
            return SBE_STATUS_INVALID_ARGUMENT;
        }
    };
    let mut config = DecoderConfig::default().with_policy(policy);
    if max_message_len != 0 {
        config = config.with_max_message_len(max_message_len);
    }

    match SbeDecoder::init(config) {
        Ok(decoder) => {
            *out = Box::into_raw(Box::new(decoder));
            0
        }
        Err(err) => {
            tracing::error!("sbe_decoder_init: {err}");
            *out = ptr::null_mut();
            SBE_STATUS_INVALID_ARGUMENT
        }
    }
}

/// # Safety
/// `decoder` must be null or a live handle from `sbe_decoder_init`.
#[no_mangle]
pub unsafe extern "C" fn sbe_decoder_close(decoder: *mut SbeDecoder) -> i32 {
    let Some(decoder) = decoder.as_mut() else {
        tracing::error!("sbe_decoder_close: null decoder");
        return SBE_STATUS_INVALID_ARGUMENT;
    };
    decoder.close();
    0
}

/// # Safety
/// `decoder` must be null or a live handle; `buf` must be valid for `len`
/// bytes (it may be null when `len` is 0); `out` and `consumed` must be null
/// or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn sbe_decode_next(
    decoder: *mut SbeDecoder,
    buf: *const u8,
    len: usize,
    out: *mut RawTick,
    consumed: *mut usize,
) -> i32 {
    if decoder.is_null() || out.is_null() || consumed.is_null() || (buf.is_null() && len > 0) {
        tracing::error!(
            decoder_null = decoder.is_null(),
            out_null = out.is_null(),
            consumed_null = consumed.is_null(),
            buf_null = buf.is_null(),
            len,
            "sbe_decode_next: invalid argument"
        );
        return SBE_STATUS_INVALID_ARGUMENT;
    }

    let decoder = &mut *decoder;
    let src: &[u8] = if len == 0 {
        &[]
    } else {
        slice::from_raw_parts(buf, len)
    };

    decoder.take_consumed();
    let result = decoder.decode_next(src);
    *consumed = decoder.take_consumed();

    match result {
        Ok(DecodeResult::Tick(tick)) => {
            out.write_unaligned(tick);
            SBE_STATUS_TICK
        }
        Ok(DecodeResult::EndOfStream) => SBE_STATUS_END_OF_STREAM,
        Ok(DecodeResult::NeedMoreData) => SBE_STATUS_NEED_MORE_DATA,
        Ok(DecodeResult::Malformed(_)) => SBE_STATUS_MALFORMED,
        Err(_) => SBE_STATUS_INVALID_ARGUMENT,
    }
}

/// # Safety
/// `decoder` must be null or a live handle; `out` must be null or valid for
/// writes.
#[no_mangle]
pub unsafe extern "C" fn sbe_decoder_stats(
    decoder: *const SbeDecoder,
    out: *mut SbeDecoderStats,
) -> i32 {
    let (Some(decoder), false) = (decoder.as_ref(), out.is_null()) else {
        tracing::error!("sbe_decoder_stats: invalid argument");
        return SBE_STATUS_INVALID_ARGUMENT;
    };
    out.write(decoder.stats().into());
    0
}

/// Releases the decoder and nulls the caller's handle, so a second call is a
/// no-op.
///
/// # Safety
/// `decoder` must be null or point to null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn sbe_decoder_cleanup(decoder: *mut *mut SbeDecoder) {
    if decoder.is_null() || (*decoder).is_null() {
        return;
    }
    let mut owned = Box::from_raw(*decoder);
    owned.cleanup();
    drop(owned);
    *decoder = ptr::null_mut();
}
