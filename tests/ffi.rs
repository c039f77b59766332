mod support;

use std::ptr;

use sbe_tick_decoder::decoder_sbe::SbeDecoder;
use sbe_tick_decoder::encoder::TickEncoder;
use sbe_tick_decoder::ffi::{
    sbe_decode_next, sbe_decoder_cleanup, sbe_decoder_close, sbe_decoder_init,
    sbe_decoder_init_with, sbe_decoder_stats, SbeDecoderStats, SBE_POLICY_HALT, SBE_POLICY_SKIP,
    SBE_STATUS_END_OF_STREAM, SBE_STATUS_INVALID_ARGUMENT, SBE_STATUS_MALFORMED,
    SBE_STATUS_NEED_MORE_DATA, SBE_STATUS_TICK,
};
use sbe_tick_decoder::types::RawTick;

use support::*;

fn new_handle() -> *mut SbeDecoder {
    let mut handle: *mut SbeDecoder = ptr::null_mut();
    assert_eq!(unsafe { sbe_decoder_init(&mut handle) }, 0);
    assert!(!handle.is_null());
    handle
}

#[test]
fn status_codes_follow_the_stream() {
    let ticks = sample_ticks(2);
    let mut stream = encode(&ticks[..1]);
    TickEncoder::default()
        .template_id(0xFFFF)
        .encode_tick(&ticks[0], &mut stream)
        .unwrap();
    stream.extend(encode(&ticks[1..]));

    let mut handle = new_handle();
    let mut out = RawTick::default();
    let mut consumed = usize::MAX;
    let mut offset = 0usize;
    let mut statuses = Vec::new();
    let mut decoded = Vec::new();

    // Feed the first 20 bytes alone, then the rest.
    let mut available = 20usize;
    loop {
        let status = unsafe {
            sbe_decode_next(
                handle,
                stream[offset..].as_ptr(),
                available - offset,
                &mut out,
                &mut consumed,
            )
        };
        offset += consumed;
        statuses.push(status);
        match status {
            SBE_STATUS_TICK => decoded.push(out),
            SBE_STATUS_NEED_MORE_DATA if available < stream.len() => available = stream.len(),
            SBE_STATUS_NEED_MORE_DATA => assert_eq!(unsafe { sbe_decoder_close(handle) }, 0),
            SBE_STATUS_MALFORMED => {}
            SBE_STATUS_END_OF_STREAM => break,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(decoded, ticks);
    assert_eq!(offset, stream.len());
    assert_eq!(
        statuses,
        vec![
            SBE_STATUS_NEED_MORE_DATA,
            SBE_STATUS_TICK,
            SBE_STATUS_MALFORMED,
            SBE_STATUS_TICK,
            SBE_STATUS_NEED_MORE_DATA,
            SBE_STATUS_END_OF_STREAM,
        ]
    );

    let mut stats = SbeDecoderStats::default();
    assert_eq!(unsafe { sbe_decoder_stats(handle, &mut stats) }, 0);
    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.bytes_consumed, 76);
    assert_eq!(stats.bytes_discarded, 38);

    unsafe { sbe_decoder_cleanup(&mut handle) };
    assert!(handle.is_null());
    unsafe { sbe_decoder_cleanup(&mut handle) };
}

#[test]
fn writes_tick_to_unaligned_output() {
    let expected = tick(77, 5_000_000_000, 9);
    let buf = encode(&[expected]);
    let mut handle = new_handle();

    let mut storage = [0u8; 1 + std::mem::size_of::<RawTick>()];
    let out = unsafe { storage.as_mut_ptr().add(1) } as *mut RawTick;
    let mut consumed = 0usize;
    let status = unsafe { sbe_decode_next(handle, buf.as_ptr(), buf.len(), out, &mut consumed) };

    assert_eq!(status, SBE_STATUS_TICK);
    assert_eq!(consumed, buf.len());
    let written: [u8; 20] = storage[1..].try_into().unwrap();
    assert_eq!(RawTick::from_bytes(&written), expected);

    unsafe { sbe_decoder_cleanup(&mut handle) };
}

#[test]
fn null_arguments_are_rejected() {
    let buf = encode(&[tick(1, 100, 0)]);
    let mut handle = new_handle();
    let mut out = RawTick::default();
    let mut consumed = 0usize;

    unsafe {
        assert_eq!(sbe_decoder_init(ptr::null_mut()), SBE_STATUS_INVALID_ARGUMENT);
        assert_eq!(sbe_decoder_close(ptr::null_mut()), SBE_STATUS_INVALID_ARGUMENT);
        assert_eq!(
            sbe_decode_next(ptr::null_mut(), buf.as_ptr(), buf.len(), &mut out, &mut consumed),
            SBE_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(
            sbe_decode_next(handle, ptr::null(), buf.len(), &mut out, &mut consumed),
            SBE_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(
            sbe_decode_next(handle, buf.as_ptr(), buf.len(), ptr::null_mut(), &mut consumed),
            SBE_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(
            sbe_decode_next(handle, buf.as_ptr(), buf.len(), &mut out, ptr::null_mut()),
            SBE_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(
            sbe_decoder_stats(ptr::null(), &mut SbeDecoderStats::default()),
            SBE_STATUS_INVALID_ARGUMENT
        );
        assert_eq!(
            sbe_decoder_stats(handle, ptr::null_mut()),
            SBE_STATUS_INVALID_ARGUMENT
        );

        // A null buffer is fine when it is empty.
        assert_eq!(
            sbe_decode_next(handle, ptr::null(), 0, &mut out, &mut consumed),
            SBE_STATUS_NEED_MORE_DATA
        );
        assert_eq!(consumed, 0);

        sbe_decoder_cleanup(ptr::null_mut());
        sbe_decoder_cleanup(&mut handle);
    }
    assert!(handle.is_null());
}

#[test]
fn init_with_applies_policy_and_limit() {
    let mut stream = Vec::new();
    TickEncoder::default()
        .template_id(42)
        .encode_tick(&tick(1, 100, 0), &mut stream)
        .unwrap();
    let mut out = RawTick::default();
    let mut consumed = usize::MAX;

    let mut halting: *mut SbeDecoder = ptr::null_mut();
    assert_eq!(unsafe { sbe_decoder_init_with(SBE_POLICY_HALT, 0, &mut halting) }, 0);
    for _ in 0..2 {
        let status = unsafe {
            sbe_decode_next(halting, stream.as_ptr(), stream.len(), &mut out, &mut consumed)
        };
        assert_eq!(status, SBE_STATUS_MALFORMED);
        assert_eq!(consumed, 0);
    }
    unsafe { sbe_decoder_cleanup(&mut halting) };

    let mut oversized = Vec::new();
    TickEncoder::default()
        .block_length(100)
        .unwrap()
        .encode_tick(&tick(1, 100, 0), &mut oversized)
        .unwrap();
    let mut limited: *mut SbeDecoder = ptr::null_mut();
    assert_eq!(unsafe { sbe_decoder_init_with(SBE_POLICY_SKIP, 64, &mut limited) }, 0);
    let status = unsafe {
        sbe_decode_next(limited, oversized.as_ptr(), oversized.len(), &mut out, &mut consumed)
    };
    assert_eq!(status, SBE_STATUS_MALFORMED);
    assert!(consumed > 0);
    unsafe { sbe_decoder_cleanup(&mut limited) };

    let mut rejected: *mut SbeDecoder = ptr::null_mut();
    assert_eq!(
        unsafe { sbe_decoder_init_with(7, 0, &mut rejected) },
        SBE_STATUS_INVALID_ARGUMENT
    );
    assert!(rejected.is_null());
    assert_eq!(
        unsafe { sbe_decoder_init_with(SBE_POLICY_SKIP, 20, &mut rejected) },
        SBE_STATUS_INVALID_ARGUMENT
    );
    assert!(rejected.is_null());
}
