mod support;

use proptest::prelude::*;

use sbe_tick_decoder::decoder_sbe::DecodeResult;
use sbe_tick_decoder::encoder::TickEncoder;
use sbe_tick_decoder::error::MalformedReason;
use sbe_tick_decoder::sbe::Encoding;
use sbe_tick_decoder::types::RawTick;

use support::*;

fn any_tick() -> impl Strategy<Value = RawTick> {
    (any::<u32>(), 0..=i64::MAX as u64, 0..=i64::MAX as u64)
        .prop_map(|(symbol_id, px_e8, ts)| RawTick::new(symbol_id, px_e8, ts))
}

fn any_encoding() -> impl Strategy<Value = Encoding> {
    prop_oneof![Just(Encoding::LittleEndian), Just(Encoding::BigEndian)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn encoded_ticks_decode_unchanged(tick in any_tick(), encoding in any_encoding()) {
        let buf = TickEncoder::new(encoding).encode_to_vec(&[tick]).unwrap();
        let mut decoder = decoder();
        prop_assert_eq!(decoder.decode_next(&buf).unwrap(), DecodeResult::Tick(tick));
        prop_assert_eq!(decoder.cursor(), buf.len());
    }

    #[test]
    fn every_strict_prefix_needs_more_data(tick in any_tick(), cut in 0usize..38) {
        let buf = encode(&[tick]);
        let mut decoder = decoder();
        prop_assert_eq!(decoder.decode_next(&buf[..cut]).unwrap(), DecodeResult::NeedMoreData);
        prop_assert_eq!(decoder.cursor(), 0);
    }

    #[test]
    fn chunked_stream_matches_individual_frames(
        ticks in prop::collection::vec(any_tick(), 1..24),
        chunk in 1usize..64,
    ) {
        let stream = encode(&ticks);
        let mut decoder = decoder();
        let mut buf = Vec::new();
        let mut fed = 0usize;
        let mut decoded = Vec::new();

        loop {
            match decoder.decode_next(&buf).unwrap() {
                DecodeResult::Tick(tick) => decoded.push(tick),
                DecodeResult::NeedMoreData => {
                    let consumed = decoder.take_consumed();
                    buf.drain(..consumed);
                    let end = (fed + chunk).min(stream.len());
                    buf.extend_from_slice(&stream[fed..end]);
                    fed = end;
                    if fed == stream.len() {
                        decoder.close();
                    }
                }
                DecodeResult::EndOfStream => break,
                DecodeResult::Malformed(reason) => {
                    return Err(TestCaseError::fail(format!("unexpected {reason}")));
                }
            }
        }

        prop_assert_eq!(decoded, ticks);
        prop_assert_eq!(decoder.stats().bytes_consumed, stream.len() as u64);
    }

    #[test]
    fn arbitrary_bytes_never_overrun(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut decoder = decoder();
        decoder.close();
        let mut calls = 0usize;
        loop {
            let result = decoder.decode_next(&bytes).unwrap();
            prop_assert!(decoder.cursor() <= bytes.len());
            if result == DecodeResult::EndOfStream {
                break;
            }
            calls += 1;
            prop_assert!(calls <= bytes.len() + 1, "no progress");
        }
        let stats = decoder.stats();
        prop_assert!(stats.bytes_consumed + stats.bytes_discarded <= bytes.len() as u64);
    }

    #[test]
    fn large_exponents_overflow(mantissa in 1i64..=i64::MAX, exponent in 12i8..=i8::MAX) {
        let buf = encode_wire(
            &TickEncoder::default(),
            wire(1, exponent, mantissa, TS_BASE as i64),
        );
        prop_assert_eq!(
            decoder().decode_next(&buf).unwrap(),
            DecodeResult::Malformed(MalformedReason::PriceOverflow { mantissa, exponent })
        );
    }
}
