//! Punctured encoding and depuncturing for rate-compatible codes
//!
//! Puncturing deletes pattern-selected output symbols of a mother code so
//! the channel carries fewer symbols. On the receive side the deleted
//! positions are refilled with a neutral soft value before the symbols reach
//! the decoder; the neutral value is equidistant from both levels, so
//! erasures shift every path metric by the same amount and leave the
//! survivor ordering untouched.
//!
//! The puncture pattern restarts at index 0 on every call; callers chaining
//! differently-punctured segments (as DAB radio does) advance their symbol
//! buffers by the returned counts.

use crate::encoder::ConvolutionalEncoder;
use crate::metric::{ErrorMetric, SoftSymbol};
use crate::{Error, ViterbiDecoder};

/// Encodes input bytes and appends only the pattern-selected output symbols.
///
/// The encoder is not reset, so consecutive calls continue one mother-code
/// stream.
///
/// # Parameters
///
/// - `encoder`: Encoder to run.
///
/// - `input_bytes`: Data bytes to encode.
///
/// - `puncture_pattern`: `true` entries keep the corresponding mother-code
///   symbol, `false` entries delete it; the pattern repeats cyclically.
///
/// - `soft_decision_high`: Soft value of a transmitted `1` bit.
///
/// - `soft_decision_low`: Soft value of a transmitted `0` bit.
///
/// - `output_symbols`: Buffer the surviving symbols are appended to.
///
/// # Returns
///
/// - `total_appended`: Number of symbols appended to `output_symbols`.
pub fn encode_punctured_data<S: SoftSymbol>(
    encoder: &mut dyn ConvolutionalEncoder,
    input_bytes: &[u8],
    puncture_pattern: &[bool],
    soft_decision_high: S,
    soft_decision_low: S,
    output_symbols: &mut Vec<S>,
) -> usize {
    let rate = encoder.rate();
    let mut output = vec![0u8; rate];
    let mut pattern_index = 0usize;
    let mut total_appended = 0usize;
    for &byte in input_bytes {
        encoder.consume_byte(byte, &mut output);
        total_appended += push_punctured_symbols(
            &output,
            8 * rate,
            puncture_pattern,
            &mut pattern_index,
            soft_decision_high,
            soft_decision_low,
            output_symbols,
        );
    }
    total_appended
}

/// Encodes the `K-1` zero tail bits and appends the pattern-selected symbols.
///
/// # Parameters
///
/// As for [`encode_punctured_data`], without the input bytes.
///
/// # Returns
///
/// - `total_appended`: Number of symbols appended to `output_symbols`.
pub fn encode_punctured_tail<S: SoftSymbol>(
    encoder: &mut dyn ConvolutionalEncoder,
    puncture_pattern: &[bool],
    soft_decision_high: S,
    soft_decision_low: S,
    output_symbols: &mut Vec<S>,
) -> usize {
    let rate = encoder.rate();
    let mut output = vec![0u8; rate];
    let mut pattern_index = 0usize;
    let mut total_appended = 0usize;
    let mut remaining_tail_bits = encoder.constraint_length() - 1;
    while remaining_tail_bits > 0 {
        let bits_this_byte = remaining_tail_bits.min(8);
        encoder.consume_byte(0x00, &mut output);
        total_appended += push_punctured_symbols(
            &output,
            bits_this_byte * rate,
            puncture_pattern,
            &mut pattern_index,
            soft_decision_high,
            soft_decision_low,
            output_symbols,
        );
        remaining_tail_bits -= bits_this_byte;
    }
    total_appended
}

/// Appends the pattern-selected symbols of one encoder output buffer.
fn push_punctured_symbols<S: SoftSymbol>(
    output: &[u8],
    total_bits: usize,
    puncture_pattern: &[bool],
    pattern_index: &mut usize,
    soft_decision_high: S,
    soft_decision_low: S,
    output_symbols: &mut Vec<S>,
) -> usize {
    let mut total_appended = 0usize;
    for i in 0 .. total_bits {
        let transmitted = puncture_pattern[*pattern_index];
        *pattern_index = (*pattern_index + 1) % puncture_pattern.len();
        if transmitted {
            let bit = (output[i / 8] >> (i % 8)) & 1;
            output_symbols.push(S::from_bit(bit != 0, soft_decision_high, soft_decision_low));
            total_appended += 1;
        }
    }
    total_appended
}

/// Feeds `requested_mother_symbols` mother-code symbols into the decoder,
/// reading received symbols for pattern-kept positions and substituting
/// `erasure_value` for deleted ones.
///
/// # Parameters
///
/// - `decoder`: Decoder to advance.
///
/// - `received_symbols`: Channel symbols for this punctured segment.
///
/// - `puncture_pattern`: Pattern the segment was punctured with; restarts at
///   index 0.
///
/// - `requested_mother_symbols`: Mother-code symbols to reconstruct; must be
///   a multiple of the code rate.
///
/// - `erasure_value`: Neutral value for deleted positions (usually
///   [`SoftSymbol::NEUTRAL`]).
///
/// # Returns
///
/// - `total_consumed`: Number of received symbols consumed; the caller
///   advances its buffer by this count before the next segment.
///
/// # Errors
///
/// Returns an error if `requested_mother_symbols` is not a multiple of the
/// code rate, if `received_symbols` runs out before the request is
/// satisfied, or if the decoder's decisions buffer fills up.
pub fn update_punctured<M: ErrorMetric>(
    decoder: &mut ViterbiDecoder<M>,
    received_symbols: &[M::Soft],
    puncture_pattern: &[bool],
    requested_mother_symbols: usize,
    erasure_value: M::Soft,
) -> Result<usize, Error> {
    let rate = decoder.rate();
    if requested_mother_symbols % rate != 0 {
        return Err(Error::InvalidInput(format!(
            "Requested symbol count {requested_mother_symbols} is not a multiple of the \
             code rate {rate}",
        )));
    }

    let mut symbols = vec![erasure_value; rate];
    let mut total_consumed = 0usize;
    let mut pattern_index = 0usize;
    let mut total_emitted = 0usize;
    while total_emitted < requested_mother_symbols {
        for symbol in symbols.iter_mut() {
            let transmitted = puncture_pattern[pattern_index];
            pattern_index = (pattern_index + 1) % puncture_pattern.len();
            if transmitted {
                let Some(&received) = received_symbols.get(total_consumed) else {
                    return Err(Error::InvalidInput(format!(
                        "Ran out of received symbols after {total_consumed} while \
                         reconstructing {requested_mother_symbols}",
                    )));
                };
                *symbol = received;
                total_consumed += 1;
            } else {
                *symbol = erasure_value;
            }
            total_emitted += 1;
        }
        decoder.update(&symbols)?;
    }
    Ok(total_consumed)
}

#[cfg(test)]
mod tests_of_puncture {
    use std::sync::Arc;

    use super::*;
    use crate::{encoder_for_code, utils, BranchTable, Code, DecodingMode, SimdType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pattern(bits: &[u8]) -> Vec<bool> {
        bits.iter().map(|&b| b != 0).collect()
    }

    #[test]
    fn test_punctured_encode_counts() {
        let code = Code::voyager();
        let mut encoder = encoder_for_code(&code);
        let puncture = pattern(&[1, 1, 1, 0]);
        let mut symbols = Vec::<i16>::new();
        encoder.reset();
        let appended =
            encode_punctured_data(encoder.as_mut(), &[0xAB; 4], &puncture, 127, -127, &mut symbols);
        // 64 mother symbols, every 4th deleted
        assert_eq!(appended, 48);
        assert_eq!(symbols.len(), 48);
        let appended =
            encode_punctured_tail(encoder.as_mut(), &puncture, 127i16, -127, &mut symbols);
        // 12 tail symbols, 3 deleted
        assert_eq!(appended, 9);
    }

    #[test]
    fn test_punctured_roundtrip_rate_two_thirds() {
        // Voyager punctured 4 -> 3 symbols
        let code = Code::voyager();
        let mode = DecodingMode::<u16>::soft16(code.rate);
        let puncture = pattern(&[1, 1, 1, 0]);
        let mut rng = StdRng::seed_from_u64(17);
        let input_bytes = utils::random_bytes(32, &mut rng);

        let mut encoder = encoder_for_code(&code);
        let mut symbols = Vec::<i16>::new();
        encoder.reset();
        encode_punctured_data(
            encoder.as_mut(),
            &input_bytes,
            &puncture,
            mode.soft_decision_high,
            mode.soft_decision_low,
            &mut symbols,
        );
        encode_punctured_tail(
            encoder.as_mut(),
            &puncture,
            mode.soft_decision_high,
            mode.soft_decision_low,
            &mut symbols,
        );

        let branch_table = Arc::new(
            BranchTable::new(&code, mode.soft_decision_high, mode.soft_decision_low).unwrap(),
        );
        let mut decoder = crate::ViterbiDecoder::<u16>::new(branch_table, mode.decoder_config);
        let total_bits = input_bytes.len() * 8;
        decoder.set_traceback_length(total_bits);
        decoder.reset(0);
        let mother_symbols = (total_bits + code.constraint_length - 1) * code.rate;
        let consumed = update_punctured(
            &mut decoder,
            &symbols,
            &puncture,
            mother_symbols,
            i16::NEUTRAL,
        )
        .unwrap();
        assert_eq!(consumed, symbols.len());

        let mut decoded = vec![0u8; input_bytes.len()];
        decoder.chainback(&mut decoded, total_bits, 0).unwrap();
        assert_eq!(decoded, input_bytes);
        // Every erased symbol is 127 away from both levels, so the winning
        // path carries exactly that much error.
        let total_erased = (mother_symbols - symbols.len()) as u64;
        assert_eq!(decoder.get_error(0), 127 * total_erased);
    }

    #[test]
    fn test_dab_fast_information_channel() {
        // ETSI EN 300 401 clause 11.2: PI_16 and PI_15 data blocks with a
        // PI_X-punctured 24-bit tail over the K=7 R=1/4 mother code.
        let pi_16 = pattern(&[
            1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, //
            1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0,
        ]);
        let pi_15 = pattern(&[
            1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, //
            1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 0, 0,
        ]);
        let pi_x = pattern(&[
            1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0,
        ]);
        const PI_BITS: usize = 32;
        const PI_16_BLOCKS: usize = 21;
        const PI_15_BLOCKS: usize = 3;

        let code = Code::dab_radio();
        let mode = DecodingMode::<u16>::soft16(code.rate);
        let total_data_bits = PI_BITS * PI_16_BLOCKS + PI_BITS * PI_15_BLOCKS;
        let total_data_bytes = total_data_bits / 8;

        let mut rng = StdRng::seed_from_u64(23);
        let input_bytes = utils::random_bytes(total_data_bytes, &mut rng);

        // Punctured encoding, one 32-bit block at a time
        let mut encoder = encoder_for_code(&code);
        encoder.reset();
        let mut symbols = Vec::<i16>::new();
        let mut segment_lengths = Vec::new();
        let mut input_offset = 0usize;
        let mut pi_16_symbols = 0usize;
        for _ in 0 .. PI_16_BLOCKS {
            pi_16_symbols += encode_punctured_data(
                encoder.as_mut(),
                &input_bytes[input_offset .. input_offset + PI_BITS / 8],
                &pi_16,
                mode.soft_decision_high,
                mode.soft_decision_low,
                &mut symbols,
            );
            input_offset += PI_BITS / 8;
        }
        segment_lengths.push(pi_16_symbols);
        let mut pi_15_symbols = 0usize;
        for _ in 0 .. PI_15_BLOCKS {
            pi_15_symbols += encode_punctured_data(
                encoder.as_mut(),
                &input_bytes[input_offset .. input_offset + PI_BITS / 8],
                &pi_15,
                mode.soft_decision_high,
                mode.soft_decision_low,
                &mut symbols,
            );
            input_offset += PI_BITS / 8;
        }
        segment_lengths.push(pi_15_symbols);
        segment_lengths.push(encode_punctured_tail(
            encoder.as_mut(),
            &pi_x,
            mode.soft_decision_high,
            mode.soft_decision_low,
            &mut symbols,
        ));

        for simd_type in [SimdType::Scalar, SimdType::Sse, SimdType::Avx, SimdType::Neon] {
            if !simd_type.is_supported() {
                continue;
            }
            let branch_table = Arc::new(
                BranchTable::new(&code, mode.soft_decision_high, mode.soft_decision_low).unwrap(),
            );
            let mut decoder = crate::ViterbiDecoder::<u16>::with_simd(
                branch_table,
                mode.decoder_config,
                simd_type,
            )
            .unwrap();
            decoder.set_traceback_length(total_data_bits);
            decoder.reset(0);

            let mut remaining = symbols.as_slice();
            let consumed = update_punctured(
                &mut decoder,
                remaining,
                &pi_16,
                PI_BITS * code.rate * PI_16_BLOCKS,
                i16::NEUTRAL,
            )
            .unwrap();
            assert_eq!(consumed, segment_lengths[0]);
            remaining = &remaining[consumed ..];
            let consumed = update_punctured(
                &mut decoder,
                remaining,
                &pi_15,
                PI_BITS * code.rate * PI_15_BLOCKS,
                i16::NEUTRAL,
            )
            .unwrap();
            assert_eq!(consumed, segment_lengths[1]);
            remaining = &remaining[consumed ..];
            let consumed =
                update_punctured(&mut decoder, remaining, &pi_x, 24, i16::NEUTRAL).unwrap();
            assert_eq!(consumed, segment_lengths[2]);
            assert_eq!(remaining.len(), consumed);

            let mut decoded = vec![0u8; total_data_bytes];
            decoder.chainback(&mut decoded, total_data_bits, 0).unwrap();
            assert_eq!(decoded, input_bytes, "on {simd_type}");
            assert_eq!(
                utils::bit_error_count(&decoded, &input_bytes),
                0,
                "on {simd_type}"
            );
        }
    }

    #[test]
    fn test_update_punctured_preconditions() {
        let code = Code::voyager();
        let mode = DecodingMode::<u16>::soft16(code.rate);
        let branch_table = Arc::new(
            BranchTable::new(&code, mode.soft_decision_high, mode.soft_decision_low).unwrap(),
        );
        let mut decoder = crate::ViterbiDecoder::<u16>::new(branch_table, mode.decoder_config);
        decoder.set_traceback_length(64);
        decoder.reset(0);
        let puncture = pattern(&[1, 1, 1, 0]);
        // Request not a multiple of the rate
        assert!(update_punctured(&mut decoder, &[0i16; 8], &puncture, 7, 0).is_err());
        // Received symbols run out
        assert!(update_punctured(&mut decoder, &[0i16; 2], &puncture, 8, 0).is_err());
    }
}
