//! Collection of useful functions for exercising encoders and decoders
//!
//! # Examples
//!
//! ```
//! use vitdec::{utils, Code, DecodingMode};
//!
//! let mut rng = rand::rng();
//! let mode = DecodingMode::<u16>::soft16(2);
//! let code = Code::voyager();
//! let mut encoder = vitdec::encoder_for_code(&code);
//! let input_bytes = utils::random_bytes(16, &mut rng);
//! let symbols = utils::encode_to_symbols(
//!     encoder.as_mut(),
//!     &input_bytes,
//!     mode.soft_decision_high,
//!     mode.soft_decision_low,
//! );
//! assert_eq!(symbols.len(), (16 * 8 + 6) * 2);
//! ```

use rand::Rng;

use crate::encoder::ConvolutionalEncoder;
use crate::metric::SoftSymbol;
use crate::parity::bitcount;

/// Scale of the inversion-noise level (a noise level of `NOISE_MAX` flips
/// roughly half of all symbols)
pub const NOISE_MAX: u64 = 100;

/// Returns the given number of random bytes.
///
/// # Parameters
///
/// - `num_bytes`: Number of random bytes to be generated.
///
/// - `rng`: Random number generator to be used.
pub fn random_bytes<R: Rng>(num_bytes: usize, rng: &mut R) -> Vec<u8> {
    (0 .. num_bytes).map(|_| rng.random()).collect()
}

/// Encodes input bytes into soft symbols, terminated with a `K-1`-bit tail
/// of zeros so the encoder ends in state 0.
///
/// # Parameters
///
/// - `encoder`: Encoder to run; it is reset first.
///
/// - `input_bytes`: Data bytes to encode.
///
/// - `soft_decision_high`: Soft value of a transmitted `1` bit.
///
/// - `soft_decision_low`: Soft value of a transmitted `0` bit.
///
/// # Returns
///
/// - `symbols`: `(8 * input_bytes.len() + K - 1) * R` soft symbols.
pub fn encode_to_symbols<S: SoftSymbol>(
    encoder: &mut dyn ConvolutionalEncoder,
    input_bytes: &[u8],
    soft_decision_high: S,
    soft_decision_low: S,
) -> Vec<S> {
    let rate = encoder.rate();
    let total_tail_bits = encoder.constraint_length() - 1;
    let total_bits = input_bytes.len() * 8 + total_tail_bits;
    let mut symbols = Vec::with_capacity(total_bits * rate);
    let mut output = vec![0u8; rate];

    let push_symbols = |output: &[u8], total_bits: usize, symbols: &mut Vec<S>| {
        for i in 0 .. total_bits {
            let bit = (output[i / 8] >> (i % 8)) & 1;
            symbols.push(S::from_bit(bit != 0, soft_decision_high, soft_decision_low));
        }
    };

    encoder.reset();
    for &byte in input_bytes {
        encoder.consume_byte(byte, &mut output);
        push_symbols(&output, 8 * rate, &mut symbols);
    }

    // Tail termination back to state 0
    let mut remaining_tail_bits = total_tail_bits;
    while remaining_tail_bits > 0 {
        let bits_this_byte = remaining_tail_bits.min(8);
        encoder.consume_byte(0x00, &mut output);
        push_symbols(&output, bits_this_byte * rate, &mut symbols);
        remaining_tail_bits -= bits_this_byte;
    }

    symbols
}

/// Adds uniform noise on `[0, noise_level]` to every symbol, then clamps the
/// symbols back into `[soft_decision_low, soft_decision_high]`.
///
/// # Parameters
///
/// - `symbols`: Symbols to perturb in place.
///
/// - `noise_level`: Largest noise magnitude to add.
///
/// - `soft_decision_low`: Lower clamp bound.
///
/// - `soft_decision_high`: Upper clamp bound.
///
/// - `rng`: Random number generator to be used.
pub fn add_uniform_noise<S: SoftSymbol, R: Rng>(
    symbols: &mut [S],
    noise_level: u64,
    soft_decision_low: S,
    soft_decision_high: S,
    rng: &mut R,
) {
    let low = soft_decision_low.to_i32();
    let high = soft_decision_high.to_i32();
    for symbol in symbols.iter_mut() {
        let noise = rng.random_range(0 ..= noise_level) as i32;
        let noisy = symbol.to_i32() + noise;
        *symbol = S::from_i32_clamped(noisy.clamp(low, high));
    }
}

/// Inverts each symbol with probability `noise_level / (2 * NOISE_MAX)`.
///
/// This is the hard-decision noise model: an inverted two-level symbol is a
/// bit flip.
///
/// # Parameters
///
/// - `symbols`: Symbols to perturb in place.
///
/// - `noise_level`: Noise level in `[0, NOISE_MAX]`.
///
/// - `rng`: Random number generator to be used.
pub fn add_inversion_noise<S: SoftSymbol, R: Rng>(
    symbols: &mut [S],
    noise_level: u64,
    rng: &mut R,
) {
    for symbol in symbols.iter_mut() {
        if rng.random_range(0 .. 2 * NOISE_MAX) <= noise_level {
            *symbol = symbol.invert();
        }
    }
}

/// Returns the number of differing bits between two byte sequences.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///   If the lengths differ, the longer sequence is effectively truncated to
///   the length of the shorter one.
pub fn bit_error_count(seq: &[u8], ref_seq: &[u8]) -> usize {
    seq.iter()
        .zip(ref_seq.iter())
        .map(|(&x, &y)| usize::from(bitcount(x ^ y)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoder_for_code, Code};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_bytes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(random_bytes(0, &mut rng).is_empty());
        let bytes = random_bytes(4096, &mut rng);
        assert_eq!(bytes.len(), 4096);
        let num_ones: usize = bytes.iter().map(|&b| usize::from(bitcount(b))).sum();
        // Roughly half of all bits should be set
        assert!(num_ones > 14000 && num_ones < 18000);
    }

    #[test]
    fn test_encode_to_symbols_length_and_tail() {
        let code = Code::voyager();
        let mut encoder = encoder_for_code(&code);
        let symbols = encode_to_symbols::<i16>(encoder.as_mut(), &[0x00, 0xFF], 127, -127);
        assert_eq!(symbols.len(), (16 + 6) * 2);
        // An all-zero input keeps the encoder in state 0: the first byte's
        // symbols all encode zero bits.
        for &symbol in &symbols[.. 16] {
            assert_eq!(symbol, -127);
        }
    }

    #[test]
    fn test_add_uniform_noise_respects_clamp() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut symbols = vec![127i16; 64];
        add_uniform_noise(&mut symbols, 1000, -127, 127, &mut rng);
        assert!(symbols.iter().all(|&s| s == 127));
        let mut symbols = vec![-127i16; 4096];
        add_uniform_noise(&mut symbols, 64, -127, 127, &mut rng);
        assert!(symbols.iter().all(|&s| (-127 ..= -63).contains(&s)));
        assert!(symbols.iter().any(|&s| s != -127));
    }

    #[test]
    fn test_add_inversion_noise_extremes() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut symbols = vec![1i8; 256];
        add_inversion_noise(&mut symbols, 0, &mut rng);
        // Noise level 0 still flips with probability 1/200
        assert!(symbols.iter().filter(|&&s| s == -1).count() <= 16);
        let mut symbols = vec![1i8; 256];
        add_inversion_noise(&mut symbols, NOISE_MAX, &mut rng);
        let flipped = symbols.iter().filter(|&&s| s == -1).count();
        assert!(flipped > 64 && flipped < 192);
    }

    #[test]
    fn test_bit_error_count() {
        assert_eq!(bit_error_count(&[], &[0xFF]), 0);
        assert_eq!(bit_error_count(&[0xFF], &[0xFF]), 0);
        assert_eq!(bit_error_count(&[0xFF], &[0x00]), 8);
        assert_eq!(bit_error_count(&[0b1010, 0xF0], &[0b0101, 0xF1]), 5);
    }
}
