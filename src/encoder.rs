//! Convolutional encoders used to generate reference symbols

use crate::parity::parity;
use crate::Code;

/// Byte-oriented convolutional encoder
///
/// Consumes input bits MSB first and emits `R` output bits per input bit,
/// packed LSB first across the output bytes. The two implementations are
/// semantically identical; [`encoder_for_code`] picks between them by
/// constraint length.
pub trait ConvolutionalEncoder {
    /// Returns the constraint length of the code.
    fn constraint_length(&self) -> usize;

    /// Returns the inverse code rate.
    fn rate(&self) -> usize;

    /// Clears the shift register.
    fn reset(&mut self);

    /// Consumes one input byte and writes `8 * R` output bits into
    /// `output[0 .. R]`, packed LSB first.
    ///
    /// # Panics
    ///
    /// Panics if `output.len()` is less than the code rate.
    fn consume_byte(&mut self, input: u8, output: &mut [u8]);
}

/// Largest constraint length for which the table-driven encoder is built
pub const MAX_LOOKUP_CONSTRAINT_LENGTH: usize = 10;

/// Returns the preferred encoder for a code: table-driven for short
/// constraint lengths, shift-register otherwise.
#[must_use]
pub fn encoder_for_code(code: &Code) -> Box<dyn ConvolutionalEncoder> {
    if code.constraint_length <= MAX_LOOKUP_CONSTRAINT_LENGTH {
        Box::new(ConvolutionalEncoderLookup::new(code))
    } else {
        Box::new(ConvolutionalEncoderShiftRegister::new(code))
    }
}

/// Encoder that clocks a masked shift register one bit at a time
#[derive(Clone, Debug)]
pub struct ConvolutionalEncoderShiftRegister {
    constraint_length: usize,
    rate: usize,
    constraint_mask: u32,
    polynomials: Vec<u32>,
    register: u32,
}

impl ConvolutionalEncoderShiftRegister {
    /// Returns a shift-register encoder for the given code.
    #[must_use]
    pub fn new(code: &Code) -> Self {
        Self {
            constraint_length: code.constraint_length,
            rate: code.rate,
            constraint_mask: (1u32 << code.constraint_length) - 1,
            polynomials: code.polynomials.clone(),
            register: 0,
        }
    }
}

impl ConvolutionalEncoder for ConvolutionalEncoderShiftRegister {
    fn constraint_length(&self) -> usize {
        self.constraint_length
    }

    fn rate(&self) -> usize {
        self.rate
    }

    fn reset(&mut self) {
        self.register = 0;
    }

    fn consume_byte(&mut self, input: u8, output: &mut [u8]) {
        let rate = self.rate;
        assert!(output.len() >= rate, "output must hold {rate} bytes");
        for byte in output[.. rate].iter_mut() {
            *byte = 0;
        }

        let mut curr_bit = 0usize;
        for i in 0 .. 8 {
            let input_bit = u32::from((input >> (7 - i)) & 1);
            self.register = ((self.register << 1) | input_bit) & self.constraint_mask;
            for &poly in &self.polynomials {
                let output_bit = parity(poly & self.register);
                output[curr_bit / 8] |= output_bit << (curr_bit % 8);
                curr_bit += 1;
            }
        }
    }
}

/// Encoder that precomputes the outputs of every (state, input byte) pair
///
/// The table holds, for each of the `2^(K-1)` persistent register states and
/// each of the 256 input bytes, the `R` output bytes and the next state.
/// Memory grows as `2^(K-1) * 256 * (R + 2)` bytes, so this variant is only
/// built for `K <= 10`.
#[derive(Clone, Debug)]
pub struct ConvolutionalEncoderLookup {
    constraint_length: usize,
    rate: usize,
    /// Flattened output bytes, `rate` per (state, input byte) pair
    outputs: Vec<u8>,
    /// Next persistent state per (state, input byte) pair
    next_states: Vec<u16>,
    state: u16,
}

impl ConvolutionalEncoderLookup {
    /// Returns a table-driven encoder for the given code.
    #[must_use]
    pub fn new(code: &Code) -> Self {
        let num_states = code.num_states();
        let rate = code.rate;
        let mut outputs = vec![0u8; num_states * 256 * rate];
        let mut next_states = vec![0u16; num_states * 256];

        let mut reference = ConvolutionalEncoderShiftRegister::new(code);
        let state_mask = (num_states - 1) as u32;
        let mut symbols = vec![0u8; rate];
        for state in 0 .. num_states {
            for input in 0 ..= 255u8 {
                reference.register = state as u32;
                reference.consume_byte(input, &mut symbols);
                let entry = (state * 256 + usize::from(input)) * rate;
                outputs[entry .. entry + rate].copy_from_slice(&symbols);
                next_states[state * 256 + usize::from(input)] =
                    (reference.register & state_mask) as u16;
            }
        }

        Self {
            constraint_length: code.constraint_length,
            rate,
            outputs,
            next_states,
            state: 0,
        }
    }
}

impl ConvolutionalEncoder for ConvolutionalEncoderLookup {
    fn constraint_length(&self) -> usize {
        self.constraint_length
    }

    fn rate(&self) -> usize {
        self.rate
    }

    fn reset(&mut self) {
        self.state = 0;
    }

    fn consume_byte(&mut self, input: u8, output: &mut [u8]) {
        let rate = self.rate;
        assert!(output.len() >= rate, "output must hold {rate} bytes");
        let index = usize::from(self.state) * 256 + usize::from(input);
        output[.. rate].copy_from_slice(&self.outputs[index * rate .. (index + 1) * rate]);
        self.state = self.next_states[index];
    }
}

#[cfg(test)]
mod tests_of_encoders {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_shift_register_known_sequence() {
        // K=3, G = {0b111, 0b101}, input byte 0xA0 = bits 1,0,1,0,0,...
        // (MSB first). Registers: 1, 10, 101, 1010&111, ...
        let mut enc = ConvolutionalEncoderShiftRegister::new(&crate::Code::basic_k3());
        let mut output = [0u8; 2];
        enc.consume_byte(0xA0, &mut output);
        // bit 1: reg=001 -> G0: 1, G1: 1
        // bit 0: reg=010 -> G0: 1, G1: 0
        // bit 1: reg=101 -> G0: 0, G1: 0
        // bit 0: reg=010 -> G0: 1, G1: 0
        // bits 0: reg drains 100 -> (1, 1), then 000 -> (0, 0) onwards
        let expected_bits: [u8; 16] = [1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 0, 0, 0, 0, 0];
        for (i, &bit) in expected_bits.iter().enumerate() {
            assert_eq!((output[i / 8] >> (i % 8)) & 1, bit, "bit {i}");
        }
    }

    #[test]
    fn test_reset_clears_register() {
        let mut enc = ConvolutionalEncoderShiftRegister::new(&crate::Code::voyager());
        let mut first = [0u8; 2];
        let mut again = [0u8; 2];
        enc.consume_byte(0x5B, &mut first);
        enc.reset();
        enc.consume_byte(0x5B, &mut again);
        assert_eq!(first, again);
    }

    #[test]
    fn test_lookup_matches_shift_register() {
        for code in [
            crate::Code::basic_k3(),
            crate::Code::voyager(),
            crate::Code::dab_radio(),
            crate::Code::cdma_is95a(),
        ] {
            let mut lookup = ConvolutionalEncoderLookup::new(&code);
            let mut shift = ConvolutionalEncoderShiftRegister::new(&code);
            let mut rng = StdRng::seed_from_u64(42);
            let mut lookup_out = vec![0u8; code.rate];
            let mut shift_out = vec![0u8; code.rate];
            for _ in 0 .. 256 {
                let input: u8 = rng.random();
                lookup.consume_byte(input, &mut lookup_out);
                shift.consume_byte(input, &mut shift_out);
                assert_eq!(lookup_out, shift_out, "code {}", code.name);
            }
        }
    }

    #[test]
    fn test_encoder_for_code_picks_variant() {
        let short = encoder_for_code(&crate::Code::voyager());
        assert_eq!(short.constraint_length(), 7);
        let long = encoder_for_code(&crate::Code::cassini());
        assert_eq!(long.constraint_length(), 15);
        assert_eq!(long.rate(), 6);
    }
}
