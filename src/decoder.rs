//! Public decoder type and runtime trellis-engine selection

use std::sync::Arc;

use crate::branch_table::BranchTable;
use crate::core::DecoderCore;
use crate::metric::{DecoderConfig, ErrorMetric};
use crate::Error;

/// Trellis engine families
///
/// [`ViterbiDecoder::new`] probes the running CPU and picks the fastest
/// engine that is valid for the code; scalar is always valid.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum SimdType {
    /// Portable scalar butterfly
    Scalar,
    /// 128-bit SSE butterfly (x86-64)
    Sse,
    /// 256-bit AVX2 butterfly (x86-64)
    Avx,
    /// 128-bit NEON butterfly (AArch64)
    Neon,
}

impl SimdType {
    /// Returns `true` iff the running CPU can execute this engine.
    #[must_use]
    pub fn is_supported(self) -> bool {
        match self {
            SimdType::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            SimdType::Sse => std::arch::is_x86_feature_detected!("sse4.2"),
            #[cfg(target_arch = "x86_64")]
            SimdType::Avx => std::arch::is_x86_feature_detected!("avx2"),
            #[cfg(target_arch = "aarch64")]
            SimdType::Neon => std::arch::is_aarch64_feature_detected!("neon"),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    /// Returns the engines to try in order of preference.
    fn preference_order() -> [SimdType; 3] {
        [SimdType::Avx, SimdType::Sse, SimdType::Neon]
    }
}

impl std::fmt::Display for SimdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SimdType::Scalar => "Scalar",
            SimdType::Sse => "SSE",
            SimdType::Avx => "AVX",
            SimdType::Neon => "NEON",
        };
        write!(f, "{name}")
    }
}

/// Block-oriented Viterbi decoder for a tail-terminated convolutional code
///
/// A decoder is constructed once per code and reused across messages via
/// [`reset`](Self::reset). The branch table is shared by reference, so many
/// decoders (on many threads) can decode against one table. Symbols are fed
/// in with [`update`](Self::update), any number of times, until exactly
/// `traceback_length + K - 1` bits have been decoded; the decoded bytes are
/// then recovered with [`chainback`](Self::chainback).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vitdec::{utils, BranchTable, Code, DecodingMode, ViterbiDecoder};
///
/// let code = Code::voyager();
/// let mode = DecodingMode::<u16>::soft16(code.rate);
/// let input_bytes = [0x12, 0x34, 0x56, 0x78];
///
/// let mut encoder = vitdec::encoder_for_code(&code);
/// let symbols = utils::encode_to_symbols(
///     encoder.as_mut(),
///     &input_bytes,
///     mode.soft_decision_high,
///     mode.soft_decision_low,
/// );
///
/// let branch_table = Arc::new(BranchTable::new(
///     &code,
///     mode.soft_decision_high,
///     mode.soft_decision_low,
/// )?);
/// let mut decoder = ViterbiDecoder::new(branch_table, mode.decoder_config);
/// decoder.set_traceback_length(input_bytes.len() * 8);
/// decoder.reset(0);
/// decoder.update(&symbols)?;
///
/// let mut decoded = [0u8; 4];
/// decoder.chainback(&mut decoded, 32, 0)?;
/// assert_eq!(decoded, input_bytes);
/// assert_eq!(decoder.get_error(0), 0);
/// # Ok::<(), vitdec::Error>(())
/// ```
#[derive(Debug)]
pub struct ViterbiDecoder<M: ErrorMetric = u16> {
    core: DecoderCore<M>,
    simd_type: SimdType,
}

impl<M: ErrorMetric> ViterbiDecoder<M> {
    /// Returns a decoder using the fastest engine valid for the code on the
    /// running CPU.
    ///
    /// # Parameters
    ///
    /// - `branch_table`: Shared branch table for the code and soft levels.
    ///
    /// - `config`: Numeric decoder configuration, usually taken from a
    ///   [`DecodingMode`](crate::DecodingMode) profile.
    #[must_use]
    pub fn new(branch_table: Arc<BranchTable<M::Soft>>, config: DecoderConfig<M>) -> Self {
        let constraint_length = branch_table.constraint_length();
        let mut simd_type = SimdType::Scalar;
        for candidate in SimdType::preference_order() {
            if candidate.is_supported()
                && constraint_length >= M::min_simd_constraint_length(candidate)
            {
                simd_type = candidate;
                break;
            }
        }
        Self {
            core: DecoderCore::new(branch_table, config),
            simd_type,
        }
    }

    /// Returns a decoder forced onto a particular engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unsupported on the running CPU or
    /// if the code's constraint length is below the engine's minimum.
    pub fn with_simd(
        branch_table: Arc<BranchTable<M::Soft>>,
        config: DecoderConfig<M>,
        simd_type: SimdType,
    ) -> Result<Self, Error> {
        if !simd_type.is_supported() {
            return Err(Error::InvalidInput(format!(
                "{simd_type} engine is not supported on this CPU",
            )));
        }
        let constraint_length = branch_table.constraint_length();
        let min_constraint_length = M::min_simd_constraint_length(simd_type);
        if constraint_length < min_constraint_length {
            return Err(Error::InvalidInput(format!(
                "{simd_type} engine requires a constraint length of at least \
                 {min_constraint_length} (code has {constraint_length})",
            )));
        }
        Ok(Self {
            core: DecoderCore::new(branch_table, config),
            simd_type,
        })
    }

    /// Returns the engine this decoder runs on.
    #[must_use]
    pub fn simd_type(&self) -> SimdType {
        self.simd_type
    }

    /// Returns the constraint length of the code.
    #[must_use]
    pub fn constraint_length(&self) -> usize {
        self.core.constraint_length()
    }

    /// Returns the inverse code rate.
    #[must_use]
    pub fn rate(&self) -> usize {
        self.core.rate()
    }

    /// Returns the number of trellis states.
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.core.num_states()
    }

    /// Returns the traceback length (tail bits excluded).
    #[must_use]
    pub fn traceback_length(&self) -> usize {
        self.core.traceback_length()
    }

    /// Resizes the decisions buffer to hold `traceback_length + K - 1`
    /// decoded bits.
    ///
    /// The decisions buffer dominates the decoder's memory at
    /// `(traceback_length + K - 1) * 2^(K-1) / 8` bytes.
    pub fn set_traceback_length(&mut self, traceback_length: usize) {
        self.core.set_traceback_length(traceback_length);
    }

    /// Reinitialises the decoder for a new block starting from the given
    /// state (state 0 for tail-terminated streams).
    pub fn reset(&mut self, starting_state: usize) {
        self.core.reset(starting_state);
    }

    /// Advances the trellis over a batch of received soft symbols.
    ///
    /// Symbol values must lie in `[soft_decision_low, soft_decision_high]`;
    /// out-of-range values can underflow the inverted branch error and are
    /// undefined here, so callers must clamp first.
    ///
    /// # Errors
    ///
    /// Returns an error if `symbols.len()` is not a multiple of the code
    /// rate, or if the decoded bits would exceed `traceback_length + K - 1`.
    pub fn update(&mut self, symbols: &[M::Soft]) -> Result<(), Error> {
        let rate = self.core.rate();
        if symbols.len() % rate != 0 {
            return Err(Error::InvalidInput(format!(
                "Symbol count {} is not a multiple of the code rate {}",
                symbols.len(),
                rate,
            )));
        }
        let total_decoded_bits = symbols.len() / rate;
        let remaining = self.core.remaining_decoded_bits();
        if total_decoded_bits > remaining {
            return Err(Error::InvalidInput(format!(
                "Decoding {total_decoded_bits} more bits would overflow the decisions \
                 buffer ({remaining} left); increase the traceback length",
            )));
        }
        M::run_update(self.simd_type, &mut self.core, symbols);
        Ok(())
    }

    /// Recovers `total_bits` decoded bits into `out_bytes` by walking the
    /// stored decisions backwards from `end_state`.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly `total_bits + K - 1` bits have been
    /// decoded since the last reset, `total_bits` is within the traceback
    /// length, and `out_bytes` holds at least `ceil(total_bits / 8)` bytes.
    pub fn chainback(
        &self,
        out_bytes: &mut [u8],
        total_bits: usize,
        end_state: usize,
    ) -> Result<(), Error> {
        self.core.chainback(out_bytes, total_bits, end_state)
    }

    /// Returns the absolute path error of the trajectory ending in
    /// `end_state`: the renormalisation bias plus that state's current metric.
    #[must_use]
    pub fn get_error(&self, end_state: usize) -> u64 {
        self.core.get_error(end_state)
    }
}
