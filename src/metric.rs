//! Soft-symbol and error-metric type families, and decoder configuration

/// Crate-internal engine dispatch for the metric types
///
/// Lives in its own module so the public [`ErrorMetric`] trait can require it
/// without exposing the decoder core; the metric types are the only
/// implementors.
pub(crate) mod sealed {
    use crate::core::DecoderCore;
    use crate::decoder::SimdType;

    use super::ErrorMetric;

    /// Routes `update` calls to the engine implementation for a metric type.
    pub trait EngineDispatch: Sized {
        /// Returns the smallest constraint length the given engine supports
        /// for this metric type.
        fn min_simd_constraint_length(simd: SimdType) -> usize;

        /// Runs the forward pass over `symbols` with the given engine.
        ///
        /// The caller guarantees `symbols.len()` is a multiple of the code
        /// rate and that the decisions buffer has room for the decoded bits.
        fn run_update(
            simd: SimdType,
            core: &mut DecoderCore<Self>,
            symbols: &[<Self as ErrorMetric>::Soft],
        ) where
            Self: ErrorMetric;
    }

    impl EngineDispatch for u8 {
        fn min_simd_constraint_length(simd: SimdType) -> usize {
            match simd {
                SimdType::Scalar => 2,
                SimdType::Sse | SimdType::Neon => 6,
                SimdType::Avx => 7,
            }
        }

        fn run_update(simd: SimdType, core: &mut DecoderCore<Self>, symbols: &[i8]) {
            match simd {
                SimdType::Scalar => core.update_scalar(symbols),
                #[cfg(target_arch = "x86_64")]
                SimdType::Sse => core.update_sse_u8(symbols),
                #[cfg(target_arch = "x86_64")]
                SimdType::Avx => core.update_avx_u8(symbols),
                #[cfg(target_arch = "aarch64")]
                SimdType::Neon => core.update_neon_u8(symbols),
                #[allow(unreachable_patterns)]
                _ => core.update_scalar(symbols),
            }
        }
    }

    impl EngineDispatch for u16 {
        fn min_simd_constraint_length(simd: SimdType) -> usize {
            match simd {
                SimdType::Scalar => 2,
                SimdType::Sse | SimdType::Neon => 5,
                SimdType::Avx => 6,
            }
        }

        fn run_update(simd: SimdType, core: &mut DecoderCore<Self>, symbols: &[i16]) {
            match simd {
                SimdType::Scalar => core.update_scalar(symbols),
                #[cfg(target_arch = "x86_64")]
                SimdType::Sse => core.update_sse_u16(symbols),
                #[cfg(target_arch = "x86_64")]
                SimdType::Avx => core.update_avx_u16(symbols),
                #[cfg(target_arch = "aarch64")]
                SimdType::Neon => core.update_neon_u16(symbols),
                #[allow(unreachable_patterns)]
                _ => core.update_scalar(symbols),
            }
        }
    }
}

/// Signed soft-decision symbol type (`i8` or `i16`)
///
/// Soft symbols are graded channel outputs in a caller-chosen interval
/// `[soft_decision_low, soft_decision_high]`; hard decisions use the same
/// machinery with a two-point interval.
pub trait SoftSymbol: Copy + Eq + Ord + std::fmt::Debug + Send + Sync + 'static {
    /// Neutral value used for punctured (erased) symbol positions
    const NEUTRAL: Self;

    /// Returns the soft value for a transmitted bit.
    fn from_bit(bit: bool, high: Self, low: Self) -> Self {
        if bit {
            high
        } else {
            low
        }
    }

    /// Returns the symbol with its sign flipped.
    #[must_use]
    fn invert(self) -> Self;

    /// Returns the symbol widened to `i32`.
    fn to_i32(self) -> i32;

    /// Returns `value` clamped to the representable range of the symbol type.
    fn from_i32_clamped(value: i32) -> Self;
}

impl SoftSymbol for i8 {
    const NEUTRAL: Self = 0;

    fn invert(self) -> Self {
        self.saturating_neg()
    }

    fn to_i32(self) -> i32 {
        i32::from(self)
    }

    fn from_i32_clamped(value: i32) -> Self {
        value.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
    }
}

impl SoftSymbol for i16 {
    const NEUTRAL: Self = 0;

    fn invert(self) -> Self {
        self.saturating_neg()
    }

    fn to_i32(self) -> i32 {
        i32::from(self)
    }

    fn from_i32_clamped(value: i32) -> Self {
        value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

/// Unsigned error-metric type (`u8` or `u16`)
///
/// The metric type fixes its soft-symbol counterpart and, through the
/// crate-internal dispatch supertrait, the constraint-length floor of each
/// vectorised trellis engine.
pub trait ErrorMetric:
    sealed::EngineDispatch + Copy + Ord + std::fmt::Debug + Default + Send + Sync + 'static
{
    /// Soft-symbol type decoded against this metric type
    type Soft: SoftSymbol;

    /// Lower bound of the metric type (the initial start error)
    const MIN: Self;
    /// Upper bound of the metric type
    const MAX: Self;

    /// Returns the saturating sum of two metrics.
    #[must_use]
    fn saturating_add(self, rhs: Self) -> Self;

    /// Returns the saturating difference of two metrics.
    #[must_use]
    fn saturating_sub(self, rhs: Self) -> Self;

    /// Returns `|a - b|` widened into the metric type.
    fn soft_distance(a: Self::Soft, b: Self::Soft) -> Self;

    /// Returns the metric widened to `u64`.
    fn to_u64(self) -> u64;
}

impl ErrorMetric for u8 {
    type Soft = i8;

    const MIN: Self = u8::MIN;
    const MAX: Self = u8::MAX;

    fn saturating_add(self, rhs: Self) -> Self {
        u8::saturating_add(self, rhs)
    }

    fn saturating_sub(self, rhs: Self) -> Self {
        u8::saturating_sub(self, rhs)
    }

    fn soft_distance(a: i8, b: i8) -> Self {
        let distance = (i32::from(a) - i32::from(b)).unsigned_abs();
        distance.min(u32::from(u8::MAX)) as u8
    }

    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl ErrorMetric for u16 {
    type Soft = i16;

    const MIN: Self = u16::MIN;
    const MAX: Self = u16::MAX;

    fn saturating_add(self, rhs: Self) -> Self {
        u16::saturating_add(self, rhs)
    }

    fn saturating_sub(self, rhs: Self) -> Self {
        u16::saturating_sub(self, rhs)
    }

    fn soft_distance(a: i16, b: i16) -> Self {
        let distance = (i32::from(a) - i32::from(b)).unsigned_abs();
        distance.min(u32::from(u16::MAX)) as u16
    }

    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

/// Numeric configuration of a decoder core
///
/// The renormalisation threshold is tunable; the profile constructors on
/// [`DecodingMode`] derive safe defaults. Note that the threshold is only
/// checked against error metric `0` after each trellis step, so other metrics
/// can exceed it between renormalisations; the profile margins keep that slack
/// away from the saturation limit of the metric type.
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
pub struct DecoderConfig<M: ErrorMetric> {
    /// Largest possible total error of R symbols against a branch
    pub soft_decision_max_error: M,
    /// Error assigned to the starting state on reset
    pub initial_start_error: M,
    /// Error assigned to every other state on reset
    pub initial_non_start_error: M,
    /// Threshold on error metric `0` above which metrics are renormalised
    pub renormalisation_threshold: M,
}

/// A decoding profile: soft-decision levels plus a matching decoder configuration
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
pub struct DecodingMode<M: ErrorMetric> {
    /// Soft value of a transmitted `1` bit
    pub soft_decision_high: M::Soft,
    /// Soft value of a transmitted `0` bit
    pub soft_decision_low: M::Soft,
    /// Decoder configuration derived from the levels and the code rate
    pub decoder_config: DecoderConfig<M>,
}

impl DecodingMode<u16> {
    /// Returns the 16-bit soft-decision profile (levels ±127, margin factor 5).
    #[must_use]
    pub fn soft16(code_rate: usize) -> Self {
        let soft_decision_high: i16 = 127;
        let soft_decision_low: i16 = -127;
        let max_error = (soft_decision_high - soft_decision_low) as u16 * code_rate as u16;
        let error_margin = max_error * 5;
        Self {
            soft_decision_high,
            soft_decision_low,
            decoder_config: DecoderConfig {
                soft_decision_max_error: max_error,
                initial_start_error: u16::MIN,
                initial_non_start_error: u16::MIN + error_margin,
                renormalisation_threshold: u16::MAX - error_margin,
            },
        }
    }
}

impl DecodingMode<u8> {
    /// Returns the 8-bit soft-decision profile (levels ±3, margin factor 2).
    #[must_use]
    pub fn soft8(code_rate: usize) -> Self {
        let soft_decision_high: i8 = 3;
        let soft_decision_low: i8 = -3;
        let max_error = (soft_decision_high - soft_decision_low) as u8 * code_rate as u8;
        let error_margin = max_error * 2;
        Self {
            soft_decision_high,
            soft_decision_low,
            decoder_config: DecoderConfig {
                soft_decision_max_error: max_error,
                initial_start_error: u8::MIN,
                initial_non_start_error: u8::MIN + error_margin,
                renormalisation_threshold: u8::MAX - error_margin,
            },
        }
    }

    /// Returns the hard-decision profile (levels ±1, margin factor 3).
    ///
    /// Hard decoding reuses the 8-bit soft decoder; only the levels and the
    /// renormalisation margins differ.
    #[must_use]
    pub fn hard8(code_rate: usize) -> Self {
        let soft_decision_high: i8 = 1;
        let soft_decision_low: i8 = -1;
        let max_error = (soft_decision_high - soft_decision_low) as u8 * code_rate as u8;
        let error_margin = max_error * 3;
        Self {
            soft_decision_high,
            soft_decision_low,
            decoder_config: DecoderConfig {
                soft_decision_max_error: max_error,
                initial_start_error: u8::MIN,
                initial_non_start_error: u8::MIN + error_margin,
                renormalisation_threshold: u8::MAX - error_margin,
            },
        }
    }
}

#[cfg(test)]
mod tests_of_modes {
    use super::*;

    #[test]
    fn test_soft16() {
        let mode = DecodingMode::<u16>::soft16(4);
        assert_eq!(mode.soft_decision_high, 127);
        assert_eq!(mode.soft_decision_low, -127);
        assert_eq!(mode.decoder_config.soft_decision_max_error, 1016);
        assert_eq!(mode.decoder_config.initial_start_error, 0);
        assert_eq!(mode.decoder_config.initial_non_start_error, 5080);
        assert_eq!(mode.decoder_config.renormalisation_threshold, 60455);
    }

    #[test]
    fn test_soft8() {
        let mode = DecodingMode::<u8>::soft8(2);
        assert_eq!(mode.soft_decision_high, 3);
        assert_eq!(mode.soft_decision_low, -3);
        assert_eq!(mode.decoder_config.soft_decision_max_error, 12);
        assert_eq!(mode.decoder_config.initial_non_start_error, 24);
        assert_eq!(mode.decoder_config.renormalisation_threshold, 231);
    }

    #[test]
    fn test_hard8() {
        let mode = DecodingMode::<u8>::hard8(4);
        assert_eq!(mode.soft_decision_high, 1);
        assert_eq!(mode.soft_decision_low, -1);
        assert_eq!(mode.decoder_config.soft_decision_max_error, 8);
        assert_eq!(mode.decoder_config.initial_non_start_error, 24);
        assert_eq!(mode.decoder_config.renormalisation_threshold, 231);
    }

    #[test]
    fn test_soft_distance() {
        assert_eq!(<u8 as ErrorMetric>::soft_distance(3, -3), 6);
        assert_eq!(<u8 as ErrorMetric>::soft_distance(-3, 3), 6);
        assert_eq!(<u8 as ErrorMetric>::soft_distance(127, -128), 255);
        assert_eq!(<u16 as ErrorMetric>::soft_distance(127, -127), 254);
        assert_eq!(<u16 as ErrorMetric>::soft_distance(-127, 127), 254);
    }

    #[test]
    fn test_from_i32_clamped() {
        assert_eq!(i8::from_i32_clamped(300), 127);
        assert_eq!(i8::from_i32_clamped(-300), -128);
        assert_eq!(i8::from_i32_clamped(5), 5);
        assert_eq!(i16::from_i32_clamped(40000), 32767);
        assert_eq!(i16::from_i32_clamped(-40000), -32768);
    }
}
