//! Convolutional code parameters and the standard named codes

use serde::{Deserialize, Serialize};

use crate::Error;

/// Parameters of a rate-1/R convolutional code
///
/// A code is described by its constraint length `K`, its inverse rate `R`, and
/// `R` generator polynomials. Each polynomial is a `K`-bit mask over the
/// encoder shift register, with bit 0 tapping the newest input bit and bit
/// `K-1` tapping the oldest. The decoder trellis has `2^(K-1)` states.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Code {
    /// Display name of the code
    pub name: String,
    /// Constraint length `K`
    pub constraint_length: usize,
    /// Inverse code rate `R` (output symbols per input bit)
    pub rate: usize,
    /// Generator polynomials, one per output symbol
    pub polynomials: Vec<u32>,
}

/// Smallest supported constraint length
pub const MIN_CONSTRAINT_LENGTH: usize = 2;
/// Largest supported constraint length
pub const MAX_CONSTRAINT_LENGTH: usize = 15;

impl Code {
    /// Returns a validated code for the given parameters.
    ///
    /// # Parameters
    ///
    /// - `name`: Display name of the code.
    ///
    /// - `constraint_length`: Constraint length `K`. Must be in the range
    ///   `[2, 15]`.
    ///
    /// - `rate`: Inverse code rate `R`. Must be at least `1`, and must equal
    ///   the number of polynomials.
    ///
    /// - `polynomials`: Generator polynomials. Each must be a nonzero `K`-bit
    ///   mask with both bit `0` and bit `K-1` set; the butterfly trellis
    ///   update relies on every output symbol being inverted by both the
    ///   newest and the oldest register bit.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the above conditions is violated.
    pub fn new(
        name: &str,
        constraint_length: usize,
        rate: usize,
        polynomials: &[u32],
    ) -> Result<Self, Error> {
        if !(MIN_CONSTRAINT_LENGTH ..= MAX_CONSTRAINT_LENGTH).contains(&constraint_length) {
            return Err(Error::InvalidInput(format!(
                "Constraint length must be in the range [{MIN_CONSTRAINT_LENGTH}, \
                 {MAX_CONSTRAINT_LENGTH}] (found {constraint_length})",
            )));
        }
        if rate == 0 {
            return Err(Error::InvalidInput(
                "Code rate must be at least 1".to_string(),
            ));
        }
        if polynomials.len() != rate {
            return Err(Error::InvalidInput(format!(
                "Expected {} polynomials for a rate-1/{} code (found {})",
                rate,
                rate,
                polynomials.len(),
            )));
        }
        let poly_limit = 1u32 << constraint_length;
        let oldest_tap = 1u32 << (constraint_length - 1);
        for &poly in polynomials {
            if poly == 0 || poly >= poly_limit {
                return Err(Error::InvalidInput(format!(
                    "Polynomial {poly} is not a nonzero {constraint_length}-bit mask",
                )));
            }
            if poly & 1 == 0 || poly & oldest_tap == 0 {
                return Err(Error::InvalidInput(format!(
                    "Polynomial {poly} must tap both the newest (bit 0) and oldest \
                     (bit {}) register bits",
                    constraint_length - 1,
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            constraint_length,
            rate,
            polynomials: polynomials.to_vec(),
        })
    }

    /// Returns the number of trellis states, `2^(K-1)`.
    #[must_use]
    pub fn num_states(&self) -> usize {
        1 << (self.constraint_length - 1)
    }

    /// Returns the basic K=3 rate-1/2 test code.
    #[must_use]
    pub fn basic_k3() -> Self {
        Self::named("Basic K=3 R=1/2", 3, 2, &[0b111, 0b101])
    }

    /// Returns the basic K=5 rate-1/2 test code.
    #[must_use]
    pub fn basic_k5() -> Self {
        Self::named("Basic K=5 R=1/2", 5, 2, &[0b10111, 0b11001])
    }

    /// Returns the K=7 rate-1/2 Voyager code.
    #[must_use]
    pub fn voyager() -> Self {
        Self::named("Voyager", 7, 2, &[109, 79])
    }

    /// Returns the K=7 rate-1/3 LTE convolutional code.
    #[must_use]
    pub fn lte() -> Self {
        Self::named("LTE", 7, 3, &[91, 117, 121])
    }

    /// Returns the K=7 rate-1/4 DAB radio mother code (ETSI EN 300 401).
    #[must_use]
    pub fn dab_radio() -> Self {
        Self::named("DAB Radio", 7, 4, &[109, 79, 83, 109])
    }

    /// Returns the K=9 rate-1/2 CDMA IS-95A code.
    #[must_use]
    pub fn cdma_is95a() -> Self {
        Self::named("CDMA IS-95A", 9, 2, &[491, 369])
    }

    /// Returns the K=9 rate-1/4 CDMA 2000 code.
    #[must_use]
    pub fn cdma_2000() -> Self {
        Self::named("CDMA 2000", 9, 4, &[501, 441, 331, 315])
    }

    /// Returns the K=15 rate-1/6 Cassini deep-space code.
    #[must_use]
    pub fn cassini() -> Self {
        Self::named(
            "Cassini",
            15,
            6,
            &[17817, 20133, 23879, 30451, 32439, 26975],
        )
    }

    /// Returns all standard named codes, sorted roughly by complexity.
    #[must_use]
    pub fn standard_codes() -> Vec<Self> {
        vec![
            Self::basic_k3(),
            Self::basic_k5(),
            Self::voyager(),
            Self::lte(),
            Self::dab_radio(),
            Self::cdma_is95a(),
            Self::cdma_2000(),
            Self::cassini(),
        ]
    }

    /// Returns a known-valid named code.
    fn named(name: &str, constraint_length: usize, rate: usize, polynomials: &[u32]) -> Self {
        // The standard code tables satisfy every constructor check.
        Self::new(name, constraint_length, rate, polynomials)
            .unwrap_or_else(|_| unreachable!("standard code must be valid"))
    }
}
