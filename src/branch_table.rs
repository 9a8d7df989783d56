//! Precomputed branch metric table

use crate::aligned::AlignedBuf;
use crate::metric::SoftSymbol;
use crate::parity::parity;
use crate::{Code, Error};

/// Expected soft-symbol table for every (output symbol, trellis state) pair
///
/// Only the half of the trellis reachable with a leading `0` state bit is
/// stored; the other half is its symbol-wise inverse by the butterfly
/// identity. The table is immutable once built and may be shared across
/// threads (wrap it in an [`std::sync::Arc`] to share it between decoders).
#[derive(Debug)]
pub struct BranchTable<S: SoftSymbol> {
    constraint_length: usize,
    rate: usize,
    stride: usize,
    soft_decision_high: S,
    soft_decision_low: S,
    data: AlignedBuf<S>,
}

impl<S: SoftSymbol + Default> BranchTable<S> {
    /// Returns the branch table for a code and a pair of soft-decision levels.
    ///
    /// # Parameters
    ///
    /// - `code`: The convolutional code to decode.
    ///
    /// - `soft_decision_high`: Soft value of a transmitted `1` bit.
    ///
    /// - `soft_decision_low`: Soft value of a transmitted `0` bit.
    ///
    /// # Errors
    ///
    /// Returns an error if `soft_decision_high <= soft_decision_low`.
    pub fn new(code: &Code, soft_decision_high: S, soft_decision_low: S) -> Result<Self, Error> {
        if soft_decision_high <= soft_decision_low {
            return Err(Error::InvalidInput(format!(
                "Soft decision high {soft_decision_high:?} must exceed low {soft_decision_low:?}",
            )));
        }
        let stride = code.num_states() / 2;
        let mut data = AlignedBuf::new(code.rate * stride.max(1), S::default());
        let table = data.as_mut_slice();
        for (i, &poly) in code.polynomials.iter().enumerate() {
            for state in 0 .. stride {
                // Branch for the transition out of state `state` (leading bit
                // 0) on input bit 0; the register seen by the encoder is the
                // state shifted up by the new input bit.
                let register = (state as u32) << 1;
                let syndrome = parity(poly & register);
                table[i * stride.max(1) + state] =
                    S::from_bit(syndrome != 0, soft_decision_high, soft_decision_low);
            }
        }
        Ok(Self {
            constraint_length: code.constraint_length,
            rate: code.rate,
            stride: stride.max(1),
            soft_decision_high,
            soft_decision_low,
            data,
        })
    }
}

impl<S: SoftSymbol> BranchTable<S> {
    /// Returns the constraint length of the code.
    #[must_use]
    pub fn constraint_length(&self) -> usize {
        self.constraint_length
    }

    /// Returns the inverse code rate.
    #[must_use]
    pub fn rate(&self) -> usize {
        self.rate
    }

    /// Returns the number of stored states per output symbol.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the soft value of a transmitted `1` bit.
    #[must_use]
    pub fn soft_decision_high(&self) -> S {
        self.soft_decision_high
    }

    /// Returns the soft value of a transmitted `0` bit.
    #[must_use]
    pub fn soft_decision_low(&self) -> S {
        self.soft_decision_low
    }

    /// Returns the expected-symbol row for output symbol `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[S] {
        &self.data.as_slice()[i * self.stride .. (i + 1) * self.stride]
    }

    /// Returns a pointer to the start of row `i`, aligned for vector loads
    /// whenever the vectorised engine is valid for the code.
    pub(crate) fn row_ptr(&self, i: usize) -> *const S {
        self.row(i).as_ptr()
    }
}
