//! Shared state of every trellis engine: metrics, decisions, chainback

use std::sync::Arc;

use crate::aligned::AlignedBuf;
use crate::branch_table::BranchTable;
use crate::metric::{DecoderConfig, ErrorMetric};
use crate::Error;

/// Number of decision bits packed per storage word
const DECISION_WORD_BITS: usize = 64;

/// Core state shared by the scalar and vectorised trellis engines
///
/// Owns the double-buffered error metrics, the packed per-step decision rows,
/// and the renormalisation bias. The engines (`scalar.rs`, `x86.rs`,
/// `neon.rs`) each add an `update_*` method on this type; everything else
/// (reset, chainback, error readout) is engine-independent.
#[derive(Debug)]
pub(crate) struct DecoderCore<M: ErrorMetric> {
    pub(crate) branch_table: Arc<BranchTable<M::Soft>>,
    pub(crate) config: DecoderConfig<M>,
    num_states: usize,
    /// Two metric buffers in one aligned allocation, flipped every step
    metrics: AlignedBuf<M>,
    current_metric_index: usize,
    /// One row of `decision_stride` words per decoded bit
    decisions: Vec<u64>,
    decision_stride: usize,
    traceback_length: usize,
    pub(crate) current_decoded_bit: usize,
    pub(crate) renormalisation_bias: u64,
}

/// Mutable views over the buffers one trellis step reads and writes
pub(crate) struct StepBuffers<'a, M: ErrorMetric> {
    pub(crate) old: &'a [M],
    pub(crate) new: &'a mut [M],
    pub(crate) decision: &'a mut [u64],
    pub(crate) branch_table: &'a BranchTable<M::Soft>,
}

impl<M: ErrorMetric> DecoderCore<M> {
    /// Returns a core for the given branch table and configuration, with a
    /// traceback length of zero.
    pub(crate) fn new(branch_table: Arc<BranchTable<M::Soft>>, config: DecoderConfig<M>) -> Self {
        let num_states: usize = 1 << (branch_table.constraint_length() - 1);
        let decision_stride = num_states.div_ceil(DECISION_WORD_BITS);
        let state_bits = branch_table.constraint_length() - 1;
        let mut core = Self {
            branch_table,
            config,
            num_states,
            metrics: AlignedBuf::new(2 * num_states, config.initial_non_start_error),
            current_metric_index: 0,
            decisions: vec![0u64; state_bits * decision_stride],
            decision_stride,
            traceback_length: 0,
            current_decoded_bit: 0,
            renormalisation_bias: 0,
        };
        core.reset(0);
        core
    }

    /// Returns the constraint length of the code.
    pub(crate) fn constraint_length(&self) -> usize {
        self.branch_table.constraint_length()
    }

    /// Returns the inverse code rate.
    pub(crate) fn rate(&self) -> usize {
        self.branch_table.rate()
    }

    /// Returns the number of trellis states.
    pub(crate) fn num_states(&self) -> usize {
        self.num_states
    }

    /// Returns the traceback length (tail bits excluded).
    pub(crate) fn traceback_length(&self) -> usize {
        self.traceback_length
    }

    /// Resizes the decisions buffer for a new traceback length.
    pub(crate) fn set_traceback_length(&mut self, traceback_length: usize) {
        let state_bits = self.constraint_length() - 1;
        let total_rows = traceback_length + state_bits;
        self.decisions.resize(total_rows * self.decision_stride, 0);
        self.traceback_length = traceback_length;
        if self.current_decoded_bit > total_rows {
            self.current_decoded_bit = total_rows;
        }
    }

    /// Reinitialises metrics, decisions and counters for a new block.
    pub(crate) fn reset(&mut self, starting_state: usize) {
        self.current_metric_index = 0;
        self.current_decoded_bit = 0;
        self.renormalisation_bias = 0;
        let state_mask = self.num_states - 1;
        let start = starting_state & state_mask;
        let non_start = self.config.initial_non_start_error;
        let initial = self.config.initial_start_error;
        let old = self.old_metrics_mut();
        old.fill(non_start);
        old[start] = initial;
        self.decisions.fill(0);
    }

    /// Returns the number of further bits the decisions buffer can hold.
    pub(crate) fn remaining_decoded_bits(&self) -> usize {
        let total_rows = self.traceback_length + self.constraint_length() - 1;
        total_rows - self.current_decoded_bit
    }

    /// Returns the buffers for the current trellis step.
    pub(crate) fn step_buffers(&mut self) -> StepBuffers<'_, M> {
        let row_start = self.current_decoded_bit * self.decision_stride;
        let decision = &mut self.decisions[row_start .. row_start + self.decision_stride];
        let (first, second) = self.metrics.as_mut_slice().split_at_mut(self.num_states);
        let (new, old) = if self.current_metric_index == 0 {
            (first, second)
        } else {
            (second, first)
        };
        StepBuffers {
            old,
            new,
            decision,
            branch_table: &self.branch_table,
        }
    }

    /// Returns the metrics produced by the current step.
    pub(crate) fn new_metrics(&self) -> &[M] {
        let start = self.current_metric_index * self.num_states;
        &self.metrics.as_slice()[start .. start + self.num_states]
    }

    /// Returns the metrics produced by the current step, mutably.
    pub(crate) fn new_metrics_mut(&mut self) -> &mut [M] {
        let start = self.current_metric_index * self.num_states;
        &mut self.metrics.as_mut_slice()[start .. start + self.num_states]
    }

    /// Returns the metrics consumed by the current step.
    pub(crate) fn old_metrics(&self) -> &[M] {
        let start = (1 - self.current_metric_index) * self.num_states;
        &self.metrics.as_slice()[start .. start + self.num_states]
    }

    /// Returns the metrics consumed by the current step, mutably.
    pub(crate) fn old_metrics_mut(&mut self) -> &mut [M] {
        let start = (1 - self.current_metric_index) * self.num_states;
        &mut self.metrics.as_mut_slice()[start .. start + self.num_states]
    }

    /// Flips the metric buffers and moves to the next decoded bit.
    pub(crate) fn advance(&mut self) {
        self.current_metric_index = 1 - self.current_metric_index;
        self.current_decoded_bit += 1;
    }

    /// Returns the absolute path error for a given end state.
    pub(crate) fn get_error(&self, end_state: usize) -> u64 {
        let normalised = self.old_metrics()[end_state % self.num_states];
        self.renormalisation_bias + normalised.to_u64()
    }

    /// Walks the stored decisions backwards and reconstructs the decoded bytes.
    ///
    /// The `K-1` tail decisions are consumed first and produce no output
    /// bits; `out_bytes[0 .. ceil(total_bits/8)]` is fully written.
    pub(crate) fn chainback(
        &self,
        out_bytes: &mut [u8],
        total_bits: usize,
        end_state: usize,
    ) -> Result<(), Error> {
        let constraint_length = self.constraint_length();
        let state_bits = constraint_length - 1;
        if total_bits > self.traceback_length {
            return Err(Error::InvalidInput(format!(
                "Cannot chain back {} bits with a traceback length of {}",
                total_bits, self.traceback_length,
            )));
        }
        if self.current_decoded_bit != total_bits + state_bits {
            return Err(Error::InvalidInput(format!(
                "Chainback of {} bits requires exactly {} decoded bits (found {})",
                total_bits,
                total_bits + state_bits,
                self.current_decoded_bit,
            )));
        }
        if out_bytes.len() < total_bits.div_ceil(8) {
            return Err(Error::InvalidInput(format!(
                "Output buffer holds {} bytes but {} bits were requested",
                out_bytes.len(),
                total_bits,
            )));
        }

        let (add_shift, sub_shift) = align_shifts(state_bits);
        let mut state = (end_state % self.num_states) << add_shift;
        for j in (0 .. total_bits).rev() {
            let t = j + state_bits;
            let row = &self.decisions[t * self.decision_stride ..][.. self.decision_stride];
            let next_state = state >> add_shift;
            let bit = (row[next_state / DECISION_WORD_BITS]
                >> (next_state % DECISION_WORD_BITS))
                & 1;
            state = (state >> 1) | ((bit as usize) << (constraint_length - 2 + add_shift));
            out_bytes[j / 8] = (state >> sub_shift) as u8;
        }
        Ok(())
    }
}

/// Returns the shifts that align a `state_bits`-wide state with byte output.
fn align_shifts(state_bits: usize) -> (usize, usize) {
    match state_bits {
        m if m < 8 => (8 - m, 0),
        m if m > 8 => (0, m - 8),
        _ => (0, 0),
    }
}
