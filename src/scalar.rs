//! Scalar trellis engine, valid for every supported constraint length

use crate::core::DecoderCore;
use crate::metric::ErrorMetric;

impl<M: ErrorMetric> DecoderCore<M> {
    /// Runs the forward pass over `symbols` with the scalar butterfly.
    pub(crate) fn update_scalar(&mut self, symbols: &[M::Soft]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            self.bfly_scalar(chunk);
            if self.new_metrics()[0] >= threshold {
                self.renormalise_scalar();
            }
            self.advance();
        }
    }

    /// Processes R symbols and produces one decoded bit's worth of metrics
    /// and decisions.
    fn bfly_scalar(&mut self, symbols: &[M::Soft]) {
        let max_error = self.config.soft_decision_max_error;
        let half_states = self.num_states() / 2;
        let rate = self.rate();
        let bufs = self.step_buffers();

        for curr_state in 0 .. half_states {
            // Error of this state's branch against the received symbols
            let mut total_error = M::MIN;
            for i in 0 .. rate {
                let expected = bufs.branch_table.row(i)[curr_state];
                total_error =
                    total_error.saturating_add(M::soft_distance(expected, symbols[i]));
            }

            // Only the even-next-state half of the trellis is tabulated; the
            // other half carries the bitwise-inverted symbols, whose error is
            // the complement against the largest possible total.
            let inverse_error = max_error.saturating_sub(total_error);

            // Four transitions per butterfly: predecessors `curr_state` (top
            // bit 0) and `curr_state + half_states` (top bit 1) feed next
            // states `(curr_state << 1) | {0, 1}`.
            let curr_state_1 = curr_state + half_states;
            let next_error_0_0 = bufs.old[curr_state].saturating_add(total_error);
            let next_error_1_0 = bufs.old[curr_state_1].saturating_add(inverse_error);
            let next_error_0_1 = bufs.old[curr_state].saturating_add(inverse_error);
            let next_error_1_1 = bufs.old[curr_state_1].saturating_add(total_error);

            // Strict comparison: on a tie the predecessor with top bit 0 wins
            let decision_0 = next_error_0_0 > next_error_1_0;
            let decision_1 = next_error_0_1 > next_error_1_1;

            let next_state_0 = curr_state << 1;
            bufs.new[next_state_0] = if decision_0 {
                next_error_1_0
            } else {
                next_error_0_0
            };
            bufs.new[next_state_0 | 1] = if decision_1 {
                next_error_1_1
            } else {
                next_error_0_1
            };

            let bits = u64::from(decision_0) | (u64::from(decision_1) << 1);
            bufs.decision[next_state_0 / 64] |= bits << (next_state_0 % 64);
        }
    }

    /// Subtracts the minimum metric from every state and accumulates it into
    /// the renormalisation bias.
    fn renormalise_scalar(&mut self) {
        let min = {
            let new = self.new_metrics_mut();
            let mut min = new[0];
            for &x in &new[1 ..] {
                if x < min {
                    min = x;
                }
            }
            for x in new.iter_mut() {
                *x = x.saturating_sub(min);
            }
            min
        };
        self.renormalisation_bias += min.to_u64();
    }
}
