//! NEON trellis engines for AArch64
//!
//! Same butterfly as the x86 engines on 128-bit vectors. NEON has no
//! `movemask`, so the per-lane decision masks are reduced to one bit per
//! state by ANDing against per-lane bit masks, ORing the two sets together
//! and summing across lanes.

use std::arch::aarch64::*;

use crate::core::DecoderCore;

const VECTOR_BYTES: usize = 16;

impl DecoderCore<u8> {
    /// Runs the forward pass with the NEON engine (16 × u8 lanes, K ≥ 6).
    pub(crate) fn update_neon_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified NEON support.
            unsafe { self.bfly_neon_u8(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_neon_u8() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn bfly_neon_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let max_error = vdupq_n_u8(self.config.soft_decision_max_error);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / VECTOR_BYTES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            // Total error across R symbols
            let mut total_error = vdupq_n_u8(0);
            for i in 0 .. rate {
                let expected = vld1q_s8(bufs.branch_table.row_ptr(i).add(curr_state * VECTOR_BYTES));
                let error = vabdq_s8(expected, vdupq_n_s8(symbols[i]));
                total_error = vqaddq_u8(total_error, vreinterpretq_u8_s8(error));
            }

            // Butterfly across the two predecessor half-ranges
            let old_0 = vld1q_u8(old_ptr.add(curr_state * VECTOR_BYTES));
            let old_1 = vld1q_u8(old_ptr.add((curr_state + num_vectors) * VECTOR_BYTES));
            let inverse_error = vqsubq_u8(max_error, total_error);
            let next_error_0_0 = vqaddq_u8(old_0, total_error);
            let next_error_1_0 = vqaddq_u8(old_1, inverse_error);
            let next_error_0_1 = vqaddq_u8(old_0, inverse_error);
            let next_error_1_1 = vqaddq_u8(old_1, total_error);

            let min_next_error_0 = vminq_u8(next_error_0_0, next_error_1_0);
            let min_next_error_1 = vminq_u8(next_error_0_1, next_error_1_1);
            let decision_0 = vceqq_u8(min_next_error_0, next_error_1_0);
            let decision_1 = vceqq_u8(min_next_error_1, next_error_1_1);

            // Interleave survivors so the outputs are indexed by next state
            vst1q_u8(
                new_ptr.add(2 * curr_state * VECTOR_BYTES),
                vzip1q_u8(min_next_error_0, min_next_error_1),
            );
            vst1q_u8(
                new_ptr.add((2 * curr_state + 1) * VECTOR_BYTES),
                vzip2q_u8(min_next_error_0, min_next_error_1),
            );

            let bits = u64::from(pack_decision_bits_u8(decision_0, decision_1));
            let bit_index = curr_state * 32;
            bufs.decision[bit_index / 64] |= bits << (bit_index % 64);
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn renormalise_neon_u8(&mut self) {
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / VECTOR_BYTES;

            let mut adjust = vld1q_u8(metric);
            for i in 1 .. num_vectors {
                adjust = vminq_u8(adjust, vld1q_u8(metric.add(i * VECTOR_BYTES)));
            }
            let min = vminvq_u8(adjust);

            let v_min = vdupq_n_u8(min);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * VECTOR_BYTES);
                vst1q_u8(ptr, vqsubq_u8(vld1q_u8(ptr), v_min));
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }
}

impl DecoderCore<u16> {
    /// Runs the forward pass with the NEON engine (8 × u16 lanes, K ≥ 5).
    pub(crate) fn update_neon_u16(&mut self, symbols: &[i16]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified NEON support.
            unsafe { self.bfly_neon_u16(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_neon_u16() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn bfly_neon_u16(&mut self, symbols: &[i16]) {
        const LANES: usize = VECTOR_BYTES / 2;
        let rate = self.rate();
        let max_error = vdupq_n_u16(self.config.soft_decision_max_error);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / LANES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            let mut total_error = vdupq_n_u16(0);
            for i in 0 .. rate {
                let expected = vld1q_s16(bufs.branch_table.row_ptr(i).add(curr_state * LANES));
                let error = vabdq_s16(expected, vdupq_n_s16(symbols[i]));
                total_error = vqaddq_u16(total_error, vreinterpretq_u16_s16(error));
            }

            let old_0 = vld1q_u16(old_ptr.add(curr_state * LANES));
            let old_1 = vld1q_u16(old_ptr.add((curr_state + num_vectors) * LANES));
            let inverse_error = vqsubq_u16(max_error, total_error);
            let next_error_0_0 = vqaddq_u16(old_0, total_error);
            let next_error_1_0 = vqaddq_u16(old_1, inverse_error);
            let next_error_0_1 = vqaddq_u16(old_0, inverse_error);
            let next_error_1_1 = vqaddq_u16(old_1, total_error);

            let min_next_error_0 = vminq_u16(next_error_0_0, next_error_1_0);
            let min_next_error_1 = vminq_u16(next_error_0_1, next_error_1_1);
            let decision_0 = vceqq_u16(min_next_error_0, next_error_1_0);
            let decision_1 = vceqq_u16(min_next_error_1, next_error_1_1);

            vst1q_u16(
                new_ptr.add(2 * curr_state * LANES),
                vzip1q_u16(min_next_error_0, min_next_error_1),
            );
            vst1q_u16(
                new_ptr.add((2 * curr_state + 1) * LANES),
                vzip2q_u16(min_next_error_0, min_next_error_1),
            );

            let bits = u64::from(pack_decision_bits_u16(decision_0, decision_1));
            let bit_index = curr_state * 16;
            bufs.decision[bit_index / 64] |= bits << (bit_index % 64);
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn renormalise_neon_u16(&mut self) {
        const LANES: usize = VECTOR_BYTES / 2;
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / LANES;

            let mut adjust = vld1q_u16(metric);
            for i in 1 .. num_vectors {
                adjust = vminq_u16(adjust, vld1q_u16(metric.add(i * LANES)));
            }
            let min = vminvq_u16(adjust);

            let v_min = vdupq_n_u16(min);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * LANES);
                vst1q_u16(ptr, vqsubq_u16(vld1q_u16(ptr), v_min));
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }
}

/// Reduces two interleaved u8 decision masks to 32 packed bits.
#[target_feature(enable = "neon")]
unsafe fn pack_decision_bits_u8(decision_0: uint8x16_t, decision_1: uint8x16_t) -> u32 {
    const D0_MASK: [u8; 16] = [
        1 << 0,
        1 << 2,
        1 << 4,
        1 << 6,
        1 << 0,
        1 << 2,
        1 << 4,
        1 << 6,
        1 << 0,
        1 << 2,
        1 << 4,
        1 << 6,
        1 << 0,
        1 << 2,
        1 << 4,
        1 << 6,
    ];
    const D1_MASK: [u8; 16] = [
        1 << 1,
        1 << 3,
        1 << 5,
        1 << 7,
        1 << 1,
        1 << 3,
        1 << 5,
        1 << 7,
        1 << 1,
        1 << 3,
        1 << 5,
        1 << 7,
        1 << 1,
        1 << 3,
        1 << 5,
        1 << 7,
    ];
    const SHIFTS: [i32; 4] = [0, 8, 16, 24];

    let d0_mask = vld1q_u8(D0_MASK.as_ptr());
    let d1_mask = vld1q_u8(D1_MASK.as_ptr());
    let shifts = vld1q_s32(SHIFTS.as_ptr());

    let masked = vorrq_u8(
        vandq_u8(decision_0, d0_mask),
        vandq_u8(decision_1, d1_mask),
    );
    let by_pairs = vpaddlq_u8(masked);
    let by_quads = vpaddlq_u16(by_pairs);
    vaddvq_u32(vshlq_u32(by_quads, shifts))
}

/// Reduces two interleaved u16 decision masks to 16 packed bits.
#[target_feature(enable = "neon")]
unsafe fn pack_decision_bits_u16(decision_0: uint16x8_t, decision_1: uint16x8_t) -> u16 {
    const D0_MASK: [u16; 8] = [
        1 << 0,
        1 << 2,
        1 << 4,
        1 << 6,
        1 << 8,
        1 << 10,
        1 << 12,
        1 << 14,
    ];
    const D1_MASK: [u16; 8] = [
        1 << 1,
        1 << 3,
        1 << 5,
        1 << 7,
        1 << 9,
        1 << 11,
        1 << 13,
        1 << 15,
    ];

    let d0_mask = vld1q_u16(D0_MASK.as_ptr());
    let d1_mask = vld1q_u16(D1_MASK.as_ptr());

    let masked = vorrq_u16(
        vandq_u16(decision_0, d0_mask),
        vandq_u16(decision_1, d1_mask),
    );
    vaddvq_u16(masked)
}
