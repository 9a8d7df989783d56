//! SSE and AVX2 trellis engines for x86-64
//!
//! Each engine mirrors the scalar butterfly with `W` states per vector,
//! using hardware saturating unsigned arithmetic throughout. The survivor
//! vectors for the even and odd next states are interleaved with unpack
//! instructions so consecutive output vectors are indexed by next state, and
//! the per-lane decision masks are compressed to one bit per state with
//! `movemask`. AVX2 unpacks operate on 128-bit lanes within the 256-bit
//! registers, so its survivor interleave is rewritten through four 128-bit
//! stores to restore the cross-lane ordering.
//!
//! Callers must have verified CPU support (`sse4.2` / `avx2`) and the
//! engine's minimum constraint length before dispatching here.

use std::arch::x86_64::*;

use crate::core::DecoderCore;

const SSE_BYTES: usize = 16;
const AVX_BYTES: usize = 32;

impl DecoderCore<u8> {
    /// Runs the forward pass with the SSE engine (16 × u8 lanes, K ≥ 6).
    pub(crate) fn update_sse_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified sse4.2 support.
            unsafe { self.bfly_sse_u8(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_sse_u8() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn bfly_sse_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let max_error = _mm_set1_epi8(self.config.soft_decision_max_error as i8);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / SSE_BYTES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            // Total error across R symbols
            let mut total_error = _mm_setzero_si128();
            for i in 0 .. rate {
                let expected = _mm_load_si128(
                    bufs.branch_table.row_ptr(i).add(curr_state * SSE_BYTES).cast(),
                );
                let error = _mm_abs_epi8(_mm_subs_epi8(expected, _mm_set1_epi8(symbols[i])));
                total_error = _mm_adds_epu8(total_error, error);
            }

            // Butterfly across the two predecessor half-ranges
            let old_0 = _mm_load_si128(old_ptr.add(curr_state * SSE_BYTES).cast());
            let old_1 =
                _mm_load_si128(old_ptr.add((curr_state + num_vectors) * SSE_BYTES).cast());
            let inverse_error = _mm_subs_epu8(max_error, total_error);
            let next_error_0_0 = _mm_adds_epu8(old_0, total_error);
            let next_error_1_0 = _mm_adds_epu8(old_1, inverse_error);
            let next_error_0_1 = _mm_adds_epu8(old_0, inverse_error);
            let next_error_1_1 = _mm_adds_epu8(old_1, total_error);

            let min_next_error_0 = _mm_min_epu8(next_error_0_0, next_error_1_0);
            let min_next_error_1 = _mm_min_epu8(next_error_0_1, next_error_1_1);
            let decision_0 = _mm_cmpeq_epi8(min_next_error_0, next_error_1_0);
            let decision_1 = _mm_cmpeq_epi8(min_next_error_1, next_error_1_1);

            // Interleave survivors so the outputs are indexed by next state
            _mm_store_si128(
                new_ptr.add(2 * curr_state * SSE_BYTES).cast(),
                _mm_unpacklo_epi8(min_next_error_0, min_next_error_1),
            );
            _mm_store_si128(
                new_ptr.add((2 * curr_state + 1) * SSE_BYTES).cast(),
                _mm_unpackhi_epi8(min_next_error_0, min_next_error_1),
            );

            // Pack decision bits, 32 per vector pair
            let decision_bits_lo =
                _mm_movemask_epi8(_mm_unpacklo_epi8(decision_0, decision_1)) as u32 as u64;
            let decision_bits_hi =
                _mm_movemask_epi8(_mm_unpackhi_epi8(decision_0, decision_1)) as u32 as u64;
            let bits = decision_bits_lo | (decision_bits_hi << 16);
            let bit_index = curr_state * 32;
            bufs.decision[bit_index / 64] |= bits << (bit_index % 64);
        }
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn renormalise_sse_u8(&mut self) {
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / SSE_BYTES;

            // Reduce to the minimum across all lanes
            let mut adjust = _mm_load_si128(metric.cast());
            for i in 1 .. num_vectors {
                adjust = _mm_min_epu8(adjust, _mm_load_si128(metric.add(i * SSE_BYTES).cast()));
            }
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<8>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<4>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<2>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<1>(adjust));
            let min = _mm_extract_epi8::<0>(adjust) as u8;

            let v_min = _mm_set1_epi8(min as i8);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * SSE_BYTES);
                _mm_store_si128(ptr.cast(), _mm_subs_epu8(_mm_load_si128(ptr.cast()), v_min));
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }

    /// Runs the forward pass with the AVX2 engine (32 × u8 lanes, K ≥ 7).
    pub(crate) fn update_avx_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified avx2 support.
            unsafe { self.bfly_avx_u8(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_avx_u8() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn bfly_avx_u8(&mut self, symbols: &[i8]) {
        let rate = self.rate();
        let max_error = _mm256_set1_epi8(self.config.soft_decision_max_error as i8);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / AVX_BYTES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            let mut total_error = _mm256_setzero_si256();
            for i in 0 .. rate {
                let expected = _mm256_load_si256(
                    bufs.branch_table.row_ptr(i).add(curr_state * AVX_BYTES).cast(),
                );
                let error =
                    _mm256_abs_epi8(_mm256_subs_epi8(expected, _mm256_set1_epi8(symbols[i])));
                total_error = _mm256_adds_epu8(total_error, error);
            }

            let old_0 = _mm256_load_si256(old_ptr.add(curr_state * AVX_BYTES).cast());
            let old_1 =
                _mm256_load_si256(old_ptr.add((curr_state + num_vectors) * AVX_BYTES).cast());
            let inverse_error = _mm256_subs_epu8(max_error, total_error);
            let next_error_0_0 = _mm256_adds_epu8(old_0, total_error);
            let next_error_1_0 = _mm256_adds_epu8(old_1, inverse_error);
            let next_error_0_1 = _mm256_adds_epu8(old_0, inverse_error);
            let next_error_1_1 = _mm256_adds_epu8(old_1, total_error);

            let min_next_error_0 = _mm256_min_epu8(next_error_0_0, next_error_1_0);
            let min_next_error_1 = _mm256_min_epu8(next_error_0_1, next_error_1_1);
            let decision_0 = _mm256_cmpeq_epi8(min_next_error_0, next_error_1_0);
            let decision_1 = _mm256_cmpeq_epi8(min_next_error_1, next_error_1_1);

            // 256-bit unpacks interleave within 128-bit lanes, so write the
            // four 128-bit segments back in cross-lane order.
            let packed_lower = _mm256_unpacklo_epi8(min_next_error_0, min_next_error_1);
            let packed_upper = _mm256_unpackhi_epi8(min_next_error_0, min_next_error_1);
            // 16 u8 elements per 128-bit segment
            let out = new_ptr.add(2 * curr_state * AVX_BYTES);
            _mm_store_si128(out.cast(), _mm256_castsi256_si128(packed_lower));
            _mm_store_si128(out.add(16).cast(), _mm256_castsi256_si128(packed_upper));
            _mm_store_si128(
                out.add(32).cast(),
                _mm256_extracti128_si256::<1>(packed_lower),
            );
            _mm_store_si128(
                out.add(48).cast(),
                _mm256_extracti128_si256::<1>(packed_upper),
            );

            // The two 32-bit masks carry the lanes in the same interleaved
            // order; recombine them into 64 bits indexed by next state.
            let mask_lo =
                _mm256_movemask_epi8(_mm256_unpacklo_epi8(decision_0, decision_1)) as u32 as u64;
            let mask_hi =
                _mm256_movemask_epi8(_mm256_unpackhi_epi8(decision_0, decision_1)) as u32 as u64;
            let bits = (mask_lo & 0xFFFF)
                | ((mask_hi & 0xFFFF) << 16)
                | ((mask_lo >> 16) << 32)
                | ((mask_hi >> 16) << 48);
            bufs.decision[curr_state] |= bits;
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn renormalise_avx_u8(&mut self) {
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / AVX_BYTES;

            let mut reduce = _mm256_load_si256(metric.cast());
            for i in 1 .. num_vectors {
                reduce =
                    _mm256_min_epu8(reduce, _mm256_load_si256(metric.add(i * AVX_BYTES).cast()));
            }
            let mut adjust = _mm_min_epu8(
                _mm256_castsi256_si128(reduce),
                _mm256_extracti128_si256::<1>(reduce),
            );
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<8>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<4>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<2>(adjust));
            adjust = _mm_min_epu8(adjust, _mm_srli_si128::<1>(adjust));
            let min = _mm_extract_epi8::<0>(adjust) as u8;

            let v_min = _mm256_set1_epi8(min as i8);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * AVX_BYTES);
                _mm256_store_si256(
                    ptr.cast(),
                    _mm256_subs_epu8(_mm256_load_si256(ptr.cast()), v_min),
                );
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }
}

impl DecoderCore<u16> {
    /// Runs the forward pass with the SSE engine (8 × u16 lanes, K ≥ 5).
    pub(crate) fn update_sse_u16(&mut self, symbols: &[i16]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified sse4.2 support.
            unsafe { self.bfly_sse_u16(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_sse_u16() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn bfly_sse_u16(&mut self, symbols: &[i16]) {
        const LANES: usize = SSE_BYTES / 2;
        let rate = self.rate();
        let max_error = _mm_set1_epi16(self.config.soft_decision_max_error as i16);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / LANES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            let mut total_error = _mm_setzero_si128();
            for i in 0 .. rate {
                let expected =
                    _mm_load_si128(bufs.branch_table.row_ptr(i).add(curr_state * LANES).cast());
                let error = _mm_abs_epi16(_mm_subs_epi16(expected, _mm_set1_epi16(symbols[i])));
                total_error = _mm_adds_epu16(total_error, error);
            }

            let old_0 = _mm_load_si128(old_ptr.add(curr_state * LANES).cast());
            let old_1 = _mm_load_si128(old_ptr.add((curr_state + num_vectors) * LANES).cast());
            let inverse_error = _mm_subs_epu16(max_error, total_error);
            let next_error_0_0 = _mm_adds_epu16(old_0, total_error);
            let next_error_1_0 = _mm_adds_epu16(old_1, inverse_error);
            let next_error_0_1 = _mm_adds_epu16(old_0, inverse_error);
            let next_error_1_1 = _mm_adds_epu16(old_1, total_error);

            let min_next_error_0 = _mm_min_epu16(next_error_0_0, next_error_1_0);
            let min_next_error_1 = _mm_min_epu16(next_error_0_1, next_error_1_1);
            let decision_0 = _mm_cmpeq_epi16(min_next_error_0, next_error_1_0);
            let decision_1 = _mm_cmpeq_epi16(min_next_error_1, next_error_1_1);

            _mm_store_si128(
                new_ptr.add(2 * curr_state * LANES).cast(),
                _mm_unpacklo_epi16(min_next_error_0, min_next_error_1),
            );
            _mm_store_si128(
                new_ptr.add((2 * curr_state + 1) * LANES).cast(),
                _mm_unpackhi_epi16(min_next_error_0, min_next_error_1),
            );

            // Narrow each decision mask to bytes, interleave, and compress to
            // 16 bits
            let packed_0 = _mm_packs_epi16(decision_0, _mm_setzero_si128());
            let packed_1 = _mm_packs_epi16(decision_1, _mm_setzero_si128());
            let bits = _mm_movemask_epi8(_mm_unpacklo_epi8(packed_0, packed_1)) as u32 as u64;
            let bit_index = curr_state * 16;
            bufs.decision[bit_index / 64] |= bits << (bit_index % 64);
        }
    }

    #[target_feature(enable = "sse4.2")]
    unsafe fn renormalise_sse_u16(&mut self) {
        const LANES: usize = SSE_BYTES / 2;
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / LANES;

            let mut adjust = _mm_load_si128(metric.cast());
            for i in 1 .. num_vectors {
                adjust = _mm_min_epu16(adjust, _mm_load_si128(metric.add(i * LANES).cast()));
            }
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<8>(adjust));
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<4>(adjust));
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<2>(adjust));
            let min = _mm_extract_epi16::<0>(adjust) as u16;

            let v_min = _mm_set1_epi16(min as i16);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * LANES);
                _mm_store_si128(ptr.cast(), _mm_subs_epu16(_mm_load_si128(ptr.cast()), v_min));
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }

    /// Runs the forward pass with the AVX2 engine (16 × u16 lanes, K ≥ 6).
    pub(crate) fn update_avx_u16(&mut self, symbols: &[i16]) {
        let rate = self.rate();
        let threshold = self.config.renormalisation_threshold;
        for chunk in symbols.chunks_exact(rate) {
            // SAFETY: decoder construction verified avx2 support.
            unsafe { self.bfly_avx_u16(chunk) };
            if self.new_metrics()[0] >= threshold {
                unsafe { self.renormalise_avx_u16() };
            }
            self.advance();
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn bfly_avx_u16(&mut self, symbols: &[i16]) {
        const LANES: usize = AVX_BYTES / 2;
        let rate = self.rate();
        let max_error = _mm256_set1_epi16(self.config.soft_decision_max_error as i16);
        let bufs = self.step_buffers();
        let num_vectors = bufs.branch_table.stride() / LANES;
        let old_ptr = bufs.old.as_ptr();
        let new_ptr = bufs.new.as_mut_ptr();

        for curr_state in 0 .. num_vectors {
            let mut total_error = _mm256_setzero_si256();
            for i in 0 .. rate {
                let expected =
                    _mm256_load_si256(bufs.branch_table.row_ptr(i).add(curr_state * LANES).cast());
                let error =
                    _mm256_abs_epi16(_mm256_subs_epi16(expected, _mm256_set1_epi16(symbols[i])));
                total_error = _mm256_adds_epu16(total_error, error);
            }

            let old_0 = _mm256_load_si256(old_ptr.add(curr_state * LANES).cast());
            let old_1 = _mm256_load_si256(old_ptr.add((curr_state + num_vectors) * LANES).cast());
            let inverse_error = _mm256_subs_epu16(max_error, total_error);
            let next_error_0_0 = _mm256_adds_epu16(old_0, total_error);
            let next_error_1_0 = _mm256_adds_epu16(old_1, inverse_error);
            let next_error_0_1 = _mm256_adds_epu16(old_0, inverse_error);
            let next_error_1_1 = _mm256_adds_epu16(old_1, total_error);

            let min_next_error_0 = _mm256_min_epu16(next_error_0_0, next_error_1_0);
            let min_next_error_1 = _mm256_min_epu16(next_error_0_1, next_error_1_1);
            let decision_0 = _mm256_cmpeq_epi16(min_next_error_0, next_error_1_0);
            let decision_1 = _mm256_cmpeq_epi16(min_next_error_1, next_error_1_1);

            // Restore cross-lane ordering through four 128-bit segments
            let packed_lower = _mm256_unpacklo_epi16(min_next_error_0, min_next_error_1);
            let packed_upper = _mm256_unpackhi_epi16(min_next_error_0, min_next_error_1);
            // 8 u16 elements per 128-bit segment
            let out = new_ptr.add(2 * curr_state * LANES);
            _mm_store_si128(out.cast(), _mm256_castsi256_si128(packed_lower));
            _mm_store_si128(out.add(8).cast(), _mm256_castsi256_si128(packed_upper));
            _mm_store_si128(
                out.add(16).cast(),
                _mm256_extracti128_si256::<1>(packed_lower),
            );
            _mm_store_si128(
                out.add(24).cast(),
                _mm256_extracti128_si256::<1>(packed_upper),
            );

            // Narrow both masks to bytes within each lane, interleave, and
            // compress to 32 bits
            let bits = _mm256_movemask_epi8(_mm256_unpacklo_epi8(
                _mm256_packs_epi16(decision_0, _mm256_setzero_si256()),
                _mm256_packs_epi16(decision_1, _mm256_setzero_si256()),
            )) as u32 as u64;
            let bit_index = curr_state * 32;
            bufs.decision[bit_index / 64] |= bits << (bit_index % 64);
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn renormalise_avx_u16(&mut self) {
        const LANES: usize = AVX_BYTES / 2;
        let num_states = self.num_states();
        let min = {
            let metric = self.new_metrics_mut().as_mut_ptr();
            let num_vectors = num_states / LANES;

            let mut reduce = _mm256_load_si256(metric.cast());
            for i in 1 .. num_vectors {
                reduce =
                    _mm256_min_epu16(reduce, _mm256_load_si256(metric.add(i * LANES).cast()));
            }
            let mut adjust = _mm_min_epu16(
                _mm256_castsi256_si128(reduce),
                _mm256_extracti128_si256::<1>(reduce),
            );
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<8>(adjust));
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<4>(adjust));
            adjust = _mm_min_epu16(adjust, _mm_srli_si128::<2>(adjust));
            let min = _mm_extract_epi16::<0>(adjust) as u16;

            let v_min = _mm256_set1_epi16(min as i16);
            for i in 0 .. num_vectors {
                let ptr = metric.add(i * LANES);
                _mm256_store_si256(
                    ptr.cast(),
                    _mm256_subs_epu16(_mm256_load_si256(ptr.cast()), v_min),
                );
            }
            min
        };
        self.renormalisation_bias += u64::from(min);
    }
}
