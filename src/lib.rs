//! # High-performance Viterbi decoders for terminated convolutional codes
//!
//! This crate decodes the most likely transmitted bit sequence from a stream
//! of soft-decision channel symbols produced by a rate-1/R convolutional
//! encoder with constraint length K, under an additive minimum-error metric.
//! It is meant as an embeddable core for software radio and forward-error-
//! correction pipelines where throughput dominates (DAB, LTE, CDMA, space
//! telemetry).
//!
//! The trellis forward pass is implemented as an add-compare-select
//! "butterfly" over precomputed branch metrics, with double-buffered error
//! metrics, packed per-step decision bits, and periodic renormalisation. On
//! top of the portable scalar engine there are SSE, AVX2 and NEON engines
//! for both 8-bit and 16-bit metrics; [`ViterbiDecoder::new`] probes the CPU
//! and picks the fastest engine valid for the code. Decoded bytes are
//! recovered by a chainback walk over the stored decisions.
//!
//! The [`ConvolutionalEncoder`] implementations generate reference symbols
//! (lookup-table driven for short constraint lengths, shift-register
//! otherwise), the [`puncture`] module stretches the decoder over
//! rate-compatible punctured codes, and the [`sim`] and [`utils`] modules
//! support BER measurement over noisy channels.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use vitdec::{utils, BranchTable, Code, DecodingMode, ViterbiDecoder};
//!
//! let code = Code::voyager();
//! let mode = DecodingMode::<u16>::soft16(code.rate);
//!
//! // Encode a message, tail-terminated back to state 0
//! let message = *b"hello, trellis";
//! let mut encoder = vitdec::encoder_for_code(&code);
//! let symbols = utils::encode_to_symbols(
//!     encoder.as_mut(),
//!     &message,
//!     mode.soft_decision_high,
//!     mode.soft_decision_low,
//! );
//!
//! // Decode it back
//! let branch_table = Arc::new(BranchTable::new(
//!     &code,
//!     mode.soft_decision_high,
//!     mode.soft_decision_low,
//! )?);
//! let mut decoder = ViterbiDecoder::new(branch_table, mode.decoder_config);
//! decoder.set_traceback_length(message.len() * 8);
//! decoder.reset(0);
//! decoder.update(&symbols)?;
//! let mut decoded = [0u8; 14];
//! decoder.chainback(&mut decoded, message.len() * 8, 0)?;
//! assert_eq!(decoded, message);
//! # Ok::<(), vitdec::Error>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]
#![allow(clippy::cast_possible_truncation)]

mod aligned;
mod branch_table;
mod code;
mod common;
mod core;
mod decoder;
mod encoder;
mod metric;
#[cfg(target_arch = "aarch64")]
mod neon;
mod parity;
pub mod puncture;
mod scalar;
pub mod sim;
pub mod utils;
#[cfg(target_arch = "x86_64")]
mod x86;

pub use branch_table::BranchTable;
pub use code::{Code, MAX_CONSTRAINT_LENGTH, MIN_CONSTRAINT_LENGTH};
pub use common::Error;
pub use decoder::{SimdType, ViterbiDecoder};
pub use encoder::{
    encoder_for_code, ConvolutionalEncoder, ConvolutionalEncoderLookup,
    ConvolutionalEncoderShiftRegister, MAX_LOOKUP_CONSTRAINT_LENGTH,
};
pub use metric::{DecoderConfig, DecodingMode, ErrorMetric, SoftSymbol};
