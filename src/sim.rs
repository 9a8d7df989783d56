//! BER/BLER simulation of a code over a quantised BPSK-AWGN channel
//!
//! Each simulated block draws random input bytes, encodes them with a tail,
//! maps the code bits onto BPSK, adds white Gaussian noise at the requested
//! Eb/N0, quantises the observations into the 16-bit soft-decision range,
//! and decodes with the fastest engine available. Results can be saved to
//! and restored from a JSON file.
//!
//! # Examples
//!
//! ```no_run
//! use vitdec::{sim, Code};
//!
//! let mut rng = rand::rng();
//! let params = sim::SimParams {
//!     code: Code::voyager(),
//!     eb_over_n0_db: 4.0,
//!     num_input_bytes_per_block: 64,
//!     num_block_errors_min: 50,
//!     num_blocks_per_run: 100,
//!     num_runs_min: 1,
//!     num_runs_max: 10,
//! };
//! let results = sim::awgn_sim(&params, &mut rng)?;
//! println!("BER {:.3e}", results.bit_error_rate());
//! # Ok::<(), vitdec::Error>(())
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::metric::SoftSymbol;
use crate::{encoder_for_code, utils, BranchTable, Code, DecodingMode, Error, ViterbiDecoder};

/// Parameters for a simulation over the BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimParams {
    /// Code to simulate
    pub code: Code,
    /// Ratio (dB) of energy per information bit to noise power spectral
    /// density at the channel output
    pub eb_over_n0_db: f64,
    /// Number of input bytes per block
    pub num_input_bytes_per_block: u32,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
}

impl SimParams {
    /// Checks validity of simulation parameters.
    fn check(&self) -> Result<(), Error> {
        Code::new(
            &self.code.name,
            self.code.constraint_length,
            self.code.rate,
            &self.code.polynomials,
        )?;
        if self.num_input_bytes_per_block == 0 {
            return Err(Error::InvalidInput(
                "Number of input bytes per block cannot be zero".to_string(),
            ));
        }
        if self.num_blocks_per_run == 0 {
            return Err(Error::InvalidInput(
                "Number of blocks per run cannot be zero".to_string(),
            ));
        }
        if self.num_runs_min > self.num_runs_max {
            return Err(Error::InvalidInput(format!(
                "Minimum number of runs ({}) exceeds maximum number of runs ({})",
                self.num_runs_min, self.num_runs_max,
            )));
        }
        Ok(())
    }

    /// Prints simulation parameters.
    fn print(&self) {
        eprintln!();
        eprintln!(
            "{} (K={}, R=1/{})",
            self.code.name, self.code.constraint_length, self.code.rate,
        );
        eprintln!("Eb/N0 of {} dB", self.eb_over_n0_db);
        eprintln!("{} input bytes per block", self.num_input_bytes_per_block);
        eprintln!("Minimum of {} block errors", self.num_block_errors_min);
        eprintln!("{} blocks per run", self.num_blocks_per_run);
        eprintln!(
            "Between {} and {} runs",
            self.num_runs_min, self.num_runs_max,
        );
    }
}

/// Results from a simulation over the BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of blocks transmitted
    pub num_blocks: u32,
    /// Number of information bits transmitted
    pub num_info_bits: u64,
    /// Number of block errors
    pub num_block_errors: u32,
    /// Number of information bit errors
    pub num_info_bit_errors: u64,
}

impl SimResults {
    /// Returns initialized simulation results.
    #[must_use]
    fn new(params: &SimParams) -> Self {
        Self {
            params: params.clone(),
            num_blocks: 0,
            num_info_bits: 0,
            num_block_errors: 0,
            num_info_bit_errors: 0,
        }
    }

    /// Returns block error rate.
    #[must_use]
    pub fn block_error_rate(&self) -> f64 {
        if self.num_blocks > 0 {
            f64::from(self.num_block_errors) / f64::from(self.num_blocks)
        } else {
            0.0
        }
    }

    /// Returns information bit error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bit_error_rate(&self) -> f64 {
        if self.num_info_bits > 0 {
            self.num_info_bit_errors as f64 / self.num_info_bits as f64
        } else {
            0.0
        }
    }

    /// Prints progress message.
    fn print_progress_message(&self) {
        if self.run_complete() {
            eprint!(
                "\r{} at Eb/N0 = {:6.3} dB: BER = {:9.4e}, BLER = {:9.4e} ({}/{}, {}/{})",
                self.params.code.name,
                self.params.eb_over_n0_db,
                self.bit_error_rate(),
                self.block_error_rate(),
                self.num_info_bit_errors,
                self.num_info_bits,
                self.num_block_errors,
                self.num_blocks,
            );
            if self.sim_complete() {
                eprintln!();
            }
        }
    }

    /// Returns `true` iff a run of blocks is now complete.
    fn run_complete(&self) -> bool {
        self.num_blocks % self.params.num_blocks_per_run == 0
    }

    /// Returns `true` iff the simulation is now complete.
    fn sim_complete(&self) -> bool {
        self.run_complete()
            && self.num_blocks >= self.params.num_runs_min * self.params.num_blocks_per_run
            && (self.num_block_errors >= self.params.num_block_errors_min
                || self.num_blocks >= self.params.num_runs_max * self.params.num_blocks_per_run)
    }

    /// Updates simulation results after a block.
    fn update_after_block(&mut self, num_info_bit_errors_this_block: u64) {
        self.num_blocks += 1;
        self.num_info_bits += u64::from(self.params.num_input_bytes_per_block) * 8;
        if num_info_bit_errors_this_block > 0 {
            self.num_block_errors += 1;
            self.num_info_bit_errors += num_info_bit_errors_this_block;
        }
    }
}

/// Maps code bits onto BPSK, adds Gaussian noise at the block's Eb/N0, and
/// quantises into the soft-decision range.
///
/// The noise-free symbols sit exactly on the soft-decision levels; Es/N0 is
/// Eb/N0 minus the rate loss `10 * log10(R)`.
fn quantised_awgn_channel<R: Rng>(
    symbols: &mut [i16],
    eb_over_n0_db: f64,
    code_rate: usize,
    soft_decision_high: i16,
    soft_decision_low: i16,
    rng: &mut R,
) {
    #[allow(clippy::cast_precision_loss)]
    let es_over_n0_db = eb_over_n0_db - 10.0 * (code_rate as f64).log10();
    let es_over_n0 = 10f64.powf(0.1 * es_over_n0_db);
    let noise_sigma = (0.5 / es_over_n0).sqrt();
    // Unit-variance Gaussian; failure is impossible for a positive sigma
    let normal = Normal::new(0.0, noise_sigma).unwrap_or_else(|_| unreachable!());
    let scale = f64::from(soft_decision_high);
    for symbol in symbols.iter_mut() {
        let bpsk = f64::from(*symbol) / scale;
        let observed = bpsk + normal.sample(rng);
        let quantised = i16::from_i32_clamped((observed * scale).round() as i32);
        *symbol = quantised.clamp(soft_decision_low, soft_decision_high);
    }
}

/// Runs one simulation of a code over the BPSK-AWGN channel.
///
/// # Parameters
///
/// - `params`: Parameters for the simulation.
///
/// - `rng`: Random number generator for the simulation.
///
/// # Returns
///
/// - `results`: Results from the simulation.
///
/// # Errors
///
/// Returns an error if the parameters fail their validity check.
pub fn awgn_sim<R: Rng>(params: &SimParams, rng: &mut R) -> Result<SimResults, Error> {
    params.check()?;
    let code = &params.code;
    let mode = DecodingMode::<u16>::soft16(code.rate);
    let branch_table = Arc::new(BranchTable::new(
        code,
        mode.soft_decision_high,
        mode.soft_decision_low,
    )?);
    let mut decoder = ViterbiDecoder::<u16>::new(branch_table, mode.decoder_config);
    let mut encoder = encoder_for_code(code);
    let num_input_bytes = params.num_input_bytes_per_block as usize;
    let total_bits = num_input_bytes * 8;
    decoder.set_traceback_length(total_bits);

    let mut results = SimResults::new(params);
    let mut decoded = vec![0u8; num_input_bytes];
    while !results.sim_complete() {
        let input_bytes = utils::random_bytes(num_input_bytes, rng);
        let mut symbols = utils::encode_to_symbols(
            encoder.as_mut(),
            &input_bytes,
            mode.soft_decision_high,
            mode.soft_decision_low,
        );
        quantised_awgn_channel(
            &mut symbols,
            params.eb_over_n0_db,
            code.rate,
            mode.soft_decision_high,
            mode.soft_decision_low,
            rng,
        );
        decoder.reset(0);
        decoder.update(&symbols)?;
        decoder.chainback(&mut decoded, total_bits, 0)?;
        let num_bit_errors = utils::bit_error_count(&decoded, &input_bytes) as u64;
        results.update_after_block(num_bit_errors);
        results.print_progress_message();
    }
    Ok(results)
}

/// Runs simulations over a sweep of scenarios and saves results to a JSON
/// file.
///
/// # Parameters
///
/// - `all_params`: Parameters for each simulation scenario of interest.
///
/// - `rng`: Random number generator for the simulations.
///
/// - `json_filename`: Name of the JSON file to which all simulation results
///   must be written.
///
/// # Errors
///
/// Returns an error if creating or writing to the JSON file fails; scenarios
/// with invalid parameters are skipped with a warning.
pub fn run_awgn_sims<R: Rng>(
    all_params: &[SimParams],
    rng: &mut R,
    json_filename: &str,
) -> Result<(), Error> {
    let mut all_results = Vec::with_capacity(all_params.len());
    for params in all_params {
        params.print();
        if let Ok(results) = awgn_sim(params, rng) {
            all_results.push(results);
        } else {
            eprintln!("WARNING: Invalid simulation parameters");
        }
    }
    save_all_sim_results_to_file(&all_results, json_filename)?;
    Ok(())
}

/// Saves all simulation results to a JSON file.
///
/// # Errors
///
/// Returns an error if creating or writing to the JSON file fails.
pub fn save_all_sim_results_to_file(
    all_results: &[SimResults],
    json_filename: &str,
) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, all_results)?;
    Ok(())
}

/// Returns all simulation results from a JSON file.
///
/// # Errors
///
/// Returns an error if opening or reading from the JSON file fails.
pub fn all_sim_results_from_file(json_filename: &str) -> Result<Vec<SimResults>, Error> {
    let reader = BufReader::new(File::open(json_filename)?);
    let all_results = serde_json::from_reader(reader)?;
    Ok(all_results)
}


#[cfg(test)]
mod tests_of_simresults {
    use super::*;
    use float_eq::assert_float_eq;

    fn results_for_test(num_blocks: u32, num_block_errors: u32) -> SimResults {
        let params = SimParams {
            code: Code::voyager(),
            eb_over_n0_db: 4.0,
            num_input_bytes_per_block: 16,
            num_block_errors_min: 100,
            num_blocks_per_run: 1000,
            num_runs_min: 1,
            num_runs_max: 10,
        };
        let num_info_bits = u64::from(num_blocks) * 128;
        let num_info_bit_errors = u64::from(num_block_errors) * 10;
        SimResults {
            params,
            num_blocks,
            num_info_bits,
            num_block_errors,
            num_info_bit_errors,
        }
    }

    #[test]
    fn test_block_error_rate() {
        let results = results_for_test(2000, 10);
        assert_float_eq!(results.block_error_rate(), 10.0 / 2000.0, abs <= 1e-12);
    }

    #[test]
    fn test_bit_error_rate() {
        let results = results_for_test(2000, 10);
        assert_float_eq!(results.bit_error_rate(), 100.0 / 256_000.0, abs <= 1e-12);
    }

    #[test]
    fn test_sim_complete() {
        let results = results_for_test(5000, 99);
        assert!(!results.sim_complete());
        let results = results_for_test(5000, 100);
        assert!(results.sim_complete());
        let results = results_for_test(4999, 500);
        assert!(!results.sim_complete());
        let results = results_for_test(10000, 50);
        assert!(results.sim_complete());
    }

    #[test]
    fn test_update_after_block() {
        let mut results = results_for_test(100, 10);
        results.update_after_block(0);
        assert_eq!(results.num_blocks, 101);
        assert_eq!(results.num_block_errors, 10);
        results.update_after_block(4);
        assert_eq!(results.num_blocks, 102);
        assert_eq!(results.num_block_errors, 11);
        assert_eq!(results.num_info_bit_errors, 104);
    }
}

#[cfg(test)]
mod tests_of_functions {
    use super::*;
    use float_eq::assert_float_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params_at_snr(eb_over_n0_db: f64) -> SimParams {
        SimParams {
            code: Code::voyager(),
            eb_over_n0_db,
            num_input_bytes_per_block: 32,
            num_block_errors_min: 10,
            num_blocks_per_run: 20,
            num_runs_min: 1,
            num_runs_max: 1,
        }
    }

    #[test]
    fn test_awgn_sim_rejects_invalid_params() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut params = params_at_snr(4.0);
        params.num_blocks_per_run = 0;
        assert!(awgn_sim(&params, &mut rng).is_err());
    }

    #[test]
    fn test_ber_decreases_with_snr() {
        let mut rng = StdRng::seed_from_u64(100);
        let low_snr = awgn_sim(&params_at_snr(0.0), &mut rng).unwrap();
        let high_snr = awgn_sim(&params_at_snr(10.0), &mut rng).unwrap();
        assert!(low_snr.bit_error_rate() > high_snr.bit_error_rate());
        // At 10 dB the K=7 rate-1/2 code is effectively error free
        assert_float_eq!(high_snr.bit_error_rate(), 0.0, abs <= 1e-12);
        assert!(low_snr.bit_error_rate() > 1e-3);
    }

    #[test]
    fn test_save_and_load_results() {
        let all_results = vec![
            SimResults::new(&params_at_snr(2.0)),
            SimResults::new(&params_at_snr(3.0)),
        ];
        let json_filename = std::env::temp_dir().join("vitdec_sim_results.json");
        let json_filename = json_filename.to_str().unwrap();
        save_all_sim_results_to_file(&all_results, json_filename).unwrap();
        let all_results_saved = all_sim_results_from_file(json_filename).unwrap();
        assert_eq!(all_results, all_results_saved);
    }
}
