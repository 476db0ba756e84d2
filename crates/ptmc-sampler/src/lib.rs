#![deny(missing_docs)]

//! Metropolis chains with adaptive step-width calibration and parallel
//! tempering.
//!
//! A [`Chain`] owns a parameter vector, its bounds and step widths, the
//! current and best log-probabilities and a private random source. The
//! proposal engine moves one or all parameters, wraps them back into range,
//! asks a [`ModelEvaluator`] for the new log-probability and keeps or reverts
//! the move. [`calibrate`] burns a chain in and tunes its step widths until
//! the aggregate acceptance settles near 23%. An [`Ensemble`] clones a
//! calibrated chain along a temperature [`Ladder`] and swaps states between
//! neighbouring temperatures.

/// Burn-in and step-width calibration controller.
pub mod calibration;
/// Chain state, observations and the temperature extension.
pub mod chain;
/// Ensemble checkpoint serialization.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Ladder of tempered chains and the exchange schedule.
pub mod ensemble;
/// Replica exchange between neighbouring chains.
pub mod exchange;
/// Model evaluator contract.
pub mod model;
/// Proposal and Metropolis acceptance engine.
pub mod proposal;
/// Temperature ladders and beta calibration.
pub mod tempering;

pub use calibration::{calibrate, CalibrationPhase, CalibrationReport, Calibrator};
pub use chain::{Chain, Observations, Tempering};
pub use checkpoint::{ChainCheckpoint, EnsembleCheckpoint};
pub use config::{CalibrationConfig, SamplerConfig, SeedPolicy, TemperingConfig};
pub use ensemble::{Ensemble, RunSummary};
pub use exchange::{attempt_exchange, ExchangeOutcome};
pub use model::{ModelEvaluator, ParamChange};
pub use proposal::{accept, wrap_into_range, StepOutcome};
pub use tempering::{calc_beta_0, exchange_acceptance, Ladder};
