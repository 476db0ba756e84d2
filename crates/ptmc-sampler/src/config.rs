use std::fs;
use std::path::Path;

use ptmc_core::errors::ErrorInfo;
use ptmc_core::McmcError;
use serde::{Deserialize, Serialize};

use crate::tempering::Ladder;

/// YAML-configurable parameters of a sampling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Burn-in and step-width calibration of the cold chain.
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Temperature ladder and exchange schedule.
    #[serde(default)]
    pub tempering: TemperingConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

impl SamplerConfig {
    /// Parses a configuration from YAML text and validates it.
    pub fn from_yaml_str(text: &str) -> Result<Self, McmcError> {
        let config: SamplerConfig = serde_yaml::from_str(text).map_err(|err| {
            McmcError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, McmcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            McmcError::Serde(ErrorInfo::new("config-read", err.to_string()).with_path(path))
        })?;
        Self::from_yaml_str(&contents).map_err(|err| err.map_info(|info| info.with_path(path)))
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), McmcError> {
        self.calibration.validate()?;
        self.tempering.validate()
    }
}

/// Burn-in and calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Joint proposals spent on burn-in, split in two halves around a restart
    /// from the best state.
    #[serde(default = "default_burn_in_iterations")]
    pub burn_in_iterations: usize,
    /// Per-parameter target acceptance; derived from the parameter count
    /// when absent.
    #[serde(default)]
    pub rat_limit: Option<f64>,
    /// Upper bound on burn-in plus calibration iterations.
    #[serde(default = "default_iter_limit")]
    pub iter_limit: usize,
    /// Step-width adjustment factor, strictly inside `(0, 1)`.
    #[serde(default = "default_mul")]
    pub mul: f64,
    /// Factor applied to every step width after burn-in.
    #[serde(default = "default_adjust_step")]
    pub adjust_step: f64,
}

fn default_burn_in_iterations() -> usize {
    20_000
}

fn default_iter_limit() -> usize {
    200_000
}

fn default_mul() -> f64 {
    0.85
}

fn default_adjust_step() -> f64 {
    0.5
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            burn_in_iterations: default_burn_in_iterations(),
            rat_limit: None,
            iter_limit: default_iter_limit(),
            mul: default_mul(),
            adjust_step: default_adjust_step(),
        }
    }
}

impl CalibrationConfig {
    /// Checks the numeric preconditions of the calibration controller.
    pub fn validate(&self) -> Result<(), McmcError> {
        if !(self.mul > 0.0 && self.mul < 1.0) {
            return Err(McmcError::Config(
                ErrorInfo::new("calibration-mul", "mul must lie strictly between 0 and 1")
                    .with_context("mul", self.mul.to_string()),
            ));
        }
        if !(self.adjust_step.is_finite() && self.adjust_step > 0.0) {
            return Err(McmcError::Config(
                ErrorInfo::new("calibration-adjust-step", "adjust_step must be positive")
                    .with_context("adjust_step", self.adjust_step.to_string()),
            ));
        }
        if let Some(rat_limit) = self.rat_limit {
            if !(rat_limit > 0.0 && rat_limit <= 1.0) {
                return Err(McmcError::Config(
                    ErrorInfo::new("calibration-rat-limit", "rat_limit must lie in (0, 1]")
                        .with_context("rat_limit", rat_limit.to_string())
                        .with_hint("omit rat_limit to derive it from the parameter count"),
                ));
            }
        }
        Ok(())
    }
}

/// Parallel tempering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperingConfig {
    /// Number of chains in the ladder.
    #[serde(default = "default_n_beta")]
    pub n_beta: usize,
    /// Inverse temperature of the hottest chain; calibrated from the cold
    /// chain's ranges and steps when absent.
    #[serde(default)]
    pub beta_0: Option<f64>,
    /// Ladder used to space betas and scale step widths.
    #[serde(default)]
    pub ladder: Ladder,
    /// Fraction of each parameter range the hottest chain should traverse,
    /// used when calibrating `beta_0`.
    #[serde(default = "default_beta_0_stepwidth")]
    pub beta_0_stepwidth: f64,
    /// Joint steps every chain performs between exchange rounds.
    #[serde(default = "default_swap_interval")]
    pub swap_interval: usize,
    /// Whether chains record their parameters after every step.
    #[serde(default = "default_record_history")]
    pub record_history: bool,
}

fn default_n_beta() -> usize {
    4
}

fn default_beta_0_stepwidth() -> f64 {
    0.1
}

fn default_swap_interval() -> usize {
    200
}

fn default_record_history() -> bool {
    true
}

impl Default for TemperingConfig {
    fn default() -> Self {
        Self {
            n_beta: default_n_beta(),
            beta_0: None,
            ladder: Ladder::default(),
            beta_0_stepwidth: default_beta_0_stepwidth(),
            swap_interval: default_swap_interval(),
            record_history: default_record_history(),
        }
    }
}

impl TemperingConfig {
    /// Checks ladder size, `beta_0` and exchange cadence.
    pub fn validate(&self) -> Result<(), McmcError> {
        if self.n_beta == 0 {
            return Err(McmcError::Config(ErrorInfo::new(
                "tempering-n-beta",
                "at least one chain is required",
            )));
        }
        if let Some(beta_0) = self.beta_0 {
            if !(beta_0 > 0.0 && beta_0 <= 1.0) {
                return Err(McmcError::Config(
                    ErrorInfo::new("tempering-beta-0", "beta_0 must lie in (0, 1]")
                        .with_context("beta_0", beta_0.to_string()),
                ));
            }
        }
        if !(self.beta_0_stepwidth.is_finite() && self.beta_0_stepwidth > 0.0) {
            return Err(McmcError::Config(
                ErrorInfo::new("tempering-beta-0-stepwidth", "fraction must be positive")
                    .with_context("beta_0_stepwidth", self.beta_0_stepwidth.to_string()),
            ));
        }
        if self.swap_interval == 0 {
            return Err(McmcError::Config(ErrorInfo::new(
                "tempering-swap-interval",
                "swap_interval must be at least 1",
            )));
        }
        Ok(())
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded alongside checkpoints.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
