use log::{debug, info};
use ptmc_core::{McmcError, UniformSource};
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::config::CalibrationConfig;
use crate::model::ModelEvaluator;

/// Joint proposals per burn-in batch.
pub const BURN_IN_BATCH: usize = 200;
/// Calibration iterations between step-width checkpoints.
pub const CHECKPOINT_INTERVAL: usize = 200;
/// Joint proposals used to measure the aggregate acceptance at a checkpoint.
pub const MEASURE_STEPS: usize = 200;
/// Aggregate acceptance the controller converges towards.
pub const TARGET_ACCEPTANCE: f64 = 0.23;
/// Tolerance around [`TARGET_ACCEPTANCE`] that counts as converged.
pub const ACCEPTANCE_TOLERANCE: f64 = 0.01;
/// Half-width of the per-parameter acceptance band around `rat_limit`.
pub const RATE_BAND: f64 = 0.05;
/// Multiplicative nudge applied to `rat_limit` after a missed checkpoint.
pub const RAT_LIMIT_NUDGE: f64 = 0.99;

/// Phases of the calibration controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationPhase {
    /// First half of burn-in.
    BurnIn1,
    /// Restart from the best state found so far.
    ReinitFromBest,
    /// Second half of burn-in.
    BurnIn2,
    /// One-off scaling of every step width.
    StepAdjust,
    /// Iterative per-parameter step tuning.
    CalibrationLoop,
    /// Aggregate acceptance reached the target.
    Converged,
    /// The iteration budget ran out first.
    Exhausted,
}

impl CalibrationPhase {
    /// Whether the controller has stopped.
    pub fn is_terminal(self) -> bool {
        matches!(self, CalibrationPhase::Converged | CalibrationPhase::Exhausted)
    }
}

/// Summary of a finished calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Terminal phase: converged or exhausted.
    pub phase: CalibrationPhase,
    /// Joint proposals spent on burn-in.
    pub burn_in_iterations: usize,
    /// Calibration iterations performed after burn-in.
    pub iterations: usize,
    /// Checkpoints evaluated.
    pub checkpoints: usize,
    /// Per-parameter target acceptance after the last adjustment.
    pub rat_limit: f64,
    /// Aggregate acceptance measured at the last checkpoint.
    pub last_acceptance: Option<f64>,
    /// Step widths after calibration.
    pub steps: Vec<f64>,
}

impl CalibrationReport {
    /// Whether calibration converged.
    pub fn converged(&self) -> bool {
        self.phase == CalibrationPhase::Converged
    }
}

/// Default per-parameter acceptance target so that `n_par` independent
/// accept events combine to about 25%.
pub fn default_rat_limit(n_par: usize) -> f64 {
    0.25_f64.powf(1.0 / n_par as f64)
}

/// State machine tuning a chain's step widths.
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationConfig,
    phase: CalibrationPhase,
    rat_limit: f64,
    burn_in_done: usize,
    iterations: usize,
    checkpoints: usize,
    last_acceptance: Option<f64>,
}

impl Calibrator {
    /// Creates a controller for a chain with `n_par` parameters.
    pub fn new(config: &CalibrationConfig, n_par: usize) -> Result<Self, McmcError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            phase: CalibrationPhase::BurnIn1,
            rat_limit: config.rat_limit.unwrap_or_else(|| default_rat_limit(n_par)),
            burn_in_done: 0,
            iterations: 0,
            checkpoints: 0,
            last_acceptance: None,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Current per-parameter acceptance target.
    pub fn rat_limit(&self) -> f64 {
        self.rat_limit
    }

    /// Runs the current phase to completion and moves to the next one.
    pub fn advance<R, E>(&mut self, chain: &mut Chain<R>, evaluator: &E) -> CalibrationPhase
    where
        R: UniformSource,
        E: ModelEvaluator + ?Sized,
    {
        chain.check();
        self.phase = match self.phase {
            CalibrationPhase::BurnIn1 => {
                debug!("starting burn-in");
                self.burn_in(chain, evaluator, self.config.burn_in_iterations / 2);
                CalibrationPhase::ReinitFromBest
            }
            CalibrationPhase::ReinitFromBest => {
                debug!("re-initializing burn-in from best state");
                chain.restart_from_best();
                CalibrationPhase::BurnIn2
            }
            CalibrationPhase::BurnIn2 => {
                self.burn_in(chain, evaluator, self.config.burn_in_iterations);
                CalibrationPhase::StepAdjust
            }
            CalibrationPhase::StepAdjust => {
                debug!("burn-in done, adjusting steps by {}", self.config.adjust_step);
                chain.scale_steps(self.config.adjust_step);
                let best = chain.params_best().to_vec();
                chain.params.copy_from_slice(&best);
                chain.reset_accept_rejects();
                CalibrationPhase::CalibrationLoop
            }
            CalibrationPhase::CalibrationLoop => self.calibration_loop(chain, evaluator),
            terminal => terminal,
        };
        self.phase
    }

    /// Drives the controller until it converges or exhausts its budget.
    pub fn run<R, E>(&mut self, chain: &mut Chain<R>, evaluator: &E) -> CalibrationReport
    where
        R: UniformSource,
        E: ModelEvaluator + ?Sized,
    {
        info!(
            "calibrating chain with {} parameters, rat_limit {:.4}",
            chain.n_par(),
            self.rat_limit
        );
        while !self.phase.is_terminal() {
            self.advance(chain, evaluator);
        }
        let report = self.report(chain);
        info!(
            "calibration finished: {:?} after {} iterations, acceptance {:?}",
            report.phase, report.iterations, report.last_acceptance
        );
        report
    }

    /// Snapshot of the controller's progress.
    pub fn report<R>(&self, chain: &Chain<R>) -> CalibrationReport {
        CalibrationReport {
            phase: self.phase,
            burn_in_iterations: self.burn_in_done,
            iterations: self.iterations,
            checkpoints: self.checkpoints,
            rat_limit: self.rat_limit,
            last_acceptance: self.last_acceptance,
            steps: chain.steps().to_vec(),
        }
    }

    fn total_iterations(&self) -> usize {
        self.burn_in_done + self.iterations
    }

    fn burn_in<R, E>(&mut self, chain: &mut Chain<R>, evaluator: &E, until: usize)
    where
        R: UniformSource,
        E: ModelEvaluator + ?Sized,
    {
        while self.burn_in_done < until {
            let batch = BURN_IN_BATCH.min(until - self.burn_in_done);
            for _ in 0..batch {
                chain.step_all(evaluator);
            }
            self.burn_in_done += batch;
            chain.check_best();
            debug!(
                "burn-in iteration {} prob {:.6} best {:.6}",
                self.burn_in_done,
                chain.prob(),
                chain.prob_best()
            );
        }
    }

    fn calibration_loop<R, E>(&mut self, chain: &mut Chain<R>, evaluator: &E) -> CalibrationPhase
    where
        R: UniformSource,
        E: ModelEvaluator + ?Sized,
    {
        // Burn-in shares the `iter_limit` budget and the checkpoint clock.
        while self.total_iterations() < self.config.iter_limit {
            for index in 0..chain.n_par() {
                chain.step_one(evaluator, index);
                chain.check_best();
            }
            self.iterations += 1;
            if self.total_iterations() % CHECKPOINT_INTERVAL == 0
                && self.checkpoint(chain, evaluator)
            {
                return CalibrationPhase::Converged;
            }
        }
        CalibrationPhase::Exhausted
    }

    /// Adjusts steps and `rat_limit`; returns true once converged.
    fn checkpoint<R, E>(&mut self, chain: &mut Chain<R>, evaluator: &E) -> bool
    where
        R: UniformSource,
        E: ModelEvaluator + ?Sized,
    {
        self.checkpoints += 1;
        let rates = chain.accept_rates();
        debug!(
            "iteration {}: params {:?} acceptance {:?} steps {:?}",
            self.iterations,
            chain.params(),
            rates,
            chain.steps()
        );

        for (index, &rate) in rates.iter().enumerate() {
            // `mul` < 1, so dividing widens the step.
            if rate > self.rat_limit + RATE_BAND {
                chain.params_step[index] /= self.config.mul;
            }
            if rate < self.rat_limit - RATE_BAND {
                chain.params_step[index] *= self.config.mul;
            }
        }

        chain.restart_from_best();
        chain.reset_accept_rejects();
        for _ in 0..MEASURE_STEPS {
            chain.step_all(evaluator);
            chain.check_best();
        }
        let acceptance = chain.accept_rate();
        self.last_acceptance = Some(acceptance);
        debug!("overall acceptance after reset {acceptance:.4}, steps {:?}", chain.steps());

        let delta = acceptance - TARGET_ACCEPTANCE;
        if delta.abs() < ACCEPTANCE_TOLERANCE {
            return true;
        }
        if delta < 0.0 {
            self.rat_limit /= RAT_LIMIT_NUDGE;
        } else {
            self.rat_limit *= RAT_LIMIT_NUDGE;
        }
        false
    }
}

/// Burns in and calibrates `chain` with the given settings.
pub fn calibrate<R, E>(
    chain: &mut Chain<R>,
    evaluator: &E,
    config: &CalibrationConfig,
) -> Result<CalibrationReport, McmcError>
where
    R: UniformSource,
    E: ModelEvaluator + ?Sized,
{
    let mut calibrator = Calibrator::new(config, chain.n_par())?;
    Ok(calibrator.run(chain, evaluator))
}
