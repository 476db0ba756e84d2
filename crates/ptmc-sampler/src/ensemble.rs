use log::{debug, info};
use ptmc_core::errors::ErrorInfo;
use ptmc_core::{McmcError, RngHandle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::config::TemperingConfig;
use crate::exchange::{self, ExchangeOutcome};
use crate::model::ModelEvaluator;
use crate::tempering;

/// Summary returned after running exchange rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Exchange rounds completed over the lifetime of the ensemble.
    pub rounds: usize,
    /// Inverse temperatures, cold chain first.
    pub betas: Vec<f64>,
    /// Swap counters of every slot.
    pub swapcounts: Vec<u64>,
    /// Accepted fraction of exchange attempts for each adjacent pair.
    pub exchange_acceptance: Vec<f64>,
    /// Best log-probability found by the cold chain.
    pub cold_prob_best: f64,
    /// Best parameters found by the cold chain.
    pub cold_params_best: Vec<f64>,
}

/// Ladder of tempered chains sharing one model evaluator.
#[derive(Debug)]
pub struct Ensemble<E> {
    chains: Vec<Chain<RngHandle>>,
    evaluator: E,
    config: TemperingConfig,
    beta_0: f64,
    master_seed: u64,
    rounds: usize,
    exchange_attempts: Vec<u64>,
    exchange_accepts: Vec<u64>,
}

impl<E> Ensemble<E>
where
    E: ModelEvaluator + Sync,
{
    /// Builds `n_beta` chains from a bound (usually calibrated) template.
    ///
    /// Each chain is reseeded from `master_seed`, receives its ladder beta and
    /// has its step widths divided by the ladder's step-width factor.
    pub fn new(
        template: &Chain<RngHandle>,
        evaluator: E,
        config: &TemperingConfig,
        master_seed: u64,
    ) -> Result<Self, McmcError> {
        config.validate()?;
        template.validate()?;
        let n_beta = config.n_beta;
        let beta_0 = match config.beta_0 {
            Some(beta_0) => beta_0,
            None => tempering::calc_beta_0(template, None, config.beta_0_stepwidth)?,
        };

        let mut chains = Vec::with_capacity(n_beta);
        for index in 0..n_beta {
            let mut chain = template.clone();
            chain.set_source(RngHandle::from_substream(master_seed, index as u64));
            chain.set_beta(config.ladder.chain_beta(index, n_beta, beta_0));
            let factor = config.ladder.chain_stepwidth(index, n_beta, beta_0);
            chain.scale_steps(1.0 / factor);
            chain.reset_accept_rejects();
            chain.clear_history();
            chains.push(chain);
        }
        info!(
            "built {:?} ladder with {} chains, beta_0 {:.4}",
            config.ladder, n_beta, beta_0
        );

        let pairs = n_beta.saturating_sub(1);
        Ok(Self {
            chains,
            evaluator,
            config: config.clone(),
            beta_0,
            master_seed,
            rounds: 0,
            exchange_attempts: vec![0; pairs],
            exchange_accepts: vec![0; pairs],
        })
    }

    /// Advances every chain by `iterations` joint steps, chains in parallel.
    pub fn advance(&mut self, iterations: usize) {
        let evaluator = &self.evaluator;
        let record = self.config.record_history;
        self.chains.par_iter_mut().for_each(|chain| {
            if record {
                chain.prepare_iteration(chain.n_iter() + iterations);
            }
            for _ in 0..iterations {
                chain.step_all(evaluator);
                chain.check_best();
                if record {
                    chain.append_current_parameters();
                }
            }
        });
    }

    /// Attempts one exchange per adjacent pair, hottest pair first.
    /// Returns the number of accepted swaps.
    pub fn exchange_round(&mut self) -> usize {
        let mut accepted = 0;
        for pair in (0..self.chains.len().saturating_sub(1)).rev() {
            let stream = self.exchange_stream(pair);
            let mut rng = RngHandle::from_substream(self.master_seed, stream);
            let ExchangeOutcome {
                accepted: swapped,
                acceptance,
                ..
            } = exchange::attempt_exchange(&mut self.chains, pair, &mut rng);
            self.exchange_attempts[pair] += 1;
            if swapped {
                self.exchange_accepts[pair] += 1;
                accepted += 1;
            }
            debug!("round {} pair {pair}: acceptance {acceptance:.4} swapped {swapped}", self.rounds);
        }
        self.rounds += 1;
        accepted
    }

    /// Alternates `swap_interval` joint steps with an exchange round.
    pub fn run(&mut self, rounds: usize) -> RunSummary {
        for _ in 0..rounds {
            self.advance(self.config.swap_interval);
            self.exchange_round();
        }
        self.log_positions();
        self.summary()
    }

    /// Current summary of the ensemble.
    pub fn summary(&self) -> RunSummary {
        let cold = &self.chains[0];
        RunSummary {
            rounds: self.rounds,
            betas: self.betas(),
            swapcounts: self.chains.iter().map(Chain::swapcount).collect(),
            exchange_acceptance: self
                .exchange_attempts
                .iter()
                .zip(&self.exchange_accepts)
                .map(|(&attempts, &accepts)| {
                    if attempts == 0 {
                        0.0
                    } else {
                        accepts as f64 / attempts as f64
                    }
                })
                .collect(),
            cold_prob_best: cold.prob_best(),
            cold_params_best: cold.params_best().to_vec(),
        }
    }

    /// Dumps swap counts and current/best positions of every chain.
    pub fn log_positions(&self) {
        for (index, chain) in self.chains.iter().enumerate() {
            info!(
                "chain {index}: beta {:.4} swapped {} times; current {:.6} {:?}; best {:.6} {:?}",
                chain.beta(),
                chain.swapcount(),
                chain.prob(),
                chain.params(),
                chain.prob_best(),
                chain.params_best()
            );
        }
    }
}

impl<E> Ensemble<E> {
    /// Chains ordered from cold (beta = 1) to hot.
    pub fn chains(&self) -> &[Chain<RngHandle>] {
        &self.chains
    }

    /// Mutable access to the chains, e.g. for restoring a checkpoint.
    pub fn chains_mut(&mut self) -> &mut [Chain<RngHandle>] {
        &mut self.chains
    }

    /// The untempered chain.
    pub fn cold_chain(&self) -> &Chain<RngHandle> {
        &self.chains[0]
    }

    /// Inverse temperatures, cold chain first.
    pub fn betas(&self) -> Vec<f64> {
        self.chains.iter().map(Chain::beta).collect()
    }

    /// Inverse temperature of the hottest chain.
    pub fn beta_0(&self) -> f64 {
        self.beta_0
    }

    /// Master seed the chains were derived from.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Exchange rounds completed.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Shared evaluator.
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Substream of the exchange attempt between `pair` and `pair + 1` in the
    /// current round. Streams `0..n_beta` belong to the chains, so exchange
    /// streams are numbered after them.
    fn exchange_stream(&self, pair: usize) -> u64 {
        let n_beta = self.chains.len() as u64;
        let n_pairs = n_beta.saturating_sub(1);
        n_beta + self.rounds as u64 * n_pairs + pair as u64
    }

    pub(crate) fn replace_chains(&mut self, chains: Vec<Chain<RngHandle>>, rounds: usize) {
        debug_assert_eq!(chains.len(), self.chains.len());
        self.chains = chains;
        self.rounds = rounds;
    }

    pub(crate) fn ensure_len(&self, len: usize) -> Result<(), McmcError> {
        if len != self.chains.len() {
            return Err(McmcError::Tempering(
                ErrorInfo::new("chain-count", "chain count does not match the ensemble")
                    .with_context("expected", self.chains.len().to_string())
                    .with_context("found", len.to_string()),
            ));
        }
        Ok(())
    }
}
