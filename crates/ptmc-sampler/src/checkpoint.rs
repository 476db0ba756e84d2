use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ptmc_core::errors::ErrorInfo;
use ptmc_core::McmcError;
use serde::{Deserialize, Serialize};

use crate::chain::{Chain, Tempering};
use crate::ensemble::Ensemble;
use crate::model::ModelEvaluator;

/// Serializable state of one ladder slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCheckpoint {
    /// Current parameters.
    pub params: Vec<f64>,
    /// Best parameters seen so far.
    pub params_best: Vec<f64>,
    /// Best log-probability seen so far.
    pub prob_best: f64,
    /// Proposal half-widths.
    pub steps: Vec<f64>,
    /// Lower bounds.
    pub params_min: Vec<f64>,
    /// Upper bounds.
    pub params_max: Vec<f64>,
    /// Temperature extension of the slot.
    pub tempering: Option<Tempering>,
}

impl ChainCheckpoint {
    /// Captures the state of a chain.
    pub fn capture<R>(chain: &Chain<R>) -> Self {
        Self {
            params: chain.params().to_vec(),
            params_best: chain.params_best().to_vec(),
            prob_best: chain.prob_best(),
            steps: chain.steps().to_vec(),
            params_min: chain.params_min().to_vec(),
            params_max: chain.params_max().to_vec(),
            tempering: chain.tempering(),
        }
    }

    fn restore<R>(&self, chain: &mut Chain<R>) -> Result<(), McmcError> {
        chain.set_params(&self.params)?;
        chain.set_steps(&self.steps)?;
        for (index, (&min, &max)) in self.params_min.iter().zip(&self.params_max).enumerate() {
            chain.set_bounds(index, min, max)?;
        }
        if self.params_best.len() != chain.n_par() {
            return Err(McmcError::Serde(
                ErrorInfo::new("checkpoint-best-length", "best parameters do not match n_par")
                    .with_context("len", self.params_best.len().to_string()),
            ));
        }
        chain.params_best.copy_from_slice(&self.params_best);
        chain.prob_best = self.prob_best;
        chain.tempering = self.tempering;
        Ok(())
    }
}

/// Checkpoint of a whole ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleCheckpoint {
    /// Exchange rounds completed when the checkpoint was taken.
    pub round: usize,
    /// Master seed the ensemble was derived from.
    pub master_seed: u64,
    /// Inverse temperature of the hottest chain.
    pub beta_0: f64,
    /// Optional seed label carried from the configuration.
    #[serde(default)]
    pub seed_label: Option<String>,
    /// Ladder slots, cold chain first.
    pub chains: Vec<ChainCheckpoint>,
}

impl EnsembleCheckpoint {
    /// Captures every chain of an ensemble.
    pub fn capture<E>(ensemble: &Ensemble<E>, seed_label: Option<String>) -> Self {
        Self {
            round: ensemble.rounds(),
            master_seed: ensemble.master_seed(),
            beta_0: ensemble.beta_0(),
            seed_label,
            chains: ensemble
                .chains()
                .iter()
                .map(ChainCheckpoint::capture)
                .collect(),
        }
    }

    /// Restores chain states into an ensemble of the same size and
    /// recomputes each chain's model and probability from the restored
    /// parameters.
    ///
    /// Every slot is rebuilt before the ensemble is touched; on error the
    /// ensemble is left as it was.
    pub fn apply_to<E>(&self, ensemble: &mut Ensemble<E>) -> Result<(), McmcError>
    where
        E: ModelEvaluator + Sync,
    {
        ensemble.ensure_len(self.chains.len())?;
        let mut restored = Vec::with_capacity(self.chains.len());
        for (slot, current) in self.chains.iter().zip(ensemble.chains()) {
            let mut chain = current.clone();
            slot.restore(&mut chain)?;
            chain.refresh(ensemble.evaluator());
            chain.reset_accept_rejects();
            restored.push(chain);
        }
        ensemble.replace_chains(restored, self.round);
        Ok(())
    }

    /// Reads a checkpoint written by [`EnsembleCheckpoint::store`].
    pub fn load(path: &Path) -> Result<Self, McmcError> {
        let text = fs::read_to_string(path).map_err(file_error("checkpoint-read", path))?;
        serde_json::from_str(&text).map_err(file_error("checkpoint-parse", path))
    }

    /// Writes the checkpoint as pretty-printed JSON, creating parent
    /// directories as needed. Every float reads back bit-for-bit through
    /// [`EnsembleCheckpoint::load`].
    pub fn store(&self, path: &Path) -> Result<(), McmcError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(file_error("checkpoint-serialize", path))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(file_error("checkpoint-mkdir", dir))?;
        }
        fs::write(path, json).map_err(file_error("checkpoint-write", path))
    }
}

fn file_error<'a, D: fmt::Display + 'a>(
    code: &'static str,
    path: &'a Path,
) -> impl FnOnce(D) -> McmcError + 'a {
    move |err| McmcError::Serde(ErrorInfo::new(code, err.to_string()).with_path(path))
}

/// Checkpoint file path for a given exchange round.
pub fn checkpoint_path(root: &Path, round: usize) -> PathBuf {
    root.join(format!("ckpt_{round:05}.json"))
}
