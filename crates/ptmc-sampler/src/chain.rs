use ptmc_core::errors::ErrorInfo;
use ptmc_core::{McmcError, RngHandle, UniformSource};
use serde::{Deserialize, Serialize};

/// Log-probability a fresh chain starts from before any model is bound.
pub const INITIAL_PROB: f64 = -1e10;

/// Log-probability written by [`Chain::restart_from_best`] so the next
/// comparison is trivially favourable.
pub const RESTART_PROB: f64 = -1e7;

/// Observation vectors a chain is fitted against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Observations {
    /// Pairs abscissa and ordinate vectors of equal, non-zero length.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, McmcError> {
        if x.len() != y.len() {
            return Err(McmcError::Chain(
                ErrorInfo::new("observation-length", "x and y have different lengths")
                    .with_context("x_len", x.len().to_string())
                    .with_context("y_len", y.len().to_string()),
            ));
        }
        if x.is_empty() {
            return Err(McmcError::Chain(ErrorInfo::new(
                "observation-empty",
                "observation vectors are empty",
            )));
        }
        Ok(Self { x, y })
    }

    /// Abscissa values.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Ordinate values.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always false for a constructed value; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Temperature extension carried by chains that take part in an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempering {
    /// Inverse temperature applied to the log-probability in acceptance tests.
    pub beta: f64,
    /// Number of replica exchanges this slot took part in since `beta` was set.
    pub swapcount: u64,
}

/// A single Markov chain: parameter vector, bounds, step widths, current and
/// best log-probability, counters and its private random source.
///
/// The generator type defaults to [`RngHandle`]; tests plug in deterministic
/// sources through [`Chain::with_source`].
#[derive(Debug, Clone)]
pub struct Chain<R = RngHandle> {
    pub(crate) n_par: usize,
    pub(crate) params: Vec<f64>,
    pub(crate) params_best: Vec<f64>,
    pub(crate) params_step: Vec<f64>,
    pub(crate) params_min: Vec<f64>,
    pub(crate) params_max: Vec<f64>,
    pub(crate) params_accepts: Vec<u64>,
    pub(crate) params_rejects: Vec<u64>,
    pub(crate) params_names: Vec<String>,
    pub(crate) accept: u64,
    pub(crate) reject: u64,
    pub(crate) prob: f64,
    pub(crate) prob_best: f64,
    pub(crate) observations: Option<Observations>,
    pub(crate) model: Vec<f64>,
    pub(crate) history: Vec<Vec<f64>>,
    pub(crate) rng: R,
    pub(crate) tempering: Option<Tempering>,
}

impl Chain<RngHandle> {
    /// Creates a chain with `n_par` parameters and an entropy-seeded generator.
    pub fn new(n_par: usize) -> Self {
        Self::with_source(n_par, RngHandle::default())
    }

    /// Creates a chain whose generator is seeded deterministically.
    pub fn with_seed(n_par: usize, seed: u64) -> Self {
        Self::with_source(n_par, RngHandle::from_seed(seed))
    }
}

impl<R> Chain<R> {
    /// Creates a chain around an explicit uniform source.
    ///
    /// Bounds and steps start zeroed; data, model and probability must be
    /// bound before the chain is stepped.
    pub fn with_source(n_par: usize, rng: R) -> Self {
        Self {
            n_par,
            params: vec![0.0; n_par],
            params_best: vec![0.0; n_par],
            params_step: vec![0.0; n_par],
            params_min: vec![0.0; n_par],
            params_max: vec![0.0; n_par],
            params_accepts: vec![0; n_par],
            params_rejects: vec![0; n_par],
            params_names: (0..n_par).map(|i| format!("param{i}")).collect(),
            accept: 0,
            reject: 0,
            prob: INITIAL_PROB,
            prob_best: INITIAL_PROB,
            observations: None,
            model: Vec::new(),
            history: Vec::with_capacity(1),
            rng,
            tempering: None,
        }
    }

    /// Replaces the chain's generator.
    pub fn set_source(&mut self, rng: R) {
        self.rng = rng;
    }

    /// Mutable access to the chain's generator.
    pub fn source_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Number of parameters, fixed at creation.
    pub fn n_par(&self) -> usize {
        self.n_par
    }

    fn check_index(&self, index: usize) -> Result<(), McmcError> {
        if index >= self.n_par {
            return Err(McmcError::Chain(
                ErrorInfo::new("param-index", "parameter index out of range")
                    .with_context("index", index.to_string())
                    .with_context("n_par", self.n_par.to_string()),
            ));
        }
        Ok(())
    }

    /// Sets the allowed range `[min, max]` of a parameter.
    pub fn set_bounds(&mut self, index: usize, min: f64, max: f64) -> Result<(), McmcError> {
        self.check_index(index)?;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(McmcError::Chain(
                ErrorInfo::new("param-bounds", "invalid parameter bounds")
                    .with_context("index", index.to_string())
                    .with_context("min", min.to_string())
                    .with_context("max", max.to_string())
                    .with_hint("bounds must be finite with min <= max"),
            ));
        }
        self.params_min[index] = min;
        self.params_max[index] = max;
        Ok(())
    }

    /// Sets the proposal half-width of a parameter.
    pub fn set_step(&mut self, index: usize, step: f64) -> Result<(), McmcError> {
        self.check_index(index)?;
        if !(step.is_finite() && step > 0.0) {
            return Err(McmcError::Chain(
                ErrorInfo::new("param-step", "step width must be positive and finite")
                    .with_context("index", index.to_string())
                    .with_context("step", step.to_string()),
            ));
        }
        self.params_step[index] = step;
        Ok(())
    }

    /// Replaces every step width.
    pub fn set_steps(&mut self, steps: &[f64]) -> Result<(), McmcError> {
        self.check_len("steps", steps.len())?;
        for (index, &step) in steps.iter().enumerate() {
            self.set_step(index, step)?;
        }
        Ok(())
    }

    /// Multiplies every step width by `factor`.
    pub fn scale_steps(&mut self, factor: f64) {
        for step in &mut self.params_step {
            *step *= factor;
        }
    }

    /// Sets the current value of a parameter. Best values are left untouched.
    pub fn set_param(&mut self, index: usize, value: f64) -> Result<(), McmcError> {
        self.check_index(index)?;
        self.params[index] = value;
        Ok(())
    }

    /// Replaces the current parameter vector.
    pub fn set_params(&mut self, params: &[f64]) -> Result<(), McmcError> {
        self.check_len("params", params.len())?;
        self.params.copy_from_slice(params);
        Ok(())
    }

    /// Attaches a descriptive name to a parameter.
    pub fn set_param_name(&mut self, index: usize, name: impl Into<String>) -> Result<(), McmcError> {
        self.check_index(index)?;
        self.params_names[index] = name.into();
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> Result<(), McmcError> {
        if len != self.n_par {
            return Err(McmcError::Chain(
                ErrorInfo::new("param-length", format!("{what} length does not match n_par"))
                    .with_context("len", len.to_string())
                    .with_context("n_par", self.n_par.to_string()),
            ));
        }
        Ok(())
    }

    /// Binds the observation vectors. Any previously bound model is dropped.
    pub fn bind_data(&mut self, observations: Observations) {
        self.observations = Some(observations);
        self.model.clear();
    }

    /// Binds the initial model curve and its log-probability.
    pub fn set_model(&mut self, model: Vec<f64>, prob: f64) -> Result<(), McmcError> {
        let Some(observations) = &self.observations else {
            return Err(McmcError::Chain(
                ErrorInfo::new("model-unbound-data", "model set before observations")
                    .with_hint("call bind_data first"),
            ));
        };
        if model.len() != observations.len() {
            return Err(McmcError::Chain(
                ErrorInfo::new("model-length", "model length does not match observations")
                    .with_context("model_len", model.len().to_string())
                    .with_context("observations", observations.len().to_string()),
            ));
        }
        self.model = model;
        self.prob = prob;
        Ok(())
    }

    /// Current parameter vector.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Best parameter vector seen so far.
    pub fn params_best(&self) -> &[f64] {
        &self.params_best
    }

    /// Proposal half-widths.
    pub fn steps(&self) -> &[f64] {
        &self.params_step
    }

    /// Lower parameter bounds.
    pub fn params_min(&self) -> &[f64] {
        &self.params_min
    }

    /// Upper parameter bounds.
    pub fn params_max(&self) -> &[f64] {
        &self.params_max
    }

    /// Parameter names in index order.
    pub fn param_names(&self) -> &[String] {
        &self.params_names
    }

    /// Current (untempered) log-probability.
    pub fn prob(&self) -> f64 {
        self.prob
    }

    /// Best log-probability seen so far.
    pub fn prob_best(&self) -> f64 {
        self.prob_best
    }

    /// Current model curve.
    pub fn model(&self) -> &[f64] {
        &self.model
    }

    /// Bound observations, if any.
    pub fn observations(&self) -> Option<&Observations> {
        self.observations.as_ref()
    }

    /// Updates the best snapshot if the current state improves on it.
    pub fn check_best(&mut self) {
        if self.prob > self.prob_best {
            self.prob_best = self.prob;
            self.params_best.copy_from_slice(&self.params);
        }
    }

    /// Resets the parameters to the best snapshot and the probability to
    /// [`RESTART_PROB`].
    pub fn restart_from_best(&mut self) {
        self.params.copy_from_slice(&self.params_best);
        self.prob = RESTART_PROB;
    }

    /// Zeroes per-parameter and aggregate accept/reject counters.
    pub fn reset_accept_rejects(&mut self) {
        self.params_accepts.iter_mut().for_each(|count| *count = 0);
        self.params_rejects.iter_mut().for_each(|count| *count = 0);
        self.accept = 0;
        self.reject = 0;
    }

    /// Per-parameter accepted proposals.
    pub fn params_accepts(&self) -> &[u64] {
        &self.params_accepts
    }

    /// Per-parameter rejected proposals.
    pub fn params_rejects(&self) -> &[u64] {
        &self.params_rejects
    }

    /// Aggregate accepted proposals.
    pub fn accepts(&self) -> u64 {
        self.accept
    }

    /// Aggregate rejected proposals.
    pub fn rejects(&self) -> u64 {
        self.reject
    }

    /// Acceptance rate of every parameter since the last counter reset.
    /// Parameters without any proposal report 0.
    pub fn accept_rates(&self) -> Vec<f64> {
        self.params_accepts
            .iter()
            .zip(&self.params_rejects)
            .map(|(&accepts, &rejects)| ratio(accepts, rejects))
            .collect()
    }

    /// Aggregate acceptance rate since the last counter reset.
    pub fn accept_rate(&self) -> f64 {
        ratio(self.accept, self.reject)
    }

    /// Reserves history space for recording iteration `iter`.
    pub fn prepare_iteration(&mut self, iter: usize) {
        let needed = iter + 1;
        if self.history.capacity() < needed {
            self.history.reserve(needed - self.history.len());
        }
    }

    /// Records the current parameters as the next history entry.
    pub fn append_current_parameters(&mut self) {
        self.prepare_iteration(self.history.len());
        self.history.push(self.params.clone());
    }

    /// Recorded parameter snapshots in iteration order.
    pub fn history(&self) -> &[Vec<f64>] {
        &self.history
    }

    /// Number of recorded iterations.
    pub fn n_iter(&self) -> usize {
        self.history.len()
    }

    /// Drops every recorded snapshot.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Sets the inverse temperature, attaching the extension if needed.
    /// The swap counter restarts from zero.
    pub fn set_beta(&mut self, beta: f64) {
        self.tempering = Some(Tempering { beta, swapcount: 0 });
    }

    /// Inverse temperature; 1.0 for chains without the extension.
    pub fn beta(&self) -> f64 {
        self.tempering.map_or(1.0, |ext| ext.beta)
    }

    /// Temperature extension, if attached.
    pub fn tempering(&self) -> Option<Tempering> {
        self.tempering
    }

    /// Counts one replica exchange involving this chain.
    pub fn inc_swapcount(&mut self) {
        let ext = self.tempering.get_or_insert(Tempering {
            beta: 1.0,
            swapcount: 0,
        });
        ext.swapcount += 1;
    }

    /// Replica exchanges since the last [`Chain::set_beta`].
    pub fn swapcount(&self) -> u64 {
        self.tempering.map_or(0, |ext| ext.swapcount)
    }

    /// Exchanges the sampled state (parameters, model and probability) with
    /// another chain. Temperatures, steps, counters and generators stay put.
    pub fn swap_state(&mut self, other: &mut Chain<R>) {
        std::mem::swap(&mut self.params, &mut other.params);
        std::mem::swap(&mut self.model, &mut other.model);
        std::mem::swap(&mut self.prob, &mut other.prob);
    }

    /// Checks the structural preconditions required before stepping.
    pub fn validate(&self) -> Result<(), McmcError> {
        let fail = |code: &str, message: &str| McmcError::Chain(ErrorInfo::new(code, message));
        if self.n_par == 0 {
            return Err(fail("no-params", "chain has no parameters"));
        }
        let observations = self
            .observations
            .as_ref()
            .ok_or_else(|| fail("unbound-data", "observations are not bound"))?;
        if self.model.is_empty() {
            return Err(fail("unbound-model", "model is not bound"));
        }
        if self.model.len() != observations.len() {
            return Err(McmcError::Chain(
                ErrorInfo::new("model-length", "model length does not match observations")
                    .with_context("model_len", self.model.len().to_string())
                    .with_context("observations", observations.len().to_string()),
            ));
        }
        if self.params.len() != self.n_par || self.params_best.len() != self.n_par {
            return Err(fail("param-length", "parameter vectors do not match n_par"));
        }
        if let Some(index) = self.params_step.iter().position(|&step| !(step > 0.0)) {
            return Err(McmcError::Chain(
                ErrorInfo::new("param-step", "step width must be positive")
                    .with_context("index", index.to_string())
                    .with_context("name", self.params_names[index].clone()),
            ));
        }
        Ok(())
    }

    /// Asserts the structural preconditions. A violation aborts the caller.
    pub fn check(&self) {
        if let Err(err) = self.validate() {
            panic!("chain precondition violated: {err}");
        }
    }
}

impl<R: UniformSource> Chain<R> {
    /// Draws a uniform value in `[0, 1)` from the chain's own source.
    pub fn next_uniform(&mut self) -> f64 {
        self.rng.next_uniform()
    }
}

fn ratio(accepts: u64, rejects: u64) -> f64 {
    let total = accepts + rejects;
    if total == 0 {
        0.0
    } else {
        accepts as f64 / total as f64
    }
}
