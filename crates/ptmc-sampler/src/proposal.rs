use ptmc_core::UniformSource;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::model::{ModelEvaluator, ParamChange};

/// Outcome of a single Metropolis step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Whether the proposal was kept.
    pub accepted: bool,
    /// Log-probability before the proposal.
    pub prob_old: f64,
    /// Log-probability the evaluator reported for the proposal.
    pub prob_new: f64,
}

/// Metropolis test in log space.
///
/// Equal probabilities are accepted without consuming a draw, improvements
/// are always accepted and worsenings are accepted when
/// `ln(u) < prob_new - prob_old`.
pub fn accept<S: UniformSource + ?Sized>(rng: &mut S, prob_old: f64, prob_new: f64) -> bool {
    if prob_new == prob_old {
        return true;
    }
    if prob_new > prob_old {
        return true;
    }
    rng.next_log_uniform() < prob_new - prob_old
}

/// Maps `value` back into `[min, max]` by toroidal wrap-around.
///
/// Overshoot past `max` is folded back down from `max`, undershoot below
/// `min` is folded up from `min`, so arbitrarily large steps stay contained.
/// A degenerate range pins the value to `min`.
pub fn wrap_into_range(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return min;
    }
    let range = max - min;
    let wrapped = if value > max {
        max - canonical_mod(value - max, range)
    } else if value < min {
        min + canonical_mod(min - value, range)
    } else {
        value
    };
    wrapped.clamp(min, max)
}

/// Remainder of `x / div` in `[0, div)`.
fn canonical_mod(x: f64, div: f64) -> f64 {
    let mut rem = x.rem_euclid(div);
    while rem >= div {
        rem -= div;
    }
    while rem < 0.0 {
        rem += div;
    }
    rem
}

impl<R: UniformSource> Chain<R> {
    /// Moves parameter `index` uniformly within its step width and wraps the
    /// result back into the allowed range.
    pub fn propose_one(&mut self, index: usize) {
        let u = self.rng.next_uniform();
        let proposed = self.params[index] + (2.0 * u - 1.0) * self.params_step[index];
        self.params[index] =
            wrap_into_range(proposed, self.params_min[index], self.params_max[index]);
    }

    /// Joint move: proposes a new value for every parameter.
    pub fn propose_all(&mut self) {
        for index in 0..self.n_par {
            self.propose_one(index);
        }
    }

    /// Metropolis test on beta-weighted probabilities using the chain's source.
    pub fn accept_transition(&mut self, prob_old: f64, prob_new: f64) -> bool {
        let beta = self.beta();
        accept(&mut self.rng, beta * prob_old, beta * prob_new)
    }

    fn evaluate<E>(&mut self, evaluator: &E, change: ParamChange<'_>) -> f64
    where
        E: ModelEvaluator + ?Sized,
    {
        let Some(observations) = self.observations.as_ref() else {
            panic!("chain stepped before observations were bound");
        };
        evaluator.evaluate(observations, &self.params, &mut self.model, change)
    }

    /// Recomputes model and probability for the current parameters.
    pub fn refresh<E>(&mut self, evaluator: &E)
    where
        E: ModelEvaluator + ?Sized,
    {
        let current = self.params.clone();
        self.prob = self.evaluate(evaluator, ParamChange::All { previous: &current });
    }

    /// Proposes a new value for parameter `index`, evaluates the model and
    /// keeps or reverts the move.
    pub fn step_one<E>(&mut self, evaluator: &E, index: usize) -> StepOutcome
    where
        E: ModelEvaluator + ?Sized,
    {
        self.check();
        let prob_old = self.prob;
        let old_model = self.model.clone();
        let old_value = self.params[index];

        self.propose_one(index);
        self.prob = self.evaluate(
            evaluator,
            ParamChange::One {
                index,
                previous: old_value,
            },
        );
        let prob_new = self.prob;

        let accepted = self.accept_transition(prob_old, prob_new);
        if accepted {
            self.params_accepts[index] += 1;
            self.accept += 1;
        } else {
            self.model = old_model;
            self.prob = prob_old;
            self.params[index] = old_value;
            self.params_rejects[index] += 1;
            self.reject += 1;
        }
        StepOutcome {
            accepted,
            prob_old,
            prob_new,
        }
    }

    /// Joint Metropolis step over every parameter.
    pub fn step_all<E>(&mut self, evaluator: &E) -> StepOutcome
    where
        E: ModelEvaluator + ?Sized,
    {
        self.check();
        let prob_old = self.prob;
        let old_model = self.model.clone();
        let old_values = self.params.clone();

        self.propose_all();
        self.prob = self.evaluate(
            evaluator,
            ParamChange::All {
                previous: &old_values,
            },
        );
        let prob_new = self.prob;

        let accepted = self.accept_transition(prob_old, prob_new);
        if accepted {
            self.params_accepts.iter_mut().for_each(|count| *count += 1);
            self.accept += 1;
        } else {
            self.model = old_model;
            self.prob = prob_old;
            self.params = old_values;
            self.params_rejects.iter_mut().for_each(|count| *count += 1);
            self.reject += 1;
        }
        StepOutcome {
            accepted,
            prob_old,
            prob_new,
        }
    }
}
