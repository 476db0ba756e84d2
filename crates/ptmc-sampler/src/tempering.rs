use std::f64::consts::PI;

use ptmc_core::errors::ErrorInfo;
use ptmc_core::McmcError;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;

/// Inverse-temperature ladders, each paired with a step-width scaling.
///
/// Schedules are indexed from the hottest slot (`i = 0`, beta = `beta_0`) to
/// the coldest (`i = n_beta - 1`, beta = 1). Use [`Ladder::chain_beta`] for
/// chain indices, where chain 0 is the untempered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ladder {
    /// Beta linear in the slot index.
    Equidistant,
    /// Temperature linear in the slot index.
    EquidistantTemperature,
    /// Beta spaced on a cosine map, denser towards beta = 1.
    #[default]
    Chebyshev,
    /// Temperature spaced on a cosine map.
    ChebyshevTemperature,
    /// Every chain except the cold one runs at `beta_0`.
    HotChains,
}

/// Position of slot `i` along the ladder in `[0, 1]`.
fn linear_fraction(i: usize, n_beta: usize) -> f64 {
    if n_beta <= 1 {
        return 1.0;
    }
    i as f64 / (n_beta - 1) as f64
}

fn cosine_fraction(i: usize, n_beta: usize) -> f64 {
    if n_beta <= 1 {
        return 1.0;
    }
    (1.0 - (i as f64 * PI / (n_beta - 1) as f64).cos()) / 2.0
}

fn beta_between(beta_0: f64, t: f64) -> f64 {
    (1.0 - t) * beta_0 + t
}

fn beta_from_temperature(beta_0: f64, t: f64) -> f64 {
    1.0 / ((1.0 - t) / beta_0 + t)
}

impl Ladder {
    /// Inverse temperature of ladder slot `i` out of `n_beta`.
    pub fn beta(self, i: usize, n_beta: usize, beta_0: f64) -> f64 {
        match self {
            Ladder::Equidistant => beta_between(beta_0, linear_fraction(i, n_beta)),
            Ladder::EquidistantTemperature => {
                beta_from_temperature(beta_0, linear_fraction(i, n_beta))
            }
            Ladder::Chebyshev => beta_between(beta_0, cosine_fraction(i, n_beta)),
            Ladder::ChebyshevTemperature => {
                beta_from_temperature(beta_0, cosine_fraction(i, n_beta))
            }
            Ladder::HotChains => {
                if i + 1 >= n_beta {
                    1.0
                } else {
                    beta_0
                }
            }
        }
    }

    /// Step-width scaling factor of ladder slot `i`; 1 at the cold end.
    pub fn stepwidth(self, i: usize, n_beta: usize, beta_0: f64) -> f64 {
        if n_beta <= 1 {
            return 1.0;
        }
        match self {
            Ladder::Equidistant | Ladder::EquidistantTemperature => {
                beta_0 + linear_fraction(i, n_beta).powi(2) * (1.0 - beta_0)
            }
            Ladder::Chebyshev | Ladder::ChebyshevTemperature => {
                beta_0 + (1.0 - beta_0) * cosine_fraction(i, n_beta).powi(2)
            }
            Ladder::HotChains => {
                if i + 1 >= n_beta {
                    1.0
                } else {
                    beta_0
                }
            }
        }
    }

    /// Inverse temperature of chain `chain`; chain 0 always gets 1.0.
    pub fn chain_beta(self, chain: usize, n_beta: usize, beta_0: f64) -> f64 {
        if n_beta <= 1 {
            return 1.0;
        }
        self.beta(n_beta - 1 - chain, n_beta, beta_0)
    }

    /// Step-width scaling factor of chain `chain`; chain 0 always gets 1.0.
    pub fn chain_stepwidth(self, chain: usize, n_beta: usize, beta_0: f64) -> f64 {
        if n_beta <= 1 {
            return 1.0;
        }
        self.stepwidth(n_beta - 1 - chain, n_beta, beta_0)
    }

    /// Betas of every chain, cold first.
    pub fn betas(self, n_beta: usize, beta_0: f64) -> Vec<f64> {
        (0..n_beta)
            .map(|chain| self.chain_beta(chain, n_beta, beta_0))
            .collect()
    }
}

/// Lowest inverse temperature at which the hottest chain can still traverse
/// `fraction` of every parameter's range.
///
/// Computed as `(max_p range_p * fraction / step_p / factor_p)^(-1/2)`, using
/// the least favourable parameter. Results above 1 are clamped to 1.
pub fn calc_beta_0<R>(
    chain: &Chain<R>,
    stepwidth_factors: Option<&[f64]>,
    fraction: f64,
) -> Result<f64, McmcError> {
    let n_par = chain.n_par();
    if let Some(factors) = stepwidth_factors {
        if factors.len() != n_par {
            return Err(McmcError::Tempering(
                ErrorInfo::new("stepwidth-factors", "one factor per parameter is required")
                    .with_context("factors", factors.len().to_string())
                    .with_context("n_par", n_par.to_string()),
            ));
        }
    }
    let mut worst = f64::NEG_INFINITY;
    for index in 0..n_par {
        let range = chain.params_max()[index] - chain.params_min()[index];
        let factor = stepwidth_factors.map_or(1.0, |factors| factors[index]);
        let ratio = range * fraction / chain.steps()[index] / factor;
        worst = worst.max(ratio);
    }
    let beta_0 = worst.powf(-0.5);
    if !(beta_0.is_finite() && beta_0 > 0.0) {
        return Err(McmcError::Tempering(
            ErrorInfo::new("beta0-degenerate", "could not derive beta_0 from ranges and steps")
                .with_context("max_ratio", worst.to_string())
                .with_hint("check that bounds span a positive range and steps are set"),
        ));
    }
    if beta_0 > 1.0 {
        log::warn!("calibrated beta_0 {beta_0} exceeds 1; clamping");
        return Ok(1.0);
    }
    Ok(beta_0)
}

/// Metropolis acceptance probability for exchanging the states of two chains.
///
/// `min(1, exp((beta_a - beta_b) * (prob_b - prob_a)))` with untempered
/// log-probabilities.
pub fn exchange_acceptance(beta_a: f64, prob_a: f64, beta_b: f64, prob_b: f64) -> f64 {
    ((beta_a - beta_b) * (prob_b - prob_a)).exp().min(1.0)
}
