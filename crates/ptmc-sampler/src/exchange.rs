use ptmc_core::UniformSource;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::tempering::exchange_acceptance;

/// Result of a replica exchange attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    /// Lower (colder) slot of the attempted pair.
    pub lower: usize,
    /// Whether the states were swapped.
    pub accepted: bool,
    /// Metropolis acceptance probability of the swap.
    pub acceptance: f64,
}

/// Attempts to exchange the states of chains `lower` and `lower + 1`.
///
/// Both chains are borrowed mutably at once, so the swap is all-or-nothing.
/// On acceptance the parameters, model and probability change places and
/// both slots count a swap.
pub fn attempt_exchange<R, S>(chains: &mut [Chain<R>], lower: usize, rng: &mut S) -> ExchangeOutcome
where
    S: UniformSource + ?Sized,
{
    assert!(
        lower + 1 < chains.len(),
        "exchange pair {lower} out of range for {} chains",
        chains.len()
    );
    let (head, tail) = chains.split_at_mut(lower + 1);
    let colder = &mut head[lower];
    let hotter = &mut tail[0];

    let acceptance = exchange_acceptance(colder.beta(), colder.prob(), hotter.beta(), hotter.prob());
    let accepted = acceptance >= 1.0 || rng.next_uniform() < acceptance;
    if accepted {
        colder.swap_state(hotter);
        colder.inc_swapcount();
        hotter.inc_swapcount();
    }
    ExchangeOutcome {
        lower,
        accepted,
        acceptance,
    }
}
