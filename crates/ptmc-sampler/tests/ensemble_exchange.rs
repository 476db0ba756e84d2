use ptmc_core::{RngHandle, UniformSource};
use ptmc_sampler::{
    attempt_exchange, calc_beta_0, Chain, Ensemble, Ladder, ModelEvaluator, Observations,
    ParamChange, TemperingConfig,
};

struct FixedSource(f64);

impl UniformSource for FixedSource {
    fn next_uniform(&mut self) -> f64 {
        self.0
    }
}

/// Two separated Gaussian modes at -2 and +2.
#[derive(Debug, Clone, Copy)]
struct TwoModes;

impl ModelEvaluator for TwoModes {
    fn evaluate(
        &self,
        observations: &Observations,
        params: &[f64],
        model: &mut [f64],
        _change: ParamChange<'_>,
    ) -> f64 {
        for (slot, x) in model.iter_mut().zip(observations.x()) {
            *slot = params[0] * x;
        }
        let left = -2.0 * (params[0] + 2.0).powi(2);
        let right = -2.0 * (params[0] - 2.0).powi(2);
        left.max(right) + (1.0 + (-(left - right).abs()).exp()).ln()
    }
}

fn template(seed: u64) -> Chain<RngHandle> {
    let mut chain = Chain::with_seed(1, seed);
    chain.set_bounds(0, -10.0, 10.0).unwrap();
    chain.set_step(0, 0.5).unwrap();
    chain.set_param(0, -2.0).unwrap();
    chain.bind_data(Observations::new(vec![0.0, 1.0], vec![0.0, 0.0]).unwrap());
    chain.set_model(vec![0.0, 0.0], -1e10).unwrap();
    chain.refresh(&TwoModes);
    chain.check_best();
    chain
}

fn tempering(n_beta: usize) -> TemperingConfig {
    TemperingConfig {
        n_beta,
        beta_0: Some(0.25),
        ladder: Ladder::Equidistant,
        swap_interval: 50,
        ..TemperingConfig::default()
    }
}

fn pair(prob_cold: f64, prob_hot: f64) -> Vec<Chain<RngHandle>> {
    let mut cold = template(1);
    cold.set_param(0, -1.0).unwrap();
    cold.set_model(vec![1.0, 1.0], prob_cold).unwrap();
    cold.set_beta(1.0);
    let mut hot = template(2);
    hot.set_param(0, 3.0).unwrap();
    hot.set_model(vec![3.0, 3.0], prob_hot).unwrap();
    hot.set_beta(0.5);
    vec![cold, hot]
}

#[test]
fn favourable_exchange_swaps_full_state() {
    let mut chains = pair(-10.0, -1.0);
    let outcome = attempt_exchange(&mut chains, 0, &mut FixedSource(0.999));
    assert!(outcome.accepted);
    assert_eq!(outcome.acceptance, 1.0);

    assert_eq!(chains[0].prob(), -1.0);
    assert_eq!(chains[0].params(), &[3.0]);
    assert_eq!(chains[0].model(), &[3.0, 3.0]);
    assert_eq!(chains[1].prob(), -10.0);
    assert_eq!(chains[1].params(), &[-1.0]);

    assert_eq!(chains[0].beta(), 1.0);
    assert_eq!(chains[1].beta(), 0.5);
    assert_eq!(chains[0].swapcount(), 1);
    assert_eq!(chains[1].swapcount(), 1);
}

#[test]
fn unfavourable_exchange_leaves_states_alone() {
    let mut chains = pair(-1.0, -10.0);
    let outcome = attempt_exchange(&mut chains, 0, &mut FixedSource(0.5));
    assert!(!outcome.accepted);
    assert!((outcome.acceptance - (-4.5f64).exp()).abs() < 1e-15);
    assert_eq!(chains[0].prob(), -1.0);
    assert_eq!(chains[1].params(), &[3.0]);
    assert_eq!(chains[0].swapcount(), 0);
    assert_eq!(chains[1].swapcount(), 0);
}

#[test]
#[should_panic(expected = "out of range")]
fn exchange_requires_a_neighbour() {
    let mut chains = pair(-1.0, -1.0);
    attempt_exchange(&mut chains, 1, &mut FixedSource(0.5));
}

#[test]
fn ensemble_assigns_ladder_betas_and_scaled_steps() {
    let base = template(5);
    let ensemble = Ensemble::new(&base, TwoModes, &tempering(4), 99).unwrap();
    let expected = [1.0, 0.75, 0.5, 0.25];
    for ((chain, want), index) in ensemble.chains().iter().zip(expected).zip(0..) {
        assert!((chain.beta() - want).abs() < 1e-12);
        assert_eq!(chain.swapcount(), 0);
        let factor = Ladder::Equidistant.chain_stepwidth(index, 4, 0.25);
        assert!((chain.steps()[0] - 0.5 / factor).abs() < 1e-12);
    }
    assert_eq!(ensemble.cold_chain().steps()[0], 0.5);
    assert_eq!(ensemble.chains()[3].steps()[0], 2.0);
}

#[test]
fn ensemble_calibrates_beta_0_when_unset() {
    let base = template(5);
    let mut config = tempering(3);
    config.beta_0 = None;
    let ensemble = Ensemble::new(&base, TwoModes, &config, 1).unwrap();
    let expected = calc_beta_0(&base, None, config.beta_0_stepwidth).unwrap();
    assert_eq!(ensemble.beta_0(), expected);
    assert_eq!(ensemble.chains()[2].beta(), expected);
}

#[test]
fn unbound_template_is_rejected() {
    let mut chain = Chain::with_seed(1, 3);
    chain.set_step(0, 1.0).unwrap();
    let err = Ensemble::new(&chain, TwoModes, &tempering(2), 1).unwrap_err();
    assert_eq!(err.info().code, "unbound-data");
}

#[test]
fn advance_records_history_for_every_chain() {
    let base = template(8);
    let mut ensemble = Ensemble::new(&base, TwoModes, &tempering(3), 4).unwrap();
    ensemble.advance(25);
    for chain in ensemble.chains() {
        assert_eq!(chain.n_iter(), 25);
        assert_eq!(chain.accepts() + chain.rejects(), 25);
        assert!(chain.prob_best() >= chain.prob());
    }
}

#[test]
fn runs_with_same_seed_match() {
    let base = template(21);
    let mut first = Ensemble::new(&base, TwoModes, &tempering(4), 2024).unwrap();
    let mut second = Ensemble::new(&base, TwoModes, &tempering(4), 2024).unwrap();
    let summary_a = first.run(10);
    let summary_b = second.run(10);
    assert_eq!(summary_a, summary_b);
    assert_eq!(summary_a.rounds, 10);
    for (a, b) in first.chains().iter().zip(second.chains()) {
        assert_eq!(a.params(), b.params());
        assert_eq!(a.history(), b.history());
    }
}

#[test]
fn tempered_ensemble_reaches_the_far_mode() {
    let base = template(33);
    let mut ensemble = Ensemble::new(&base, TwoModes, &tempering(4), 7).unwrap();
    let summary = ensemble.run(100);

    assert!(summary.swapcounts.iter().any(|&count| count > 0), "{summary:?}");
    assert!(summary.exchange_acceptance.iter().all(|&rate| (0.0..=1.0).contains(&rate)));
    let visited_right = ensemble
        .cold_chain()
        .history()
        .iter()
        .any(|params| params[0] > 1.0);
    assert!(visited_right, "cold chain never left the starting mode");
}

#[test]
fn single_chain_ensemble_never_exchanges() {
    let base = template(2);
    let mut ensemble = Ensemble::new(&base, TwoModes, &tempering(1), 3).unwrap();
    assert_eq!(ensemble.betas(), vec![1.0]);
    assert_eq!(ensemble.exchange_round(), 0);
    let summary = ensemble.run(2);
    assert!(summary.exchange_acceptance.is_empty());
    assert_eq!(summary.swapcounts, vec![0]);
}
