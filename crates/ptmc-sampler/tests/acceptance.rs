use ptmc_core::{RngHandle, UniformSource};
use ptmc_sampler::{accept, Chain, ModelEvaluator, Observations, ParamChange};

struct FixedSource(f64);

impl UniformSource for FixedSource {
    fn next_uniform(&mut self) -> f64 {
        self.0
    }
}

struct NoDraws;

impl UniformSource for NoDraws {
    fn next_uniform(&mut self) -> f64 {
        panic!("acceptance consumed a draw");
    }
}

/// Writes a recognisable model and reports a fixed log-probability.
struct Constant(f64);

impl ModelEvaluator for Constant {
    fn evaluate(
        &self,
        _observations: &Observations,
        _params: &[f64],
        model: &mut [f64],
        _change: ParamChange<'_>,
    ) -> f64 {
        model.iter_mut().for_each(|slot| *slot = 9.0);
        self.0
    }
}

fn gaussian(observations: &Observations, params: &[f64], model: &mut [f64]) -> f64 {
    for (slot, x) in model.iter_mut().zip(observations.x()) {
        *slot = params[0] * x;
    }
    params.iter().map(|p| -0.5 * p * p).sum()
}

fn bound_chain<R>(rng: R, n_par: usize) -> Chain<R> {
    let mut chain = Chain::with_source(n_par, rng);
    for index in 0..n_par {
        chain.set_bounds(index, -10.0, 10.0).unwrap();
        chain.set_step(index, 1.0).unwrap();
    }
    chain.bind_data(Observations::new(vec![1.0, 2.0, 3.0], vec![0.0; 3]).unwrap());
    chain.set_model(vec![1.0, 2.0, 3.0], -1.0).unwrap();
    chain
}

#[test]
fn improvements_and_ties_accept_without_drawing() {
    let mut rng = NoDraws;
    assert!(accept(&mut rng, -3.0, -3.0));
    assert!(accept(&mut rng, -3.0, -2.5));
    assert!(accept(&mut rng, -1e10, 0.0));
}

#[test]
fn worsening_is_accepted_at_exp_delta_frequency() {
    let mut rng = RngHandle::from_seed(0xACCE_97ED);
    let trials = 100_000;
    let accepted = (0..trials).filter(|_| accept(&mut rng, 0.0, -1.0)).count();
    let frequency = accepted as f64 / trials as f64;
    let expected = (-1.0f64).exp();
    assert!(
        (frequency - expected).abs() < 0.01,
        "frequency {frequency} too far from {expected}"
    );
}

#[test]
fn rejected_step_restores_model_and_prob_bit_for_bit() {
    let mut chain = bound_chain(FixedSource(0.9), 2);
    chain.set_params(&[0.5, -0.25]).unwrap();
    let model_before = chain.model().to_vec();
    let prob_before = chain.prob();

    let outcome = chain.step_one(&Constant(-100.0), 1);
    assert!(!outcome.accepted);
    assert_eq!(outcome.prob_new, -100.0);
    assert_eq!(chain.prob().to_bits(), prob_before.to_bits());
    let restored: Vec<u64> = chain.model().iter().map(|v| v.to_bits()).collect();
    let expected: Vec<u64> = model_before.iter().map(|v| v.to_bits()).collect();
    assert_eq!(restored, expected);
    assert_eq!(chain.params(), &[0.5, -0.25]);
    assert_eq!(chain.params_rejects(), &[0, 1]);
    assert_eq!(chain.rejects(), 1);

    let outcome = chain.step_all(&Constant(-100.0));
    assert!(!outcome.accepted);
    assert_eq!(chain.params(), &[0.5, -0.25]);
    assert_eq!(chain.model(), model_before.as_slice());
    assert_eq!(chain.params_rejects(), &[1, 2]);
}

#[test]
fn accepted_step_keeps_new_model() {
    let mut chain = bound_chain(FixedSource(0.9), 1);
    let outcome = chain.step_all(&Constant(0.0));
    assert!(outcome.accepted);
    assert_eq!(chain.prob(), 0.0);
    assert_eq!(chain.model(), &[9.0, 9.0, 9.0]);
    assert!((chain.params()[0] - 0.8).abs() < 1e-12);
    assert_eq!(chain.params_accepts(), &[1]);
    assert_eq!(chain.accepts(), 1);
    assert_eq!(chain.accept_rate(), 1.0);
}

#[test]
fn tempering_softens_the_metropolis_test() {
    // ln(0.5) is about -0.69: below a tempered delta of -0.5, above -1.
    let mut cold = bound_chain(FixedSource(0.5), 1);
    cold.set_model(vec![0.0; 3], 0.0).unwrap();
    assert!(!cold.step_all(&Constant(-1.0)).accepted);

    let mut hot = bound_chain(FixedSource(0.5), 1);
    hot.set_model(vec![0.0; 3], 0.0).unwrap();
    hot.set_beta(0.5);
    assert!(hot.step_all(&Constant(-1.0)).accepted);
    assert_eq!(hot.prob(), -1.0);
}

#[test]
fn best_probability_never_decreases() {
    let mut chain = bound_chain(RngHandle::from_seed(17), 2);
    chain.set_params(&[6.0, -7.0]).unwrap();
    chain.refresh(&gaussian);
    let mut last_best = chain.prob_best();
    for _ in 0..2_000 {
        chain.step_all(&gaussian);
        chain.check_best();
        assert!(chain.prob_best() >= last_best);
        assert!(chain.prob_best() >= chain.prob());
        last_best = chain.prob_best();
    }
    assert!(chain.prob_best() > -1.0);
}

#[test]
fn history_records_every_appended_iteration() {
    let mut chain = bound_chain(RngHandle::from_seed(3), 1);
    chain.prepare_iteration(10);
    for _ in 0..10 {
        chain.step_all(&gaussian);
        chain.append_current_parameters();
    }
    assert_eq!(chain.n_iter(), 10);
    assert_eq!(chain.history().last().unwrap(), &chain.params().to_vec());
}

#[test]
#[should_panic(expected = "chain precondition violated")]
fn stepping_without_data_aborts() {
    let mut chain = Chain::with_seed(1, 5);
    chain.set_step(0, 1.0).unwrap();
    chain.step_all(&gaussian);
}

#[test]
#[should_panic(expected = "chain precondition violated")]
fn stepping_with_zero_step_aborts() {
    let mut chain = bound_chain(RngHandle::from_seed(5), 2);
    chain.scale_steps(0.0);
    chain.step_one(&gaussian, 0);
}

#[test]
fn parameter_names_label_validation_errors() {
    let mut chain = bound_chain(RngHandle::from_seed(6), 2);
    assert_eq!(chain.param_names(), &["param0".to_string(), "param1".to_string()]);
    chain.set_param_name(1, "slope").unwrap();
    assert_eq!(chain.param_names()[1], "slope");
    assert_eq!(chain.set_param_name(2, "extra").unwrap_err().info().code, "param-index");

    chain.set_param_name(0, "offset").unwrap();
    chain.scale_steps(0.0);
    let err = chain.validate().unwrap_err();
    assert_eq!(err.info().code, "param-step");
    assert_eq!(err.info().context["name"], "offset");
}
