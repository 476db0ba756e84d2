use crate::chain::Observations;

/// Describes which parameters changed since the model was last evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange<'a> {
    /// A single parameter moved away from `previous`.
    One {
        /// Index of the changed parameter.
        index: usize,
        /// Value before the proposal.
        previous: f64,
    },
    /// Every parameter may have changed; `previous` holds the former vector.
    All {
        /// Parameter vector before the proposal.
        previous: &'a [f64],
    },
}

/// Domain model turning a parameter vector into a model curve and a
/// log-probability.
///
/// Implementations must be total: every call returns a finite
/// log-probability. The returned value is untempered; chains apply their own
/// inverse temperature during acceptance.
pub trait ModelEvaluator {
    /// Recomputes `model` in place for `params` and returns the log-probability.
    fn evaluate(
        &self,
        observations: &Observations,
        params: &[f64],
        model: &mut [f64],
        change: ParamChange<'_>,
    ) -> f64;
}

impl<F> ModelEvaluator for F
where
    F: Fn(&Observations, &[f64], &mut [f64]) -> f64,
{
    fn evaluate(
        &self,
        observations: &Observations,
        params: &[f64],
        model: &mut [f64],
        _change: ParamChange<'_>,
    ) -> f64 {
        self(observations, params, model)
    }
}
