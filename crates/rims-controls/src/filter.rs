//! Discrete first-order (exponential) smoothing.
//!
//! `y[n] = (1 - a) * x[n] + a * y[n-1]` with `a = exp(-Ts / tau)`.
//! The regulator uses two of these: one ramps the set point, the other
//! smooths the PID output (and with it the derivative term).

use rims_core::lag_factor;

/// First-order lag sampled at a fixed period.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialFilter {
    alpha: f64,
    state: Option<f64>,
}

impl ExponentialFilter {
    /// Build a filter for sample period `ts_s` and time constant `tau_s`.
    ///
    /// `tau_s <= 0` (or non-finite) gives a pass-through filter.
    pub fn new(ts_s: f64, tau_s: f64) -> Self {
        Self {
            alpha: lag_factor(ts_s, tau_s),
            state: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Feed one sample and return the filtered value.
    ///
    /// An unseeded filter starts from its first input.
    pub fn apply(&mut self, input: f64) -> f64 {
        let out = match self.state {
            Some(prev) => (1.0 - self.alpha) * input + self.alpha * prev,
            None => input,
        };
        self.state = Some(out);
        out
    }

    /// Force the filter state, e.g. on a mode change.
    pub fn seed(&mut self, value: f64) {
        self.state = Some(value);
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn value(&self) -> Option<f64> {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tau_passes_through() {
        let mut f = ExponentialFilter::new(1.0, 0.0);
        assert_eq!(f.alpha(), 0.0);
        f.seed(10.0);
        assert_eq!(f.apply(3.0), 3.0);
        assert_eq!(f.apply(-7.5), -7.5);
    }

    #[test]
    fn negative_tau_is_identity() {
        let mut f = ExponentialFilter::new(1.0, -3.0);
        f.seed(50.0);
        assert_eq!(f.apply(1.0), 1.0);
    }

    #[test]
    fn step_response_follows_first_order_lag() {
        let ts = 1.0;
        let tau = 10.0;
        let mut f = ExponentialFilter::new(ts, tau);
        f.seed(0.0);

        let mut y = 0.0;
        for _ in 0..10 {
            y = f.apply(1.0);
        }
        // After one time constant a first-order lag reaches 1 - e^-1.
        let expected = 1.0 - (-1.0_f64).exp();
        assert!((y - expected).abs() < 1e-12);
    }

    #[test]
    fn unseeded_filter_starts_at_first_input() {
        let mut f = ExponentialFilter::new(1.0, 5.0);
        assert_eq!(f.value(), None);
        assert_eq!(f.apply(42.0), 42.0);
        assert_eq!(f.value(), Some(42.0));
        f.reset();
        assert_eq!(f.value(), None);
    }
}
