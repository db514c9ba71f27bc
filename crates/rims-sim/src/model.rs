//! TransientModel trait for the simulated process.

/// A dynamic system `x_dot = f(t, x)` with a state that supports the vector
/// arithmetic the integrators need.
pub trait TransientModel {
    type State: Clone;

    fn initial_state(&self) -> Self::State;

    /// State derivative at time `t` (s).
    fn rhs(&self, t: f64, x: &Self::State) -> Self::State;

    /// `a + b`, element-wise.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// `scale * a`.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;
}
