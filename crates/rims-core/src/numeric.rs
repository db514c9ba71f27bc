//! Float helpers shared by the filters and the profile validation.

use crate::RimsError;

/// Floating point type used throughout the regulator.
pub type Real = f64;

/// Reject NaN and infinities, naming the offending quantity.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, RimsError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RimsError::NonFinite { what, value: v })
    }
}

/// Smoothing factor of a discrete first-order lag: `exp(-ts / tau)`.
///
/// A non-positive or non-finite `tau` means "no filtering" and yields 0,
/// which turns `(1 - a) * x + a * prev` into the identity.
pub fn lag_factor(ts_s: Real, tau_s: Real) -> Real {
    if tau_s > 0.0 && tau_s.is_finite() && ts_s >= 0.0 {
        (-ts_s / tau_s).exp()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_rejects_nan_and_infinity() {
        assert_eq!(ensure_finite(68.0, "set point"), Ok(68.0));
        assert!(matches!(
            ensure_finite(Real::NAN, "kp"),
            Err(RimsError::NonFinite { what: "kp", .. })
        ));
        assert!(ensure_finite(Real::NEG_INFINITY, "ki").is_err());
    }

    #[test]
    fn lag_factor_disabled_for_bad_tau() {
        assert_eq!(lag_factor(1.0, 0.0), 0.0);
        assert_eq!(lag_factor(1.0, -5.0), 0.0);
        assert_eq!(lag_factor(1.0, Real::NAN), 0.0);
        assert_eq!(lag_factor(1.0, Real::INFINITY), 0.0);
    }

    #[test]
    fn lag_factor_matches_exponential() {
        let a = lag_factor(1.0, 10.0);
        assert!((a - (-0.1_f64).exp()).abs() < 1e-15);
        assert!(a > 0.0 && a < 1.0);
    }
}
