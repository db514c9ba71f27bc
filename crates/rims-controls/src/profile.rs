//! Tuning profiles.
//!
//! A profile is a named set of PID gains and filter time constants. A small
//! number of them may be registered (e.g. one per batch volume); the operator
//! picks one when a session starts and it stays fixed until the session ends.

use crate::error::{ControlError, ControlResult};
use rims_core::ensure_finite;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum number of profiles a [`ProfileSet`] accepts.
pub const MAX_PROFILES: usize = 4;

/// PID gains and filter constants for one regulation setup.
///
/// Gains are in duty-milliseconds: `kp` per °C, `ki` per °C·s, `kd` per °C/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningProfile {
    /// Label shown to the operator.
    pub name: String,
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (1/s).
    pub ki: f64,
    /// Derivative gain (s).
    pub kd: f64,
    /// Derivative/output filter time constant (s). `<= 0` disables it.
    #[serde(default)]
    pub tau_d_s: f64,
    /// Set-point filter time constant (s). `<= 0` disables it.
    #[serde(default)]
    pub tau_sp_s: f64,
    /// Optional selection key, e.g. batch volume in litres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<f64>,
}

impl TuningProfile {
    /// Create a profile without filtering.
    pub fn new(name: impl Into<String>, kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            name: name.into(),
            kp,
            ki,
            kd,
            tau_d_s: 0.0,
            tau_sp_s: 0.0,
            selector: None,
        }
    }

    pub fn with_filters(mut self, tau_d_s: f64, tau_sp_s: f64) -> Self {
        self.tau_d_s = tau_d_s;
        self.tau_sp_s = tau_sp_s;
        self
    }

    pub fn with_selector(mut self, selector: f64) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Set-point time constant that cancels overshoot on an integrating
    /// plant: `tau_sp = kp / ki`.
    pub fn overshoot_cancelling_tau_sp(&self) -> Option<f64> {
        (self.ki > 0.0).then(|| self.kp / self.ki)
    }

    /// Check that gains are finite and non-negative.
    ///
    /// Filter constants are not checked: bad ones mean "no filtering".
    pub fn validate(&self) -> ControlResult<()> {
        for (value, what) in [(self.kp, "kp"), (self.ki, "ki"), (self.kd, "kd")] {
            ensure_finite(value, what)?;
            if value < 0.0 {
                return Err(ControlError::InvalidArg {
                    what: "gains must be non-negative",
                });
            }
        }
        Ok(())
    }
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self::new("default", 2_500.0, 4.0, 0.0).with_filters(10.0, 625.0)
    }
}

/// Bounded registry of tuning profiles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet {
    profiles: Vec<TuningProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ProfileLimit`] once [`MAX_PROFILES`] are
    /// registered, or the profile's validation error.
    pub fn add(&mut self, profile: TuningProfile) -> ControlResult<usize> {
        if self.profiles.len() >= MAX_PROFILES {
            return Err(ControlError::ProfileLimit { max: MAX_PROFILES });
        }
        profile.validate()?;
        self.profiles.push(profile);
        Ok(self.profiles.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TuningProfile> {
        self.profiles.get(index)
    }

    pub fn as_slice(&self) -> &[TuningProfile] {
        &self.profiles
    }

    pub fn iter(&self) -> impl Iterator<Item = &TuningProfile> {
        self.profiles.iter()
    }

    /// Whether the operator has to be asked which profile to use.
    pub fn needs_selection(&self) -> bool {
        self.profiles.len() > 1
    }

    /// Resolve an operator selection.
    ///
    /// Out-of-range indices fall back to the first profile; an empty set
    /// yields the built-in default profile.
    pub fn select(&self, index: usize) -> (usize, TuningProfile) {
        match self.profiles.get(index) {
            Some(profile) => (index, profile.clone()),
            None => {
                if !self.profiles.is_empty() {
                    warn!(index, count = self.profiles.len(), "invalid profile selection, using profile 0");
                }
                (0, self.profiles.first().cloned().unwrap_or_default())
            }
        }
    }

    /// Index of the profile whose selector key is closest to `key`.
    pub fn closest_to(&self, key: f64) -> Option<usize> {
        self.profiles
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.selector.map(|s| (i, (s - key).abs())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}
