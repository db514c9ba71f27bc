//! Lumped thermal model of the mash and its recirculation loop.
//!
//! ```text
//! C dT/dt = u * P_heater - G * (T - T_ambient)
//! ```
//!
//! `u` is the instantaneous heater state (0 or 1): the SSR window is
//! resolved by the caller's time step, not averaged here.

use crate::error::{SimError, SimResult};
use crate::integrator::{Integrator, RK4};
use crate::model::TransientModel;
use serde::{Deserialize, Serialize};

/// Specific heat of water per litre (J/(L·K)).
pub const WATER_J_PER_L_K: f64 = 4_186.0;

fn default_heater_w() -> f64 {
    2_000.0
}
fn default_volume_l() -> f64 {
    20.0
}
fn default_loss_w_per_k() -> f64 {
    6.0
}
fn default_ambient_c() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantParams {
    /// Heater element power (W).
    #[serde(default = "default_heater_w")]
    pub heater_w: f64,
    /// Liquid volume, treated as water (L).
    #[serde(default = "default_volume_l")]
    pub volume_l: f64,
    /// Heat loss to ambient (W/K).
    #[serde(default = "default_loss_w_per_k")]
    pub loss_w_per_k: f64,
    #[serde(default = "default_ambient_c")]
    pub ambient_c: f64,
    /// Liquid temperature at t = 0 (°C).
    #[serde(default = "default_ambient_c")]
    pub initial_c: f64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            heater_w: default_heater_w(),
            volume_l: default_volume_l(),
            loss_w_per_k: default_loss_w_per_k(),
            ambient_c: default_ambient_c(),
            initial_c: default_ambient_c(),
        }
    }
}

impl PlantParams {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.heater_w.is_finite() && self.heater_w >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "heater power must be non-negative",
            });
        }
        if !(self.volume_l.is_finite() && self.volume_l > 0.0) {
            return Err(SimError::InvalidArg {
                what: "volume must be positive",
            });
        }
        if !(self.loss_w_per_k.is_finite() && self.loss_w_per_k >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "heat loss must be non-negative",
            });
        }
        if !(self.ambient_c.is_finite() && self.initial_c.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "temperatures must be finite",
            });
        }
        Ok(())
    }

    /// Heat capacity of the liquid (J/K).
    pub fn heat_capacity_j_per_k(&self) -> f64 {
        self.volume_l * WATER_J_PER_L_K
    }

    /// Equilibrium temperature at a constant average duty fraction.
    pub fn steady_state_c(&self, duty_fraction: f64) -> Option<f64> {
        (self.loss_w_per_k > 0.0)
            .then(|| self.ambient_c + duty_fraction * self.heater_w / self.loss_w_per_k)
    }
}

/// Simulated vessel.
#[derive(Debug, Clone)]
pub struct MashPlant {
    params: PlantParams,
    heater_fraction: f64,
    temperature_c: f64,
    time_s: f64,
}

impl MashPlant {
    pub fn new(params: PlantParams) -> SimResult<Self> {
        params.validate()?;
        Ok(Self {
            temperature_c: params.initial_c,
            params,
            heater_fraction: 0.0,
            time_s: 0.0,
        })
    }

    /// Advance by `dt_s` with the heater held on or off for the whole step.
    pub fn step(&mut self, dt_s: f64, heater_on: bool) {
        self.heater_fraction = if heater_on { 1.0 } else { 0.0 };
        let next = RK4.step(&*self, self.time_s, &self.temperature_c, dt_s);
        self.temperature_c = next;
        self.time_s += dt_s;
    }

    /// Instant temperature change, e.g. cold grain added or the lid opened.
    pub fn disturb(&mut self, delta_c: f64) {
        self.temperature_c += delta_c;
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }

    pub fn params(&self) -> &PlantParams {
        &self.params
    }
}

impl TransientModel for MashPlant {
    type State = f64;

    fn initial_state(&self) -> f64 {
        self.params.initial_c
    }

    fn rhs(&self, _t: f64, x: &f64) -> f64 {
        let heat_w = self.heater_fraction * self.params.heater_w;
        let loss_w = self.params.loss_w_per_k * (x - self.params.ambient_c);
        (heat_w - loss_w) / self.params.heat_capacity_j_per_k()
    }

    fn add(&self, a: &f64, b: &f64) -> f64 {
        a + b
    }

    fn scale(&self, a: &f64, scale: f64) -> f64 {
        a * scale
    }
}
