//! Filtered PID controller.
//!
//! Parallel-form PID sampled at a fixed period, with:
//! - set-point filtering (first-order ramp toward the operator's set point)
//! - derivative on measurement (no derivative kick on set-point changes)
//! - conditional-integration anti-windup
//! - first-order output filter, which also smooths the derivative term
//! - output clamping to `[out_min, out_max]`
//!
//! The output is a duty value in SSR window units (milliseconds).

use crate::error::{ControlError, ControlResult};
use crate::filter::ExponentialFilter;
use crate::profile::TuningProfile;
use crate::sampled::{SampleClock, SampleConfig};
use serde::{Deserialize, Serialize};

/// Controller mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Output forced to zero, no integration.
    Manual,
    /// Closed loop.
    Automatic,
}

/// Integrator handling when the output saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AntiWindup {
    /// Freeze the integrator only when the error drives the output further
    /// into the bound it already exceeds.
    #[default]
    Conditional,
    /// Always integrate; only the output is clamped.
    None,
}

/// Sampled PID controller with set-point and output filters.
#[derive(Debug, Clone)]
pub struct FilteredPid {
    profile: TuningProfile,
    clock: SampleClock,
    out_min: f64,
    out_max: f64,
    anti_windup: AntiWindup,
    mode: Mode,
    integral: f64,
    last_input: Option<f64>,
    sp_filter: ExponentialFilter,
    out_filter: ExponentialFilter,
    output: f64,
}

impl FilteredPid {
    /// Create a controller in [`Mode::Manual`].
    ///
    /// # Arguments
    ///
    /// * `profile` - Gains and filter constants
    /// * `sample` - Sample period
    /// * `out_min` - Minimum output
    /// * `out_max` - Maximum output (the SSR window size)
    /// * `now_ms` - Current time; the first sample is due one period later
    pub fn new(
        profile: TuningProfile,
        sample: SampleConfig,
        out_min: f64,
        out_max: f64,
        now_ms: u64,
    ) -> ControlResult<Self> {
        profile.validate()?;
        if out_min >= out_max {
            return Err(ControlError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        let ts = sample.period_s();
        Ok(Self {
            sp_filter: ExponentialFilter::new(ts, profile.tau_sp_s),
            out_filter: ExponentialFilter::new(ts, profile.tau_d_s),
            profile,
            clock: SampleClock::new(sample, now_ms),
            out_min,
            out_max,
            anti_windup: AntiWindup::default(),
            mode: Mode::Manual,
            integral: 0.0,
            last_input: None,
            output: 0.0,
        })
    }

    pub fn with_anti_windup(mut self, anti_windup: AntiWindup) -> Self {
        self.anti_windup = anti_windup;
        self
    }

    /// Swap the tuning profile between sessions.
    ///
    /// Both filters are rebuilt for the new time constants; call
    /// [`start`](Self::start) before the next sample.
    pub fn set_profile(&mut self, profile: TuningProfile) -> ControlResult<()> {
        profile.validate()?;
        let ts = self.clock.config.period_s();
        self.sp_filter = ExponentialFilter::new(ts, profile.tau_sp_s);
        self.out_filter = ExponentialFilter::new(ts, profile.tau_d_s);
        self.profile = profile;
        Ok(())
    }

    /// Prepare a new session: restart the sample clock, clear the integrator
    /// and start the set-point ramp from the current process value.
    pub fn start(&mut self, now_ms: u64, process_value: f64) {
        self.clock.reset(now_ms);
        self.integral = 0.0;
        self.last_input = Some(process_value);
        self.sp_filter.seed(process_value);
        self.out_filter.seed(0.0);
        self.output = 0.0;
    }

    /// Switch mode.
    ///
    /// Entering Manual zeroes the output at once. Entering Automatic from
    /// Manual re-seeds the integrator, the derivative memory and the output
    /// filter so the first closed-loop sample has no bump.
    pub fn set_mode(&mut self, mode: Mode, process_value: f64) {
        match mode {
            Mode::Manual => {
                self.output = 0.0;
                self.out_filter.seed(0.0);
            }
            Mode::Automatic if self.mode == Mode::Manual => {
                self.integral = self.output.clamp(self.out_min, self.out_max);
                self.last_input = Some(process_value);
                self.out_filter.seed(self.output);
            }
            Mode::Automatic => {}
        }
        self.mode = mode;
    }

    /// Run one controller sample if one is due.
    ///
    /// The set-point filter and the PID law run in the same sample, in that
    /// order. Returns `true` when a new output was produced.
    pub fn compute(&mut self, now_ms: u64, set_point: f64, process_value: f64) -> bool {
        if self.mode == Mode::Manual || !self.clock.should_sample(now_ms) {
            return false;
        }
        self.clock.advance_past(now_ms);

        let ts = self.clock.config.period_s();
        let sp = self.sp_filter.apply(set_point);
        let error = sp - process_value;

        let p_term = self.profile.kp * error;

        let d_input = match self.last_input {
            Some(last) => (process_value - last) / ts,
            None => 0.0,
        };
        let d_term = -self.profile.kd * d_input;

        let candidate = self.integral + self.profile.ki * error * ts;
        let unclamped = p_term + candidate + d_term;
        let worsens_saturation =
            (unclamped > self.out_max && error > 0.0) || (unclamped < self.out_min && error < 0.0);
        let freeze = self.anti_windup == AntiWindup::Conditional && worsens_saturation;
        if !freeze {
            self.integral = candidate;
        }

        let raw = (p_term + self.integral + d_term).clamp(self.out_min, self.out_max);
        self.output = self
            .out_filter
            .apply(raw)
            .clamp(self.out_min, self.out_max);
        self.last_input = Some(process_value);
        true
    }

    /// Latest (filtered, clamped) output.
    pub fn output(&self) -> f64 {
        self.output
    }

    /// Latest filtered set point, if the filter has been seeded.
    pub fn filtered_set_point(&self) -> Option<f64> {
        self.sp_filter.value()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn profile(&self) -> &TuningProfile {
        &self.profile
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.out_min, self.out_max)
    }

    pub fn sample_config(&self) -> SampleConfig {
        self.clock.config
    }
}
