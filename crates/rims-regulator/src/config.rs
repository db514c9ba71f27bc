//! Regulator configuration file format and validation.

use crate::error::RegulatorResult;
use crate::ident::IdentSchedule;
use rims_controls::{MAX_PROFILES, ProfileSet, SampleConfig, TuningProfile};
use rims_io::{FlowConfig, ThermistorCalibration};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Too many tuning profiles: {count} (max {max})")]
    TooManyProfiles { count: usize, max: usize },

    #[error("Invalid profile '{name}': {source}")]
    Profile {
        name: String,
        source: rims_controls::ControlError,
    },

    #[error("Invalid thermistor calibration: {0}")]
    Calibration(#[from] rims_io::IoError),
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn default_window_ms() -> u64 {
    5_000
}
fn default_sample_period_ms() -> u64 {
    1_000
}
fn default_tolerance_c() -> f64 {
    1.0
}
fn default_set_point_c() -> f64 {
    68.0
}
fn default_duration_s() -> u32 {
    3_600
}
fn default_min_set_point_c() -> f64 {
    0.0
}
fn default_max_set_point_c() -> f64 {
    99.9
}
fn default_max_duration_s() -> u32 {
    59_999
}
fn default_blink_period_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_profiles() -> ProfileSet {
    let mut profiles = ProfileSet::new();
    // The built-in profile always validates.
    let _ = profiles.add(TuningProfile::default());
    profiles
}

/// Everything the regulator needs besides hardware handles.
///
/// Every field has a default, so an empty YAML document is a valid
/// configuration for the common 10 kΩ NTC / 450 pulse-per-litre setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorConfig {
    /// SSR time-proportioning window (ms). Also the PID output ceiling.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// PID sample period (ms).
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,
    /// Band around the set point in which the session timer runs (°C).
    #[serde(default = "default_tolerance_c")]
    pub tolerance_c: f64,
    /// Pause the session timer while out of tolerance.
    #[serde(default = "default_true")]
    pub verify_temperature: bool,
    /// Switch the heater off on critical flow.
    #[serde(default = "default_true")]
    pub flow_interlock: bool,
    /// Level of the power-sense input while heater power is present.
    #[serde(default = "default_true")]
    pub power_present_high: bool,
    #[serde(default = "default_set_point_c")]
    pub default_set_point_c: f64,
    #[serde(default = "default_duration_s")]
    pub default_duration_s: u32,
    #[serde(default = "default_min_set_point_c")]
    pub min_set_point_c: f64,
    #[serde(default = "default_max_set_point_c")]
    pub max_set_point_c: f64,
    #[serde(default = "default_max_duration_s")]
    pub max_duration_s: u32,
    /// Half-period of the end-of-session alarm and indicator blink (ms).
    #[serde(default = "default_blink_period_ms")]
    pub blink_period_ms: u64,
    #[serde(default)]
    pub thermistor: ThermistorCalibration,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default = "default_profiles")]
    pub profiles: ProfileSet,
    #[serde(default)]
    pub ident: IdentSchedule,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            sample_period_ms: default_sample_period_ms(),
            tolerance_c: default_tolerance_c(),
            verify_temperature: true,
            flow_interlock: true,
            power_present_high: true,
            default_set_point_c: default_set_point_c(),
            default_duration_s: default_duration_s(),
            min_set_point_c: default_min_set_point_c(),
            max_set_point_c: default_max_set_point_c(),
            max_duration_s: default_max_duration_s(),
            blink_period_ms: default_blink_period_ms(),
            thermistor: ThermistorCalibration::default(),
            flow: FlowConfig::default(),
            profiles: default_profiles(),
            ident: IdentSchedule::default(),
        }
    }
}

impl RegulatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window_ms == 0 {
            return Err(invalid("window_ms", self.window_ms, "must be positive"));
        }
        if self.sample_period_ms == 0 {
            return Err(invalid(
                "sample_period_ms",
                self.sample_period_ms,
                "must be positive",
            ));
        }
        if !(self.tolerance_c.is_finite() && self.tolerance_c >= 0.0) {
            return Err(invalid(
                "tolerance_c",
                self.tolerance_c,
                "must be finite and non-negative",
            ));
        }
        if !(self.min_set_point_c.is_finite()
            && self.max_set_point_c.is_finite()
            && self.min_set_point_c < self.max_set_point_c)
        {
            return Err(invalid(
                "max_set_point_c",
                self.max_set_point_c,
                "set point range must be finite and non-empty",
            ));
        }
        if !(self.min_set_point_c..=self.max_set_point_c).contains(&self.default_set_point_c) {
            return Err(invalid(
                "default_set_point_c",
                self.default_set_point_c,
                "outside the set point range",
            ));
        }
        if self.default_duration_s > self.max_duration_s {
            return Err(invalid(
                "default_duration_s",
                self.default_duration_s,
                "exceeds max_duration_s",
            ));
        }
        if self.blink_period_ms == 0 {
            return Err(invalid(
                "blink_period_ms",
                self.blink_period_ms,
                "must be positive",
            ));
        }
        self.validate_flow()?;
        self.thermistor.validate()?;

        if self.profiles.len() > MAX_PROFILES {
            return Err(ValidationError::TooManyProfiles {
                count: self.profiles.len(),
                max: MAX_PROFILES,
            });
        }
        for profile in self.profiles.iter() {
            profile
                .validate()
                .map_err(|source| ValidationError::Profile {
                    name: profile.name.clone(),
                    source,
                })?;
        }
        self.ident.validate()?;
        Ok(())
    }

    fn validate_flow(&self) -> Result<(), ValidationError> {
        let flow = &self.flow;
        if !(flow.pulses_per_litre.is_finite() && flow.pulses_per_litre > 0.0) {
            return Err(invalid(
                "flow.pulses_per_litre",
                flow.pulses_per_litre,
                "must be positive",
            ));
        }
        if !(flow.critical_lpm.is_finite() && flow.critical_lpm >= 0.0) {
            return Err(invalid(
                "flow.critical_lpm",
                flow.critical_lpm,
                "must be finite and non-negative",
            ));
        }
        if flow.stale_after_us == 0 {
            return Err(invalid(
                "flow.stale_after_us",
                flow.stale_after_us,
                "must be positive",
            ));
        }
        if !(flow.low_bound_lpm.is_finite() && flow.high_bound_lpm.is_finite())
            || flow.low_bound_lpm > flow.high_bound_lpm
        {
            return Err(invalid(
                "flow.low_bound_lpm",
                flow.low_bound_lpm,
                "must not exceed high_bound_lpm",
            ));
        }
        if !(flow.display_max_lpm.is_finite() && flow.display_max_lpm > 0.0) {
            return Err(invalid(
                "flow.display_max_lpm",
                flow.display_max_lpm,
                "must be positive",
            ));
        }
        Ok(())
    }

    /// PID sample configuration.
    pub fn sample(&self) -> RegulatorResult<SampleConfig> {
        Ok(SampleConfig::new(self.sample_period_ms)?)
    }

    /// Clamp an operator answer into the set point range.
    ///
    /// Non-finite answers fall back to the default set point.
    pub fn clamp_set_point(&self, set_point_c: f64) -> f64 {
        if set_point_c.is_finite() {
            set_point_c.clamp(self.min_set_point_c, self.max_set_point_c)
        } else {
            self.default_set_point_c
        }
    }

    pub fn clamp_duration(&self, duration_s: u32) -> u32 {
        duration_s.min(self.max_duration_s)
    }
}

pub fn load_yaml(path: &Path) -> RegulatorResult<RegulatorConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = from_yaml_str(&content)?;
    Ok(config)
}

pub fn from_yaml_str(content: &str) -> RegulatorResult<RegulatorConfig> {
    let config: RegulatorConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &RegulatorConfig) -> RegulatorResult<()> {
    config.validate()?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegulatorError;

    #[test]
    fn default_config_is_valid() {
        let config = RegulatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.profiles.len(), 1);
        assert_eq!(config.window_ms, 5_000);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = from_yaml_str("{}").unwrap();
        assert_eq!(config, RegulatorConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = r#"
window_ms: 4000
tolerance_c: 2.0
flow_interlock: false
thermistor:
  a: 0.001
  b: 0.0002
  c: 0.0
  d: 0.0000001
  reference_ohms: 4700
profiles:
  - name: small
    kp: 1500
    ki: 3
    kd: 0
    selector: 10
  - name: large
    kp: 3000
    ki: 5
    kd: 0
    tau_d_s: 10
    tau_sp_s: 600
    selector: 25
"#;
        let config = from_yaml_str(yaml).unwrap();
        assert_eq!(config.window_ms, 4_000);
        assert!(!config.flow_interlock);
        assert_eq!(config.thermistor.reference_ohms, 4_700.0);
        assert_eq!(config.thermistor.adc_max, 1023);
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles.closest_to(24.0), Some(1));
        assert_eq!(config.sample_period_ms, 1_000);
    }

    #[test]
    fn yaml_round_trip() {
        let config = RegulatorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn five_profiles_rejected() {
        let entries: String = (0..5)
            .map(|i| format!("  - {{ name: p{i}, kp: 1, ki: 0, kd: 0 }}\n"))
            .collect();
        let err = from_yaml_str(&format!("profiles:\n{entries}")).unwrap_err();
        assert!(matches!(
            err,
            RegulatorError::Validation(ValidationError::TooManyProfiles { count: 5, max: 4 })
        ));
    }

    #[test]
    fn bad_values_rejected() {
        let cases = [
            "window_ms: 0",
            "sample_period_ms: 0",
            "tolerance_c: -1",
            "default_set_point_c: 120",
            "default_duration_s: 70000",
            "flow: { pulses_per_litre: 0 }",
            "flow: { critical_lpm: .nan }",
            "flow: { critical_lpm: -0.5 }",
            "ident: { steps: [{ at_s: 0, duty_percent: 50 }], duration_s: 18446744073709551615 }",
            "profiles: [{ name: neg, kp: -5, ki: 0, kd: 0 }]",
            "thermistor: { a: 0.001, b: 0.0002, c: 0, d: 0, reference_ohms: 0 }",
            "ident: { steps: [], duration_s: 10 }",
        ];
        for yaml in cases {
            assert!(
                matches!(from_yaml_str(yaml), Err(RegulatorError::Validation(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            from_yaml_str("window_ms: [1, 2"),
            Err(RegulatorError::Yaml(_))
        ));
    }

    #[test]
    fn operator_answers_are_clamped() {
        let config = RegulatorConfig::default();
        assert_eq!(config.clamp_set_point(150.0), 99.9);
        assert_eq!(config.clamp_set_point(-3.0), 0.0);
        assert_eq!(config.clamp_set_point(f64::NAN), 68.0);
        assert_eq!(config.clamp_duration(90_000), 59_999);
        assert_eq!(config.clamp_duration(600), 600);
    }
}
