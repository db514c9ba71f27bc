//! Scripted simulation runs.
//!
//! A scenario fixes the plant, the operator's answers and a timeline of
//! disturbances. It is plain data so runs can be kept as YAML next to the
//! regulator configuration:
//!
//! ```yaml
//! set_point_c: 65.0
//! duration_s: 1200
//! plant: { volume_l: 10.0, initial_c: 60.0 }
//! profile: 1
//! events:
//!   - { at_s: 300.0, kind: pump_stop }
//!   - { at_s: 360.0, kind: pump_start }
//! ```

use crate::error::{SimError, SimResult};
use crate::plant::PlantParams;
use rims_controls::ProfileSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_set_point_c() -> f64 {
    68.0
}
fn default_duration_s() -> u32 {
    3_600
}
fn default_tick_ms() -> u64 {
    100
}
fn default_flow_lpm() -> f64 {
    1.75
}
fn default_max_s() -> u64 {
    4 * 3_600
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub plant: PlantParams,
    /// Operator's set point answer (°C).
    #[serde(default = "default_set_point_c")]
    pub set_point_c: f64,
    /// Operator's duration answer (s).
    #[serde(default = "default_duration_s")]
    pub duration_s: u32,
    /// Operator's tuning profile choice. Left out, the operator picks the
    /// profile whose selector key is closest to the plant volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<usize>,
    /// Simulation step (ms).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Pump flow while running (L/min).
    #[serde(default = "default_flow_lpm")]
    pub flow_lpm: f64,
    /// Hard stop for runs that never elapse (s of simulated time).
    #[serde(default = "default_max_s")]
    pub max_s: u64,
    #[serde(default)]
    pub events: Vec<SimEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            plant: PlantParams::default(),
            set_point_c: default_set_point_c(),
            duration_s: default_duration_s(),
            profile: None,
            tick_ms: default_tick_ms(),
            flow_lpm: default_flow_lpm(),
            max_s: default_max_s(),
            events: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn with_event(mut self, at_s: f64, kind: SimEventKind) -> Self {
        self.events.push(SimEvent { at_s, kind });
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        self.plant.validate()?;
        if self.tick_ms == 0 {
            return Err(SimError::InvalidArg {
                what: "tick must be positive",
            });
        }
        if !(self.flow_lpm.is_finite() && self.flow_lpm >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "pump flow must be non-negative",
            });
        }
        if self.max_s == 0 {
            return Err(SimError::InvalidArg {
                what: "max_s must be positive",
            });
        }
        if self
            .events
            .iter()
            .any(|e| !(e.at_s.is_finite() && e.at_s >= 0.0))
        {
            return Err(SimError::InvalidArg {
                what: "event times must be non-negative",
            });
        }
        Ok(())
    }

    /// Profile index the scripted operator answers with.
    pub fn profile_choice(&self, profiles: &ProfileSet) -> usize {
        self.profile
            .or_else(|| profiles.closest_to(self.plant.volume_l))
            .unwrap_or(0)
    }

    /// Events in time order; ties keep their listed order.
    pub fn timeline(&self) -> Vec<SimEvent> {
        let mut events = self.events.clone();
        events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
        events
    }
}

/// Something that happens to the rig at `at_s` of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub at_s: f64,
    #[serde(flatten)]
    pub kind: SimEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEventKind {
    /// Thermistor lead breaks.
    SensorDisconnect,
    SensorShort,
    SensorReconnect,
    PumpStop,
    PumpStart,
    /// Heater supply drops (breaker, unplugged cord).
    PowerLoss,
    PowerRestore,
    /// Step change of the liquid temperature, e.g. adding cold water.
    Disturb { delta_c: f64 },
}

/// Load and validate a scenario file.
pub fn load_scenario(path: &Path) -> SimResult<Scenario> {
    let text = fs::read_to_string(path)?;
    let scenario: Scenario = serde_yaml::from_str(&text)?;
    scenario.validate()?;
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rims_controls::TuningProfile;

    fn volume_profiles() -> ProfileSet {
        let mut set = ProfileSet::new();
        set.add(TuningProfile::new("small", 1_000.0, 2.0, 0.0).with_selector(10.0))
            .unwrap();
        set.add(TuningProfile::new("large", 3_000.0, 5.0, 0.0).with_selector(25.0))
            .unwrap();
        set
    }

    #[test]
    fn profile_follows_batch_volume_unless_chosen() {
        let profiles = volume_profiles();
        let mut scenario = Scenario::default();
        scenario.plant.volume_l = 22.0;
        assert_eq!(scenario.profile_choice(&profiles), 1);
        scenario.plant.volume_l = 12.0;
        assert_eq!(scenario.profile_choice(&profiles), 0);

        scenario.profile = Some(1);
        assert_eq!(scenario.profile_choice(&profiles), 1);
        assert_eq!(Scenario::default().profile_choice(&ProfileSet::new()), 0);
    }

    #[test]
    fn timeline_is_sorted() {
        let scenario = Scenario::default()
            .with_event(50.0, SimEventKind::PumpStart)
            .with_event(10.0, SimEventKind::PumpStop)
            .with_event(50.0, SimEventKind::PowerLoss);
        let kinds: Vec<_> = scenario.timeline().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SimEventKind::PumpStop,
                SimEventKind::PumpStart,
                SimEventKind::PowerLoss
            ]
        );
    }

    #[test]
    fn rejects_bad_values() {
        let zero_tick = Scenario {
            tick_ms: 0,
            ..Scenario::default()
        };
        assert!(zero_tick.validate().is_err());

        let past = Scenario::default().with_event(-1.0, SimEventKind::PumpStop);
        assert!(past.validate().is_err());

        assert!(Scenario::default().validate().is_ok());
    }
}
