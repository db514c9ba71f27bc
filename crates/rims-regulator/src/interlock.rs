//! Safety interlocks.
//!
//! Any active fault forces the heater off. Faults clear on their own once the
//! condition goes away; none of them ends the session.

use core::fmt;
use rims_io::ThermistorReading;
use serde::Serialize;
use tracing::{info, warn};

/// A condition that forbids heating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Fault {
    SensorDisconnected,
    SensorShorted,
    CriticalFlow,
    HeaterPowerLoss,
}

impl Fault {
    pub const ALL: [Fault; 4] = [
        Fault::SensorDisconnected,
        Fault::SensorShorted,
        Fault::CriticalFlow,
        Fault::HeaterPowerLoss,
    ];

    /// Two-letter code for character displays.
    pub fn code(&self) -> &'static str {
        match self {
            Fault::SensorDisconnected => "TD",
            Fault::SensorShorted => "TS",
            Fault::CriticalFlow => "FL",
            Fault::HeaterPowerLoss => "PW",
        }
    }

    /// Whether the fault blocks the session timer as well as the heater.
    ///
    /// Without a temperature the tolerance check is meaningless, so sensor
    /// faults pause the clock. Flow and power faults leave the clock to the
    /// tolerance check.
    pub fn pauses_timer(&self) -> bool {
        matches!(self, Fault::SensorDisconnected | Fault::SensorShorted)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Fault::SensorDisconnected => "temperature sensor disconnected",
            Fault::SensorShorted => "temperature sensor shorted",
            Fault::CriticalFlow => "critical flow",
            Fault::HeaterPowerLoss => "heater power lost",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Set of active faults after one poll of the inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Faults {
    pub sensor: Option<Fault>,
    pub critical_flow: bool,
    pub power_loss: bool,
}

impl Faults {
    pub fn evaluate(reading: ThermistorReading, critical_flow: bool, power_loss: bool) -> Self {
        let sensor = match reading {
            ThermistorReading::Disconnected => Some(Fault::SensorDisconnected),
            ThermistorReading::Shorted => Some(Fault::SensorShorted),
            ThermistorReading::Celsius(_) => None,
        };
        Self {
            sensor,
            critical_flow,
            power_loss,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.sensor.is_none() && !self.critical_flow && !self.power_loss
    }

    pub fn contains(&self, fault: Fault) -> bool {
        match fault {
            Fault::SensorDisconnected | Fault::SensorShorted => self.sensor == Some(fault),
            Fault::CriticalFlow => self.critical_flow,
            Fault::HeaterPowerLoss => self.power_loss,
        }
    }

    /// Active faults, most severe first.
    pub fn active(&self) -> impl Iterator<Item = Fault> + '_ {
        Fault::ALL.into_iter().filter(|f| self.contains(*f))
    }

    /// The fault to show when only one fits on screen.
    pub fn first(&self) -> Option<Fault> {
        self.active().next()
    }

    pub fn pauses_timer(&self) -> bool {
        self.active().any(|f| f.pauses_timer())
    }

    /// Log every fault raised or cleared since `previous`.
    pub fn log_changes(&self, previous: &Faults) {
        if self == previous {
            return;
        }
        for fault in self.active().filter(|f| !previous.contains(*f)) {
            warn!(%fault, "interlock raised");
        }
        for fault in previous.active().filter(|f| !self.contains(*f)) {
            info!(%fault, "interlock cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_map_to_sensor_faults() {
        let f = Faults::evaluate(ThermistorReading::Disconnected, false, false);
        assert_eq!(f.first(), Some(Fault::SensorDisconnected));
        assert!(f.pauses_timer());

        let f = Faults::evaluate(ThermistorReading::Shorted, false, false);
        assert_eq!(f.first(), Some(Fault::SensorShorted));

        let f = Faults::evaluate(ThermistorReading::Celsius(65.0), false, false);
        assert!(f.is_clear());
        assert_eq!(f.first(), None);
    }

    #[test]
    fn several_faults_at_once() {
        let f = Faults::evaluate(ThermistorReading::Celsius(65.0), true, true);
        assert!(!f.is_clear());
        assert!(!f.pauses_timer());
        let active: Vec<_> = f.active().collect();
        assert_eq!(active, vec![Fault::CriticalFlow, Fault::HeaterPowerLoss]);
    }

    #[test]
    fn codes_are_two_letters() {
        for fault in Fault::ALL {
            assert_eq!(fault.code().len(), 2);
            assert!(fault.to_string().contains(fault.code()));
        }
    }
}
