//! Auxiliary digital I/O: heater power sense, alarm buzzer, and a no-op pin
//! for boards that lack one of them.

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};
use tracing::warn;

/// Placeholder pin: writes are ignored, reads are low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }
}

/// Input that reports whether mains power reaches the heater element.
#[derive(Debug)]
pub struct PowerSense<P> {
    pin: P,
    present_level: PinState,
}

impl<P: InputPin> PowerSense<P> {
    /// `present_level` is the pin level read while heater power is present.
    pub fn new(pin: P, present_level: PinState) -> Self {
        Self { pin, present_level }
    }

    /// Heater power is missing. A failed read counts as missing.
    pub fn power_lost(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => PinState::from(high) != self.present_level,
            Err(err) => {
                warn!(?err, "heater power sense read failed");
                true
            }
        }
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

/// Audible alarm output.
#[derive(Debug)]
pub struct Alarm<B> {
    pin: B,
    sounding: bool,
}

impl<B: OutputPin> Alarm<B> {
    pub fn new(pin: B) -> Self {
        let mut alarm = Self {
            pin,
            sounding: true,
        };
        alarm.set(false);
        alarm
    }

    pub fn set(&mut self, on: bool) {
        if let Err(err) = self.pin.set_state(PinState::from(on)) {
            warn!(?err, "alarm write failed");
        }
        self.sounding = on;
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Level(bool);

    impl ErrorType for Level {
        type Error = Infallible;
    }

    impl InputPin for Level {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
    }

    #[test]
    fn power_sense_active_high() {
        let mut sense = PowerSense::new(Level(true), PinState::High);
        assert!(!sense.power_lost());
        sense.pin_mut().0 = false;
        assert!(sense.power_lost());
    }

    #[test]
    fn power_sense_active_low() {
        let mut sense = PowerSense::new(Level(false), PinState::Low);
        assert!(!sense.power_lost());
        sense.pin_mut().0 = true;
        assert!(sense.power_lost());
    }

    #[test]
    fn alarm_starts_silent() {
        let mut alarm = Alarm::new(NoPin);
        assert!(!alarm.is_sounding());
        alarm.set(true);
        assert!(alarm.is_sounding());
    }
}
