//! Hardware bundle handed to the state machines.

use crate::config::RegulatorConfig;
use crate::error::RegulatorResult;
use crate::interlock::Faults;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use rims_io::{
    Alarm, AnalogInput, FlowLevel, FlowMeter, FlowPulses, NoPin, PowerSense, SsrDriver,
    Thermistor, ThermistorReading,
};

/// Raw hardware handles for one RIMS.
///
/// `P` (heater power sense) and `B` (alarm buzzer) are optional; boards
/// without them keep the [`NoPin`] defaults.
#[derive(Debug)]
pub struct Board<'f, A, H, L, P = NoPin, B = NoPin> {
    pub thermistor_adc: A,
    pub flow_pulses: &'f FlowPulses,
    pub heater: H,
    pub indicator: L,
    pub power_sense: Option<P>,
    pub alarm: Option<B>,
}

impl<'f, A, H, L> Board<'f, A, H, L> {
    pub fn new(thermistor_adc: A, flow_pulses: &'f FlowPulses, heater: H, indicator: L) -> Self {
        Self {
            thermistor_adc,
            flow_pulses,
            heater,
            indicator,
            power_sense: None,
            alarm: None,
        }
    }
}

impl<'f, A, H, L, P, B> Board<'f, A, H, L, P, B> {
    pub fn with_power_sense<P2>(self, pin: P2) -> Board<'f, A, H, L, P2, B> {
        Board {
            thermistor_adc: self.thermistor_adc,
            flow_pulses: self.flow_pulses,
            heater: self.heater,
            indicator: self.indicator,
            power_sense: Some(pin),
            alarm: self.alarm,
        }
    }

    pub fn with_alarm<B2>(self, pin: B2) -> Board<'f, A, H, L, P, B2> {
        Board {
            thermistor_adc: self.thermistor_adc,
            flow_pulses: self.flow_pulses,
            heater: self.heater,
            indicator: self.indicator,
            power_sense: self.power_sense,
            alarm: Some(pin),
        }
    }
}

/// Inputs read in one poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Inputs {
    pub reading: ThermistorReading,
    pub flow_lpm: f64,
    pub flow_level: FlowLevel,
    pub faults: Faults,
}

/// Drivers built from a [`Board`], shared by both state machines.
#[derive(Debug)]
pub(crate) struct Peripherals<'f, A, H, L, P, B> {
    pub thermistor: Thermistor<A>,
    pub flow: FlowMeter<'f>,
    pub ssr: SsrDriver<H, L>,
    pub power_sense: Option<PowerSense<P>>,
    pub alarm: Option<Alarm<B>>,
    flow_interlock: bool,
}

impl<'f, A, H, L, P, B> Peripherals<'f, A, H, L, P, B>
where
    A: AnalogInput,
    H: OutputPin,
    L: OutputPin,
    P: InputPin,
    B: OutputPin,
{
    pub fn build(
        board: Board<'f, A, H, L, P, B>,
        config: &RegulatorConfig,
        now_ms: u64,
    ) -> RegulatorResult<Self> {
        let present_level = PinState::from(config.power_present_high);
        Ok(Self {
            thermistor: Thermistor::new(board.thermistor_adc, config.thermistor.clone())?,
            flow: FlowMeter::new(board.flow_pulses, config.flow.clone()),
            ssr: SsrDriver::new(board.heater, board.indicator, config.window_ms, now_ms)?,
            power_sense: board
                .power_sense
                .map(|pin| PowerSense::new(pin, present_level)),
            alarm: board.alarm.map(Alarm::new),
            flow_interlock: config.flow_interlock,
        })
    }

    /// Sample the thermistor, the flow meter and the power sense input.
    pub fn poll(&mut self, now_us: u64) -> Inputs {
        let reading = self.thermistor.sample();
        let flow_lpm = self.flow.rate(now_us);
        let critical_flow = self.flow_interlock && self.flow.is_critical(flow_lpm);
        let power_loss = self
            .power_sense
            .as_mut()
            .is_some_and(|sense| sense.power_lost());
        Inputs {
            reading,
            flow_lpm,
            flow_level: self.flow.level(flow_lpm),
            faults: Faults::evaluate(reading, critical_flow, power_loss),
        }
    }

    /// Flow only, for the confirmation screens.
    pub fn poll_flow(&self, now_us: u64) -> (f64, FlowLevel) {
        let flow_lpm = self.flow.rate(now_us);
        (flow_lpm, self.flow.level(flow_lpm))
    }

    pub fn set_alarm(&mut self, on: bool) {
        if let Some(alarm) = self.alarm.as_mut() {
            alarm.set(on);
        }
    }

    pub fn alarm_sounding(&self) -> bool {
        self.alarm.as_ref().is_some_and(|alarm| alarm.is_sounding())
    }

    /// Drive the heater indicator directly (end-of-session blink).
    pub fn set_indicator(&mut self, on: bool) {
        if let Err(err) = self.ssr.indicator_mut().set_state(PinState::from(on)) {
            tracing::warn!(?err, "heater indicator write failed");
        }
    }
}

/// Square wave for the end-of-session alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Blinker {
    half_period_ms: u64,
    last_toggle_ms: u64,
    on: bool,
}

impl Blinker {
    pub fn new(half_period_ms: u64, now_ms: u64) -> Self {
        Self {
            half_period_ms,
            last_toggle_ms: now_ms,
            on: true,
        }
    }

    /// Returns the new level when it changed.
    pub fn refresh(&mut self, now_ms: u64) -> Option<bool> {
        if now_ms.saturating_sub(self.last_toggle_ms) < self.half_period_ms {
            return None;
        }
        self.last_toggle_ms = now_ms;
        self.on = !self.on;
        Some(self.on)
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
