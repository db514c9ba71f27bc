//! Closed-loop runs of the regulator against the simulated plant.
//!
//! Each simulation step applies due scenario events, delivers flow pulses,
//! presents the plant temperature on the ADC, ticks the state machine and
//! then integrates the plant with the heater state the tick left behind.

use crate::board::{Pump, SimAdc, SimPin};
use crate::error::{SimError, SimResult};
use crate::plant::MashPlant;
use crate::scenario::{Scenario, SimEvent, SimEventKind};
use crate::ui::{ScriptedUi, UiLog};
use rims_core::{Clock, ManualClock};
use rims_io::FlowPulses;
use rims_regulator::{
    Board, Fault, IdentState, Identification, Regulator, RegulatorConfig, RegulatorState,
    TelemetryBuffer, TelemetryRecord,
};
use serde::Serialize;
use std::iter::Peekable;
use std::vec::IntoIter;
use tracing::{debug, info};

/// Progress is reported once per simulated minute.
const PROGRESS_EVERY_MS: u64 = 60_000;

#[derive(Debug, Clone, Default)]
pub struct SimProgress {
    pub sim_time_s: f64,
    pub max_s: f64,
    pub fraction_complete: f64,
    pub process_value_c: f64,
    pub heater_on: bool,
    pub remaining_s: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// State when the run stopped, before the end-of-session acknowledgement.
    pub final_state: RegulatorState,
    pub elapsed: bool,
    /// Alarm was sounding while waiting for the acknowledgement.
    pub alarm_sounded: bool,
    pub acknowledged: bool,
    pub simulated_s: f64,
    /// Time the regulator counted towards the session (s).
    pub running_s: u64,
    pub heater_on_s: f64,
    pub max_temperature_c: f64,
    pub final_temperature_c: f64,
    pub records: Vec<TelemetryRecord>,
    pub faults_seen: Vec<Fault>,
    pub ui: UiLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentReport {
    pub final_state: IdentState,
    pub finished: bool,
    pub alarm_sounded: bool,
    pub acknowledged: bool,
    pub simulated_s: f64,
    pub heater_on_s: f64,
    pub max_temperature_c: f64,
    pub final_temperature_c: f64,
    pub records: Vec<TelemetryRecord>,
    pub faults_seen: Vec<Fault>,
    pub ui: UiLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SensorLead {
    Connected,
    Open,
    Shorted,
}

/// Everything outside the regulator: plant, pins, pump and the timeline.
struct Rig {
    clock: ManualClock,
    adc: SimAdc,
    heater: SimPin,
    indicator: SimPin,
    power: SimPin,
    alarm: SimPin,
    pump: Pump,
    plant: MashPlant,
    sensor: SensorLead,
    flow_lpm: f64,
    events: Peekable<IntoIter<SimEvent>>,
    tick_ms: u64,
    max_ms: u64,
    heater_on_ms: u64,
    max_temperature_c: f64,
    next_progress_ms: u64,
}

impl Rig {
    fn new(config: &RegulatorConfig, scenario: &Scenario) -> SimResult<Self> {
        scenario.validate()?;
        let plant = MashPlant::new(scenario.plant.clone())?;
        let clock = ManualClock::new();
        let mut pump = Pump::new(&config.flow);
        pump.set_flow(scenario.flow_lpm, clock.micros());
        Ok(Self {
            adc: SimAdc::new(config.thermistor.clone()),
            heater: SimPin::new(false),
            indicator: SimPin::new(false),
            power: SimPin::new(config.power_present_high),
            alarm: SimPin::new(false),
            pump,
            max_temperature_c: plant.temperature_c(),
            plant,
            sensor: SensorLead::Connected,
            flow_lpm: scenario.flow_lpm,
            events: scenario.timeline().into_iter().peekable(),
            tick_ms: scenario.tick_ms,
            max_ms: scenario.max_s.saturating_mul(1_000),
            heater_on_ms: 0,
            next_progress_ms: 0,
            clock,
        })
    }

    fn board<'f>(&self, pulses: &'f FlowPulses) -> Board<'f, SimAdc, SimPin, SimPin, SimPin, SimPin> {
        Board::new(
            self.adc.clone(),
            pulses,
            self.heater.clone(),
            self.indicator.clone(),
        )
        .with_power_sense(self.power.clone())
        .with_alarm(self.alarm.clone())
    }

    fn power_present(&self, present_high: bool) -> bool {
        self.power.is_set() == present_high
    }

    /// Bring the rig up to the current time before a tick.
    fn prepare(&mut self, pulses: &FlowPulses, present_high: bool) {
        let now_us = self.clock.micros();
        let now_s = now_us as f64 / 1e6;
        while let Some(event) = self.events.next_if(|e| e.at_s <= now_s) {
            self.apply(event, now_us, present_high);
        }
        self.pump.advance(pulses, now_us);
        match self.sensor {
            SensorLead::Connected => self.adc.set_celsius(self.plant.temperature_c()),
            SensorLead::Open => self.adc.disconnect(),
            SensorLead::Shorted => self.adc.short(),
        }
    }

    fn apply(&mut self, event: SimEvent, now_us: u64, present_high: bool) {
        debug!(at_s = event.at_s, kind = ?event.kind, "scenario event");
        match event.kind {
            SimEventKind::SensorDisconnect => self.sensor = SensorLead::Open,
            SimEventKind::SensorShort => self.sensor = SensorLead::Shorted,
            SimEventKind::SensorReconnect => self.sensor = SensorLead::Connected,
            SimEventKind::PumpStop => self.pump.stop(),
            SimEventKind::PumpStart => self.pump.set_flow(self.flow_lpm, now_us),
            SimEventKind::PowerLoss => self.power.set(!present_high),
            SimEventKind::PowerRestore => self.power.set(present_high),
            SimEventKind::Disturb { delta_c } => self.plant.disturb(delta_c),
        }
    }

    /// Integrate the plant over one step and advance the clock.
    fn advance(&mut self, present_high: bool) {
        let heating = self.heater.is_set() && self.power_present(present_high);
        self.plant.step(self.tick_ms as f64 / 1_000.0, heating);
        if heating {
            self.heater_on_ms += self.tick_ms;
        }
        self.max_temperature_c = self.max_temperature_c.max(self.plant.temperature_c());
        self.clock.advance_ms(self.tick_ms);
    }

    fn out_of_time(&self) -> bool {
        self.clock.millis() >= self.max_ms
    }

    fn report_progress(
        &mut self,
        progress: &mut Option<&mut dyn FnMut(SimProgress)>,
        remaining_s: u64,
    ) {
        let now_ms = self.clock.millis();
        if now_ms < self.next_progress_ms {
            return;
        }
        self.next_progress_ms = now_ms + PROGRESS_EVERY_MS;
        if let Some(cb) = progress.as_deref_mut() {
            cb(SimProgress {
                sim_time_s: now_ms as f64 / 1_000.0,
                max_s: self.max_ms as f64 / 1_000.0,
                fraction_complete: (now_ms as f64 / self.max_ms as f64).min(1.0),
                process_value_c: self.plant.temperature_c(),
                heater_on: self.heater.is_set(),
                remaining_s,
            });
        }
    }
}

/// Run one regulation session from the operator's answers to the
/// acknowledgement of the end-of-session alarm.
///
/// The scripted operator confirms the pump and heater prompts as soon as
/// they appear. Runs that never elapse stop at `scenario.max_s`.
pub fn run_session(
    config: RegulatorConfig,
    scenario: &Scenario,
    mut progress: Option<&mut dyn FnMut(SimProgress)>,
) -> SimResult<SessionReport> {
    let mut rig = Rig::new(&config, scenario)?;
    let present_high = config.power_present_high;
    let pulses = FlowPulses::new();
    let telemetry = TelemetryBuffer::new();
    let ui = ScriptedUi::new(scenario.set_point_c, scenario.duration_s)
        .with_profile(scenario.profile_choice(&config.profiles));
    let mut regulator = Regulator::new(config, rig.clock.clone(), ui, rig.board(&pulses))?
        .with_telemetry(telemetry.clone());

    info!(
        set_point_c = scenario.set_point_c,
        duration_s = scenario.duration_s,
        "simulated session started"
    );
    let final_state = loop {
        rig.prepare(&pulses, present_high);
        if matches!(
            regulator.state(),
            RegulatorState::AwaitPumpConfirm | RegulatorState::AwaitHeaterConfirm
        ) {
            regulator.ui_mut().press_key();
        }
        let state = regulator.tick();
        if state == RegulatorState::Elapsed || rig.out_of_time() {
            break state;
        }
        let remaining_s = regulator.status().remaining_s;
        rig.report_progress(&mut progress, remaining_s);
        rig.advance(present_high);
    };

    let running_s = regulator.status().running_s;
    let alarm_sounded = regulator.alarm_sounding();
    let elapsed = final_state == RegulatorState::Elapsed;
    let acknowledged = if elapsed {
        regulator.ui_mut().press_key();
        regulator.tick() == RegulatorState::Idle
    } else {
        regulator.cancel();
        false
    };
    let simulated_s = rig.clock.millis() as f64 / 1_000.0;
    info!(
        elapsed,
        simulated_s,
        max_temperature_c = rig.max_temperature_c,
        "simulated session finished"
    );

    let ui = regulator.ui().log().clone();
    Ok(SessionReport {
        final_state,
        elapsed,
        alarm_sounded,
        acknowledged,
        simulated_s,
        running_s,
        heater_on_s: rig.heater_on_ms as f64 / 1_000.0,
        max_temperature_c: rig.max_temperature_c,
        final_temperature_c: rig.plant.temperature_c(),
        records: telemetry.records(),
        faults_seen: ui.faults.clone(),
        ui,
    })
}

/// Run the open-loop identification schedule of `config.ident`.
pub fn run_identification(
    config: RegulatorConfig,
    scenario: &Scenario,
    mut progress: Option<&mut dyn FnMut(SimProgress)>,
) -> SimResult<IdentReport> {
    let mut rig = Rig::new(&config, scenario)?;
    if rig.max_ms < config.ident.duration_ms() {
        return Err(SimError::InvalidArg {
            what: "max_s is shorter than the identification schedule",
        });
    }
    let present_high = config.power_present_high;
    let pulses = FlowPulses::new();
    let telemetry = TelemetryBuffer::new();
    let ui = ScriptedUi::new(scenario.set_point_c, scenario.duration_s);
    let mut ident = Identification::new(config, rig.clock.clone(), ui, rig.board(&pulses))?
        .with_telemetry(telemetry.clone());

    let final_state = loop {
        rig.prepare(&pulses, present_high);
        if matches!(
            ident.state(),
            IdentState::AwaitPumpConfirm | IdentState::AwaitHeaterConfirm
        ) {
            ident.ui_mut().press_key();
        }
        let state = ident.tick();
        if state == IdentState::Finished || rig.out_of_time() {
            break state;
        }
        let remaining_s = ident.status().remaining_s;
        rig.report_progress(&mut progress, remaining_s);
        rig.advance(present_high);
    };

    let alarm_sounded = ident.alarm_sounding();
    let finished = final_state == IdentState::Finished;
    let acknowledged = if finished {
        ident.ui_mut().press_key();
        ident.tick() == IdentState::Idle
    } else {
        ident.cancel();
        false
    };
    let simulated_s = rig.clock.millis() as f64 / 1_000.0;
    info!(
        finished,
        simulated_s,
        max_temperature_c = rig.max_temperature_c,
        "simulated identification finished"
    );

    let ui = ident.ui().log().clone();
    Ok(IdentReport {
        final_state,
        finished,
        alarm_sounded,
        acknowledged,
        simulated_s,
        heater_on_s: rig.heater_on_ms as f64 / 1_000.0,
        max_temperature_c: rig.max_temperature_c,
        final_temperature_c: rig.plant.temperature_c(),
        records: telemetry.records(),
        faults_seen: ui.faults.clone(),
        ui,
    })
}
