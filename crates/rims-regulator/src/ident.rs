//! Open-loop process identification.
//!
//! Drives the heater through a fixed duty schedule without the PID and logs
//! the temperature response. The resulting `time, cv, pv` trace is used to
//! fit a plant model and derive tuning profiles offline.
//!
//! Shares the hardware handling and interlocks of the regulator: any fault
//! forces the duty to zero for as long as it lasts.

use crate::board::{Blinker, Board, Peripherals};
use crate::config::{RegulatorConfig, ValidationError};
use crate::error::RegulatorResult;
use crate::interlock::Faults;
use crate::telemetry::{TelemetryRecord, TelemetrySink};
use crate::ui::IdentUi;
use embedded_hal::digital::{InputPin, OutputPin};
use rims_core::Clock;
use rims_io::{AnalogInput, NoPin};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Longest identification run accepted.
pub const MAX_IDENT_DURATION_S: u64 = 86_400;

/// Duty applied from `at_s` until the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentStep {
    pub at_s: u64,
    pub duty_percent: u8,
}

/// Step schedule of an identification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentSchedule {
    pub steps: Vec<IdentStep>,
    pub duration_s: u64,
}

impl Default for IdentSchedule {
    /// 50 % for 10 min, 100 % for 10 min, then 10 min of cooling.
    fn default() -> Self {
        Self {
            steps: vec![
                IdentStep {
                    at_s: 0,
                    duty_percent: 50,
                },
                IdentStep {
                    at_s: 600,
                    duty_percent: 100,
                },
                IdentStep {
                    at_s: 1_200,
                    duty_percent: 0,
                },
            ],
            duration_s: 1_800,
        }
    }
}

impl IdentSchedule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |field: &str, value: String, reason: &str| ValidationError::InvalidValue {
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.duration_s == 0 {
            return Err(invalid("ident.duration_s", "0".into(), "must be positive"));
        }
        if self.duration_s > MAX_IDENT_DURATION_S {
            return Err(invalid(
                "ident.duration_s",
                self.duration_s.to_string(),
                "exceeds one day",
            ));
        }
        match self.steps.first() {
            Some(first) if first.at_s == 0 => {}
            Some(first) => {
                return Err(invalid(
                    "ident.steps",
                    first.at_s.to_string(),
                    "first step must start at 0 s",
                ));
            }
            None => return Err(invalid("ident.steps", "[]".into(), "must not be empty")),
        }
        for pair in self.steps.windows(2) {
            if pair[1].at_s <= pair[0].at_s {
                return Err(invalid(
                    "ident.steps",
                    pair[1].at_s.to_string(),
                    "steps must be in increasing time order",
                ));
            }
        }
        for step in &self.steps {
            if step.duty_percent > 100 {
                return Err(invalid(
                    "ident.steps.duty_percent",
                    step.duty_percent.to_string(),
                    "must be at most 100",
                ));
            }
            if step.at_s >= self.duration_s {
                return Err(invalid(
                    "ident.steps.at_s",
                    step.at_s.to_string(),
                    "step starts after the run ends",
                ));
            }
        }
        Ok(())
    }

    /// Scheduled duty `elapsed_ms` into the run.
    pub fn duty_percent_at(&self, elapsed_ms: u64) -> u8 {
        let elapsed_s = elapsed_ms / 1_000;
        self.steps
            .iter()
            .take_while(|step| step.at_s <= elapsed_s)
            .last()
            .map_or(0, |step| step.duty_percent)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_s.saturating_mul(1_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentState {
    Idle,
    AwaitPumpConfirm,
    AwaitHeaterConfirm,
    /// Following the schedule.
    Stepping,
    /// Schedule done; alarm on until acknowledged.
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentStatus {
    pub state: IdentState,
    pub process_value: Option<f64>,
    pub duty_percent: u8,
    pub heater_on: bool,
    pub elapsed_s: u64,
    pub remaining_s: u64,
    pub flow_lpm: f64,
    pub faults: Faults,
}

/// Identification run over the regulator's hardware.
pub struct Identification<'f, C, U, A, H, L, P = NoPin, B = NoPin> {
    config: RegulatorConfig,
    clock: C,
    ui: U,
    io: Peripherals<'f, A, H, L, P, B>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    state: IdentState,
    started_ms: u64,
    elapsed_ms: u64,
    next_record_ms: u64,
    duty_percent: u8,
    flow_lpm: f64,
    faults: Faults,
    blinker: Option<Blinker>,
}

impl<'f, C, U, A, H, L, P, B> Identification<'f, C, U, A, H, L, P, B>
where
    C: Clock,
    U: IdentUi,
    A: AnalogInput,
    H: OutputPin,
    L: OutputPin,
    P: InputPin,
    B: OutputPin,
{
    pub fn new(
        config: RegulatorConfig,
        clock: C,
        ui: U,
        board: Board<'f, A, H, L, P, B>,
    ) -> RegulatorResult<Self> {
        config.validate()?;
        let io = Peripherals::build(board, &config, clock.millis())?;
        Ok(Self {
            config,
            clock,
            ui,
            io,
            telemetry: None,
            state: IdentState::Idle,
            started_ms: 0,
            elapsed_ms: 0,
            next_record_ms: 0,
            duty_percent: 0,
            flow_lpm: 0.0,
            faults: Faults::default(),
            blinker: None,
        })
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self
    }

    pub fn tick(&mut self) -> IdentState {
        let now_ms = self.clock.millis();
        match self.state {
            IdentState::Idle => {
                self.io.ssr.force_off();
                self.ui.show_pump_warning();
                self.state = IdentState::AwaitPumpConfirm;
            }
            IdentState::AwaitPumpConfirm => {
                let (flow_lpm, level) = self.io.poll_flow(self.clock.micros());
                self.flow_lpm = flow_lpm;
                self.ui.display_flow(flow_lpm, level);
                if self.ui.poll_key() {
                    self.ui.show_heater_warning();
                    self.state = IdentState::AwaitHeaterConfirm;
                }
            }
            IdentState::AwaitHeaterConfirm => {
                if self.ui.poll_key() {
                    self.start(now_ms);
                }
            }
            IdentState::Stepping => self.step(now_ms),
            IdentState::Finished => {
                if self.ui.poll_key() {
                    info!("identification acknowledged");
                    self.reset();
                } else if let Some(level) = self.blinker.as_mut().and_then(|b| b.refresh(now_ms))
                {
                    self.io.set_alarm(level);
                    self.io.set_indicator(level);
                }
            }
        }
        self.state
    }

    /// Abort the run: heater off, back to `Idle`.
    pub fn cancel(&mut self) {
        if self.state != IdentState::Idle {
            info!(state = ?self.state, "identification cancelled");
        }
        self.reset();
    }

    pub fn status(&self) -> IdentStatus {
        IdentStatus {
            state: self.state,
            process_value: self.io.thermistor.temperature(),
            duty_percent: self.duty_percent,
            heater_on: self.io.ssr.is_asserted(),
            elapsed_s: self.elapsed_ms / 1_000,
            remaining_s: self.remaining_ms() / 1_000,
            flow_lpm: self.flow_lpm,
            faults: self.faults,
        }
    }

    pub fn state(&self) -> IdentState {
        self.state
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn alarm_sounding(&self) -> bool {
        self.io.alarm_sounding()
    }

    fn remaining_ms(&self) -> u64 {
        self.config
            .ident
            .duration_ms()
            .saturating_sub(self.elapsed_ms)
    }

    fn start(&mut self, now_ms: u64) {
        self.started_ms = now_ms;
        self.elapsed_ms = 0;
        self.next_record_ms = now_ms;
        self.io.ssr.restart(now_ms);
        self.ui.show_ident_screen();
        info!(
            steps = self.config.ident.steps.len(),
            duration_s = self.config.ident.duration_s,
            "identification started"
        );
        self.state = IdentState::Stepping;
    }

    fn step(&mut self, now_ms: u64) {
        self.elapsed_ms = now_ms.saturating_sub(self.started_ms);
        if self.elapsed_ms >= self.config.ident.duration_ms() {
            self.finish(now_ms);
            return;
        }

        let inputs = self.io.poll(self.clock.micros());
        inputs.faults.log_changes(&self.faults);
        self.faults = inputs.faults;
        self.flow_lpm = inputs.flow_lpm;

        let planned = self.config.ident.duty_percent_at(self.elapsed_ms);
        if planned != self.duty_percent && self.faults.is_clear() {
            info!(
                elapsed_s = self.elapsed_ms / 1_000,
                duty_percent = planned,
                "identification step"
            );
        }
        self.duty_percent = if self.faults.is_clear() { planned } else { 0 };
        let duty_ms = self.config.window_ms as f64 * f64::from(self.duty_percent) / 100.0;
        self.io.ssr.set_duty(duty_ms);
        self.io.ssr.refresh(now_ms);

        if let Some(fault) = self.faults.first() {
            self.ui.display_error(fault);
        }
        if let Some(pv) = inputs.reading.celsius() {
            self.ui.display_process_value(pv);
        }
        self.ui.display_duty(self.duty_percent);
        self.ui.display_remaining_time(self.remaining_ms() / 1_000);
        self.ui.display_flow(inputs.flow_lpm, inputs.flow_level);

        if now_ms >= self.next_record_ms {
            let period = self.config.sample_period_ms;
            while self.next_record_ms <= now_ms {
                self.next_record_ms += period;
            }
            let remaining_s = self.remaining_ms() / 1_000;
            if let Some(sink) = self.telemetry.as_mut() {
                let record = TelemetryRecord::new(
                    self.elapsed_ms,
                    duty_ms.round() as u64,
                    inputs.reading.celsius().unwrap_or(f64::NAN),
                    inputs.flow_lpm,
                    remaining_s,
                );
                sink.record(&record);
            }
        }
    }

    fn finish(&mut self, now_ms: u64) {
        self.duty_percent = 0;
        self.io.ssr.force_off();
        self.blinker = Some(Blinker::new(self.config.blink_period_ms, now_ms));
        self.io.set_alarm(true);
        self.io.set_indicator(true);
        self.ui.display_finished();
        info!(elapsed_s = self.elapsed_ms / 1_000, "identification finished");
        self.state = IdentState::Finished;
    }

    fn reset(&mut self) {
        self.io.ssr.force_off();
        self.io.set_alarm(false);
        self.blinker = None;
        self.duty_percent = 0;
        self.elapsed_ms = 0;
        self.faults = Faults::default();
        self.state = IdentState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interlock::Fault;
    use crate::telemetry::TelemetryBuffer;
    use crate::testing::{MockUi, SharedAdc, SharedPin};
    use rims_core::ManualClock;
    use rims_io::{FlowConfig, FlowPulses};

    #[test]
    fn default_schedule_steps() {
        let schedule = IdentSchedule::default();
        schedule.validate().unwrap();
        assert_eq!(schedule.duty_percent_at(0), 50);
        assert_eq!(schedule.duty_percent_at(599_999), 50);
        assert_eq!(schedule.duty_percent_at(600_000), 100);
        assert_eq!(schedule.duty_percent_at(1_199_000), 100);
        assert_eq!(schedule.duty_percent_at(1_200_000), 0);
        assert_eq!(schedule.duration_ms(), 1_800_000);
    }

    #[test]
    fn huge_duration_is_rejected_without_overflow() {
        let schedule = IdentSchedule {
            duration_s: u64::MAX,
            ..IdentSchedule::default()
        };
        assert!(schedule.validate().is_err());
        assert_eq!(schedule.duration_ms(), u64::MAX);

        let day = IdentSchedule {
            duration_s: MAX_IDENT_DURATION_S,
            ..IdentSchedule::default()
        };
        day.validate().unwrap();
    }

    #[test]
    fn schedule_validation() {
        let unordered = IdentSchedule {
            steps: vec![
                IdentStep {
                    at_s: 0,
                    duty_percent: 20,
                },
                IdentStep {
                    at_s: 0,
                    duty_percent: 40,
                },
            ],
            duration_s: 100,
        };
        assert!(unordered.validate().is_err());

        let late_start = IdentSchedule {
            steps: vec![IdentStep {
                at_s: 5,
                duty_percent: 20,
            }],
            duration_s: 100,
        };
        assert!(late_start.validate().is_err());

        let over_full = IdentSchedule {
            steps: vec![IdentStep {
                at_s: 0,
                duty_percent: 120,
            }],
            duration_s: 100,
        };
        assert!(over_full.validate().is_err());
    }

    struct Rig {
        clock: ManualClock,
        adc: SharedAdc,
        heater: SharedPin,
        buzzer: SharedPin,
        pumping: bool,
    }

    impl Rig {
        fn new() -> Self {
            let rig = Self {
                clock: ManualClock::new(),
                adc: SharedAdc::default(),
                heater: SharedPin::default(),
                buzzer: SharedPin::default(),
                pumping: true,
            };
            rig.adc.set_celsius(40.0);
            rig
        }

        fn ident<'f>(
            &self,
            pulses: &'f FlowPulses,
        ) -> Identification<'f, ManualClock, MockUi, SharedAdc, SharedPin, NoPin, NoPin, SharedPin>
        {
            let board = Board::new(self.adc.clone(), pulses, self.heater.clone(), NoPin)
                .with_alarm(self.buzzer.clone());
            Identification::new(
                RegulatorConfig::default(),
                self.clock.clone(),
                MockUi::default(),
                board,
            )
            .unwrap()
        }

        fn pump(&self, pulses: &FlowPulses) {
            if self.pumping {
                let interval = FlowConfig::default().interval_for_lpm(1.75).unwrap();
                let now = self.clock.micros();
                pulses.record_pulse(now - interval);
                pulses.record_pulse(now);
            }
        }
    }

    #[test]
    fn follows_schedule_and_finishes() {
        let rig = Rig::new();
        let pulses = FlowPulses::new();
        let buffer = TelemetryBuffer::new();
        let mut ident = rig.ident(&pulses).with_telemetry(buffer.clone());

        assert_eq!(ident.tick(), IdentState::AwaitPumpConfirm);
        ident.ui_mut().keys = 2;
        ident.tick();
        assert_eq!(ident.tick(), IdentState::Stepping);
        assert_eq!(ident.ui().ident_screens, 1);

        let mut heater_on_ms = [0_u64; 3];
        for _ in 0..18_000 {
            rig.clock.advance_ms(100);
            rig.pump(&pulses);
            if ident.tick() == IdentState::Stepping && rig.heater.high() {
                let phase = (ident.status().elapsed_s / 600).min(2) as usize;
                heater_on_ms[phase] += 100;
            }
        }
        // Heating time per 10 minute phase: half, all, none.
        assert!((heater_on_ms[0] as i64 - 300_000).abs() <= 10_000);
        assert!(heater_on_ms[1] >= 599_000);
        assert_eq!(heater_on_ms[2], 0);

        assert_eq!(ident.state(), IdentState::Finished);
        assert!(!rig.heater.high());
        assert!(rig.buzzer.high());
        assert_eq!(ident.ui().finished, 1);

        let records = buffer.records();
        assert!((1_790..=1_800).contains(&records.len()), "{}", records.len());
        assert_eq!(records[0].duty, 2_500);
        assert!(records.iter().any(|r| r.duty == 5_000));
        assert_eq!(records.last().map(|r| r.duty), Some(0));
        assert!((1_799..=1_800).contains(&records[0].remaining_s));
        assert!(records.windows(2).all(|w| w[1].remaining_s <= w[0].remaining_s));
        assert!(records.last().is_some_and(|r| r.remaining_s <= 1));

        ident.ui_mut().keys = 1;
        assert_eq!(ident.tick(), IdentState::Idle);
        assert!(!rig.buzzer.high());
    }

    #[test]
    fn faults_force_zero_duty() {
        let mut rig = Rig::new();
        rig.pumping = false;
        let pulses = FlowPulses::new();
        let mut ident = rig.ident(&pulses);
        ident.tick();
        ident.ui_mut().keys = 2;
        ident.tick();
        ident.tick();

        for _ in 0..50 {
            rig.clock.advance_ms(100);
            ident.tick();
            assert!(!rig.heater.high());
        }
        assert_eq!(ident.status().duty_percent, 0);
        assert!(ident.status().faults.critical_flow);
        assert_eq!(ident.ui().errors.last(), Some(&Fault::CriticalFlow));

        rig.pumping = true;
        rig.pump(&pulses);
        ident.tick();
        assert_eq!(ident.status().duty_percent, 50);
        assert!(ident.status().faults.is_clear());

        ident.cancel();
        assert_eq!(ident.state(), IdentState::Idle);
        assert!(!rig.heater.high());
    }
}
