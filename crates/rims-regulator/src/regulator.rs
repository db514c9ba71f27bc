//! Regulation state machine.
//!
//! ```text
//! Idle -> AwaitPumpConfirm -> AwaitHeaterConfirm -> Running -> Elapsed -> Idle
//! ```
//!
//! [`Regulator::tick`] does one step and returns; call it in a tight loop.
//! Only the `ask_*` questions in `Idle` may block.
//!
//! While running, every tick samples the thermistor and the flow meter,
//! checks the interlocks, runs the PID when a sample is due, and refreshes
//! the SSR window and the session timer. Any interlock switches the PID to
//! manual (zero output); once all clear it returns to automatic without a
//! bump. Faults never end the session.

use crate::board::{Blinker, Board, Peripherals};
use crate::config::RegulatorConfig;
use crate::error::RegulatorResult;
use crate::interlock::Faults;
use crate::telemetry::{TelemetryRecord, TelemetrySink};
use crate::ui::RegulatorUi;
use embedded_hal::digital::{InputPin, OutputPin};
use rims_controls::{FilteredPid, Mode, PausableTimer};
use rims_core::Clock;
use rims_io::{AnalogInput, NoPin};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegulatorState {
    /// No session. The next tick asks the operator for one.
    Idle,
    /// Waiting for the operator to confirm the pump runs.
    AwaitPumpConfirm,
    /// Waiting for the operator to confirm heater power is on.
    AwaitHeaterConfirm,
    Running,
    /// Session time reached; alarm on until acknowledged.
    Elapsed,
}

/// Values of the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    /// Operator set point (°C).
    pub set_point: f64,
    /// Set point after the ramp filter (°C).
    pub filtered_set_point: f64,
    /// Last valid temperature (°C).
    pub process_value: Option<f64>,
    /// Duty in window units (ms).
    pub duty: f64,
    pub flow_lpm: f64,
    pub running: bool,
    pub initialized: bool,
    pub profile_index: usize,
    pub started_ms: u64,
}

/// Snapshot for displays and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegulatorStatus {
    pub state: RegulatorState,
    pub set_point: f64,
    pub filtered_set_point: f64,
    /// Current temperature, `None` while the sensor is faulted.
    pub process_value: Option<f64>,
    pub duty: f64,
    pub heater_on: bool,
    pub remaining_s: u64,
    pub running_s: u64,
    pub flow_lpm: f64,
    pub faults: Faults,
    pub awaiting_acknowledgement: bool,
    pub profile_index: usize,
    pub mode: Mode,
}

/// Mash temperature regulator.
pub struct Regulator<'f, C, U, A, H, L, P = NoPin, B = NoPin> {
    config: RegulatorConfig,
    clock: C,
    ui: U,
    io: Peripherals<'f, A, H, L, P, B>,
    pid: FilteredPid,
    timer: PausableTimer,
    telemetry: Option<Box<dyn TelemetrySink>>,
    state: RegulatorState,
    session: Session,
    faults: Faults,
    blinker: Option<Blinker>,
}

impl<'f, C, U, A, H, L, P, B> Regulator<'f, C, U, A, H, L, P, B>
where
    C: Clock,
    U: RegulatorUi,
    A: AnalogInput,
    H: OutputPin,
    L: OutputPin,
    P: InputPin,
    B: OutputPin,
{
    /// Validate `config` and take ownership of the hardware.
    ///
    /// The heater is switched off before this returns.
    pub fn new(
        config: RegulatorConfig,
        clock: C,
        ui: U,
        board: Board<'f, A, H, L, P, B>,
    ) -> RegulatorResult<Self> {
        config.validate()?;
        let now_ms = clock.millis();
        let (_, profile) = config.profiles.select(0);
        let pid = FilteredPid::new(
            profile,
            config.sample()?,
            0.0,
            config.window_ms as f64,
            now_ms,
        )?;
        let io = Peripherals::build(board, &config, now_ms)?;
        let timer = PausableTimer::new(
            u64::from(config.default_duration_s) * 1_000,
            config.tolerance_c,
        );
        info!(
            window_ms = config.window_ms,
            sample_period_ms = config.sample_period_ms,
            profiles = config.profiles.len(),
            "regulator ready"
        );
        Ok(Self {
            config,
            clock,
            ui,
            io,
            pid,
            timer,
            telemetry: None,
            state: RegulatorState::Idle,
            session: Session::default(),
            faults: Faults::default(),
            blinker: None,
        })
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self
    }

    /// Advance the state machine by one step.
    pub fn tick(&mut self) -> RegulatorState {
        let now_ms = self.clock.millis();
        match self.state {
            RegulatorState::Idle => self.initialize(),
            RegulatorState::AwaitPumpConfirm => {
                let (flow_lpm, level) = self.io.poll_flow(self.clock.micros());
                self.session.flow_lpm = flow_lpm;
                self.ui.display_flow(flow_lpm, level);
                if self.ui.poll_key() {
                    debug!(flow_lpm, "pump confirmed");
                    self.ui.show_heater_warning();
                    self.state = RegulatorState::AwaitHeaterConfirm;
                }
            }
            RegulatorState::AwaitHeaterConfirm => {
                if self.ui.poll_key() {
                    self.arm(now_ms);
                }
            }
            RegulatorState::Running => self.iterate(now_ms),
            RegulatorState::Elapsed => self.finished(now_ms),
        }
        self.state
    }

    /// Abort any session: heater off, back to `Idle`.
    pub fn cancel(&mut self) {
        if self.state != RegulatorState::Idle {
            info!(state = ?self.state, "session cancelled");
        }
        self.reset_session();
    }

    pub fn status(&self) -> RegulatorStatus {
        RegulatorStatus {
            state: self.state,
            set_point: self.session.set_point,
            filtered_set_point: self.session.filtered_set_point,
            process_value: self.io.thermistor.temperature(),
            duty: self.session.duty,
            heater_on: self.io.ssr.is_asserted(),
            remaining_s: self.timer.remaining_ms() / 1_000,
            running_s: self.timer.running_ms() / 1_000,
            flow_lpm: self.session.flow_lpm,
            faults: self.faults,
            awaiting_acknowledgement: self.state == RegulatorState::Elapsed,
            profile_index: self.session.profile_index,
            mode: self.pid.mode(),
        }
    }

    pub fn state(&self) -> RegulatorState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn faults(&self) -> Faults {
        self.faults
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    pub fn pid(&self) -> &FilteredPid {
        &self.pid
    }

    pub fn timer(&self) -> &PausableTimer {
        &self.timer
    }

    pub fn alarm_sounding(&self) -> bool {
        self.io.alarm_sounding()
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn initialize(&mut self) {
        self.io.ssr.force_off();
        let set_point = self
            .config
            .clamp_set_point(self.ui.ask_set_point(self.config.default_set_point_c));
        let duration_s = self
            .config
            .clamp_duration(self.ui.ask_duration(self.config.default_duration_s));
        let requested = if self.config.profiles.needs_selection() {
            self.ui
                .ask_profile_selection(self.config.profiles.as_slice())
        } else {
            0
        };
        let (profile_index, profile) = self.config.profiles.select(requested);
        info!(set_point, duration_s, profile = %profile.name, "session configured");

        if let Err(err) = self.pid.set_profile(profile) {
            warn!(%err, "profile rejected, keeping previous tuning");
        }
        self.pid.set_mode(Mode::Manual, set_point);
        self.timer = PausableTimer::new(u64::from(duration_s) * 1_000, self.config.tolerance_c);
        self.faults = Faults::default();
        self.session = Session {
            set_point,
            filtered_set_point: set_point,
            initialized: true,
            profile_index,
            ..Session::default()
        };

        self.ui.display_set_point(set_point);
        self.ui.show_pump_warning();
        self.state = RegulatorState::AwaitPumpConfirm;
    }

    fn arm(&mut self, now_ms: u64) {
        let reading = self.io.thermistor.sample();
        self.session.process_value = reading.celsius();
        // The set-point ramp starts from the liquid's temperature.
        let start_pv = reading.celsius().unwrap_or(self.session.set_point);
        self.pid.start(now_ms, start_pv);
        self.pid.set_mode(Mode::Automatic, start_pv);
        self.io.ssr.restart(now_ms);
        self.timer.start(now_ms);
        self.session.running = true;
        self.session.started_ms = now_ms;
        info!(
            set_point = self.session.set_point,
            process_value = start_pv,
            "regulation started"
        );
        self.state = RegulatorState::Running;
    }

    fn iterate(&mut self, now_ms: u64) {
        let inputs = self.io.poll(self.clock.micros());
        let current_pv = inputs.reading.celsius();
        if current_pv.is_some() {
            self.session.process_value = current_pv;
        }
        self.session.flow_lpm = inputs.flow_lpm;
        self.apply_interlocks(inputs.faults);

        let set_point = self.session.set_point;
        let sampled = match self.session.process_value {
            Some(pv) => self.pid.compute(now_ms, set_point, pv),
            None => false,
        };
        self.session.duty = self.pid.output();
        if let Some(filtered) = self.pid.filtered_set_point() {
            self.session.filtered_set_point = filtered;
        }
        self.io.ssr.set_duty(self.session.duty);
        self.io.ssr.refresh(now_ms);

        match current_pv {
            Some(pv) if !inputs.faults.pauses_timer() => {
                self.timer
                    .refresh(now_ms, set_point, pv, self.config.verify_temperature);
            }
            _ => self.timer.pause(now_ms),
        }

        if let Some(fault) = inputs.faults.first() {
            self.ui.display_error(fault);
        }
        if let Some(pv) = current_pv {
            self.ui.display_process_value(pv);
        }
        self.ui.display_remaining_time(self.timer.remaining_ms() / 1_000);
        self.ui.display_flow(inputs.flow_lpm, inputs.flow_level);

        if sampled {
            self.emit_telemetry(now_ms);
        }
        if self.timer.is_elapsed() {
            self.enter_elapsed(now_ms);
        }
    }

    fn apply_interlocks(&mut self, faults: Faults) {
        faults.log_changes(&self.faults);
        let pv = self.session.process_value.unwrap_or(self.session.set_point);
        match (faults.is_clear(), self.pid.mode()) {
            (false, Mode::Automatic) => self.pid.set_mode(Mode::Manual, pv),
            (true, Mode::Manual) => self.pid.set_mode(Mode::Automatic, pv),
            _ => {}
        }
        self.faults = faults;
    }

    fn emit_telemetry(&mut self, now_ms: u64) {
        let Some(sink) = self.telemetry.as_mut() else {
            return;
        };
        let record = TelemetryRecord::new(
            now_ms.saturating_sub(self.session.started_ms),
            self.session.duty.round() as u64,
            self.session.process_value.unwrap_or(f64::NAN),
            self.session.flow_lpm,
            self.timer.remaining_ms() / 1_000,
        );
        sink.record(&record);
    }

    fn enter_elapsed(&mut self, now_ms: u64) {
        let pv = self.session.process_value.unwrap_or(self.session.set_point);
        self.pid.set_mode(Mode::Manual, pv);
        self.session.duty = 0.0;
        self.session.running = false;
        self.io.ssr.force_off();
        self.blinker = Some(Blinker::new(self.config.blink_period_ms, now_ms));
        self.io.set_alarm(true);
        self.io.set_indicator(true);
        self.ui.display_finished();
        info!(
            running_s = self.timer.running_ms() / 1_000,
            wall_s = now_ms.saturating_sub(self.session.started_ms) / 1_000,
            "session elapsed"
        );
        self.state = RegulatorState::Elapsed;
    }

    fn finished(&mut self, now_ms: u64) {
        if self.ui.poll_key() {
            info!("end of session acknowledged");
            self.reset_session();
            return;
        }
        if let Some(level) = self.blinker.as_mut().and_then(|b| b.refresh(now_ms)) {
            self.io.set_alarm(level);
            self.io.set_indicator(level);
        }
    }

    fn reset_session(&mut self) {
        let pv = self.session.process_value.unwrap_or(self.session.set_point);
        self.pid.set_mode(Mode::Manual, pv);
        self.io.ssr.force_off();
        self.io.set_alarm(false);
        self.blinker = None;
        self.timer.reset();
        self.session = Session::default();
        self.faults = Faults::default();
        self.state = RegulatorState::Idle;
    }
}
