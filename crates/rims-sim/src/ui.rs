//! Scripted operator.

use rims_controls::TuningProfile;
use rims_io::FlowLevel;
use rims_regulator::{Fault, IdentUi, RegulatorUi};
use serde::Serialize;
use tracing::debug;

/// What the operator was shown during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiLog {
    pub pump_warnings: usize,
    pub heater_warnings: usize,
    pub ident_screens: usize,
    pub finished: usize,
    /// Each fault once, in the order first shown.
    pub faults: Vec<Fault>,
    pub set_point_c: Option<f64>,
    pub process_value_c: Option<f64>,
    pub remaining_s: Option<u64>,
    pub flow: Option<(f64, FlowLevel)>,
    pub duty_percent: Option<u8>,
}

/// Operator with fixed answers and a queue of key presses.
#[derive(Debug, Clone)]
pub struct ScriptedUi {
    set_point_c: f64,
    duration_s: u32,
    profile: usize,
    pending_keys: usize,
    log: UiLog,
}

impl ScriptedUi {
    pub fn new(set_point_c: f64, duration_s: u32) -> Self {
        Self {
            set_point_c,
            duration_s,
            profile: 0,
            pending_keys: 0,
            log: UiLog::default(),
        }
    }

    pub fn with_profile(mut self, index: usize) -> Self {
        self.profile = index;
        self
    }

    pub fn with_keys(mut self, presses: usize) -> Self {
        self.pending_keys = presses;
        self
    }

    /// Queue one press of the confirm key.
    pub fn press_key(&mut self) {
        self.pending_keys += 1;
    }

    pub fn pending_keys(&self) -> usize {
        self.pending_keys
    }

    pub fn log(&self) -> &UiLog {
        &self.log
    }

    pub fn into_log(self) -> UiLog {
        self.log
    }
}

impl RegulatorUi for ScriptedUi {
    fn ask_set_point(&mut self, _default_c: f64) -> f64 {
        self.set_point_c
    }

    fn ask_duration(&mut self, _default_s: u32) -> u32 {
        self.duration_s
    }

    fn ask_profile_selection(&mut self, candidates: &[TuningProfile]) -> usize {
        debug!(
            choice = self.profile,
            candidates = candidates.len(),
            "profile selected"
        );
        self.profile
    }

    fn poll_key(&mut self) -> bool {
        if self.pending_keys == 0 {
            return false;
        }
        self.pending_keys -= 1;
        true
    }

    fn show_pump_warning(&mut self) {
        self.log.pump_warnings += 1;
    }

    fn show_heater_warning(&mut self) {
        self.log.heater_warnings += 1;
    }

    fn display_set_point(&mut self, set_point_c: f64) {
        self.log.set_point_c = Some(set_point_c);
    }

    fn display_process_value(&mut self, process_value_c: f64) {
        self.log.process_value_c = Some(process_value_c);
    }

    fn display_remaining_time(&mut self, remaining_s: u64) {
        self.log.remaining_s = Some(remaining_s);
    }

    fn display_flow(&mut self, flow_lpm: f64, level: FlowLevel) {
        self.log.flow = Some((flow_lpm, level));
    }

    fn display_error(&mut self, fault: Fault) {
        if !self.log.faults.contains(&fault) {
            debug!(%fault, "fault shown");
            self.log.faults.push(fault);
        }
    }

    fn display_finished(&mut self) {
        self.log.finished += 1;
    }
}

impl IdentUi for ScriptedUi {
    fn show_ident_screen(&mut self) {
        self.log.ident_screens += 1;
    }

    fn display_duty(&mut self, percent: u8) {
        self.log.duty_percent = Some(percent);
    }
}
