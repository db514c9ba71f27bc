//! Operator interface boundary.
//!
//! The regulator only calls these methods; drawing, key debouncing and menu
//! navigation belong to the implementation.

use crate::interlock::Fault;
use rims_controls::TuningProfile;
use rims_io::FlowLevel;

/// Display and keypad used by [`Regulator`](crate::Regulator).
///
/// The `ask_*` methods may block until the operator answers; they are only
/// called while the regulator is idle. Everything else must return at once.
pub trait RegulatorUi {
    /// Set point for the session (°C). Answers are clamped by the regulator.
    fn ask_set_point(&mut self, default_c: f64) -> f64;

    /// Session duration in seconds.
    fn ask_duration(&mut self, default_s: u32) -> u32;

    /// Index into `candidates`. Only asked when more than one profile exists.
    fn ask_profile_selection(&mut self, candidates: &[TuningProfile]) -> usize;

    /// `true` once per press of the confirm key. Non-blocking.
    fn poll_key(&mut self) -> bool;

    /// Ask the operator to start the pump and confirm.
    fn show_pump_warning(&mut self);

    /// Ask the operator to switch heater power on and confirm.
    fn show_heater_warning(&mut self);

    fn display_set_point(&mut self, set_point_c: f64);

    fn display_process_value(&mut self, process_value_c: f64);

    fn display_remaining_time(&mut self, remaining_s: u64);

    fn display_flow(&mut self, flow_lpm: f64, level: FlowLevel);

    fn display_error(&mut self, fault: Fault);

    fn display_finished(&mut self);
}

/// Extra screens used by [`Identification`](crate::Identification).
pub trait IdentUi: RegulatorUi {
    fn show_ident_screen(&mut self);

    /// Current open-loop duty in percent of the window.
    fn display_duty(&mut self, percent: u8);
}

impl<T: RegulatorUi + ?Sized> RegulatorUi for &mut T {
    fn ask_set_point(&mut self, default_c: f64) -> f64 {
        (**self).ask_set_point(default_c)
    }

    fn ask_duration(&mut self, default_s: u32) -> u32 {
        (**self).ask_duration(default_s)
    }

    fn ask_profile_selection(&mut self, candidates: &[TuningProfile]) -> usize {
        (**self).ask_profile_selection(candidates)
    }

    fn poll_key(&mut self) -> bool {
        (**self).poll_key()
    }

    fn show_pump_warning(&mut self) {
        (**self).show_pump_warning()
    }

    fn show_heater_warning(&mut self) {
        (**self).show_heater_warning()
    }

    fn display_set_point(&mut self, set_point_c: f64) {
        (**self).display_set_point(set_point_c)
    }

    fn display_process_value(&mut self, process_value_c: f64) {
        (**self).display_process_value(process_value_c)
    }

    fn display_remaining_time(&mut self, remaining_s: u64) {
        (**self).display_remaining_time(remaining_s)
    }

    fn display_flow(&mut self, flow_lpm: f64, level: FlowLevel) {
        (**self).display_flow(flow_lpm, level)
    }

    fn display_error(&mut self, fault: Fault) {
        (**self).display_error(fault)
    }

    fn display_finished(&mut self) {
        (**self).display_finished()
    }
}

impl<T: IdentUi + ?Sized> IdentUi for &mut T {
    fn show_ident_screen(&mut self) {
        (**self).show_ident_screen()
    }

    fn display_duty(&mut self, percent: u8) {
        (**self).display_duty(percent)
    }
}
