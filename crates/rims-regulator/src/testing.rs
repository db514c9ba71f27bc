//! Test doubles shared by the state machine tests.

use crate::interlock::Fault;
use crate::ui::{IdentUi, RegulatorUi};
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use rims_controls::TuningProfile;
use rims_io::{AnalogInput, FlowLevel, ThermistorCalibration, raw_for_celsius};
use std::cell::Cell;
use std::rc::Rc;

/// ADC whose clones share one raw value.
#[derive(Clone, Default)]
pub struct SharedAdc(pub Rc<Cell<u16>>);

impl SharedAdc {
    pub fn set_celsius(&self, celsius: f64) {
        self.0
            .set(raw_for_celsius(celsius, &ThermistorCalibration::default()));
    }
}

impl AnalogInput for SharedAdc {
    type Error = Infallible;

    fn read(&mut self) -> Result<u16, Infallible> {
        Ok(self.0.get())
    }
}

/// Pin whose clones share one level. Works as input and output.
#[derive(Clone, Default)]
pub struct SharedPin(pub Rc<Cell<bool>>);

impl SharedPin {
    pub fn high(&self) -> bool {
        self.0.get()
    }
}

impl ErrorType for SharedPin {
    type Error = Infallible;
}

impl OutputPin for SharedPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

impl InputPin for SharedPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

/// Operator stand-in with canned answers and a key-press counter.
#[derive(Default)]
pub struct MockUi {
    pub set_point: f64,
    pub duration_s: u32,
    pub selection: usize,
    pub selection_asked: bool,
    pub keys: usize,
    pub errors: Vec<Fault>,
    pub finished: usize,
    pub ident_screens: usize,
    pub last_pv: Option<f64>,
    pub last_duty: Option<u8>,
    pub last_remaining_s: Option<u64>,
    pub last_flow: Option<(f64, FlowLevel)>,
}

impl MockUi {
    pub fn answering(set_point: f64, duration_s: u32) -> Self {
        Self {
            set_point,
            duration_s,
            ..Self::default()
        }
    }
}

impl RegulatorUi for MockUi {
    fn ask_set_point(&mut self, _default_c: f64) -> f64 {
        self.set_point
    }

    fn ask_duration(&mut self, _default_s: u32) -> u32 {
        self.duration_s
    }

    fn ask_profile_selection(&mut self, _candidates: &[TuningProfile]) -> usize {
        self.selection_asked = true;
        self.selection
    }

    fn poll_key(&mut self) -> bool {
        if self.keys > 0 {
            self.keys -= 1;
            true
        } else {
            false
        }
    }

    fn show_pump_warning(&mut self) {}

    fn show_heater_warning(&mut self) {}

    fn display_set_point(&mut self, _set_point_c: f64) {}

    fn display_process_value(&mut self, process_value_c: f64) {
        self.last_pv = Some(process_value_c);
    }

    fn display_remaining_time(&mut self, remaining_s: u64) {
        self.last_remaining_s = Some(remaining_s);
    }

    fn display_flow(&mut self, flow_lpm: f64, level: FlowLevel) {
        self.last_flow = Some((flow_lpm, level));
    }

    fn display_error(&mut self, fault: Fault) {
        self.errors.push(fault);
    }

    fn display_finished(&mut self) {
        self.finished += 1;
    }
}

impl IdentUi for MockUi {
    fn show_ident_screen(&mut self) {
        self.ident_screens += 1;
    }

    fn display_duty(&mut self, percent: u8) {
        self.last_duty = Some(percent);
    }
}
