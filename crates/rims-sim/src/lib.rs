//! rims-sim: host-side simulation of a RIMS.
//!
//! A lumped thermal model of the mash stands in for the vessel, simulated
//! pins and ADC stand in for the board, and a scripted operator answers the
//! regulator's questions. The runners step everything on a [`ManualClock`]
//! so hours of brewing run in milliseconds and deterministically.
//!
//! [`ManualClock`]: rims_core::ManualClock

pub mod board;
pub mod error;
pub mod integrator;
pub mod model;
pub mod plant;
pub mod run;
pub mod scenario;
pub mod ui;

pub use board::{Pump, SimAdc, SimPin};
pub use error::{SimError, SimResult};
pub use integrator::{Integrator, RK4};
pub use model::TransientModel;
pub use plant::{MashPlant, PlantParams};
pub use run::{IdentReport, SessionReport, SimProgress, run_identification, run_session};
pub use scenario::{Scenario, SimEvent, SimEventKind, load_scenario};
pub use ui::{ScriptedUi, UiLog};
