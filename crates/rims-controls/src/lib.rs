//! Control primitives for the RIMS regulator.
//!
//! This crate holds the pieces of the loop that do not touch hardware:
//! first-order filters, the sampled PID controller with its set-point and
//! output filters, the tuning profile registry and the pausable session timer.
//!
//! # Architecture
//!
//! - Controllers run in sampled/digital mode at a fixed period; between samples
//!   the last output is held (zero-order hold)
//! - All times are integer milliseconds from a monotonic [`rims_core::Clock`]
//! - Nothing here returns an error once constructed; bad filter constants
//!   degrade to identity filters and invalid profile selections fall back to
//!   the first profile

pub mod error;
pub mod filter;
pub mod pid;
pub mod profile;
pub mod sampled;
pub mod timer;

pub use error::{ControlError, ControlResult};
pub use filter::ExponentialFilter;
pub use pid::{AntiWindup, FilteredPid, Mode};
pub use profile::{MAX_PROFILES, ProfileSet, TuningProfile};
pub use sampled::{SampleClock, SampleConfig};
pub use timer::PausableTimer;
