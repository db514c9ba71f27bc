//! rims-core: shared foundation for the RIMS regulation crates.
//!
//! - clock: millisecond/microsecond time sources
//! - units: uom temperature conversions
//! - numeric: float checks and the first-order lag coefficient

pub mod clock;
pub mod error;
pub mod numeric;
pub mod units;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RimsError, RimsResult};
pub use numeric::*;
pub use units::*;
