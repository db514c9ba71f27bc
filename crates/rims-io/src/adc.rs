//! Analog input abstraction.

use core::fmt::Debug;

/// A single-channel analog-to-digital converter.
pub trait AnalogInput {
    type Error: Debug;

    /// Read one raw sample (`0..=adc_max`).
    fn read(&mut self) -> Result<u16, Self::Error>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    type Error = T::Error;

    fn read(&mut self) -> Result<u16, Self::Error> {
        (**self).read()
    }
}
