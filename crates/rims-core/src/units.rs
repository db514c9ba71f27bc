// rims-core/src/units.rs

use uom::si::f64::ThermodynamicTemperature as UomThermodynamicTemperature;
use uom::si::thermodynamic_temperature::{degree_celsius, degree_fahrenheit, kelvin};

pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn k(v: f64) -> Temperature {
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn degc(v: f64) -> Temperature {
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn to_celsius(t: Temperature) -> f64 {
    t.get::<degree_celsius>()
}

#[inline]
pub fn to_fahrenheit(t: Temperature) -> f64 {
    t.get::<degree_fahrenheit>()
}

/// Working unit of the regulator is °C; the display also shows °F.
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    to_fahrenheit(degc(celsius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kelvin_to_celsius() {
        assert!((to_celsius(k(273.15)) - 0.0).abs() < 1e-9);
        assert!((to_celsius(k(341.15)) - 68.0).abs() < 1e-9);
    }

    #[test]
    fn fahrenheit_reference_points() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(68.0) - 154.4).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn celsius_roundtrips_through_kelvin(c in -50.0_f64..150.0) {
            prop_assert!((to_celsius(degc(c)) - c).abs() < 1e-9);
            prop_assert!((celsius_to_fahrenheit(c) - (c * 1.8 + 32.0)).abs() < 1e-9);
        }
    }
}
