//! Closed-loop duty law for the ACTIVE state.

use crate::acquisition::AnalogMeasurements;
use crate::config::ControlConfig;

use super::Direction;

/// Computes the phase duty for the given power-flow direction.
///
/// BUCK regulates on `pack / bus`, BOOST on `bus / pack`. The ratio is held
/// inside the configured active window. When the denominator is below the
/// configured floor the division is skipped and the upper bound, the value
/// the ratio saturates to as the denominator approaches zero, is returned.
#[must_use]
pub fn active_duty(
    direction: Direction,
    measurements: &AnalogMeasurements,
    config: &ControlConfig,
) -> f32 {
    let (numerator, denominator) = match direction {
        Direction::Buck => (measurements.pack_voltage, measurements.bus_voltage),
        Direction::Boost => (measurements.bus_voltage, measurements.pack_voltage),
    };

    if denominator.is_nan() || denominator < config.denominator_floor {
        return config.max_active_duty;
    }

    let ratio = numerator / denominator;
    if ratio.is_nan() {
        return config.max_active_duty;
    }

    ratio.max(config.min_active_duty).min(config.max_active_duty)
}
