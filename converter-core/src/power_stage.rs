//! Duty-to-tick conversion and output gating for the two-leg power stage.

use crate::hal::{Leg, LegTicks, PwmTimer};

/// Clamps a duty command into [0, 1]; NaN collapses to 0.
#[must_use]
pub fn clamp_fraction(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Converts a duty fraction into a compare value that never exceeds `period`.
///
/// The fraction is scaled by `period + 1` and truncated, so a duty of 1.0
/// lands exactly on `period` after the final clamp.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn duty_to_ticks(duty: f32, period: u16) -> u16 {
    let scaled = clamp_fraction(duty) * (f32::from(period) + 1.0);
    let ticks = scaled as u32;
    if ticks > u32::from(period) {
        period
    } else {
        ticks as u16
    }
}

/// Outcome of an [`PowerStage::enable_outputs`] request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnableResult {
    /// Outputs changed state and the timer was written.
    Changed,
    /// Requested state already in effect; nothing written.
    Unchanged,
    /// Enable refused because the hardware brake is latched.
    RefusedBrake,
}

/// Owns the switching timer and tracks whether its outputs are enabled.
pub struct PowerStage<T> {
    timer: T,
    outputs_enabled: bool,
    last_ticks: [LegTicks; 2],
}

impl<T> PowerStage<T>
where
    T: PwmTimer,
{
    /// Takes ownership of the timer and forces its outputs off.
    pub fn new(mut timer: T) -> Self {
        timer.set_outputs_enabled(false);
        Self {
            timer,
            outputs_enabled: false,
            last_ticks: [LegTicks::default(); 2],
        }
    }

    /// Writes both legs from fractional duty commands.
    pub fn apply_duty(&mut self, duty_a: f32, duty_b: f32) {
        let period = self.timer.period();
        for (leg, duty) in [(Leg::A, duty_a), (Leg::B, duty_b)] {
            let ticks = LegTicks::new(duty_to_ticks(duty, period), period);
            self.timer.write_leg(leg, ticks);
            self.last_ticks[leg.as_index()] = ticks;
        }
    }

    /// Enables or disables the switching outputs.
    ///
    /// Enabling is refused while the brake latch is asserted. Requests that
    /// match the current state do not touch the timer.
    pub fn enable_outputs(&mut self, enable: bool) -> EnableResult {
        if enable && self.timer.brake_latched() {
            return EnableResult::RefusedBrake;
        }
        if enable == self.outputs_enabled {
            return EnableResult::Unchanged;
        }

        self.timer.set_outputs_enabled(enable);
        self.outputs_enabled = enable;
        EnableResult::Changed
    }

    /// Samples the hardware brake latch.
    #[must_use]
    pub fn brake_latched(&self) -> bool {
        self.timer.brake_latched()
    }

    #[must_use]
    pub fn outputs_enabled(&self) -> bool {
        self.outputs_enabled
    }

    /// Compare values written by the last [`apply_duty`](Self::apply_duty).
    #[must_use]
    pub fn last_ticks(&self, leg: Leg) -> LegTicks {
        self.last_ticks[leg.as_index()]
    }

    #[must_use]
    pub fn period(&self) -> u16 {
        self.timer.period()
    }

    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_duty_lands_on_period() {
        assert_eq!(duty_to_ticks(1.0, 1_599), 1_599);
        assert_eq!(duty_to_ticks(0.0, 1_599), 0);
        assert_eq!(duty_to_ticks(0.5, 1_599), 800);
    }

    #[test]
    fn out_of_range_duty_is_clamped() {
        assert_eq!(duty_to_ticks(4.2, 1_000), 1_000);
        assert_eq!(duty_to_ticks(-0.3, 1_000), 0);
        assert_eq!(duty_to_ticks(f32::NAN, 1_000), 0);
        assert_eq!(duty_to_ticks(f32::INFINITY, 1_000), 1_000);
    }

    #[test]
    fn ticks_never_exceed_period_across_sweep() {
        for period in [0_u16, 1, 99, 1_599, u16::MAX] {
            for step in 0..=1_000_u16 {
                let duty = f32::from(step) / 1_000.0;
                assert!(duty_to_ticks(duty, period) <= period);
            }
        }
    }
}
