//! Consolidated safety verdict for one control cycle.

use crate::acquisition::AnalogMeasurements;
use crate::config::OVER_TEMPERATURE_THRESHOLD;

/// Fault flags recomputed as a whole every cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BoardStatus {
    /// Break flag latched by the external comparator chain.
    pub brake_latched: bool,
    pub over_temperature: bool,
    pub comms_lost: bool,
}

impl BoardStatus {
    /// Status with every flag clear.
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            brake_latched: false,
            over_temperature: false,
            comms_lost: false,
        }
    }

    /// Returns `true` when the state machine must shut the power stage down.
    ///
    /// Communication loss is reported but does not force a shutdown.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        self.brake_latched || self.over_temperature
    }

    /// Packs the flags into a bitfield (bit 0 brake, bit 1 temperature, bit 2 comms).
    #[must_use]
    pub const fn bits(&self) -> u8 {
        (self.brake_latched as u8)
            | ((self.over_temperature as u8) << 1)
            | ((self.comms_lost as u8) << 2)
    }

    /// Inverse of [`bits`](Self::bits); unknown bits are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            brake_latched: bits & 0b001 != 0,
            over_temperature: bits & 0b010 != 0,
            comms_lost: bits & 0b100 != 0,
        }
    }
}

/// Evaluates the brake latch, thermals and link state into a [`BoardStatus`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FaultMonitor {
    over_temperature_threshold: f32,
    last: BoardStatus,
}

impl FaultMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_threshold(OVER_TEMPERATURE_THRESHOLD)
    }

    /// Builds a monitor that trips when any thermal fraction exceeds `threshold`.
    #[must_use]
    pub const fn with_threshold(threshold: f32) -> Self {
        Self {
            over_temperature_threshold: threshold,
            last: BoardStatus::healthy(),
        }
    }

    /// Produces this cycle's verdict. Never fails.
    pub fn update_status(
        &mut self,
        brake_latched: bool,
        measurements: &AnalogMeasurements,
        comms_lost: bool,
    ) -> BoardStatus {
        let over_temperature = measurements
            .thermals
            .iter()
            .any(|reading| *reading > self.over_temperature_threshold);

        self.last = BoardStatus {
            brake_latched,
            over_temperature,
            comms_lost,
        };
        self.last
    }

    /// Verdict from the most recent [`update_status`](Self::update_status).
    #[must_use]
    pub const fn last(&self) -> BoardStatus {
        self.last
    }
}

impl Default for FaultMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_thermals(thermals: [f32; 4]) -> AnalogMeasurements {
        let mut snapshot = AnalogMeasurements::zeroed();
        snapshot.thermals = thermals;
        snapshot
    }

    #[test]
    fn threshold_is_strict() {
        let mut monitor = FaultMonitor::new();
        let at_limit = monitor.update_status(false, &with_thermals([0.95, 0.0, 0.0, 0.0]), false);
        assert!(!at_limit.over_temperature);

        let above = monitor.update_status(false, &with_thermals([0.0, 0.0, 0.0, 0.951]), false);
        assert!(above.over_temperature);
        assert!(above.is_fault());
    }

    #[test]
    fn comms_loss_alone_is_not_a_fault() {
        let mut monitor = FaultMonitor::new();
        let status = monitor.update_status(false, &AnalogMeasurements::zeroed(), true);
        assert!(status.comms_lost);
        assert!(!status.is_fault());
    }

    #[test]
    fn status_is_replaced_wholesale() {
        let mut monitor = FaultMonitor::new();
        monitor.update_status(true, &with_thermals([1.0; 4]), true);
        let cleared = monitor.update_status(false, &AnalogMeasurements::zeroed(), false);
        assert_eq!(cleared, BoardStatus::healthy());
        assert_eq!(monitor.last(), BoardStatus::healthy());
    }

    #[test]
    fn bits_round_trip_each_flag() {
        let status = BoardStatus {
            brake_latched: true,
            over_temperature: false,
            comms_lost: true,
        };
        assert_eq!(status.bits(), 0b101);
        assert_eq!(BoardStatus::from_bits(0b101), status);
    }
}
