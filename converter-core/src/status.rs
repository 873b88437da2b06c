//! Shared status surface.
//!
//! The firmware and emulator both render converter state through
//! [`StatusFormatter`] so diagnostics read the same on every front-end.

use core::fmt;

use crate::control::{ControlContext, ControlState, Direction};
use crate::fault::BoardStatus;

/// Point-in-time view of the converter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub state: ControlState,
    pub direction: Direction,
    pub duty_a: f32,
    pub duty_b: f32,
    pub pack_voltage: f32,
    pub bus_voltage: f32,
    /// Highest thermal fraction across all sensors.
    pub hottest: f32,
    pub status: BoardStatus,
    pub outputs_enabled: bool,
    pub stale_reads: u32,
}

impl StatusSnapshot {
    /// Builds a snapshot before any cycle has run.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            state: ControlState::Idle,
            direction: Direction::Buck,
            duty_a: 0.0,
            duty_b: 0.0,
            pack_voltage: 0.0,
            bus_voltage: 0.0,
            hottest: 0.0,
            status: BoardStatus::healthy(),
            outputs_enabled: false,
            stale_reads: 0,
        }
    }

    /// Captures the controller context plus the power-stage gating state.
    #[must_use]
    pub fn capture(context: &ControlContext, outputs_enabled: bool, stale_reads: u32) -> Self {
        Self {
            state: context.state,
            direction: context.direction,
            duty_a: context.duty_a,
            duty_b: context.duty_b,
            pack_voltage: context.measurements.pack_voltage,
            bus_voltage: context.measurements.bus_voltage,
            hottest: context.measurements.hottest(),
            status: context.status,
            outputs_enabled,
            stale_reads,
        }
    }
}

/// Renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the state line (e.g. `state active direction=buck duty=0.500/0.500 outputs=on`).
    pub fn write_state_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "state {} direction={} duty={:.3}/{:.3} outputs={}",
            snapshot.state,
            snapshot.direction,
            snapshot.duty_a,
            snapshot.duty_b,
            if snapshot.outputs_enabled { "on" } else { "off" }
        )
    }

    /// Writes the analog line (e.g. `analog pack=0.800 bus=0.400 hottest=0.310 stale=0`).
    pub fn write_analog_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "analog pack={:.3} bus={:.3} hottest={:.3} stale={}",
            snapshot.pack_voltage, snapshot.bus_voltage, snapshot.hottest, snapshot.stale_reads
        )
    }

    /// Writes the fault line (e.g. `faults brake=clear temp=tripped comms=ok`).
    pub fn write_faults_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let status = self.snapshot.status;
        writer.write_str("faults brake=")?;
        writer.write_str(if status.brake_latched {
            "latched"
        } else {
            "clear"
        })?;

        writer.write_str(" temp=")?;
        writer.write_str(if status.over_temperature {
            "tripped"
        } else {
            "clear"
        })?;

        writer.write_str(" comms=")?;
        writer.write_str(if status.comms_lost { "lost" } else { "ok" })?;

        Ok(())
    }

    /// Writes all three lines, each terminated by a newline.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_state_line(writer)?;
        writer.write_char('\n')?;
        self.write_analog_line(writer)?;
        writer.write_char('\n')?;
        self.write_faults_line(writer)?;
        writer.write_char('\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AnalogMeasurements;
    use heapless::String;

    #[test]
    fn unknown_snapshot_renders_idle() {
        let snapshot = StatusSnapshot::unknown();
        let formatter = StatusFormatter::new(&snapshot);

        let mut line: String<96> = String::new();
        formatter.write_state_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "state idle direction=buck duty=0.000/0.000 outputs=off"
        );
    }

    #[test]
    fn captured_snapshot_reports_measurements_and_faults() {
        let mut measurements = AnalogMeasurements::with_rails(0.8, 0.4);
        measurements.thermals = [0.1, 0.97, 0.2, 0.3];

        let mut context = ControlContext::in_state(ControlState::Fault, 0.0);
        context.direction = Direction::Boost;
        context.measurements = measurements;
        context.status = BoardStatus {
            brake_latched: false,
            over_temperature: true,
            comms_lost: true,
        };

        let snapshot = StatusSnapshot::capture(&context, false, 3);
        let formatter = StatusFormatter::new(&snapshot);

        let mut analog: String<96> = String::new();
        formatter.write_analog_line(&mut analog).unwrap();
        assert_eq!(
            analog.as_str(),
            "analog pack=0.800 bus=0.400 hottest=0.970 stale=3"
        );

        let mut faults: String<96> = String::new();
        formatter.write_faults_line(&mut faults).unwrap();
        assert_eq!(faults.as_str(), "faults brake=clear temp=tripped comms=lost");
    }

    #[test]
    fn write_all_emits_three_lines() {
        let snapshot = StatusSnapshot::unknown();
        let mut out: String<256> = String::new();
        StatusFormatter::new(&snapshot).write_all(&mut out).unwrap();

        let mut lines = out.as_str().lines();
        assert!(lines.next().is_some_and(|line| line.starts_with("state ")));
        assert!(lines.next().is_some_and(|line| line.starts_with("analog ")));
        assert!(lines.next().is_some_and(|line| line.starts_with("faults ")));
        assert!(lines.next().is_none());
    }
}
