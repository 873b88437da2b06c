//! Firmware side of the control telemetry ring.
//!
//! Wraps the shared recorder with an Embassy timestamp and mirrors every new
//! record to defmt (or stdout on the host) for bring-up.

#![allow(dead_code)]

use core::time::Duration;

use converter_core::session::CycleReport;
use converter_core::telemetry::{
    self as core_telemetry, ControlEventKind, TelemetryInstant, TelemetryPayload,
};
use embassy_time::Instant;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = core_telemetry::TELEMETRY_RING_CAPACITY;

/// Embassy instant usable as a telemetry timestamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

pub type TelemetryRecord = core_telemetry::TelemetryRecord<FirmwareInstant>;

/// Control telemetry recorder that logs each record as it lands.
pub struct TelemetryRecorder {
    inner: core_telemetry::TelemetryRecorder<FirmwareInstant, TELEMETRY_RING_CAPACITY>,
}

impl TelemetryRecorder {
    pub const fn new() -> Self {
        Self {
            inner: core_telemetry::TelemetryRecorder::new(),
        }
    }

    /// Records the edges of one control cycle and logs them.
    pub fn record_cycle(&mut self, report: &CycleReport, timestamp: FirmwareInstant) -> usize {
        let written = self.inner.record_cycle(report, timestamp);
        let skip = self.inner.len().saturating_sub(written);
        for record in self.inner.oldest_first().skip(skip) {
            log_record(record);
        }
        written
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.inner.latest()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.inner.oldest_first()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn log_record(record: &TelemetryRecord) {
    let timestamp_us = record.timestamp.into_embassy().as_micros();
    let code = record.event.to_raw();
    match record.details {
        TelemetryPayload::Transition(details) => emit_transition(
            record.event,
            code,
            timestamp_us,
            details.duty_permille,
            details.dwell.map(duration_micros),
        ),
        TelemetryPayload::Fault(details) => {
            emit_fault(record.event, code, timestamp_us, details.status.bits());
        }
        TelemetryPayload::None => emit_event(record.event, code, timestamp_us),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_micros(value: Duration) -> u64 {
    value.as_micros() as u64
}

#[cfg(target_os = "none")]
fn emit_transition(
    event: ControlEventKind,
    code: u16,
    timestamp_us: u64,
    duty_permille: u16,
    dwell_us: Option<u64>,
) {
    if let Some(dwell) = dwell_us {
        defmt::info!(
            "telemetry:control {} code={=u16:#x} duty={}/1000 t={}us dwell={}us",
            defmt::Display2Format(&event),
            code,
            duty_permille,
            timestamp_us,
            dwell
        );
    } else {
        defmt::info!(
            "telemetry:control {} code={=u16:#x} duty={}/1000 t={}us",
            defmt::Display2Format(&event),
            code,
            duty_permille,
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_transition(
    event: ControlEventKind,
    code: u16,
    timestamp_us: u64,
    duty_permille: u16,
    dwell_us: Option<u64>,
) {
    if let Some(dwell) = dwell_us {
        println!(
            "telemetry:control {event} code={code:#x} duty={duty_permille}/1000 t={timestamp_us}us dwell={dwell}us"
        );
    } else {
        println!("telemetry:control {event} code={code:#x} duty={duty_permille}/1000 t={timestamp_us}us");
    }
}

#[cfg(target_os = "none")]
fn emit_fault(event: ControlEventKind, code: u16, timestamp_us: u64, bits: u8) {
    defmt::error!(
        "telemetry:control {} code={=u16:#x} status={=u8:#b} t={}us",
        defmt::Display2Format(&event),
        code,
        bits,
        timestamp_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_fault(event: ControlEventKind, code: u16, timestamp_us: u64, bits: u8) {
    println!("telemetry:control {event} code={code:#x} status={bits:#05b} t={timestamp_us}us");
}

#[cfg(target_os = "none")]
fn emit_event(event: ControlEventKind, code: u16, timestamp_us: u64) {
    defmt::info!(
        "telemetry:control {} code={=u16:#x} t={}us",
        defmt::Display2Format(&event),
        code,
        timestamp_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_event(event: ControlEventKind, code: u16, timestamp_us: u64) {
    println!("telemetry:control {event} code={code:#x} t={timestamp_us}us");
}

#[cfg(test)]
mod tests {
    use super::*;
    use converter_core::control::{ControlState, Direction, Transition};
    use converter_core::fault::BoardStatus;
    use converter_core::hal::LegTicks;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    fn report(state: ControlState, transition: Option<Transition>) -> CycleReport {
        CycleReport {
            state,
            transition,
            direction: Direction::Buck,
            direction_changed: false,
            fresh: true,
            status: BoardStatus::healthy(),
            duty_a: 0.01,
            duty_b: 0.01,
            ticks: [LegTicks::default(); 2],
            outputs_enabled: false,
            enable_result: None,
        }
    }

    #[test]
    fn duration_between_firmware_instants_saturates() {
        let earlier = micros(100);
        let later = micros(350);
        assert_eq!(later.saturating_duration_since(earlier).as_micros(), 250);
        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn steady_cycles_leave_the_ring_untouched() {
        let mut recorder = TelemetryRecorder::new();
        let idle = report(ControlState::Idle, None);

        assert_eq!(recorder.record_cycle(&idle, micros(10)), 0);
        assert_eq!(recorder.record_cycle(&idle, micros(20)), 0);
        assert!(recorder.is_empty());
    }

    #[test]
    fn transitions_are_recorded_with_firmware_timestamps() {
        let mut recorder = TelemetryRecorder::new();
        let entered = report(
            ControlState::Precharge,
            Some(Transition {
                from: ControlState::Idle,
                to: ControlState::Precharge,
            }),
        );

        assert_eq!(recorder.record_cycle(&entered, micros(500)), 1);
        let latest = recorder.latest().copied().expect("transition record");
        assert_eq!(
            latest.event,
            ControlEventKind::StateEntered(ControlState::Precharge)
        );
        assert_eq!(latest.timestamp, micros(500));
        assert_eq!(recorder.len(), 1);
    }
}
