//! Control event catalog and the in-memory telemetry ring.
//!
//! Events are strongly typed on the controller side and serialize to compact
//! numeric codes for transport over diagnostics channels. The recorder keeps a
//! fixed number of records so the firmware can retain history without an
//! allocator, and only records edges (state changes, fault latching, output
//! gating) so nothing is written on steady-state cycles.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::control::{ControlState, Direction, Transition};
use crate::fault::BoardStatus;
use crate::power_stage::{EnableResult, clamp_fraction};
use crate::session::CycleReport;

/// Monotonic identifier assigned to every telemetry record.
pub type EventId = u32;

/// Discriminated control events shared by firmware and host targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlEventKind {
    StateEntered(ControlState),
    /// FAULT latched; carries [`BoardStatus::bits`].
    FaultLatched(u8),
    OutputsEnabled,
    OutputsDisabled,
    /// Enable request rejected because the brake latch was set.
    EnableRefused,
    DirectionChanged(Direction),
    /// First cycle of a run that found no completed scan.
    StaleScan,
    Custom(u16),
}

impl fmt::Display for ControlEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlEventKind::StateEntered(state) => write!(f, "state-entered {state}"),
            ControlEventKind::FaultLatched(bits) => write!(f, "fault-latched 0b{bits:03b}"),
            ControlEventKind::OutputsEnabled => f.write_str("outputs-enabled"),
            ControlEventKind::OutputsDisabled => f.write_str("outputs-disabled"),
            ControlEventKind::EnableRefused => f.write_str("enable-refused"),
            ControlEventKind::DirectionChanged(direction) => {
                write!(f, "direction-changed {direction}")
            }
            ControlEventKind::StaleScan => f.write_str("stale-scan"),
            ControlEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl ControlEventKind {
    const STATE_ENTERED_BASE: u16 = 0x0000;
    const FAULT_LATCHED_BASE: u16 = 0x0010;
    const OUTPUTS_ENABLED_CODE: u16 = 0x0020;
    const OUTPUTS_DISABLED_CODE: u16 = 0x0021;
    const ENABLE_REFUSED_CODE: u16 = 0x0022;
    const STALE_SCAN_CODE: u16 = 0x0023;
    const DIRECTION_BASE: u16 = 0x0030;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn to_raw(self) -> u16 {
        match self {
            ControlEventKind::StateEntered(state) => Self::STATE_ENTERED_BASE + state.as_index(),
            ControlEventKind::FaultLatched(bits) => {
                Self::FAULT_LATCHED_BASE + (bits & 0b111) as u16
            }
            ControlEventKind::OutputsEnabled => Self::OUTPUTS_ENABLED_CODE,
            ControlEventKind::OutputsDisabled => Self::OUTPUTS_DISABLED_CODE,
            ControlEventKind::EnableRefused => Self::ENABLE_REFUSED_CODE,
            ControlEventKind::StaleScan => Self::STALE_SCAN_CODE,
            ControlEventKind::DirectionChanged(direction) => {
                Self::DIRECTION_BASE + direction_index(direction)
            }
            ControlEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`ControlEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::OUTPUTS_ENABLED_CODE => ControlEventKind::OutputsEnabled,
            Self::OUTPUTS_DISABLED_CODE => ControlEventKind::OutputsDisabled,
            Self::ENABLE_REFUSED_CODE => ControlEventKind::EnableRefused,
            Self::STALE_SCAN_CODE => ControlEventKind::StaleScan,
            value if (Self::STATE_ENTERED_BASE..Self::FAULT_LATCHED_BASE).contains(&value) => {
                ControlState::from_index(value - Self::STATE_ENTERED_BASE)
                    .map_or(ControlEventKind::Custom(value), ControlEventKind::StateEntered)
            }
            value if (Self::FAULT_LATCHED_BASE..Self::FAULT_LATCHED_BASE + 8).contains(&value) => {
                u8::try_from(value - Self::FAULT_LATCHED_BASE)
                    .map_or(ControlEventKind::Custom(value), ControlEventKind::FaultLatched)
            }
            value if (Self::DIRECTION_BASE..Self::DIRECTION_BASE + 2).contains(&value) => {
                direction_from_index(value - Self::DIRECTION_BASE)
                    .map_or(ControlEventKind::Custom(value), ControlEventKind::DirectionChanged)
            }
            other => ControlEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside control events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Transition(TransitionTelemetry),
    Fault(FaultTelemetry),
}

/// Details recorded when the state machine changes state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionTelemetry {
    pub from: ControlState,
    /// Time spent in `from`; `None` for the first transition recorded.
    pub dwell: Option<Duration>,
    /// Phase duty after the transition, in thousandths.
    pub duty_permille: u16,
}

/// Flags and origin recorded when FAULT latches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultTelemetry {
    pub status: BoardStatus,
    pub from: ControlState,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic instant wrappers usable as telemetry timestamps.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: ControlEventKind,
    pub details: TelemetryPayload,
}

pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records control events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    scan_was_fresh: bool,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            scan_was_fresh: true,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a state change together with the time spent in the previous state.
    pub fn record_transition(
        &mut self,
        transition: Transition,
        duty: f32,
        timestamp: TInstant,
    ) -> EventId {
        let dwell = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);

        let payload = TelemetryPayload::Transition(TransitionTelemetry {
            from: transition.from,
            dwell,
            duty_permille: duty_permille(duty),
        });
        self.record(
            ControlEventKind::StateEntered(transition.to),
            payload,
            timestamp,
        )
    }

    /// Records the flags that latched FAULT.
    pub fn record_fault(
        &mut self,
        status: BoardStatus,
        from: ControlState,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            ControlEventKind::FaultLatched(status.bits()),
            TelemetryPayload::Fault(FaultTelemetry { status, from }),
            timestamp,
        )
    }

    /// Records every edge visible in a cycle report.
    ///
    /// Returns the number of records written; steady-state cycles write none.
    pub fn record_cycle(&mut self, report: &CycleReport, timestamp: TInstant) -> usize {
        let mut written = 0;

        if !report.fresh && self.scan_was_fresh {
            self.record(ControlEventKind::StaleScan, TelemetryPayload::None, timestamp);
            written += 1;
        }
        self.scan_was_fresh = report.fresh;

        if report.direction_changed {
            self.record(
                ControlEventKind::DirectionChanged(report.direction),
                TelemetryPayload::None,
                timestamp,
            );
            written += 1;
        }

        if let Some(transition) = report.transition {
            if report.entered_fault() {
                self.record_fault(report.status, transition.from, timestamp);
                written += 1;
            }
            self.record_transition(transition, report.duty_a, timestamp);
            written += 1;
        }

        let gating = match report.enable_result {
            Some(EnableResult::Changed) if report.outputs_enabled => {
                Some(ControlEventKind::OutputsEnabled)
            }
            Some(EnableResult::Changed) => Some(ControlEventKind::OutputsDisabled),
            Some(EnableResult::RefusedBrake) => Some(ControlEventKind::EnableRefused),
            Some(EnableResult::Unchanged) | None => None,
        };
        if let Some(event) = gating {
            self.record(event, TelemetryPayload::None, timestamp);
            written += 1;
        }

        written
    }

    /// Records an arbitrary event with the supplied payload.
    pub fn record(
        &mut self,
        event: ControlEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duty_permille(duty: f32) -> u16 {
    (clamp_fraction(duty) * 1000.0) as u16
}

const fn direction_index(direction: Direction) -> u16 {
    match direction {
        Direction::Buck => 0,
        Direction::Boost => 1,
    }
}

fn direction_from_index(index: u16) -> Option<Direction> {
    match index {
        0 => Some(Direction::Buck),
        1 => Some(Direction::Boost),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            ControlEventKind::StateEntered(ControlState::Idle),
            ControlEventKind::StateEntered(ControlState::Fault),
            ControlEventKind::FaultLatched(0b011),
            ControlEventKind::OutputsEnabled,
            ControlEventKind::OutputsDisabled,
            ControlEventKind::EnableRefused,
            ControlEventKind::StaleScan,
            ControlEventKind::DirectionChanged(Direction::Boost),
        ];

        for event in fixtures {
            assert_eq!(ControlEventKind::from_raw(event.to_raw()), event);
        }
    }

    #[test]
    fn unknown_codes_decode_as_custom() {
        assert_eq!(ControlEventKind::from_raw(0x0007), ControlEventKind::Custom(0x0007));
        assert_eq!(ControlEventKind::from_raw(0x0400), ControlEventKind::Custom(0x0400));
    }

    #[test]
    fn transitions_carry_dwell_time() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();

        let first = recorder.record_transition(
            Transition {
                from: ControlState::Idle,
                to: ControlState::Precharge,
            },
            0.01,
            MicrosInstant(100),
        );
        assert_eq!(first, 0);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Transition(details)) => {
                assert_eq!(details.dwell, None);
                assert_eq!(details.duty_permille, 10);
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let second = recorder.record_transition(
            Transition {
                from: ControlState::Precharge,
                to: ControlState::Active,
            },
            0.10,
            MicrosInstant(1_100),
        );
        assert_eq!(second, 1);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Transition(details)) => {
                assert_eq!(details.dwell, Some(Duration::from_micros(1_000)));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn ring_keeps_newest_records() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 4>::new();
        for tick in 0..10 {
            recorder.record(ControlEventKind::StaleScan, TelemetryPayload::None, MicrosInstant(tick));
        }

        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[6, 7, 8, 9]);
    }
}
