#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The control task publishes every cycle into lightweight atomics so other
//! tasks can build a [`StatusSnapshot`] without borrowing the control loop.
//! The comms and direction cells are written by the host link and read back
//! by the control task at the top of each cycle.

use converter_core::control::{ControlState, Direction};
use converter_core::fault::BoardStatus;
use converter_core::power_stage::clamp_fraction;
use converter_core::status::StatusSnapshot;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};

const DIRECTION_BUCK: u8 = 0;
const DIRECTION_BOOST: u8 = 1;

/// Set by the host link when its heartbeat lapses.
static COMMS_LOST: AtomicBool = AtomicBool::new(false);
/// Direction the host asked for; applied on the next cycle.
static REQUESTED_DIRECTION: AtomicU8 = AtomicU8::new(DIRECTION_BUCK);

static STATE: AtomicU8 = AtomicU8::new(0);
static DIRECTION: AtomicU8 = AtomicU8::new(DIRECTION_BUCK);
static FAULT_BITS: AtomicU8 = AtomicU8::new(0);
static OUTPUTS_ENABLED: AtomicBool = AtomicBool::new(false);
/// Fractions stored in thousandths.
static DUTY_A: AtomicU16 = AtomicU16::new(0);
static DUTY_B: AtomicU16 = AtomicU16::new(0);
static PACK_VOLTAGE: AtomicU16 = AtomicU16::new(0);
static BUS_VOLTAGE: AtomicU16 = AtomicU16::new(0);
static HOTTEST: AtomicU16 = AtomicU16::new(0);
static STALE_READS: AtomicU32 = AtomicU32::new(0);
static CYCLES: AtomicU32 = AtomicU32::new(0);

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_permille(value: f32) -> u16 {
    (clamp_fraction(value) * 1000.0 + 0.5) as u16
}

fn from_permille(value: u16) -> f32 {
    f32::from(value) / 1000.0
}

const fn encode_direction(direction: Direction) -> u8 {
    match direction {
        Direction::Buck => DIRECTION_BUCK,
        Direction::Boost => DIRECTION_BOOST,
    }
}

const fn decode_direction(raw: u8) -> Direction {
    if raw == DIRECTION_BOOST {
        Direction::Boost
    } else {
        Direction::Buck
    }
}

/// Marks the host link as lost or restored.
///
/// Entry point for the host link task, which is not part of this firmware
/// yet; until one is added the link always reads as healthy.
#[cfg_attr(target_os = "none", allow(dead_code))]
pub fn set_comms_lost(lost: bool) {
    COMMS_LOST.store(lost, Ordering::Relaxed);
}

/// Returns the link flag the next cycle will evaluate.
pub fn comms_lost() -> bool {
    COMMS_LOST.load(Ordering::Relaxed)
}

/// Stores the host's requested conversion direction.
///
/// Entry point for the host link task; without one the converter stays in
/// its default buck direction.
#[cfg_attr(target_os = "none", allow(dead_code))]
pub fn request_direction(direction: Direction) {
    REQUESTED_DIRECTION.store(encode_direction(direction), Ordering::Relaxed);
}

/// Returns the most recently requested direction.
pub fn requested_direction() -> Direction {
    decode_direction(REQUESTED_DIRECTION.load(Ordering::Relaxed))
}

/// Publishes the state of the control loop after a cycle.
pub fn record_snapshot(snapshot: &StatusSnapshot, cycles: u32) {
    #[allow(clippy::cast_possible_truncation)]
    let state = snapshot.state.as_index() as u8;
    STATE.store(state, Ordering::Relaxed);
    DIRECTION.store(encode_direction(snapshot.direction), Ordering::Relaxed);
    FAULT_BITS.store(snapshot.status.bits(), Ordering::Relaxed);
    OUTPUTS_ENABLED.store(snapshot.outputs_enabled, Ordering::Relaxed);
    DUTY_A.store(to_permille(snapshot.duty_a), Ordering::Relaxed);
    DUTY_B.store(to_permille(snapshot.duty_b), Ordering::Relaxed);
    PACK_VOLTAGE.store(to_permille(snapshot.pack_voltage), Ordering::Relaxed);
    BUS_VOLTAGE.store(to_permille(snapshot.bus_voltage), Ordering::Relaxed);
    HOTTEST.store(to_permille(snapshot.hottest), Ordering::Relaxed);
    STALE_READS.store(snapshot.stale_reads, Ordering::Relaxed);
    CYCLES.store(cycles, Ordering::Relaxed);
}

/// Completed control cycles, wrapping.
#[cfg_attr(target_os = "none", allow(dead_code))]
pub fn cycles() -> u32 {
    CYCLES.load(Ordering::Relaxed)
}

/// Builds a [`StatusSnapshot`] from the published values.
///
/// Fractions come back quantized to thousandths.
#[cfg_attr(target_os = "none", allow(dead_code))]
pub fn snapshot() -> StatusSnapshot {
    let state = ControlState::from_index(u16::from(STATE.load(Ordering::Relaxed)))
        .unwrap_or(ControlState::Idle);

    StatusSnapshot {
        state,
        direction: decode_direction(DIRECTION.load(Ordering::Relaxed)),
        duty_a: from_permille(DUTY_A.load(Ordering::Relaxed)),
        duty_b: from_permille(DUTY_B.load(Ordering::Relaxed)),
        pack_voltage: from_permille(PACK_VOLTAGE.load(Ordering::Relaxed)),
        bus_voltage: from_permille(BUS_VOLTAGE.load(Ordering::Relaxed)),
        hottest: from_permille(HOTTEST.load(Ordering::Relaxed)),
        status: BoardStatus::from_bits(FAULT_BITS.load(Ordering::Relaxed)),
        outputs_enabled: OUTPUTS_ENABLED.load(Ordering::Relaxed),
        stale_reads: STALE_READS.load(Ordering::Relaxed),
    }
}
