//! Scan buffer shared between the ADC scan task and the control cycle.
//!
//! The scan task converts every channel in `SCAN_LAYOUT` order, stores the
//! counts and raises the ready flag. [`ScanAdc`] exposes that buffer through
//! the [`AdcScanner`] seam; the cycle reads and clears it, then requests the
//! next scan.

use converter_core::acquisition::SCAN_SLOTS;
use converter_core::hal::AdcScanner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU16, Ordering};

static SLOTS: [AtomicU16; SCAN_SLOTS] = [const { AtomicU16::new(0) }; SCAN_SLOTS];
static READY: AtomicBool = AtomicBool::new(false);
static START: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Waits until the cycle requests a scan.
pub async fn wait_for_start() {
    START.wait().await;
}

/// Stores one converted slot. Only the scan task writes slots.
pub fn store_slot(slot: usize, raw: u16) {
    if let Some(cell) = SLOTS.get(slot) {
        cell.store(raw, Ordering::Relaxed);
    }
}

/// Marks the scan complete and wakes anyone waiting on it.
pub fn publish_scan() {
    READY.store(true, Ordering::Release);
    DONE.signal(());
}

/// Waits for the next completed scan.
pub async fn wait_for_scan() {
    DONE.wait().await;
}

/// Control-side view of the scan buffer.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScanAdc;

impl ScanAdc {
    pub const fn new() -> Self {
        Self
    }
}

impl AdcScanner for ScanAdc {
    fn scan_complete(&self) -> bool {
        READY.load(Ordering::Acquire)
    }

    fn read_slot(&mut self, slot: usize) -> u16 {
        SLOTS
            .get(slot)
            .map_or(0, |cell| cell.load(Ordering::Relaxed))
    }

    fn clear_ready(&mut self) {
        READY.store(false, Ordering::Release);
    }

    fn start_conversion(&mut self) {
        START.signal(());
    }
}
