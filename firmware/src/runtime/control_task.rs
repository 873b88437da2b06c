use converter_core::session::{ControlLoop, CycleReport};
use embassy_time::{Duration, Ticker, with_timeout};

use crate::hw::{self, MuxPin, ScanAdc, TimerPwm};
use crate::status;
use crate::telemetry::{FirmwareInstant, TelemetryRecorder};

pub type FirmwareControlLoop = ControlLoop<ScanAdc, MuxPin<'static>, TimerPwm<'static>>;

/// Control cycle rate.
pub const CONTROL_PERIOD: Duration = Duration::from_hz(1_000);
/// Upper bound on the wait for the bring-up scan.
const FIRST_SCAN_TIMEOUT: Duration = Duration::from_millis(10);
const PRIME_SPIN_LIMIT: u32 = 16;

#[embassy_executor::task]
pub async fn run(mut control: FirmwareControlLoop, mut telemetry: TelemetryRecorder) -> ! {
    control
        .session_mut()
        .acquisition_mut()
        .trigger_next_conversion();
    let scanned = with_timeout(FIRST_SCAN_TIMEOUT, hw::adc::wait_for_scan())
        .await
        .is_ok();
    // The awaited scan is already published, so priming loads it on the first poll.
    let primed = control.prime(PRIME_SPIN_LIMIT);
    log_bring_up(scanned && primed);

    let mut ticker = Ticker::every(CONTROL_PERIOD);
    loop {
        ticker.next().await;

        control.set_direction(status::requested_direction());
        let report = control.cycle(status::comms_lost());
        if telemetry.record_cycle(&report, FirmwareInstant::now()) > 0 {
            log_cycle(&report);
        }
        status::record_snapshot(&control.status_snapshot(), control.cycles());
    }
}

fn log_bring_up(primed: bool) {
    if primed {
        defmt::info!(
            "control: first scan loaded, period={}us",
            CONTROL_PERIOD.as_micros()
        );
    } else {
        defmt::warn!("control: first scan timed out, starting from zeroed measurements");
    }
}

fn log_cycle(report: &CycleReport) {
    defmt::debug!(
        "control: state={} direction={} ticks={}/{} outputs={}",
        report.state.label(),
        report.direction.label(),
        report.ticks[0].on,
        report.ticks[1].on,
        report.outputs_enabled
    );
}
