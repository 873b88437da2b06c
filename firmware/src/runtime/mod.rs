use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel, SampleTime};
use embassy_stm32::gpio::{Level, Output, OutputType, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin};
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::PwmPin;

use converter_core::config::{AdcConfig, ControlConfig, PwmConfig};
use converter_core::session::{ControlLoop, HardwareSession};

use crate::hw::{MuxPin, ScanAdc, TimerPwm};
use crate::telemetry::TelemetryRecorder;

mod control_task;
mod scan_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Power-stage switching frequency.
const SWITCHING_FREQUENCY_KHZ: u32 = 40;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        TIM1,
        ADC1,
        PA0,
        PA1,
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PA9,
        PB0,
        PB1,
        PB2,
        PB10,
        PC4,
        PC6,
        ..
    } = hal::init(config);

    let control_config = ControlConfig::default();
    control_config
        .validate()
        .expect("control configuration");

    let pwm = ComplementaryPwm::new(
        TIM1,
        Some(PwmPin::new(PA8, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(PA7, OutputType::PushPull)),
        Some(PwmPin::new(PA9, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(PB0, OutputType::PushPull)),
        None,
        None,
        None,
        None,
        khz(SWITCHING_FREQUENCY_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let timer = TimerPwm::new(pwm, PA6, PwmConfig::default());

    let mut converter = Adc::new(ADC1);
    converter.set_sample_time(SampleTime::CYCLES160_5);
    // Slot order must match `converter_core::acquisition::SCAN_LAYOUT`.
    let channels = [
        PA0.degrade_adc(),
        PA1.degrade_adc(),
        PA2.degrade_adc(),
        PA3.degrade_adc(),
        PA4.degrade_adc(),
        PA5.degrade_adc(),
        PB1.degrade_adc(),
        PB2.degrade_adc(),
        PB10.degrade_adc(),
        PC4.degrade_adc(),
    ];
    let mux = MuxPin::new(Output::new(PC6, Level::Low, Speed::Low));

    let session = HardwareSession::new(ScanAdc::new(), mux, timer, AdcConfig::default());
    let control = ControlLoop::new(session, control_config);

    spawner
        .spawn(scan_task::run(converter, channels))
        .expect("failed to spawn ADC scan task");

    spawner
        .spawn(control_task::run(control, TelemetryRecorder::new()))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
