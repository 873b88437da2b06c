//! Embassy-backed implementations of the converter hardware seams.
//!
//! Each adapter binds one `converter_core::hal` trait to the STM32G0
//! peripherals named in `converter_core::pins::PIN_TABLE`.

pub mod adc;
pub mod pwm;

use converter_core::hal::{MuxSelect, ThermalBank};
use embassy_stm32::gpio::Output;

pub use adc::ScanAdc;
pub use pwm::TimerPwm;

/// GPIO routing one of the two multiplexed thermistors to the shared ADC input.
pub struct MuxPin<'d> {
    select: Output<'d>,
}

impl<'d> MuxPin<'d> {
    pub fn new(select: Output<'d>) -> Self {
        Self { select }
    }
}

impl MuxSelect for MuxPin<'_> {
    fn select(&mut self, bank: ThermalBank) {
        match bank {
            ThermalBank::Primary => self.select.set_low(),
            ThermalBank::Secondary => self.select.set_high(),
        }
    }
}
