use converter_core::acquisition::SCAN_SLOTS;
use embassy_stm32::adc::{Adc, AnyAdcChannel};
use embassy_stm32::peripherals::ADC1;

use crate::hw::adc;

/// Converts every channel, in scan-slot order, each time a scan is requested.
#[embassy_executor::task]
pub async fn run(
    mut converter: Adc<'static, ADC1>,
    mut channels: [AnyAdcChannel<ADC1>; SCAN_SLOTS],
) -> ! {
    loop {
        adc::wait_for_start().await;
        for (slot, channel) in channels.iter_mut().enumerate() {
            adc::store_slot(slot, converter.blocking_read(channel));
        }
        adc::publish_scan();
    }
}
