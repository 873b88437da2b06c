//! TIM1 complementary PWM with dead time and the BKIN brake latch.
//!
//! The embassy driver owns the compare channels; the break configuration and
//! main-output-enable bit are not exposed by it, so they go straight to the
//! TIM1 registers.

use converter_core::config::PwmConfig;
use converter_core::hal::{Leg, LegTicks, PwmTimer};
use embassy_stm32::Peri;
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::Moder;
use embassy_stm32::peripherals::{PA6, TIM1};
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::complementary_pwm::ComplementaryPwm;

/// Alternate function routing PA6 to TIM1_BKIN.
const BKIN_ALTERNATE_FUNCTION: u8 = 2;
const BKIN_PIN: usize = 6;

const fn channel_for(leg: Leg) -> Channel {
    match leg {
        Leg::A => Channel::Ch1,
        Leg::B => Channel::Ch2,
    }
}

/// Power-stage timer: CH1/CH1N drive leg A, CH2/CH2N drive leg B.
pub struct TimerPwm<'d> {
    pwm: ComplementaryPwm<'d, TIM1>,
    period: u16,
    _brake_input: Peri<'d, PA6>,
}

impl<'d> TimerPwm<'d> {
    /// Configures dead time and the active-high break input, then enables
    /// both channel pairs with the main output still gated off.
    pub fn new(
        mut pwm: ComplementaryPwm<'d, TIM1>,
        brake_input: Peri<'d, PA6>,
        config: PwmConfig,
    ) -> Self {
        set_main_output(false);

        pac::GPIOA
            .moder()
            .modify(|w| w.set_moder(BKIN_PIN, Moder::ALTERNATE));
        pac::GPIOA
            .afr(0)
            .modify(|w| w.set_afr(BKIN_PIN, BKIN_ALTERNATE_FUNCTION));
        pac::TIM1.bdtr().modify(|w| {
            w.set_bke(0, true);
            w.set_bkp(0, true);
            w.set_aoe(false);
        });

        pwm.set_dead_time(u16::from(config.dead_time_ticks));
        for leg in Leg::ALL {
            pwm.set_duty(channel_for(leg), 0);
            pwm.enable(channel_for(leg));
        }
        set_main_output(false);

        let period = pwm.get_max_duty().min(config.period);
        Self {
            pwm,
            period,
            _brake_input: brake_input,
        }
    }
}

fn set_main_output(enabled: bool) {
    pac::TIM1.bdtr().modify(|w| w.set_moe(enabled));
}

impl PwmTimer for TimerPwm<'_> {
    fn period(&self) -> u16 {
        self.period
    }

    fn write_leg(&mut self, leg: Leg, ticks: LegTicks) {
        // CHxN is the hardware complement of CHx; one compare register covers both.
        self.pwm.set_duty(channel_for(leg), ticks.on);
    }

    fn set_outputs_enabled(&mut self, enabled: bool) {
        set_main_output(enabled);
    }

    fn brake_latched(&self) -> bool {
        pac::TIM1.sr().read().bif()
    }
}
