//! Board pin catalog.
//!
//! Maps each logical signal the converter uses to its port, pin, peripheral
//! and channel. The table is fixed at compile time and never changes at
//! runtime; the firmware claims exactly these pins during bring-up.

/// Logical signals routed to the MCU.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Signal {
    PhaseAHigh,
    PhaseALow,
    PhaseBHigh,
    PhaseBLow,
    BrakeInput,
    PackVoltage,
    BusVoltage,
    Cell1,
    Cell2,
    Cell3,
    BatteryCurrent,
    OutputCurrent,
    Thermal0,
    Thermal1,
    ThermalMux,
    ThermalMuxSelect,
}

impl Signal {
    /// Position of the signal in [`PIN_TABLE`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Signal::PhaseAHigh => 0,
            Signal::PhaseALow => 1,
            Signal::PhaseBHigh => 2,
            Signal::PhaseBLow => 3,
            Signal::BrakeInput => 4,
            Signal::PackVoltage => 5,
            Signal::BusVoltage => 6,
            Signal::Cell1 => 7,
            Signal::Cell2 => 8,
            Signal::Cell3 => 9,
            Signal::BatteryCurrent => 10,
            Signal::OutputCurrent => 11,
            Signal::Thermal0 => 12,
            Signal::Thermal1 => 13,
            Signal::ThermalMux => 14,
            Signal::ThermalMuxSelect => 15,
        }
    }
}

/// GPIO port letter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Port {
    A,
    B,
    C,
}

/// Peripheral a pin is routed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Peripheral {
    Tim1,
    Adc1,
    Gpio,
}

/// Static description of one routed signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinConfig {
    pub signal: Signal,
    pub name: &'static str,
    pub port: Port,
    pub pin: u8,
    pub peripheral: Peripheral,
    /// Timer or ADC channel number; `None` for plain GPIO.
    pub channel: Option<u8>,
}

impl PinConfig {
    #[must_use]
    pub const fn new(
        signal: Signal,
        name: &'static str,
        port: Port,
        pin: u8,
        peripheral: Peripheral,
        channel: Option<u8>,
    ) -> Self {
        Self {
            signal,
            name,
            port,
            pin,
            peripheral,
            channel,
        }
    }
}

/// Compile-time catalog of every routed signal.
pub const PIN_TABLE: [PinConfig; 16] = [
    PinConfig::new(Signal::PhaseAHigh, "TIM1_CH1", Port::A, 8, Peripheral::Tim1, Some(1)),
    PinConfig::new(Signal::PhaseALow, "TIM1_CH1N", Port::A, 7, Peripheral::Tim1, Some(1)),
    PinConfig::new(Signal::PhaseBHigh, "TIM1_CH2", Port::A, 9, Peripheral::Tim1, Some(2)),
    PinConfig::new(Signal::PhaseBLow, "TIM1_CH2N", Port::B, 0, Peripheral::Tim1, Some(2)),
    PinConfig::new(Signal::BrakeInput, "TIM1_BKIN", Port::A, 6, Peripheral::Tim1, None),
    PinConfig::new(Signal::PackVoltage, "V_PACK", Port::A, 0, Peripheral::Adc1, Some(0)),
    PinConfig::new(Signal::BusVoltage, "V_BUS", Port::A, 1, Peripheral::Adc1, Some(1)),
    PinConfig::new(Signal::Cell1, "V_CELL1", Port::A, 2, Peripheral::Adc1, Some(2)),
    PinConfig::new(Signal::Cell2, "V_CELL2", Port::A, 3, Peripheral::Adc1, Some(3)),
    PinConfig::new(Signal::Cell3, "V_CELL3", Port::A, 4, Peripheral::Adc1, Some(4)),
    PinConfig::new(Signal::BatteryCurrent, "I_BATT", Port::A, 5, Peripheral::Adc1, Some(5)),
    PinConfig::new(Signal::OutputCurrent, "I_OUT", Port::B, 1, Peripheral::Adc1, Some(9)),
    PinConfig::new(Signal::Thermal0, "NTC0", Port::B, 2, Peripheral::Adc1, Some(10)),
    PinConfig::new(Signal::Thermal1, "NTC1", Port::B, 10, Peripheral::Adc1, Some(11)),
    PinConfig::new(Signal::ThermalMux, "NTC_MUX", Port::C, 4, Peripheral::Adc1, Some(17)),
    PinConfig::new(Signal::ThermalMuxSelect, "NTC_SEL", Port::C, 6, Peripheral::Gpio, None),
];

/// Looks up the routing for `signal`.
#[must_use]
pub const fn pin_for(signal: Signal) -> PinConfig {
    PIN_TABLE[signal.as_index()]
}
