//! Hardware seams consumed by the control cycle.
//!
//! The firmware binds these traits to the STM32 timer, ADC and GPIO drivers;
//! the emulator and the integration tests provide software backends. Nothing
//! in here blocks.

/// One half-bridge leg of the two-phase power stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Leg {
    A,
    B,
}

impl Leg {
    /// Both legs in register order.
    pub const ALL: [Leg; 2] = [Leg::A, Leg::B];

    /// Deterministic index for per-leg arrays.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Leg::A => 0,
            Leg::B => 1,
        }
    }
}

/// Compare values for one leg: the on-time and its complement.
///
/// Both halves are handed to the timer together so a complementary pair never
/// runs with mismatched edges for a period.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LegTicks {
    pub on: u16,
    pub complementary: u16,
}

impl LegTicks {
    /// Builds the compare pair for `on` ticks within `period`.
    #[must_use]
    pub const fn new(on: u16, period: u16) -> Self {
        let on = if on > period { period } else { on };
        Self {
            on,
            complementary: period - on,
        }
    }
}

/// Which of the two multiplexed thermistors is routed to the shared ADC slot.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ThermalBank {
    #[default]
    Primary,
    Secondary,
}

impl ThermalBank {
    /// Returns the other bank.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            ThermalBank::Primary => ThermalBank::Secondary,
            ThermalBank::Secondary => ThermalBank::Primary,
        }
    }

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ThermalBank::Primary => 0,
            ThermalBank::Secondary => 1,
        }
    }
}

/// Scan sequencer that converts a fixed list of channels per trigger.
pub trait AdcScanner {
    /// Returns `true` once every slot of the last triggered scan holds a fresh sample.
    fn scan_complete(&self) -> bool;

    /// Raw count captured for `slot` by the last completed scan.
    fn read_slot(&mut self, slot: usize) -> u16;

    /// Acknowledges the end-of-scan and end-of-conversion flags.
    fn clear_ready(&mut self);

    /// Starts a new scan.
    fn start_conversion(&mut self);
}

/// Digital output selecting the thermistor on the shared ADC input.
pub trait MuxSelect {
    fn select(&mut self, bank: ThermalBank);
}

/// Complementary PWM timer with dead time and a latched hardware brake.
pub trait PwmTimer {
    /// Auto-reload value of the switching timer.
    fn period(&self) -> u16;

    /// Updates both compare values of a leg in a single register update.
    fn write_leg(&mut self, leg: Leg, ticks: LegTicks);

    /// Drives the software main-output-enable bit.
    fn set_outputs_enabled(&mut self, enabled: bool);

    /// Samples the break flag latched by the external comparator chain.
    fn brake_latched(&self) -> bool;
}

/// Mux selector for boards that wire every thermistor to its own channel.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopMux;

impl NoopMux {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MuxSelect for NoopMux {
    fn select(&mut self, _: ThermalBank) {}
}
