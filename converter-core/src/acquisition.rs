//! Analog acquisition: scan slots to named, normalized measurements.
//!
//! The ADC converts a fixed channel list on every trigger. [`SCAN_LAYOUT`]
//! routes each slot to the measurement it carries. Reading never waits: when
//! the last scan has not finished, the cached snapshot is returned as-is.
//!
//! Slot 9 is shared by two thermistors behind a 2:1 analog mux. Each completed
//! scan stores the shared sample into the thermal field of the bank that was
//! selected, then flips the select line so the next scan sees the other bank.
//! Each multiplexed thermistor is therefore refreshed on every second scan.

use crate::config::AdcConfig;
use crate::hal::{AdcScanner, MuxSelect, ThermalBank};

/// Number of channels converted per scan.
pub const SCAN_SLOTS: usize = 10;
/// Number of cell-tap voltages.
pub const CELL_TAPS: usize = 3;
/// Number of thermal readings, including the two multiplexed ones.
pub const THERMAL_CHANNELS: usize = 4;
/// Thermal index where the multiplexed sensors start.
const MUX_THERMAL_BASE: usize = 2;

/// Normalized fractions of full scale captured by one scan.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AnalogMeasurements {
    pub pack_voltage: f32,
    pub bus_voltage: f32,
    pub cell_voltages: [f32; CELL_TAPS],
    pub battery_current: f32,
    pub output_current: f32,
    pub thermals: [f32; THERMAL_CHANNELS],
}

impl AnalogMeasurements {
    /// Snapshot with every field at zero, used before the first scan lands.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            pack_voltage: 0.0,
            bus_voltage: 0.0,
            cell_voltages: [0.0; CELL_TAPS],
            battery_current: 0.0,
            output_current: 0.0,
            thermals: [0.0; THERMAL_CHANNELS],
        }
    }

    /// Convenience constructor for the two rails the state machine looks at.
    #[must_use]
    pub const fn with_rails(pack_voltage: f32, bus_voltage: f32) -> Self {
        let mut snapshot = Self::zeroed();
        snapshot.pack_voltage = pack_voltage;
        snapshot.bus_voltage = bus_voltage;
        snapshot
    }

    /// Hottest of the four thermal readings.
    #[must_use]
    pub fn hottest(&self) -> f32 {
        self.thermals.iter().copied().fold(0.0, f32::max)
    }
}

/// Destination of a scan slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MeasurementField {
    PackVoltage,
    BusVoltage,
    Cell(usize),
    BatteryCurrent,
    OutputCurrent,
    Thermal(usize),
    /// Shared slot; lands in the thermal field of the selected bank.
    MultiplexedThermal,
}

/// Slot-to-field routing in scan order.
pub const SCAN_LAYOUT: [MeasurementField; SCAN_SLOTS] = [
    MeasurementField::PackVoltage,
    MeasurementField::BusVoltage,
    MeasurementField::Cell(0),
    MeasurementField::Cell(1),
    MeasurementField::Cell(2),
    MeasurementField::BatteryCurrent,
    MeasurementField::OutputCurrent,
    MeasurementField::Thermal(0),
    MeasurementField::Thermal(1),
    MeasurementField::MultiplexedThermal,
];

/// Converts a raw count into a fraction of `full_scale`, saturating at 1.0.
#[must_use]
pub fn normalize(raw: u16, full_scale: u16) -> f32 {
    if full_scale == 0 {
        return 0.0;
    }
    (f32::from(raw) / f32::from(full_scale)).min(1.0)
}

/// Owns the ADC scan cache and the thermal mux selection.
pub struct AnalogAcquisition<A, M> {
    adc: A,
    mux: M,
    config: AdcConfig,
    cache: AnalogMeasurements,
    bank: ThermalBank,
    last_read_fresh: bool,
    stale_reads: u32,
}

impl<A, M> AnalogAcquisition<A, M>
where
    A: AdcScanner,
    M: MuxSelect,
{
    /// Wraps the scanner and mux, routing the primary thermistor to the shared slot.
    pub fn new(adc: A, mut mux: M, config: AdcConfig) -> Self {
        let bank = ThermalBank::Primary;
        mux.select(bank);
        Self {
            adc,
            mux,
            config,
            cache: AnalogMeasurements::zeroed(),
            bank,
            last_read_fresh: false,
            stale_reads: 0,
        }
    }

    /// Returns the newest measurements without waiting.
    ///
    /// If no scan finished since the last call, the previous snapshot comes
    /// back unchanged and the stale counter advances.
    pub fn read_measurements(&mut self) -> AnalogMeasurements {
        self.last_read_fresh = self.adc.scan_complete();
        if !self.last_read_fresh {
            self.stale_reads = self.stale_reads.saturating_add(1);
            return self.cache;
        }

        let mut next = self.cache;
        for (slot, field) in SCAN_LAYOUT.iter().enumerate() {
            let value = normalize(self.adc.read_slot(slot), self.config.full_scale);
            match *field {
                MeasurementField::PackVoltage => next.pack_voltage = value,
                MeasurementField::BusVoltage => next.bus_voltage = value,
                MeasurementField::Cell(index) => next.cell_voltages[index] = value,
                MeasurementField::BatteryCurrent => next.battery_current = value,
                MeasurementField::OutputCurrent => next.output_current = value,
                MeasurementField::Thermal(index) => next.thermals[index] = value,
                MeasurementField::MultiplexedThermal => {
                    next.thermals[MUX_THERMAL_BASE + self.bank.as_index()] = value;
                }
            }
        }
        self.adc.clear_ready();
        self.cache = next;

        self.bank = self.bank.toggled();
        self.mux.select(self.bank);

        self.cache
    }

    /// Starts the scan the next cycle will read.
    pub fn trigger_next_conversion(&mut self) {
        self.adc.start_conversion();
    }

    /// Bring-up helper: triggers one scan and spins at most `spin_limit`
    /// polls for it to complete, loading the cache when it does.
    pub fn prime(&mut self, spin_limit: u32) -> bool {
        self.adc.start_conversion();
        for _ in 0..spin_limit {
            if self.adc.scan_complete() {
                self.read_measurements();
                return true;
            }
            core::hint::spin_loop();
        }
        false
    }

    /// Last snapshot handed out.
    #[must_use]
    pub fn latest(&self) -> &AnalogMeasurements {
        &self.cache
    }

    /// Thermistor currently routed to the shared slot.
    #[must_use]
    pub fn selected_bank(&self) -> ThermalBank {
        self.bank
    }

    /// Whether the last [`read_measurements`](Self::read_measurements) found a completed scan.
    #[must_use]
    pub fn last_read_fresh(&self) -> bool {
        self.last_read_fresh
    }

    /// Number of reads that found no completed scan, saturating. Diagnostics only.
    #[must_use]
    pub fn stale_reads(&self) -> u32 {
        self.stale_reads
    }

    #[must_use]
    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    #[must_use]
    pub fn mux(&self) -> &M {
        &self.mux
    }
}
