//! Averaged software model of the converter hardware.
//!
//! The model is deliberately coarse: the rail that is not held by an external
//! supply relaxes toward `duty * source` while the bridge switches and bleeds
//! down otherwise, and every thermistor warms with duty and cools toward
//! ambient. It exists to exercise the control cycle, not to predict hardware.

use std::cell::RefCell;
use std::rc::Rc;

use converter_core::acquisition::{MeasurementField, SCAN_LAYOUT, SCAN_SLOTS};
use converter_core::config::ADC_FULL_SCALE;
use converter_core::hal::{AdcScanner, Leg, LegTicks, MuxSelect, PwmTimer, ThermalBank};

const LOAD_GAIN: f32 = 0.15;
const BLEED: f32 = 0.9;
const HEATING_PER_CYCLE: f32 = 0.004;
const COOLING_PER_CYCLE: f32 = 0.002;

/// Which rail an external supply is holding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Supply {
    None,
    Pack,
    Bus,
}

#[derive(Debug)]
pub struct Plant {
    pub pack: f32,
    pub bus: f32,
    pub supply: Supply,
    pub ambient: f32,
    pub thermals: [f32; 4],
    pub cells: [f32; 3],
    brake: bool,
    moe: bool,
    duty: [f32; 2],
    bank: ThermalBank,
}

pub type SharedPlant = Rc<RefCell<Plant>>;

impl Plant {
    pub fn new(ambient: f32) -> Self {
        Self {
            pack: 0.0,
            bus: 0.0,
            supply: Supply::None,
            ambient,
            thermals: [ambient; 4],
            cells: [0.0; 3],
            brake: false,
            moe: false,
            duty: [0.0; 2],
            bank: ThermalBank::Primary,
        }
    }

    pub fn shared(ambient: f32) -> SharedPlant {
        Rc::new(RefCell::new(Self::new(ambient)))
    }

    /// Pins `rail` to `level` as an external supply would.
    pub fn supply(&mut self, supply: Supply, level: f32) {
        self.supply = supply;
        match supply {
            Supply::Pack => self.pack = level,
            Supply::Bus => self.bus = level,
            Supply::None => {}
        }
    }

    /// Trips the brake comparator. Hardware drops the outputs immediately.
    pub fn trip_brake(&mut self) {
        self.brake = true;
        self.moe = false;
    }

    pub fn release_brake(&mut self) {
        self.brake = false;
    }

    pub fn switching(&self) -> bool {
        self.moe && !self.brake
    }

    /// Advances the model by one control period.
    pub fn advance(&mut self) {
        let duty = if self.switching() {
            (self.duty[0] + self.duty[1]) / 2.0
        } else {
            0.0
        };

        match self.supply {
            Supply::Bus => self.pack = self.drive(self.pack, self.bus, duty),
            Supply::Pack => self.bus = self.drive(self.bus, self.pack, duty),
            Supply::None => {
                self.pack *= BLEED;
                self.bus *= BLEED;
            }
        }

        let pack = self.pack;
        self.cells = [pack / 3.0, pack * 2.0 / 3.0, pack];

        for thermal in &mut self.thermals {
            if duty > 0.0 {
                *thermal = (*thermal + HEATING_PER_CYCLE * duty).min(1.0);
            } else {
                *thermal = (*thermal - COOLING_PER_CYCLE).max(self.ambient);
            }
        }
    }

    fn drive(&self, load: f32, source: f32, duty: f32) -> f32 {
        if duty > 0.0 {
            load + (duty * source - load) * LOAD_GAIN
        } else {
            load * BLEED
        }
    }

    fn sample(&self, field: MeasurementField) -> f32 {
        match field {
            MeasurementField::PackVoltage => self.pack,
            MeasurementField::BusVoltage => self.bus,
            MeasurementField::Cell(index) => self.cells[index],
            MeasurementField::BatteryCurrent | MeasurementField::OutputCurrent => {
                if self.switching() {
                    self.duty[0] * 0.5
                } else {
                    0.0
                }
            }
            MeasurementField::Thermal(index) => self.thermals[index],
            MeasurementField::MultiplexedThermal => self.thermals[2 + self.bank.as_index()],
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_counts(fraction: f32) -> u16 {
    (fraction.clamp(0.0, 1.0) * f32::from(ADC_FULL_SCALE)).round() as u16
}

/// Scan sequencer that samples the plant when triggered and completes at once.
pub struct SimAdc {
    plant: SharedPlant,
    ready: bool,
    slots: [u16; SCAN_SLOTS],
}

impl SimAdc {
    pub fn new(plant: SharedPlant) -> Self {
        Self {
            plant,
            ready: false,
            slots: [0; SCAN_SLOTS],
        }
    }
}

impl AdcScanner for SimAdc {
    fn scan_complete(&self) -> bool {
        self.ready
    }

    fn read_slot(&mut self, slot: usize) -> u16 {
        self.slots[slot]
    }

    fn clear_ready(&mut self) {
        self.ready = false;
    }

    fn start_conversion(&mut self) {
        let plant = self.plant.borrow();
        for (slot, field) in SCAN_LAYOUT.iter().enumerate() {
            self.slots[slot] = to_counts(plant.sample(*field));
        }
        self.ready = true;
    }
}

pub struct SimMux {
    plant: SharedPlant,
}

impl SimMux {
    pub fn new(plant: SharedPlant) -> Self {
        Self { plant }
    }
}

impl MuxSelect for SimMux {
    fn select(&mut self, bank: ThermalBank) {
        self.plant.borrow_mut().bank = bank;
    }
}

pub struct SimTimer {
    plant: SharedPlant,
    period: u16,
}

impl SimTimer {
    pub fn new(plant: SharedPlant, period: u16) -> Self {
        Self { plant, period }
    }
}

impl PwmTimer for SimTimer {
    fn period(&self) -> u16 {
        self.period
    }

    fn write_leg(&mut self, leg: Leg, ticks: LegTicks) {
        let duty = if self.period == 0 {
            0.0
        } else {
            f32::from(ticks.on) / f32::from(self.period)
        };
        self.plant.borrow_mut().duty[leg.as_index()] = duty;
    }

    fn set_outputs_enabled(&mut self, enabled: bool) {
        let mut plant = self.plant.borrow_mut();
        plant.moe = enabled && !plant.brake;
    }

    fn brake_latched(&self) -> bool {
        self.plant.borrow().brake
    }
}
