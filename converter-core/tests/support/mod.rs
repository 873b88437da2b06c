#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use converter_core::acquisition::SCAN_SLOTS;
use converter_core::config::{ADC_FULL_SCALE, AdcConfig, ControlConfig, DEFAULT_PWM_PERIOD};
use converter_core::hal::{AdcScanner, Leg, LegTicks, MuxSelect, PwmTimer, ThermalBank};
use converter_core::session::{ControlLoop, HardwareSession};

pub const PACK_SLOT: usize = 0;
pub const BUS_SLOT: usize = 1;
pub const THERMAL_SLOT: usize = 7;
pub const MUX_THERMAL_SLOT: usize = 9;

/// Register-level operations observed on the fake peripherals, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    ReadSlot(usize),
    ClearReady,
    StartConversion,
    Select(ThermalBank),
    SampleBrake,
    WriteLeg(Leg, LegTicks),
    Outputs(bool),
}

#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Op>>>);

impl Journal {
    pub fn push(&self, op: Op) {
        self.0.borrow_mut().push(op);
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().clone()
    }

    /// Drops the slot reads so ordering assertions stay readable.
    pub fn ops_without_reads(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::ReadSlot(_)))
            .collect()
    }
}

/// ADC whose scan completes as soon as it is triggered, unless stalled.
pub struct FakeAdc {
    journal: Journal,
    pub ready: bool,
    pub stalled: bool,
    pub slots: [u16; SCAN_SLOTS],
}

impl FakeAdc {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ready: false,
            stalled: false,
            slots: [0; SCAN_SLOTS],
        }
    }

    pub fn set_fraction(&mut self, slot: usize, fraction: f32) {
        self.slots[slot] = raw(fraction);
    }
}

impl AdcScanner for FakeAdc {
    fn scan_complete(&self) -> bool {
        self.ready
    }

    fn read_slot(&mut self, slot: usize) -> u16 {
        self.journal.push(Op::ReadSlot(slot));
        self.slots[slot]
    }

    fn clear_ready(&mut self) {
        self.journal.push(Op::ClearReady);
        self.ready = false;
    }

    fn start_conversion(&mut self) {
        self.journal.push(Op::StartConversion);
        if !self.stalled {
            self.ready = true;
        }
    }
}

pub struct FakeMux {
    journal: Journal,
    pub selected: Option<ThermalBank>,
}

impl FakeMux {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            selected: None,
        }
    }
}

impl MuxSelect for FakeMux {
    fn select(&mut self, bank: ThermalBank) {
        self.journal.push(Op::Select(bank));
        self.selected = Some(bank);
    }
}

/// Timer that mirrors the hardware brake: a latched brake holds outputs low.
pub struct FakeTimer {
    journal: Journal,
    pub period: u16,
    pub brake: bool,
    pub moe: bool,
    pub enable_writes: u32,
    pub disable_writes: u32,
    pub legs: [LegTicks; 2],
}

impl FakeTimer {
    pub fn new(journal: Journal, period: u16) -> Self {
        Self {
            journal,
            period,
            brake: false,
            moe: false,
            enable_writes: 0,
            disable_writes: 0,
            legs: [LegTicks::default(); 2],
        }
    }
}

impl PwmTimer for FakeTimer {
    fn period(&self) -> u16 {
        self.period
    }

    fn write_leg(&mut self, leg: Leg, ticks: LegTicks) {
        self.journal.push(Op::WriteLeg(leg, ticks));
        self.legs[leg.as_index()] = ticks;
    }

    fn set_outputs_enabled(&mut self, enabled: bool) {
        self.journal.push(Op::Outputs(enabled));
        if enabled {
            self.enable_writes += 1;
        } else {
            self.disable_writes += 1;
        }
        self.moe = enabled;
    }

    fn brake_latched(&self) -> bool {
        self.journal.push(Op::SampleBrake);
        self.brake
    }
}

pub type Rig = ControlLoop<FakeAdc, FakeMux, FakeTimer>;

/// Builds a control loop on fake hardware with the shipped configuration.
pub fn rig() -> (Rig, Journal) {
    rig_with(ControlConfig::default(), DEFAULT_PWM_PERIOD)
}

pub fn rig_with(config: ControlConfig, period: u16) -> (Rig, Journal) {
    let journal = Journal::default();
    let session = HardwareSession::new(
        FakeAdc::new(journal.clone()),
        FakeMux::new(journal.clone()),
        FakeTimer::new(journal.clone(), period),
        AdcConfig::default(),
    );
    (ControlLoop::new(session, config), journal)
}

/// Sets the rails the next scan will report.
pub fn set_rails(control: &mut Rig, pack: f32, bus: f32) {
    let adc = control.session_mut().acquisition_mut().adc_mut();
    adc.set_fraction(PACK_SLOT, pack);
    adc.set_fraction(BUS_SLOT, bus);
}

pub fn set_brake(control: &mut Rig, latched: bool) {
    control.session_mut().power_mut().timer_mut().brake = latched;
}

pub fn timer(control: &Rig) -> &FakeTimer {
    control.session().power().timer()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn raw(fraction: f32) -> u16 {
    (fraction.clamp(0.0, 1.0) * f32::from(ADC_FULL_SCALE)).round() as u16
}

pub fn approx(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() < 1e-3
}
