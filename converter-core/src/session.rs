//! Hardware ownership and the per-cycle control pass.
//!
//! [`HardwareSession`] owns every peripheral backend together with the state
//! cached on top of them (the last scan, the selected thermistor and whether
//! the outputs are enabled). [`ControlLoop`] layers the fault monitor and
//! state machine on top and runs one cycle per call in a fixed order:
//! read, evaluate, step, apply, trigger.

use crate::acquisition::{AnalogAcquisition, AnalogMeasurements};
use crate::config::{AdcConfig, ControlConfig};
use crate::control::{
    ControlContext, ControlState, ControlStateMachine, Direction, OutputRequest, Transition,
};
use crate::fault::{BoardStatus, FaultMonitor};
use crate::hal::{AdcScanner, Leg, LegTicks, MuxSelect, PwmTimer};
use crate::power_stage::{EnableResult, PowerStage};
use crate::status::StatusSnapshot;

/// Peripheral backends plus their cached state.
pub struct HardwareSession<A, M, T> {
    acquisition: AnalogAcquisition<A, M>,
    power: PowerStage<T>,
}

impl<A, M, T> HardwareSession<A, M, T>
where
    A: AdcScanner,
    M: MuxSelect,
    T: PwmTimer,
{
    /// Takes ownership of the backends; outputs start disabled.
    pub fn new(adc: A, mux: M, timer: T, adc_config: AdcConfig) -> Self {
        Self {
            acquisition: AnalogAcquisition::new(adc, mux, adc_config),
            power: PowerStage::new(timer),
        }
    }

    #[must_use]
    pub fn acquisition(&self) -> &AnalogAcquisition<A, M> {
        &self.acquisition
    }

    #[must_use]
    pub fn acquisition_mut(&mut self) -> &mut AnalogAcquisition<A, M> {
        &mut self.acquisition
    }

    #[must_use]
    pub fn power(&self) -> &PowerStage<T> {
        &self.power
    }

    #[must_use]
    pub fn power_mut(&mut self) -> &mut PowerStage<T> {
        &mut self.power
    }

    /// Gives the backends back, e.g. for inspection after a test run.
    #[must_use]
    pub fn into_parts(self) -> (AnalogAcquisition<A, M>, PowerStage<T>) {
        (self.acquisition, self.power)
    }
}

/// What happened during one [`ControlLoop::cycle`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub state: ControlState,
    pub transition: Option<Transition>,
    pub direction: Direction,
    pub direction_changed: bool,
    /// `false` when the cycle ran on the previous scan.
    pub fresh: bool,
    pub status: BoardStatus,
    pub duty_a: f32,
    pub duty_b: f32,
    pub ticks: [LegTicks; 2],
    pub outputs_enabled: bool,
    /// Result of the enable/disable request, if one was issued.
    pub enable_result: Option<EnableResult>,
}

impl CycleReport {
    /// Returns `true` if this cycle latched the FAULT state.
    #[must_use]
    pub fn entered_fault(&self) -> bool {
        matches!(
            self.transition,
            Some(Transition {
                to: ControlState::Fault,
                ..
            })
        )
    }
}

/// Fault monitor and state machine driving a [`HardwareSession`].
pub struct ControlLoop<A, M, T> {
    session: HardwareSession<A, M, T>,
    monitor: FaultMonitor,
    machine: ControlStateMachine,
    cycles: u32,
}

impl<A, M, T> ControlLoop<A, M, T>
where
    A: AdcScanner,
    M: MuxSelect,
    T: PwmTimer,
{
    pub fn new(session: HardwareSession<A, M, T>, config: ControlConfig) -> Self {
        Self {
            session,
            monitor: FaultMonitor::with_threshold(config.over_temperature_threshold),
            machine: ControlStateMachine::new(config),
            cycles: 0,
        }
    }

    /// Triggers the first scan and waits up to `spin_limit` polls for it, then
    /// arms the scan the first cycle will read.
    ///
    /// Returns `false` when the scan did not finish in time; the loop still
    /// runs, starting from zeroed measurements.
    pub fn prime(&mut self, spin_limit: u32) -> bool {
        let primed = self.session.acquisition.prime(spin_limit);
        self.session.acquisition.trigger_next_conversion();
        primed
    }

    /// Runs one control cycle.
    pub fn cycle(&mut self, comms_lost: bool) -> CycleReport {
        let measurements = self.session.acquisition.read_measurements();
        let fresh = self.session.acquisition.last_read_fresh();

        let status = self.evaluate(&measurements, comms_lost);
        let outcome = self.machine.step(measurements, status);

        let power = &mut self.session.power;
        let enable_result = match outcome.outputs {
            OutputRequest::Disable => {
                let result = power.enable_outputs(false);
                power.apply_duty(outcome.duty_a, outcome.duty_b);
                Some(result)
            }
            OutputRequest::Enable => {
                power.apply_duty(outcome.duty_a, outcome.duty_b);
                Some(power.enable_outputs(true))
            }
            OutputRequest::Hold => {
                power.apply_duty(outcome.duty_a, outcome.duty_b);
                None
            }
        };

        self.session.acquisition.trigger_next_conversion();
        self.cycles = self.cycles.wrapping_add(1);

        let context = self.machine.context();
        CycleReport {
            state: context.state,
            transition: outcome.transition,
            direction: context.direction,
            direction_changed: outcome.direction_changed,
            fresh,
            status,
            duty_a: outcome.duty_a,
            duty_b: outcome.duty_b,
            ticks: [power.last_ticks(Leg::A), power.last_ticks(Leg::B)],
            outputs_enabled: power.outputs_enabled(),
            enable_result,
        }
    }

    fn evaluate(&mut self, measurements: &AnalogMeasurements, comms_lost: bool) -> BoardStatus {
        let brake_latched = self.session.power.brake_latched();
        self.monitor.update_status(brake_latched, measurements, comms_lost)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.machine.set_direction(direction);
    }

    #[must_use]
    pub fn context(&self) -> &ControlContext {
        self.machine.context()
    }

    #[must_use]
    pub fn state(&self) -> ControlState {
        self.machine.state()
    }

    /// Snapshot for the status surface.
    #[must_use]
    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(
            self.machine.context(),
            self.session.power.outputs_enabled(),
            self.session.acquisition.stale_reads(),
        )
    }

    #[must_use]
    pub fn session(&self) -> &HardwareSession<A, M, T> {
        &self.session
    }

    #[must_use]
    pub fn session_mut(&mut self) -> &mut HardwareSession<A, M, T> {
        &mut self.session
    }

    /// Completed cycles since construction, wrapping.
    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}
