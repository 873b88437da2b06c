//! Converter state machine.
//!
//! Sequences soft-start, closed-loop regulation and shutdown for the two-leg
//! power stage. Every call to [`ControlStateMachine::step`] consumes one
//! measurement snapshot plus one fault verdict and produces the duty both
//! phases should run at, together with the output-enable request for the
//! power stage. A fault verdict overrides every other rule and FAULT has no
//! exit: only a controller reset leaves it.

use core::fmt;

use crate::acquisition::AnalogMeasurements;
use crate::config::ControlConfig;
use crate::fault::BoardStatus;

pub mod law;

pub use law::active_duty;

/// Converter lifecycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ControlState {
    #[default]
    Idle,
    Precharge,
    Active,
    Fault,
}

impl ControlState {
    /// Deterministic index used by telemetry codes.
    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            ControlState::Idle => 0,
            ControlState::Precharge => 1,
            ControlState::Active => 2,
            ControlState::Fault => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(ControlState::Idle),
            1 => Some(ControlState::Precharge),
            2 => Some(ControlState::Active),
            3 => Some(ControlState::Fault),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ControlState::Idle => "idle",
            ControlState::Precharge => "precharge",
            ControlState::Active => "active",
            ControlState::Fault => "fault",
        }
    }

    /// Returns `true` for the states that drive the power stage.
    #[must_use]
    pub const fn is_switching(self) -> bool {
        matches!(self, ControlState::Precharge | ControlState::Active)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Power-flow direction of the bidirectional converter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    /// Bus to pack, stepping down.
    #[default]
    Buck,
    /// Pack to bus, stepping up.
    Boost,
}

impl Direction {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Direction::Buck => "buck",
            Direction::Boost => "boost",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the control loop knows after a cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControlContext {
    pub state: ControlState,
    pub direction: Direction,
    pub measurements: AnalogMeasurements,
    pub status: BoardStatus,
    pub duty_a: f32,
    pub duty_b: f32,
}

impl ControlContext {
    /// Power-on context: IDLE, BUCK, zero duty.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ControlState::Idle,
            direction: Direction::Buck,
            measurements: AnalogMeasurements::zeroed(),
            status: BoardStatus::healthy(),
            duty_a: 0.0,
            duty_b: 0.0,
        }
    }

    /// Context parked in `state` with both phases at `duty`.
    #[must_use]
    pub const fn in_state(state: ControlState, duty: f32) -> Self {
        let mut context = Self::new();
        context.state = state;
        context.duty_a = duty;
        context.duty_b = duty;
        context
    }
}

impl Default for ControlContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What the power stage should do with its outputs this cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputRequest {
    Enable,
    Disable,
    /// Leave the outputs as they are.
    Hold,
}

/// State change observed during a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: ControlState,
    pub to: ControlState,
}

/// Result of one [`ControlStateMachine::step`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub duty_a: f32,
    pub duty_b: f32,
    pub outputs: OutputRequest,
    pub transition: Option<Transition>,
    /// Set when a pending direction request was adopted this step.
    pub direction_changed: bool,
}

/// The converter state machine.
#[derive(Clone, Debug)]
pub struct ControlStateMachine {
    config: ControlConfig,
    context: ControlContext,
    requested_direction: Direction,
}

impl ControlStateMachine {
    /// Creates a machine in IDLE with zero duty.
    #[must_use]
    pub const fn new(config: ControlConfig) -> Self {
        Self::with_context(config, ControlContext::new())
    }

    /// Resumes from an explicit context.
    #[must_use]
    pub const fn with_context(config: ControlConfig, context: ControlContext) -> Self {
        Self {
            config,
            requested_direction: context.direction,
            context,
        }
    }

    pub const fn context(&self) -> &ControlContext {
        &self.context
    }

    pub const fn state(&self) -> ControlState {
        self.context.state
    }

    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Requests a power-flow direction; adopted on the next step.
    ///
    /// While ACTIVE a change forces the converter back through PRECHARGE
    /// from zero duty instead of jumping straight to the new operating point.
    pub fn set_direction(&mut self, direction: Direction) {
        self.requested_direction = direction;
    }

    pub const fn requested_direction(&self) -> Direction {
        self.requested_direction
    }

    /// Runs one cycle of the state machine.
    pub fn step(&mut self, measurements: AnalogMeasurements, status: BoardStatus) -> StepOutcome {
        self.context.measurements = measurements;
        self.context.status = status;

        let from = self.context.state;
        let previous_direction = self.context.direction;

        let (duty, outputs) = if status.is_fault() {
            self.context.state = ControlState::Fault;
            (0.0, OutputRequest::Disable)
        } else {
            match from {
                ControlState::Idle => self.idle(),
                ControlState::Precharge => self.precharge(),
                ControlState::Active => self.active(),
                ControlState::Fault => (0.0, OutputRequest::Disable),
            }
        };

        self.context.duty_a = duty;
        self.context.duty_b = duty;

        let to = self.context.state;
        StepOutcome {
            duty_a: duty,
            duty_b: duty,
            outputs,
            transition: (from != to).then_some(Transition { from, to }),
            direction_changed: previous_direction != self.context.direction,
        }
    }

    fn rails_present(&self) -> bool {
        let threshold = self.config.presence_threshold;
        self.context.measurements.pack_voltage > threshold
            || self.context.measurements.bus_voltage > threshold
    }

    fn idle(&mut self) -> (f32, OutputRequest) {
        self.context.direction = self.requested_direction;
        if !self.rails_present() {
            return (0.0, OutputRequest::Disable);
        }

        self.context.state = ControlState::Precharge;
        (self.ramp(0.0), OutputRequest::Enable)
    }

    fn precharge(&mut self) -> (f32, OutputRequest) {
        self.context.direction = self.requested_direction;
        let duty = self.context.duty_a;
        if duty >= self.config.precharge_target {
            self.context.state = ControlState::Active;
            return (self.config.precharge_target, OutputRequest::Hold);
        }

        (self.ramp(duty), OutputRequest::Hold)
    }

    fn active(&mut self) -> (f32, OutputRequest) {
        if !self.rails_present() {
            self.context.state = ControlState::Idle;
            return (0.0, OutputRequest::Disable);
        }

        if self.requested_direction != self.context.direction {
            self.context.direction = self.requested_direction;
            self.context.state = ControlState::Precharge;
            return (0.0, OutputRequest::Hold);
        }

        let duty = active_duty(self.context.direction, &self.context.measurements, &self.config);
        (duty, OutputRequest::Hold)
    }

    fn ramp(&self, duty: f32) -> f32 {
        (duty + self.config.precharge_step).min(self.config.precharge_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brake() -> BoardStatus {
        BoardStatus {
            brake_latched: true,
            ..BoardStatus::healthy()
        }
    }

    #[test]
    fn idle_without_rails_stays_idle() {
        let mut machine = ControlStateMachine::new(ControlConfig::default());
        let outcome = machine.step(AnalogMeasurements::with_rails(0.0, 0.0), BoardStatus::healthy());

        assert_eq!(machine.state(), ControlState::Idle);
        assert_eq!(outcome.transition, None);
        assert_eq!(outcome.outputs, OutputRequest::Disable);
        assert!(outcome.duty_a.abs() < f32::EPSILON);
        assert!(outcome.duty_b.abs() < f32::EPSILON);
    }

    #[test]
    fn idle_with_pack_present_starts_precharge() {
        let mut machine = ControlStateMachine::new(ControlConfig::default());
        let outcome = machine.step(AnalogMeasurements::with_rails(0.10, 0.0), BoardStatus::healthy());

        assert_eq!(machine.state(), ControlState::Precharge);
        assert_eq!(
            outcome.transition,
            Some(Transition {
                from: ControlState::Idle,
                to: ControlState::Precharge
            })
        );
        assert_eq!(outcome.outputs, OutputRequest::Enable);
        assert!((outcome.duty_a - 0.01).abs() < 1e-6);
        assert!((outcome.duty_b - 0.01).abs() < 1e-6);
    }

    #[test]
    fn rail_exactly_at_threshold_is_not_present() {
        let mut machine = ControlStateMachine::new(ControlConfig::default());
        machine.step(AnalogMeasurements::with_rails(0.05, 0.05), BoardStatus::healthy());
        assert_eq!(machine.state(), ControlState::Idle);
    }

    #[test]
    fn precharge_at_target_enters_active() {
        let context = ControlContext::in_state(ControlState::Precharge, 0.10);
        let mut machine = ControlStateMachine::with_context(ControlConfig::default(), context);

        let outcome = machine.step(AnalogMeasurements::with_rails(0.5, 0.5), BoardStatus::healthy());

        assert_eq!(machine.state(), ControlState::Active);
        assert!((outcome.duty_a - 0.10).abs() < 1e-6);
        assert_eq!(outcome.outputs, OutputRequest::Hold);
    }

    #[test]
    fn active_with_brake_latched_faults() {
        let context = ControlContext::in_state(ControlState::Active, 0.5);
        let mut machine = ControlStateMachine::with_context(ControlConfig::default(), context);

        let outcome = machine.step(AnalogMeasurements::with_rails(0.5, 0.5), brake());

        assert_eq!(machine.state(), ControlState::Fault);
        assert_eq!(outcome.outputs, OutputRequest::Disable);
        assert!(outcome.duty_a.abs() < f32::EPSILON);
        assert!(outcome.duty_b.abs() < f32::EPSILON);
    }

    #[test]
    fn fault_is_sticky_once_flags_clear() {
        let mut machine = ControlStateMachine::new(ControlConfig::default());
        machine.step(AnalogMeasurements::with_rails(0.5, 0.5), brake());

        for _ in 0..5 {
            let outcome =
                machine.step(AnalogMeasurements::with_rails(0.5, 0.5), BoardStatus::healthy());
            assert_eq!(outcome.transition, None);
            assert!(outcome.duty_a.abs() < f32::EPSILON);
        }
        assert_eq!(machine.state(), ControlState::Fault);
    }

    #[test]
    fn active_drops_to_idle_when_both_rails_vanish() {
        let context = ControlContext::in_state(ControlState::Active, 0.5);
        let mut machine = ControlStateMachine::with_context(ControlConfig::default(), context);

        let outcome = machine.step(AnalogMeasurements::with_rails(0.05, 0.01), BoardStatus::healthy());

        assert_eq!(machine.state(), ControlState::Idle);
        assert_eq!(outcome.outputs, OutputRequest::Disable);
        assert!(outcome.duty_a.abs() < f32::EPSILON);
    }

    #[test]
    fn direction_change_while_active_restarts_precharge() {
        let context = ControlContext::in_state(ControlState::Active, 0.5);
        let mut machine = ControlStateMachine::with_context(ControlConfig::default(), context);
        machine.set_direction(Direction::Boost);

        let outcome = machine.step(AnalogMeasurements::with_rails(0.5, 0.5), BoardStatus::healthy());

        assert_eq!(machine.state(), ControlState::Precharge);
        assert_eq!(machine.context().direction, Direction::Boost);
        assert!(outcome.direction_changed);
        assert!(outcome.duty_a.abs() < f32::EPSILON);
        assert_eq!(outcome.outputs, OutputRequest::Hold);
    }

    #[test]
    fn direction_request_in_idle_is_adopted_without_transition() {
        let mut machine = ControlStateMachine::new(ControlConfig::default());
        machine.set_direction(Direction::Boost);

        let outcome = machine.step(AnalogMeasurements::zeroed(), BoardStatus::healthy());

        assert_eq!(machine.context().direction, Direction::Boost);
        assert!(outcome.direction_changed);
        assert_eq!(outcome.transition, None);
    }

    #[test]
    fn state_index_round_trips() {
        for state in [
            ControlState::Idle,
            ControlState::Precharge,
            ControlState::Active,
            ControlState::Fault,
        ] {
            assert_eq!(ControlState::from_index(state.as_index()), Some(state));
        }
        assert_eq!(ControlState::from_index(9), None);
    }
}
