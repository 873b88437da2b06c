mod support;

use converter_core::control::ControlState;
use converter_core::power_stage::{EnableResult, PowerStage};
use support::{
    FakeTimer, Journal, MUX_THERMAL_SLOT, Rig, THERMAL_SLOT, approx, rig, set_brake, set_rails,
    timer,
};

const SPIN_LIMIT: u32 = 64;

/// Drives a fresh rig into `state` with healthy flags.
fn rig_in(state: ControlState) -> Rig {
    let (mut control, _journal) = rig();
    let rails = if state == ControlState::Idle { 0.0 } else { 0.6 };
    set_rails(&mut control, rails, rails);
    control.prime(SPIN_LIMIT);

    if state != ControlState::Idle {
        for _ in 0..32 {
            if control.cycle(false).state == state {
                break;
            }
        }
    }
    assert_eq!(control.state(), state);
    control
}

#[test]
fn brake_faults_every_state() {
    for state in [ControlState::Idle, ControlState::Precharge, ControlState::Active] {
        let mut control = rig_in(state);
        set_brake(&mut control, true);

        let report = control.cycle(false);

        assert_eq!(report.state, ControlState::Fault, "from {state}");
        assert!(report.entered_fault());
        assert!(report.status.brake_latched);
        assert!(approx(report.duty_a, 0.0) && approx(report.duty_b, 0.0));
        assert!(!report.outputs_enabled);
        assert!(!timer(&control).moe);
        assert_eq!(timer(&control).legs[0].on, 0);
        assert_eq!(timer(&control).legs[1].on, 0);
    }
}

#[test]
fn over_temperature_faults_active_converter() {
    let mut control = rig_in(ControlState::Active);
    control
        .session_mut()
        .acquisition_mut()
        .adc_mut()
        .set_fraction(THERMAL_SLOT, 0.96);

    let report = control.cycle(false);

    assert_eq!(report.state, ControlState::Fault);
    assert!(report.status.over_temperature);
    assert!(!report.status.brake_latched);
    assert_eq!(report.enable_result, Some(EnableResult::Changed));
    assert_eq!(timer(&control).disable_writes, 2);
}

#[test]
fn multiplexed_thermistor_faults_before_switching() {
    for state in [ControlState::Idle, ControlState::Precharge] {
        let mut control = rig_in(state);
        control
            .session_mut()
            .acquisition_mut()
            .adc_mut()
            .set_fraction(MUX_THERMAL_SLOT, 0.96);

        let report = control.cycle(false);

        assert_eq!(report.state, ControlState::Fault, "from {state}");
        assert!(report.entered_fault());
        assert!(report.status.over_temperature);
        assert!(!report.status.brake_latched);
        assert!(approx(report.duty_a, 0.0) && approx(report.duty_b, 0.0));
        assert!(!timer(&control).moe);

        let thermals = control.context().measurements.thermals;
        assert!(thermals[0] < 0.95 && thermals[1] < 0.95, "from {state}");
        assert!(
            thermals[2] > 0.95 || thermals[3] > 0.95,
            "shared slot sample lands in a multiplexed thermal"
        );
    }
}

#[test]
fn fault_survives_cleared_flags() {
    let mut control = rig_in(ControlState::Active);
    set_brake(&mut control, true);
    control.cycle(false);

    set_brake(&mut control, false);
    for _ in 0..20 {
        let report = control.cycle(false);
        assert_eq!(report.state, ControlState::Fault);
        assert_eq!(report.transition, None);
        assert!(approx(report.duty_a, 0.0));
    }

    assert_eq!(timer(&control).enable_writes, 1, "no re-enable after fault");
    assert!(!timer(&control).moe);
}

#[test]
fn comms_loss_is_reported_without_shutdown() {
    let mut control = rig_in(ControlState::Active);

    let report = control.cycle(true);

    assert_eq!(report.state, ControlState::Active);
    assert!(report.status.comms_lost);
    assert!(!report.status.is_fault());
    assert!(report.outputs_enabled);
}

#[test]
fn enable_is_idempotent() {
    let journal = Journal::default();
    let mut stage = PowerStage::new(FakeTimer::new(journal, 1_599));

    assert_eq!(stage.enable_outputs(true), EnableResult::Changed);
    assert_eq!(stage.enable_outputs(true), EnableResult::Unchanged);
    assert_eq!(stage.timer().enable_writes, 1);

    assert_eq!(stage.enable_outputs(false), EnableResult::Changed);
    assert_eq!(stage.enable_outputs(false), EnableResult::Unchanged);
    // One write from construction, one from the explicit disable.
    assert_eq!(stage.timer().disable_writes, 2);
}

#[test]
fn enable_is_refused_while_brake_latched() {
    let journal = Journal::default();
    let mut stage = PowerStage::new(FakeTimer::new(journal, 1_599));
    stage.timer_mut().brake = true;

    assert_eq!(stage.enable_outputs(true), EnableResult::RefusedBrake);
    assert!(!stage.outputs_enabled());
    assert_eq!(stage.timer().enable_writes, 0);

    stage.timer_mut().brake = false;
    assert_eq!(stage.enable_outputs(true), EnableResult::Changed);
    assert!(stage.timer().moe);
}

#[test]
fn ticks_stay_within_period_for_every_duty() {
    for period in [0_u16, 1, 255, 1_599, u16::MAX] {
        let mut stage = PowerStage::new(FakeTimer::new(Journal::default(), period));
        for step in 0..=200_u16 {
            let duty = f32::from(step) / 200.0;
            stage.apply_duty(duty, 1.0 - duty);
            for ticks in stage.timer().legs {
                assert!(ticks.on <= period);
                assert_eq!(ticks.on + ticks.complementary, period);
            }
        }
    }
}
