//! Tunable thresholds and peripheral descriptions for the converter.
//!
//! Every value the control cycle compares against lives here so the firmware
//! can keep them as compile-time constants while the emulator and tests build
//! alternative configurations in code.

use core::fmt;

/// Fraction of full scale above which a voltage rail counts as present.
pub const PRESENCE_THRESHOLD: f32 = 0.05;
/// Duty the soft-start ramp climbs to before closed-loop regulation begins.
pub const PRECHARGE_TARGET: f32 = 0.10;
/// Duty increment applied on every precharge cycle.
pub const PRECHARGE_STEP: f32 = 0.01;
/// Lower clamp for the closed-loop duty.
pub const MIN_ACTIVE_DUTY: f32 = 0.10;
/// Upper clamp for the closed-loop duty.
pub const MAX_ACTIVE_DUTY: f32 = 0.90;
/// Denominator measurements below this floor skip the ratio computation.
pub const RATIO_DENOMINATOR_FLOOR: f32 = 0.01;
/// Thermal fraction above which the board reports over-temperature.
pub const OVER_TEMPERATURE_THRESHOLD: f32 = 0.95;

/// Full-scale count of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;

/// Default auto-reload value for the switching timer.
pub const DEFAULT_PWM_PERIOD: u16 = 1_599;
/// Default dead time inserted between complementary edges, in timer ticks.
pub const DEFAULT_DEAD_TIME_TICKS: u8 = 32;

/// Thresholds consumed by the state machine and fault monitor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControlConfig {
    pub presence_threshold: f32,
    pub precharge_target: f32,
    pub precharge_step: f32,
    pub min_active_duty: f32,
    pub max_active_duty: f32,
    pub denominator_floor: f32,
    pub over_temperature_threshold: f32,
}

impl ControlConfig {
    /// Returns the configuration the board ships with.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            presence_threshold: PRESENCE_THRESHOLD,
            precharge_target: PRECHARGE_TARGET,
            precharge_step: PRECHARGE_STEP,
            min_active_duty: MIN_ACTIVE_DUTY,
            max_active_duty: MAX_ACTIVE_DUTY,
            denominator_floor: RATIO_DENOMINATOR_FLOOR,
            over_temperature_threshold: OVER_TEMPERATURE_THRESHOLD,
        }
    }

    /// Overrides the precharge ramp target and step.
    #[must_use]
    pub const fn with_precharge(mut self, target: f32, step: f32) -> Self {
        self.precharge_target = target;
        self.precharge_step = step;
        self
    }

    /// Overrides the closed-loop duty bounds.
    #[must_use]
    pub const fn with_active_limits(mut self, min: f32, max: f32) -> Self {
        self.min_active_duty = min;
        self.max_active_duty = max;
        self
    }

    /// Checks that every threshold is a usable fraction and the bounds are ordered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            self.presence_threshold,
            self.precharge_target,
            self.min_active_duty,
            self.max_active_duty,
            self.denominator_floor,
            self.over_temperature_threshold,
        ];
        if fractions
            .iter()
            .any(|value| !(0.0..=1.0).contains(value))
        {
            return Err(ConfigError::FractionOutOfRange);
        }

        let step = self.precharge_step;
        if step.is_nan() || step <= 0.0 || step > self.precharge_target {
            return Err(ConfigError::InvalidPrechargeStep);
        }

        if self.min_active_duty > self.max_active_duty {
            return Err(ConfigError::InvertedDutyLimits);
        }

        if self.denominator_floor <= 0.0 {
            return Err(ConfigError::ZeroDenominatorFloor);
        }

        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons a [`ControlConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    FractionOutOfRange,
    InvalidPrechargeStep,
    InvertedDutyLimits,
    ZeroDenominatorFloor,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigError::FractionOutOfRange => "threshold outside [0, 1]",
            ConfigError::InvalidPrechargeStep => "precharge step must be in (0, target]",
            ConfigError::InvertedDutyLimits => "minimum active duty exceeds maximum",
            ConfigError::ZeroDenominatorFloor => "ratio denominator floor must be positive",
        })
    }
}

/// Switching timer description.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PwmConfig {
    /// Auto-reload value; tick counts never exceed it.
    pub period: u16,
    pub dead_time_ticks: u8,
}

impl PwmConfig {
    #[must_use]
    pub const fn new(period: u16, dead_time_ticks: u8) -> Self {
        Self {
            period,
            dead_time_ticks,
        }
    }
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PWM_PERIOD, DEFAULT_DEAD_TIME_TICKS)
    }
}

/// ADC description.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdcConfig {
    pub full_scale: u16,
}

impl AdcConfig {
    #[must_use]
    pub const fn new(full_scale: u16) -> Self {
        Self { full_scale }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self::new(ADC_FULL_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_is_valid() {
        assert_eq!(ControlConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_duty_limits() {
        let config = ControlConfig::new().with_active_limits(0.8, 0.2);
        assert_eq!(config.validate(), Err(ConfigError::InvertedDutyLimits));
    }

    #[test]
    fn rejects_step_larger_than_target() {
        let config = ControlConfig::new().with_precharge(0.05, 0.2);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPrechargeStep));
    }

    #[test]
    fn rejects_thresholds_above_full_scale() {
        let mut config = ControlConfig::new();
        config.over_temperature_threshold = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::FractionOutOfRange));
    }
}
