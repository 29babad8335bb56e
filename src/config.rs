//! Tuning constants for the kernel, grouped per subsystem.
//!
//! Every struct has board defaults and `with_*` builders, so a board crate
//! only names what it changes.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::config::{KernelConfig, MotorConfig, SchedulerConfig};
//!
//! // Use defaults
//! let config = KernelConfig::default();
//! assert_eq!(config.motor.kp, 100);
//!
//! // Or customize
//! let config = KernelConfig::default()
//!     .with_motor(MotorConfig::default().with_gains(80, 4))
//!     .with_scheduler(SchedulerConfig::default().with_control_divider(40));
//! assert_eq!(config.motor.ki, 4);
//! ```

use crate::transport::OperatingMode;

// ============================================================================
// Kernel Config
// ============================================================================

/// Complete kernel configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    /// PI controller and duty limits
    pub motor: MotorConfig,
    /// Peripheral board tick dividers and heartbeat
    pub scheduler: SchedulerConfig,
    /// Bus protocol parameters
    pub transport: TransportConfig,
    /// Motherboard timer tick
    pub timer: TimerConfig,
}

impl KernelConfig {
    /// Set motor configuration
    pub fn with_motor(mut self, motor: MotorConfig) -> Self {
        self.motor = motor;
        self
    }

    /// Set scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set transport configuration
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set timer configuration
    pub fn with_timer(mut self, timer: TimerConfig) -> Self {
        self.timer = timer;
        self
    }
}

// ============================================================================
// Motor Config
// ============================================================================

/// PI controller configuration. Gains are in 1/16 units.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    /// Proportional gain
    pub kp: u8,
    /// Integral gain
    pub ki: u8,
    /// Bound on the integral accumulator
    pub windup_limit: i16,
    /// Numerator of the period-to-rate linearisation
    pub feedback_constant: u16,
    /// Lowest duty written while driving
    pub min_duty: u8,
    /// Highest duty written
    pub max_duty: u8,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            kp: 100,
            ki: 5,
            windup_limit: 816,
            feedback_constant: 5000,
            min_duty: 0,
            max_duty: 255,
        }
    }
}

impl MotorConfig {
    /// Set both gains
    pub fn with_gains(mut self, kp: u8, ki: u8) -> Self {
        self.kp = kp;
        self.ki = ki;
        self
    }

    /// Set the anti-windup bound (negative values are taken as zero)
    pub fn with_windup_limit(mut self, limit: i16) -> Self {
        self.windup_limit = limit.max(0);
        self
    }

    /// Set the linearisation constant
    pub fn with_feedback_constant(mut self, constant: u16) -> Self {
        self.feedback_constant = constant;
        self
    }

    /// Set the duty range; bounds are swapped if given in reverse
    pub fn with_duty_range(mut self, min: u8, max: u8) -> Self {
        self.min_duty = min.min(max);
        self.max_duty = max.max(min);
        self
    }
}

// ============================================================================
// Scheduler Config
// ============================================================================

/// Peripheral board tick and task dividers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Tick interrupt rate
    pub tick_hz: u32,
    /// Ticks per control-loop run
    pub control_divider: u16,
    /// Ticks per heartbeat task run
    pub heartbeat_divider: u16,
    /// Heartbeat runs per indicator toggle in PWM mode
    pub heartbeat_pwm: u8,
    /// Heartbeat runs per indicator toggle in velocity mode
    pub heartbeat_velocity: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_hz: 20_000,
            control_divider: 60,
            heartbeat_divider: 200,
            heartbeat_pwm: 50,
            heartbeat_velocity: 10,
        }
    }
}

impl SchedulerConfig {
    /// Set the tick rate
    pub fn with_tick_hz(mut self, hz: u32) -> Self {
        self.tick_hz = hz;
        self
    }

    /// Set the control-loop divider (minimum 1)
    pub fn with_control_divider(mut self, divider: u16) -> Self {
        self.control_divider = divider.max(1);
        self
    }

    /// Set the heartbeat divider (minimum 1)
    pub fn with_heartbeat_divider(mut self, divider: u16) -> Self {
        self.heartbeat_divider = divider.max(1);
        self
    }

    /// Set the per-mode heartbeat rates (minimum 1)
    pub fn with_heartbeat_rates(mut self, pwm: u8, velocity: u8) -> Self {
        self.heartbeat_pwm = pwm.max(1);
        self.heartbeat_velocity = velocity.max(1);
        self
    }

    /// Heartbeat runs per toggle for `mode`
    pub fn heartbeat_rate(&self, mode: OperatingMode) -> u8 {
        match mode {
            OperatingMode::Pwm => self.heartbeat_pwm,
            OperatingMode::Velocity => self.heartbeat_velocity,
        }
    }

    /// Control-loop rate in hertz
    pub fn control_hz(&self) -> u32 {
        self.tick_hz / u32::from(self.control_divider.max(1))
    }
}

// ============================================================================
// Transport Config
// ============================================================================

/// Bus protocol configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    /// Byte answered to `VERSION`
    pub version: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { version: 0x01 }
    }
}

impl TransportConfig {
    /// Set the version byte
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }
}

// ============================================================================
// Timer Config
// ============================================================================

/// Motherboard timer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerConfig {
    /// Tick rate of the timer table
    pub tick_hz: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { tick_hz: 1_000 }
    }
}

impl TimerConfig {
    /// Set the tick rate
    pub fn with_tick_hz(mut self, hz: u32) -> Self {
        self.tick_hz = hz;
        self
    }

    /// Ticks for a delay of `ms` milliseconds, saturating at `u16::MAX`
    pub fn ticks_for_ms(&self, ms: u32) -> u16 {
        let ticks = u64::from(ms) * u64::from(self.tick_hz) / 1_000;
        ticks.min(u64::from(u16::MAX)) as u16
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = KernelConfig::default();
        assert_eq!(config.motor.kp, 100);
        assert_eq!(config.motor.ki, 5);
        assert_eq!(config.motor.windup_limit, 816);
        assert_eq!(config.scheduler.tick_hz, 20_000);
        assert_eq!(config.transport.version, 0x01);
        assert_eq!(config.timer.tick_hz, 1_000);
    }

    #[test]
    fn builder_pattern() {
        let config = KernelConfig::default()
            .with_motor(MotorConfig::default().with_gains(64, 2).with_windup_limit(400))
            .with_transport(TransportConfig::default().with_version(0x02))
            .with_timer(TimerConfig::default().with_tick_hz(500));

        assert_eq!(config.motor.kp, 64);
        assert_eq!(config.motor.windup_limit, 400);
        assert_eq!(config.transport.version, 0x02);
        assert_eq!(config.timer.tick_hz, 500);
    }

    // =========================================================================
    // MotorConfig Tests
    // =========================================================================

    #[test]
    fn windup_limit_not_negative() {
        let motor = MotorConfig::default().with_windup_limit(-5);
        assert_eq!(motor.windup_limit, 0);
    }

    #[test]
    fn duty_range_ordered() {
        let motor = MotorConfig::default().with_duty_range(200, 20);
        assert_eq!(motor.min_duty, 20);
        assert_eq!(motor.max_duty, 200);
    }

    // =========================================================================
    // SchedulerConfig Tests
    // =========================================================================

    #[test]
    fn heartbeat_rate_follows_mode() {
        let sched = SchedulerConfig::default();
        assert_eq!(sched.heartbeat_rate(OperatingMode::Pwm), 50);
        assert_eq!(sched.heartbeat_rate(OperatingMode::Velocity), 10);
    }

    #[test]
    fn dividers_never_zero() {
        let sched = SchedulerConfig::default()
            .with_control_divider(0)
            .with_heartbeat_divider(0)
            .with_heartbeat_rates(0, 0);
        assert_eq!(sched.control_divider, 1);
        assert_eq!(sched.heartbeat_divider, 1);
        assert_eq!(sched.heartbeat_pwm, 1);
    }

    #[test]
    fn control_rate() {
        assert_eq!(SchedulerConfig::default().control_hz(), 333);
    }

    // =========================================================================
    // TimerConfig Tests
    // =========================================================================

    #[test]
    fn ticks_for_ms() {
        let timer = TimerConfig::default();
        assert_eq!(timer.ticks_for_ms(250), 250);
        assert_eq!(timer.ticks_for_ms(100_000), u16::MAX);

        let slow = TimerConfig::default().with_tick_hz(100);
        assert_eq!(slow.ticks_for_ms(250), 25);
    }
}
