//! Fixed-point PI velocity controller.
//!
//! One [`MotorController`] per motor. The board's control task calls
//! [`control_step`](MotorController::control_step) at a fixed rate with the
//! encoder's latest period; the controller linearises the period into a rate,
//! runs the PI law and programs the bridge.
//!
//! # Control law
//!
//! ```text
//! feedback = K / last_period
//! error    = |target| - feedback
//! integral = clamp(integral + error, -windup, +windup)
//! output   = (error * kp) >> 4  +  (integral * ki) >> 4
//! duty     = clamp(output, min_duty, max_duty)
//! ```
//!
//! Gains are scaled by 1/16. Intermediates are widened to `i32` so the
//! products cannot overflow; stored state stays 16-bit. Direction comes from
//! the sign of the target, never from the output.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::config::MotorConfig;
//! use lace_kernel::control::{EncoderState, MotorController};
//! use lace_kernel::hal::MockBridge;
//! use lace_kernel::traits::BridgeDrive;
//! use lace_kernel::transport::OperatingMode;
//!
//! let mut motor = MotorController::new(&MotorConfig::default());
//! let mut bridge = MockBridge::new();
//! let encoder = EncoderState::new();
//!
//! motor.set_target(-40);
//! motor.control_step(OperatingMode::Velocity, &encoder, &mut bridge).unwrap();
//!
//! assert_eq!(bridge.drive, BridgeDrive::Reverse);
//! assert!(bridge.duty > 0);
//! ```

use super::encoder::EncoderState;
use crate::config::MotorConfig;
use crate::traits::{Direction, HBridge};
use crate::transport::OperatingMode;

/// Per-motor controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorState {
    /// Signed target; the sign selects direction.
    pub target: i16,
    /// Accumulated error, always within `±windup_limit`.
    pub integral_accum: i16,
    /// Proportional gain in 1/16 units.
    pub kp: u8,
    /// Integral gain in 1/16 units.
    pub ki: u8,
    /// Anti-windup bound on `integral_accum`.
    pub windup_limit: i16,
    /// Rate measured by the last control step.
    pub last_feedback: i16,
}

impl MotorState {
    /// Idle state with the given gains.
    pub const fn new(kp: u8, ki: u8, windup_limit: i16) -> Self {
        Self {
            target: 0,
            integral_accum: 0,
            kp,
            ki,
            windup_limit,
            last_feedback: 0,
        }
    }
}

/// PI controller driving one H-bridge channel.
#[derive(Clone, Debug)]
pub struct MotorController {
    state: MotorState,
    feedback_constant: u16,
    min_duty: u8,
    max_duty: u8,
    duty: u8,
}

impl MotorController {
    /// Creates a stopped controller.
    ///
    /// A duty range given in reverse is swapped.
    pub fn new(config: &MotorConfig) -> Self {
        Self {
            state: MotorState::new(config.kp, config.ki, config.windup_limit),
            feedback_constant: config.feedback_constant,
            min_duty: config.min_duty.min(config.max_duty),
            max_duty: config.max_duty.max(config.min_duty),
            duty: 0,
        }
    }

    /// Set a new target and clear the integral.
    pub fn set_target(&mut self, target: i16) {
        self.state.target = target;
        self.state.integral_accum = 0;
    }

    /// Rate corresponding to an encoder period. A zero period counts as one.
    #[inline]
    pub fn feedback_from_period(&self, period: u16) -> i16 {
        let rate = self.feedback_constant / period.max(1);
        rate.min(i16::MAX as u16) as i16
    }

    /// Fold `error` into the integral and return the saturated PI output.
    pub fn integrate(&mut self, error: i16) -> u8 {
        let limit = i32::from(self.state.windup_limit.max(0));
        let integral = (i32::from(self.state.integral_accum) + i32::from(error)).clamp(-limit, limit);
        self.state.integral_accum = integral as i16;

        let p = (i32::from(error) * i32::from(self.state.kp)) >> 4;
        let i = (integral * i32::from(self.state.ki)) >> 4;
        (p + i).clamp(i32::from(self.min_duty), i32::from(self.max_duty)) as u8
    }

    /// Run one control period and program `bridge`.
    ///
    /// A zero target brakes with zero duty before anything else is
    /// considered. In [`OperatingMode::Pwm`] the target magnitude is the duty;
    /// in [`OperatingMode::Velocity`] the PI law produces it. Feedback is
    /// measured in both modes. Returns the duty written.
    pub fn control_step<B: HBridge>(
        &mut self,
        mode: OperatingMode,
        encoder: &EncoderState,
        bridge: &mut B,
    ) -> Result<u8, B::Error> {
        let feedback = self.feedback_from_period(encoder.last_period());
        self.state.last_feedback = feedback;

        let direction = self.direction();
        if direction == Direction::Stopped {
            self.duty = 0;
            bridge.brake()?;
            return Ok(0);
        }

        let magnitude = self.magnitude();
        let duty = match mode {
            OperatingMode::Pwm => magnitude.min(u16::from(self.max_duty)) as u8,
            OperatingMode::Velocity => {
                let error = (i32::from(magnitude) - i32::from(feedback))
                    .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                self.integrate(error)
            }
        };

        bridge.drive(direction.bridge_drive())?;
        bridge.set_duty(duty)?;
        self.duty = duty;
        Ok(duty)
    }

    /// Signed target.
    #[inline]
    pub fn target(&self) -> i16 {
        self.state.target
    }

    /// Target magnitude.
    #[inline]
    pub fn magnitude(&self) -> u16 {
        self.state.target.unsigned_abs()
    }

    /// Direction encoded by the target.
    #[inline]
    pub fn direction(&self) -> Direction {
        Direction::from_target(self.state.target)
    }

    /// Current integral accumulator.
    #[inline]
    pub fn integral(&self) -> i16 {
        self.state.integral_accum
    }

    /// Rate measured by the last control step.
    #[inline]
    pub fn last_feedback(&self) -> i16 {
        self.state.last_feedback
    }

    /// Duty written by the last control step.
    #[inline]
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Snapshot of the controller state.
    pub fn state(&self) -> MotorState {
        self.state
    }
}
