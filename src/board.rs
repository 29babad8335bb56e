//! Dual H-bridge peripheral board.
//!
//! [`DualMotorBoard`] is the glue around two [`MotorController`]s on the
//! peripheral side of the bus. It is driven from three places:
//!
//! | Caller | Method | Work |
//! |--------|--------|------|
//! | 20 kHz tick interrupt | [`on_tick`](DualMotorBoard::on_tick) | encoder counters, task dividers |
//! | encoder pin-change interrupt | [`on_pin_change`](DualMotorBoard::on_pin_change) | period capture |
//! | bus interrupt (via [`SlaveProtocol`](crate::transport::SlaveProtocol)) | [`CommandHandler`] | targets, mode, telemetry |
//! | main loop | [`take_flags`](DualMotorBoard::take_flags) + [`run_tasks`](DualMotorBoard::run_tasks) | control law, heartbeat |
//!
//! The heartbeat indicator toggles every `heartbeat_rate` heartbeat runs,
//! and that rate follows the operating mode, so a `MODE_SET` over the bus is
//! visible as a change in blink cadence.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::board::DualMotorBoard;
//! use lace_kernel::config::KernelConfig;
//! use lace_kernel::hal::{MockBridge, MockIndicator};
//! use lace_kernel::traits::{BridgeDrive, CommandHandler};
//!
//! let mut board = DualMotorBoard::new(
//!     [MockBridge::new(), MockBridge::new()],
//!     MockIndicator::new(),
//!     MockIndicator::new(),
//!     &KernelConfig::default(),
//! );
//!
//! board.set_targets([100, 0]);
//! let flags = board.take_flags();
//! board.run_tasks(flags).unwrap();
//!
//! assert_eq!(board.bridge(0).duty, 100);
//! assert_eq!(board.bridge(1).drive, BridgeDrive::Brake);
//! ```

use crate::config::{KernelConfig, SchedulerConfig};
use crate::control::{EncoderState, MotorController};
use crate::traits::{CommandHandler, HBridge, Indicator, TickSource};
use crate::transport::OperatingMode;

/// Number of motor channels.
pub const MOTORS: usize = 2;

/// Tasks raised by the tick handler for the main loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskFlags {
    /// Run the control law on both motors.
    pub control: bool,
    /// Run the heartbeat; also the cue to start a current sample.
    pub heartbeat: bool,
}

impl TaskFlags {
    /// Returns true if no task is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.control && !self.heartbeat
    }

    /// Both sets of tasks.
    #[inline]
    pub fn union(self, other: TaskFlags) -> TaskFlags {
        TaskFlags {
            control: self.control || other.control,
            heartbeat: self.heartbeat || other.heartbeat,
        }
    }
}

/// Firmware state of one dual H-bridge board.
pub struct DualMotorBoard<B, L> {
    motors: [MotorController; MOTORS],
    encoders: [EncoderState; MOTORS],
    bridges: [B; MOTORS],
    status: L,
    fault: L,
    sched: SchedulerConfig,
    version: u8,
    mode: OperatingMode,
    current: [u16; MOTORS],
    flags: TaskFlags,
    control_count: u16,
    heartbeat_count: u16,
    heartbeat_runs: u8,
}

impl<B, L> DualMotorBoard<B, L>
where
    B: HBridge,
    L: Indicator,
{
    /// Creates a board in PWM mode with both motors stopped.
    ///
    /// The status indicator starts on and the fault indicator off.
    pub fn new(bridges: [B; MOTORS], mut status: L, mut fault: L, config: &KernelConfig) -> Self {
        status.set(true);
        fault.set(false);
        Self {
            motors: [
                MotorController::new(&config.motor),
                MotorController::new(&config.motor),
            ],
            encoders: [EncoderState::new(); MOTORS],
            bridges,
            status,
            fault,
            sched: config.scheduler.clone(),
            version: config.transport.version,
            mode: OperatingMode::Pwm,
            current: [0; MOTORS],
            flags: TaskFlags::default(),
            control_count: 0,
            heartbeat_count: 0,
            heartbeat_runs: 0,
        }
    }

    /// Brake both bridges and start the tick source.
    pub fn start<T: TickSource>(&mut self, tick: &mut T) -> Result<(), BoardError<B::Error, T::Error>> {
        for bridge in self.bridges.iter_mut() {
            bridge.brake().map_err(BoardError::Bridge)?;
        }
        tick.start(self.sched.tick_hz).map_err(BoardError::Tick)
    }

    /// Stop the tick source and brake both bridges.
    pub fn stop<T: TickSource>(&mut self, tick: &mut T) -> Result<(), BoardError<B::Error, T::Error>> {
        tick.stop().map_err(BoardError::Tick)?;
        for (motor, bridge) in self.motors.iter_mut().zip(self.bridges.iter_mut()) {
            motor.set_target(0);
            bridge.brake().map_err(BoardError::Bridge)?;
        }
        Ok(())
    }

    /// Tick interrupt body.
    pub fn on_tick(&mut self) {
        for enc in self.encoders.iter_mut() {
            enc.tick();
        }

        self.control_count += 1;
        if self.control_count >= self.sched.control_divider {
            self.flags.control = true;
            self.control_count = 0;
        }
        self.heartbeat_count += 1;
        if self.heartbeat_count >= self.sched.heartbeat_divider {
            self.flags.heartbeat = true;
            self.heartbeat_count = 0;
        }
    }

    /// Pin-change interrupt body with the sampled level of each encoder.
    pub fn on_pin_change(&mut self, levels: [bool; MOTORS]) {
        for (enc, level) in self.encoders.iter_mut().zip(levels) {
            enc.on_level(level);
        }
    }

    /// Take and clear the pending task flags.
    pub fn take_flags(&mut self) -> TaskFlags {
        core::mem::take(&mut self.flags)
    }

    /// Run the tasks in `flags`.
    ///
    /// Returns `flags` back so the caller can start a current sample when
    /// the heartbeat ran.
    pub fn run_tasks(&mut self, flags: TaskFlags) -> Result<TaskFlags, B::Error> {
        if flags.heartbeat {
            self.heartbeat();
        }
        if flags.control {
            for ((motor, enc), bridge) in self
                .motors
                .iter_mut()
                .zip(self.encoders.iter())
                .zip(self.bridges.iter_mut())
            {
                motor.control_step(self.mode, enc, bridge)?;
            }
        }
        Ok(flags)
    }

    fn heartbeat(&mut self) {
        self.heartbeat_runs = self.heartbeat_runs.saturating_add(1);
        if self.heartbeat_runs >= self.sched.heartbeat_rate(self.mode) {
            self.status.toggle();
            self.heartbeat_runs = 0;
        }
    }

    /// Store the latest sample from the current-sense ADC.
    pub fn record_current(&mut self, motor: usize, sample: u16) {
        if let Some(slot) = self.current.get_mut(motor) {
            *slot = sample;
        }
    }

    /// Operating mode.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Controller of motor `index` (0 or 1).
    pub fn motor(&self, index: usize) -> &MotorController {
        &self.motors[index]
    }

    /// Encoder of motor `index` (0 or 1).
    pub fn encoder(&self, index: usize) -> &EncoderState {
        &self.encoders[index]
    }

    /// Bridge of motor `index` (0 or 1).
    pub fn bridge(&self, index: usize) -> &B {
        &self.bridges[index]
    }

    /// Heartbeat indicator.
    pub fn status_indicator(&self) -> &L {
        &self.status
    }

    /// Fault indicator.
    pub fn fault_indicator(&self) -> &L {
        &self.fault
    }
}

impl<B, L> CommandHandler for DualMotorBoard<B, L>
where
    B: HBridge,
    L: Indicator,
{
    fn version(&self) -> u8 {
        self.version
    }

    fn set_mode(&mut self, mode: OperatingMode) {
        if mode != self.mode {
            log::info!("board: mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.heartbeat_runs = 0;
            for motor in self.motors.iter_mut() {
                let target = motor.target();
                motor.set_target(target);
            }
        }
    }

    fn set_targets(&mut self, targets: [i16; 2]) {
        for (motor, target) in self.motors.iter_mut().zip(targets) {
            motor.set_target(target);
        }
        // Applied on the next main-loop pass.
        self.flags.control = true;
    }

    fn feedback(&self) -> [i16; 2] {
        [self.motors[0].last_feedback(), self.motors[1].last_feedback()]
    }

    fn current(&self) -> [u16; 2] {
        self.current
    }

    fn indicate_fault(&mut self, faulted: bool) {
        self.fault.set(faulted);
    }
}

/// Failure while bringing the board up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardError<B, T> {
    /// A bridge rejected the initial brake.
    Bridge(B),
    /// The tick source failed to start.
    Tick(T),
}

impl<B: core::fmt::Debug, T: core::fmt::Debug> core::fmt::Display for BoardError<B, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BoardError::Bridge(e) => write!(f, "bridge error: {:?}", e),
            BoardError::Tick(e) => write!(f, "tick source error: {:?}", e),
        }
    }
}
