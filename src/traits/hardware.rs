//! Hardware abstraction traits for the tick source, bus and motor bridge.
//!
//! These are the seams between the kernel logic and the platform. Each trait
//! is small enough that an interrupt trampoline can implement it with a few
//! register accesses, and each has a mock in [`crate::hal::mock`] so the
//! kernel runs on a desktop without hardware.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TickSource`] | Periodic interrupt driving timers and encoders |
//! | [`ShiftRegister`] | Synchronous serial data register |
//! | [`ChipSelect`] | Target selection lines on the bus master |
//! | [`HBridge`] | Duty register plus two direction legs of one motor |
//! | [`Indicator`] | Status or fault LED |
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::traits::{BridgeDrive, HBridge};
//! use lace_kernel::hal::MockBridge;
//!
//! let mut bridge = MockBridge::new();
//! bridge.drive(BridgeDrive::Forward).unwrap();
//! bridge.set_duty(128).unwrap();
//!
//! assert_eq!(bridge.duty, 128);
//! assert_eq!(bridge.drive, BridgeDrive::Forward);
//! ```

/// Direction of motor rotation, derived from the sign of a target.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Positive target.
    Forward,
    /// Negative target.
    Reverse,
    /// Zero target; the bridge is braked.
    #[default]
    Stopped,
}

impl Direction {
    /// Direction encoded by the sign of a signed target.
    ///
    /// ```
    /// use lace_kernel::Direction;
    ///
    /// assert_eq!(Direction::from_target(300), Direction::Forward);
    /// assert_eq!(Direction::from_target(-150), Direction::Reverse);
    /// assert_eq!(Direction::from_target(0), Direction::Stopped);
    /// ```
    #[inline]
    pub const fn from_target(target: i16) -> Self {
        if target > 0 {
            Direction::Forward
        } else if target < 0 {
            Direction::Reverse
        } else {
            Direction::Stopped
        }
    }

    /// Bridge leg state that realises this direction.
    #[inline]
    pub const fn bridge_drive(&self) -> BridgeDrive {
        match self {
            Direction::Forward => BridgeDrive::Forward,
            Direction::Reverse => BridgeDrive::Reverse,
            Direction::Stopped => BridgeDrive::Brake,
        }
    }
}

/// State of the two input legs of an H-bridge.
///
/// ```text
///    IN1   IN2    OUT1   OUT2    DESC
///     H     H      L      L      Brake
///     H     L      H      L      Forward
///     L     H      L      H      Reverse
///     L     L      Z      Z      Coast
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BridgeDrive {
    /// IN1 high, IN2 low.
    Forward,
    /// IN1 low, IN2 high.
    Reverse,
    /// Both legs high: active brake.
    Brake,
    /// Both legs low: outputs released.
    #[default]
    Coast,
}

impl BridgeDrive {
    /// Logic levels of `(IN1, IN2)` for this state.
    #[inline]
    pub const fn legs(&self) -> (bool, bool) {
        match self {
            BridgeDrive::Forward => (true, false),
            BridgeDrive::Reverse => (false, true),
            BridgeDrive::Brake => (true, true),
            BridgeDrive::Coast => (false, false),
        }
    }
}

/// Periodic hardware tick.
///
/// The motherboard runs its timer table from a 1 kHz tick; the dual H-bridge
/// board runs encoders and task dividers from a 20 kHz tick. The platform
/// calls the kernel's tick handler from the interrupt this trait configures.
pub trait TickSource {
    /// Error type for tick configuration.
    type Error;

    /// Configure and start the periodic interrupt at `hz`.
    fn start(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Stop the periodic interrupt.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Byte-wide synchronous shift register (the SPI data register).
///
/// Writing a byte starts a shift on the master, or preloads the next
/// response on a slave. When the shift completes the platform raises the
/// transfer-complete interrupt and [`read`](Self::read) returns the byte that
/// was shifted in at the same time.
pub trait ShiftRegister {
    /// Enable the peripheral and its transfer-complete interrupt.
    fn enable(&mut self);

    /// Disable the peripheral.
    fn disable(&mut self);

    /// Load a byte into the data register.
    fn write(&mut self, byte: u8);

    /// Byte captured by the last completed shift.
    fn read(&mut self) -> u8;
}

/// Target selection lines on the bus master.
///
/// Lines are active low on the boards; implementations hide the polarity.
pub trait ChipSelect {
    /// Assert the line for `target`, deasserting all others.
    ///
    /// Targets without a line deselect everything.
    fn select(&mut self, target: u8);

    /// Deassert every line.
    fn deselect_all(&mut self);
}

/// One motor channel of an H-bridge driver.
///
/// Duty is an 8-bit compare value; direction is set separately through the
/// two input legs (see [`BridgeDrive`]).
pub trait HBridge {
    /// Error type for bridge operations.
    type Error;

    /// Program the duty-cycle register.
    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error>;

    /// Drive the two input legs.
    fn drive(&mut self, drive: BridgeDrive) -> Result<(), Self::Error>;

    /// Zero duty and active brake.
    fn brake(&mut self) -> Result<(), Self::Error> {
        self.set_duty(0)?;
        self.drive(BridgeDrive::Brake)
    }
}

/// Status LED.
pub trait Indicator {
    /// Drive the indicator logically on (`true`) or off.
    fn set(&mut self, on: bool);

    /// Last state written.
    fn is_on(&self) -> bool;

    /// Invert the indicator.
    fn toggle(&mut self) {
        let on = self.is_on();
        self.set(!on);
    }
}
