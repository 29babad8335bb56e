//! Trait definitions for hardware abstraction and command dispatch.
//!
//! These are the seams that let the kernel run on a microcontroller or on a
//! desktop with the mocks in [`crate::hal`].
//!
//! # Submodules
//!
//! - `hardware`: tick source, shift register, chip select, H-bridge, indicator
//! - `dispatch`: board-side effects of slave commands
//!
//! # Hardware Abstraction
//!
//! - [`TickSource`]: periodic interrupt configuration
//! - [`ShiftRegister`]: the bus data register
//! - [`ChipSelect`]: target selection on the bus master
//! - [`HBridge`]: duty and direction legs of one motor
//! - [`Indicator`]: status and fault LEDs
//!
//! # Dispatch
//!
//! [`CommandHandler`] is implemented by the peripheral board and called by
//! the [`SlaveProtocol`](crate::transport::SlaveProtocol).

pub mod dispatch;
pub mod hardware;

pub use dispatch::*;
pub use hardware::*;
