//! # lace-kernel
//!
//! Real-time transport and control kernel for a motherboard and its
//! plug-in peripheral boards.
//!
//! ## Features
//!
//! - **Event queue**: fixed-capacity FIFO with per-kind interception, the only
//!   channel from interrupt handlers to the main loop
//! - **Timers**: one-shot countdown slots on a periodic tick
//! - **Bus transport**: interrupt-driven master, byte-at-a-time slave, CRC-8
//!   framed commands with a one-byte echo lag
//! - **Motor control**: edge-capture encoders and a fixed-point PI law with
//!   anti-windup
//!
//! ## Architecture
//!
//! The crate is `no_std` and allocation free; the default `std` feature only
//! adds the mocks used for desktop testing.
//!
//! - `event` - [`EventQueue`] and [`Event`]
//! - `timer` - [`TimerScheduler`]
//! - `transport` - CRC, framing, [`SpiMaster`], [`SlaveProtocol`], [`DhbLink`]
//! - `control` - [`EncoderState`], [`MotorController`]
//! - `board` - [`DualMotorBoard`], the peripheral board built from the above
//! - `traits` - hardware seams; `hal` - mocks and `embedded-hal` adapters
//! - `sync` - [`Shared`] for state touched by interrupts and the main loop
//!
//! ## Example
//!
//! ```rust
//! use lace_kernel::{
//!     board::DualMotorBoard,
//!     config::KernelConfig,
//!     event::{Event, EventQueue},
//!     hal::{LoopbackBus, MockBridge, MockChipSelect, MockIndicator},
//!     transport::{DhbLink, SpiMaster},
//!     Direction,
//! };
//!
//! let config = KernelConfig::default();
//! let board = DualMotorBoard::new(
//!     [MockBridge::new(), MockBridge::new()],
//!     MockIndicator::new(),
//!     MockIndicator::new(),
//!     &config,
//! );
//!
//! // Motherboard side, wired straight into the board's slave
//! let mut bus = LoopbackBus::new(board);
//! let mut cs = MockChipSelect::new();
//! let mut queue: EventQueue<8> = EventQueue::new();
//! let mut master: SpiMaster<32> = SpiMaster::new();
//! let mut dhb = DhbLink::new(0);
//!
//! dhb.set_targets([300, -150], &mut master, &mut bus, &mut cs).unwrap();
//! while !master.is_idle() {
//!     master.on_transfer_complete(&mut bus, &mut cs, &mut queue);
//! }
//! assert_eq!(queue.poll(), Some(Event::Spi { port: 0 }));
//! dhb.complete(&mut master, &mut queue).unwrap();
//!
//! assert_eq!(bus.handler().motor(1).direction(), Direction::Reverse);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Dual H-bridge peripheral board glue.
pub mod board;
/// Tuning constants with builder-style configuration.
pub mod config;
/// Encoder timing and the PI velocity controller.
pub mod control;
/// Bounded event queue shared by handlers and the main loop.
pub mod event;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Critical-section cell for interrupt-shared state.
pub mod sync;
/// One-shot countdown timers.
pub mod timer;
/// Core traits for hardware abstraction and command dispatch.
pub mod traits;
/// Bus transport: framing, master, slave and module driver.
pub mod transport;

pub use board::{DualMotorBoard, TaskFlags};
pub use config::KernelConfig;
pub use control::{EncoderState, MotorController, MotorState};
pub use event::{Disposition, Event, EventKind, EventQueue};
pub use sync::Shared;
pub use timer::{TimerError, TimerScheduler, TimerSlot};
pub use traits::{BridgeDrive, CommandHandler, Direction};
pub use transport::{
    Command, DhbLink, Frame, LinkError, OperatingMode, Reply, SlaveFault, SlaveProtocol,
    SpiMaster, TransportError,
};
