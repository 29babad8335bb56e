//! Bus slave protocol state machine.
//!
//! Re-entered once per externally clocked byte. Every call receives the byte
//! the master just shifted in and returns the byte to preload for the next
//! shift, which is how the one-byte echo lag arises.
//!
//! ```text
//!  AwaitStart --0x80--> AwaitCommand --known cmd--> InCommand(cmd, 0)
//!      ^   \--other: reply 0          \--unknown: fault-->  AwaitStart
//!      |
//!      +--- InCommand(cmd, len) --checksum ok: dispatch / bad: fault
//! ```
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::transport::{Frame, SlaveProtocol};
//! use lace_kernel::hal::MockHandler;
//!
//! let mut slave = SlaveProtocol::new();
//! let mut board = MockHandler::new();
//!
//! for &b in Frame::motor_set(300, -150).as_bytes() {
//!     slave.on_byte(b, &mut board);
//! }
//! assert_eq!(board.targets, [300, -150]);
//! assert!(slave.fault().is_none());
//! ```

use core::fmt;

use super::crc::crc8_update;
use super::protocol::{Command, OperatingMode, MAX_PAYLOAD, START_MARKER};
use crate::traits::{CommandHandler, ShiftRegister};

/// Framing fault recorded by the slave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlaveFault {
    /// The byte after the start marker is not a known command.
    UnknownCommand(u8),
    /// The trailing byte does not match the running checksum.
    BadChecksum {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Trailing byte sent by the master.
        received: u8,
    },
    /// `MODE_SET` named a mode this board does not implement.
    UnsupportedMode(u8),
}

impl fmt::Display for SlaveFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlaveFault::UnknownCommand(code) => write!(f, "unknown command {:#04x}", code),
            SlaveFault::BadChecksum { expected, received } => write!(
                f,
                "checksum mismatch: expected {:#04x}, got {:#04x}",
                expected, received
            ),
            SlaveFault::UnsupportedMode(mode) => write!(f, "unsupported mode {:#04x}", mode),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SlaveFault {}

/// Position in the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlaveState {
    /// Waiting for [`START_MARKER`].
    AwaitStart,
    /// Start seen, waiting for the command byte.
    AwaitCommand,
    /// Exchanging payload; `cursor` counts payload bytes seen so far.
    InCommand {
        /// Command being processed.
        command: Command,
        /// Payload bytes exchanged so far.
        cursor: usize,
    },
}

/// Slave side of the module bus.
pub struct SlaveProtocol {
    state: SlaveState,
    rx_crc: u8,
    tx_crc: u8,
    scratch: [u8; MAX_PAYLOAD],
    fault: Option<SlaveFault>,
    fault_count: u16,
}

impl SlaveProtocol {
    /// Creates a slave waiting for a start marker.
    pub const fn new() -> Self {
        Self {
            state: SlaveState::AwaitStart,
            rx_crc: 0,
            tx_crc: 0,
            scratch: [0; MAX_PAYLOAD],
            fault: None,
            fault_count: 0,
        }
    }

    /// Process one received byte and return the byte to send next.
    pub fn on_byte<H: CommandHandler>(&mut self, byte: u8, handler: &mut H) -> u8 {
        match self.state {
            SlaveState::AwaitStart => {
                if byte == START_MARKER {
                    self.state = SlaveState::AwaitCommand;
                    START_MARKER
                } else {
                    0
                }
            }

            SlaveState::AwaitCommand => match Command::from_code(byte) {
                Some(command) => {
                    self.rx_crc = crc8_update(0, byte);
                    self.tx_crc = self.rx_crc;
                    if command.is_read() {
                        self.snapshot(command, handler);
                    }
                    self.state = SlaveState::InCommand { command, cursor: 0 };
                    byte
                }
                None => {
                    self.state = SlaveState::AwaitStart;
                    self.raise(SlaveFault::UnknownCommand(byte), handler);
                    0
                }
            },

            SlaveState::InCommand { command, cursor } if cursor < command.payload_len() => {
                self.rx_crc = crc8_update(self.rx_crc, byte);
                let out = if command.is_read() {
                    self.scratch[cursor]
                } else {
                    self.scratch[cursor] = byte;
                    byte
                };
                self.tx_crc = crc8_update(self.tx_crc, out);
                self.state = SlaveState::InCommand {
                    command,
                    cursor: cursor + 1,
                };
                out
            }

            SlaveState::InCommand { command, .. } => {
                self.state = SlaveState::AwaitStart;
                if byte != self.rx_crc {
                    self.raise(
                        SlaveFault::BadChecksum {
                            expected: self.rx_crc,
                            received: byte,
                        },
                        handler,
                    );
                    return !self.tx_crc;
                }
                match self.dispatch(command, handler) {
                    Ok(()) => {
                        if self.fault.take().is_some() {
                            handler.indicate_fault(false);
                        }
                        self.tx_crc
                    }
                    Err(fault) => {
                        self.raise(fault, handler);
                        !self.tx_crc
                    }
                }
            }
        }
    }

    /// Convenience wrapper for the transfer-complete interrupt: read the
    /// received byte, process it and preload the response.
    pub fn on_transfer_complete<B, H>(&mut self, bus: &mut B, handler: &mut H)
    where
        B: ShiftRegister,
        H: CommandHandler,
    {
        let byte = bus.read();
        let response = self.on_byte(byte, handler);
        bus.write(response);
    }

    /// Abandon any partial frame, e.g. when the select line is released.
    pub fn reset(&mut self) {
        self.state = SlaveState::AwaitStart;
    }

    /// Current frame position.
    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// Fault currently asserted, if any.
    pub fn fault(&self) -> Option<SlaveFault> {
        self.fault
    }

    /// Total faults seen since power-up (wrapping).
    pub fn fault_count(&self) -> u16 {
        self.fault_count
    }

    /// Load the read payload at recognition time so the whole transfer
    /// returns a single snapshot.
    fn snapshot<H: CommandHandler>(&mut self, command: Command, handler: &H) {
        match command {
            Command::Version => self.scratch[0] = handler.version(),
            Command::MotorGet => {
                let [a, b] = handler.feedback();
                self.scratch[..2].copy_from_slice(&a.to_be_bytes());
                self.scratch[2..].copy_from_slice(&b.to_be_bytes());
            }
            Command::CurrentGet => {
                let [a, b] = handler.current();
                self.scratch[..2].copy_from_slice(&a.to_be_bytes());
                self.scratch[2..].copy_from_slice(&b.to_be_bytes());
            }
            Command::ModeSet | Command::MotorSet => {}
        }
    }

    fn dispatch<H: CommandHandler>(
        &mut self,
        command: Command,
        handler: &mut H,
    ) -> Result<(), SlaveFault> {
        match command {
            Command::ModeSet => {
                let code = self.scratch[0];
                let mode = OperatingMode::from_code(code).ok_or(SlaveFault::UnsupportedMode(code))?;
                handler.set_mode(mode);
            }
            Command::MotorSet => {
                let t0 = i16::from_be_bytes([self.scratch[0], self.scratch[1]]);
                let t1 = i16::from_be_bytes([self.scratch[2], self.scratch[3]]);
                handler.set_targets([t0, t1]);
            }
            Command::Version | Command::MotorGet | Command::CurrentGet => {}
        }
        log::trace!("slave: dispatched {:?}", command);
        Ok(())
    }

    fn raise<H: CommandHandler>(&mut self, fault: SlaveFault, handler: &mut H) {
        log::warn!("slave: {}", fault);
        self.fault = Some(fault);
        self.fault_count = self.fault_count.wrapping_add(1);
        handler.indicate_fault(true);
    }
}

impl Default for SlaveProtocol {
    fn default() -> Self {
        Self::new()
    }
}
