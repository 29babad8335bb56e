//! Byte-framed command protocol shared by the bus master and slave.
//!
//! # Wire format
//!
//! ```text
//! Master -> Slave:  0x80  CMD  [payload...]  CRC8  PAD
//! Slave  -> Master: 0x00  0x80 CMD  [payload...]  CRC8
//! ```
//!
//! The slave answers one byte late: whatever it receives it echoes on the
//! following shift. The trailing pad byte clocks out the slave's checksum.
//! Read commands carry `0x00` filler bytes from the master and the slave
//! substitutes live telemetry in the echo slots.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::transport::protocol::{Command, Frame, START_MARKER};
//! use lace_kernel::transport::crc::crc8;
//!
//! let frame = Frame::motor_set(300, -150);
//! let bytes = frame.as_bytes();
//!
//! assert_eq!(bytes[0], START_MARKER);
//! assert_eq!(bytes[1], Command::MotorSet.code());
//! assert_eq!(&bytes[2..6], &[0x01, 0x2C, 0xFF, 0x6A]);
//! assert_eq!(bytes[6], crc8(&bytes[1..6]));
//! ```

use core::fmt;
use heapless::Vec;

use super::crc::{crc8, crc8_update};
use super::master::TransportError;

/// First byte of every request.
pub const START_MARKER: u8 = 0x80;

/// Byte sent by the master to clock out the slave's last response.
pub const PAD: u8 = 0x00;

/// Largest payload of any command.
pub const MAX_PAYLOAD: usize = 4;

/// Longest request frame: start, command, payload, checksum, pad.
pub const MAX_FRAME: usize = MAX_PAYLOAD + 4;

/// Bus commands understood by the dual H-bridge board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum Command {
    /// Returns a fixed version byte.
    Version = 0x01,
    /// Sets the operating mode (1 byte in).
    ModeSet = 0x02,
    /// Sets both motor targets (two big-endian `i16`).
    MotorSet = 0x04,
    /// Reads both measured feedback values (two big-endian `i16`).
    MotorGet = 0x05,
    /// Reads both current samples (two big-endian `u16`).
    CurrentGet = 0x06,
}

impl Command {
    /// All commands, in code order.
    pub const ALL: [Command; 5] = [
        Command::Version,
        Command::ModeSet,
        Command::MotorSet,
        Command::MotorGet,
        Command::CurrentGet,
    ];

    /// Look up a command by its wire code.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Command::Version),
            0x02 => Some(Command::ModeSet),
            0x04 => Some(Command::MotorSet),
            0x05 => Some(Command::MotorGet),
            0x06 => Some(Command::CurrentGet),
            _ => None,
        }
    }

    /// Wire code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Bytes of payload the master supplies.
    #[inline]
    pub const fn payload_in(self) -> usize {
        match self {
            Command::Version => 0,
            Command::ModeSet => 1,
            Command::MotorSet => 4,
            Command::MotorGet => 0,
            Command::CurrentGet => 0,
        }
    }

    /// Bytes of payload the slave produces.
    #[inline]
    pub const fn payload_out(self) -> usize {
        match self {
            Command::Version => 1,
            Command::ModeSet => 0,
            Command::MotorSet => 0,
            Command::MotorGet => 4,
            Command::CurrentGet => 4,
        }
    }

    /// Number of payload shifts between the command byte and the checksum.
    #[inline]
    pub const fn payload_len(self) -> usize {
        let (i, o) = (self.payload_in(), self.payload_out());
        if i > o {
            i
        } else {
            o
        }
    }

    /// True for commands whose payload slots carry slave data.
    #[inline]
    pub const fn is_read(self) -> bool {
        self.payload_out() > 0
    }

    /// Total request length including the trailing pad.
    #[inline]
    pub const fn frame_len(self) -> usize {
        self.payload_len() + 4
    }
}

/// Motor operating mode selected with [`Command::ModeSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum OperatingMode {
    /// Open loop: the target magnitude is the duty cycle.
    #[default]
    Pwm = 0x00,
    /// Closed loop: the target is a velocity tracked by the PI controller.
    Velocity = 0x01,
}

impl OperatingMode {
    /// Look up a mode by its wire code.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(OperatingMode::Pwm),
            0x01 => Some(OperatingMode::Velocity),
            _ => None,
        }
    }

    /// Wire code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A complete request frame ready for [`SpiMaster::transmit`].
///
/// [`SpiMaster::transmit`]: crate::transport::SpiMaster::transmit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    bytes: Vec<u8, MAX_FRAME>,
}

impl Frame {
    /// Build a request for `command`.
    ///
    /// `payload` supplies the write bytes; missing bytes (all of them for read
    /// commands) are sent as `0x00` filler, extra bytes are ignored.
    pub fn new(command: Command, payload: &[u8]) -> Self {
        let mut bytes: Vec<u8, MAX_FRAME> = Vec::new();
        let mut crc = crc8_update(0, command.code());

        // Capacity is MAX_FRAME and every command fits, so pushes cannot fail.
        let _ = bytes.push(START_MARKER);
        let _ = bytes.push(command.code());
        for i in 0..command.payload_len() {
            let b = if i < command.payload_in() {
                payload.get(i).copied().unwrap_or(0)
            } else {
                0
            };
            crc = crc8_update(crc, b);
            let _ = bytes.push(b);
        }
        let _ = bytes.push(crc);
        let _ = bytes.push(PAD);

        Self { command, bytes }
    }

    /// `VERSION` request.
    pub fn version() -> Self {
        Self::new(Command::Version, &[])
    }

    /// `MODE_SET` request.
    pub fn mode_set(mode: OperatingMode) -> Self {
        Self::new(Command::ModeSet, &[mode.code()])
    }

    /// `MOTOR_SET` request with both targets big-endian.
    pub fn motor_set(target0: i16, target1: i16) -> Self {
        let [a, b] = target0.to_be_bytes();
        let [c, d] = target1.to_be_bytes();
        Self::new(Command::MotorSet, &[a, b, c, d])
    }

    /// `MOTOR_GET` request.
    pub fn motor_get() -> Self {
        Self::new(Command::MotorGet, &[])
    }

    /// `CURRENT_GET` request.
    pub fn current_get() -> Self {
        Self::new(Command::CurrentGet, &[])
    }

    /// Command carried by this frame.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Raw bytes to shift out.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload bytes as sent (filler included).
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..2 + self.command.payload_len()]
    }

    /// Checksum byte the master sends.
    pub fn checksum(&self) -> u8 {
        self.bytes[2 + self.command.payload_len()]
    }
}

/// Why a reply failed verification on the master side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkError {
    /// The transport was still busy with another transfer.
    Busy,
    /// Fewer bytes were captured than the frame requires.
    Truncated {
        /// Bytes captured.
        len: usize,
    },
    /// An echoed byte differs from what was sent.
    BadEcho {
        /// Index into the reply where the mismatch was found.
        index: usize,
    },
    /// The slave's checksum does not cover the bytes it returned.
    BadChecksum {
        /// Checksum computed over the reply payload.
        expected: u8,
        /// Checksum byte received.
        received: u8,
    },
    /// A completion arrived with no request outstanding.
    Unexpected,
    /// The bus master refused the request.
    Transport(TransportError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Busy => write!(f, "transport busy"),
            LinkError::Truncated { len } => write!(f, "reply truncated at {} bytes", len),
            LinkError::BadEcho { index } => write!(f, "echo mismatch at byte {}", index),
            LinkError::BadChecksum { expected, received } => write!(
                f,
                "checksum mismatch: expected {:#04x}, got {:#04x}",
                expected, received
            ),
            LinkError::Unexpected => write!(f, "completion without request"),
            LinkError::Transport(e) => write!(f, "transport: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

/// A verified reply payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    command: Command,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl Reply {
    /// Check the bytes captured during `frame` against the protocol.
    ///
    /// Verifies the echoed start marker and command, the echo of every
    /// written payload byte, and the slave's checksum over the returned
    /// payload.
    pub fn verify(frame: &Frame, captured: &[u8]) -> Result<Self, LinkError> {
        let command = frame.command();
        let n = command.payload_len();
        if captured.len() < n + 4 {
            return Err(LinkError::Truncated {
                len: captured.len(),
            });
        }

        if captured[1] != START_MARKER {
            return Err(LinkError::BadEcho { index: 1 });
        }
        if captured[2] != command.code() {
            return Err(LinkError::BadEcho { index: 2 });
        }

        let returned = &captured[3..3 + n];
        for (i, (&sent, &got)) in frame.payload().iter().zip(returned).enumerate() {
            if i < command.payload_in() && sent != got {
                return Err(LinkError::BadEcho { index: 3 + i });
            }
        }

        let mut all = [0u8; MAX_PAYLOAD + 1];
        all[0] = command.code();
        all[1..=n].copy_from_slice(returned);
        let expected = crc8(&all[..=n]);
        let received = captured[3 + n];
        if expected != received {
            return Err(LinkError::BadChecksum { expected, received });
        }

        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&returned[..command.payload_out()]);
        Ok(Self { command, payload })
    }

    /// Command this reply answers.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Slave-produced payload (empty for write commands).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode a pair of big-endian `i16` values.
    pub fn i16_pair(&self) -> Option<[i16; 2]> {
        match self.payload.as_slice() {
            [a, b, c, d] => Some([
                i16::from_be_bytes([*a, *b]),
                i16::from_be_bytes([*c, *d]),
            ]),
            _ => None,
        }
    }

    /// Decode a pair of big-endian `u16` values.
    pub fn u16_pair(&self) -> Option<[u16; 2]> {
        match self.payload.as_slice() {
            [a, b, c, d] => Some([
                u16::from_be_bytes([*a, *b]),
                u16::from_be_bytes([*c, *d]),
            ]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Command Table Tests
    // =========================================================================

    #[test]
    fn command_codes_round_trip() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x00), None);
        assert_eq!(Command::from_code(0x03), None);
        assert_eq!(Command::from_code(0x80), None);
    }

    #[test]
    fn payload_lengths() {
        assert_eq!(Command::Version.payload_len(), 1);
        assert_eq!(Command::ModeSet.payload_len(), 1);
        assert_eq!(Command::MotorSet.payload_len(), 4);
        assert_eq!(Command::MotorGet.payload_len(), 4);
        assert_eq!(Command::CurrentGet.payload_len(), 4);
        assert!(Command::Version.is_read());
        assert!(!Command::MotorSet.is_read());
    }

    #[test]
    fn mode_codes() {
        assert_eq!(OperatingMode::from_code(0), Some(OperatingMode::Pwm));
        assert_eq!(OperatingMode::from_code(1), Some(OperatingMode::Velocity));
        assert_eq!(OperatingMode::from_code(2), None);
    }

    // =========================================================================
    // Frame Tests
    // =========================================================================

    #[test]
    fn read_frame_uses_filler() {
        let frame = Frame::motor_get();
        assert_eq!(
            frame.as_bytes(),
            &[
                START_MARKER,
                0x05,
                0,
                0,
                0,
                0,
                crc8(&[0x05, 0, 0, 0, 0]),
                PAD
            ]
        );
    }

    #[test]
    fn mode_frame_layout() {
        let frame = Frame::mode_set(OperatingMode::Velocity);
        assert_eq!(frame.as_bytes().len(), Command::ModeSet.frame_len());
        assert_eq!(frame.payload(), &[0x01]);
        assert_eq!(frame.checksum(), crc8(&[0x02, 0x01]));
    }

    // =========================================================================
    // Reply Tests
    // =========================================================================

    fn good_reply(frame: &Frame, out: &[u8]) -> heapless::Vec<u8, MAX_FRAME> {
        let cmd = frame.command();
        let mut r: heapless::Vec<u8, MAX_FRAME> = heapless::Vec::new();
        r.push(0).unwrap();
        r.push(START_MARKER).unwrap();
        r.push(cmd.code()).unwrap();
        let mut crc = crc8_update(0, cmd.code());
        for i in 0..cmd.payload_len() {
            let b = if cmd.is_read() { out[i] } else { frame.payload()[i] };
            crc = crc8_update(crc, b);
            r.push(b).unwrap();
        }
        r.push(crc).unwrap();
        r
    }

    #[test]
    fn verify_write_echo() {
        let frame = Frame::motor_set(300, -150);
        let captured = good_reply(&frame, &[]);
        let reply = Reply::verify(&frame, &captured).unwrap();
        assert_eq!(reply.command(), Command::MotorSet);
        assert!(reply.payload().is_empty());
    }

    #[test]
    fn verify_read_decodes_pair() {
        let frame = Frame::motor_get();
        let captured = good_reply(&frame, &[0x00, 0x2A, 0xFF, 0xFE]);
        let reply = Reply::verify(&frame, &captured).unwrap();
        assert_eq!(reply.i16_pair(), Some([42, -2]));
        assert_eq!(reply.u16_pair(), Some([42, 0xFFFE]));
    }

    #[test]
    fn verify_rejects_bad_echo() {
        let frame = Frame::motor_set(1, 2);
        let mut captured = good_reply(&frame, &[]);
        captured[4] ^= 0x10;
        assert_eq!(
            Reply::verify(&frame, &captured),
            Err(LinkError::BadEcho { index: 4 })
        );
    }

    #[test]
    fn verify_rejects_missing_start_echo() {
        let frame = Frame::version();
        let mut captured = good_reply(&frame, &[0x01]);
        captured[1] = 0;
        assert_eq!(
            Reply::verify(&frame, &captured),
            Err(LinkError::BadEcho { index: 1 })
        );
    }

    #[test]
    fn verify_rejects_bad_checksum() {
        let frame = Frame::current_get();
        let mut captured = good_reply(&frame, &[1, 2, 3, 4]);
        let last = captured.len() - 1;
        captured[last] = !captured[last];
        assert!(matches!(
            Reply::verify(&frame, &captured),
            Err(LinkError::BadChecksum { .. })
        ));
    }

    #[test]
    fn verify_rejects_truncated() {
        let frame = Frame::motor_get();
        assert_eq!(
            Reply::verify(&frame, &[0, START_MARKER, 0x05]),
            Err(LinkError::Truncated { len: 3 })
        );
    }

    #[test]
    fn link_error_display() {
        let e = LinkError::BadChecksum {
            expected: 0x12,
            received: 0x34,
        };
        assert_eq!(
            format!("{}", e),
            "checksum mismatch: expected 0x12, got 0x34"
        );
        assert_eq!(format!("{}", LinkError::Busy), "transport busy");
        assert_eq!(
            format!("{}", LinkError::Transport(TransportError::Empty)),
            "transport: empty transfer"
        );
    }
}
