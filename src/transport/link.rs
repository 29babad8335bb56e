//! Motherboard-side driver for one dual H-bridge module.
//!
//! [`DhbLink`] builds request frames, hands them to the [`SpiMaster`] and,
//! once the application sees the matching [`Event::Spi`], verifies the reply
//! with [`complete`](DhbLink::complete). Every completion pushes an
//! [`Event::Custom`] so behaviour code can react to module traffic without
//! inspecting bus bytes.
//!
//! | Request | Custom id | On success |
//! |---------|-----------|------------|
//! | [`probe`](DhbLink::probe) | [`LINK_VERSION`] | [`version`](DhbLink::version) cached |
//! | [`set_mode`](DhbLink::set_mode) | [`LINK_MODE_SET`] | [`mode`](DhbLink::mode) cached |
//! | [`set_targets`](DhbLink::set_targets) | [`LINK_MOTOR_SET`] | none |
//! | [`request_feedback`](DhbLink::request_feedback) | [`LINK_MOTOR_GET`] | [`feedback`](DhbLink::feedback) cached |
//! | [`request_current`](DhbLink::request_current) | [`LINK_CURRENT_GET`] | [`current`](DhbLink::current) cached |
//!
//! The event's `data` is `1` when the reply verified and `0` otherwise.

use super::master::{SpiMaster, TransportError};
use super::protocol::{Command, Frame, LinkError, OperatingMode, Reply, MAX_FRAME};
use crate::event::{Event, EventQueue};
use crate::traits::{ChipSelect, ShiftRegister};

/// Custom event id for a `VERSION` reply.
pub const LINK_VERSION: u8 = 0x40 | Command::Version.code();
/// Custom event id for a `MODE_SET` reply.
pub const LINK_MODE_SET: u8 = 0x40 | Command::ModeSet.code();
/// Custom event id for a `MOTOR_SET` reply.
pub const LINK_MOTOR_SET: u8 = 0x40 | Command::MotorSet.code();
/// Custom event id for a `MOTOR_GET` reply.
pub const LINK_MOTOR_GET: u8 = 0x40 | Command::MotorGet.code();
/// Custom event id for a `CURRENT_GET` reply.
pub const LINK_CURRENT_GET: u8 = 0x40 | Command::CurrentGet.code();

/// Custom event id reported for replies to `command`.
#[inline]
pub const fn link_event_id(command: Command) -> u8 {
    0x40 | command.code()
}

impl From<TransportError> for LinkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Busy => LinkError::Busy,
            other => LinkError::Transport(other),
        }
    }
}

/// One dual H-bridge module on a bus port.
#[derive(Debug)]
pub struct DhbLink {
    port: u8,
    pending: Option<Frame>,
    version: Option<u8>,
    mode: Option<OperatingMode>,
    feedback: [i16; 2],
    current: [u16; 2],
    failures: u16,
}

impl DhbLink {
    /// Creates a driver for the module on `port`.
    pub const fn new(port: u8) -> Self {
        Self {
            port,
            pending: None,
            version: None,
            mode: None,
            feedback: [0; 2],
            current: [0; 2],
            failures: 0,
        }
    }

    /// Send `VERSION`.
    pub fn probe<const N: usize, B, C>(
        &mut self,
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        self.send(Frame::version(), master, bus, cs)
    }

    /// Send `MODE_SET`.
    pub fn set_mode<const N: usize, B, C>(
        &mut self,
        mode: OperatingMode,
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        self.send(Frame::mode_set(mode), master, bus, cs)
    }

    /// Send `MOTOR_SET` with both targets.
    pub fn set_targets<const N: usize, B, C>(
        &mut self,
        targets: [i16; 2],
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        self.send(Frame::motor_set(targets[0], targets[1]), master, bus, cs)
    }

    /// Send `MOTOR_GET`.
    pub fn request_feedback<const N: usize, B, C>(
        &mut self,
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        self.send(Frame::motor_get(), master, bus, cs)
    }

    /// Send `CURRENT_GET`.
    pub fn request_current<const N: usize, B, C>(
        &mut self,
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        self.send(Frame::current_get(), master, bus, cs)
    }

    fn send<const N: usize, B, C>(
        &mut self,
        frame: Frame,
        master: &mut SpiMaster<N>,
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), LinkError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        if self.pending.is_some() {
            return Err(LinkError::Busy);
        }
        master.transmit(self.port, frame.as_bytes(), bus, cs)?;
        self.pending = Some(frame);
        Ok(())
    }

    /// Verify the reply to the outstanding request.
    ///
    /// Call after polling `Spi { port }` for this link's port. Caches any
    /// decoded telemetry, pushes the `Custom` completion event and returns
    /// the verified reply.
    pub fn complete<const N: usize, const Q: usize>(
        &mut self,
        master: &mut SpiMaster<N>,
        queue: &mut EventQueue<Q>,
    ) -> Result<Reply, LinkError> {
        if !master.is_idle() {
            return Err(LinkError::Busy);
        }
        let frame = self.pending.take().ok_or(LinkError::Unexpected)?;

        let mut captured = [0u8; MAX_FRAME];
        let len = master.read(&mut captured);
        let result = Reply::verify(&frame, &captured[..len]);

        let id = link_event_id(frame.command());
        match &result {
            Ok(reply) => {
                self.absorb(&frame, reply);
                queue.push(Event::Custom { id, data: 1 });
            }
            Err(e) => {
                log::warn!("dhb{}: {:?} failed: {}", self.port, frame.command(), e);
                self.failures = self.failures.wrapping_add(1);
                queue.push(Event::Custom { id, data: 0 });
            }
        }
        result
    }

    fn absorb(&mut self, frame: &Frame, reply: &Reply) {
        match reply.command() {
            Command::Version => self.version = reply.payload().first().copied(),
            Command::ModeSet => {
                self.mode = frame.payload().first().and_then(|&m| OperatingMode::from_code(m));
                if let Some(mode) = self.mode {
                    log::info!("dhb{}: mode {:?}", self.port, mode);
                }
            }
            Command::MotorSet => {}
            Command::MotorGet => {
                if let Some(pair) = reply.i16_pair() {
                    self.feedback = pair;
                }
            }
            Command::CurrentGet => {
                if let Some(pair) = reply.u16_pair() {
                    self.current = pair;
                }
            }
        }
    }

    /// Bus port of the module.
    pub fn port(&self) -> u8 {
        self.port
    }

    /// True while a request awaits [`complete`](Self::complete).
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Version byte from the last successful probe.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    /// Mode acknowledged by the module.
    pub fn mode(&self) -> Option<OperatingMode> {
        self.mode
    }

    /// Feedback pair from the last successful `MOTOR_GET`.
    pub fn feedback(&self) -> [i16; 2] {
        self.feedback
    }

    /// Current pair from the last successful `CURRENT_GET`.
    pub fn current(&self) -> [u16; 2] {
        self.current
    }

    /// Replies that failed verification (wrapping).
    pub fn failures(&self) -> u16 {
        self.failures
    }
}
