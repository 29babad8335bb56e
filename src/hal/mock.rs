//! Mock implementations for testing without hardware.
//!
//! Every hardware trait in [`crate::traits`] has a test double here that
//! records what the kernel did to it. [`LoopbackBus`] goes one step further
//! and wires a [`SpiMaster`](crate::transport::SpiMaster) straight into a
//! [`SlaveProtocol`], so a motherboard and a peripheral board can talk in a
//! single test.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTick`] | [`TickSource`] | Records the configured rate |
//! | [`MockShiftRegister`] | [`ShiftRegister`] | Records writes, plays queued reads |
//! | [`MockChipSelect`] | [`ChipSelect`] | Tracks the selected target |
//! | [`MockBridge`] | [`HBridge`] | Tracks duty and leg state |
//! | [`MockIndicator`] | [`Indicator`] | Tracks LED state |
//! | [`MockHandler`] | [`CommandHandler`] | Canned telemetry, records commands |
//! | [`LoopbackBus`] | [`ShiftRegister`] | Master register looped into a slave |
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::event::{Event, EventQueue};
//! use lace_kernel::hal::{LoopbackBus, MockChipSelect, MockHandler};
//! use lace_kernel::transport::{Frame, SpiMaster};
//!
//! let mut bus = LoopbackBus::new(MockHandler::new());
//! let mut cs = MockChipSelect::new();
//! let mut queue: EventQueue<8> = EventQueue::new();
//! let mut master: SpiMaster<32> = SpiMaster::new();
//!
//! master.transmit(0, Frame::motor_set(5, -5).as_bytes(), &mut bus, &mut cs).unwrap();
//! while !master.is_idle() {
//!     master.on_transfer_complete(&mut bus, &mut cs, &mut queue);
//! }
//!
//! assert_eq!(bus.handler().targets, [5, -5]);
//! ```

use std::collections::VecDeque;
use std::vec::Vec;

use crate::traits::{
    BridgeDrive, ChipSelect, CommandHandler, HBridge, Indicator, ShiftRegister, TickSource,
};
use crate::transport::{OperatingMode, SlaveProtocol};

// ============================================================================
// Tick
// ============================================================================

/// Mock periodic tick.
#[derive(Debug, Default)]
pub struct MockTick {
    /// Rate of the running tick, `None` when stopped.
    pub hz: Option<u32>,
    /// Number of `start` calls.
    pub starts: usize,
    /// When set, `start` fails.
    pub fail: bool,
}

impl MockTick {
    /// Creates a stopped tick.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickSource for MockTick {
    type Error = ();

    fn start(&mut self, hz: u32) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.hz = Some(hz);
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ()> {
        self.hz = None;
        Ok(())
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Mock shift register.
///
/// `read` returns queued responses in order, then `0x00`.
///
/// ```rust
/// use lace_kernel::hal::MockShiftRegister;
/// use lace_kernel::traits::ShiftRegister;
///
/// let mut bus = MockShiftRegister::new();
/// bus.queue_responses(&[0x42]);
/// bus.write(0x80);
///
/// assert_eq!(bus.read(), 0x42);
/// assert_eq!(bus.read(), 0x00);
/// assert_eq!(bus.written, vec![0x80]);
/// ```
#[derive(Debug, Default)]
pub struct MockShiftRegister {
    /// Every byte written, in order.
    pub written: Vec<u8>,
    /// Whether the peripheral is enabled.
    pub enabled: bool,
    responses: VecDeque<u8>,
}

impl MockShiftRegister {
    /// Creates a disabled register with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for subsequent reads.
    pub fn queue_responses(&mut self, bytes: &[u8]) {
        self.responses.extend(bytes.iter().copied());
    }
}

impl ShiftRegister for MockShiftRegister {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn write(&mut self, byte: u8) {
        self.written.push(byte);
    }

    fn read(&mut self) -> u8 {
        self.responses.pop_front().unwrap_or(0)
    }
}

/// Mock chip-select lines.
#[derive(Debug, Default)]
pub struct MockChipSelect {
    /// Currently asserted target.
    pub selected: Option<u8>,
    /// Number of `select` calls.
    pub selects: usize,
}

impl MockChipSelect {
    /// Creates lines with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChipSelect for MockChipSelect {
    fn select(&mut self, target: u8) {
        self.selected = Some(target);
        self.selects += 1;
    }

    fn deselect_all(&mut self) {
        self.selected = None;
    }
}

// ============================================================================
// Motor Hardware
// ============================================================================

/// Mock H-bridge channel.
///
/// ```rust
/// use lace_kernel::hal::MockBridge;
/// use lace_kernel::traits::{BridgeDrive, HBridge};
///
/// let mut bridge = MockBridge::new();
/// bridge.set_duty(90).unwrap();
/// bridge.brake().unwrap();
///
/// assert_eq!(bridge.duty, 0);
/// assert_eq!(bridge.drive, BridgeDrive::Brake);
/// assert_eq!(bridge.duty_writes, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockBridge {
    /// Last duty written.
    pub duty: u8,
    /// Last leg state written.
    pub drive: BridgeDrive,
    /// Number of duty writes.
    pub duty_writes: usize,
    /// When set, every operation fails.
    pub fail: bool,
}

impl MockBridge {
    /// Creates a coasting bridge at zero duty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge whose operations all fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl HBridge for MockBridge {
    type Error = ();

    fn set_duty(&mut self, duty: u8) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.duty = duty;
        self.duty_writes += 1;
        Ok(())
    }

    fn drive(&mut self, drive: BridgeDrive) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.drive = drive;
        Ok(())
    }
}

/// Mock LED.
#[derive(Debug, Default)]
pub struct MockIndicator {
    /// Current state.
    pub on: bool,
    /// Number of state changes.
    pub changes: usize,
}

impl MockIndicator {
    /// Creates an LED that is off.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for MockIndicator {
    fn set(&mut self, on: bool) {
        if on != self.on {
            self.changes += 1;
        }
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

// ============================================================================
// Command Handler
// ============================================================================

/// Canned board for slave protocol tests.
///
/// Getters return the public fields; setters record into them.
#[derive(Debug)]
pub struct MockHandler {
    /// Version byte to report.
    pub version: u8,
    /// Last mode set.
    pub mode: OperatingMode,
    /// Last targets set.
    pub targets: [i16; 2],
    /// Number of `set_targets` calls.
    pub set_targets_calls: usize,
    /// Feedback to report.
    pub feedback: [i16; 2],
    /// Current to report.
    pub current: [u16; 2],
    /// Fault indicator state.
    pub fault_led: bool,
}

impl MockHandler {
    /// Creates a handler reporting version `0x01` and zero telemetry.
    pub fn new() -> Self {
        Self {
            version: 0x01,
            mode: OperatingMode::Pwm,
            targets: [0; 2],
            set_targets_calls: 0,
            feedback: [0; 2],
            current: [0; 2],
            fault_led: false,
        }
    }
}

impl Default for MockHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for MockHandler {
    fn version(&self) -> u8 {
        self.version
    }

    fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
    }

    fn set_targets(&mut self, targets: [i16; 2]) {
        self.targets = targets;
        self.set_targets_calls += 1;
    }

    fn feedback(&self) -> [i16; 2] {
        self.feedback
    }

    fn current(&self) -> [u16; 2] {
        self.current
    }

    fn indicate_fault(&mut self, faulted: bool) {
        self.fault_led = faulted;
    }
}

// ============================================================================
// Loopback
// ============================================================================

/// Master-side shift register connected directly to a slave.
///
/// Each `write` is one full shift: the slave receives the byte and the
/// master captures whatever the slave had preloaded, so replies arrive one
/// byte late exactly as on the wire.
pub struct LoopbackBus<H> {
    slave: SlaveProtocol,
    handler: H,
    preload: u8,
    captured: u8,
    enabled: bool,
    position: usize,
    corrupt: Option<(usize, u8)>,
}

impl<H: CommandHandler> LoopbackBus<H> {
    /// Wire a fresh slave running `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            slave: SlaveProtocol::new(),
            handler,
            preload: 0,
            captured: 0,
            enabled: false,
            position: 0,
            corrupt: None,
        }
    }

    /// XOR `mask` into byte `index` of the next transfer on its way to the
    /// slave. Positions count from the first byte after `enable`.
    pub fn corrupt_at(&mut self, index: usize, mask: u8) {
        self.corrupt = Some((index, mask));
    }

    /// Slave state machine.
    pub fn slave(&self) -> &SlaveProtocol {
        &self.slave
    }

    /// Board behind the slave.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Board behind the slave, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Returns true while the master has the peripheral enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<H: CommandHandler> ShiftRegister for LoopbackBus<H> {
    fn enable(&mut self) {
        self.enabled = true;
        self.position = 0;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn write(&mut self, byte: u8) {
        let byte = match self.corrupt {
            Some((index, mask)) if index == self.position => {
                self.corrupt = None;
                byte ^ mask
            }
            _ => byte,
        };
        self.position += 1;
        self.captured = self.preload;
        self.preload = self.slave.on_byte(byte, &mut self.handler);
    }

    fn read(&mut self) -> u8 {
        self.captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_lags_one_byte() {
        let mut bus = LoopbackBus::new(MockHandler::new());
        bus.enable();
        bus.write(0x80);
        assert_eq!(bus.read(), 0x00);
        bus.write(0x01);
        assert_eq!(bus.read(), 0x80);
        bus.write(0x00);
        assert_eq!(bus.read(), 0x01);
    }

    #[test]
    fn indicator_counts_changes() {
        let mut led = MockIndicator::new();
        led.set(false);
        led.toggle();
        led.toggle();
        assert_eq!(led.changes, 2);
        assert!(!led.is_on());
    }

    #[test]
    fn failing_bridge_reports_errors() {
        let mut bridge = MockBridge::failing();
        assert_eq!(bridge.set_duty(1), Err(()));
        assert_eq!(bridge.brake(), Err(()));
    }

    #[test]
    fn tick_start_stop() {
        let mut tick = MockTick::new();
        tick.start(1_000).unwrap();
        assert_eq!(tick.hz, Some(1_000));
        tick.stop().unwrap();
        assert_eq!(tick.hz, None);
        assert_eq!(tick.starts, 1);
    }
}
