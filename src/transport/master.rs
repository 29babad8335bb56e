//! Interrupt-driven bus master.
//!
//! [`SpiMaster`] clocks a request out of the shift register one byte per
//! transfer-complete interrupt while capturing the byte shifted in at the
//! same time. When the last byte has been exchanged it deselects the target
//! and pushes [`Event::Spi`] naming the port that finished.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::event::{Event, EventQueue};
//! use lace_kernel::hal::{MockChipSelect, MockShiftRegister};
//! use lace_kernel::transport::SpiMaster;
//!
//! let mut bus = MockShiftRegister::new();
//! let mut cs = MockChipSelect::new();
//! let mut queue: EventQueue<8> = EventQueue::new();
//! let mut master: SpiMaster<32> = SpiMaster::new();
//!
//! bus.queue_responses(&[0xA0, 0xA1, 0xA2]);
//! master.transmit(1, &[1, 2, 3], &mut bus, &mut cs).unwrap();
//!
//! // The platform calls this from the transfer-complete interrupt.
//! while !master.is_idle() {
//!     master.on_transfer_complete(&mut bus, &mut cs, &mut queue);
//! }
//!
//! assert_eq!(queue.poll(), Some(Event::Spi { port: 1 }));
//! let mut buf = [0u8; 3];
//! assert_eq!(master.read(&mut buf), 3);
//! assert_eq!(buf, [0xA0, 0xA1, 0xA2]);
//! ```

use core::fmt;

use crate::event::{Event, EventQueue};
use crate::traits::{ChipSelect, ShiftRegister};

/// Default transfer buffer size on the motherboard.
pub const SPI_BUFFER_LEN: usize = 32;

/// Why [`SpiMaster::transmit`] refused a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportError {
    /// A transfer is already in flight; nothing was changed.
    Busy,
    /// Zero-length request.
    Empty,
    /// Request longer than the transfer buffer.
    TooLong {
        /// Requested length.
        len: usize,
        /// Buffer capacity.
        capacity: usize,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Busy => write!(f, "transfer already in progress"),
            TransportError::Empty => write!(f, "empty transfer"),
            TransportError::TooLong { len, capacity } => {
                write!(f, "transfer of {} bytes exceeds buffer of {}", len, capacity)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Transfer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Busy,
}

/// Full-duplex, byte-at-a-time bus master with `N` bytes of buffering.
///
/// The platform owns the peripheral and calls
/// [`on_transfer_complete`](Self::on_transfer_complete) from its interrupt.
/// Main-flow calls ([`transmit`](Self::transmit), [`read`](Self::read),
/// [`is_idle`](Self::is_idle)) must be made with that interrupt masked, which
/// is what wrapping the master in [`Shared`](crate::sync::Shared) provides.
pub struct SpiMaster<const N: usize> {
    state: State,
    out_buf: [u8; N],
    in_buf: [u8; N],
    len: usize,
    out_pos: usize,
    in_pos: usize,
    target: u8,
}

impl<const N: usize> SpiMaster<N> {
    /// Creates an idle master.
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            out_buf: [0; N],
            in_buf: [0; N],
            len: 0,
            out_pos: 0,
            in_pos: 0,
            target: 0,
        }
    }

    /// Start shifting `data` out to `target`.
    ///
    /// Asserts the target's select line, loads the first byte and returns
    /// immediately; completion is reported by an [`Event::Spi`]. Rejected
    /// without side effects while a transfer is in flight.
    pub fn transmit<B, C>(
        &mut self,
        target: u8,
        data: &[u8],
        bus: &mut B,
        cs: &mut C,
    ) -> Result<(), TransportError>
    where
        B: ShiftRegister,
        C: ChipSelect,
    {
        if self.state != State::Idle {
            return Err(TransportError::Busy);
        }
        if data.is_empty() {
            return Err(TransportError::Empty);
        }
        if data.len() > N {
            return Err(TransportError::TooLong {
                len: data.len(),
                capacity: N,
            });
        }

        self.out_buf[..data.len()].copy_from_slice(data);
        self.len = data.len();
        self.in_pos = 0;
        self.out_pos = 1;
        self.target = target;
        self.state = State::Busy;

        cs.select(target);
        bus.enable();
        bus.write(self.out_buf[0]);
        log::trace!("spi: start {} bytes to port {}", data.len(), target);
        Ok(())
    }

    /// Transfer-complete handler.
    ///
    /// Stores the byte just shifted in, then either loads the next outgoing
    /// byte or finishes the transfer: all targets deselected, the
    /// peripheral disabled and `Spi { port }` pushed.
    pub fn on_transfer_complete<B, C, const Q: usize>(
        &mut self,
        bus: &mut B,
        cs: &mut C,
        queue: &mut EventQueue<Q>,
    ) where
        B: ShiftRegister,
        C: ChipSelect,
    {
        if self.state != State::Busy {
            // Spurious interrupt; drain the register and ignore.
            let _ = bus.read();
            return;
        }

        self.in_buf[self.out_pos - 1] = bus.read();

        if self.out_pos < self.len {
            bus.write(self.out_buf[self.out_pos]);
            self.out_pos += 1;
            return;
        }

        cs.deselect_all();
        bus.disable();
        self.state = State::Idle;
        queue.push(Event::Spi { port: self.target });
    }

    /// Copy unread captured bytes into `buf`, oldest first.
    ///
    /// Returns the number of bytes copied. Bytes not read stay available
    /// until a later call or the next [`transmit`](Self::transmit).
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let captured = if self.state == State::Busy {
            self.out_pos - 1
        } else {
            self.len
        };
        let count = buf.len().min(captured - self.in_pos);
        buf[..count].copy_from_slice(&self.in_buf[self.in_pos..self.in_pos + count]);
        self.in_pos += count;
        count
    }

    /// Returns true if no transfer is in flight.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Target of the current or most recent transfer.
    #[inline]
    pub fn target(&self) -> u8 {
        self.target
    }
}

impl<const N: usize> Default for SpiMaster<N> {
    fn default() -> Self {
        Self::new()
    }
}
