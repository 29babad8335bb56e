//! One-shot countdown timers driven by a periodic tick.
//!
//! A [`TimerScheduler`] is a fixed table of slots. [`tick`](TimerScheduler::tick)
//! runs inside the periodic interrupt: every armed slot counts down once and,
//! on reaching zero, runs its optional callback and pushes
//! [`Event::Timer`]. Slots never re-arm themselves; the usual idiom is to call
//! [`start`](TimerScheduler::start) again from the expiry handling.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::event::{Event, EventQueue};
//! use lace_kernel::timer::TimerScheduler;
//!
//! let mut queue: EventQueue<8> = EventQueue::new();
//! let mut timers: TimerScheduler<4> = TimerScheduler::new();
//!
//! timers.start(2, 3, None).unwrap();
//! for _ in 0..3 {
//!     timers.tick(&mut queue);
//! }
//! assert_eq!(queue.poll(), Some(Event::Timer { slot: 2 }));
//! assert!(!timers.is_running(2));
//! ```

use core::fmt;

use crate::event::{Event, EventQueue};
use crate::traits::TickSource;

/// Slots on the motherboard.
pub const MAX_TIMERS: usize = 4;

/// Immediate expiry hook, run in interrupt context with the slot index.
pub type TimerCallback = fn(u8);

/// Returned for a slot index outside the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerError {
    /// The index names no slot.
    InvalidSlot(usize),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::InvalidSlot(slot) => write!(f, "no timer slot {}", slot),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TimerError {}

/// One countdown slot. Zero remaining ticks means idle.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimerSlot {
    /// Ticks left before expiry.
    pub remaining_ticks: u16,
    /// Run once on the expiry tick, before the event is queued.
    pub on_expiry: Option<TimerCallback>,
}

impl TimerSlot {
    const IDLE: TimerSlot = TimerSlot {
        remaining_ticks: 0,
        on_expiry: None,
    };

    /// Returns true if the slot is counting down.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.remaining_ticks > 0
    }
}

/// Table of `N` one-shot timers.
pub struct TimerScheduler<const N: usize> {
    slots: [TimerSlot; N],
}

impl<const N: usize> TimerScheduler<N> {
    /// Creates a table with every slot idle.
    pub const fn new() -> Self {
        Self {
            slots: [TimerSlot::IDLE; N],
        }
    }

    /// Idle every slot and start the tick source at `hz`.
    pub fn init<T: TickSource>(&mut self, tick: &mut T, hz: u32) -> Result<(), T::Error> {
        self.slots = [TimerSlot::IDLE; N];
        tick.start(hz)
    }

    /// Arm `slot` to expire after `ticks` ticks.
    ///
    /// Overwrites any previous arming. Arming with zero ticks leaves the
    /// slot idle.
    pub fn start(
        &mut self,
        slot: usize,
        ticks: u16,
        on_expiry: Option<TimerCallback>,
    ) -> Result<(), TimerError> {
        let entry = self.slots.get_mut(slot).ok_or(TimerError::InvalidSlot(slot))?;
        *entry = TimerSlot {
            remaining_ticks: ticks,
            on_expiry,
        };
        Ok(())
    }

    /// Disarm `slot`.
    pub fn stop(&mut self, slot: usize) -> Result<(), TimerError> {
        let entry = self.slots.get_mut(slot).ok_or(TimerError::InvalidSlot(slot))?;
        entry.remaining_ticks = 0;
        Ok(())
    }

    /// Advance every armed slot by one tick, in index order.
    pub fn tick<const Q: usize>(&mut self, queue: &mut EventQueue<Q>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.remaining_ticks == 0 {
                continue;
            }
            slot.remaining_ticks -= 1;
            if slot.remaining_ticks == 0 {
                let id = index as u8;
                log::debug!("timer {} expired", id);
                if let Some(callback) = slot.on_expiry {
                    callback(id);
                }
                queue.push(Event::Timer { slot: id });
            }
        }
    }

    /// Returns true if `slot` is armed. Unknown slots are never running.
    pub fn is_running(&self, slot: usize) -> bool {
        self.slots.get(slot).map_or(false, TimerSlot::is_running)
    }

    /// Ticks left on `slot`.
    pub fn remaining(&self, slot: usize) -> Option<u16> {
        self.slots.get(slot).map(|s| s.remaining_ticks)
    }

    /// Number of slots.
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns true for a zero-slot table.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for TimerScheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockTick;
    use core::sync::atomic::{AtomicU32, Ordering};

    fn run(timers: &mut TimerScheduler<4>, queue: &mut EventQueue<8>, ticks: u16) {
        for _ in 0..ticks {
            timers.tick(queue);
        }
    }

    // =========================================================================
    // Expiry Tests
    // =========================================================================

    #[test]
    fn expires_exactly_once_after_n_ticks() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(1, 10, None).unwrap();
        run(&mut timers, &mut queue, 9);
        assert!(queue.is_empty());
        assert_eq!(timers.remaining(1), Some(1));

        timers.tick(&mut queue);
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 1 }));

        run(&mut timers, &mut queue, 50);
        assert!(queue.is_empty());
    }

    #[test]
    fn same_tick_expiries_in_index_order() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(3, 2, None).unwrap();
        timers.start(0, 2, None).unwrap();
        timers.start(2, 2, None).unwrap();
        run(&mut timers, &mut queue, 2);

        assert_eq!(queue.poll(), Some(Event::Timer { slot: 0 }));
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 2 }));
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 3 }));
        assert_eq!(queue.poll(), None);
    }

    static FIRED: AtomicU32 = AtomicU32::new(0);

    fn record(slot: u8) {
        FIRED.fetch_add(1 << (slot * 8), Ordering::SeqCst);
    }

    #[test]
    fn callback_runs_on_expiry() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(2, 1, Some(record)).unwrap();
        timers.tick(&mut queue);

        assert_eq!(FIRED.load(Ordering::SeqCst) & 0x00FF_0000, 1 << 16);
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 2 }));
    }

    // =========================================================================
    // Control Tests
    // =========================================================================

    #[test]
    fn restart_overwrites() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(0, 5, None).unwrap();
        run(&mut timers, &mut queue, 3);
        timers.start(0, 5, None).unwrap();
        run(&mut timers, &mut queue, 4);
        assert!(queue.is_empty());
        timers.tick(&mut queue);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn stop_cancels() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(0, 3, None).unwrap();
        run(&mut timers, &mut queue, 2);
        timers.stop(0).unwrap();
        run(&mut timers, &mut queue, 10);
        assert!(queue.is_empty());
        assert!(!timers.is_running(0));
    }

    #[test]
    fn zero_ticks_stays_idle() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut queue: EventQueue<8> = EventQueue::new();

        timers.start(0, 0, None).unwrap();
        run(&mut timers, &mut queue, 5);
        assert!(queue.is_empty());
    }

    #[test]
    fn invalid_slot_is_reported() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        assert_eq!(timers.start(4, 1, None), Err(TimerError::InvalidSlot(4)));
        assert_eq!(timers.stop(9), Err(TimerError::InvalidSlot(9)));
        assert!(!timers.is_running(4));
        assert_eq!(timers.remaining(4), None);
        assert_eq!(format!("{}", TimerError::InvalidSlot(4)), "no timer slot 4");
    }

    #[test]
    fn init_clears_slots_and_starts_tick() {
        let mut timers: TimerScheduler<4> = TimerScheduler::new();
        let mut tick = MockTick::new();

        timers.start(1, 100, None).unwrap();
        timers.init(&mut tick, 1_000).unwrap();

        assert!(!timers.is_running(1));
        assert_eq!(tick.hz, Some(1_000));
    }
}
