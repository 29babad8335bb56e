//! Process-wide event queue.
//!
//! The event queue is the only channel through which hardware handlers talk
//! to the cooperative main loop. It is a fixed-capacity FIFO of [`Event`]
//! records with an optional per-kind callback that sees every event before it
//! is queued and may absorb it.
//!
//! # Overflow
//!
//! When the queue is full the newest event is dropped silently. Producers
//! are periodic (timer ticks, bus completions), so the next occurrence
//! regenerates an equivalent event.
//!
//! # Example
//!
//! ```rust
//! use lace_kernel::event::{Event, EventQueue};
//!
//! let mut queue: EventQueue<8> = EventQueue::new();
//! queue.push(Event::Timer { slot: 0 });
//! queue.push(Event::Spi { port: 1 });
//!
//! assert_eq!(queue.poll(), Some(Event::Timer { slot: 0 }));
//! assert_eq!(queue.poll(), Some(Event::Spi { port: 1 }));
//! assert_eq!(queue.poll(), None);
//! ```

use heapless::Vec;

/// Default queue depth used by the motherboard.
pub const EVENT_QUEUE_CAPACITY: usize = 8;

/// A tagged event record.
///
/// There is no "none" variant: an empty queue is reported as `None` by
/// [`EventQueue::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Event {
    /// A master-side bus transfer to `port` finished.
    Spi {
        /// Module port (chip-select index) that was addressed.
        port: u8,
    },
    /// An I2C transaction finished.
    I2c {
        /// Device address.
        address: u8,
        /// `true` for a read, `false` for a write.
        read: bool,
        /// Whether the transaction completed fully and successfully.
        ok: bool,
    },
    /// An ADC conversion finished.
    Adc {
        /// Channel that was sampled.
        channel: u8,
    },
    /// A timer slot expired.
    Timer {
        /// Index of the expired slot.
        slot: u8,
    },
    /// Application or driver defined event.
    Custom {
        /// Identifier chosen by the producer.
        id: u8,
        /// Producer defined payload.
        data: u16,
    },
}

impl Event {
    /// Returns the discriminant of this event.
    #[inline]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::Spi { .. } => EventKind::Spi,
            Event::I2c { .. } => EventKind::I2c,
            Event::Adc { .. } => EventKind::Adc,
            Event::Timer { .. } => EventKind::Timer,
            Event::Custom { .. } => EventKind::Custom,
        }
    }
}

/// Event discriminant, used to key callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// [`Event::Spi`]
    Spi,
    /// [`Event::I2c`]
    I2c,
    /// [`Event::Adc`]
    Adc,
    /// [`Event::Timer`]
    Timer,
    /// [`Event::Custom`]
    Custom,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 5;

    #[inline]
    const fn index(self) -> usize {
        match self {
            EventKind::Spi => 0,
            EventKind::I2c => 1,
            EventKind::Adc => 2,
            EventKind::Timer => 3,
            EventKind::Custom => 4,
        }
    }
}

/// What a callback decided to do with an event it was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Let the event continue into the queue.
    Keep,
    /// The callback absorbed the event; it is not queued.
    Consume,
}

/// Callback run synchronously by [`EventQueue::push`] for one event kind.
pub type EventCallback = fn(&Event) -> Disposition;

/// Fixed-capacity FIFO of events with per-kind interception.
///
/// Not internally synchronised. When a hardware handler pushes while the main
/// flow polls, keep the queue inside a [`Shared`](crate::sync::Shared).
pub struct EventQueue<const N: usize> {
    events: Vec<Event, N>,
    callbacks: [Option<EventCallback>; EventKind::COUNT],
}

impl<const N: usize> EventQueue<N> {
    /// Creates an empty queue with no callbacks installed.
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            callbacks: [None; EventKind::COUNT],
        }
    }

    /// Installs or clears the callback for `kind`.
    ///
    /// There is at most one callback per kind; a new one replaces the old.
    pub fn set_callback(&mut self, kind: EventKind, callback: Option<EventCallback>) {
        self.callbacks[kind.index()] = callback;
    }

    /// Appends an event.
    ///
    /// The registered callback for the event's kind runs first; if it returns
    /// [`Disposition::Consume`] nothing is queued. A full queue drops the
    /// event without error.
    pub fn push(&mut self, event: Event) {
        if let Some(callback) = self.callbacks[event.kind().index()] {
            if callback(&event) == Disposition::Consume {
                return;
            }
        }

        if self.events.push(event).is_err() {
            log::debug!("event queue full, dropped {:?}", event);
        }
    }

    /// Removes and returns the oldest event.
    ///
    /// Remaining events shift down one position.
    pub fn poll(&mut self) -> Option<Event> {
        if self.events.is_empty() {
            return None;
        }
        Some(self.events.remove(0))
    }

    /// Returns the oldest event without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.events.first()
    }

    /// Discards every queued event. Callbacks stay installed.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns true if the next push would be dropped.
    pub fn is_full(&self) -> bool {
        self.events.is_full()
    }

    /// Maximum number of queued events.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    // =========================================================================
    // FIFO Tests
    // =========================================================================

    #[test]
    fn poll_empty_returns_none() {
        let mut queue: EventQueue<4> = EventQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn events_come_out_in_push_order() {
        let mut queue: EventQueue<4> = EventQueue::new();
        let e1 = Event::Timer { slot: 0 };
        let e2 = Event::Spi { port: 2 };
        let e3 = Event::Custom { id: 7, data: 300 };

        queue.push(e1);
        queue.push(e2);
        queue.push(e3);

        assert_eq!(queue.poll(), Some(e1));
        assert_eq!(queue.poll(), Some(e2));
        assert_eq!(queue.poll(), Some(e3));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn overflow_drops_newest() {
        let mut queue: EventQueue<3> = EventQueue::new();
        for slot in 0..4 {
            queue.push(Event::Timer { slot });
        }
        assert!(queue.is_full());

        for slot in 0..3 {
            assert_eq!(queue.poll(), Some(Event::Timer { slot }));
        }
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn interleaved_push_and_poll() {
        let mut queue: EventQueue<2> = EventQueue::new();
        queue.push(Event::Adc { channel: 1 });
        assert_eq!(queue.poll(), Some(Event::Adc { channel: 1 }));
        queue.push(Event::Adc { channel: 2 });
        queue.push(Event::Adc { channel: 3 });
        assert_eq!(queue.peek(), Some(&Event::Adc { channel: 2 }));
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert!(queue.is_empty());
    }

    // =========================================================================
    // Callback Tests
    // =========================================================================

    static SEEN: AtomicUsize = AtomicUsize::new(0);

    fn swallow_spi(event: &Event) -> Disposition {
        if let Event::Spi { port } = event {
            SEEN.fetch_add(*port as usize, Ordering::SeqCst);
        }
        Disposition::Consume
    }

    fn keep_all(_: &Event) -> Disposition {
        Disposition::Keep
    }

    #[test]
    fn consuming_callback_suppresses_enqueue() {
        let mut queue: EventQueue<4> = EventQueue::new();
        queue.set_callback(EventKind::Spi, Some(swallow_spi));

        let before = SEEN.load(Ordering::SeqCst);
        queue.push(Event::Spi { port: 2 });
        queue.push(Event::Timer { slot: 1 });

        assert_eq!(SEEN.load(Ordering::SeqCst), before + 2);
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 1 }));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn keeping_callback_lets_event_through() {
        let mut queue: EventQueue<4> = EventQueue::new();
        queue.set_callback(EventKind::Timer, Some(keep_all));
        queue.push(Event::Timer { slot: 3 });
        assert_eq!(queue.poll(), Some(Event::Timer { slot: 3 }));
    }

    #[test]
    fn clearing_callback_restores_queueing() {
        let mut queue: EventQueue<4> = EventQueue::new();
        queue.set_callback(EventKind::Spi, Some(swallow_spi));
        queue.set_callback(EventKind::Spi, None);
        queue.push(Event::Spi { port: 0 });
        assert_eq!(queue.poll(), Some(Event::Spi { port: 0 }));
    }

    #[test]
    fn event_kind_matches_variant() {
        assert_eq!(Event::Spi { port: 1 }.kind(), EventKind::Spi);
        assert_eq!(
            Event::I2c {
                address: 0x52,
                read: true,
                ok: false
            }
            .kind(),
            EventKind::I2c
        );
        assert_eq!(Event::Adc { channel: 0 }.kind(), EventKind::Adc);
        assert_eq!(Event::Timer { slot: 0 }.kind(), EventKind::Timer);
        assert_eq!(Event::Custom { id: 0, data: 0 }.kind(), EventKind::Custom);
    }
}
