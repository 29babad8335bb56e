//! Interrupt-safe sharing between hardware handlers and the main flow.
//!
//! Kernel types are plain structs with `&mut self` methods. When an interrupt
//! and the main loop both need one (the event queue, the bus master, the
//! board state), put it in a `static` [`Shared`] and reach it through
//! [`Shared::lock`], which runs the closure inside a critical section.
//!
//! ```rust
//! use lace_kernel::event::{Event, EventQueue};
//! use lace_kernel::sync::Shared;
//!
//! static QUEUE: Shared<EventQueue<8>> = Shared::new(EventQueue::new());
//!
//! // Interrupt side
//! QUEUE.lock(|q| q.push(Event::Timer { slot: 0 }));
//!
//! // Main flow
//! let next = QUEUE.lock(|q| q.poll());
//! assert_eq!(next, Some(Event::Timer { slot: 0 }));
//! ```
//!
//! Keep closures short; a locked section delays the bus interrupt, which has
//! a one-byte deadline.

use core::cell::RefCell;

use critical_section::Mutex;

/// A value guarded by a critical section.
pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access.
    ///
    /// Nested calls on the same `Shared` panic; kernel types never lock
    /// internally, so only application code can nest.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}
