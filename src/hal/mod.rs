//! Hardware Abstraction Layer implementations.
//!
//! Concrete implementations of the traits defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: test doubles and a master/slave loopback for desktop runs (requires `std`)
//! - `embedded`: adapters over `embedded-hal` 1.0 pins and PWM (requires `embedded-hal` feature)

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "embedded-hal")]
pub mod embedded;

#[cfg(feature = "std")]
pub use mock::*;

#[cfg(feature = "embedded-hal")]
pub use embedded::*;
